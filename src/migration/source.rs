//! Migration units on disk: discovery, `.sql` units and new-unit templates.

use super::Migration;
use crate::db::Db;
use crate::error::{ConfigError, Error};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

const UNIT_PREFIX: &str = "Migration_";
const UP_MARKER: &str = "-- migrate:up";
const DOWN_MARKER: &str = "-- migrate:down";

/// Unit names found in `dir`: regular files starting with `Migration_`, cut at the first
/// `.`. Sorted and deduplicated. A missing directory holds no units.
pub fn discover(dir: &Path) -> Result<Vec<String>, Error> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(name) = file_name.split('.').next() {
            if name.starts_with(UNIT_PREFIX) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

/// A unit written as SQL. Each section runs as one batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SqlMigration {
    pub up: String,
    pub down: String,
}

impl SqlMigration {
    /// Text before any marker belongs to `up`.
    pub fn parse(text: &str) -> Self {
        let mut up = Vec::new();
        let mut down = Vec::new();
        let mut in_down = false;
        for line in text.lines() {
            let marker = line.trim().to_lowercase();
            if marker == UP_MARKER {
                in_down = false;
            } else if marker == DOWN_MARKER {
                in_down = true;
            } else if in_down {
                down.push(line);
            } else {
                up.push(line);
            }
        }
        SqlMigration {
            up: up.join("\n").trim().to_string(),
            down: down.join("\n").trim().to_string(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }
}

#[async_trait]
impl Migration for SqlMigration {
    async fn up(&self, db: &mut Db) -> Result<(), Error> {
        if !self.up.is_empty() {
            db.execute(&self.up).await?;
        }
        Ok(())
    }

    async fn down(&self, db: &mut Db) -> Result<(), Error> {
        if !self.down.is_empty() {
            db.execute(&self.down).await?;
        }
        Ok(())
    }
}

/// Write an empty SQL unit `Migration_<unix-seconds>_<name>.sql` into `dir`, creating
/// the directory if needed.
pub fn scaffold(dir: &Path, name: &str) -> Result<PathBuf, Error> {
    let valid = Regex::new("^[A-Za-z][A-Za-z0-9_]*$")
        .map(|re| re.is_match(name))
        .unwrap_or(false);
    if !valid {
        return Err(ConfigError::InvalidSetting {
            name: "migration name",
            reason: format!("{:?} must start with a letter and hold only letters, digits or underscores", name),
        }
        .into());
    }
    std::fs::create_dir_all(dir)?;
    let file = format!("{}{}_{}.sql", UNIT_PREFIX, chrono::Utc::now().timestamp(), name);
    let path = dir.join(file);
    std::fs::write(&path, format!("{}\n\n{}\n", UP_MARKER, DOWN_MARKER))?;
    Ok(path)
}
