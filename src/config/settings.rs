//! Process settings read from the environment. Binaries load `.env` first via `dotenvy`.

use crate::error::ConfigError;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://mason.db?mode=rwc";
pub const DEFAULT_MIGRATIONS_DIR: &str = "database/migrations";

/// How `Record::delete` removes a row. One policy for every schema in the process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Stamp `deleted_at` and keep the row.
    #[default]
    Soft,
    /// Physically delete the row.
    Hard,
}

impl std::str::FromStr for DeleteMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "soft" => Ok(DeleteMode::Soft),
            "hard" => Ok(DeleteMode::Hard),
            _ => Err(ConfigError::InvalidSetting {
                name: "MODEL_DELETE",
                reason: format!("{} (expected soft or hard)", s),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub delete_mode: DeleteMode,
    /// Root directory holding one subdirectory per migration prefix.
    pub migrations_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.into(),
            delete_mode: DeleteMode::default(),
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
        }
    }
}

impl Settings {
    /// `DATABASE_URL`, `MODEL_DELETE` (soft | hard) and `MIGRATIONS_DIR`, each optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let delete_mode = match lookup("MODEL_DELETE") {
            Some(v) => v.parse()?,
            None => DeleteMode::default(),
        };
        let migrations_dir = lookup("MIGRATIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR));
        Ok(Settings {
            database_url,
            delete_mode,
            migrations_dir,
        })
    }
}
