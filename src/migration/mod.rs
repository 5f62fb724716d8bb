//! Ordered, namespaced schema migrations with an audit trail in `core_migrations`.
//!
//! Units live under `<root>/<prefix>/` as files named `Migration_<ordinal>_<Name>.<ext>`.
//! A unit is either registered in code (see [`MigrationRegistry`]) or a `.sql` file with
//! `-- migrate:up` and `-- migrate:down` sections.

mod runner;
mod source;

pub use runner::{Migrator, AUDIT_TABLE};
pub use source::{discover, scaffold, SqlMigration};

use crate::db::Db;
use crate::error::Error;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One schema change. `down` is optional; units without one cannot be reverted.
#[async_trait]
pub trait Migration: Send + Sync {
    async fn up(&self, db: &mut Db) -> Result<(), Error>;

    async fn down(&self, _db: &mut Db) -> Result<(), Error> {
        Ok(())
    }
}

/// `migrations::<prefix>::<name>`, or `migrations::<name>` for the empty prefix.
pub fn identifier(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        format!("migrations::{}", name)
    } else {
        format!("migrations::{}::{}", prefix, name)
    }
}

/// Code-defined migration units, keyed by prefix and unit name.
#[derive(Clone, Default)]
pub struct MigrationRegistry {
    units: BTreeMap<(String, String), Arc<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `name` is the unit name as it appears on disk, e.g. `Migration_0002_MakeUserTable`.
    pub fn register<M>(mut self, prefix: &str, name: &str, unit: M) -> Self
    where
        M: Migration + 'static,
    {
        self.units
            .insert((prefix.to_string(), name.to_string()), Arc::new(unit));
        self
    }

    pub fn get(&self, prefix: &str, name: &str) -> Option<Arc<dyn Migration>> {
        self.units
            .get(&(prefix.to_string(), name.to_string()))
            .cloned()
    }

    /// Unit names registered under `prefix`, ascending.
    pub fn names(&self, prefix: &str) -> Vec<String> {
        self.units
            .keys()
            .filter(|(p, _)| p == prefix)
            .map(|(_, n)| n.clone())
            .collect()
    }
}
