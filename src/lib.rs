//! Mason SDK: a small data-access layer with typed fields, composable predicates, an
//! active-record model and a migration runner over MySQL, PostgreSQL or SQLite.

pub mod config;
pub mod db;
pub mod driver;
pub mod error;
pub mod migration;
pub mod model;
pub mod query;
pub mod sql;

/// A fetched row: column name to value, in select order.
pub type Row = serde_json::Map<String, serde_json::Value>;

pub use config::{DeleteMode, Settings};
pub use db::{Db, Transaction};
pub use error::{ConfigError, Error, ErrorKind};
pub use migration::{Migration, MigrationRegistry, Migrator};
pub use model::{Field, FieldKind, Record, RecordSet, RecordState, Schema, SchemaRegistry, Scope};
pub use query::{Projection, QueryBuilder};
pub use sql::{Dialect, Operator, Predicate};
