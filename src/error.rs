//! Typed errors and their coarse classification.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),
    #[error("invalid field {table}.{field}: {reason}")]
    InvalidField {
        table: String,
        field: String,
        reason: String,
    },
    #[error("duplicate field {table}.{field}")]
    DuplicateField { table: String, field: String },
    #[error("duplicate schema for table {0}")]
    DuplicateSchema(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("no value for required field {0}")]
    UndefinedValue(String),
    #[error("field not found: {0}")]
    FieldNotFound(String),
    #[error("field {0} is managed by the record and cannot be assigned")]
    ReadOnlyField(String),

    #[error("invalid operator: {0}")]
    InvalidOperator(String),
    #[error("invalid select query: {0}")]
    InvalidSelectQuery(String),
    #[error("invalid insert query: {0}")]
    InvalidInsertQuery(String),
    #[error("invalid update query: {0}")]
    InvalidUpdateQuery(String),
    #[error("invalid delete query: {0}")]
    InvalidDeleteQuery(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("database adapter: {0}")]
    Adapter(#[source] sqlx::Error),

    #[error("record not found: {0}")]
    RecordNotFound(String),
    #[error("record in {0} was removed")]
    RecordRemoved(String),

    #[error("migration {unit} failed: {source}")]
    MigrationApply {
        unit: String,
        #[source]
        source: Box<Error>,
    },
    #[error("migration unit not found: {0}")]
    MigrationNotFound(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// What the caller should make of an error, independent of the exact variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad field value supplied by the caller.
    Validation,
    /// Malformed predicate, order-by, insert shape or DDL. Nothing was executed.
    QueryConstruction,
    /// Connection or statement execution failure.
    Adapter,
    /// No matching row.
    NotFound,
    /// A migration unit failed or could not be resolved.
    Migration,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidValue { .. }
            | Error::UndefinedValue(_)
            | Error::FieldNotFound(_)
            | Error::ReadOnlyField(_) => ErrorKind::Validation,
            Error::InvalidOperator(_)
            | Error::InvalidSelectQuery(_)
            | Error::InvalidInsertQuery(_)
            | Error::InvalidUpdateQuery(_)
            | Error::InvalidDeleteQuery(_)
            | Error::InvalidQuery(_) => ErrorKind::QueryConstruction,
            Error::Adapter(_) | Error::Io(_) => ErrorKind::Adapter,
            Error::RecordNotFound(_) | Error::RecordRemoved(_) => ErrorKind::NotFound,
            Error::MigrationApply { .. } | Error::MigrationNotFound(_) => ErrorKind::Migration,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// The statement that failed, used to pick the error variant for a rejected statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Statement {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
}

/// Wrap a driver error. A statement the database rejected becomes the operation-specific
/// variant; anything else (I/O, TLS, protocol, closed connection) stays an adapter error.
pub(crate) fn from_driver(stmt: Statement, err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Database(db) => {
            let msg = db.message().to_string();
            match stmt {
                Statement::Select => Error::InvalidSelectQuery(msg),
                Statement::Insert => Error::InvalidInsertQuery(msg),
                Statement::Update => Error::InvalidUpdateQuery(msg),
                Statement::Delete => Error::InvalidDeleteQuery(msg),
                Statement::Ddl => Error::InvalidQuery(msg),
            }
        }
        other => Error::Adapter(other),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
