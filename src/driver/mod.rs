//! Raw SQL execution over one database connection.

mod mysql;
mod postgres;
#[cfg(test)]
pub(crate) mod recording;
mod sqlite;

pub use mysql::MySqlDriver;
pub use postgres::PgDriver;
pub use sqlite::SqliteDriver;

use crate::error::ConfigError;
use crate::sql::Dialect;
use crate::Row;
use async_trait::async_trait;

/// What the adapter needs from a database: run text SQL, read rows back as JSON maps,
/// and report generated ids.
#[async_trait]
pub trait Connection: Send {
    fn dialect(&self) -> Dialect;

    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>, sqlx::Error>;

    /// Returns the number of rows affected.
    async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error>;

    /// Id generated by the most recent INSERT on this connection, if the driver tracks one.
    fn last_insert_id(&self) -> Option<i64>;

    /// `open` is the number of transaction levels already open.
    async fn begin(&mut self, open: usize) -> Result<(), sqlx::Error> {
        let sql = self.dialect().begin_sql(open);
        tracing::debug!(sql = %sql, "query");
        self.execute(&sql).await.map(|_| ())
    }

    async fn commit(&mut self, open: usize) -> Result<(), sqlx::Error> {
        let sql = self.dialect().commit_sql(open);
        tracing::debug!(sql = %sql, "query");
        self.execute(&sql).await.map(|_| ())
    }

    async fn rollback(&mut self, open: usize) -> Result<(), sqlx::Error> {
        let sql = self.dialect().rollback_sql(open);
        tracing::debug!(sql = %sql, "query");
        self.execute(&sql).await.map(|_| ())
    }

    /// Escape a string for inclusion between single quotes.
    fn escape(&self, s: &str) -> String {
        self.dialect().escape_str(s)
    }
}

/// Open a connection, choosing the driver from the URL scheme.
pub async fn connect(url: &str) -> Result<Box<dyn Connection>, crate::error::Error> {
    let dialect = Dialect::from_url(url).ok_or_else(|| ConfigError::UnsupportedUrl(url.to_string()))?;
    let conn: Box<dyn Connection> = match dialect {
        Dialect::Sqlite => Box::new(SqliteDriver::connect(url).await?),
        Dialect::MySql => Box::new(MySqlDriver::connect(url).await?),
        Dialect::Postgres => Box::new(PgDriver::connect(url).await?),
    };
    tracing::info!(dialect = dialect.name(), "database connected");
    Ok(conn)
}

/// Try each Rust type in order against column `$idx` and convert the first that decodes.
/// A SQL NULL decodes as `None` for any type and yields `Value::Null`.
macro_rules! decode_cell {
    ($row:expr, $idx:expr, $($ty:ty => $conv:expr),+ $(,)?) => {{
        use sqlx::Row as _;
        $(
            if let Ok(v) = $row.try_get::<Option<$ty>, _>($idx) {
                return match v {
                    Some(x) => ($conv)(x),
                    None => serde_json::Value::Null,
                };
            }
        )+
        serde_json::Value::Null
    }};
}
pub(crate) use decode_cell;

/// Column names in order; later duplicates overwrite earlier ones.
macro_rules! row_to_map {
    ($row:expr, $cell:expr) => {{
        use sqlx::Column as _;
        use sqlx::Row as _;
        let mut map = $crate::Row::new();
        for (idx, col) in $row.columns().iter().enumerate() {
            map.insert(col.name().to_string(), $cell($row, idx));
        }
        map
    }};
}
pub(crate) use row_to_map;

fn bytes_to_value(b: Vec<u8>) -> serde_json::Value {
    serde_json::Value::String(String::from_utf8_lossy(&b).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unknown_schemes() {
        let err = match connect("redis://localhost").await {
            Err(e) => e,
            Ok(_) => panic!("redis urls must be rejected"),
        };
        assert!(matches!(
            err,
            crate::error::Error::Config(ConfigError::UnsupportedUrl(_))
        ));
    }

    #[tokio::test]
    async fn opens_in_memory_sqlite() {
        let mut conn = connect("sqlite::memory:").await.unwrap();
        assert_eq!(conn.dialect(), Dialect::Sqlite);
        let rows = conn.fetch_all("SELECT 1 AS one, 'x' AS s, NULL AS n").await.unwrap();
        assert_eq!(rows[0]["one"], serde_json::json!(1));
        assert_eq!(rows[0]["s"], serde_json::json!("x"));
        assert!(rows[0]["n"].is_null());
    }
}
