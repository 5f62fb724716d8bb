use super::{bytes_to_value, decode_cell, row_to_map, Connection};
use crate::error::Error;
use crate::sql::Dialect;
use crate::Row;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::Connection as _;

/// Postgres has no session-level last insert id. Inserts are rendered with `RETURNING *`
/// and the adapter reads `id` from the returned row.
pub struct PgDriver {
    conn: PgConnection,
}

impl PgDriver {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let conn = PgConnection::connect(url).await.map_err(Error::Adapter)?;
        Ok(PgDriver { conn })
    }

    pub fn from_connection(conn: PgConnection) -> Self {
        PgDriver { conn }
    }
}

fn cell_to_value(row: &PgRow, idx: usize) -> Value {
    decode_cell!(row, idx,
        i16 => Value::from,
        i32 => Value::from,
        i64 => Value::from,
        f32 => |n: f32| Value::from(n as f64),
        f64 => Value::from,
        bool => Value::Bool,
        uuid::Uuid => |u: uuid::Uuid| Value::String(u.to_string()),
        chrono::DateTime<chrono::Utc> => |d: chrono::DateTime<chrono::Utc>| Value::String(d.to_rfc3339()),
        chrono::NaiveDateTime => |d: chrono::NaiveDateTime| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        chrono::NaiveDate => |d: chrono::NaiveDate| Value::String(d.format("%Y-%m-%d").to_string()),
        String => Value::String,
        serde_json::Value => std::convert::identity,
        Vec<u8> => bytes_to_value,
    )
}

#[async_trait]
impl Connection for PgDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>, sqlx::Error> {
        let rows = sqlx::Executor::fetch_all(&mut self.conn, sqlx::raw_sql(sql)).await?;
        Ok(rows.iter().map(|r| row_to_map!(r, cell_to_value)).collect())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        let done = sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql)).await?;
        Ok(done.rows_affected())
    }

    fn last_insert_id(&self) -> Option<i64> {
        None
    }
}
