use super::{bytes_to_value, decode_cell, row_to_map, Connection};
use crate::error::Error;
use crate::sql::Dialect;
use crate::Row;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::Connection as _;

pub struct MySqlDriver {
    conn: MySqlConnection,
    last_insert_id: Option<i64>,
}

impl MySqlDriver {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let conn = MySqlConnection::connect(url).await.map_err(Error::Adapter)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: MySqlConnection) -> Self {
        MySqlDriver {
            conn,
            last_insert_id: None,
        }
    }
}

fn cell_to_value(row: &MySqlRow, idx: usize) -> Value {
    decode_cell!(row, idx,
        i64 => Value::from,
        u64 => Value::from,
        f64 => Value::from,
        chrono::NaiveDateTime => |d: chrono::NaiveDateTime| Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string()),
        chrono::NaiveDate => |d: chrono::NaiveDate| Value::String(d.format("%Y-%m-%d").to_string()),
        serde_json::Value => std::convert::identity,
        String => Value::String,
        Vec<u8> => bytes_to_value,
    )
}

#[async_trait]
impl Connection for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>, sqlx::Error> {
        let rows = sqlx::Executor::fetch_all(&mut self.conn, sqlx::raw_sql(sql)).await?;
        Ok(rows.iter().map(|r| row_to_map!(r, cell_to_value)).collect())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        let done = sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql)).await?;
        self.last_insert_id = i64::try_from(done.last_insert_id())
            .ok()
            .filter(|id| *id != 0);
        Ok(done.rows_affected())
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }
}
