//! In-memory connection that records statements and answers from a queue.

use super::Connection;
use crate::sql::Dialect;
use crate::Row;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Shared view of what a [`RecordingConnection`] was asked to run.
#[derive(Clone, Default)]
pub(crate) struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub(crate) fn statements(&self) -> Vec<String> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn push(&self, sql: &str) {
        if let Ok(mut v) = self.0.lock() {
            v.push(sql.to_string());
        }
    }
}

pub(crate) struct RecordingConnection {
    dialect: Dialect,
    log: Log,
    rows: VecDeque<Vec<Row>>,
    next_id: i64,
    last_id: Option<i64>,
    /// Statements containing this text fail with a protocol error.
    fail_on: Option<String>,
}

impl RecordingConnection {
    pub(crate) fn new(dialect: Dialect) -> (Self, Log) {
        let log = Log::default();
        let conn = RecordingConnection {
            dialect,
            log: log.clone(),
            rows: VecDeque::new(),
            next_id: 1,
            last_id: None,
            fail_on: None,
        };
        (conn, log)
    }

    /// Queue the result of the next `fetch_all`. An empty queue answers with no rows.
    pub(crate) fn respond(mut self, rows: Vec<Row>) -> Self {
        self.rows.push_back(rows);
        self
    }

    pub(crate) fn fail_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    fn check(&self, sql: &str) -> Result<(), sqlx::Error> {
        match &self.fail_on {
            Some(needle) if sql.contains(needle.as_str()) => {
                Err(sqlx::Error::Protocol(format!("refused: {}", sql)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>, sqlx::Error> {
        self.log.push(sql);
        self.check(sql)?;
        Ok(self.rows.pop_front().unwrap_or_default())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        self.log.push(sql);
        self.check(sql)?;
        if sql.starts_with("INSERT") {
            self.last_id = Some(self.next_id);
            self.next_id += 1;
        }
        Ok(1)
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.last_id
    }
}
