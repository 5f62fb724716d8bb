//! The database adapter: renders statements for the connected dialect, runs them on the
//! single connection, and maps failures onto [`Error`].

mod transaction;

pub use transaction::Transaction;

use crate::config::{DeleteMode, Settings};
use crate::driver::{self, Connection};
use crate::error::{from_driver, Error, Statement};
use crate::model::{default_fields, Field};
use crate::sql::{builder, Dialect, Predicate, SelectStatement};
use crate::Row;
use serde_json::Value;
use std::borrow::Borrow;

pub struct Db {
    conn: Box<dyn Connection>,
    delete_mode: DeleteMode,
    /// Transaction levels currently open on the connection.
    depth: usize,
    /// Levels whose guard was dropped without commit or rollback.
    pending_rollbacks: usize,
}

impl Db {
    pub fn new(conn: Box<dyn Connection>) -> Self {
        Db {
            conn,
            delete_mode: DeleteMode::default(),
            depth: 0,
            pending_rollbacks: 0,
        }
    }

    pub async fn connect(url: &str) -> Result<Self, Error> {
        Ok(Self::new(driver::connect(url).await?))
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self, Error> {
        Ok(Self::connect(&settings.database_url)
            .await?
            .with_delete_mode(settings.delete_mode))
    }

    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    pub fn delete_mode(&self) -> DeleteMode {
        self.delete_mode
    }

    pub fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    /// Escape a string for inclusion between single quotes.
    pub fn escape(&self, s: &str) -> String {
        self.conn.escape(s)
    }

    pub fn in_transaction(&self) -> bool {
        self.depth > self.pending_rollbacks
    }

    /// Open a transaction, or a savepoint when one is already open. The guard derefs to
    /// this `Db`; dropping it without `commit` rolls back before the next statement.
    pub async fn begin(&mut self) -> Result<Transaction<'_>, Error> {
        self.flush_rollbacks().await?;
        let open = self.depth;
        self.conn.begin(open).await.map_err(Error::Adapter)?;
        self.depth += 1;
        Ok(Transaction::new(self))
    }

    pub(crate) async fn end_transaction(&mut self, commit: bool) -> Result<(), Error> {
        self.flush_rollbacks().await?;
        let open = self.depth;
        let res = if commit {
            self.conn.commit(open).await
        } else {
            self.conn.rollback(open).await
        };
        res.map_err(Error::Adapter)?;
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    pub(crate) fn queue_rollback(&mut self) {
        self.pending_rollbacks += 1;
    }

    async fn flush_rollbacks(&mut self) -> Result<(), Error> {
        while self.pending_rollbacks > 0 && self.depth > 0 {
            let open = self.depth;
            tracing::debug!(depth = open, "rolling back abandoned transaction");
            self.conn.rollback(open).await.map_err(Error::Adapter)?;
            self.depth -= 1;
            self.pending_rollbacks -= 1;
        }
        self.pending_rollbacks = 0;
        Ok(())
    }

    async fn fetch(&mut self, stmt: Statement, sql: &str) -> Result<Vec<Row>, Error> {
        self.flush_rollbacks().await?;
        tracing::debug!(sql = %sql, "query");
        self.conn.fetch_all(sql).await.map_err(|e| from_driver(stmt, e))
    }

    async fn run(&mut self, stmt: Statement, sql: &str) -> Result<u64, Error> {
        self.flush_rollbacks().await?;
        tracing::debug!(sql = %sql, "query");
        self.conn.execute(sql).await.map_err(|e| from_driver(stmt, e))
    }

    /// `CREATE TABLE IF NOT EXISTS`. Default-fields mode adds the three timestamp columns
    /// ahead of `fields`; the primary key is an autoincrement `id`.
    pub async fn create_table<I, N, F>(
        &mut self,
        table: &str,
        fields: I,
        with_default_fields: bool,
        with_primary_key: bool,
    ) -> Result<(), Error>
    where
        I: IntoIterator<Item = (N, F)>,
        N: AsRef<str>,
        F: Borrow<Field>,
    {
        let dialect = self.dialect();
        let mut columns = Vec::new();
        if with_default_fields {
            for (name, field) in default_fields() {
                columns.push(field.column_definition(name, dialect));
            }
        }
        for (name, field) in fields {
            columns.push(checked_column(table, name.as_ref(), field.borrow(), dialect)?);
        }
        let sql = builder::create_table(dialect, table, &columns, with_primary_key);
        self.run(Statement::Ddl, &sql).await.map(|_| ())
    }

    pub async fn drop_table(&mut self, table: &str) -> Result<(), Error> {
        let sql = builder::drop_table(self.dialect(), table);
        self.run(Statement::Ddl, &sql).await.map(|_| ())
    }

    pub async fn add_column(&mut self, table: &str, name: &str, field: &Field) -> Result<(), Error> {
        let dialect = self.dialect();
        let column = checked_column(table, name, field, dialect)?;
        let sql = builder::add_column(dialect, table, &column);
        self.run(Statement::Ddl, &sql).await.map(|_| ())
    }

    /// A failed probe answers `false`.
    pub async fn has_table(&mut self, table: &str) -> bool {
        let sql = self.dialect().has_table_sql(table);
        match self.fetch(Statement::Select, &sql).await {
            Ok(rows) => !rows.is_empty(),
            Err(e) => {
                tracing::debug!(table, error = %e, "table probe failed");
                false
            }
        }
    }

    /// First row of `stmt`, always limited to one row.
    pub async fn get(&mut self, stmt: &SelectStatement) -> Result<Option<Row>, Error> {
        let stmt = SelectStatement {
            limit: Some(1),
            ..stmt.clone()
        };
        let sql = stmt.render(self.dialect())?;
        Ok(self.fetch(Statement::Select, &sql).await?.into_iter().next())
    }

    pub async fn select(&mut self, stmt: &SelectStatement) -> Result<Vec<Row>, Error> {
        let sql = stmt.render(self.dialect())?;
        self.fetch(Statement::Select, &sql).await
    }

    /// Insert one row and return its generated id, or 0 for a table without one.
    pub async fn insert(&mut self, table: &str, fields: &[String], values: &[Value]) -> Result<i64, Error> {
        let dialect = self.dialect();
        let sql = builder::insert(dialect, table, fields, values)?;
        if dialect.insert_returning() {
            let rows = self.fetch(Statement::Insert, &sql).await?;
            return Ok(rows
                .first()
                .and_then(|r| r.get("id"))
                .and_then(Value::as_i64)
                .unwrap_or(0));
        }
        self.run(Statement::Insert, &sql).await?;
        Ok(self.conn.last_insert_id().unwrap_or(0))
    }

    /// Returns the number of rows changed. Empty `data` fails without touching the database.
    pub async fn update(&mut self, table: &str, data: &Row, predicate: &Predicate) -> Result<u64, Error> {
        let sql = builder::update(self.dialect(), table, data, predicate)?;
        self.run(Statement::Update, &sql).await
    }

    /// Atomic `field = field + amount` on the matching rows.
    pub async fn add(
        &mut self,
        table: &str,
        field: &str,
        amount: impl Into<Value>,
        predicate: &Predicate,
    ) -> Result<u64, Error> {
        let sql = builder::add(self.dialect(), table, field, &amount.into(), predicate)?;
        self.run(Statement::Update, &sql).await
    }

    pub async fn delete(&mut self, table: &str, predicate: &Predicate) -> Result<u64, Error> {
        let sql = builder::delete(self.dialect(), table, predicate)?;
        self.run(Statement::Delete, &sql).await
    }

    /// Run raw SQL and return its rows.
    pub async fn query(&mut self, sql: &str) -> Result<Vec<Row>, Error> {
        self.fetch(Statement::Ddl, sql).await
    }

    /// Run raw SQL that returns no rows; may hold several statements.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, Error> {
        self.run(Statement::Ddl, sql).await
    }
}

fn checked_column(table: &str, name: &str, field: &Field, dialect: Dialect) -> Result<String, Error> {
    field
        .check()
        .map_err(|reason| Error::InvalidQuery(format!("{}.{}: {}", table, name, reason)))?;
    Ok(field.column_definition(name, dialect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::recording::{Log, RecordingConnection};
    use crate::sql::Operator;
    use serde_json::json;

    fn db(conn: RecordingConnection) -> Db {
        Db::new(Box::new(conn))
    }

    fn recording(dialect: Dialect) -> (Db, Log) {
        let (conn, log) = RecordingConnection::new(dialect);
        (db(conn), log)
    }

    #[tokio::test]
    async fn empty_update_issues_no_statement() {
        let (mut db, log) = recording(Dialect::MySql);
        let err = db
            .update("users", &Row::new(), &Predicate::equal("id", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUpdateQuery(_)));
        assert!(log.statements().is_empty());
    }

    #[tokio::test]
    async fn bad_order_direction_issues_no_statement() {
        let (mut db, log) = recording(Dialect::MySql);
        let mut stmt = SelectStatement::new("users");
        stmt.order_by = vec![("id".into(), "UP".into())];
        assert!(matches!(db.select(&stmt).await, Err(Error::InvalidSelectQuery(_))));
        assert!(log.statements().is_empty());
    }

    #[tokio::test]
    async fn get_limits_to_one_row() {
        let mut row = Row::new();
        row.insert("id".into(), json!(4));
        let (conn, log) = RecordingConnection::new(Dialect::MySql);
        let mut db = db(conn.respond(vec![row.clone()]));
        let mut stmt = SelectStatement::new("users");
        stmt.predicate = Some(Predicate::equal("id", 4));
        stmt.for_update = true;
        assert_eq!(db.get(&stmt).await.unwrap(), Some(row));
        assert_eq!(
            log.statements(),
            vec!["SELECT * FROM users WHERE id = 4 LIMIT 1 FOR UPDATE"]
        );
        assert_eq!(db.get(&stmt).await.unwrap(), None);
    }

    #[tokio::test]
    async fn insert_returns_generated_id() {
        let (mut db, log) = recording(Dialect::Sqlite);
        let id = db
            .insert("users", &["login".into()], &[json!("bob")])
            .await
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(log.statements(), vec!["INSERT INTO users (\"login\") VALUES ('bob')"]);
    }

    #[tokio::test]
    async fn postgres_insert_reads_returned_id() {
        let mut row = Row::new();
        row.insert("id".into(), json!(12));
        let (conn, log) = RecordingConnection::new(Dialect::Postgres);
        let mut db = db(conn.respond(vec![row]));
        let id = db.insert("users", &["login".into()], &[json!("amy")]).await.unwrap();
        assert_eq!(id, 12);
        assert!(log.statements()[0].ends_with("RETURNING *"));
    }

    #[tokio::test]
    async fn create_table_adds_default_fields_first() {
        let (mut db, log) = recording(Dialect::MySql);
        db.create_table("users", [("login", Field::login(64))], true, true)
            .await
            .unwrap();
        assert_eq!(
            log.statements(),
            vec![
                "CREATE TABLE IF NOT EXISTS `users` (id INT(11) UNSIGNED NOT NULL AUTO_INCREMENT, \
                 created_at_timestamp INT(10) UNSIGNED NOT NULL, \
                 updated_at_timestamp INT(10) UNSIGNED NOT NULL, \
                 deleted_at INT(10) UNSIGNED NULL DEFAULT NULL, \
                 login VARCHAR(64) NOT NULL, PRIMARY KEY (id)) ENGINE=InnoDB"
            ]
        );
    }

    #[tokio::test]
    async fn add_column_failure_is_an_error() {
        let (conn, _log) = RecordingConnection::new(Dialect::MySql);
        let mut db = db(conn.fail_on("ALTER TABLE"));
        let err = db.add_column("users", "age", &Field::int()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Adapter);
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected_before_ddl() {
        let (mut db, log) = recording(Dialect::MySql);
        let err = db
            .create_table("users", [("name", Field::char(0))], false, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
        let err = db.add_column("users", "age", &Field::int().default("old")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
        assert!(log.statements().is_empty());
    }

    #[tokio::test]
    async fn failed_table_probe_is_false() {
        let (conn, _log) = RecordingConnection::new(Dialect::MySql);
        let mut db = db(conn.fail_on("SHOW TABLES"));
        assert!(!db.has_table("users").await);
    }

    #[tokio::test]
    async fn add_and_delete_render_predicates() {
        let (mut db, log) = recording(Dialect::MySql);
        let pred = Predicate::and().set("id", Operator::Eq, 3);
        db.add("wallets", "balance", 10, &pred).await.unwrap();
        db.delete("wallets", &pred).await.unwrap();
        assert_eq!(
            log.statements(),
            vec![
                "UPDATE wallets SET balance = (balance + (10)) WHERE (id = 3)",
                "DELETE FROM wallets WHERE (id = 3)",
            ]
        );
    }

    #[tokio::test]
    async fn commit_and_rollback() {
        let (mut db, log) = recording(Dialect::Sqlite);
        let mut tx = db.begin().await.unwrap();
        tx.execute("DELETE FROM a").await.unwrap();
        tx.commit().await.unwrap();
        let tx = db.begin().await.unwrap();
        tx.rollback().await.unwrap();
        assert!(!db.in_transaction());
        assert_eq!(
            log.statements(),
            vec!["BEGIN", "DELETE FROM a", "COMMIT", "BEGIN", "ROLLBACK"]
        );
    }

    #[tokio::test]
    async fn dropped_guard_rolls_back_before_next_statement() {
        let (mut db, log) = recording(Dialect::Sqlite);
        {
            let mut tx = db.begin().await.unwrap();
            tx.execute("DELETE FROM a").await.unwrap();
        }
        assert!(!db.in_transaction());
        db.execute("DELETE FROM b").await.unwrap();
        assert_eq!(
            log.statements(),
            vec!["BEGIN", "DELETE FROM a", "ROLLBACK", "DELETE FROM b"]
        );
    }

    #[tokio::test]
    async fn nested_transactions_use_savepoints() {
        let (mut db, log) = recording(Dialect::MySql);
        let mut outer = db.begin().await.unwrap();
        {
            let inner = outer.begin().await.unwrap();
            inner.rollback().await.unwrap();
        }
        let inner = outer.begin().await.unwrap();
        inner.commit().await.unwrap();
        outer.commit().await.unwrap();
        assert_eq!(
            log.statements(),
            vec![
                "START TRANSACTION",
                "SAVEPOINT mason_sp_1",
                "ROLLBACK TO SAVEPOINT mason_sp_1",
                "SAVEPOINT mason_sp_1",
                "RELEASE SAVEPOINT mason_sp_1",
                "COMMIT",
            ]
        );
    }
}
