//! SQL flavour of the connected database. Every dialect-dependent token is produced here,
//! including the one escaping routine all string literals go through.

use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

/// Column storage type of a field. Lengths are rendered where the dialect keeps them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlType {
    Varchar,
    Int,
}

impl Dialect {
    pub fn from_url(url: &str) -> Option<Dialect> {
        let scheme = url.split(':').next()?.to_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Quote a table or column identifier. Identifiers come from code, never from input.
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Escape the body of a string literal (without the surrounding quotes).
    pub fn escape_str(&self, s: &str) -> String {
        match self {
            Dialect::MySql => {
                let mut out = String::with_capacity(s.len() + 8);
                for c in s.chars() {
                    match c {
                        '\0' => out.push_str("\\0"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '"' => out.push_str("\\\""),
                        '\u{1a}' => out.push_str("\\Z"),
                        c => out.push(c),
                    }
                }
                out
            }
            Dialect::Postgres | Dialect::Sqlite => s.replace('\'', "''"),
        }
    }

    pub fn quote_str(&self, s: &str) -> String {
        format!("'{}'", self.escape_str(s))
    }

    /// Render a value as an inline SQL literal: numbers bare, strings quoted and escaped,
    /// null as `NULL`. Arrays and objects are stored as their JSON text.
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".into(),
            Value::Bool(b) => match self {
                Dialect::Postgres => String::from(if *b { "TRUE" } else { "FALSE" }),
                Dialect::MySql | Dialect::Sqlite => String::from(if *b { "1" } else { "0" }),
            },
            Value::Number(n) => n.to_string(),
            Value::String(s) => self.quote_str(s),
            Value::Array(_) | Value::Object(_) => self.quote_str(&value.to_string()),
        }
    }

    pub fn column_type(&self, ty: SqlType, length: Option<u32>, unsigned: bool) -> String {
        match (self, ty) {
            (Dialect::MySql, SqlType::Int) => {
                let mut s = match length {
                    Some(n) => format!("INT({})", n),
                    None => "INT".to_string(),
                };
                if unsigned {
                    s.push_str(" UNSIGNED");
                }
                s
            }
            (Dialect::Postgres, SqlType::Int) => "BIGINT".into(),
            (Dialect::Sqlite, SqlType::Int) => "INTEGER".into(),
            (_, SqlType::Varchar) => match length {
                Some(n) => format!("VARCHAR({})", n),
                None => "TEXT".to_string(),
            },
        }
    }

    /// Column definition of the autoincrement `id` primary key.
    pub fn primary_key_column(&self) -> &'static str {
        match self {
            Dialect::MySql => "id INT(11) UNSIGNED NOT NULL AUTO_INCREMENT",
            Dialect::Postgres => "id BIGSERIAL PRIMARY KEY",
            Dialect::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    /// Table-level constraint following the columns, when the key is not declared inline.
    pub fn primary_key_constraint(&self) -> Option<&'static str> {
        match self {
            Dialect::MySql => Some("PRIMARY KEY (id)"),
            Dialect::Postgres | Dialect::Sqlite => None,
        }
    }

    pub fn table_options(&self) -> &'static str {
        match self {
            Dialect::MySql => " ENGINE=InnoDB",
            Dialect::Postgres | Dialect::Sqlite => "",
        }
    }

    /// `value` is already a rendered literal.
    pub fn find_in_set(&self, column: &str, value: &str) -> String {
        match self {
            Dialect::MySql => format!("FIND_IN_SET({}, {})", value, column),
            Dialect::Postgres => format!("{} = ANY(string_to_array({}, ','))", value, column),
            Dialect::Sqlite => format!(
                "instr(',' || {} || ',', ',' || {} || ',') > 0",
                column, value
            ),
        }
    }

    /// Row lock suffix for single-row reads. SQLite locks the whole database instead.
    pub fn for_update(&self) -> Option<&'static str> {
        match self {
            Dialect::MySql | Dialect::Postgres => Some("FOR UPDATE"),
            Dialect::Sqlite => None,
        }
    }

    /// `LIMIT` clause needed before a bare `OFFSET`.
    pub fn unbounded_limit(&self) -> Option<&'static str> {
        match self {
            Dialect::MySql => Some("LIMIT 18446744073709551615"),
            Dialect::Sqlite => Some("LIMIT -1"),
            Dialect::Postgres => None,
        }
    }

    /// Postgres has no last-insert-id; inserts return the row instead.
    pub fn insert_returning(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Probe listing `table` when it exists and nothing otherwise.
    pub fn has_table_sql(&self, table: &str) -> String {
        let name = self.quote_str(table);
        match self {
            Dialect::MySql => format!("SHOW TABLES LIKE {}", name),
            Dialect::Postgres => format!(
                "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname = current_schema() AND tablename = {}",
                name
            ),
            Dialect::Sqlite => format!(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = {}",
                name
            ),
        }
    }

    /// `open` is the number of transaction levels already open.
    pub fn begin_sql(&self, open: usize) -> String {
        if open == 0 {
            match self {
                Dialect::MySql => "START TRANSACTION".into(),
                Dialect::Postgres | Dialect::Sqlite => "BEGIN".into(),
            }
        } else {
            format!("SAVEPOINT mason_sp_{}", open)
        }
    }

    /// `open` includes the level being committed.
    pub fn commit_sql(&self, open: usize) -> String {
        if open <= 1 {
            "COMMIT".into()
        } else {
            format!("RELEASE SAVEPOINT mason_sp_{}", open - 1)
        }
    }

    /// `open` includes the level being rolled back.
    pub fn rollback_sql(&self, open: usize) -> String {
        if open <= 1 {
            "ROLLBACK".into()
        } else {
            format!("ROLLBACK TO SAVEPOINT mason_sp_{}", open - 1)
        }
    }
}
