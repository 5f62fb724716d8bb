//! Renders DDL and DML text for a dialect. Nothing here touches a connection.
//!
//! Table names in DDL and column names written by INSERT/UPDATE are quoted. Select
//! columns, predicate columns and DML table names are passed through untouched, so
//! expressions such as `SUM(id)` work.

use crate::error::Error;
use crate::sql::{Dialect, Predicate};
use crate::Row;
use serde_json::Value;

/// Columns added to a table in default-fields mode, in creation order.
pub const DEFAULT_FIELD_NAMES: [&str; 3] = ["created_at_timestamp", "updated_at_timestamp", "deleted_at"];

/// `columns` are rendered definitions (see `Field::column_definition`). The id primary
/// key goes first when requested.
pub fn create_table(dialect: Dialect, table: &str, columns: &[String], with_primary_key: bool) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(columns.len() + 2);
    if with_primary_key {
        parts.push(dialect.primary_key_column());
    }
    parts.extend(columns.iter().map(String::as_str));
    if with_primary_key {
        if let Some(pk) = dialect.primary_key_constraint() {
            parts.push(pk);
        }
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}){}",
        dialect.quote_ident(table),
        parts.join(", "),
        dialect.table_options()
    )
}

pub fn drop_table(dialect: Dialect, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", dialect.quote_ident(table))
}

pub fn add_column(dialect: Dialect, table: &str, definition: &str) -> String {
    format!("ALTER TABLE {} ADD COLUMN {}", dialect.quote_ident(table), definition)
}

/// Order-by direction, case-insensitive and trimmed.
fn direction(column: &str, dir: &str) -> Result<&'static str, Error> {
    if column.trim().is_empty() {
        return Err(Error::InvalidSelectQuery("empty order-by column".into()));
    }
    match dir.trim().to_uppercase().as_str() {
        "ASC" => Ok("ASC"),
        "DESC" => Ok("DESC"),
        _ => Err(Error::InvalidSelectQuery(format!(
            "order-by direction for {} must be ASC or DESC, got {:?}",
            column, dir
        ))),
    }
}

/// One SELECT, as assembled by the query builder or the adapter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectStatement {
    pub table: String,
    /// `None` selects `*`.
    pub columns: Option<Vec<String>>,
    pub predicate: Option<Predicate>,
    pub group_by: Vec<String>,
    /// `(column, direction)` pairs, in order.
    pub order_by: Vec<(String, String)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub for_update: bool,
}

impl SelectStatement {
    pub fn new(table: impl Into<String>) -> Self {
        SelectStatement {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Fails before anything is sent when an order-by direction or a predicate is
    /// malformed.
    pub fn render(&self, dialect: Dialect) -> Result<String, Error> {
        let columns = match &self.columns {
            Some(cols) if !cols.is_empty() => cols
                .iter()
                .map(|c| c.trim())
                .collect::<Vec<_>>()
                .join(", "),
            _ => "*".to_string(),
        };
        let mut sql = format!("SELECT {} FROM {}", columns, self.table);
        if let Some(predicate) = &self.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.render(dialect)?);
        }
        if !self.group_by.is_empty() {
            let group: Vec<&str> = self.group_by.iter().map(|c| c.trim()).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&group.join(", "));
        }
        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|(col, dir)| direction(col, dir).map(|d| format!("{} {}", col.trim(), d)))
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(_)) => {
                if let Some(unbounded) = dialect.unbounded_limit() {
                    sql.push(' ');
                    sql.push_str(unbounded);
                }
            }
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        if self.for_update {
            match dialect.for_update() {
                Some(lock) => {
                    sql.push(' ');
                    sql.push_str(lock);
                }
                None => tracing::warn!(table = %self.table, "FOR UPDATE is not supported by sqlite; ignored"),
            }
        }
        Ok(sql)
    }
}

pub fn insert(dialect: Dialect, table: &str, columns: &[String], values: &[Value]) -> Result<String, Error> {
    if columns.len() != values.len() {
        return Err(Error::InvalidInsertQuery(format!(
            "{} columns but {} values for {}",
            columns.len(),
            values.len(),
            table
        )));
    }
    let cols: Vec<String> = columns.iter().map(|c| dialect.quote_ident(c)).collect();
    let vals: Vec<String> = values.iter().map(|v| dialect.literal(v)).collect();
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols.join(", "),
        vals.join(", ")
    );
    if dialect.insert_returning() {
        sql.push_str(" RETURNING *");
    }
    Ok(sql)
}

pub fn update(dialect: Dialect, table: &str, data: &Row, predicate: &Predicate) -> Result<String, Error> {
    if data.is_empty() {
        return Err(Error::InvalidUpdateQuery(format!("nothing to update in {}", table)));
    }
    let assignments: Vec<String> = data
        .iter()
        .map(|(col, v)| format!("{} = {}", dialect.quote_ident(col), dialect.literal(v)))
        .collect();
    Ok(format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments.join(", "),
        predicate.render(dialect)?
    ))
}

/// `UPDATE t SET f = (f + (amount)) WHERE ...`
pub fn add(dialect: Dialect, table: &str, field: &str, amount: &Value, predicate: &Predicate) -> Result<String, Error> {
    if !amount.is_number() {
        return Err(Error::InvalidUpdateQuery(format!(
            "increment of {}.{} must be numeric, got {}",
            table, field, amount
        )));
    }
    Ok(format!(
        "UPDATE {} SET {} = ({} + ({})) WHERE {}",
        table,
        field,
        field,
        amount,
        predicate.render(dialect)?
    ))
}

pub fn delete(dialect: Dialect, table: &str, predicate: &Predicate) -> Result<String, Error> {
    Ok(format!("DELETE FROM {} WHERE {}", table, predicate.render(dialect)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Operator;
    use serde_json::json;

    #[test]
    fn create_table_mysql_matches_engine_form() {
        let cols = vec![
            "login VARCHAR(64) NOT NULL".to_string(),
            "deleted_at INT(10) UNSIGNED NULL DEFAULT NULL".to_string(),
        ];
        assert_eq!(
            create_table(Dialect::MySql, "users", &cols, true),
            "CREATE TABLE IF NOT EXISTS `users` (id INT(11) UNSIGNED NOT NULL AUTO_INCREMENT, \
             login VARCHAR(64) NOT NULL, deleted_at INT(10) UNSIGNED NULL DEFAULT NULL, \
             PRIMARY KEY (id)) ENGINE=InnoDB"
        );
    }

    #[test]
    fn create_table_sqlite_inlines_the_key() {
        let cols = vec!["name VARCHAR(8) NOT NULL".to_string()];
        assert_eq!(
            create_table(Dialect::Sqlite, "t", &cols, true),
            "CREATE TABLE IF NOT EXISTS \"t\" (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR(8) NOT NULL)"
        );
        assert_eq!(
            create_table(Dialect::Sqlite, "t", &cols, false),
            "CREATE TABLE IF NOT EXISTS \"t\" (name VARCHAR(8) NOT NULL)"
        );
    }

    #[test]
    fn select_with_aggregate_group_limit_offset() {
        let stmt = SelectStatement {
            columns: Some(vec!["SUM(id) AS sum_id".into()]),
            group_by: vec!["id".into()],
            limit: Some(10),
            offset: Some(10),
            ..SelectStatement::new("t")
        };
        assert_eq!(
            stmt.render(Dialect::MySql).unwrap(),
            "SELECT SUM(id) AS sum_id FROM t GROUP BY id LIMIT 10 OFFSET 10"
        );
    }

    #[test]
    fn order_by_direction_is_normalized_or_rejected() {
        let mut stmt = SelectStatement::new("users");
        stmt.order_by = vec![("id".into(), " desc ".into()), ("login".into(), "asc".into())];
        assert_eq!(
            stmt.render(Dialect::Sqlite).unwrap(),
            "SELECT * FROM users ORDER BY id DESC, login ASC"
        );
        stmt.order_by = vec![("id".into(), "sideways".into())];
        assert!(matches!(stmt.render(Dialect::Sqlite), Err(Error::InvalidSelectQuery(_))));
    }

    #[test]
    fn offset_without_limit_gets_unbounded_limit() {
        let mut stmt = SelectStatement::new("t");
        stmt.offset = Some(5);
        assert_eq!(stmt.render(Dialect::Sqlite).unwrap(), "SELECT * FROM t LIMIT -1 OFFSET 5");
        assert_eq!(stmt.render(Dialect::Postgres).unwrap(), "SELECT * FROM t OFFSET 5");
    }

    #[test]
    fn for_update_is_dropped_on_sqlite() {
        let mut stmt = SelectStatement::new("t");
        stmt.predicate = Some(Predicate::equal("id", 1));
        stmt.limit = Some(1);
        stmt.for_update = true;
        assert_eq!(
            stmt.render(Dialect::MySql).unwrap(),
            "SELECT * FROM t WHERE id = 1 LIMIT 1 FOR UPDATE"
        );
        assert_eq!(stmt.render(Dialect::Sqlite).unwrap(), "SELECT * FROM t WHERE id = 1 LIMIT 1");
    }

    #[test]
    fn insert_checks_shape_and_quotes() {
        let cols = vec!["login".to_string(), "note".to_string()];
        let sql = insert(Dialect::MySql, "users", &cols, &[json!("bob"), Value::Null]).unwrap();
        assert_eq!(sql, "INSERT INTO users (`login`, `note`) VALUES ('bob', NULL)");
        let pg = insert(Dialect::Postgres, "users", &cols, &[json!("bob"), json!(1)]).unwrap();
        assert!(pg.ends_with("RETURNING *"));
        let err = insert(Dialect::MySql, "users", &cols, &[json!(1)]).unwrap_err();
        assert!(matches!(err, Error::InvalidInsertQuery(_)));
    }

    #[test]
    fn update_requires_data() {
        let pred = Predicate::equal("id", 1);
        let err = update(Dialect::MySql, "users", &Row::new(), &pred).unwrap_err();
        assert!(matches!(err, Error::InvalidUpdateQuery(_)));

        let mut data = Row::new();
        data.insert("role".into(), json!(2));
        assert_eq!(
            update(Dialect::Sqlite, "users", &data, &pred).unwrap(),
            "UPDATE users SET \"role\" = 2 WHERE id = 1"
        );
    }

    #[test]
    fn add_renders_increment() {
        let pred = Predicate::and().set("id", Operator::In, json!([1, 2]));
        assert_eq!(
            add(Dialect::MySql, "wallets", "balance", &json!(-5), &pred).unwrap(),
            "UPDATE wallets SET balance = (balance + (-5)) WHERE (id IN (1, 2))"
        );
        assert!(add(Dialect::MySql, "wallets", "balance", &json!("1; DROP"), &pred).is_err());
    }

    #[test]
    fn delete_renders_predicate() {
        assert_eq!(
            delete(Dialect::Postgres, "users", &Predicate::equal("id", 9)).unwrap(),
            "DELETE FROM users WHERE id = 9"
        );
    }
}
