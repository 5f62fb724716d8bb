//! Fluent SELECT construction. Nothing runs until `select` or `get`.

use crate::db::Db;
use crate::error::Error;
use crate::sql::{Dialect, Predicate, SelectStatement};
use crate::Row;

/// One entry of the select list: a bare expression or `expr AS alias`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Projection {
    Expr(String),
    Aliased(String, String),
}

impl Projection {
    fn render(self) -> String {
        match self {
            Projection::Expr(e) => e,
            Projection::Aliased(e, alias) => format!("{} AS {}", e, alias),
        }
    }
}

impl From<&str> for Projection {
    fn from(e: &str) -> Self {
        Projection::Expr(e.to_string())
    }
}

impl From<String> for Projection {
    fn from(e: String) -> Self {
        Projection::Expr(e)
    }
}

impl From<(&str, &str)> for Projection {
    fn from((e, alias): (&str, &str)) -> Self {
        Projection::Aliased(e.to_string(), alias.to_string())
    }
}

impl From<(String, String)> for Projection {
    fn from((e, alias): (String, String)) -> Self {
        Projection::Aliased(e, alias)
    }
}

#[derive(Clone, Debug)]
pub struct QueryBuilder {
    stmt: SelectStatement,
}

impl QueryBuilder {
    pub fn table(name: impl Into<String>) -> Self {
        QueryBuilder {
            stmt: SelectStatement::new(name),
        }
    }

    /// Add to the select list; repeated calls append. No columns selects `*`.
    pub fn columns<I, P>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        let added = columns.into_iter().map(|p| p.into().render());
        self.stmt.columns.get_or_insert_with(Vec::new).extend(added);
        self
    }

    /// Replace the WHERE predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.stmt.predicate = Some(predicate);
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stmt.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    /// `(column, direction)` pairs; the direction is checked when the query runs.
    pub fn order_by<I, C, D>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = (C, D)>,
        C: Into<String>,
        D: Into<String>,
    {
        self.stmt.order_by = order.into_iter().map(|(c, d)| (c.into(), d.into())).collect();
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.stmt.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.stmt.offset = Some(offset);
        self
    }

    /// Lock the row read by [`QueryBuilder::get`].
    pub fn for_update(mut self) -> Self {
        self.stmt.for_update = true;
        self
    }

    pub fn statement(&self) -> &SelectStatement {
        &self.stmt
    }

    /// The SELECT that [`QueryBuilder::select`] would send.
    pub fn to_sql(&self, dialect: Dialect) -> Result<String, Error> {
        self.select_statement().render(dialect)
    }

    pub async fn select(&self, db: &mut Db) -> Result<Vec<Row>, Error> {
        db.select(&self.select_statement()).await
    }

    /// First matching row under `LIMIT 1`, with `FOR UPDATE` when requested.
    pub async fn get(&self, db: &mut Db) -> Result<Option<Row>, Error> {
        db.get(&self.stmt).await
    }

    fn select_statement(&self) -> SelectStatement {
        SelectStatement {
            for_update: false,
            ..self.stmt.clone()
        }
    }
}
