//! Composable WHERE expressions. A predicate only renders; it never executes.

use crate::error::Error;
use crate::sql::Dialect;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,
    In,
    Like,
    FindInSet,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
            Operator::In => "IN",
            Operator::Like => "LIKE",
            Operator::FindInSet => "FIND_IN_SET",
        }
    }
}

impl std::str::FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        Ok(match normalized.as_str() {
            "=" => Operator::Eq,
            "!=" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "IS" => Operator::Is,
            "IS NOT" => Operator::IsNot,
            "IN" => Operator::In,
            "LIKE" => Operator::Like,
            "FIND_IN_SET" => Operator::FindInSet,
            _ => return Err(Error::InvalidOperator(s.to_string())),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    fn as_sql(&self) -> &'static str {
        match self {
            Connector::And => " AND ",
            Connector::Or => " OR ",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Leaf {
        column: String,
        op: Operator,
        value: Value,
    },
    Group {
        connector: Connector,
        children: Vec<Predicate>,
    },
}

impl Predicate {
    pub fn and() -> Self {
        Predicate::Group {
            connector: Connector::And,
            children: Vec::new(),
        }
    }

    pub fn or() -> Self {
        Predicate::Group {
            connector: Connector::Or,
            children: Vec::new(),
        }
    }

    pub fn leaf(column: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Predicate::Leaf {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// `column = value`
    pub fn equal(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(column, Operator::Eq, value)
    }

    pub fn find_in_set(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(column, Operator::FindInSet, value)
    }

    /// Append a leaf. A leaf receiver is first wrapped in an AND group with itself as the
    /// only child.
    pub fn set(self, column: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.nest(Self::leaf(column, op, value))
    }

    /// Like [`Predicate::set`] with the operator given as SQL text. Unknown operators are
    /// rejected here, before anything is rendered.
    pub fn set_raw(
        self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<Value>,
    ) -> Result<Self, Error> {
        let op: Operator = op.parse()?;
        Ok(self.set(column, op, value))
    }

    /// Append a child predicate, kept in insertion order.
    pub fn nest(self, child: Predicate) -> Self {
        match self {
            Predicate::Group {
                connector,
                mut children,
            } => {
                children.push(child);
                Predicate::Group {
                    connector,
                    children,
                }
            }
            leaf @ Predicate::Leaf { .. } => Predicate::Group {
                connector: Connector::And,
                children: vec![leaf, child],
            },
        }
    }

    /// True for a group without children, which renders as a tautology.
    pub fn is_empty(&self) -> bool {
        matches!(self, Predicate::Group { children, .. } if children.is_empty())
    }

    /// Whether any leaf in the tree filters on `column`.
    pub fn references(&self, column: &str) -> bool {
        match self {
            Predicate::Leaf { column: c, .. } => c == column,
            Predicate::Group { children, .. } => children.iter().any(|p| p.references(column)),
        }
    }

    pub fn render(&self, dialect: Dialect) -> Result<String, Error> {
        match self {
            Predicate::Leaf { column, op, value } => render_leaf(dialect, column, *op, value),
            Predicate::Group {
                connector,
                children,
            } => {
                if children.is_empty() {
                    return Ok("1 = 1".into());
                }
                let parts = children
                    .iter()
                    .map(|c| c.render(dialect))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("({})", parts.join(connector.as_sql())))
            }
        }
    }
}

fn render_leaf(dialect: Dialect, column: &str, op: Operator, value: &Value) -> Result<String, Error> {
    match op {
        Operator::Is | Operator::IsNot => {
            if !value.is_null() {
                return Err(Error::InvalidOperator(format!(
                    "{} on {} requires null, got {}",
                    op.as_sql(),
                    column,
                    value
                )));
            }
            Ok(format!("{} {} NULL", column, op.as_sql()))
        }
        _ if value.is_null() => Err(Error::InvalidOperator(format!(
            "{} on {} does not accept null, use IS or IS NOT",
            op.as_sql(),
            column
        ))),
        Operator::In => {
            let Value::Array(items) = value else {
                return Err(Error::InvalidOperator(format!(
                    "IN on {} requires a list, got {}",
                    column, value
                )));
            };
            if items.is_empty() {
                return Ok("1 = 0".into());
            }
            let list: Vec<String> = items.iter().map(|v| dialect.literal(v)).collect();
            Ok(format!("{} IN ({})", column, list.join(", ")))
        }
        Operator::FindInSet => {
            let needle = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Ok(dialect.find_in_set(column, &dialect.quote_str(&needle)))
        }
        _ => Ok(format!("{} {} {}", column, op.as_sql(), dialect.literal(value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn and_group_renders_in_insertion_order() {
        let p = Predicate::and()
            .set("a", Operator::Eq, 1)
            .set("b", Operator::Is, Value::Null);
        assert_eq!(p.render(Dialect::MySql).unwrap(), "(a = 1 AND b IS NULL)");
    }

    #[test]
    fn is_with_value_fails_at_render() {
        let p = Predicate::and()
            .set("a", Operator::Eq, 1)
            .set("b", Operator::Is, 5);
        let err = p.render(Dialect::MySql).unwrap_err();
        assert!(matches!(err, Error::InvalidOperator(_)));
    }

    #[test]
    fn null_with_comparison_operator_fails() {
        let p = Predicate::equal("deleted_at", Value::Null);
        assert!(matches!(p.render(Dialect::Sqlite), Err(Error::InvalidOperator(_))));
    }

    #[test]
    fn empty_group_is_a_tautology() {
        assert_eq!(Predicate::and().render(Dialect::MySql).unwrap(), "1 = 1");
        assert!(Predicate::or().is_empty());
    }

    #[test]
    fn nested_groups_are_parenthesized() {
        let p = Predicate::or()
            .nest(Predicate::equal("role", 1))
            .nest(
                Predicate::and()
                    .set("role", Operator::Eq, 2)
                    .set("login", Operator::Like, "adm%"),
            );
        assert_eq!(
            p.render(Dialect::Sqlite).unwrap(),
            "(role = 1 OR (role = 2 AND login LIKE 'adm%'))"
        );
    }

    #[test]
    fn setting_on_a_leaf_wraps_it_in_and() {
        let p = Predicate::equal("id", 3).set("deleted_at", Operator::IsNot, Value::Null);
        assert_eq!(p.render(Dialect::MySql).unwrap(), "(id = 3 AND deleted_at IS NOT NULL)");
        assert!(p.references("deleted_at"));
        assert!(!p.references("login"));
    }

    #[test]
    fn in_renders_a_list() {
        let p = Predicate::leaf("id", Operator::In, json!([1, 2, 3]));
        assert_eq!(p.render(Dialect::MySql).unwrap(), "id IN (1, 2, 3)");
        let empty = Predicate::leaf("id", Operator::In, json!([]));
        assert_eq!(empty.render(Dialect::MySql).unwrap(), "1 = 0");
        let scalar = Predicate::leaf("id", Operator::In, 1);
        assert!(scalar.render(Dialect::MySql).is_err());
    }

    #[test]
    fn string_values_are_escaped() {
        let p = Predicate::equal("last_name", "O'Hara");
        assert_eq!(p.render(Dialect::Sqlite).unwrap(), "last_name = 'O''Hara'");
        assert_eq!(p.render(Dialect::MySql).unwrap(), "last_name = 'O\\'Hara'");
    }

    #[test]
    fn find_in_set_uses_dialect_syntax() {
        let p = Predicate::find_in_set("refer", 7);
        assert_eq!(p.render(Dialect::MySql).unwrap(), "FIND_IN_SET('7', refer)");
        assert_eq!(
            p.render(Dialect::Postgres).unwrap(),
            "'7' = ANY(string_to_array(refer, ','))"
        );
        assert_eq!(
            p.render(Dialect::Sqlite).unwrap(),
            "instr(',' || refer || ',', ',' || '7' || ',') > 0"
        );
    }

    #[test]
    fn raw_operators_are_checked_when_building() {
        let ok = Predicate::and().set_raw("a", "is  not", Value::Null).unwrap();
        assert_eq!(ok.render(Dialect::MySql).unwrap(), "(a IS NOT NULL)");
        let err = Predicate::and().set_raw("a", "<=>", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidOperator(_)));
    }
}
