//! Column descriptors: storage type, constraints and the validation rule for one field.

use crate::error::Error;
use crate::sql::{Dialect, SqlType};
use regex::Regex;
use serde_json::{Number, Value};

/// Who writes a field. Everything but `Plain` is filled by the record itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Plain,
    /// Generated once when a record is constructed.
    AutoFill,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rule {
    Text,
    Integer,
    Login,
    Hash,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    sql_type: SqlType,
    length: Option<u32>,
    unsigned: bool,
    nullable: bool,
    default: Option<Value>,
    kind: FieldKind,
    rule: Rule,
}

impl Field {
    fn new(sql_type: SqlType, length: u32, rule: Rule, kind: FieldKind) -> Self {
        Field {
            sql_type,
            length: Some(length),
            unsigned: false,
            nullable: false,
            default: None,
            kind,
            rule,
        }
    }

    /// Variable-length string of at most `length` characters.
    pub fn char(length: u32) -> Self {
        Self::new(SqlType::Varchar, length, Rule::Text, FieldKind::Plain)
    }

    pub fn int() -> Self {
        Self::new(SqlType::Int, 11, Rule::Integer, FieldKind::Plain)
    }

    /// Unsigned integer referencing another row's id.
    pub fn id() -> Self {
        Self::int().unsigned()
    }

    /// Account name: 3 to `length` letters, digits or underscores.
    pub fn login(length: u32) -> Self {
        Self::new(SqlType::Varchar, length, Rule::Login, FieldKind::Plain)
    }

    /// Opaque random token generated when the record is constructed.
    pub fn random_hash(length: u32) -> Self {
        Self::new(SqlType::Varchar, length, Rule::Hash, FieldKind::AutoFill)
    }

    pub fn created_at() -> Self {
        Self::new(SqlType::Int, 10, Rule::Integer, FieldKind::CreatedAt).unsigned()
    }

    pub fn updated_at() -> Self {
        Self::new(SqlType::Int, 10, Rule::Integer, FieldKind::UpdatedAt).unsigned()
    }

    pub fn deleted_at() -> Self {
        Self::new(SqlType::Int, 10, Rule::Integer, FieldKind::DeletedAt)
            .unsigned()
            .nullable()
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn get_length(&self) -> Option<u32> {
        self.length
    }

    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn get_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Filled by the record rather than by assignment.
    pub fn is_system_managed(&self) -> bool {
        self.kind != FieldKind::Plain
    }

    /// Structural check run when the field is placed in a schema.
    pub(crate) fn check(&self) -> Result<(), String> {
        match self.length {
            Some(0) => return Err("length must be greater than 0".into()),
            None if self.sql_type == SqlType::Varchar => {
                return Err("string fields need a length".into())
            }
            _ => {}
        }
        if self.rule == Rule::Login && self.length.is_some_and(|n| n < 3) {
            return Err("login fields need a length of at least 3".into());
        }
        if let Some(default) = &self.default {
            self.validate("default", default).map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// Coerce `raw` to the clean value stored for this field. Clean values validate to
    /// themselves.
    pub fn validate(&self, name: &str, raw: &Value) -> Result<Value, Error> {
        if raw.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(Error::invalid_value(name, "null is not allowed"))
            };
        }
        match self.rule {
            Rule::Integer => self.clean_integer(name, raw),
            Rule::Text | Rule::Hash => self.clean_text(name, raw),
            Rule::Login => {
                let value = self.clean_text(name, raw)?;
                let max = self.length.unwrap_or(u32::MAX);
                let re = Regex::new(&format!("^[A-Za-z0-9_]{{3,{}}}$", max))
                    .map_err(|e| Error::invalid_value(name, e.to_string()))?;
                if !value.as_str().is_some_and(|s| re.is_match(s)) {
                    return Err(Error::invalid_value(
                        name,
                        format!("must be 3 to {} letters, digits or underscores", max),
                    ));
                }
                Ok(value)
            }
        }
    }

    /// Initial value for an `AutoFill` field, `None` for every other kind.
    pub fn fill(&self) -> Option<Value> {
        if self.kind != FieldKind::AutoFill {
            return None;
        }
        let len = self.length.unwrap_or(32) as usize;
        let mut token = String::with_capacity(len + 32);
        while token.len() < len {
            token.push_str(&uuid::Uuid::new_v4().simple().to_string());
        }
        token.truncate(len);
        Some(Value::String(token))
    }

    /// `NAME TYPE(LENGTH) [UNSIGNED] NULL|NOT NULL [DEFAULT x]`
    pub fn column_definition(&self, name: &str, dialect: Dialect) -> String {
        let mut def = format!(
            "{} {}",
            name,
            dialect.column_type(self.sql_type, self.length, self.unsigned)
        );
        def.push_str(if self.nullable { " NULL" } else { " NOT NULL" });
        match &self.default {
            Some(v) => {
                def.push_str(" DEFAULT ");
                def.push_str(&dialect.literal(v));
            }
            None if self.nullable => def.push_str(" DEFAULT NULL"),
            None => {}
        }
        def
    }

    fn clean_text(&self, name: &str, raw: &Value) -> Result<Value, Error> {
        let s = match raw {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(Error::invalid_value(
                    name,
                    format!("expected a string, got {}", other),
                ))
            }
        };
        if let Some(max) = self.length {
            let count = s.chars().count();
            if count > max as usize {
                return Err(Error::invalid_value(
                    name,
                    format!("must be at most {} characters, got {}", max, count),
                ));
            }
        }
        Ok(Value::String(s))
    }

    fn clean_integer(&self, name: &str, raw: &Value) -> Result<Value, Error> {
        let n: Number = match raw {
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    n.clone()
                } else {
                    truncate(name, n.as_f64())?
                }
            }
            Value::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Number::from(i)
                } else {
                    truncate(name, s.parse::<f64>().ok())?
                }
            }
            other => {
                return Err(Error::invalid_value(
                    name,
                    format!("expected a number, got {}", other),
                ))
            }
        };
        if self.unsigned && n.as_i64().is_some_and(|i| i < 0) {
            return Err(Error::invalid_value(name, "must not be negative"));
        }
        Ok(Value::Number(n))
    }
}

fn truncate(name: &str, f: Option<f64>) -> Result<Number, Error> {
    match f {
        Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(Number::from(f.trunc() as i64)),
        _ => Err(Error::invalid_value(name, "not a number")),
    }
}
