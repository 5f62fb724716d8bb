//! Table schemas: an ordered set of named fields, built and checked once, then shared.

use super::field::{Field, FieldKind};
use crate::db::Db;
use crate::error::{ConfigError, Error};
use crate::sql::builder::DEFAULT_FIELD_NAMES;
use std::collections::HashMap;
use std::sync::Arc;

/// The timestamp columns added in default-fields mode, in creation order.
pub fn default_fields() -> Vec<(&'static str, Field)> {
    let [created, updated, deleted] = DEFAULT_FIELD_NAMES;
    vec![
        (created, Field::created_at()),
        (updated, Field::updated_at()),
        (deleted, Field::deleted_at()),
    ]
}

#[derive(Debug)]
pub struct Schema {
    table: String,
    /// Default fields first when enabled, then declared fields in order.
    fields: Vec<(String, Field)>,
    default_fields: bool,
}

impl Schema {
    pub fn builder(table: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            table: table.into(),
            fields: Vec::new(),
            default_fields: true,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn has_default_fields(&self) -> bool {
        self.default_fields
    }

    /// Name of the first field of `kind`, if any.
    pub fn field_of_kind(&self, kind: FieldKind) -> Option<&str> {
        self.fields
            .iter()
            .find(|(_, f)| f.kind() == kind)
            .map(|(n, _)| n.as_str())
    }

    /// `id` followed by every field name.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once("id".to_string())
            .chain(self.fields.iter().map(|(n, _)| n.clone()))
            .collect()
    }

    /// Create the backing table with an `id` primary key.
    pub async fn create_table(&self, db: &mut Db) -> Result<(), Error> {
        let declared = self
            .fields
            .iter()
            .filter(|(n, _)| !self.default_fields || !DEFAULT_FIELD_NAMES.contains(&n.as_str()))
            .map(|(n, f)| (n.as_str(), f));
        db.create_table(&self.table, declared, self.default_fields, true)
            .await
    }
}

pub struct SchemaBuilder {
    table: String,
    fields: Vec<(String, Field)>,
    default_fields: bool,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    /// Leave out `created_at_timestamp`, `updated_at_timestamp` and `deleted_at`.
    pub fn without_default_fields(mut self) -> Self {
        self.default_fields = false;
        self
    }

    pub fn build(self) -> Result<Schema, ConfigError> {
        let mut fields: Vec<(String, Field)> = Vec::with_capacity(self.fields.len() + 3);
        if self.default_fields {
            fields.extend(default_fields().into_iter().map(|(n, f)| (n.to_string(), f)));
        }
        for (name, field) in self.fields {
            if name == "id" || fields.iter().any(|(n, _)| *n == name) {
                return Err(ConfigError::DuplicateField {
                    table: self.table,
                    field: name,
                });
            }
            if let Err(reason) = field.check() {
                return Err(ConfigError::InvalidField {
                    table: self.table,
                    field: name,
                    reason,
                });
            }
            fields.push((name, field));
        }
        Ok(Schema {
            table: self.table,
            fields,
            default_fields: self.default_fields,
        })
    }
}

/// Schemas by table name, populated at startup.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, builder: SchemaBuilder) -> Result<Arc<Schema>, ConfigError> {
        let schema = builder.build()?;
        if self.schemas.contains_key(schema.table()) {
            return Err(ConfigError::DuplicateSchema(schema.table().to_string()));
        }
        let schema = Arc::new(schema);
        self.schemas.insert(schema.table().to_string(), schema.clone());
        Ok(schema)
    }

    pub fn get(&self, table: &str) -> Option<Arc<Schema>> {
        self.schemas.get(table).cloned()
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}
