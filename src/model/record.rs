//! Schema-bound rows with dirty tracking and active-record persistence.

use super::field::FieldKind;
use super::schema::Schema;
use super::set::RecordSet;
use crate::config::DeleteMode;
use crate::db::Db;
use crate::error::Error;
use crate::query::QueryBuilder;
use crate::sql::{Operator, Predicate};
use crate::Row;
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::sync::Arc;

/// Which rows of a soft-deleting schema a bulk read returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scope {
    /// Rows whose `deleted_at` is null.
    #[default]
    Active,
    /// Only soft-deleted rows.
    Deleted,
    /// No filter on `deleted_at`.
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordState {
    /// Never saved.
    Transient,
    /// Stored and unchanged since the last load or save.
    Persisted,
    /// Stored, with assignments not yet saved.
    Dirty,
    /// Stored with `deleted_at` set.
    SoftDeleted,
    /// Row deleted. Saving again fails.
    HardDeleted,
}

#[derive(Clone, Debug)]
pub struct Record {
    schema: Arc<Schema>,
    id: Option<i64>,
    values: Row,
    /// Assigned since construction, load or the last save, in assignment order.
    dirty: Vec<String>,
    removed: bool,
}

fn now() -> Value {
    Value::from(chrono::Utc::now().timestamp())
}

impl Record {
    /// A transient record with its auto-filled fields generated.
    pub fn new(schema: &Arc<Schema>) -> Self {
        let values = schema
            .fields()
            .filter_map(|(name, field)| field.fill().map(|v| (name.to_string(), v)))
            .collect();
        Record {
            schema: schema.clone(),
            id: None,
            values,
            dirty: Vec::new(),
            removed: false,
        }
    }

    /// A persisted record from a fetched row. Every field is re-validated; a missing
    /// column falls back to its default, then to null when nullable.
    pub fn from_row(schema: &Arc<Schema>, row: &Row) -> Result<Self, Error> {
        let id = match row.get("id") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        let Some(id) = id else {
            return Err(Error::UndefinedValue(format!("{}.id", schema.table())));
        };
        let mut values = Row::new();
        for (name, field) in schema.fields() {
            let value = match row.get(name) {
                Some(Value::Null) if field.is_nullable() => Value::Null,
                Some(v) if !v.is_null() => field.validate(name, v)?,
                _ => match field.get_default() {
                    Some(d) => d.clone(),
                    None if field.is_nullable() => Value::Null,
                    None => return Err(Error::UndefinedValue(name.to_string())),
                },
            };
            values.insert(name.to_string(), value);
        }
        Ok(Record {
            schema: schema.clone(),
            id: Some(id),
            values,
            dirty: Vec::new(),
            removed: false,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn state(&self) -> RecordState {
        if self.removed {
            return RecordState::HardDeleted;
        }
        if self.id.is_none() {
            return RecordState::Transient;
        }
        let deleted = self
            .schema
            .field_of_kind(FieldKind::DeletedAt)
            .and_then(|name| self.values.get(name))
            .is_some_and(|v| !v.is_null());
        if deleted {
            RecordState::SoftDeleted
        } else if self.is_dirty() {
            RecordState::Dirty
        } else {
            RecordState::Persisted
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_fields(&self) -> &[String] {
        &self.dirty
    }

    /// Current value, else the field default, else null. `id` is readable too.
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        if name == "id" {
            return Ok(self.id.map(Value::from).unwrap_or(Value::Null));
        }
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| Error::FieldNotFound(format!("{}.{}", self.schema.table(), name)))?;
        Ok(self
            .values
            .get(name)
            .or(field.get_default())
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, Error> {
        serde_json::from_value(self.get(name)?).map_err(|e| Error::invalid_value(name, e.to_string()))
    }

    /// Validate and assign. A value equal to the current one leaves the record clean.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        let field = match self.schema.field(name) {
            Some(f) => f,
            None if name == "id" => return Err(Error::ReadOnlyField(name.to_string())),
            None => {
                return Err(Error::FieldNotFound(format!("{}.{}", self.schema.table(), name)))
            }
        };
        if field.is_system_managed() {
            return Err(Error::ReadOnlyField(name.to_string()));
        }
        let clean = field.validate(name, &value.into())?;
        if self.get(name)? == clean {
            return Ok(());
        }
        self.values.insert(name.to_string(), clean);
        self.mark(name);
        Ok(())
    }

    fn mark(&mut self, name: &str) {
        if !self.dirty.iter().any(|d| d == name) {
            self.dirty.push(name.to_string());
        }
    }

    fn stamp(&mut self, kind: FieldKind, mark_dirty: bool) {
        if let Some(name) = self.schema.field_of_kind(kind).map(str::to_string) {
            self.values.insert(name.clone(), now());
            if mark_dirty {
                self.mark(&name);
            }
        }
    }

    /// Insert a transient record or write the dirty fields of a persisted one.
    pub async fn save(&mut self, db: &mut Db) -> Result<(), Error> {
        if self.removed {
            return Err(Error::RecordRemoved(self.schema.table().to_string()));
        }
        match self.id {
            None => self.insert(db).await,
            Some(id) => self.update(db, id).await,
        }
    }

    async fn insert(&mut self, db: &mut Db) -> Result<(), Error> {
        self.stamp(FieldKind::CreatedAt, false);
        self.stamp(FieldKind::UpdatedAt, false);
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (name, field) in self.schema.fields() {
            let value = match self.values.get(name) {
                Some(v) => v.clone(),
                None => match field.get_default() {
                    Some(d) => d.clone(),
                    None if field.is_nullable() => Value::Null,
                    None => return Err(Error::UndefinedValue(name.to_string())),
                },
            };
            columns.push(name.to_string());
            values.push(value);
        }
        let id = db.insert(self.schema.table(), &columns, &values).await?;
        for (name, value) in columns.into_iter().zip(values) {
            self.values.insert(name, value);
        }
        self.id = Some(id);
        self.dirty.clear();
        Ok(())
    }

    async fn update(&mut self, db: &mut Db, id: i64) -> Result<(), Error> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        self.stamp(FieldKind::UpdatedAt, true);
        let data: Row = self
            .dirty
            .iter()
            .map(|name| (name.clone(), self.values.get(name).cloned().unwrap_or(Value::Null)))
            .collect();
        db.update(self.schema.table(), &data, &Predicate::equal("id", id))
            .await?;
        self.dirty.clear();
        Ok(())
    }

    /// Soft-delete by stamping `deleted_at`, or remove the row, per the handle's
    /// [`DeleteMode`]. Schemas without `deleted_at` are always removed.
    pub async fn delete(&mut self, db: &mut Db) -> Result<(), Error> {
        if self.removed {
            return Err(Error::RecordRemoved(self.schema.table().to_string()));
        }
        let Some(id) = self.id else {
            return Err(Error::RecordNotFound(format!(
                "{}: record was never saved",
                self.schema.table()
            )));
        };
        let soft = self.schema.field_of_kind(FieldKind::DeletedAt).map(str::to_string);
        match (db.delete_mode(), soft) {
            (DeleteMode::Soft, Some(deleted_at)) => {
                if self.values.get(&deleted_at).map_or(true, Value::is_null) {
                    self.values.insert(deleted_at.clone(), now());
                    self.mark(&deleted_at);
                }
                self.save(db).await
            }
            _ => {
                db.delete(self.schema.table(), &Predicate::equal("id", id))
                    .await?;
                self.removed = true;
                self.dirty.clear();
                Ok(())
            }
        }
    }

    /// Builder over the schema's table selecting every field plus `id`.
    pub fn query(schema: &Schema) -> QueryBuilder {
        QueryBuilder::table(schema.table()).columns(schema.columns())
    }

    /// `predicate` restricted by `scope` when the schema soft-deletes.
    pub fn scoped(schema: &Schema, predicate: Option<Predicate>, scope: Scope) -> Option<Predicate> {
        let deleted_at = match (scope, schema.field_of_kind(FieldKind::DeletedAt)) {
            (Scope::All, _) | (_, None) => return predicate,
            (_, Some(name)) => name,
        };
        let op = match scope {
            Scope::Deleted => Operator::IsNot,
            _ => Operator::Is,
        };
        let base = match predicate {
            Some(p) => Predicate::and().nest(p),
            None => Predicate::and(),
        };
        Some(base.set(deleted_at, op, Value::Null))
    }

    /// Active record by id.
    pub async fn find(db: &mut Db, schema: &Arc<Schema>, id: i64) -> Result<Record, Error> {
        let predicate = Self::scoped(schema, Some(Predicate::equal("id", id)), Scope::Active);
        let mut query = Self::query(schema);
        if let Some(p) = predicate {
            query = query.filter(p);
        }
        match query.get(db).await? {
            Some(row) => Record::from_row(schema, &row),
            None => Err(Error::RecordNotFound(format!("{} #{}", schema.table(), id))),
        }
    }

    pub async fn select(
        db: &mut Db,
        schema: &Arc<Schema>,
        predicate: Option<Predicate>,
        scope: Scope,
    ) -> Result<RecordSet, Error> {
        let mut query = Self::query(schema);
        if let Some(p) = Self::scoped(schema, predicate, scope) {
            query = query.filter(p);
        }
        let rows = query.select(db).await?;
        let records = rows
            .iter()
            .map(|row| Record::from_row(schema, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RecordSet::new(records))
    }

    /// `id` plus every field value, as returned by [`Record::get`].
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), self.id.map(Value::from).unwrap_or(Value::Null));
        for (name, field) in self.schema.fields() {
            let value = self
                .values
                .get(name)
                .or(field.get_default())
                .cloned()
                .unwrap_or(Value::Null);
            row.insert(name.to_string(), value);
        }
        row
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let row = self.to_row();
        let mut map = serializer.serialize_map(Some(row.len()))?;
        for (k, v) in &row {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
