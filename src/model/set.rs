//! Materialized, ordered result of a bulk read.

use super::record::Record;
use crate::error::Error;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(records: Vec<Record>) -> Self {
        RecordSet { records }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Result<&Record, Error> {
        self.records
            .first()
            .ok_or_else(|| Error::RecordNotFound("empty record set".into()))
    }

    /// One field of every record, in order.
    pub fn column(&self, name: &str) -> Result<Vec<Value>, Error> {
        self.records.iter().map(|r| r.get(name)).collect()
    }

    pub fn map<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&Record) -> T,
    {
        self.records.iter().map(f).collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.records.iter().map(|r| Value::Object(r.to_row())).collect())
    }

    pub fn into_vec(self) -> Vec<Record> {
        self.records
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
