//! Field descriptors, schemas and the active-record layer built on them.

mod field;
mod record;
mod schema;
mod set;

pub use field::{Field, FieldKind};
pub use record::{Record, RecordState, Scope};
pub use schema::{default_fields, Schema, SchemaBuilder, SchemaRegistry};
pub use set::RecordSet;
