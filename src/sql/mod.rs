//! SQL text generation: dialects, predicates and statement rendering.

pub mod builder;
mod dialect;
mod predicate;

pub use builder::SelectStatement;
pub use dialect::*;
pub use predicate::*;
