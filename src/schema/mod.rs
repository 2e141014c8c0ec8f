//! Content type schemas
//!
//! Typed field definitions and the registry that resolves a doc or widget
//! type name to its ordered schema.

mod field;
mod registry;

pub use field::{FieldDef, FieldKind};
pub use registry::SchemaRegistry;
