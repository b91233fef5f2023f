//! Schema subsystem for fieldgate
//!
//! Schemas describe document shape and carry per-field `acl` annotations.
//! They are registered once; each registration compiles the schema into an
//! immutable path access index.
//!
//! # Design Principles
//!
//! - Explicit tagged node kinds (leaf, object, array, subdocument array)
//! - Lenient annotation parsing: malformed levels fall back to defaults
//! - Registered schemas are immutable

mod errors;
mod registry;
mod types;

pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, Severity};
pub use registry::SchemaRegistry;
pub use types::{
    AclSpec, FieldDef, FieldType, NodeKind, Schema, SchemaTree, DEFAULT_VERSION_KEY, ID_FIELD,
};
