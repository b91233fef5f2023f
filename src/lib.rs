//! fieldgate - field-level access control for document stores
//!
//! Schemas annotate each field with the access level needed to create,
//! read, update or delete it. A schema compiles into a path access index;
//! requests written in the portable `_$` vocabulary are translated, their
//! touched paths extracted and checked against that index, and updates are
//! interpreted in place.

pub mod acl;
pub mod cli;
pub mod gate;
pub mod observability;
pub mod query;
pub mod schema;
pub mod update;
