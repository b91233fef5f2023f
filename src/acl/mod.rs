//! Field-level access control
//!
//! - `compiler`: schema tree to [`PathAccessIndex`], once per schema
//! - `index`: the immutable compiled index and its lookups
//! - `validator`: boolean checks for paths, selections and populates
//!
//! Access levels cascade downward: holding level N grants everything
//! granted at 0..=N for the same action.

mod compiler;
mod index;
mod validator;

pub use compiler::{compile, AccessDefaults, AclCompiler};
pub use index::{AccessLevel, Action, ActionGrants, PathAccessIndex};
pub use validator::{included_paths, AccessValidator};
