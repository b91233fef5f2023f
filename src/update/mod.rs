//! Update command interpreter
//!
//! Applies a portable update command (`_$set`, `_$inc`, `_$push`, `_$pull`,
//! `_$addToSet`) to an in-memory document. Runs only after the access
//! validator has approved the command's paths.

mod errors;
mod interpreter;

pub use errors::{UpdateError, UpdateResult};
pub use interpreter::{apply_update, UpdateInterpreter};
