//! Portable query vocabulary
//!
//! Filters arrive with transport-safe `_$` tokens. This module classifies
//! those tokens, rewrites them into the native `$` vocabulary, and flattens
//! filters and update commands into the field paths they touch.
//!
//! ```ignore
//! use fieldgate::query::{extract_paths, translate};
//! use serde_json::json;
//!
//! let native = translate(&json!({"age": {"_$gte": 18}}));
//! assert_eq!(extract_paths(&native), vec!["age"]);
//! ```

mod extractor;
mod populate;
pub mod token;
mod translator;

pub use extractor::{extract_paths, extract_update_paths, sanitize_path};
pub use populate::{parse_populate, PopulateRequest};
pub use translator::{coerce_date, translate, translate_with_stats, QueryComplexity};
