//! Populate request parsing
//!
//! A populate argument names reference paths whose targets should be
//! expanded in the result, each with its own selection. Accepted shapes:
//! - absent or `null`: nothing to populate
//! - a string: one path, empty selection
//! - an object `{path, select?}`
//! - a list of the above
//!
//! Entries that match none of these shapes are skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One reference path to expand, with the selection to apply to the target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateRequest {
    pub path: String,
    #[serde(default)]
    pub select: String,
}

impl PopulateRequest {
    pub fn new(path: impl Into<String>, select: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            select: select.into(),
        }
    }

    /// Returns true if no explicit selection was requested
    pub fn has_blank_select(&self) -> bool {
        self.select.trim().is_empty()
    }
}

/// Parses a populate argument into an ordered list of requests.
pub fn parse_populate(raw: Option<&Value>) -> Vec<PopulateRequest> {
    let raw = match raw {
        Some(value) => value,
        None => return Vec::new(),
    };

    match raw {
        Value::Array(items) => items.iter().filter_map(parse_entry).collect(),
        other => parse_entry(other).into_iter().collect(),
    }
}

fn parse_entry(value: &Value) -> Option<PopulateRequest> {
    match value {
        Value::String(path) if !path.trim().is_empty() => {
            Some(PopulateRequest::new(path.trim(), ""))
        }
        Value::Object(obj) => {
            let path = obj.get("path")?.as_str()?.trim();
            if path.is_empty() {
                return None;
            }
            let select = match obj.get("select") {
                Some(Value::String(select)) => select.clone(),
                _ => String::new(),
            };
            Some(PopulateRequest::new(path, select))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_populate_is_empty() {
        assert!(parse_populate(None).is_empty());
        assert!(parse_populate(Some(&Value::Null)).is_empty());
    }

    #[test]
    fn test_string_populate() {
        let parsed = parse_populate(Some(&json!("author")));
        assert_eq!(parsed, vec![PopulateRequest::new("author", "")]);
        assert!(parsed[0].has_blank_select());
    }

    #[test]
    fn test_object_and_list_populate() {
        let parsed = parse_populate(Some(&json!({"path": "author", "select": "name"})));
        assert_eq!(parsed, vec![PopulateRequest::new("author", "name")]);

        let parsed = parse_populate(Some(&json!([
            {"path": "author", "select": "name email"},
            "editor",
            {"select": "orphan"},
            42
        ])));
        assert_eq!(
            parsed,
            vec![
                PopulateRequest::new("author", "name email"),
                PopulateRequest::new("editor", ""),
            ]
        );
    }
}
