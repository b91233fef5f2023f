//! Touched-path extraction
//!
//! Flattens a filter or an update command into the sorted, deduplicated set
//! of dotted field paths it references, for access checks. The input is
//! only borrowed and never modified.
//!
//! Rules for each key (the identifier field is always skipped):
//! - array values: every object element is flattened under the same path;
//!   an empty array or one holding non-object elements touches the path
//! - object values with an element-match or `_$do_` wrapper are flattened
//!   through the wrapper under the same path
//! - any other object carrying an operator key is one opaque touch
//! - plain objects are flattened one level deeper
//! - everything else touches the path
//!
//! Operator segments that end up inside a dotted path (`$or.title`) are
//! removed before the path is recorded.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::schema::ID_FIELD;

use super::token::{classify_update, is_drill_wrapper, is_operator_key, UpdateKey};

/// Paths referenced by a filter.
pub fn extract_paths(filter: &Value) -> Vec<String> {
    let mut collector = PathCollector::default();
    match filter {
        Value::Object(obj) => collector.filter(obj, ""),
        Value::Array(items) => {
            for item in items {
                if let Value::Object(obj) = item {
                    collector.filter(obj, "");
                }
            }
        }
        _ => {}
    }
    collector.finish()
}

/// Paths an update command writes to.
///
/// Verb keys contribute their argument under the current field context;
/// other keys extend the context.
pub fn extract_update_paths(command: &Value) -> Vec<String> {
    let mut collector = PathCollector::default();
    if let Value::Object(obj) = command {
        collector.command(obj, "");
    }
    collector.finish()
}

/// Removes operator segments from a dotted path.
pub fn sanitize_path(path: &str) -> String {
    static OPERATOR_SEGMENT: OnceLock<Regex> = OnceLock::new();
    let re = OPERATOR_SEGMENT
        .get_or_init(|| Regex::new(r"(?:^|\.)_?\$[^.]*").expect("valid operator segment regex"));
    re.replace_all(path, "").trim_start_matches('.').to_string()
}

#[derive(Default)]
struct PathCollector {
    paths: BTreeSet<String>,
}

impl PathCollector {
    fn touch(&mut self, path: &str) {
        let clean = sanitize_path(path);
        if !clean.is_empty() {
            self.paths.insert(clean);
        }
    }

    fn filter(&mut self, obj: &Map<String, Value>, context: &str) {
        for (key, value) in obj {
            if key == ID_FIELD {
                continue;
            }
            let path = join(context, key);
            match value {
                Value::Array(items) => self.array(items, &path),
                Value::Object(inner) => self.nested(inner, &path),
                _ => self.touch(&path),
            }
        }
    }

    fn array(&mut self, items: &[Value], path: &str) {
        if items.is_empty() || items.iter().any(|item| !item.is_object()) {
            self.touch(path);
        }
        for item in items {
            if let Value::Object(obj) = item {
                self.filter(obj, path);
            }
        }
    }

    fn nested(&mut self, inner: &Map<String, Value>, path: &str) {
        if inner.is_empty() {
            self.touch(path);
            return;
        }

        if let Some(wrapper) = inner.keys().find(|key| is_drill_wrapper(key)) {
            match inner.get(wrapper) {
                Some(Value::Object(drilled)) => self.filter(drilled, path),
                _ => self.touch(path),
            }
            return;
        }

        if inner.keys().any(|key| is_operator_key(key)) {
            self.touch(path);
        } else {
            self.filter(inner, path);
        }
    }

    fn command(&mut self, obj: &Map<String, Value>, context: &str) {
        for (key, value) in obj {
            match classify_update(key) {
                UpdateKey::Verb(_) | UpdateKey::UnknownVerb => match value {
                    Value::Object(arg) => self.filter(arg, context),
                    _ => self.touch(context),
                },
                UpdateKey::Where | UpdateKey::Do | UpdateKey::Index => self.touch(context),
                UpdateKey::Field if key == ID_FIELD => {}
                UpdateKey::Field => {
                    let path = join(context, key);
                    match value {
                        Value::Object(inner) => self.command(inner, &path),
                        _ => self.touch(&path),
                    }
                }
            }
        }
    }

    fn finish(self) -> Vec<String> {
        self.paths.into_iter().collect()
    }
}

fn join(context: &str, key: &str) -> String {
    if context.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", context, key)
    }
}
