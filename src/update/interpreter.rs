//! Portable update command interpreter
//!
//! Walks the command alongside the document. Verb keys apply their argument
//! to the document node at the current depth; any other key names a field
//! and the walk descends into it (missing fields are created as empty
//! objects). Verbs run depth first, in key order, with no atomicity
//! between them.
//!
//! Addressed arguments select one element of an array of subdocuments:
//! - `{_$where_: {field: value}, _$do_: payload}` picks the FIRST element
//!   whose fields equal the predicate
//! - `{_$index_: n, _$do_: payload}` picks position `n` (increment only)
//!
//! A predicate or index that selects nothing leaves the document untouched.

use serde_json::{Map, Number, Value};

use crate::observability::{Event, Logger};
use crate::query::token::{classify_update, UpdateKey, UpdateVerb, DO_KEY, INDEX_KEY, WHERE_KEY};
use crate::schema::{DEFAULT_VERSION_KEY, ID_FIELD};

use super::errors::{UpdateError, UpdateResult};

/// Applies `command` to `doc` in place.
pub fn apply_update(doc: &mut Value, command: &Value, version_key: &str) -> UpdateResult<()> {
    UpdateInterpreter::new(version_key).apply(doc, command)
}

/// Update interpreter bound to a schema's version counter field
#[derive(Debug, Clone)]
pub struct UpdateInterpreter {
    version_key: String,
}

impl Default for UpdateInterpreter {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION_KEY)
    }
}

/// Predicate-addressed argument
struct Addressed<'c> {
    predicate: &'c Map<String, Value>,
    payload: Option<&'c Value>,
}

impl UpdateInterpreter {
    pub fn new(version_key: impl Into<String>) -> Self {
        Self {
            version_key: version_key.into(),
        }
    }

    /// Applies `command` to `doc` in place.
    ///
    /// Fails with a malformed-command error if the command is not an object,
    /// contains no verb at any depth, or misuses addressing. A command
    /// without a verb is rejected before the document is touched; changes
    /// made before any other failure are not rolled back.
    pub fn apply(&self, doc: &mut Value, command: &Value) -> UpdateResult<()> {
        let command = command.as_object().ok_or(UpdateError::NotAnObject)?;
        if !contains_verb(command) {
            return Err(UpdateError::NoVerb);
        }

        let mut verbs = 0usize;
        self.walk(doc, command, "", &mut verbs)?;

        let verbs = verbs.to_string();
        Logger::trace(Event::UpdateApplied, &[("verbs", verbs.as_str())]);
        Ok(())
    }

    fn walk(
        &self,
        doc: &mut Value,
        command: &Map<String, Value>,
        path: &str,
        verbs: &mut usize,
    ) -> UpdateResult<()> {
        for (key, arg) in command {
            match classify_update(key) {
                UpdateKey::Verb(verb) => {
                    *verbs += 1;
                    self.dispatch(verb, doc, arg, path)?;
                }
                // Unknown verbs are skipped but still count as a verb
                UpdateKey::UnknownVerb => *verbs += 1,
                UpdateKey::Where | UpdateKey::Do | UpdateKey::Index => {
                    return Err(UpdateError::MisplacedAddress(path.to_string()));
                }
                UpdateKey::Field => {
                    let field_path = join(path, key);
                    let nested = match arg {
                        Value::Object(nested) => nested,
                        _ => return Err(UpdateError::NotTraversable(field_path)),
                    };
                    let obj = doc
                        .as_object_mut()
                        .ok_or_else(|| UpdateError::NotTraversable(path.to_string()))?;
                    let child = obj
                        .entry(key.clone())
                        .or_insert_with(|| Value::Object(Map::new()));
                    self.walk(child, nested, &field_path, verbs)?;
                }
            }
        }
        Ok(())
    }

    fn dispatch(&self, verb: UpdateVerb, doc: &mut Value, arg: &Value, path: &str) -> UpdateResult<()> {
        let arg = arg
            .as_object()
            .ok_or_else(|| UpdateError::invalid(verb.native(), path, "expected an object"))?;
        match verb {
            UpdateVerb::Set => self.set(doc, arg, path),
            UpdateVerb::Inc => self.inc(doc, arg, path),
            UpdateVerb::Push => self.append(doc, arg, path, false),
            UpdateVerb::Pull => self.pull(doc, arg, path),
            UpdateVerb::AddToSet => self.append(doc, arg, path, true),
        }
    }

    // ---- $set ----

    fn set(&self, doc: &mut Value, arg: &Map<String, Value>, path: &str) -> UpdateResult<()> {
        let obj = target_object(doc, path)?;

        for (key, value) in arg {
            if self.is_protected(key) {
                continue;
            }
            let field_path = join(path, key);

            match addressed(value, &field_path)? {
                Some(addr) => {
                    let payload = match addr.payload {
                        Some(Value::Object(payload)) => payload,
                        _ => {
                            return Err(UpdateError::invalid(
                                "$set",
                                &field_path,
                                "_$do_ must be an object",
                            ))
                        }
                    };
                    if let Some(element) = first_match(obj.get_mut(key), addr.predicate) {
                        let stripped = self.strip_protected(payload);
                        merge(element, &Value::Object(stripped));
                    }
                }
                None => match obj.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        obj.insert(key.clone(), value.clone());
                    }
                },
            }
        }
        Ok(())
    }

    fn is_protected(&self, key: &str) -> bool {
        key == ID_FIELD || key == self.version_key
    }

    fn strip_protected(&self, payload: &Map<String, Value>) -> Map<String, Value> {
        payload
            .iter()
            .filter(|(key, _)| !self.is_protected(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    // ---- $inc ----

    fn inc(&self, doc: &mut Value, arg: &Map<String, Value>, path: &str) -> UpdateResult<()> {
        let obj = target_object(doc, path)?;

        for (key, delta) in arg {
            let field_path = join(path, key);
            match delta {
                Value::Number(n) => {
                    let current = obj.entry(key.clone()).or_insert(Value::from(0));
                    *current = add(current, n, &field_path)?;
                }
                Value::Object(inner) => {
                    let has_where = inner.contains_key(WHERE_KEY);
                    let has_index = inner.contains_key(INDEX_KEY);

                    if has_where && has_index {
                        return Err(UpdateError::MixedAddressing(field_path));
                    }
                    if has_index {
                        self.inc_at_index(obj.get_mut(key), inner, &field_path)?;
                    } else if let Some(addr) = addressed(delta, &field_path)? {
                        let payload = match addr.payload {
                            Some(Value::Object(payload)) => payload,
                            _ => {
                                return Err(UpdateError::invalid(
                                    "$inc",
                                    &field_path,
                                    "_$do_ must be an object",
                                ))
                            }
                        };
                        if let Some(element) = first_match(obj.get_mut(key), addr.predicate) {
                            self.inc(element, payload, &field_path)?;
                        }
                    } else if inner.contains_key(DO_KEY) {
                        return Err(UpdateError::MissingAddress(field_path));
                    } else {
                        let child = obj
                            .entry(key.clone())
                            .or_insert_with(|| Value::Object(Map::new()));
                        self.inc(child, inner, &field_path)?;
                    }
                }
                _ => {
                    return Err(UpdateError::invalid(
                        "$inc",
                        &field_path,
                        "delta must be a number or an object",
                    ))
                }
            }
        }
        Ok(())
    }

    fn inc_at_index(
        &self,
        target: Option<&mut Value>,
        inner: &Map<String, Value>,
        path: &str,
    ) -> UpdateResult<()> {
        let position = inner
            .get(INDEX_KEY)
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| UpdateError::invalid("$inc", path, "_$index_ must be a non-negative integer"))?;
        let payload = inner
            .get(DO_KEY)
            .ok_or_else(|| UpdateError::invalid("$inc", path, "_$index_ requires _$do_"))?;

        let element = match target {
            Some(Value::Array(items)) => match items.get_mut(position) {
                Some(element) => element,
                None => return Ok(()),
            },
            _ => return Ok(()),
        };

        match payload {
            Value::Number(n) => {
                *element = add(element, n, path)?;
                Ok(())
            }
            Value::Object(fields) => self.inc(element, fields, path),
            _ => Err(UpdateError::invalid(
                "$inc",
                path,
                "_$do_ must be a number or an object",
            )),
        }
    }

    // ---- $push / $addToSet ----

    fn append(
        &self,
        doc: &mut Value,
        arg: &Map<String, Value>,
        path: &str,
        unique: bool,
    ) -> UpdateResult<()> {
        let verb = if unique { "$addToSet" } else { "$push" };
        let obj = target_object(doc, path)?;

        for (key, value) in arg {
            let field_path = join(path, key);
            match obj.get_mut(key) {
                Some(Value::Array(items)) => match addressed(value, &field_path)? {
                    Some(addr) => {
                        let payload = match addr.payload {
                            Some(Value::Object(payload)) => payload,
                            _ => {
                                return Err(UpdateError::invalid(
                                    verb,
                                    &field_path,
                                    "_$do_ must be an object",
                                ))
                            }
                        };
                        if let Some(element) = items.iter_mut().find(|e| matches(e, addr.predicate)) {
                            self.append(element, payload, &field_path, unique)?;
                        }
                    }
                    None => extend(items, value, unique),
                },
                Some(existing) => {
                    let nested = value.as_object().ok_or_else(|| {
                        UpdateError::invalid(verb, &field_path, "target is not an array")
                    })?;
                    self.append(existing, nested, &field_path, unique)?;
                }
                None => match value {
                    Value::Object(nested) => {
                        let mut child = Value::Object(Map::new());
                        self.append(&mut child, nested, &field_path, unique)?;
                        obj.insert(key.clone(), child);
                    }
                    other => {
                        let mut items = Vec::new();
                        extend(&mut items, other, unique);
                        obj.insert(key.clone(), Value::Array(items));
                    }
                },
            }
        }
        Ok(())
    }

    // ---- $pull ----

    fn pull(&self, doc: &mut Value, arg: &Map<String, Value>, path: &str) -> UpdateResult<()> {
        let obj = target_object(doc, path)?;

        for (key, value) in arg {
            let field_path = join(path, key);
            match obj.get_mut(key) {
                Some(Value::Array(items)) => match addressed(value, &field_path)? {
                    Some(addr) => {
                        let position = items.iter().position(|e| matches(e, addr.predicate));
                        match (position, addr.payload) {
                            (Some(i), None) => {
                                items.remove(i);
                            }
                            (Some(i), Some(Value::Object(payload))) => {
                                self.pull(&mut items[i], payload, &field_path)?;
                            }
                            (Some(_), Some(_)) => {
                                return Err(UpdateError::invalid(
                                    "$pull",
                                    &field_path,
                                    "_$do_ must be an object",
                                ))
                            }
                            (None, _) => {}
                        }
                    }
                    None => {
                        let removed = as_values(value);
                        items.retain(|item| !removed.contains(&item));
                    }
                },
                Some(existing) => {
                    let nested = value.as_object().ok_or_else(|| {
                        UpdateError::invalid("$pull", &field_path, "target is not an array")
                    })?;
                    self.pull(existing, nested, &field_path)?;
                }
                None => {}
            }
        }
        Ok(())
    }
}

fn target_object<'d>(doc: &'d mut Value, path: &str) -> UpdateResult<&'d mut Map<String, Value>> {
    doc.as_object_mut()
        .ok_or_else(|| UpdateError::NotTraversable(path.to_string()))
}

/// Returns the addressing parts if `value` is a predicate-addressed argument.
fn addressed<'c>(value: &'c Value, path: &str) -> UpdateResult<Option<Addressed<'c>>> {
    let obj = match value {
        Value::Object(obj) => obj,
        _ => return Ok(None),
    };
    match obj.get(WHERE_KEY) {
        None => Ok(None),
        Some(Value::Object(predicate)) => Ok(Some(Addressed {
            predicate,
            payload: obj.get(DO_KEY),
        })),
        Some(_) => Err(UpdateError::invalid(
            "addressed",
            path,
            "_$where_ must be an object",
        )),
    }
}

/// First array element whose fields equal the predicate
fn first_match<'d>(
    target: Option<&'d mut Value>,
    predicate: &Map<String, Value>,
) -> Option<&'d mut Value> {
    match target {
        Some(Value::Array(items)) => items.iter_mut().find(|e| matches(e, predicate)),
        _ => None,
    }
}

/// Field-equality match; predicate keys may be dotted paths.
fn matches(element: &Value, predicate: &Map<String, Value>) -> bool {
    predicate
        .iter()
        .all(|(key, expected)| lookup(element, key) == Some(expected))
}

fn lookup<'d>(value: &'d Value, dotted: &str) -> Option<&'d Value> {
    dotted
        .split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

/// Deep merge: objects merge key by key, anything else replaces.
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn as_values(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(values) => values.iter().collect(),
        other => vec![other],
    }
}

fn extend(items: &mut Vec<Value>, value: &Value, unique: bool) {
    for item in as_values(value) {
        if !unique || !items.contains(item) {
            items.push(item.clone());
        }
    }
}

/// Adds a numeric delta. Integers stay integers unless the sum overflows.
fn add(current: &Value, delta: &Number, path: &str) -> UpdateResult<Value> {
    let current = match current {
        Value::Number(n) => n,
        _ => return Err(UpdateError::NotNumeric(path.to_string())),
    };

    if let (Some(a), Some(b)) = (current.as_i64(), delta.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Ok(Value::from(sum));
        }
    }

    let sum = current.as_f64().unwrap_or(0.0) + delta.as_f64().unwrap_or(0.0);
    Number::from_f64(sum)
        .map(Value::Number)
        .ok_or_else(|| UpdateError::NotNumeric(path.to_string()))
}

/// Returns true if a verb key appears at any depth of field nesting.
fn contains_verb(command: &Map<String, Value>) -> bool {
    command.iter().any(|(key, arg)| match classify_update(key) {
        UpdateKey::Verb(_) | UpdateKey::UnknownVerb => true,
        UpdateKey::Field => arg.as_object().is_some_and(contains_verb),
        UpdateKey::Where | UpdateKey::Do | UpdateKey::Index => false,
    })
}

fn join(context: &str, key: &str) -> String {
    if context.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", context, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(mut doc: Value, command: Value) -> Value {
        apply_update(&mut doc, &command, "__v").unwrap();
        doc
    }

    #[test]
    fn test_set_merges_and_strips_reserved() {
        let doc = run(
            json!({"_id": 1, "__v": 0, "title": "a", "meta": {"views": 1, "likes": 2}}),
            json!({"_$set": {"_id": 9, "__v": 5, "title": "b", "meta": {"views": 7}}}),
        );
        assert_eq!(doc, json!({"_id": 1, "__v": 0, "title": "b", "meta": {"views": 7, "likes": 2}}));
    }

    #[test]
    fn test_set_replaces_arrays() {
        let doc = run(json!({"tags": [1, 2]}), json!({"_$set": {"tags": [3]}}));
        assert_eq!(doc, json!({"tags": [3]}));
    }

    #[test]
    fn test_set_with_predicate_updates_first_match() {
        let doc = run(
            json!({"docs": [{"k": 1, "v": "a"}, {"k": 1, "v": "b"}]}),
            json!({"_$set": {"docs": {"_$where_": {"k": 1}, "_$do_": {"v": "z", "_id": 3}}}}),
        );
        assert_eq!(doc, json!({"docs": [{"k": 1, "v": "z"}, {"k": 1, "v": "b"}]}));
    }

    #[test]
    fn test_nested_command_descends() {
        let doc = run(
            json!({"profile": {"name": "x"}}),
            json!({"profile": {"_$set": {"name": "y"}}, "stats": {"_$inc": {"n": 2}}}),
        );
        assert_eq!(doc, json!({"profile": {"name": "y"}, "stats": {"n": 2}}));
    }

    #[test]
    fn test_inc_numeric_kinds() {
        let doc = run(
            json!({"a": 1, "b": 1.5, "c": {"d": 2}}),
            json!({"_$inc": {"a": 2, "b": 1, "c": {"d": -3}, "e": 4}}),
        );
        assert_eq!(doc, json!({"a": 3, "b": 2.5, "c": {"d": -1}, "e": 4}));
    }

    #[test]
    fn test_inc_overflow_falls_back_to_float() {
        let doc = run(json!({"a": i64::MAX}), json!({"_$inc": {"a": 1}}));
        assert!(doc["a"].is_f64());
    }

    #[test]
    fn test_inc_with_index() {
        let doc = run(
            json!({"counts": [1, 2, 3], "docs": [{"n": 1}, {"n": 2}]}),
            json!({"_$inc": {
                "counts": {"_$index_": 1, "_$do_": 10},
                "docs": {"_$index_": 1, "_$do_": {"n": 5}}
            }}),
        );
        assert_eq!(doc, json!({"counts": [1, 12, 3], "docs": [{"n": 1}, {"n": 7}]}));
    }

    #[test]
    fn test_inc_index_out_of_range_is_noop() {
        let doc = run(json!({"counts": [1]}), json!({"_$inc": {"counts": {"_$index_": 4, "_$do_": 1}}}));
        assert_eq!(doc, json!({"counts": [1]}));
    }

    #[test]
    fn test_inc_mixed_addressing_is_fatal() {
        let mut doc = json!({"docs": [{"k": 1, "n": 1}]});
        let err = apply_update(
            &mut doc,
            &json!({"_$inc": {"docs": {"_$where_": {"k": 1}, "_$index_": 0, "_$do_": {"n": 1}}}}),
            "__v",
        )
        .unwrap_err();
        assert_eq!(err, UpdateError::MixedAddressing("docs".into()));
    }

    #[test]
    fn test_inc_payload_without_address() {
        let mut doc = json!({"docs": []});
        let err = apply_update(&mut doc, &json!({"_$inc": {"docs": {"_$do_": {"n": 1}}}}), "__v")
            .unwrap_err();
        assert_eq!(err, UpdateError::MissingAddress("docs".into()));
    }

    #[test]
    fn test_inc_non_numeric_target() {
        let mut doc = json!({"title": "x"});
        let err = apply_update(&mut doc, &json!({"_$inc": {"title": 1}}), "__v").unwrap_err();
        assert_eq!(err, UpdateError::NotNumeric("title".into()));
    }

    #[test]
    fn test_push_batch_and_nested() {
        let doc = run(
            json!({"list": [1], "docs": [{"k": "a", "tags": []}, {"k": "b", "tags": []}]}),
            json!({"_$push": {
                "list": [2, 3, 4],
                "docs": {"_$where_": {"k": "b"}, "_$do_": {"tags": ["x", "y"]}},
                "fresh": [1]
            }}),
        );
        assert_eq!(
            doc,
            json!({
                "list": [1, 2, 3, 4],
                "docs": [{"k": "a", "tags": []}, {"k": "b", "tags": ["x", "y"]}],
                "fresh": [1]
            })
        );
    }

    #[test]
    fn test_push_single_value() {
        let doc = run(json!({"list": [1]}), json!({"$push": {"list": 2}}));
        assert_eq!(doc, json!({"list": [1, 2]}));
    }

    #[test]
    fn test_push_into_nested_object() {
        let doc = run(json!({"meta": {"tags": ["a"]}}), json!({"_$push": {"meta": {"tags": ["b"]}}}));
        assert_eq!(doc, json!({"meta": {"tags": ["a", "b"]}}));
    }

    #[test]
    fn test_add_to_set_dedupes() {
        let doc = run(json!({"set": [2]}), json!({"_$addToSet": {"set": [1, 1, 2, 3]}}));
        assert_eq!(doc, json!({"set": [2, 1, 3]}));
    }

    #[test]
    fn test_pull_values_and_predicates() {
        let doc = run(
            json!({"list": [1, 2, 1, 3], "docs": [{"k": 1}, {"k": 2}, {"k": 1}]}),
            json!({"_$pull": {"list": [1, 3], "docs": {"_$where_": {"k": 1}}}}),
        );
        assert_eq!(doc, json!({"list": [2], "docs": [{"k": 2}, {"k": 1}]}));
    }

    #[test]
    fn test_pull_inside_matched_element() {
        let doc = run(
            json!({"docs": [{"k": 1, "tags": ["a", "b"]}]}),
            json!({"_$pull": {"docs": {"_$where_": {"k": 1}, "_$do_": {"tags": ["a"]}}}}),
        );
        assert_eq!(doc, json!({"docs": [{"k": 1, "tags": ["b"]}]}));
    }

    #[test]
    fn test_no_match_is_silent() {
        let before = json!({"docs": [{"k": 1, "n": 1}]});
        let doc = run(
            before.clone(),
            json!({"_$inc": {"docs": {"_$where_": {"k": 9}, "_$do_": {"n": 1}}}}),
        );
        assert_eq!(doc, before);
    }

    #[test]
    fn test_unknown_verb_is_ignored() {
        let doc = run(json!({"a": 1}), json!({"_$rename": {"a": "b"}}));
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_malformed_commands() {
        let mut empty = json!({});
        assert_eq!(
            apply_update(&mut empty, &json!({"a": {"b": {}}}), "__v").unwrap_err(),
            UpdateError::NoVerb
        );

        let mut doc = json!({"a": 1});
        assert_eq!(
            apply_update(&mut doc, &json!([1]), "__v").unwrap_err(),
            UpdateError::NotAnObject
        );
        assert_eq!(
            apply_update(&mut doc, &json!({"a": {"_$set": {"x": 1}}}), "__v").unwrap_err(),
            UpdateError::NotTraversable("a".into())
        );
    }

    #[test]
    fn test_no_verb_leaves_document_untouched() {
        let mut doc = json!({"a": 1});
        let err = apply_update(&mut doc, &json!({"x": {"y": {}}}), "__v").unwrap_err();
        assert_eq!(err, UpdateError::NoVerb);
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_custom_version_key() {
        let mut doc = json!({"rev": 3});
        UpdateInterpreter::new("rev")
            .apply(&mut doc, &json!({"_$set": {"rev": 9, "x": 1}}))
            .unwrap();
        assert_eq!(doc, json!({"rev": 3, "x": 1}));
    }
}
