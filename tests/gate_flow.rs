//! Gate Flow Tests
//!
//! Drives full requests through the gate against an in-memory store:
//! - reads are projected to what the caller may see
//! - denied filters and commands never reach the store
//! - updates are interpreted and saved per document

use std::collections::BTreeMap;
use std::fs;

use serde_json::{json, Value};
use tempfile::TempDir;

use fieldgate::acl::Action;
use fieldgate::gate::{
    AccessLevels, DocumentStore, FindQuery, Gate, GateConfig, GateError, ReadRequest, StoreError,
};

// =============================================================================
// Helper Functions
// =============================================================================

/// Store matching top-level equality filters, keyed by `_id`
#[derive(Default)]
struct MemoryStore {
    models: BTreeMap<String, Vec<Value>>,
}

impl MemoryStore {
    fn matches(doc: &Value, filter: &Value) -> bool {
        match filter.as_object() {
            Some(filter) => filter.iter().all(|(k, v)| doc.get(k) == Some(v)),
            None => true,
        }
    }
}

impl DocumentStore for MemoryStore {
    fn find(&self, model: &str, query: &FindQuery) -> Result<Vec<Value>, StoreError> {
        let docs = self.models.get(model).cloned().unwrap_or_default();
        Ok(docs
            .into_iter()
            .filter(|doc| Self::matches(doc, &query.filter))
            .collect())
    }

    fn count(&self, model: &str, filter: &Value) -> Result<u64, StoreError> {
        Ok(self
            .models
            .get(model)
            .map(|docs| docs.iter().filter(|doc| Self::matches(doc, filter)).count())
            .unwrap_or(0) as u64)
    }

    fn save(&mut self, model: &str, document: Value) -> Result<Value, StoreError> {
        let docs = self.models.entry(model.to_string()).or_default();
        match docs.iter_mut().find(|d| d.get("_id") == document.get("_id")) {
            Some(existing) => *existing = document.clone(),
            None => docs.push(document.clone()),
        }
        Ok(document)
    }

    fn remove(&mut self, model: &str, filter: &Value) -> Result<u64, StoreError> {
        let docs = self.models.entry(model.to_string()).or_default();
        let before = docs.len();
        docs.retain(|doc| !Self::matches(doc, filter));
        Ok((before - docs.len()) as u64)
    }
}

fn setup_gate() -> (TempDir, Gate<MemoryStore>) {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("posts.json"),
        json!({
            "name": "posts",
            "fields": {
                "title": {"type": "string", "acl": {"read": 0, "update": 1}},
                "secret": {"type": "string", "acl": {"read": 2, "update": 2}},
                "views": {"type": "number", "acl": {"read": 0, "update": 1}},
                "items": {"type": "document_array", "schema": {"fields": {
                    "tag": {"type": "string", "acl": {"read": 0, "update": 1}},
                    "n": {"type": "number", "acl": {"read": 0, "update": 1}}
                }}}
            }
        })
        .to_string(),
    )
    .unwrap();

    let mut store = MemoryStore::default();
    store.models.insert(
        "posts".to_string(),
        vec![
            json!({"_id": 1, "__v": 0, "title": "a", "secret": "s", "views": 1,
                   "items": [{"tag": "a", "n": 1}, {"tag": "b", "n": 5}]}),
            json!({"_id": 2, "__v": 0, "title": "b", "secret": "t", "views": 2, "items": []}),
        ],
    );

    let gate = Gate::from_config(GateConfig::new(tmp.path()), store).unwrap();
    (tmp, gate)
}

// =============================================================================
// Read Tests
// =============================================================================

/// The store receives the translated filter and the allowed projection.
#[test]
fn test_read_uses_allowed_projection() {
    let (_tmp, gate) = setup_gate();
    let request = ReadRequest::filter(json!({"views": {"_$gte": 1}}));

    let plan = gate
        .plan_read("posts", &request, &AccessLevels::default())
        .unwrap();
    let query = plan.find_query();

    assert_eq!(query.filter, json!({"views": {"$gte": 1}}));
    assert!(!query.projection.split(' ').any(|p| p == "secret"));
    assert!(query.projection.split(' ').any(|p| p == "title"));
}

/// A filter on a field above the caller's level is denied.
#[test]
fn test_read_denied_on_hidden_filter() {
    let (_tmp, gate) = setup_gate();
    let request = ReadRequest::filter(json!({"secret": "s"}));

    match gate.read("posts", &request, &AccessLevels::default()) {
        Err(GateError::AccessDenied { action, paths, .. }) => {
            assert_eq!(action, Action::Read);
            assert_eq!(paths, vec!["secret".to_string()]);
        }
        other => panic!("expected denial, got {:?}", other),
    }

    let docs = gate
        .read("posts", &request, &AccessLevels::uniform(2))
        .unwrap();
    assert_eq!(docs.len(), 1);
}

/// Counting reports pagination.
#[test]
fn test_count_with_pagination() {
    let (_tmp, gate) = setup_gate();
    let request = ReadRequest {
        limit: Some(1),
        skip: Some(1),
        ..ReadRequest::default()
    };
    let page = gate
        .count("posts", &request, &AccessLevels::default())
        .unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(page.pages, 2);
    assert_eq!(page.current, 2);
}

// =============================================================================
// Write Tests
// =============================================================================

/// Updates run through the interpreter and are saved.
#[test]
fn test_update_applies_command() {
    let (_tmp, mut gate) = setup_gate();
    let command = json!({"_$inc": {"items": {"_$where_": {"tag": "a"}, "_$do_": {"n": 3}}}});

    let saved = gate
        .update("posts", &json!({"title": "a"}), &command, &AccessLevels::uniform(1))
        .unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["items"], json!([{"tag": "a", "n": 4}, {"tag": "b", "n": 5}]));

    let stored = gate.store().find("posts", &FindQuery::matching(json!({"_id": 1}))).unwrap();
    assert_eq!(stored[0]["items"][0]["n"], 4);
}

/// An update above the caller's level never reaches the store.
#[test]
fn test_update_denied() {
    let (_tmp, mut gate) = setup_gate();
    let command = json!({"_$set": {"secret": "leak"}});

    let err = gate
        .update("posts", &json!({}), &command, &AccessLevels::uniform(1))
        .unwrap_err();
    assert_eq!(err.code(), "FG_ACCESS_DENIED");

    let stored = gate.store().find("posts", &FindQuery::matching(json!({"_id": 1}))).unwrap();
    assert_eq!(stored[0]["secret"], "s");
}

/// A command that fails on one matched document saves none of them.
#[test]
fn test_malformed_update_saves_nothing() {
    let (_tmp, mut gate) = setup_gate();
    gate.store_mut()
        .save("posts", json!({"_id": 2, "__v": 0, "title": "b", "views": "x", "items": []}))
        .unwrap();

    let err = gate
        .update("posts", &json!({}), &json!({"_$inc": {"views": 1}}), &AccessLevels::uniform(1))
        .unwrap_err();
    assert_eq!(err.code(), "FG_MALFORMED_COMMAND");

    let stored = gate.store().find("posts", &FindQuery::matching(json!({"_id": 1}))).unwrap();
    assert_eq!(stored[0]["views"], 1);
}

/// Create and delete follow the document thresholds.
#[test]
fn test_create_and_delete_thresholds() {
    let (_tmp, mut gate) = setup_gate();

    let batch = vec![json!({"_id": 3, "title": "c"}), json!({"_id": 4, "title": "d"})];

    let err = gate
        .create("posts", batch.clone(), &AccessLevels::default())
        .unwrap_err();
    assert_eq!(err.code(), "FG_ACCESS_DENIED");
    assert_eq!(gate.store().count("posts", &json!({})).unwrap(), 2);

    let saved = gate
        .create("posts", batch, &AccessLevels::uniform(1))
        .unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(gate.store().count("posts", &json!({})).unwrap(), 4);

    assert!(gate
        .delete("posts", &json!({"_id": 3}), &AccessLevels::default())
        .is_err());
    let removed = gate
        .delete("posts", &json!({"_id": 3}), &AccessLevels::uniform(1))
        .unwrap();
    assert_eq!(removed, 1);
}

/// Unknown models are fatal.
#[test]
fn test_unknown_model_is_fatal() {
    let (_tmp, gate) = setup_gate();
    let err = gate
        .read("ghost", &ReadRequest::default(), &AccessLevels::default())
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.code(), "FG_MISSING_INDEX");
}
