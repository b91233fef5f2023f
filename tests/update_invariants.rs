//! Update Interpreter Invariant Tests
//!
//! - Array verbs append, deduplicate and remove as documented
//! - Predicate addressing touches only the first match
//! - Reserved fields survive $set

use serde_json::json;

use fieldgate::update::{apply_update, UpdateError};

fn run(mut doc: serde_json::Value, command: serde_json::Value) -> serde_json::Value {
    apply_update(&mut doc, &command, "__v").unwrap();
    doc
}

/// $push appends every element of an array argument.
#[test]
fn test_push_appends_batch() {
    let doc = run(json!({"list": [1]}), json!({"_$push": {"list": [2, 3, 4]}}));
    assert_eq!(doc["list"], json!([1, 2, 3, 4]));
    assert_eq!(doc["list"].as_array().unwrap().len(), 4);
}

/// $addToSet skips values already present, including earlier ones in the batch.
#[test]
fn test_add_to_set_dedupes() {
    let doc = run(json!({"set": []}), json!({"_$addToSet": {"set": [1, 1, 2]}}));
    assert_eq!(doc["set"], json!([1, 2]));
}

/// $pull removes every listed value.
#[test]
fn test_pull_empties_array() {
    let doc = run(json!({"list": [1]}), json!({"_$pull": {"list": [1]}}));
    assert_eq!(doc["list"], json!([]));
}

/// Predicate-addressed $inc changes only the first matching element.
#[test]
fn test_where_inc_updates_first_match_only() {
    let doc = run(
        json!({"items": [{"tag": "a", "n": 1}, {"tag": "b", "n": 5}]}),
        json!({"_$inc": {"items": {"_$where_": {"tag": "a"}, "_$do_": {"n": 3}}}}),
    );
    assert_eq!(
        doc["items"],
        json!([{"tag": "a", "n": 4}, {"tag": "b", "n": 5}])
    );
}

/// A predicate that matches nothing leaves the document as it was.
#[test]
fn test_where_without_match_is_silent() {
    let before = json!({"items": [{"tag": "a", "n": 1}]});
    let doc = run(
        before.clone(),
        json!({"_$inc": {"items": {"_$where_": {"tag": "z"}, "_$do_": {"n": 3}}}}),
    );
    assert_eq!(doc, before);
}

/// $set never overwrites the identifier or the version counter.
#[test]
fn test_set_keeps_reserved_fields() {
    let doc = run(
        json!({"_id": "x", "__v": 2, "title": "a"}),
        json!({"$set": {"_id": "y", "__v": 9, "title": "b"}}),
    );
    assert_eq!(doc, json!({"_id": "x", "__v": 2, "title": "b"}));
}

/// Malformed commands are rejected with a command error.
#[test]
fn test_malformed_commands() {
    let mut doc = json!({});
    assert!(matches!(
        apply_update(&mut doc, &json!([1]), "__v"),
        Err(UpdateError::NotAnObject)
    ));
    assert!(matches!(
        apply_update(&mut doc, &json!({}), "__v"),
        Err(UpdateError::NoVerb)
    ));
    let err = apply_update(&mut doc, &json!({"_$inc": 5}), "__v").unwrap_err();
    assert_eq!(err.code(), "FG_MALFORMED_COMMAND");
}
