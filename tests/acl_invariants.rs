//! Access Index Invariant Tests
//!
//! - Every walked path appears exactly once in the index
//! - Fields without annotations are granted the defaults for every action
//! - Access is monotone in the caller's level
//! - Projections grow strictly with the level

use std::collections::{BTreeMap, HashSet};

use fieldgate::acl::{compile, AccessDefaults, AccessValidator, Action};
use fieldgate::schema::{AclSpec, FieldDef, Schema, SchemaTree};

// =============================================================================
// Helper Functions
// =============================================================================

fn leaf(acl: AclSpec) -> FieldDef {
    FieldDef::string().with_acl(acl)
}

fn defaults() -> AccessDefaults {
    AccessDefaults {
        create: 1,
        read: 0,
        update: 0,
        delete: 1,
    }
}

fn blog_schema() -> Schema {
    let mut meta = BTreeMap::new();
    meta.insert("views".to_string(), FieldDef::number());
    meta.insert("notes".to_string(), leaf(AclSpec::new().read(1).update(2)));

    let mut comment = BTreeMap::new();
    comment.insert("body".to_string(), leaf(AclSpec::new().read(0).update(1)));
    comment.insert("flag".to_string(), leaf(AclSpec::new().read(2).update(3)));

    let mut fields = BTreeMap::new();
    fields.insert("title".to_string(), leaf(AclSpec::new().read(0).update(1)));
    fields.insert("secret".to_string(), leaf(AclSpec::new().read(1).update(3)));
    fields.insert("body".to_string(), FieldDef::string());
    fields.insert("meta".to_string(), FieldDef::object(meta));
    fields.insert(
        "tags".to_string(),
        FieldDef::array(leaf(AclSpec::new().read(0).update(2))),
    );
    fields.insert(
        "comments".to_string(),
        FieldDef::document_array(SchemaTree::new(comment)),
    );

    Schema::new("posts", fields)
}

// =============================================================================
// Index Shape Tests
// =============================================================================

/// Every path the walk reaches is listed once.
#[test]
fn test_every_path_appears_once() {
    let index = compile(&blog_schema(), &defaults());

    let mut seen = HashSet::new();
    for path in index.all() {
        assert!(seen.insert(path.clone()), "duplicate path {}", path);
    }

    for expected in [
        "_id",
        "__v",
        "title",
        "secret",
        "body",
        "meta.views",
        "meta.notes",
        "tags",
        "comments",
        "comments.body",
        "comments.flag",
        "comments._id",
    ] {
        assert!(index.contains_path(expected), "missing {}", expected);
    }
}

/// Unannotated fields receive the default level for every action.
#[test]
fn test_defaults_registered_for_unannotated_fields() {
    let defaults = defaults();
    let index = compile(&blog_schema(), &defaults);

    for path in ["body", "meta.views"] {
        for action in Action::ALL {
            let level = defaults.level(action);
            assert!(
                index.paths_at(level, action).iter().any(|p| p == path),
                "{} not granted {} at {}",
                path,
                action,
                level
            );
        }
    }
}

/// Compilation is deterministic.
#[test]
fn test_compile_is_deterministic() {
    let first = compile(&blog_schema(), &defaults());
    for _ in 0..20 {
        assert_eq!(compile(&blog_schema(), &defaults()), first);
    }
}

/// A subdocument array is gated at its strictest child.
#[test]
fn test_document_array_takes_strictest_child() {
    let index = compile(&blog_schema(), &defaults());
    assert_eq!(index.granted_level("comments", Action::Read, 10), Some(2));
    assert_eq!(index.granted_level("comments", Action::Update, 10), Some(3));
}

// =============================================================================
// Validator Tests
// =============================================================================

/// A field declared {read:1, update:3} passes and fails at the stated levels.
#[test]
fn test_declared_levels_are_enforced() {
    let index = compile(&blog_schema(), &defaults());
    let validator = AccessValidator::new(&index);

    assert!(validator.can_update_paths(&["secret"], 3));
    assert!(!validator.can_update_paths(&["secret"], 2));
    assert!(validator.can_read_paths(&["secret"], 1));
    assert!(!validator.can_read_paths(&["secret"], 0));
}

/// Access granted at a level stays granted at every higher level.
#[test]
fn test_access_is_monotone() {
    let index = compile(&blog_schema(), &defaults());
    let validator = AccessValidator::new(&index);

    for path in index.all() {
        for action in [Action::Read, Action::Update] {
            for low in 0..5 {
                if validator.path_allowed(path, action, low) {
                    for high in low + 1..6 {
                        assert!(
                            validator.path_allowed(path, action, high),
                            "{} {} lost between {} and {}",
                            action,
                            path,
                            low,
                            high
                        );
                    }
                }
            }
        }
    }
}

/// Reserved fields are always readable, never listed as denied.
#[test]
fn test_reserved_fields_always_pass() {
    let index = compile(&blog_schema(), &defaults());
    let validator = AccessValidator::new(&index);
    assert!(validator
        .denied_paths(&["_id", "__v"], Action::Update, 0)
        .is_empty());
}

/// The projection at level 1 strictly contains the projection at level 0.
#[test]
fn test_projection_grows_strictly() {
    let index = compile(&blog_schema(), &defaults());
    let validator = AccessValidator::new(&index);

    let low: HashSet<String> = validator.allowed_projection(0).into_iter().collect();
    let high: HashSet<String> = validator.allowed_projection(1).into_iter().collect();

    assert!(low.is_subset(&high));
    assert!(high.len() > low.len());
    assert!(high.contains("secret"));
    assert!(!low.contains("secret"));
}

/// Document-level thresholds come from the defaults.
#[test]
fn test_document_thresholds() {
    let index = compile(&blog_schema(), &defaults());
    let validator = AccessValidator::new(&index);

    assert!(!validator.can_create(0));
    assert!(validator.can_create(1));
    assert!(!validator.can_delete(0));
    assert!(validator.can_delete(2));
}
