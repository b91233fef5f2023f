//! Schema-to-permission compiler
//!
//! Walks a schema once, depth first, and produces an immutable
//! [`PathAccessIndex`]:
//! - object nodes recurse into their fields
//! - leaves and arrays of leaves register their own path, from their `acl`
//!   annotation or from the global defaults
//! - arrays of subdocuments recurse under the array's path, then register the
//!   array path itself for `read` and `update` at the strictest level any
//!   nested path requires
//! - virtual paths are compiled as leaves without an annotation
//! - the identifier and version counter are registered at read level 0
//!
//! Compilation never fails. Malformed annotations were already dropped
//! while parsing the schema, so those paths fall back to the defaults.

use serde::{Deserialize, Serialize};

use crate::observability::{Event, Logger};
use crate::schema::{AclSpec, FieldDef, FieldType, Schema, SchemaTree, ID_FIELD};

use super::index::{AccessLevel, Action, IndexBuilder, PathAccessIndex};

/// Global default levels applied to fields without an annotation
///
/// Members missing from a config file fall back to create 1, read 0,
/// update 0 and delete 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDefaults {
    #[serde(default = "restricted_level")]
    pub create: AccessLevel,
    #[serde(default)]
    pub read: AccessLevel,
    #[serde(default)]
    pub update: AccessLevel,
    #[serde(default = "restricted_level")]
    pub delete: AccessLevel,
}

fn restricted_level() -> AccessLevel {
    1
}

impl AccessDefaults {
    /// Defaults with every action at `level`
    pub fn uniform(level: AccessLevel) -> Self {
        Self {
            create: level,
            read: level,
            update: level,
            delete: level,
        }
    }

    /// Returns the default level for an action
    pub fn level(&self, action: Action) -> AccessLevel {
        match action {
            Action::Create => self.create,
            Action::Read => self.read,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }
}

/// Compiles a schema with the given defaults.
pub fn compile(schema: &Schema, defaults: &AccessDefaults) -> PathAccessIndex {
    AclCompiler::new(*defaults).compile(schema)
}

/// Schema ACL compiler
pub struct AclCompiler {
    defaults: AccessDefaults,
    builder: IndexBuilder,
}

impl AclCompiler {
    /// Creates a compiler for the given defaults.
    pub fn new(defaults: AccessDefaults) -> Self {
        Self {
            defaults,
            builder: IndexBuilder::new(),
        }
    }

    /// Compiles `schema` into an index. Consumes the compiler.
    pub fn compile(mut self, schema: &Schema) -> PathAccessIndex {
        for reserved in schema.reserved_fields() {
            self.builder.add_reserved(reserved);
        }

        self.walk_tree(&schema.tree, "", &schema.version_key);

        let index = self.builder.build(self.defaults.create, self.defaults.delete);

        let paths = index.all().len().to_string();
        let levels = index.levels().count().to_string();
        Logger::info(
            Event::IndexCompiled,
            &[
                ("schema", schema.name.as_str()),
                ("paths", paths.as_str()),
                ("levels", levels.as_str()),
            ],
        );

        index
    }

    fn walk_tree(&mut self, tree: &SchemaTree, context: &str, version_key: &str) {
        for (name, def) in &tree.fields {
            if name == ID_FIELD || (context.is_empty() && name == version_key) {
                continue;
            }
            self.walk_field(def, &join(context, name), version_key);
        }

        for virtual_path in &tree.virtuals {
            let path = join(context, virtual_path);
            if !self.builder.has_path(&path) {
                self.register_leaf(&path, None);
            }
        }
    }

    fn walk_field(&mut self, def: &FieldDef, path: &str, version_key: &str) {
        match &def.field_type {
            FieldType::Object { fields } => {
                for (name, nested) in fields {
                    if name == ID_FIELD {
                        continue;
                    }
                    self.walk_field(nested, &join(path, name), version_key);
                }
            }
            FieldType::Array { element } => self.register_leaf(path, element.acl.as_ref()),
            FieldType::DocumentArray { schema } => self.walk_document_array(schema, path, version_key),
            _ => self.register_leaf(path, def.acl.as_ref()),
        }
    }

    fn walk_document_array(&mut self, tree: &SchemaTree, path: &str, version_key: &str) {
        self.walk_tree(tree, path, version_key);

        if tree.id {
            let id_path = join(path, ID_FIELD);
            self.builder.grant(0, Action::Read, &id_path);
            self.builder.add_path(&id_path);
        }

        // The array path is only as permissive as its strictest child
        for action in [Action::Read, Action::Update] {
            let level = self
                .builder
                .max_level_under(path, action)
                .unwrap_or_else(|| self.defaults.level(action));
            self.builder.grant(level, action, path);
        }
        self.builder.add_path(path);
    }

    fn register_leaf(&mut self, path: &str, acl: Option<&AclSpec>) {
        match acl {
            Some(acl) => {
                for (action, level) in acl.grants(self.defaults.read) {
                    self.builder.grant(level, action, path);
                }
            }
            None => {
                for action in Action::ALL {
                    self.builder.grant(self.defaults.level(action), action, path);
                }
            }
        }
        self.builder.add_path(path);
    }
}

fn join(context: &str, name: &str) -> String {
    if context.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", context, name)
    }
}
