//! Schema tree definitions
//!
//! A schema describes the shape of a document as a recursive tree:
//! - leaf fields (`string`, `number`, `boolean`, `date`, `object_id`, `mixed`, `reference`)
//! - nested objects (`object`)
//! - arrays of leaves (`array`, the ACL sits on the element)
//! - arrays of subdocuments (`document_array`, carrying their own tree)
//!
//! Any leaf may carry an `acl` annotation. Annotations are parsed leniently:
//! anything that is not a non-negative integer level for a known action is
//! dropped, and an annotation with nothing left is treated as absent.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::acl::{AccessLevel, Action};

/// Identifier field present on every document and subdocument
pub const ID_FIELD: &str = "_id";

/// Default name of the version counter field
pub const DEFAULT_VERSION_KEY: &str = "__v";

/// Per-field access annotation.
///
/// `write` is the deprecated alias for create + update + delete at one level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AclSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<AccessLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<AccessLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<AccessLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<AccessLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<AccessLevel>,
}

impl AclSpec {
    /// Creates an empty annotation
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, level: AccessLevel) -> Self {
        self.create = Some(level);
        self
    }

    pub fn read(mut self, level: AccessLevel) -> Self {
        self.read = Some(level);
        self
    }

    pub fn update(mut self, level: AccessLevel) -> Self {
        self.update = Some(level);
        self
    }

    pub fn delete(mut self, level: AccessLevel) -> Self {
        self.delete = Some(level);
        self
    }

    pub fn write(mut self, level: AccessLevel) -> Self {
        self.write = Some(level);
        self
    }

    /// Returns true if no action is declared
    pub fn is_empty(&self) -> bool {
        self.create.is_none()
            && self.read.is_none()
            && self.update.is_none()
            && self.delete.is_none()
            && self.write.is_none()
    }

    /// Parses an annotation from raw JSON, dropping anything malformed.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut spec = AclSpec::default();

        for (key, raw) in obj {
            let level = match raw.as_u64().and_then(|l| AccessLevel::try_from(l).ok()) {
                Some(level) => level,
                None => continue,
            };
            match key.as_str() {
                "create" => spec.create = Some(level),
                "read" => spec.read = Some(level),
                "update" => spec.update = Some(level),
                "delete" => spec.delete = Some(level),
                "write" => spec.write = Some(level),
                _ => {}
            }
        }

        if spec.is_empty() {
            None
        } else {
            Some(spec)
        }
    }

    /// Expands the annotation into `(action, level)` grants, one per action.
    ///
    /// `write` stands in for whichever of create, update and delete is not
    /// given explicitly. An unspecified `read` takes `default_read`; the
    /// other unspecified actions get no grant.
    pub fn grants(&self, default_read: AccessLevel) -> Vec<(Action, AccessLevel)> {
        let mut grants = Vec::with_capacity(4);
        if let Some(level) = self.create.or(self.write) {
            grants.push((Action::Create, level));
        }
        grants.push((Action::Read, self.read.unwrap_or(default_read)));
        if let Some(level) = self.update.or(self.write) {
            grants.push((Action::Update, level));
        }
        if let Some(level) = self.delete.or(self.write) {
            grants.push((Action::Delete, level));
        }
        grants
    }
}

fn lenient_acl<'de, D>(deserializer: D) -> Result<Option<AclSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(AclSpec::from_value(&raw))
}

/// Structural classification of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Object,
    LeafArray,
    DocumentArray,
}

/// Field types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    ObjectId,
    /// Free-form value, addressed as a single path
    Mixed,
    /// Identifier of a document governed by another schema
    Reference {
        /// Name of the referenced schema
        target: String,
    },
    /// Nested object with its own fields
    Object {
        fields: BTreeMap<String, FieldDef>,
    },
    /// Array of leaf values; the element carries the ACL
    Array {
        element: Box<FieldDef>,
    },
    /// Array of subdocuments
    DocumentArray {
        schema: Box<SchemaTree>,
    },
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::ObjectId => "object_id",
            FieldType::Mixed => "mixed",
            FieldType::Reference { .. } => "reference",
            FieldType::Object { .. } => "object",
            FieldType::Array { .. } => "array",
            FieldType::DocumentArray { .. } => "document_array",
        }
    }

    /// Returns the structural kind of this type
    pub fn node_kind(&self) -> NodeKind {
        match self {
            FieldType::Object { .. } => NodeKind::Object,
            FieldType::Array { .. } => NodeKind::LeafArray,
            FieldType::DocumentArray { .. } => NodeKind::DocumentArray,
            _ => NodeKind::Leaf,
        }
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field data type
    #[serde(flatten)]
    pub field_type: FieldType,
    /// Access annotation, if any
    #[serde(default, deserialize_with = "lenient_acl", skip_serializing_if = "Option::is_none")]
    pub acl: Option<AclSpec>,
}

impl FieldDef {
    /// Create a leaf field without an annotation
    pub fn leaf(field_type: FieldType) -> Self {
        Self {
            field_type,
            acl: None,
        }
    }

    /// Create a string field
    pub fn string() -> Self {
        Self::leaf(FieldType::String)
    }

    /// Create a number field
    pub fn number() -> Self {
        Self::leaf(FieldType::Number)
    }

    /// Create a reference to another schema
    pub fn reference(target: impl Into<String>) -> Self {
        Self::leaf(FieldType::Reference {
            target: target.into(),
        })
    }

    /// Create a nested object field
    pub fn object(fields: BTreeMap<String, FieldDef>) -> Self {
        Self::leaf(FieldType::Object { fields })
    }

    /// Create an array of leaves
    pub fn array(element: FieldDef) -> Self {
        Self::leaf(FieldType::Array {
            element: Box::new(element),
        })
    }

    /// Create an array of subdocuments
    pub fn document_array(schema: SchemaTree) -> Self {
        Self::leaf(FieldType::DocumentArray {
            schema: Box::new(schema),
        })
    }

    /// Attach an access annotation
    pub fn with_acl(mut self, acl: AclSpec) -> Self {
        self.acl = if acl.is_empty() { None } else { Some(acl) };
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_version_key() -> String {
    DEFAULT_VERSION_KEY.to_string()
}

/// A (sub)document shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTree {
    /// Field definitions
    pub fields: BTreeMap<String, FieldDef>,
    /// Computed, non-persisted dotted paths
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub virtuals: Vec<String>,
    /// Whether subdocuments of this shape carry an implicit `_id`
    #[serde(default = "default_true")]
    pub id: bool,
}

impl SchemaTree {
    /// Create a tree from field definitions
    pub fn new(fields: BTreeMap<String, FieldDef>) -> Self {
        Self {
            fields,
            virtuals: Vec::new(),
            id: true,
        }
    }

    /// Add a virtual path
    pub fn with_virtual(mut self, path: impl Into<String>) -> Self {
        self.virtuals.push(path.into());
        self
    }

    /// Finds the field definition at a dotted path.
    ///
    /// Descends through objects and subdocument arrays.
    pub fn field_at(&self, path: &str) -> Option<&FieldDef> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;

        for segment in segments {
            current = match &current.field_type {
                FieldType::Object { fields } => fields.get(segment)?,
                FieldType::DocumentArray { schema } => schema.fields.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn validate_fields(fields: &BTreeMap<String, FieldDef>, prefix: &str) -> Result<(), String> {
    for (name, def) in fields {
        if name.is_empty() || name.contains('.') || name.starts_with('$') {
            return Err(format!("invalid field name '{}{}'", prefix, name));
        }
        let path = format!("{}{}.", prefix, name);
        match &def.field_type {
            FieldType::Object { fields } => validate_fields(fields, &path)?,
            FieldType::DocumentArray { schema } => validate_fields(&schema.fields, &path)?,
            FieldType::Reference { target } if target.is_empty() => {
                return Err(format!("reference '{}{}' has no target", prefix, name));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Complete schema definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Unique schema name
    pub name: String,
    /// Name of the version counter field
    #[serde(default = "default_version_key")]
    pub version_key: String,
    /// Document shape
    #[serde(flatten)]
    pub tree: SchemaTree,
}

impl Schema {
    /// Create a new schema
    pub fn new(name: impl Into<String>, fields: BTreeMap<String, FieldDef>) -> Self {
        Self {
            name: name.into(),
            version_key: default_version_key(),
            tree: SchemaTree::new(fields),
        }
    }

    /// Add a virtual path
    pub fn with_virtual(mut self, path: impl Into<String>) -> Self {
        self.tree.virtuals.push(path.into());
        self
    }

    /// Returns the reserved root fields: identifier and version counter
    pub fn reserved_fields(&self) -> [&str; 2] {
        [ID_FIELD, self.version_key.as_str()]
    }

    /// Returns the schema name a populated path points to, if it is a reference
    pub fn reference_target(&self, path: &str) -> Option<&str> {
        let def = self.tree.field_at(path)?;
        match &def.field_type {
            FieldType::Reference { target } => Some(target),
            FieldType::Array { element } => match &element.field_type {
                FieldType::Reference { target } => Some(target),
                _ => None,
            },
            _ => None,
        }
    }

    /// Validates the schema structure itself (not a document)
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Schema must have a name".into());
        }
        if self.version_key.is_empty() || self.version_key == ID_FIELD {
            return Err(format!("invalid version key '{}'", self.version_key));
        }
        validate_fields(&self.tree.fields, "")
    }
}
