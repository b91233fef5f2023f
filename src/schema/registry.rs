//! Schema registry
//!
//! Holds every registered schema next to its compiled access index.
//! - Each schema is compiled exactly once, at registration
//! - Names are immutable: registering a name twice is rejected
//! - Indices are handed out as `Arc`s and never change afterwards
//!
//! Schemas can be registered in memory or loaded from `*.json` files in a
//! schema directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::acl::{compile, AccessDefaults, PathAccessIndex};
use crate::observability::{Event, Logger};

use super::errors::{SchemaError, SchemaResult};
use super::types::{Schema, DEFAULT_VERSION_KEY};

struct RegisteredSchema {
    schema: Schema,
    index: Arc<PathAccessIndex>,
}

/// Registry of schemas and their compiled indices
pub struct SchemaRegistry {
    /// Directory scanned by `load_all`
    schema_dir: Option<PathBuf>,
    /// Defaults applied to fields without an annotation
    defaults: AccessDefaults,
    /// Version key for schema files that do not name one
    version_key: String,
    schemas: HashMap<String, RegisteredSchema>,
}

impl SchemaRegistry {
    /// Creates an empty in-memory registry.
    pub fn new(defaults: AccessDefaults) -> Self {
        Self {
            schema_dir: None,
            defaults,
            version_key: DEFAULT_VERSION_KEY.to_string(),
            schemas: HashMap::new(),
        }
    }

    /// Sets the directory scanned by [`load_all`](Self::load_all).
    pub fn with_schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    /// Sets the version key assumed by schema files that omit `version_key`.
    pub fn with_version_key(mut self, version_key: impl Into<String>) -> Self {
        self.version_key = version_key.into();
        self
    }

    /// Returns the schema directory, if any.
    pub fn schema_dir(&self) -> Option<&Path> {
        self.schema_dir.as_deref()
    }

    /// Returns the access defaults used for compilation.
    pub fn defaults(&self) -> &AccessDefaults {
        &self.defaults
    }

    /// Loads every `*.json` file in the schema directory, in file name order.
    ///
    /// Returns the number of schemas loaded. A missing directory or an
    /// unreadable or invalid file is fatal.
    pub fn load_all(&mut self) -> SchemaResult<usize> {
        let dir = match &self.schema_dir {
            Some(dir) => dir.clone(),
            None => return Ok(0),
        };

        let entries = fs::read_dir(&dir).map_err(|e| {
            SchemaError::malformed_schema(
                dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed_schema(
                    dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        for path in &files {
            self.load_schema_file(path)?;
        }
        Ok(files.len())
    }

    /// Loads and registers a single schema file.
    pub fn load_schema_file(&mut self, path: &Path) -> SchemaResult<Arc<PathAccessIndex>> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::malformed_schema(
                path.display().to_string(),
                format!("Failed to read file: {}", e),
            )
        })?;

        let schema = self.parse_schema(&content).map_err(|e| {
            SchemaError::malformed_schema(path.display().to_string(), e)
        })?;

        self.register_from(schema, &path.display().to_string())
    }

    /// Parses schema JSON, filling in the registry's version key when absent.
    pub fn parse_schema(&self, content: &str) -> Result<Schema, String> {
        let mut raw: Value =
            serde_json::from_str(content).map_err(|e| format!("Invalid JSON: {}", e))?;
        if let Value::Object(obj) = &mut raw {
            obj.entry("version_key")
                .or_insert_with(|| Value::String(self.version_key.clone()));
        }
        serde_json::from_value(raw).map_err(|e| format!("Invalid schema: {}", e))
    }

    /// Registers a schema and compiles its index.
    pub fn register(&mut self, schema: Schema) -> SchemaResult<Arc<PathAccessIndex>> {
        self.register_from(schema, "<in-memory>")
    }

    fn register_from(&mut self, schema: Schema, source: &str) -> SchemaResult<Arc<PathAccessIndex>> {
        schema
            .validate_structure()
            .map_err(|e| SchemaError::malformed_schema(source, e))?;

        if self.schemas.contains_key(&schema.name) {
            return Err(SchemaError::schema_immutable(&schema.name));
        }

        let index = Arc::new(compile(&schema, &self.defaults));
        Logger::info(
            Event::SchemaRegistered,
            &[("schema", schema.name.as_str()), ("source", source)],
        );

        self.schemas.insert(
            schema.name.clone(),
            RegisteredSchema {
                schema,
                index: Arc::clone(&index),
            },
        );
        Ok(index)
    }

    /// Gets a schema by name.
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name).map(|entry| &entry.schema)
    }

    /// Gets the compiled index for a schema.
    ///
    /// An unknown name is a fatal configuration error.
    pub fn index(&self, name: &str) -> SchemaResult<Arc<PathAccessIndex>> {
        self.schemas
            .get(name)
            .map(|entry| Arc::clone(&entry.index))
            .ok_or_else(|| SchemaError::missing_index(name))
    }

    /// Resolves the index governing the documents a reference path points to.
    pub fn related_index(&self, name: &str, path: &str) -> SchemaResult<Arc<PathAccessIndex>> {
        let schema = self
            .schema(name)
            .ok_or_else(|| SchemaError::missing_index(name))?;
        let target = schema
            .reference_target(path)
            .ok_or_else(|| SchemaError::missing_index(format!("{}.{}", name, path)))?;
        self.index(target)
    }

    /// Checks if a schema is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Registered schema names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
