//! Request gate
//!
//! Packages the per-request flow: translate, extract, validate, then either
//! interpret the update or hand the read to the store with a computed
//! projection. Storage is a collaborator behind [`DocumentStore`].
//!
//! ```ignore
//! let mut gate = Gate::from_config(GateConfig::load(path)?, store)?;
//! let docs = gate.read("posts", &ReadRequest::filter(json!({"title": "x"})), &levels)?;
//! ```

mod config;
mod errors;
mod plan;
mod store;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::acl::{AccessValidator, Action};
use crate::observability::Logger;
use crate::query::{extract_paths, translate};
use crate::schema::SchemaRegistry;
use crate::update::UpdateInterpreter;

pub use config::GateConfig;
pub use errors::{GateError, GateResult, StoreError};
pub use plan::{AccessLevels, ReadPlan, ReadRequest, UpdatePlan, Validity};
pub use store::{DocumentStore, FindQuery};

use plan::deny;

/// Count response with pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub count: u64,
    pub pages: u64,
    pub current: u64,
}

impl Pagination {
    /// Pages of `limit` documents; a zero limit is one page.
    pub fn new(count: u64, skip: u64, limit: u64) -> Self {
        if limit == 0 {
            return Self {
                count,
                pages: 1,
                current: 1,
            };
        }
        Self {
            count,
            pages: count.div_ceil(limit).max(1),
            current: skip.div_ceil(limit) + 1,
        }
    }
}

/// Access-checked front of a document store
pub struct Gate<S: DocumentStore> {
    registry: SchemaRegistry,
    config: GateConfig,
    store: S,
}

impl<S: DocumentStore> Gate<S> {
    /// Creates a gate over an already populated registry.
    pub fn new(registry: SchemaRegistry, config: GateConfig, store: S) -> Self {
        Self {
            registry,
            config,
            store,
        }
    }

    /// Applies the configured log level and loads every schema in `schema_dir`.
    pub fn from_config(config: GateConfig, store: S) -> GateResult<Self> {
        Logger::set_min_severity(config.log_severity()?);

        let mut registry = SchemaRegistry::new(config.defaults)
            .with_schema_dir(&config.schema_dir)
            .with_version_key(&config.version_key);
        registry.load_all()?;

        Ok(Self::new(registry, config, store))
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Plans a read without executing it.
    pub fn plan_read(
        &self,
        model: &str,
        request: &ReadRequest,
        levels: &AccessLevels,
    ) -> GateResult<ReadPlan> {
        ReadPlan::build(&self.registry, &self.config, model, request, levels)
    }

    /// Reads documents through the allowed projection.
    pub fn read(
        &self,
        model: &str,
        request: &ReadRequest,
        levels: &AccessLevels,
    ) -> GateResult<Vec<Value>> {
        let plan = self.plan_read(model, request, levels)?;
        plan.authorize()?;
        Ok(self.store.find(model, &plan.find_query())?)
    }

    /// Counts matching documents and reports pagination.
    pub fn count(
        &self,
        model: &str,
        request: &ReadRequest,
        levels: &AccessLevels,
    ) -> GateResult<Pagination> {
        let plan = self.plan_read(model, request, levels)?;
        plan.authorize()?;
        let count = self.store.count(model, plan.filter())?;
        Ok(Pagination::new(count, plan.skip(), plan.limit()))
    }

    /// Creates a batch of documents if the caller meets the create threshold.
    ///
    /// The threshold is checked once for the whole batch; nothing is saved
    /// when it fails.
    pub fn create(
        &mut self,
        model: &str,
        documents: Vec<Value>,
        levels: &AccessLevels,
    ) -> GateResult<Vec<Value>> {
        let index = self.registry.index(model)?;
        if !AccessValidator::new(&index).can_create(levels.create) {
            return Err(deny(Action::Create, model, Vec::new()));
        }

        let mut saved = Vec::with_capacity(documents.len());
        for document in documents {
            saved.push(self.store.save(model, document)?);
        }
        Ok(saved)
    }

    /// Applies `command` to every document matching `find` and saves each one.
    ///
    /// The command is applied to every matched document before any is saved,
    /// so a malformed command saves nothing. A store failure part way through
    /// saving leaves the earlier documents saved.
    pub fn update(
        &mut self,
        model: &str,
        find: &Value,
        command: &Value,
        levels: &AccessLevels,
    ) -> GateResult<Vec<Value>> {
        let plan = UpdatePlan::build(&self.registry, model, find, command, levels)?;
        plan.authorize()?;

        let version_key = self
            .registry
            .schema(model)
            .map(|schema| schema.version_key.clone())
            .unwrap_or_else(|| self.config.version_key.clone());
        let interpreter = UpdateInterpreter::new(version_key);

        let documents = self
            .store
            .find(model, &FindQuery::matching(plan.filter().clone()))?;

        let mut updated = documents;
        for document in &mut updated {
            interpreter.apply(document, plan.command())?;
        }

        let mut saved = Vec::with_capacity(updated.len());
        for document in updated {
            saved.push(self.store.save(model, document)?);
        }
        Ok(saved)
    }

    /// Removes matching documents if the caller meets the delete threshold
    /// and may read every path in the filter.
    pub fn delete(&mut self, model: &str, find: &Value, levels: &AccessLevels) -> GateResult<u64> {
        let index = self.registry.index(model)?;
        let validator = AccessValidator::new(&index);

        if !validator.can_delete(levels.delete) {
            return Err(deny(Action::Delete, model, Vec::new()));
        }

        let filter = match find {
            Value::Null => Value::Object(Map::new()),
            other => translate(other),
        };
        let denied = validator.denied_paths(&extract_paths(&filter), Action::Read, levels.read);
        if !denied.is_empty() {
            return Err(deny(Action::Read, model, denied));
        }

        Ok(self.store.remove(model, &filter)?)
    }
}
