//! Per-request plans
//!
//! A plan runs the pure part of a request: translate the filter, extract the
//! touched paths, and validate them against the compiled index at the
//! caller's levels. Building a plan only fails on configuration defects or
//! an oversized page; access outcomes are recorded as validity flags and
//! turned into errors by `authorize`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::acl::{AccessLevel, AccessValidator, Action};
use crate::observability::{Event, Logger};
use crate::query::{
    extract_paths, extract_update_paths, parse_populate, translate_with_stats, PopulateRequest,
    QueryComplexity,
};
use crate::schema::{SchemaRegistry, ID_FIELD};

use super::config::GateConfig;
use super::errors::{GateError, GateResult};
use super::store::FindQuery;

/// Caller access levels for one request. Missing values are 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessLevels {
    pub create: AccessLevel,
    pub read: AccessLevel,
    pub update: AccessLevel,
    pub delete: AccessLevel,
}

impl AccessLevels {
    /// The same level for every action
    pub fn uniform(level: AccessLevel) -> Self {
        Self {
            create: level,
            read: level,
            update: level,
            delete: level,
        }
    }
}

/// A read request as received, in portable vocabulary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadRequest {
    #[serde(alias = "filter")]
    pub find: Value,
    pub select: Option<String>,
    pub populate: Option<Value>,
    pub sort: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl ReadRequest {
    /// A request with only a filter
    pub fn filter(find: Value) -> Self {
        Self {
            find,
            ..Self::default()
        }
    }
}

/// Outcome of each access check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Validity {
    pub read: bool,
    pub create: bool,
    pub delete: bool,
    /// Whether the requested selection was valid as given
    pub select: bool,
    pub populate: bool,
    /// Whether the update command was allowed; `None` when none was checked
    pub update: Option<bool>,
}

/// A validated read
#[derive(Debug, Clone, Serialize)]
pub struct ReadPlan {
    model: String,
    filter: Value,
    read_paths: Vec<String>,
    denied_paths: Vec<String>,
    select: String,
    populate: Vec<PopulateRequest>,
    sort: String,
    skip: u64,
    limit: u64,
    valid: Validity,
    complexity: QueryComplexity,
}

impl ReadPlan {
    /// Plans a read of `model`.
    ///
    /// An absent selection becomes the allowed projection; a selection that
    /// fails validation is replaced by it. Populated paths are checked
    /// against their target schema's own index.
    pub fn build(
        registry: &SchemaRegistry,
        config: &GateConfig,
        model: &str,
        request: &ReadRequest,
        levels: &AccessLevels,
    ) -> GateResult<Self> {
        let index = registry.index(model)?;
        let validator = AccessValidator::new(&index);

        let limit = request.limit.unwrap_or(config.limit);
        if limit > config.read_limit {
            return Err(GateError::LimitExceeded {
                requested: limit,
                max: config.read_limit,
            });
        }

        let (filter, complexity) = translate_with_stats(&normalize_filter(&request.find));
        let read_paths = extract_paths(&filter);
        let denied_paths = validator.denied_paths(&read_paths, Action::Read, levels.read);

        let requested = request.select.as_deref().map(str::trim).unwrap_or("");
        let (select, select_ok) = if requested.is_empty() {
            (validator.allowed_projection_string(levels.read), true)
        } else if validator.can_select(requested, levels.read) {
            (requested.to_string(), true)
        } else {
            let level = levels.read.to_string();
            Logger::warn(
                Event::SelectionNarrowed,
                &[("model", model), ("select", requested), ("level", level.as_str())],
            );
            (validator.allowed_projection_string(levels.read), false)
        };

        let mut populate = Vec::new();
        let mut populate_ok = true;
        for entry in parse_populate(request.populate.as_ref()) {
            let related = registry.related_index(model, &entry.path)?;
            let related_validator = AccessValidator::new(&related);
            if !related_validator.can_populate(&entry, levels.read) {
                populate_ok = false;
            }
            populate.push(related_validator.resolve_populate(&entry, levels.read));
        }

        let valid = Validity {
            read: denied_paths.is_empty(),
            create: validator.can_create(levels.create),
            delete: validator.can_delete(levels.delete),
            select: select_ok,
            populate: populate_ok,
            update: None,
        };

        Ok(Self {
            model: model.to_string(),
            filter,
            read_paths,
            denied_paths,
            select,
            populate,
            sort: request
                .sort
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(ID_FIELD)
                .to_string(),
            skip: request.skip.unwrap_or(0),
            limit,
            valid,
            complexity,
        })
    }

    /// Fails if the filter or a populate request was denied.
    pub fn authorize(&self) -> GateResult<()> {
        if !self.valid.read {
            return Err(deny(Action::Read, &self.model, self.denied_paths.clone()));
        }
        if !self.valid.populate {
            let paths = self.populate.iter().map(|p| p.path.clone()).collect();
            return Err(deny(Action::Read, &self.model, paths));
        }
        Ok(())
    }

    /// Native find request for the store
    pub fn find_query(&self) -> FindQuery {
        FindQuery {
            filter: self.filter.clone(),
            projection: self.select.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
            populate: self.populate.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Translated filter
    pub fn filter(&self) -> &Value {
        &self.filter
    }

    /// Paths the filter reads
    pub fn read_paths(&self) -> &[String] {
        &self.read_paths
    }

    /// Effective projection
    pub fn select(&self) -> &str {
        &self.select
    }

    /// Populate requests with their effective selections
    pub fn populate(&self) -> &[PopulateRequest] {
        &self.populate
    }

    pub fn sort(&self) -> &str {
        &self.sort
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn valid(&self) -> &Validity {
        &self.valid
    }

    pub fn complexity(&self) -> &QueryComplexity {
        &self.complexity
    }
}

/// A validated update
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePlan {
    model: String,
    filter: Value,
    command: Value,
    read_paths: Vec<String>,
    update_paths: Vec<String>,
    denied_read: Vec<String>,
    denied_update: Vec<String>,
}

impl UpdatePlan {
    /// Plans an update of the `model` documents matching `find`.
    ///
    /// The filter is checked for read and the command's paths for update.
    pub fn build(
        registry: &SchemaRegistry,
        model: &str,
        find: &Value,
        command: &Value,
        levels: &AccessLevels,
    ) -> GateResult<Self> {
        let index = registry.index(model)?;
        let validator = AccessValidator::new(&index);

        let (filter, _) = translate_with_stats(&normalize_filter(find));
        let read_paths = extract_paths(&filter);
        let update_paths = extract_update_paths(command);

        Ok(Self {
            model: model.to_string(),
            denied_read: validator.denied_paths(&read_paths, Action::Read, levels.read),
            denied_update: validator.denied_paths(&update_paths, Action::Update, levels.update),
            filter,
            command: command.clone(),
            read_paths,
            update_paths,
        })
    }

    /// Fails if the filter or the command was denied.
    pub fn authorize(&self) -> GateResult<()> {
        if !self.denied_read.is_empty() {
            return Err(deny(Action::Read, &self.model, self.denied_read.clone()));
        }
        if !self.denied_update.is_empty() {
            return Err(deny(Action::Update, &self.model, self.denied_update.clone()));
        }
        Ok(())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Translated filter
    pub fn filter(&self) -> &Value {
        &self.filter
    }

    /// Update command, still in portable vocabulary
    pub fn command(&self) -> &Value {
        &self.command
    }

    pub fn read_paths(&self) -> &[String] {
        &self.read_paths
    }

    /// Paths the command writes to
    pub fn update_paths(&self) -> &[String] {
        &self.update_paths
    }

    pub fn is_read_allowed(&self) -> bool {
        self.denied_read.is_empty()
    }

    pub fn is_update_allowed(&self) -> bool {
        self.denied_update.is_empty()
    }
}

/// `null` filters mean "everything".
fn normalize_filter(find: &Value) -> Value {
    match find {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    }
}

/// Builds a denial and logs it.
pub(crate) fn deny(action: Action, model: &str, paths: Vec<String>) -> GateError {
    let joined = paths.join(" ");
    Logger::warn(
        Event::AccessDenied,
        &[
            ("action", action.as_str()),
            ("model", model),
            ("paths", joined.as_str()),
        ],
    );
    GateError::denied(action, model, paths)
}
