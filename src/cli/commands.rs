//! CLI command implementations
//!
//! Each command reads at most one JSON request from stdin and writes one
//! response line. The request handlers take parsed values so they can be
//! driven without a process.

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::gate::{AccessLevels, GateConfig, ReadPlan, ReadRequest, UpdatePlan};
use crate::observability::Logger;
use crate::query::{extract_paths, extract_update_paths, translate, translate_with_stats};
use crate::schema::{SchemaRegistry, DEFAULT_VERSION_KEY};
use crate::update::UpdateInterpreter;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// Body of a `check` request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CheckRequest {
    #[serde(flatten)]
    read: ReadRequest,
    update: Option<Value>,
    levels: AccessLevels,
}

/// Body of an `apply` request
#[derive(Debug, Deserialize)]
struct ApplyRequest {
    document: Value,
    command: Value,
    #[serde(default)]
    version_key: Option<String>,
}

/// Parse arguments, run the command and write its response.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match run_command(cli.command) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run a command, returning the response data
pub fn run_command(command: Command) -> CliResult<Value> {
    match command {
        Command::Compile { schema, config } => compile(&schema, config.as_deref()),
        Command::Translate => translate_request(&read_request()?),
        Command::Paths => paths_request(&read_request()?),
        Command::Check { config, model } => {
            let config = load_config(&config)?;
            check_request(&config, &model, read_request()?)
        }
        Command::Apply { version_key } => apply_request(&version_key, read_request()?),
    }
}

/// Compile one schema file and return its index.
pub fn compile(schema: &Path, config: Option<&Path>) -> CliResult<Value> {
    let (defaults, version_key) = match config {
        Some(path) => {
            let config = load_config(path)?;
            (config.defaults, config.version_key)
        }
        None => {
            let config = GateConfig::new(".");
            (config.defaults, config.version_key)
        }
    };

    let mut registry = SchemaRegistry::new(defaults).with_version_key(version_key);
    let index = registry.load_schema_file(schema)?;
    let name = registry.names().first().map(|n| n.to_string()).unwrap_or_default();

    Ok(json!({
        "schema": name,
        "index": serde_json::to_value(&*index)?,
    }))
}

/// Translate a portable filter.
pub fn translate_request(filter: &Value) -> CliResult<Value> {
    let (filter, complexity) = translate_with_stats(filter);
    Ok(json!({
        "filter": filter,
        "complexity": complexity,
    }))
}

/// Extract the paths of `filter` and `update` members of the request.
pub fn paths_request(request: &Value) -> CliResult<Value> {
    let filter = request.get("filter");
    let update = request.get("update");
    if filter.is_none() && update.is_none() {
        return Err(CliError::bad_request(
            "request needs a \"filter\" or an \"update\" member",
        ));
    }

    let mut out = serde_json::Map::new();
    if let Some(filter) = filter {
        out.insert("filter".into(), json!(extract_paths(&translate(filter))));
    }
    if let Some(update) = update {
        out.insert("update".into(), json!(extract_update_paths(update)));
    }
    Ok(Value::Object(out))
}

/// Validate a request against `model` without touching a store.
pub fn check_request(config: &GateConfig, model: &str, request: Value) -> CliResult<Value> {
    let request: CheckRequest = serde_json::from_value(request)
        .map_err(|e| CliError::bad_request(format!("Invalid check request: {}", e)))?;

    let mut registry = SchemaRegistry::new(config.defaults)
        .with_schema_dir(&config.schema_dir)
        .with_version_key(&config.version_key);
    registry.load_all()?;

    let plan = ReadPlan::build(&registry, config, model, &request.read, &request.levels)?;
    let mut valid = *plan.valid();
    let mut update_paths = Vec::new();

    if let Some(command) = &request.update {
        let update = UpdatePlan::build(&registry, model, &request.read.find, command, &request.levels)?;
        valid.update = Some(update.is_update_allowed());
        update_paths = update.update_paths().to_vec();
    }

    Ok(json!({
        "valid": valid,
        "filter": plan.filter(),
        "read_paths": plan.read_paths(),
        "update_paths": update_paths,
        "select": plan.select(),
        "populate": plan.populate(),
        "sort": plan.sort(),
        "skip": plan.skip(),
        "limit": plan.limit(),
        "complexity": plan.complexity(),
    }))
}

/// Apply an update command to a document.
pub fn apply_request(version_key: &str, request: Value) -> CliResult<Value> {
    let request: ApplyRequest = serde_json::from_value(request)
        .map_err(|e| CliError::bad_request(format!("Invalid apply request: {}", e)))?;

    let key = request
        .version_key
        .as_deref()
        .into_iter()
        .chain([version_key])
        .find(|k| !k.is_empty())
        .unwrap_or(DEFAULT_VERSION_KEY);

    let mut document = request.document;
    UpdateInterpreter::new(key).apply(&mut document, &request.command)?;
    Ok(document)
}

fn load_config(path: &Path) -> CliResult<GateConfig> {
    let config = GateConfig::load(path).map_err(|e| CliError::config_error(e.to_string()))?;
    let severity = config
        .log_severity()
        .map_err(|e| CliError::config_error(e.to_string()))?;
    Logger::set_min_severity(severity);
    Ok(config)
}
