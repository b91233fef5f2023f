//! # Gate Errors
//!
//! Error codes:
//! - FG_ACCESS_DENIED (REJECT)
//! - FG_LIMIT_EXCEEDED (REJECT)
//! - FG_STORE_FAILED (REJECT)
//! - FG_MISSING_INDEX (FATAL)
//! - FG_MALFORMED_COMMAND (FATAL)
//! - FG_CONFIG_INVALID (FATAL)
//! - FG_SCHEMA_* (from schema loading)

use thiserror::Error;

use crate::acl::Action;
use crate::schema::{SchemaError, Severity};
use crate::update::UpdateError;

/// Result type for gate operations
pub type GateResult<T> = Result<T, GateError>;

/// Failure reported by a document store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Request gate errors
#[derive(Debug, Clone, Error)]
pub enum GateError {
    /// The validator refused the request
    #[error("Access denied: {action} on '{model}' ({})", .paths.join(", "))]
    AccessDenied {
        action: Action,
        model: String,
        /// Offending paths; empty for document-level checks
        paths: Vec<String>,
    },

    /// Requested page size above the configured maximum
    #[error("Limit {requested} exceeds maximum {max}")]
    LimitExceeded { requested: u64, max: u64 },

    /// Schema registration, loading, or index lookup failed
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// The update command is malformed
    #[error("Malformed command: {0}")]
    MalformedCommand(#[from] UpdateError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The document store failed
    #[error("Store failed: {0}")]
    Store(#[from] StoreError),
}

impl GateError {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            GateError::AccessDenied { .. } => "FG_ACCESS_DENIED",
            GateError::LimitExceeded { .. } => "FG_LIMIT_EXCEEDED",
            GateError::Schema(e) => e.code().code(),
            GateError::MalformedCommand(_) => "FG_MALFORMED_COMMAND",
            GateError::Config(_) => "FG_CONFIG_INVALID",
            GateError::Store(_) => "FG_STORE_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            GateError::AccessDenied { .. } | GateError::LimitExceeded { .. } | GateError::Store(_) => {
                Severity::Reject
            }
            GateError::Schema(e) => e.severity(),
            GateError::MalformedCommand(_) | GateError::Config(_) => Severity::Fatal,
        }
    }

    /// Returns whether the request must be aborted as a defect
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub(crate) fn denied(action: Action, model: &str, paths: Vec<String>) -> Self {
        GateError::AccessDenied {
            action,
            model: model.to_string(),
            paths,
        }
    }
}
