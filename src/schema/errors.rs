//! Schema error types
//!
//! Error codes:
//! - FG_SCHEMA_MALFORMED (FATAL)
//! - FG_SCHEMA_IMMUTABLE (REJECT)
//! - FG_MISSING_INDEX (FATAL)

use std::fmt;

/// Severity levels for schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request rejected, process keeps serving
    Reject,
    /// Configuration defect, the request must be aborted without retry
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Schema file could not be read or parsed, or has an invalid structure
    FgSchemaMalformed,
    /// Attempt to register a schema name twice
    FgSchemaImmutable,
    /// No compiled index exists for the requested schema
    FgMissingIndex,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::FgSchemaMalformed => "FG_SCHEMA_MALFORMED",
            SchemaErrorCode::FgSchemaImmutable => "FG_SCHEMA_IMMUTABLE",
            SchemaErrorCode::FgMissingIndex => "FG_MISSING_INDEX",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SchemaErrorCode::FgSchemaImmutable => Severity::Reject,
            SchemaErrorCode::FgSchemaMalformed | SchemaErrorCode::FgMissingIndex => {
                Severity::Fatal
            }
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error type with full context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    schema: Option<String>,
}

impl SchemaError {
    /// Create an error for a malformed schema file or definition
    pub fn malformed_schema(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::FgSchemaMalformed,
            message: format!("Malformed schema '{}': {}", source.into(), reason.into()),
            schema: None,
        }
    }

    /// Create a schema immutable error
    pub fn schema_immutable(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: SchemaErrorCode::FgSchemaImmutable,
            message: format!("Schema '{}' is already registered and cannot be replaced", name),
            schema: Some(name),
        }
    }

    /// Create a missing index error
    pub fn missing_index(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: SchemaErrorCode::FgMissingIndex,
            message: format!("No access index compiled for schema '{}'", name),
            schema: Some(name),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the schema name if applicable
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
