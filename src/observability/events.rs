//! Observable events for fieldgate
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Configuration loaded
    ConfigLoaded,
    /// A schema was registered with the registry
    SchemaRegistered,
    /// A schema was compiled into a path access index
    IndexCompiled,
    /// A request was refused by the access validator
    AccessDenied,
    /// A requested selection was replaced by the allowed projection
    SelectionNarrowed,
    /// A date token value could not be parsed and was passed through
    DateCoercionFailed,
    /// A script token was removed from a filter
    ScriptTokenDropped,
    /// An update command was applied to a document
    UpdateApplied,
}

impl Event {
    /// Returns the event name as it appears in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemaRegistered => "SCHEMA_REGISTERED",
            Event::IndexCompiled => "INDEX_COMPILED",
            Event::AccessDenied => "ACCESS_DENIED",
            Event::SelectionNarrowed => "SELECTION_NARROWED",
            Event::DateCoercionFailed => "DATE_COERCION_FAILED",
            Event::ScriptTokenDropped => "SCRIPT_TOKEN_DROPPED",
            Event::UpdateApplied => "UPDATE_APPLIED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
