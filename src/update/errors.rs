//! # Update Errors
//!
//! Every variant is a malformed command: a defect in the caller's request
//! that must abort it without retry. A predicate that matches nothing is
//! not an error.

use thiserror::Error;

/// Result type for update interpretation
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Malformed update commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    /// The command itself is not an object
    #[error("Update command must be an object")]
    NotAnObject,

    /// No verb was found at any depth
    #[error("Update command contains no update verb")]
    NoVerb,

    /// `_$where_` and `_$index_` used together
    #[error("Cannot combine _$where_ and _$index_ addressing at '{0}'")]
    MixedAddressing(String),

    /// `_$do_` without `_$where_` or `_$index_`
    #[error("Addressed argument at '{0}' has no _$where_ or _$index_")]
    MissingAddress(String),

    /// Addressing keys outside a verb argument
    #[error("Addressing key outside of an update verb at '{0}'")]
    MisplacedAddress(String),

    /// Argument of the wrong shape for its verb
    #[error("Invalid {verb} argument at '{path}': {reason}")]
    InvalidArgument {
        verb: &'static str,
        path: String,
        reason: String,
    },

    /// The command descends through a value that is not an object
    #[error("Cannot descend into non-object value at '{0}'")]
    NotTraversable(String),

    /// Increment target is not a number
    #[error("Cannot increment non-numeric value at '{0}'")]
    NotNumeric(String),
}

impl UpdateError {
    /// Returns the error code shared by every malformed command
    pub fn code(&self) -> &'static str {
        "FG_MALFORMED_COMMAND"
    }

    pub(crate) fn invalid(verb: &'static str, path: &str, reason: impl Into<String>) -> Self {
        UpdateError::InvalidArgument {
            verb,
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        let err = UpdateError::MixedAddressing("docs".into());
        assert!(err.to_string().contains("docs"));
        assert_eq!(err.code(), "FG_MALFORMED_COMMAND");

        let err = UpdateError::invalid("$set", "meta", "expected an object");
        assert_eq!(err.to_string(), "Invalid $set argument at 'meta': expected an object");
    }
}
