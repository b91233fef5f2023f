//! Document store collaborator
//!
//! The gate never touches storage itself. It hands native filters and
//! projections to a [`DocumentStore`] after the access checks passed.

use serde::Serialize;
use serde_json::Value;

use crate::query::PopulateRequest;

use super::errors::StoreError;

/// A find request in native vocabulary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindQuery {
    /// Translated filter
    pub filter: Value,
    /// Space-separated projection
    pub projection: String,
    /// Sort specification
    pub sort: String,
    pub skip: u64,
    /// Page size; 0 means unbounded
    pub limit: u64,
    /// Reference paths to expand, each with an approved selection
    pub populate: Vec<PopulateRequest>,
}

impl FindQuery {
    /// Every document matching `filter`, unprojected and unpaged
    pub fn matching(filter: Value) -> Self {
        Self {
            filter,
            projection: String::new(),
            sort: String::new(),
            skip: 0,
            limit: 0,
            populate: Vec::new(),
        }
    }
}

/// Storage operations the gate drives
pub trait DocumentStore {
    /// Finds documents of `model`.
    fn find(&self, model: &str, query: &FindQuery) -> Result<Vec<Value>, StoreError>;

    /// Counts documents of `model` matching `filter`.
    fn count(&self, model: &str, filter: &Value) -> Result<u64, StoreError>;

    /// Inserts or replaces a document, returning the stored version.
    fn save(&mut self, model: &str, document: Value) -> Result<Value, StoreError>;

    /// Removes documents matching `filter`, returning how many were removed.
    fn remove(&mut self, model: &str, filter: &Value) -> Result<u64, StoreError>;
}
