//! Compiled path access index
//!
//! `paths[level][action]` lists the dotted paths granted at exactly that
//! level for that action. Holding level N implies every grant at 0..=N for
//! the same action, so lookups scan downward from the caller's level.
//!
//! The index is built once by the compiler and never mutated afterwards;
//! share it behind an `Arc` across any number of concurrent requests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Non-negative privilege tier. Higher is strictly more permissive.
pub type AccessLevel = u32;

/// Access-controlled actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    /// All actions in canonical order
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    /// Returns the action name
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Paths granted per action at a single level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionGrants {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    create: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    read: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    update: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    delete: Vec<String>,
}

impl ActionGrants {
    /// Returns the paths granted for an action, in registration order
    pub fn get(&self, action: Action) -> &[String] {
        match action {
            Action::Create => &self.create,
            Action::Read => &self.read,
            Action::Update => &self.update,
            Action::Delete => &self.delete,
        }
    }

    fn get_mut(&mut self, action: Action) -> &mut Vec<String> {
        match action {
            Action::Create => &mut self.create,
            Action::Read => &mut self.read,
            Action::Update => &mut self.update,
            Action::Delete => &mut self.delete,
        }
    }

    fn contains(&self, action: Action, path: &str) -> bool {
        self.get(action).iter().any(|p| p == path)
    }
}

/// Immutable compiled access index for one schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathAccessIndex {
    paths: BTreeMap<AccessLevel, ActionGrants>,
    all: Vec<String>,
    create: AccessLevel,
    delete: AccessLevel,
    #[serde(skip)]
    reserved: Vec<String>,
}

impl PathAccessIndex {
    /// Paths granted at exactly `level` for `action`
    pub fn paths_at(&self, level: AccessLevel, action: Action) -> &[String] {
        self.paths
            .get(&level)
            .map(|grants| grants.get(action))
            .unwrap_or(&[])
    }

    /// Every addressable path, in walk order
    pub fn all(&self) -> &[String] {
        &self.all
    }

    /// Document-level create threshold
    pub fn create_threshold(&self) -> AccessLevel {
        self.create
    }

    /// Document-level delete threshold
    pub fn delete_threshold(&self) -> AccessLevel {
        self.delete
    }

    /// Levels that carry at least one grant, ascending
    pub fn levels(&self) -> impl Iterator<Item = AccessLevel> + '_ {
        self.paths.keys().copied()
    }

    /// Reserved root fields (identifier, version counter)
    pub fn reserved(&self) -> &[String] {
        &self.reserved
    }

    /// Returns true if `path` is a reserved root field
    pub fn is_reserved(&self, path: &str) -> bool {
        self.reserved.iter().any(|r| r == path)
    }

    /// Returns true if `path` is addressable in this schema
    pub fn contains_path(&self, path: &str) -> bool {
        self.all.iter().any(|p| p == path)
    }

    /// Finds the first level at or below `ceiling` that grants `action` on `path`.
    ///
    /// Scans from `ceiling` down to 0; since each path is registered once per
    /// action, the first hit is also the minimum sufficient level.
    pub fn granted_level(
        &self,
        path: &str,
        action: Action,
        ceiling: AccessLevel,
    ) -> Option<AccessLevel> {
        self.paths
            .range(..=ceiling)
            .rev()
            .find(|(_, grants)| grants.contains(action, path))
            .map(|(level, _)| *level)
    }

    /// Every path granted for `action` at levels `0..=ceiling`, lowest level first
    pub fn granted_paths(&self, action: Action, ceiling: AccessLevel) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for grants in self.paths.range(..=ceiling).map(|(_, g)| g) {
            for path in grants.get(action) {
                if !out.contains(path) {
                    out.push(path.clone());
                }
            }
        }
        out
    }
}

/// Mutable builder used by the compiler. Consumed into an immutable index.
#[derive(Debug, Default)]
pub(crate) struct IndexBuilder {
    paths: BTreeMap<AccessLevel, ActionGrants>,
    all: Vec<String>,
    reserved: Vec<String>,
}

impl IndexBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Grants `action` on `path` at `level`. Repeated grants are ignored.
    pub(crate) fn grant(&mut self, level: AccessLevel, action: Action, path: &str) {
        let grants = self.paths.entry(level).or_default();
        if !grants.contains(action, path) {
            grants.get_mut(action).push(path.to_string());
        }
    }

    /// Records an addressable path. Each path is recorded once.
    pub(crate) fn add_path(&mut self, path: &str) {
        if !self.all.iter().any(|p| p == path) {
            self.all.push(path.to_string());
        }
    }

    pub(crate) fn has_path(&self, path: &str) -> bool {
        self.all.iter().any(|p| p == path)
    }

    pub(crate) fn add_reserved(&mut self, path: &str) {
        self.grant(0, Action::Read, path);
        self.add_path(path);
        if !self.reserved.iter().any(|p| p == path) {
            self.reserved.push(path.to_string());
        }
    }

    /// Highest level at which `action` is granted on any path below `prefix`.
    pub(crate) fn max_level_under(&self, prefix: &str, action: Action) -> Option<AccessLevel> {
        let nested = format!("{}.", prefix);
        self.paths
            .iter()
            .rev()
            .find(|(_, grants)| grants.get(action).iter().any(|p| p.starts_with(&nested)))
            .map(|(level, _)| *level)
    }

    pub(crate) fn build(self, create: AccessLevel, delete: AccessLevel) -> PathAccessIndex {
        PathAccessIndex {
            paths: self.paths,
            all: self.all,
            create,
            delete,
            reserved: self.reserved,
        }
    }
}
