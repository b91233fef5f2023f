//! Per-path access validator
//!
//! All checks are pure and return booleans; the caller decides how to
//! surface a denial. A path that the index does not know is denied unless
//! it is a reserved root field.
//!
//! Selection strings are space-separated dotted paths. `-path` marks an
//! exclusion and is never checked; `+path` is checked as `path`.

use crate::query::PopulateRequest;

use super::index::{AccessLevel, Action, PathAccessIndex};

/// Access checks against one compiled index
#[derive(Debug, Clone, Copy)]
pub struct AccessValidator<'a> {
    index: &'a PathAccessIndex,
}

impl<'a> AccessValidator<'a> {
    pub fn new(index: &'a PathAccessIndex) -> Self {
        Self { index }
    }

    /// Returns the index this validator checks against
    pub fn index(&self) -> &'a PathAccessIndex {
        self.index
    }

    /// Document-level create check
    pub fn can_create(&self, level: AccessLevel) -> bool {
        level >= self.index.create_threshold()
    }

    /// Document-level delete check
    pub fn can_delete(&self, level: AccessLevel) -> bool {
        level >= self.index.delete_threshold()
    }

    /// Returns true if `action` on `path` is granted at or below `level`.
    pub fn path_allowed(&self, path: &str, action: Action, level: AccessLevel) -> bool {
        self.index.is_reserved(path) || self.index.granted_level(path, action, level).is_some()
    }

    /// Returns true if every path is readable at `level`.
    pub fn can_read_paths<S: AsRef<str>>(&self, paths: &[S], level: AccessLevel) -> bool {
        self.all_allowed(paths, Action::Read, level)
    }

    /// Returns true if every path is updatable at `level`.
    pub fn can_update_paths<S: AsRef<str>>(&self, paths: &[S], level: AccessLevel) -> bool {
        self.all_allowed(paths, Action::Update, level)
    }

    /// Returns the paths from `paths` that are denied for `action` at `level`.
    pub fn denied_paths<S: AsRef<str>>(
        &self,
        paths: &[S],
        action: Action,
        level: AccessLevel,
    ) -> Vec<String> {
        paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|path| !self.path_allowed(path, action, level))
            .map(str::to_string)
            .collect()
    }

    fn all_allowed<S: AsRef<str>>(&self, paths: &[S], action: Action, level: AccessLevel) -> bool {
        paths
            .iter()
            .all(|path| self.path_allowed(path.as_ref(), action, level))
    }

    /// Validates a selection string for reading at `level`.
    ///
    /// A selection with no included paths asks for the whole document, so
    /// every addressable path must be readable.
    pub fn can_select(&self, select: &str, level: AccessLevel) -> bool {
        let included = included_paths(select);
        if included.is_empty() {
            return self.can_read_paths(self.index.all(), level);
        }
        self.can_read_paths(&included, level)
    }

    /// Every path readable at `level`, lowest level first
    pub fn allowed_projection(&self, level: AccessLevel) -> Vec<String> {
        self.index.granted_paths(Action::Read, level)
    }

    /// Allowed projection as a space-joined selection string
    pub fn allowed_projection_string(&self, level: AccessLevel) -> String {
        self.allowed_projection(level).join(" ")
    }

    /// Narrows `select` to the entries readable at `level`.
    ///
    /// Exclusions are always kept and markers are preserved verbatim.
    pub fn optimistic_select(&self, select: &str, level: AccessLevel) -> String {
        select
            .split_whitespace()
            .filter(|entry| match entry.strip_prefix('-') {
                Some(_) => true,
                None => {
                    let path = entry.strip_prefix('+').unwrap_or(entry);
                    self.path_allowed(path, Action::Read, level)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Fills a blank populate selection with the allowed projection.
    ///
    /// `self` must wrap the index of the populated (related) schema.
    pub fn resolve_populate(&self, request: &PopulateRequest, level: AccessLevel) -> PopulateRequest {
        if request.has_blank_select() {
            PopulateRequest::new(request.path.clone(), self.allowed_projection_string(level))
        } else {
            request.clone()
        }
    }

    /// Validates a populate request against the related schema's index.
    pub fn can_populate(&self, request: &PopulateRequest, level: AccessLevel) -> bool {
        let resolved = self.resolve_populate(request, level);
        self.can_select(&resolved.select, level)
    }

    /// Narrows a populate request's selection to what is readable at `level`.
    pub fn optimistic_populate(
        &self,
        request: &PopulateRequest,
        level: AccessLevel,
    ) -> PopulateRequest {
        let resolved = self.resolve_populate(request, level);
        PopulateRequest::new(resolved.path, self.optimistic_select(&resolved.select, level))
    }
}

/// Included paths of a selection string, markers stripped
pub fn included_paths(select: &str) -> Vec<&str> {
    select
        .split_whitespace()
        .filter(|entry| !entry.starts_with('-'))
        .map(|entry| entry.strip_prefix('+').unwrap_or(entry))
        .filter(|path| !path.is_empty())
        .collect()
}
