//! Operator token classification
//!
//! Every key seen by the translator, extractor or interpreter goes through
//! one of the two classification functions here. Portable tokens carry the
//! `_$` prefix, native tokens the `$` prefix. Anything else is a field name.

/// Prefix of portable (transport-safe) operator tokens
pub const PORTABLE_PREFIX: &str = "_$";

/// Prefix of native operator tokens
pub const NATIVE_PREFIX: &str = "$";

/// Returns true if `key` looks like an operator, portable or native.
pub fn is_operator_key(key: &str) -> bool {
    key.starts_with(NATIVE_PREFIX) || key.starts_with(PORTABLE_PREFIX)
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
    Size,
    All,
    Type,
    Mod,
}

impl Comparison {
    /// Native spelling
    pub fn native(&self) -> &'static str {
        match self {
            Comparison::Eq => "$eq",
            Comparison::Ne => "$ne",
            Comparison::Gt => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Lt => "$lt",
            Comparison::Lte => "$lte",
            Comparison::In => "$in",
            Comparison::Nin => "$nin",
            Comparison::Exists => "$exists",
            Comparison::Size => "$size",
            Comparison::All => "$all",
            Comparison::Type => "$type",
            Comparison::Mod => "$mod",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => Comparison::Eq,
            "ne" => Comparison::Ne,
            "gt" => Comparison::Gt,
            "gte" => Comparison::Gte,
            "lt" => Comparison::Lt,
            "lte" => Comparison::Lte,
            "in" => Comparison::In,
            "nin" => Comparison::Nin,
            "exists" => Comparison::Exists,
            "size" => Comparison::Size,
            "all" => Comparison::All,
            "type" => Comparison::Type,
            "mod" => Comparison::Mod,
            _ => return None,
        })
    }

    /// Comparisons that have a date-coercing portable form
    fn from_date_name(name: &str) -> Option<Self> {
        Some(match name {
            "dgt" => Comparison::Gt,
            "dgte" => Comparison::Gte,
            "dlt" => Comparison::Lt,
            "dlte" => Comparison::Lte,
            "deq" => Comparison::Eq,
            "dne" => Comparison::Ne,
            _ => return None,
        })
    }
}

/// Logical grouping operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logical {
    And,
    Or,
    Nor,
    Not,
}

impl Logical {
    /// Native spelling
    pub fn native(&self) -> &'static str {
        match self {
            Logical::And => "$and",
            Logical::Or => "$or",
            Logical::Nor => "$nor",
            Logical::Not => "$not",
        }
    }
}

/// Classification of a filter key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorToken {
    /// Portable comparison (`_$gt`, `_$in`, ...)
    Comparison(Comparison),
    /// Portable date comparison (`_$dgt`, ...), value coerced to a date
    DateComparison(Comparison),
    /// Portable regex carrying `{value, flags}`
    Regex,
    /// Portable logical group
    Logical(Logical),
    /// Portable element match
    ElemMatch,
    /// Server-side script execution, portable or native
    Script,
    /// Already-native operator
    Native,
    /// Portable-looking key outside the known set
    Unrecognized,
    /// Plain field name
    Field,
}

/// Classifies a filter key.
pub fn classify(key: &str) -> OperatorToken {
    if key == "$where" {
        return OperatorToken::Script;
    }

    let name = match key.strip_prefix(PORTABLE_PREFIX) {
        Some(name) => name,
        None if key.starts_with(NATIVE_PREFIX) => return OperatorToken::Native,
        None => return OperatorToken::Field,
    };

    if let Some(cmp) = Comparison::from_name(name) {
        return OperatorToken::Comparison(cmp);
    }
    if let Some(cmp) = Comparison::from_date_name(name) {
        return OperatorToken::DateComparison(cmp);
    }

    match name {
        "regex" => OperatorToken::Regex,
        "and" => OperatorToken::Logical(Logical::And),
        "or" => OperatorToken::Logical(Logical::Or),
        "nor" => OperatorToken::Logical(Logical::Nor),
        "not" => OperatorToken::Logical(Logical::Not),
        "elemMatch" => OperatorToken::ElemMatch,
        "where" => OperatorToken::Script,
        _ => OperatorToken::Unrecognized,
    }
}

/// Returns true if `key` is an element-match wrapper the extractor drills into.
pub fn is_drill_wrapper(key: &str) -> bool {
    matches!(key, "$elemMatch" | "_$elemMatch" | DO_KEY)
}

/// Predicate key of an addressed update argument
pub const WHERE_KEY: &str = "_$where_";
/// Payload key of an addressed update argument
pub const DO_KEY: &str = "_$do_";
/// Position key of an index-addressed update argument
pub const INDEX_KEY: &str = "_$index_";

/// Update mutation verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateVerb {
    Set,
    Inc,
    Push,
    Pull,
    AddToSet,
}

impl UpdateVerb {
    /// Native spelling
    pub fn native(&self) -> &'static str {
        match self {
            UpdateVerb::Set => "$set",
            UpdateVerb::Inc => "$inc",
            UpdateVerb::Push => "$push",
            UpdateVerb::Pull => "$pull",
            UpdateVerb::AddToSet => "$addToSet",
        }
    }
}

/// Classification of an update command key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKey {
    Verb(UpdateVerb),
    Where,
    Do,
    Index,
    /// Operator-looking key that is not a known verb; ignored
    UnknownVerb,
    Field,
}

/// Classifies an update command key. Native verb spellings are accepted.
pub fn classify_update(key: &str) -> UpdateKey {
    match key {
        WHERE_KEY => return UpdateKey::Where,
        DO_KEY => return UpdateKey::Do,
        INDEX_KEY => return UpdateKey::Index,
        _ => {}
    }

    let name = match key
        .strip_prefix(PORTABLE_PREFIX)
        .or_else(|| key.strip_prefix(NATIVE_PREFIX))
    {
        Some(name) => name,
        None => return UpdateKey::Field,
    };

    match name {
        "set" => UpdateKey::Verb(UpdateVerb::Set),
        "inc" => UpdateKey::Verb(UpdateVerb::Inc),
        "push" => UpdateKey::Verb(UpdateVerb::Push),
        "pull" => UpdateKey::Verb(UpdateVerb::Pull),
        "addToSet" => UpdateKey::Verb(UpdateVerb::AddToSet),
        _ => UpdateKey::UnknownVerb,
    }
}
