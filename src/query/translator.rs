//! Portable-to-native filter translation
//!
//! Pure rewrite: the input is never mutated and translation never fails.
//! - comparison tokens become their native spelling
//! - date tokens become native comparisons over `{"$date": <RFC 3339>}`
//! - `_$regex: {value, flags}` becomes `$regex` + `$options`
//! - logical tokens recurse into each sub-filter, in order
//! - plain arrays outside logical tokens are literals
//! - script tokens are dropped
//! - unrecognized tokens pass through untouched

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::observability::{Event, Logger};

use super::token::{classify, OperatorToken};

/// Operator counts gathered during translation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryComplexity {
    pub regex: usize,
    /// Logical tokens plus every sub-filter they carry
    pub logical: usize,
    pub comparison: usize,
    pub date: usize,
    /// Script tokens removed from the filter
    pub dropped: usize,
}

impl QueryComplexity {
    /// Sum of all counters
    pub fn total(&self) -> usize {
        self.regex + self.logical + self.comparison + self.date + self.dropped
    }
}

/// Translates a portable filter into native operators.
pub fn translate(filter: &Value) -> Value {
    translate_with_stats(filter).0
}

/// Translates a filter and reports its operator counts.
pub fn translate_with_stats(filter: &Value) -> (Value, QueryComplexity) {
    let mut translator = Translator::default();
    let out = translator.value(filter);
    (out, translator.stats)
}

#[derive(Default)]
struct Translator {
    stats: QueryComplexity,
}

impl Translator {
    /// Objects recurse; every other value is copied as a literal.
    fn value(&mut self, value: &Value) -> Value {
        match value {
            Value::Object(obj) => Value::Object(self.object(obj)),
            other => other.clone(),
        }
    }

    fn object(&mut self, obj: &Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();

        for (key, value) in obj {
            match classify(key) {
                OperatorToken::Field | OperatorToken::Native => {
                    out.insert(key.clone(), self.value(value));
                }
                OperatorToken::Comparison(cmp) => {
                    self.stats.comparison += 1;
                    out.insert(cmp.native().to_string(), self.value(value));
                }
                OperatorToken::DateComparison(cmp) => {
                    self.stats.date += 1;
                    out.insert(cmp.native().to_string(), date_value(key, value));
                }
                OperatorToken::Regex => {
                    self.stats.regex += 1;
                    let (pattern, flags) = regex_parts(value);
                    out.insert("$regex".to_string(), pattern);
                    if let Some(flags) = flags {
                        out.insert("$options".to_string(), Value::String(flags));
                    }
                }
                OperatorToken::Logical(op) => {
                    self.stats.logical += 1;
                    let translated = match value {
                        Value::Array(items) => {
                            self.stats.logical += items.len();
                            Value::Array(items.iter().map(|item| self.value(item)).collect())
                        }
                        other => self.value(other),
                    };
                    out.insert(op.native().to_string(), translated);
                }
                OperatorToken::ElemMatch => {
                    out.insert("$elemMatch".to_string(), self.value(value));
                }
                OperatorToken::Script => {
                    self.stats.dropped += 1;
                    Logger::warn(Event::ScriptTokenDropped, &[("key", key.as_str())]);
                }
                OperatorToken::Unrecognized => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }

        out
    }
}

/// Splits a regex token value into its pattern and non-empty flags.
///
/// Accepts `{value, flags}`, the older `{val, options}`, or a bare pattern.
fn regex_parts(value: &Value) -> (Value, Option<String>) {
    let obj = match value {
        Value::Object(obj) => obj,
        other => return (other.clone(), None),
    };

    let pattern = obj
        .get("value")
        .or_else(|| obj.get("val"))
        .cloned()
        .unwrap_or(Value::Null);
    let flags = obj
        .get("flags")
        .or_else(|| obj.get("options"))
        .and_then(Value::as_str)
        .filter(|flags| !flags.is_empty())
        .map(str::to_string);

    (pattern, flags)
}

fn date_value(key: &str, value: &Value) -> Value {
    match coerce_date(value) {
        Some(date) => json!({ "$date": date.to_rfc3339_opts(SecondsFormat::Millis, true) }),
        None => {
            let raw = value.to_string();
            Logger::warn(
                Event::DateCoercionFailed,
                &[("key", key), ("value", raw.as_str())],
            );
            value.clone()
        }
    }
}

/// Parses a date token value.
///
/// Accepts RFC 3339, `YYYY-MM-DD`, `MM-DD-YYYY`, `YYYY-MM-DDTHH:MM:SS`
/// (read as UTC), integer epoch milliseconds, and an already-translated
/// `{"$date": ...}` wrapper.
pub fn coerce_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_date_str(raw.trim()),
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
        Value::Object(obj) if obj.len() == 1 => coerce_date(obj.get("$date")?),
        _ => None,
    }
}

fn parse_date_str(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    for format in ["%Y-%m-%d", "%m-%d-%Y"] {
        if let Ok(day) = NaiveDate::parse_from_str(raw, format) {
            return day.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}
