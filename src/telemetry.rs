//! Telemetry line parsing and the live reading cache.
//!
//! The device emits one reading per line in the shape
//! `label1: value1, label2: value2`. Each value is coerced into a
//! [`TelemetryValue`] by trying, in order, an integer, a floating-point number
//! and finally falling back to the trimmed text. Nothing in this module ever
//! fails: a line without any `:` is ignored, pairs without a `:` are skipped,
//! and values that do not look numeric are kept as text.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::num::IntErrorKind;

/// A single typed reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    /// Whole-number reading, e.g. `temp: 26`.
    Integer(i64),
    /// Decimal reading, e.g. `voltage: 4.98`.
    Float(f64),
    /// Anything that did not coerce to a number, kept verbatim (trimmed).
    Text(String),
}

impl TelemetryValue {
    /// Coerces a raw (already trimmed) value.
    ///
    /// Integer parsing is only attempted when the text has no `.`; a failed
    /// integer parse still gets a floating-point attempt before falling back
    /// to text. `"3.14.15"` and `""` both end up as `Text`. Whole numbers
    /// outside the `i64` range are kept as `Text` rather than rounded to a
    /// float.
    pub fn coerce(raw: &str) -> Self {
        if !raw.contains('.') {
            match raw.parse::<i64>() {
                Ok(value) => return TelemetryValue::Integer(value),
                Err(err)
                    if matches!(
                        err.kind(),
                        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
                    ) =>
                {
                    return TelemetryValue::Text(raw.to_string());
                }
                Err(_) => {}
            }
        }
        match raw.parse::<f64>() {
            Ok(value) => TelemetryValue::Float(value),
            Err(_) => TelemetryValue::Text(raw.to_string()),
        }
    }

    /// Numeric view of the reading, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TelemetryValue::Integer(v) => Some(*v as f64),
            TelemetryValue::Float(v) => Some(*v),
            TelemetryValue::Text(_) => None,
        }
    }

    /// Integer view; only `Integer` readings qualify.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TelemetryValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view; only `Text` readings qualify.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TelemetryValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::Integer(v) => write!(f, "{}", v),
            TelemetryValue::Float(v) => write!(f, "{}", v),
            TelemetryValue::Text(s) => f.write_str(s),
        }
    }
}

/// Splits one line into `(label, value)` updates.
///
/// Returns an empty vector when the line carries no `:` at all. Pairs are
/// split on the first `:` only, so values may themselves contain colons.
pub fn parse_line(line: &str) -> Vec<(String, TelemetryValue)> {
    if !line.contains(':') {
        return Vec::new();
    }

    line.split(',')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(label, value)| {
            (
                label.trim().to_string(),
                TelemetryValue::coerce(value.trim()),
            )
        })
        .collect()
}

/// Latest reading per label.
///
/// Labels are never purged by ingestion: a label the device stops reporting
/// keeps its last value until [`TelemetryCache::clear`] is called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryCache {
    values: HashMap<String, TelemetryValue>,
}

impl TelemetryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `line` and replaces the entry of every label it mentions.
    ///
    /// Returns the number of fields applied; zero means the line was not
    /// telemetry.
    pub fn apply_line(&mut self, line: &str) -> usize {
        let updates = parse_line(line);
        let applied = updates.len();
        self.values.extend(updates);
        applied
    }

    /// Latest reading for `label` (case-sensitive).
    pub fn get(&self, label: &str) -> Option<&TelemetryValue> {
        self.values.get(label)
    }

    /// Owned copy of every reading.
    pub fn snapshot(&self) -> HashMap<String, TelemetryValue> {
        self.values.clone()
    }

    /// Known labels, sorted for stable display.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.values.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// Iterates over all readings in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TelemetryValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of labels held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no reading has been cached.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Forgets every reading.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}
