//! Reproduction context attached to diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One `key = value` fact about where a diagnostic arose.
///
/// Typical keys are `cell`, `procedure`, `path`, `variation`, `condition`
/// and `offset`; together they identify the exact stimulus to re-run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// The kind of fact (e.g. `"path"`).
    pub key: String,
    /// Its rendered value (e.g. `"A rise -> Y rise"`).
    pub value: String,
}

impl ContextEntry {
    /// Creates a context entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ContextEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}
