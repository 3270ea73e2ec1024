//! Definitions store - the persistent symbol table behind every directive and macro.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Keys the preprocessor reads or writes on its own.
pub mod keys {
    /// Pass counter, incremented on every context pass.
    pub const TURN: &str = "TURN";
    /// Pending continuation guidance set by `#next`.
    pub const NEXT: &str = "NEXT";
    /// Turn at which `NEXT` expires.
    pub const TURNXT: &str = "TURNXT";
    /// Per-pass buffer filled by `#debug`.
    pub const DEBUG: &str = "DEBUG";
    /// When defined, `#debug` lines are ignored.
    pub const DEBUG_OFF: &str = "DEBUG_OFF";
    /// Last player input, visible during the context pass.
    pub const USER_INPUT: &str = "USER_INPUT";
    /// Last reply after output commands were applied.
    pub const LAST_OUTPUT: &str = "LAST_OUTPUT";
    /// Capture groups of the last successful `REGEX()` call.
    pub const MATCH_GROUPS: [&str; 3] = ["M1", "M2", "M3"];
}

/// Resolve namespace-local keys.
///
/// `L:name` and `LOCAL:name` (prefix matched case-insensitively) become
/// `NAMESPACE_name`. Every other key is returned unchanged.
pub fn resolve_key(namespace: &str, key: &str) -> String {
    let upper = key.to_ascii_uppercase();
    if upper.starts_with("LOCAL:") {
        format!("{}_{}", namespace, &key[6..])
    } else if upper.starts_with("L:") {
        format!("{}_{}", namespace, &key[2..])
    } else {
        key.to_string()
    }
}

/// Typed view of a stored definition value.
///
/// The store itself only ever holds strings. A value counts as a number when
/// its trimmed text parses as a finite `f64`; everything else is text. This is
/// the single predicate used for number-vs-text decisions.
#[derive(Debug, Clone, PartialEq)]
pub enum DefValue {
    Number(f64),
    Text(String),
}

impl DefValue {
    /// Classify a raw stored value.
    pub fn classify(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => DefValue::Number(n),
            _ => DefValue::Text(raw.to_string()),
        }
    }

    /// Check whether a raw value would classify as a number.
    pub fn is_numeric(raw: &str) -> bool {
        matches!(Self::classify(raw), DefValue::Number(_))
    }
}

impl fmt::Display for DefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefValue::Number(n) => write!(f, "{}", format_number(*n)),
            DefValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Render a number the way authors expect to see it in story text.
///
/// Integral values print without a fractional part, negative zero prints as
/// `0`, and non-finite values use the `NaN`/`Infinity` spellings.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

/// The persistent key-value store of definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defs {
    entries: BTreeMap<String, String>,
}

impl Default for Defs {
    fn default() -> Self {
        Self::new()
    }
}

impl Defs {
    /// Create a store holding only the turn counter.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(keys::TURN.to_string(), "-1".to_string());
        Self { entries }
    }

    /// Get a value by its already-resolved key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    /// Check if a key is defined. An empty value still counts as defined.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Define or overwrite a key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        debug!(key = %key, value = %value, "Setting definition");
        self.entries.insert(key, value);
    }

    /// Append text to a key, defining it if absent.
    pub fn append(&mut self, key: &str, suffix: &str) {
        let entry = self.entries.entry(key.to_string()).or_default();
        entry.push_str(suffix);
        debug!(key = %key, value = %entry, "Appended to definition");
    }

    /// Remove a key, returning its old value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        if key == keys::TURN {
            debug!("Refusing to remove the turn counter");
            return None;
        }
        debug!(key = %key, "Removing definition");
        self.entries.remove(key)
    }

    /// Iterate over all definitions in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of definitions, including `TURN`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false in practice since `TURN` is never removed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current turn number (`-1` before the first pass).
    pub fn turn(&self) -> i64 {
        self.get(keys::TURN)
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(-1)
    }

    /// Increment the turn counter and return the new value.
    pub fn advance_turn(&mut self) -> i64 {
        let next = self.turn() + 1;
        self.entries.insert(keys::TURN.to_string(), next.to_string());
        next
    }

    /// Drop pending guidance once its expiry turn has been reached.
    ///
    /// Returns true when guidance was removed.
    pub fn expire_guidance(&mut self) -> bool {
        let expiry = self
            .get(keys::TURNXT)
            .and_then(|t| t.trim().parse::<i64>().ok());
        match expiry {
            Some(expiry) if self.turn() >= expiry => {
                self.entries.remove(keys::NEXT);
                self.entries.remove(keys::TURNXT);
                debug!(turn = self.turn(), expiry, "Guidance expired");
                true
            }
            _ => false,
        }
    }

    /// Render all definitions as `KEY=value` pairs for the author log.
    pub fn dump(&self) -> String {
        self.iter()
            .filter(|(k, _)| *k != keys::LAST_OUTPUT)
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
