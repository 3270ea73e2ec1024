//! Author-facing log channel.
//!
//! Entries are collected during a pass and shown to the author inside the
//! reserved annotation block of the reply. Every entry is also forwarded to
//! `tracing` so hosts can capture them in their own logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// How much is written to the author log. Each level includes the ones below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Verbosity {
    Off = 0,
    Errors = 1,
    #[default]
    SystemErrors = 2,
    Version = 3,
    Variables = 4,
    AiExchange = 5,
    Story = 6,
    Context = 7,
    Commands = 8,
}

impl TryFrom<u8> for Verbosity {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Ok(match level {
            0 => Verbosity::Off,
            1 => Verbosity::Errors,
            2 => Verbosity::SystemErrors,
            3 => Verbosity::Version,
            4 => Verbosity::Variables,
            5 => Verbosity::AiExchange,
            6 => Verbosity::Story,
            7 => Verbosity::Context,
            8 => Verbosity::Commands,
            other => return Err(format!("verbosity {} is out of range 0..=8", other)),
        })
    }
}

impl From<Verbosity> for u8 {
    fn from(level: Verbosity) -> Self {
        level as u8
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Per-pass buffer of author log lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassLog {
    verbosity: Verbosity,
    text: String,
}

impl PassLog {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            text: String::new(),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    /// Check whether entries at `level` are kept.
    pub fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::Off && self.verbosity >= level
    }

    /// Record an entry at the given level.
    pub fn record(&mut self, level: Verbosity, message: impl AsRef<str>) {
        let message = message.as_ref();
        match level {
            Verbosity::Errors | Verbosity::SystemErrors => {
                warn!(level = %level, "{}", message)
            }
            _ => debug!(level = %level, "{}", message),
        }

        if !self.enabled(level) {
            return;
        }
        match level {
            Verbosity::Errors => self.text.push_str("ERROR: "),
            Verbosity::SystemErrors => self.text.push_str("System ERROR: "),
            _ => {}
        }
        self.text.push_str(message);
        self.text.push('\n');
    }

    /// Mistake in the author's directives or macros.
    pub fn error(&mut self, message: impl AsRef<str>) {
        self.record(Verbosity::Errors, message);
    }

    /// Failure inside the preprocessor itself.
    pub fn system_error(&mut self, message: impl AsRef<str>) {
        self.record(Verbosity::SystemErrors, message);
    }

    /// Directive trace line.
    pub fn command(&mut self, message: impl AsRef<str>) {
        self.record(Verbosity::Commands, message);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Forget entries from the previous pass.
    pub fn clear(&mut self) {
        self.text.clear();
    }
}
