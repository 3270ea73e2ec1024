//! Error types for the state ledger.

use thiserror::Error;

/// Errors raised while loading, saving or configuring session state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to serialize session state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type StateResult<T> = Result<T, StateError>;
