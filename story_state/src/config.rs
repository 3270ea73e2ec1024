//! Preprocessor configuration, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::StateResult;
use crate::log::Verbosity;
use crate::questions::DEFAULT_QUESTION_COOLDOWN;

/// Runtime configuration for the preprocessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    /// Initial author log verbosity for new sessions (0-8).
    pub verbosity: Verbosity,

    /// Passes to wait between two questions.
    pub question_cooldown: u32,

    /// Run directives per section instead of over the whole context.
    pub advanced_sections: bool,

    /// Sections processed in advanced mode, in processing order.
    pub sections: Vec<String>,

    /// Upper bound on full-text macro expansion rounds.
    pub max_expansion_rounds: usize,

    /// Label shown in the version block of the author log.
    pub version_label: String,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            question_cooldown: DEFAULT_QUESTION_COOLDOWN,
            advanced_sections: false,
            sections: vec![
                "World Lore".to_string(),
                "Story Summary".to_string(),
                "Memories".to_string(),
                "Author's note".to_string(),
                "Recent Story".to_string(),
            ],
            max_expansion_rounds: 32,
            version_label: concat!("story_preproc v", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl PreprocessorConfig {
    /// Parse configuration from TOML text. Missing fields keep their defaults.
    pub fn from_toml_str(text: &str) -> StateResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StateResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PreprocessorConfig::default();
        assert_eq!(config.question_cooldown, 10);
        assert_eq!(config.verbosity, Verbosity::SystemErrors);
        assert!(!config.advanced_sections);
        assert!(config.sections.iter().any(|s| s == "Recent Story"));
    }

    #[test]
    fn test_partial_toml() {
        let config = PreprocessorConfig::from_toml_str(
            r#"
            verbosity = 8
            advanced_sections = true
            sections = ["Recent Story"]
            "#,
        )
        .unwrap();

        assert_eq!(config.verbosity, Verbosity::Commands);
        assert!(config.advanced_sections);
        assert_eq!(config.sections, vec!["Recent Story".to_string()]);
        assert_eq!(config.question_cooldown, 10);
    }

    #[test]
    fn test_invalid_verbosity_is_rejected() {
        assert!(PreprocessorConfig::from_toml_str("verbosity = 12").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(PreprocessorConfig::load("/nonexistent/preproc.toml").is_err());
    }
}
