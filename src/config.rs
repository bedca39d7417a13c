use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::highlight::HighlightConfig;
use crate::runner::RunnerConfig;

/// Error produced while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Editor settings. Every field is optional in the file; missing ones
/// keep their defaults, which reproduce `kotlinc -script` with the
/// built-in keyword table and palette.
///
/// ```
/// let config = scriptpad::Config::from_json(r#"{"runner": {"interpreter": "kscript"}}"#)
///     .unwrap();
/// assert_eq!(config.runner.interpreter, "kscript");
/// assert_eq!(config.runner.script_flag.as_deref(), Some("-script"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runner: RunnerConfig,
    pub highlight: HighlightConfig,
}

impl Config {
    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed input.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Load from `path`, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
