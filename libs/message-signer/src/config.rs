//! Defines the top level configuration for the message signer.
use std::{fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::store::BatchConfig;

const DEFAULT_REDIRECT_ATTEMPTS: u32 = 1;

/// The top level configuration for the message signer subsystem.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct SignerConfig {
    /// Local datastore batching and retry tuning.
    #[serde(default)]
    pub store: BatchConfig,
    /// Redirect-to-leader tuning.
    #[serde(default)]
    pub redirect: RedirectConfig,
}

impl SignerConfig {
    /// Load a `SignerConfig` from a TOML file on disk.
    ///
    /// Accepts any `P: AsRef<Path>` (e.g. &str, String, Path, PathBuf).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .map_err(|e| ConfigError::Io(path_ref.display().to_string(), e))?;
        let cfg = toml::from_str(&contents)?;
        Ok(cfg)
    }
}

/// Tuning for follower calls forwarded to the leader.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RedirectConfig {
    /// Redirect attempts before the error is surfaced. Kept low on
    /// purpose: redirect storms amplify load during elections.
    #[serde(default = "default_redirect_attempts")]
    pub max_attempts: u32,
}

const fn default_redirect_attempts() -> u32 {
    DEFAULT_REDIRECT_ATTEMPTS
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self { max_attempts: default_redirect_attempts() }
    }
}

/// Errors that can occur loading the signer config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing or invalid file paths
    #[error("I/O error reading `{0}`: {1}")]
    Io(String, #[source] std::io::Error),

    /// Malformed toml
    #[error("invalid TOML in config: {0}")]
    Toml(#[from] toml::de::Error),
}
