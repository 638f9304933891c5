//! Error types
//!
//! Only configuration problems and input read failures are errors. Bad G-code
//! is never an error; it becomes a [`crate::diagnostics::Warning`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Configuration could not be loaded or is out of range
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value is outside the range the pipeline accepts
    #[error("Invalid configuration: `{key}` {reason}")]
    InvalidConfig {
        /// The offending key.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The config file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key,
            reason: reason.into(),
        }
    }
}

/// Failure while draining an input source
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read G-code input: {0}")]
    Io(#[from] io::Error),
}
