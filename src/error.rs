//! Error types for switchplug
//!
//! This module defines all error types used by the plugin registry and
//! command router. Uses `thiserror` for ergonomic error handling with
//! automatic `Display` and `Error` trait implementations.

use std::path::PathBuf;

use thiserror::Error;

use crate::plugins::types::CommandChannel;

/// The primary error type for switchplug operations.
#[derive(Error, Debug)]
pub enum SwitchPlugError {
    /// The module could not be resolved or opened from the given path
    /// (missing file, not a loadable library, missing declaration symbol).
    #[error("Module not found: {}: {reason}", .path.display())]
    ModuleNotFound { path: PathBuf, reason: String },

    /// The module was opened but was built against an incompatible plugin ABI.
    #[error("Incompatible plugin {}: {reason}", .path.display())]
    IncompatiblePlugin { path: PathBuf, reason: String },

    /// The module loaded but none of its dispatcher factories produced an instance.
    #[error("No dispatchers found in {}", .0.display())]
    NoDispatchersFound(PathBuf),

    /// No registered dispatcher answers to the command name.
    #[error("No {channel} dispatcher for command '{command}'")]
    NoMatchingDispatcher {
        channel: CommandChannel,
        command: String,
    },

    /// Configuration-related errors (invalid config file, bad overrides, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SwitchPlugError {
    /// Whether this error is one of the load-time failures that the boolean
    /// `load_plugin` entry point reduces to `false`.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound { .. } | Self::IncompatiblePlugin { .. } | Self::NoDispatchersFound(_)
        )
    }
}

/// A specialized `Result` type for switchplug operations.
pub type Result<T> = std::result::Result<T, SwitchPlugError>;
