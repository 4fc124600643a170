//! Configuration for switchplug
//!
//! The host locates its plugin directory through a small JSON file plus
//! environment overrides:
//!
//! ```json
//! {
//!     "enabled": true,
//!     "plugin_dir": "/usr/local/freeswitch/plugins",
//!     "module_extension": "so",
//!     "blocked_plugins": ["experimental"]
//! }
//! ```
//!
//! Every field is optional. Environment variables take precedence:
//! `SWITCHPLUG_PLUGIN_DIR` and `SWITCHPLUG_MODULE_EXTENSION`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SwitchPlugError};
use crate::plugins::loader::{default_module_extension, normalize_extension};

/// Environment variable overriding [`PluginConfig::plugin_dir`].
pub const ENV_PLUGIN_DIR: &str = "SWITCHPLUG_PLUGIN_DIR";

/// Environment variable overriding [`PluginConfig::module_extension`].
pub const ENV_MODULE_EXTENSION: &str = "SWITCHPLUG_MODULE_EXTENSION";

/// Plugin system configuration.
///
/// # Defaults
///
/// - `enabled`: `true`
/// - `plugin_dir`: `plugins`
/// - `module_extension`: the platform's dynamic library extension
/// - `blocked_plugins`: empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Master switch; when false the host loads no plugins.
    pub enabled: bool,

    /// Root directory scanned for `<name>/<name>.<ext>` plugin modules.
    pub plugin_dir: PathBuf,

    /// Module file extension, with or without the leading dot.
    pub module_extension: String,

    /// Module names (file stems) the directory scan never loads.
    pub blocked_plugins: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            plugin_dir: PathBuf::from("plugins"),
            module_extension: default_module_extension().to_string(),
            blocked_plugins: Vec::new(),
        }
    }
}

impl PluginConfig {
    /// Load configuration from a JSON file. A missing file yields defaults.
    ///
    /// # Errors
    /// - `SwitchPlugError::Io` if the file exists but cannot be read
    /// - `SwitchPlugError::Json` if the JSON is malformed
    /// - `SwitchPlugError::Config` if validation fails
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    /// `SwitchPlugError::Config` if the overridden configuration is invalid.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup, then validate.
    ///
    /// # Errors
    /// `SwitchPlugError::Config` if the overridden configuration is invalid.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_PLUGIN_DIR).filter(|v| !v.trim().is_empty()) {
            self.plugin_dir = PathBuf::from(dir);
        }
        if let Some(ext) = lookup(ENV_MODULE_EXTENSION).filter(|v| !v.trim().is_empty()) {
            self.module_extension = ext;
        }
        self.validate()
    }

    /// Check the configuration for values the registry cannot use.
    ///
    /// # Errors
    /// `SwitchPlugError::Config` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if normalize_extension(&self.module_extension).is_empty() {
            return Err(SwitchPlugError::Config(
                "module_extension must not be empty".to_string(),
            ));
        }
        if self.plugin_dir.as_os_str().is_empty() {
            return Err(SwitchPlugError::Config(
                "plugin_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
