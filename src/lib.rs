//! switchplug - plugin registry and command router for media-server extension modules

pub mod config;
pub mod error;
pub mod ffi;
pub mod plugins;

pub use config::PluginConfig;
pub use error::{Result, SwitchPlugError};
pub use plugins::PluginRegistry;
