//! Plugin system for switchplug
//!
//! This module loads externally built plugin modules, collects the command
//! dispatchers each one exposes, and routes API commands and dial-plan
//! applications to them by name.
//!
//! # Architecture
//!
//! - **types**: The plugin contract (`Dispatcher`, `SessionHandle`, `PluginDeclaration`)
//! - **module**: Module resolution (`NativeModuleLoader`, `StaticModuleLoader`)
//! - **boundary**: One loaded plugin and its discovered dispatchers
//! - **loader**: Directory discovery and path normalization
//! - **router**: Command-line tokenization and first-match resolution
//! - **registry**: The ordered plugin collection and the host entry points
//!
//! # Plugin Directory Structure
//!
//! ```text
//! plugins/
//! ├── echo/
//! │   └── echo.so
//! └── conference/
//!     ├── conference.so
//!     └── libsomething.so      (ignored: name does not match the directory)
//! ```
//!
//! # Writing a plugin
//!
//! A plugin is a `cdylib` crate that depends on switchplug and exports its
//! dispatchers with [`export_plugin!`](crate::export_plugin). It must be
//! built with the same toolchain as the host.
//!
//! # Usage
//!
//! ```rust,no_run
//! use switchplug::plugins::{PluginRegistry, SessionHandle};
//!
//! let registry = PluginRegistry::new();
//! registry.load_plugins_from_subdirectories("/usr/local/freeswitch/plugins");
//!
//! if !registry.dispatch_api("echo hello world", SessionHandle::null()) {
//!     eprintln!("-ERR no plugin handles 'echo'");
//! }
//! ```

pub mod boundary;
pub mod loader;
pub mod module;
pub mod registry;
pub mod router;
pub mod types;

pub use boundary::{discover_dispatchers, DispatcherEntry, PluginBoundary, PluginSummary};
pub use loader::{default_module_extension, discover_plugin_files, is_plugin_file};
pub use module::{LoadedModule, ModuleLoader, NativeModuleLoader, RegisterFn, StaticModuleLoader};
pub use registry::PluginRegistry;
pub use router::{CommandLine, Route};
pub use types::{
    CommandChannel, Dispatcher, DispatcherFactory, DispatcherRegistrar, PluginDeclaration,
    SessionHandle, CORE_VERSION, PLUGIN_ABI_VERSION, PLUGIN_DECLARATION_SYMBOL,
};
