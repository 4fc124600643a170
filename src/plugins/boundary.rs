//! Plugin boundaries
//!
//! A `PluginBoundary` is one loaded module together with the dispatchers
//! discovered inside it. Each boundary owns its own module handle, so
//! plugins resolve their dependencies independently of each other.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use libloading::Library;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SwitchPlugError};

use super::loader::{canonical_location, module_name};
use super::module::ModuleLoader;
use super::types::{
    CommandChannel, Dispatcher, DispatcherFactory, FactoryCollector, SessionHandle,
};

/// A discovered dispatcher with its name sets captured at load time.
pub struct DispatcherEntry {
    dispatcher: Box<dyn Dispatcher>,
    api_names: Vec<String>,
    dial_plan_names: Vec<String>,
}

impl DispatcherEntry {
    pub fn new(dispatcher: Box<dyn Dispatcher>) -> Self {
        let api_names = dedup(dispatcher.api_names());
        let dial_plan_names = dedup(dispatcher.dial_plan_names());
        Self {
            dispatcher,
            api_names,
            dial_plan_names,
        }
    }

    pub fn api_names(&self) -> &[String] {
        &self.api_names
    }

    pub fn dial_plan_names(&self) -> &[String] {
        &self.dial_plan_names
    }

    /// Names this dispatcher answers to on `channel`.
    pub fn names(&self, channel: CommandChannel) -> &[String] {
        match channel {
            CommandChannel::Api => &self.api_names,
            CommandChannel::DialPlan => &self.dial_plan_names,
        }
    }

    pub fn handles(&self, channel: CommandChannel, command: &str) -> bool {
        self.names(channel).iter().any(|n| n == command)
    }

    /// Run the dispatcher's operation for `channel`.
    pub fn invoke(&self, channel: CommandChannel, raw_args: &str, session: SessionHandle) {
        match channel {
            CommandChannel::Api => self.dispatcher.dispatch_api(raw_args, session),
            CommandChannel::DialPlan => self.dispatcher.dispatch_dial_plan(raw_args, session),
        }
    }
}

impl fmt::Debug for DispatcherEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherEntry")
            .field("api_names", &self.api_names)
            .field("dial_plan_names", &self.dial_plan_names)
            .finish_non_exhaustive()
    }
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

/// Build a dispatcher from every factory, in registration order.
///
/// A factory that returns `None` or panics is skipped; the remaining
/// factories still run.
pub fn discover_dispatchers(factories: Vec<DispatcherFactory>) -> Vec<DispatcherEntry> {
    let mut dispatchers = Vec::with_capacity(factories.len());
    for (index, factory) in factories.into_iter().enumerate() {
        match panic::catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(Some(dispatcher)) => dispatchers.push(DispatcherEntry::new(dispatcher)),
            Ok(None) => debug!(factory = index, "Dispatcher factory declined, skipping"),
            Err(_) => debug!(factory = index, "Dispatcher factory panicked, skipping"),
        }
    }
    dispatchers
}

/// Serializable description of a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginSummary {
    pub path: PathBuf,
    pub module: String,
    pub dispatchers: usize,
    pub api_names: Vec<String>,
    pub dial_plan_names: Vec<String>,
}

/// One loaded plugin module and the dispatchers it exposes.
pub struct PluginBoundary {
    path: PathBuf,
    module_name: String,
    dispatchers: Vec<DispatcherEntry>,
    /// Declared last so every dispatcher is dropped before its code is unmapped.
    _library: Option<Library>,
}

impl PluginBoundary {
    /// Load the module at `path` into a fresh boundary and discover its
    /// dispatchers.
    ///
    /// # Errors
    /// - `SwitchPlugError::ModuleNotFound` if the path does not exist or the
    ///   module cannot be resolved
    /// - `SwitchPlugError::IncompatiblePlugin` if the module targets another ABI
    /// - `SwitchPlugError::NoDispatchersFound` if no dispatcher could be built
    pub fn load(path: &Path, loader: &dyn ModuleLoader) -> Result<Self> {
        let location = canonical_location(path)?;
        let name = module_name(&location)
            .ok_or_else(|| SwitchPlugError::ModuleNotFound {
                path: location.clone(),
                reason: "path has no file name".to_string(),
            })?
            .to_string();

        let module = loader.load_module(&location, &name)?;
        let (register, library) = module.into_parts();

        let mut collector = FactoryCollector::default();
        panic::catch_unwind(AssertUnwindSafe(|| register(&mut collector))).map_err(|_| {
            SwitchPlugError::ModuleNotFound {
                path: location.clone(),
                reason: "plugin registration panicked".to_string(),
            }
        })?;

        let dispatchers = discover_dispatchers(std::mem::take(&mut collector.factories));
        drop(register);

        if dispatchers.is_empty() {
            return Err(SwitchPlugError::NoDispatchersFound(location));
        }

        Ok(Self {
            path: location,
            module_name: name,
            dispatchers,
            _library: library,
        })
    }

    /// Canonical absolute path the plugin was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn dispatchers(&self) -> &[DispatcherEntry] {
        &self.dispatchers
    }

    pub fn dispatcher_count(&self) -> usize {
        self.dispatchers.len()
    }

    /// Union of all API names, in discovery order.
    pub fn api_names(&self) -> Vec<&str> {
        self.names(CommandChannel::Api)
    }

    /// Union of all dial-plan names, in discovery order.
    pub fn dial_plan_names(&self) -> Vec<&str> {
        self.names(CommandChannel::DialPlan)
    }

    fn names(&self, channel: CommandChannel) -> Vec<&str> {
        self.dispatchers
            .iter()
            .flat_map(|d| d.names(channel).iter().map(|n| n.as_str()))
            .collect()
    }

    /// Index of the first dispatcher answering to `command` on `channel`.
    pub fn find(&self, channel: CommandChannel, command: &str) -> Option<usize> {
        self.dispatchers.iter().position(|d| d.handles(channel, command))
    }

    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            path: self.path.clone(),
            module: self.module_name.clone(),
            dispatchers: self.dispatchers.len(),
            api_names: self.api_names().into_iter().map(String::from).collect(),
            dial_plan_names: self.dial_plan_names().into_iter().map(String::from).collect(),
        }
    }
}

impl fmt::Debug for PluginBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginBoundary")
            .field("path", &self.path)
            .field("module_name", &self.module_name)
            .field("dispatchers", &self.dispatchers)
            .field("native", &self._library.is_some())
            .finish()
    }
}
