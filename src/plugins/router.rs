//! Command routing
//!
//! Turns a raw command line into a dispatcher invocation. The first
//! whitespace-delimited token names the command; the dispatcher receives the
//! whole trimmed line. Plugins are searched in load order and dispatchers in
//! discovery order, and the first one claiming the name wins. Later plugins
//! claiming the same name are shadowed without any diagnostic.

use std::sync::Arc;

use super::boundary::{DispatcherEntry, PluginBoundary};
use super::types::{CommandChannel, SessionHandle};

/// A command line split into its name and the text passed to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLine<'a> {
    /// First token of the trimmed line; empty when the line is blank.
    pub name: &'a str,
    /// The trimmed line, command name included.
    pub raw: &'a str,
}

impl<'a> CommandLine<'a> {
    pub fn parse(args: &'a str) -> Self {
        let raw = args.trim();
        let name = raw.split_whitespace().next().unwrap_or("");
        Self { name, raw }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// A resolved dispatcher, held independently of the registry lock.
#[derive(Debug, Clone)]
pub struct Route {
    plugin: Arc<PluginBoundary>,
    index: usize,
}

impl Route {
    pub fn plugin(&self) -> &PluginBoundary {
        &self.plugin
    }

    pub fn dispatcher(&self) -> &DispatcherEntry {
        &self.plugin.dispatchers()[self.index]
    }

    pub fn invoke(&self, channel: CommandChannel, raw_args: &str, session: SessionHandle) {
        self.dispatcher().invoke(channel, raw_args, session);
    }
}

/// Find the first dispatcher across `plugins` that answers to `command` on
/// `channel`. An empty command never matches.
pub fn resolve(
    plugins: &[Arc<PluginBoundary>],
    channel: CommandChannel,
    command: &str,
) -> Option<Route> {
    if command.is_empty() {
        return None;
    }
    plugins.iter().find_map(|plugin| {
        plugin.find(channel, command).map(|index| Route {
            plugin: Arc::clone(plugin),
            index,
        })
    })
}
