//! Plugin registry for switchplug
//!
//! This module provides the `PluginRegistry`, the ordered collection of
//! loaded plugin boundaries and the entry points the host calls: load one
//! plugin, load every plugin under a directory, and dispatch API and
//! dial-plan commands.
//!
//! The registry is append-only. Loading the same path twice yields two
//! boundaries; nothing is ever unloaded before the registry is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::config::PluginConfig;
use crate::error::{Result, SwitchPlugError};

use super::boundary::{PluginBoundary, PluginSummary};
use super::loader::{default_module_extension, discover_plugin_files, module_name, normalize_extension};
use super::module::{ModuleLoader, NativeModuleLoader};
use super::router::{self, CommandLine};
use super::types::{CommandChannel, SessionHandle};

/// A registry of loaded plugins and the router over their dispatchers.
///
/// Dispatches take a read lock only long enough to resolve the command; the
/// dispatcher runs after the lock is released. Loads build the boundary
/// outside the lock and take the write lock just to append it.
///
/// # Example
///
/// ```rust
/// use std::fs;
/// use switchplug::plugins::{Dispatcher, PluginRegistry, SessionHandle, StaticModuleLoader};
///
/// #[derive(Default)]
/// struct Echo;
///
/// impl Dispatcher for Echo {
///     fn api_names(&self) -> Vec<String> {
///         vec!["echo".to_string()]
///     }
///     fn dispatch_api(&self, raw_args: &str, _session: SessionHandle) {
///         assert_eq!(raw_args, "echo hello world");
///     }
///     fn dispatch_dial_plan(&self, _raw_args: &str, _session: SessionHandle) {}
/// }
///
/// let root = tempfile::tempdir().unwrap();
/// fs::create_dir(root.path().join("echo")).unwrap();
/// fs::write(root.path().join("echo").join("echo.mod"), b"").unwrap();
///
/// let loader = StaticModuleLoader::new().with_module("echo", |r| r.register_default::<Echo>());
/// let registry = PluginRegistry::with_loader(loader).with_module_extension("mod");
/// registry.load_plugins_from_subdirectories(root.path());
///
/// assert_eq!(registry.plugin_count(), 1);
/// assert!(registry.dispatch_api("echo hello world", SessionHandle::null()));
/// assert!(!registry.dispatch_api("reloadxml", SessionHandle::null()));
/// ```
pub struct PluginRegistry {
    loader: Box<dyn ModuleLoader>,

    /// File extension of module files for directory discovery.
    module_extension: String,

    /// Module names the directory scan never loads.
    blocked_plugins: Vec<String>,

    /// Loaded plugins, in load order.
    plugins: RwLock<Vec<Arc<PluginBoundary>>>,
}

impl PluginRegistry {
    /// Create an empty registry that loads native dynamic libraries.
    pub fn new() -> Self {
        Self::with_loader(NativeModuleLoader::new())
    }

    /// Create an empty registry backed by a custom module loader.
    pub fn with_loader(loader: impl ModuleLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            module_extension: default_module_extension().to_string(),
            blocked_plugins: Vec::new(),
            plugins: RwLock::new(Vec::new()),
        }
    }

    /// Create an empty native registry using the extension and block list
    /// from `config`.
    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new()
            .with_module_extension(&config.module_extension)
            .with_blocked_plugins(config.blocked_plugins.clone())
    }

    /// Set the module file extension used by directory discovery.
    pub fn with_module_extension(mut self, extension: &str) -> Self {
        self.module_extension = normalize_extension(extension).to_string();
        self
    }

    /// Set module names that directory discovery skips.
    pub fn with_blocked_plugins(mut self, blocked: Vec<String>) -> Self {
        self.blocked_plugins = blocked;
        self
    }

    pub fn module_extension(&self) -> &str {
        &self.module_extension
    }

    /// Load one plugin and register it.
    ///
    /// Returns `true` when the plugin exposed at least one dispatcher and
    /// was appended to the registry. Every load failure is reduced to
    /// `false`; use [`try_load_plugin`](Self::try_load_plugin) to see why.
    pub fn load_plugin(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.try_load_plugin(path) {
            Ok(_) => true,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Plugin not loaded");
                false
            }
        }
    }

    /// Load one plugin and register it, returning the new boundary.
    ///
    /// # Errors
    /// - `SwitchPlugError::ModuleNotFound` if the module cannot be resolved
    /// - `SwitchPlugError::IncompatiblePlugin` if it targets another ABI
    /// - `SwitchPlugError::NoDispatchersFound` if it exposes no dispatcher
    pub fn try_load_plugin(&self, path: impl AsRef<Path>) -> Result<Arc<PluginBoundary>> {
        let boundary = Arc::new(PluginBoundary::load(path.as_ref(), self.loader.as_ref())?);

        info!(
            path = %boundary.path().display(),
            apis = %boundary.api_names().join(","),
            apps = %boundary.dial_plan_names().join(","),
            "Loaded plugin"
        );

        self.plugins.write().push(Arc::clone(&boundary));
        Ok(boundary)
    }

    /// Load every plugin found under `root` using the
    /// `<root>/<name>/<name>.<extension>` layout.
    ///
    /// The scan is best effort: a candidate that fails to load is logged
    /// and skipped. Returns the number of plugins registered.
    pub fn load_plugins_from_subdirectories(&self, root: impl AsRef<Path>) -> usize {
        let root = root.as_ref();
        let candidates = match discover_plugin_files(root, &self.module_extension) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Failed to scan plugin directory");
                return 0;
            }
        };

        let mut loaded = 0;
        for path in candidates {
            if let Some(name) = module_name(&path) {
                if self.blocked_plugins.iter().any(|b| b == name) {
                    info!(plugin = name, "Plugin is blocked by configuration, skipping");
                    continue;
                }
            }

            match self.try_load_plugin(&path) {
                Ok(_) => loaded += 1,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load plugin, skipping"
                    );
                }
            }
        }
        loaded
    }

    /// Route an API command. Returns `false` when no dispatcher claims it.
    pub fn dispatch_api(&self, args: &str, session: SessionHandle) -> bool {
        self.dispatch(CommandChannel::Api, args, session)
    }

    /// Route a dial-plan application. Returns `false` when no dispatcher claims it.
    pub fn dispatch_dial_plan(&self, args: &str, session: SessionHandle) -> bool {
        self.dispatch(CommandChannel::DialPlan, args, session)
    }

    /// Route an API command, reporting an unclaimed command as an error.
    ///
    /// # Errors
    /// `SwitchPlugError::NoMatchingDispatcher` if no dispatcher claims it.
    pub fn try_dispatch_api(&self, args: &str, session: SessionHandle) -> Result<()> {
        self.try_dispatch(CommandChannel::Api, args, session)
    }

    /// Route a dial-plan application, reporting an unclaimed name as an error.
    ///
    /// # Errors
    /// `SwitchPlugError::NoMatchingDispatcher` if no dispatcher claims it.
    pub fn try_dispatch_dial_plan(&self, args: &str, session: SessionHandle) -> Result<()> {
        self.try_dispatch(CommandChannel::DialPlan, args, session)
    }

    /// Route a command on `channel`. Returns `false` when no dispatcher claims it.
    pub fn dispatch(&self, channel: CommandChannel, args: &str, session: SessionHandle) -> bool {
        self.try_dispatch(channel, args, session).is_ok()
    }

    /// Route a command on `channel`.
    ///
    /// # Errors
    /// `SwitchPlugError::NoMatchingDispatcher` if no dispatcher claims it.
    pub fn try_dispatch(
        &self,
        channel: CommandChannel,
        args: &str,
        session: SessionHandle,
    ) -> Result<()> {
        let command = CommandLine::parse(args);
        let route = router::resolve(&self.plugins.read(), channel, command.name);

        match route {
            Some(route) => {
                route.invoke(channel, command.raw, session);
                Ok(())
            }
            None => {
                trace!(%channel, command = command.name, "No dispatcher for command");
                Err(SwitchPlugError::NoMatchingDispatcher {
                    channel,
                    command: command.name.to_string(),
                })
            }
        }
    }

    /// Path of the plugin that would handle API command `name`.
    pub fn resolve_api(&self, name: &str) -> Option<PathBuf> {
        self.resolve(CommandChannel::Api, name)
    }

    /// Path of the plugin that would handle dial-plan application `name`.
    pub fn resolve_dial_plan(&self, name: &str) -> Option<PathBuf> {
        self.resolve(CommandChannel::DialPlan, name)
    }

    fn resolve(&self, channel: CommandChannel, name: &str) -> Option<PathBuf> {
        router::resolve(&self.plugins.read(), channel, name)
            .map(|route| route.plugin().path().to_path_buf())
    }

    /// Get the number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.plugins.read().len()
    }

    /// Get the number of dispatchers across all plugins.
    pub fn dispatcher_count(&self) -> usize {
        self.plugins
            .read()
            .iter()
            .map(|p| p.dispatcher_count())
            .sum()
    }

    /// Describe every registered plugin, in load order.
    pub fn list_plugins(&self) -> Vec<PluginSummary> {
        self.plugins.read().iter().map(|p| p.summary()).collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::module::StaticModuleLoader;
    use crate::plugins::types::{Dispatcher, DispatcherRegistrar};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Dispatcher that logs `<tag>:<raw_args>` for each call.
    struct Tagged {
        tag: String,
        api: Vec<String>,
        apps: Vec<String>,
        log: CallLog,
    }

    impl Dispatcher for Tagged {
        fn api_names(&self) -> Vec<String> {
            self.api.clone()
        }
        fn dial_plan_names(&self) -> Vec<String> {
            self.apps.clone()
        }
        fn dispatch_api(&self, raw_args: &str, _session: SessionHandle) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:api:{}", self.tag, raw_args));
        }
        fn dispatch_dial_plan(&self, raw_args: &str, _session: SessionHandle) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:app:{}", self.tag, raw_args));
        }
    }

    /// Helper that registers a module exposing one `Tagged` dispatcher.
    fn add_module(loader: &mut StaticModuleLoader, name: &str, api: &[&str], apps: &[&str], log: &CallLog) {
        let tag = name.to_string();
        let api: Vec<String> = api.iter().map(|s| s.to_string()).collect();
        let apps: Vec<String> = apps.iter().map(|s| s.to_string()).collect();
        let log = Arc::clone(log);
        loader.insert(name, move |registrar: &mut dyn DispatcherRegistrar| {
            let (tag, api, apps, log) = (tag.clone(), api.clone(), apps.clone(), Arc::clone(&log));
            registrar.register_factory(Box::new(move || {
                Some(Box::new(Tagged {
                    tag: tag.clone(),
                    api: api.clone(),
                    apps: apps.clone(),
                    log: Arc::clone(&log),
                }) as Box<dyn Dispatcher>)
            }));
        });
    }

    /// Helper to create `<root>/<dir>/<file>`.
    fn touch(root: &Path, dir: &str, file: &str) -> PathBuf {
        let dir_path = root.join(dir);
        fs::create_dir_all(&dir_path).unwrap();
        let path = dir_path.join(file);
        fs::write(&path, b"").unwrap();
        path
    }

    fn setup() -> (TempDir, StaticModuleLoader, CallLog) {
        (
            TempDir::new().unwrap(),
            StaticModuleLoader::new(),
            Arc::new(Mutex::new(Vec::new())),
        )
    }

    // ---- load tests ----

    #[test]
    fn test_registry_new_is_empty() {
        let registry = PluginRegistry::new();
        assert_eq!(registry.plugin_count(), 0);
        assert_eq!(registry.dispatcher_count(), 0);
        assert!(registry.list_plugins().is_empty());
        assert_eq!(registry.module_extension(), default_module_extension());
    }

    #[test]
    fn test_load_plugin_appends_one_boundary() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "echo", &["echo"], &[], &log);
        let path = touch(tmp.path(), "echo", "echo.so");

        let registry = PluginRegistry::with_loader(loader);
        assert!(registry.load_plugin(&path));
        assert_eq!(registry.plugin_count(), 1);
        assert_eq!(registry.dispatcher_count(), 1);
    }

    #[test]
    fn test_load_plugin_without_dispatchers_leaves_registry_unchanged() {
        let (tmp, mut loader, _log) = setup();
        loader.insert("hollow", |_registrar: &mut dyn DispatcherRegistrar| {});
        let path = touch(tmp.path(), "hollow", "hollow.so");

        let registry = PluginRegistry::with_loader(loader);
        assert!(!registry.load_plugin(&path));
        assert_eq!(registry.plugin_count(), 0);

        let err = registry.try_load_plugin(&path).unwrap_err();
        assert!(matches!(err, SwitchPlugError::NoDispatchersFound(_)));
    }

    #[test]
    fn test_load_plugin_unresolvable_module() {
        let (tmp, loader, _log) = setup();
        let path = touch(tmp.path(), "ghost", "ghost.so");

        let registry = PluginRegistry::with_loader(loader);
        assert!(!registry.load_plugin(&path));
        assert!(!registry.load_plugin(tmp.path().join("missing").join("missing.so")));
        assert_eq!(registry.plugin_count(), 0);
    }

    #[test]
    fn test_native_registry_rejects_non_library() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "fake", "fake.so");

        let registry = PluginRegistry::new();
        assert!(!registry.load_plugin(&path));
        assert_eq!(registry.plugin_count(), 0);
    }

    #[test]
    fn test_loading_same_path_twice_appends_twice() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "echo", &["echo"], &[], &log);
        let path = touch(tmp.path(), "echo", "echo.so");

        let registry = PluginRegistry::with_loader(loader);
        assert!(registry.load_plugin(&path));
        assert!(registry.load_plugin(&path));
        assert_eq!(registry.plugin_count(), 2);

        let plugins = registry.list_plugins();
        assert_eq!(plugins[0].path, plugins[1].path);
    }

    // ---- dispatch tests ----

    #[test]
    fn test_dispatch_api_passes_full_line() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "echo", &["echo"], &[], &log);
        let path = touch(tmp.path(), "echo", "echo.so");

        let registry = PluginRegistry::with_loader(loader);
        registry.load_plugin(&path);

        assert!(registry.dispatch_api("echo hello world", SessionHandle::null()));
        assert!(registry.dispatch_api("   echo   spaced  ", SessionHandle::null()));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "echo:api:echo hello world".to_string(),
                "echo:api:echo   spaced".to_string(),
            ]
        );
    }

    #[test]
    fn test_dispatch_unknown_command_invokes_nothing() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "echo", &["echo"], &["playback"], &log);
        let path = touch(tmp.path(), "echo", "echo.so");

        let registry = PluginRegistry::with_loader(loader);
        registry.load_plugin(&path);

        assert!(!registry.dispatch_api("reloadxml", SessionHandle::null()));
        assert!(!registry.dispatch_api("echoes", SessionHandle::null()));
        assert!(!registry.dispatch_api("playback /tmp/a.wav", SessionHandle::null()));
        assert!(log.lock().unwrap().is_empty());

        let err = registry
            .try_dispatch_api("reloadxml now", SessionHandle::null())
            .unwrap_err();
        assert!(matches!(
            err,
            SwitchPlugError::NoMatchingDispatcher { channel: CommandChannel::Api, ref command } if command == "reloadxml"
        ));
    }

    #[test]
    fn test_dispatch_blank_input_returns_false() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "echo", &["echo"], &["echo"], &log);
        let path = touch(tmp.path(), "echo", "echo.so");

        let registry = PluginRegistry::with_loader(loader);
        registry.load_plugin(&path);

        for input in ["", " ", "\t\n  "] {
            assert!(!registry.dispatch_api(input, SessionHandle::null()));
            assert!(!registry.dispatch_dial_plan(input, SessionHandle::null()));
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_on_empty_registry() {
        let registry = PluginRegistry::with_loader(StaticModuleLoader::new());
        assert!(!registry.dispatch_api("echo", SessionHandle::null()));
        assert!(!registry.dispatch_dial_plan("echo", SessionHandle::null()));
    }

    #[test]
    fn test_dial_plan_and_api_namespaces_are_separate() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "park", &["park_list"], &["park"], &log);
        let path = touch(tmp.path(), "park", "park.so");

        let registry = PluginRegistry::with_loader(loader);
        registry.load_plugin(&path);

        assert!(registry.dispatch_dial_plan("park slot=5", SessionHandle::null()));
        assert!(!registry.dispatch_api("park slot=5", SessionHandle::null()));
        assert!(registry.try_dispatch_dial_plan("park", SessionHandle::null()).is_ok());
        assert!(!registry.dispatch_dial_plan("park_list", SessionHandle::null()));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["park:app:park slot=5".to_string(), "park:app:park".to_string()]
        );
    }

    #[test]
    fn test_first_loaded_plugin_shadows_later_ones() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "first", &["foo"], &[], &log);
        add_module(&mut loader, "second", &["foo"], &[], &log);
        let first = touch(tmp.path(), "first", "first.so");
        let second = touch(tmp.path(), "second", "second.so");

        let registry = PluginRegistry::with_loader(loader);
        // Load in reverse alphabetical order to show load order decides.
        registry.load_plugin(&second);
        registry.load_plugin(&first);

        for _ in 0..3 {
            assert!(registry.dispatch_api("foo", SessionHandle::null()));
        }
        assert_eq!(*log.lock().unwrap(), vec!["second:api:foo".to_string(); 3]);
        assert_eq!(
            registry.resolve_api("foo"),
            Some(fs::canonicalize(&second).unwrap())
        );
    }

    #[test]
    fn test_first_discovered_dispatcher_wins_within_plugin() {
        let (tmp, mut loader, log) = setup();
        let log_a = Arc::clone(&log);
        let log_b = Arc::clone(&log);
        loader.insert("dual", move |registrar: &mut dyn DispatcherRegistrar| {
            let (a, b) = (Arc::clone(&log_a), Arc::clone(&log_b));
            registrar.register_factory(Box::new(move || {
                Some(Box::new(Tagged {
                    tag: "a".into(),
                    api: vec!["dup".into()],
                    apps: vec![],
                    log: Arc::clone(&a),
                }) as Box<dyn Dispatcher>)
            }));
            registrar.register_factory(Box::new(move || {
                Some(Box::new(Tagged {
                    tag: "b".into(),
                    api: vec!["dup".into()],
                    apps: vec![],
                    log: Arc::clone(&b),
                }) as Box<dyn Dispatcher>)
            }));
        });
        let path = touch(tmp.path(), "dual", "dual.so");

        let registry = PluginRegistry::with_loader(loader);
        registry.load_plugin(&path);

        assert!(registry.dispatch_api("dup x", SessionHandle::null()));
        assert_eq!(*log.lock().unwrap(), vec!["a:api:dup x".to_string()]);
    }

    #[test]
    fn test_dispatch_passes_session_through() {
        struct SessionSpy(Arc<Mutex<Option<SessionHandle>>>);

        impl Dispatcher for SessionSpy {
            fn api_names(&self) -> Vec<String> {
                vec!["peek".to_string()]
            }
            fn dispatch_api(&self, _raw_args: &str, session: SessionHandle) {
                *self.0.lock().unwrap() = Some(session);
            }
            fn dispatch_dial_plan(&self, _raw_args: &str, _session: SessionHandle) {}
        }

        let (tmp, mut loader, _log) = setup();
        let seen: Arc<Mutex<Option<SessionHandle>>> = Arc::new(Mutex::new(None));
        let seen_in_module = Arc::clone(&seen);
        loader.insert("peek", move |registrar: &mut dyn DispatcherRegistrar| {
            let seen = Arc::clone(&seen_in_module);
            registrar.register_factory(Box::new(move || {
                Some(Box::new(SessionSpy(Arc::clone(&seen))) as Box<dyn Dispatcher>)
            }));
        });
        let path = touch(tmp.path(), "peek", "peek.so");

        let registry = PluginRegistry::with_loader(loader);
        registry.load_plugin(&path);

        let mut call_state = 0u8;
        let session = SessionHandle::from_raw(&mut call_state as *mut u8 as *mut std::ffi::c_void);
        assert!(registry.dispatch_api("peek", session));
        assert_eq!(*seen.lock().unwrap(), Some(session));
    }

    #[test]
    fn test_dispatcher_may_reenter_registry() {
        struct Loader {
            registry: Arc<Mutex<Option<Arc<PluginRegistry>>>>,
            target: PathBuf,
        }

        impl Dispatcher for Loader {
            fn api_names(&self) -> Vec<String> {
                vec!["load".to_string()]
            }
            fn dispatch_api(&self, _raw_args: &str, _session: SessionHandle) {
                let registry = self.registry.lock().unwrap().clone().unwrap();
                assert!(registry.load_plugin(&self.target));
            }
            fn dispatch_dial_plan(&self, _raw_args: &str, _session: SessionHandle) {}
        }

        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "echo", &["echo"], &[], &log);
        let echo = touch(tmp.path(), "echo", "echo.so");
        let reload = touch(tmp.path(), "reload", "reload.so");

        let slot: Arc<Mutex<Option<Arc<PluginRegistry>>>> = Arc::new(Mutex::new(None));
        let slot_in_module = Arc::clone(&slot);
        loader.insert("reload", move |registrar: &mut dyn DispatcherRegistrar| {
            let (slot, target) = (Arc::clone(&slot_in_module), echo.clone());
            registrar.register_factory(Box::new(move || {
                Some(Box::new(Loader {
                    registry: Arc::clone(&slot),
                    target: target.clone(),
                }) as Box<dyn Dispatcher>)
            }));
        });

        let registry = Arc::new(PluginRegistry::with_loader(loader));
        *slot.lock().unwrap() = Some(Arc::clone(&registry));
        assert!(registry.load_plugin(&reload));

        assert!(registry.dispatch_api("load", SessionHandle::null()));
        assert_eq!(registry.plugin_count(), 2);
        assert!(registry.dispatch_api("echo hi", SessionHandle::null()));

        // Break the registry <-> dispatcher cycle.
        slot.lock().unwrap().take();
    }

    // ---- directory discovery tests ----

    #[test]
    fn test_load_from_subdirectories_routes_echo() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "echo", &["echo"], &[], &log);
        touch(tmp.path(), "echo", "echo.mod");

        let registry = PluginRegistry::with_loader(loader).with_module_extension("mod");
        assert_eq!(registry.load_plugins_from_subdirectories(tmp.path()), 1);

        assert!(registry.dispatch_api("echo hello world", SessionHandle::null()));
        assert_eq!(*log.lock().unwrap(), vec!["echo:api:echo hello world".to_string()]);
    }

    #[test]
    fn test_load_from_subdirectories_ignores_non_matching_files() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "pluginA", &["a"], &[], &log);
        add_module(&mut loader, "other", &["other"], &[], &log);
        touch(tmp.path(), "pluginA", "pluginA.mod");
        touch(tmp.path(), "pluginA", "other.mod");

        let registry = PluginRegistry::with_loader(loader).with_module_extension(".mod");
        assert_eq!(registry.load_plugins_from_subdirectories(tmp.path()), 1);
        assert!(registry.dispatch_api("a", SessionHandle::null()));
        assert!(!registry.dispatch_api("other", SessionHandle::null()));
    }

    #[test]
    fn test_load_from_subdirectories_is_best_effort() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "good", &["good"], &[], &log);
        loader.insert("hollow", |_registrar: &mut dyn DispatcherRegistrar| {});
        add_module(&mut loader, "zeta", &["zeta"], &[], &log);
        touch(tmp.path(), "good", "good.so");
        touch(tmp.path(), "hollow", "hollow.so");
        touch(tmp.path(), "unknown", "unknown.so");
        touch(tmp.path(), "zeta", "zeta.so");

        let registry = PluginRegistry::with_loader(loader).with_module_extension("so");
        assert_eq!(registry.load_plugins_from_subdirectories(tmp.path()), 2);

        let modules: Vec<String> = registry
            .list_plugins()
            .into_iter()
            .map(|p| p.module)
            .collect();
        assert_eq!(modules, vec!["good".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_load_from_subdirectories_honours_block_list() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "echo", &["echo"], &[], &log);
        add_module(&mut loader, "conference", &["conference"], &[], &log);
        touch(tmp.path(), "echo", "echo.so");
        touch(tmp.path(), "conference", "conference.so");

        let registry = PluginRegistry::with_loader(loader)
            .with_module_extension("so")
            .with_blocked_plugins(vec!["conference".to_string()]);
        assert_eq!(registry.load_plugins_from_subdirectories(tmp.path()), 1);
        assert!(registry.resolve_api("conference").is_none());
        assert!(registry.resolve_api("echo").is_some());
    }

    #[test]
    fn test_load_from_missing_root_loads_nothing() {
        let registry = PluginRegistry::with_loader(StaticModuleLoader::new());
        assert_eq!(
            registry.load_plugins_from_subdirectories("/nonexistent/plugins"),
            0
        );
        assert_eq!(registry.plugin_count(), 0);
    }

    #[test]
    fn test_from_config() {
        let config = PluginConfig {
            module_extension: ".plug".to_string(),
            blocked_plugins: vec!["noisy".to_string()],
            ..Default::default()
        };
        let registry = PluginRegistry::from_config(&config);
        assert_eq!(registry.module_extension(), "plug");
        assert_eq!(registry.blocked_plugins, vec!["noisy".to_string()]);
    }

    #[test]
    fn test_list_plugins_in_load_order() {
        let (tmp, mut loader, log) = setup();
        add_module(&mut loader, "b", &["b1"], &["b_app"], &log);
        add_module(&mut loader, "a", &["a1"], &[], &log);
        let b = touch(tmp.path(), "b", "b.so");
        let a = touch(tmp.path(), "a", "a.so");

        let registry = PluginRegistry::with_loader(loader);
        registry.load_plugin(&b);
        registry.load_plugin(&a);

        let list = registry.list_plugins();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].module, "b");
        assert_eq!(list[0].dial_plan_names, vec!["b_app".to_string()]);
        assert_eq!(list[1].module, "a");
        assert_eq!(registry.resolve_dial_plan("b_app"), Some(list[0].path.clone()));
    }
}
