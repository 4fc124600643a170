//! Plugin types for switchplug
//!
//! This module defines the contract between the host and plugin modules:
//! the `Dispatcher` capability every command handler implements, the opaque
//! `SessionHandle` passed through to it, and the `PluginDeclaration` each
//! native plugin exports so the loader can collect its dispatchers.

use std::ffi::c_void;
use std::fmt;

/// Current plugin ABI version.
/// Plugins must export a declaration with this version to be loaded.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Version of the switchplug crate a plugin was compiled against.
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the static every native plugin exports (NUL-terminated for `dlsym`).
pub const PLUGIN_DECLARATION_SYMBOL: &[u8] = b"switchplug_plugin_declaration\0";

/// Which command namespace a dispatch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandChannel {
    /// Commands invoked directly by the host (administrative or scripting calls).
    Api,
    /// Applications invoked from call-routing logic.
    DialPlan,
}

impl fmt::Display for CommandChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandChannel::Api => f.write_str("API"),
            CommandChannel::DialPlan => f.write_str("dial-plan"),
        }
    }
}

/// Opaque per-call context supplied by the host.
///
/// The registry never dereferences the pointer; it only hands it to the
/// dispatcher that claimed the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle(*mut c_void);

// SAFETY: the handle is never dereferenced by this crate. Dispatchers that
// do dereference it own the host's threading rules for the session.
unsafe impl Send for SessionHandle {}
unsafe impl Sync for SessionHandle {}

impl SessionHandle {
    /// A handle that refers to no session (API calls issued outside a call).
    pub const fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    /// Wrap a raw session pointer received from the host.
    pub const fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::null()
    }
}

/// A plugin-supplied command handler.
///
/// A dispatcher answers to a set of API command names and a set of dial-plan
/// application names. The names are read once when the plugin is loaded.
/// Invocations return nothing: a dispatcher reports its own failures
/// (typically through the session or the log).
#[cfg_attr(test, mockall::automock)]
pub trait Dispatcher: Send + Sync {
    /// Command names this dispatcher handles on the API channel.
    fn api_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Application names this dispatcher handles on the dial-plan channel.
    fn dial_plan_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Execute an API command. `raw_args` is the full trimmed command line,
    /// command name included.
    fn dispatch_api(&self, raw_args: &str, session: SessionHandle);

    /// Execute a dial-plan application. `raw_args` is the full trimmed
    /// command line, application name included.
    fn dispatch_dial_plan(&self, raw_args: &str, session: SessionHandle);
}

/// Constructor for one dispatcher type. Returning `None` means the type
/// could not be constructed and is skipped.
pub type DispatcherFactory = Box<dyn Fn() -> Option<Box<dyn Dispatcher>> + Send + Sync>;

/// Sink that a plugin's registration entry point hands its factories to.
pub trait DispatcherRegistrar {
    fn register_factory(&mut self, factory: DispatcherFactory);
}

impl dyn DispatcherRegistrar + '_ {
    /// Register a dispatcher type built through its `Default` impl.
    pub fn register_default<D>(&mut self)
    where
        D: Dispatcher + Default + 'static,
    {
        self.register_factory(Box::new(|| {
            Some(Box::new(D::default()) as Box<dyn Dispatcher>)
        }));
    }
}

/// Collects factories during a plugin's registration call.
#[derive(Default)]
pub(crate) struct FactoryCollector {
    pub(crate) factories: Vec<DispatcherFactory>,
}

impl DispatcherRegistrar for FactoryCollector {
    fn register_factory(&mut self, factory: DispatcherFactory) {
        self.factories.push(factory);
    }
}

/// The declaration every native plugin exports under
/// [`PLUGIN_DECLARATION_SYMBOL`]. Use [`export_plugin!`](crate::export_plugin)
/// rather than building it by hand.
#[derive(Clone, Copy)]
pub struct PluginDeclaration {
    /// Must equal [`PLUGIN_ABI_VERSION`].
    pub abi_version: u32,

    /// The [`CORE_VERSION`] the plugin was built against.
    pub core_version: &'static str,

    /// Registration entry point; hands every dispatcher factory to the registrar.
    pub register: fn(&mut dyn DispatcherRegistrar),
}

impl fmt::Debug for PluginDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDeclaration")
            .field("abi_version", &self.abi_version)
            .field("core_version", &self.core_version)
            .finish_non_exhaustive()
    }
}

impl PluginDeclaration {
    /// Check that a declaration was built against a compatible host.
    ///
    /// The ABI version must match exactly. Core versions must agree on
    /// major and minor components.
    pub fn check_compatible(&self) -> std::result::Result<(), String> {
        if self.abi_version != PLUGIN_ABI_VERSION {
            return Err(format!(
                "plugin ABI version {} does not match host ABI version {}",
                self.abi_version, PLUGIN_ABI_VERSION
            ));
        }
        if major_minor(self.core_version) != major_minor(CORE_VERSION) {
            return Err(format!(
                "plugin built against switchplug {} but host is {}",
                self.core_version, CORE_VERSION
            ));
        }
        Ok(())
    }
}

fn major_minor(version: &str) -> (&str, &str) {
    let mut parts = version.split('.');
    (parts.next().unwrap_or(""), parts.next().unwrap_or(""))
}

/// Export a plugin declaration from a `cdylib` crate.
///
/// Every listed type must implement [`Dispatcher`] and `Default`; the host
/// builds one instance of each, in the order given.
///
/// ```rust,ignore
/// use switchplug::plugins::{Dispatcher, SessionHandle};
///
/// #[derive(Default)]
/// struct Echo;
///
/// impl Dispatcher for Echo {
///     fn api_names(&self) -> Vec<String> {
///         vec!["echo".to_string()]
///     }
///     fn dispatch_api(&self, raw_args: &str, _session: SessionHandle) {
///         println!("{raw_args}");
///     }
///     fn dispatch_dial_plan(&self, _raw_args: &str, _session: SessionHandle) {}
/// }
///
/// switchplug::export_plugin!(Echo);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($($dispatcher:ty),+ $(,)?) => {
        #[doc(hidden)]
        fn __switchplug_register(registrar: &mut dyn $crate::plugins::DispatcherRegistrar) {
            $( registrar.register_default::<$dispatcher>(); )+
        }

        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static switchplug_plugin_declaration: $crate::plugins::PluginDeclaration =
            $crate::plugins::PluginDeclaration {
                abi_version: $crate::plugins::PLUGIN_ABI_VERSION,
                core_version: $crate::plugins::CORE_VERSION,
                register: __switchplug_register,
            };
    };
}
