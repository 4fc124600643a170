//! Module loading for switchplug
//!
//! A `ModuleLoader` turns a path and a logical module name into a
//! `LoadedModule`: the module's registration entry point plus whatever
//! handle keeps its code mapped. `NativeModuleLoader` opens each plugin as
//! its own dynamic library; `StaticModuleLoader` serves modules linked into
//! the host binary.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::debug;

use crate::error::{Result, SwitchPlugError};

use super::types::{DispatcherRegistrar, PluginDeclaration, PLUGIN_DECLARATION_SYMBOL};

/// A module's registration entry point.
pub type RegisterFn = Arc<dyn Fn(&mut dyn DispatcherRegistrar) + Send + Sync>;

/// Resolves plugin modules. Implementations must give every call its own
/// resolution scope so plugins never share symbols.
pub trait ModuleLoader: Send + Sync {
    /// Load the module named `module_name` from `path`.
    ///
    /// # Errors
    /// - `SwitchPlugError::ModuleNotFound` if the module cannot be resolved
    /// - `SwitchPlugError::IncompatiblePlugin` if it targets another ABI
    fn load_module(&self, path: &Path, module_name: &str) -> Result<LoadedModule>;
}

/// A resolved module, ready for dispatcher discovery.
pub struct LoadedModule {
    name: String,
    register: RegisterFn,
    /// Declared last: the library must outlive everything created from it.
    library: Option<Library>,
}

impl LoadedModule {
    /// A module whose code lives in the host binary.
    pub fn in_process(name: impl Into<String>, register: RegisterFn) -> Self {
        Self {
            name: name.into(),
            register,
            library: None,
        }
    }

    /// A module backed by an opened dynamic library.
    pub fn native(name: impl Into<String>, declaration: PluginDeclaration, library: Library) -> Self {
        Self {
            name: name.into(),
            register: Arc::new(declaration.register),
            library: Some(library),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_native(&self) -> bool {
        self.library.is_some()
    }

    pub(crate) fn into_parts(self) -> (RegisterFn, Option<Library>) {
        (self.register, self.library)
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("native", &self.is_native())
            .finish()
    }
}

/// Loads plugins from `.so`/`.dylib`/`.dll` files.
///
/// Each call opens a fresh `Library`. On unix the library is opened with
/// `RTLD_LOCAL`, so its symbols stay out of the global namespace and two
/// plugins embedding the same dependency resolve it independently.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeModuleLoader;

impl NativeModuleLoader {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
fn open_library(path: &Path) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LAZY, RTLD_LOCAL};
    // SAFETY: running a plugin's initializers is inherent to loading it.
    unsafe { UnixLibrary::open(Some(path), RTLD_LAZY | RTLD_LOCAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_library(path: &Path) -> std::result::Result<Library, libloading::Error> {
    // SAFETY: running a plugin's initializers is inherent to loading it.
    unsafe { Library::new(path) }
}

impl ModuleLoader for NativeModuleLoader {
    fn load_module(&self, path: &Path, module_name: &str) -> Result<LoadedModule> {
        let library = open_library(path).map_err(|e| SwitchPlugError::ModuleNotFound {
            path: path.to_path_buf(),
            reason: format!("Failed to load library: {}", e),
        })?;

        // SAFETY: the symbol is the address of a `PluginDeclaration` static
        // exported by `export_plugin!`. It is copied out while `library` is alive.
        let declaration = unsafe {
            let symbol: Symbol<*const PluginDeclaration> = library
                .get(PLUGIN_DECLARATION_SYMBOL)
                .map_err(|e| SwitchPlugError::ModuleNotFound {
                    path: path.to_path_buf(),
                    reason: format!("Missing plugin declaration: {}", e),
                })?;
            **symbol
        };

        declaration
            .check_compatible()
            .map_err(|reason| SwitchPlugError::IncompatiblePlugin {
                path: path.to_path_buf(),
                reason,
            })?;

        debug!(module = module_name, path = %path.display(), "Opened native module");

        Ok(LoadedModule::native(module_name, declaration, library))
    }
}

/// Serves modules compiled into the host, keyed by module name (the file
/// stem of the path being loaded).
///
/// Hosts that link their plugins statically register them here and keep
/// the same one-directory-per-plugin layout on disk.
#[derive(Default, Clone)]
pub struct StaticModuleLoader {
    modules: HashMap<String, RegisterFn>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module by name with its registration entry point.
    pub fn insert<F>(&mut self, name: impl Into<String>, register: F)
    where
        F: Fn(&mut dyn DispatcherRegistrar) + Send + Sync + 'static,
    {
        self.modules.insert(name.into(), Arc::new(register));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_module<F>(mut self, name: impl Into<String>, register: F) -> Self
    where
        F: Fn(&mut dyn DispatcherRegistrar) + Send + Sync + 'static,
    {
        self.insert(name, register);
        self
    }

    /// Register a module from a declaration produced by `export_plugin!`.
    ///
    /// # Errors
    /// `SwitchPlugError::IncompatiblePlugin` if the declaration targets another ABI.
    pub fn with_declaration(
        self,
        name: impl Into<String>,
        declaration: &'static PluginDeclaration,
    ) -> Result<Self> {
        let name = name.into();
        declaration
            .check_compatible()
            .map_err(|reason| SwitchPlugError::IncompatiblePlugin {
                path: name.clone().into(),
                reason,
            })?;
        Ok(self.with_module(name, declaration.register))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for StaticModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.modules.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("StaticModuleLoader")
            .field("modules", &names)
            .finish()
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load_module(&self, path: &Path, module_name: &str) -> Result<LoadedModule> {
        let register = self
            .modules
            .get(module_name)
            .ok_or_else(|| SwitchPlugError::ModuleNotFound {
                path: path.to_path_buf(),
                reason: format!("No statically linked module named '{}'", module_name),
            })?;
        Ok(LoadedModule::in_process(module_name, Arc::clone(register)))
    }
}
