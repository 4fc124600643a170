//! C entry points for embedding switchplug in a media server
//!
//! The media server loads this crate as a module and registers two
//! commands: an API command and a dial-plan application, both with the
//! usage `<name> [<args>]`. Each forwards its argument string and session
//! pointer to a registry the host owns through an opaque handle:
//!
//! ```c
//! switchplug_registry_t *reg = switchplug_registry_new("/usr/local/freeswitch/plugins");
//! switchplug_api(reg, "echo hello world", session);
//! switchplug_registry_free(reg);
//! ```
//!
//! A dispatcher panic is contained at this boundary and reported as an
//! unhandled command.

use std::ffi::{c_char, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, error};

use crate::plugins::{CommandChannel, PluginRegistry, SessionHandle};

const API_USAGE: &[u8] = b"<api> [<args>]\0";
const APP_USAGE: &[u8] = b"<app> [<args>]\0";

/// Hand a registry to C code. Release it with [`switchplug_registry_free`].
pub fn into_raw_handle(registry: PluginRegistry) -> *mut PluginRegistry {
    Box::into_raw(Box::new(registry))
}

/// Read a C string argument. `None` for null pointers and invalid UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> Option<&'a str> {
    if ptr.is_null() {
        debug!(argument = what, "Null string passed across the C boundary");
        return None;
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(argument = what, error = %e, "Non UTF-8 string passed across the C boundary");
            None
        }
    }
}

/// Create a native registry and load every plugin under `plugin_dir`.
///
/// A null `plugin_dir` yields an empty registry.
///
/// # Safety
/// `plugin_dir` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn switchplug_registry_new(plugin_dir: *const c_char) -> *mut PluginRegistry {
    let registry = PluginRegistry::new();
    if !plugin_dir.is_null() {
        if let Some(dir) = read_str(plugin_dir, "plugin_dir") {
            registry.load_plugins_from_subdirectories(Path::new(dir));
        }
    }
    into_raw_handle(registry)
}

/// Drop a registry and unload its plugins. Null is ignored.
///
/// # Safety
/// `registry` must be null or a handle from [`switchplug_registry_new`] or
/// [`into_raw_handle`] that has not been freed.
#[no_mangle]
pub unsafe extern "C" fn switchplug_registry_free(registry: *mut PluginRegistry) {
    if !registry.is_null() {
        drop(Box::from_raw(registry));
    }
}

/// Load one plugin. Returns `false` on any failure.
///
/// # Safety
/// `registry` must be null or a live handle; `path` must be null or a
/// valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn switchplug_load_plugin(
    registry: *const PluginRegistry,
    path: *const c_char,
) -> bool {
    let (Some(registry), Some(path)) = (registry.as_ref(), read_str(path, "path")) else {
        return false;
    };
    registry.load_plugin(path)
}

/// Route an API command. Returns `false` when nothing handled it.
///
/// # Safety
/// `registry` must be null or a live handle; `cmd` must be null or a valid
/// NUL-terminated string. `session` is passed through untouched.
#[no_mangle]
pub unsafe extern "C" fn switchplug_api(
    registry: *const PluginRegistry,
    cmd: *const c_char,
    session: *mut c_void,
) -> bool {
    dispatch(registry, CommandChannel::Api, cmd, session)
}

/// Route a dial-plan application. Returns `false` when nothing handled it.
///
/// # Safety
/// Same contract as [`switchplug_api`].
#[no_mangle]
pub unsafe extern "C" fn switchplug_app(
    registry: *const PluginRegistry,
    cmd: *const c_char,
    session: *mut c_void,
) -> bool {
    dispatch(registry, CommandChannel::DialPlan, cmd, session)
}

/// Usage string for the host's API command registration.
#[no_mangle]
pub extern "C" fn switchplug_api_usage() -> *const c_char {
    API_USAGE.as_ptr().cast()
}

/// Usage string for the host's dial-plan application registration.
#[no_mangle]
pub extern "C" fn switchplug_app_usage() -> *const c_char {
    APP_USAGE.as_ptr().cast()
}

unsafe fn dispatch(
    registry: *const PluginRegistry,
    channel: CommandChannel,
    cmd: *const c_char,
    session: *mut c_void,
) -> bool {
    let (Some(registry), Some(cmd)) = (registry.as_ref(), read_str(cmd, "cmd")) else {
        return false;
    };
    let session = SessionHandle::from_raw(session);

    match panic::catch_unwind(AssertUnwindSafe(|| registry.dispatch(channel, cmd, session))) {
        Ok(handled) => handled,
        Err(_) => {
            error!(%channel, command = cmd, "Dispatcher panicked");
            false
        }
    }
}
