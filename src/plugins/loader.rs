//! Plugin discovery for switchplug
//!
//! This module handles finding candidate plugin modules on disk. The layout
//! is one plugin per directory, and the module file must carry the
//! directory's own name:
//!
//! ```text
//! plugins/
//! ├── echo/
//! │   ├── echo.so          <- loaded
//! │   └── helper.so        <- ignored
//! └── conference/
//!     └── conference.so    <- loaded
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, SwitchPlugError};

/// The platform's dynamic library extension (`so`, `dylib` or `dll`).
pub fn default_module_extension() -> &'static str {
    std::env::consts::DLL_EXTENSION
}

/// Strip a leading dot so `".so"` and `"so"` mean the same thing.
pub fn normalize_extension(extension: &str) -> &str {
    extension.trim().trim_start_matches('.')
}

/// Whether `file` is the module file of `dir`, i.e. `<dir name>.<extension>`.
pub fn is_plugin_file(dir: &Path, file: &Path, extension: &str) -> bool {
    let (Some(dir_name), Some(file_name)) = (dir.file_name(), file.file_name()) else {
        return false;
    };
    let (Some(dir_name), Some(file_name)) = (dir_name.to_str(), file_name.to_str()) else {
        return false;
    };
    file_name == format!("{}.{}", dir_name, normalize_extension(extension))
}

/// Find every plugin module under `root`.
///
/// For each immediate subdirectory `d` of `root`, every file directly
/// inside `d` named `<d>.<extension>` is a candidate. Subdirectories are
/// visited in name order so load order is stable across runs. Unreadable
/// subdirectories are skipped with a warning.
///
/// # Errors
/// `SwitchPlugError::Io` if `root` itself cannot be read.
pub fn discover_plugin_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut candidates = Vec::new();
    for dir in dirs {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read plugin directory, skipping");
                continue;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        for file in files {
            if is_plugin_file(&dir, &file, extension) {
                candidates.push(file);
            } else {
                debug!(file = %file.display(), "Not a plugin module, ignoring");
            }
        }
    }

    info!(
        root = %root.display(),
        candidates = candidates.len(),
        "Scanned plugin directory"
    );

    Ok(candidates)
}

/// Resolve a plugin path to its canonical absolute location.
///
/// Backslashes are converted to the platform separator first, so paths
/// written on Windows resolve on unix hosts.
///
/// # Errors
/// `SwitchPlugError::ModuleNotFound` if the path does not exist.
pub fn canonical_location(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let normalized = if std::path::MAIN_SEPARATOR == '\\' {
        PathBuf::from(raw.as_ref())
    } else {
        PathBuf::from(raw.replace('\\', std::path::MAIN_SEPARATOR_STR))
    };

    fs::canonicalize(&normalized).map_err(|e| SwitchPlugError::ModuleNotFound {
        path: normalized,
        reason: e.to_string(),
    })
}

/// The logical module name of a plugin path: its file stem.
pub fn module_name(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}
