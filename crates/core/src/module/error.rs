//! Errors of module loading and instance management.

use rg_dock_types::{KeyFileError, Version};
use std::path::PathBuf;

use super::InstanceId;

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("{path}: missing entry point '{symbol}'")]
    EntryPointMissing { path: PathBuf, symbol: String },

    #[error("Failed to open {path}: {source}")]
    LibraryOpen {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("{0}: the module declined to load")]
    PreInitDeclined(String),

    #[error("Module '{name}' needs host {required} or newer (running {host})")]
    VersionTooOld {
        name: String,
        required: Version,
        host: Version,
    },

    #[error("Module '{name}' was built against host {built}, running {running}")]
    BuildVersionMismatch {
        name: String,
        built: String,
        running: String,
    },

    #[error("Module '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Module '{0}' is already active")]
    AlreadyActive(String),

    #[error("Module '{0}' is not active")]
    NotActive(String),

    #[error("No module named '{0}'")]
    NotFound(String),

    #[error("No instance {0}")]
    UnknownInstance(InstanceId),

    #[error("Module '{0}' could not create any instance")]
    NoInstanceCreated(String),

    #[error("Cannot read the config of '{module}': {source}")]
    ConfigUnreadable {
        module: String,
        #[source]
        source: KeyFileError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ModuleError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
