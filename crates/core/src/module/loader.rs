//! Loaded modules and the checks run when one is opened.

use libloading::{Library, Symbol};
use log::debug;
use rg_dock_types::{module_name_from_path, Version, VisitCard};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use super::applet::{AppletFactory, BoxedApplet, PreInitFn, PRE_INIT_SYMBOL};
use super::error::ModuleError;
use super::instance::ModuleInstance;
use crate::constants::{HOST_VERSION, HOST_VERSION_STRING, MODULE_EXTENSIONS};

/// Host version information modules are checked against.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub version: Version,
    pub version_string: String,
    /// Load modules even when their version checks fail.
    pub allow_incompatible: bool,
}

impl HostInfo {
    pub fn current(allow_incompatible: bool) -> Self {
        Self {
            version: *HOST_VERSION,
            version_string: HOST_VERSION_STRING.to_string(),
            allow_incompatible,
        }
    }
}

impl Default for HostInfo {
    fn default() -> Self {
        Self::current(false)
    }
}

pub struct Module {
    pub visit_card: VisitCard,
    factory: AppletFactory,
    /// Most recent first.
    pub(crate) instances: Vec<ModuleInstance>,
    /// Base config file, resolved on activation.
    pub conf_file: Option<PathBuf>,
    /// `None` for modules compiled into the host.
    pub so_path: Option<PathBuf>,
    /// Loading pass that last activated or reloaded the module.
    pub generation: u64,
    // Dropped last: instances may run code from the library.
    library: Option<Library>,
}

impl Module {
    /// Run a pre-init function and validate what it declared.
    pub fn from_pre_init(
        pre_init: PreInitFn,
        so_path: Option<&Path>,
        host: &HostInfo,
    ) -> Result<Self, ModuleError> {
        let mut card = VisitCard::new("");
        let source = so_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in module".to_string());
        let factory = pre_init(&mut card).ok_or_else(|| ModuleError::PreInitDeclined(source.clone()))?;

        if card.name.is_empty() {
            match so_path.and_then(|p| p.to_str()) {
                Some(path) => card.name = module_name_from_path(path),
                None => return Err(ModuleError::PreInitDeclined(source)),
            }
        }

        if !host.allow_incompatible {
            if !host.version.satisfies(&card.required_host) {
                return Err(ModuleError::VersionTooOld {
                    name: card.name,
                    required: card.required_host,
                    host: host.version,
                });
            }
            if let Some(built) = &card.host_version_on_build {
                if *built != host.version_string {
                    return Err(ModuleError::BuildVersionMismatch {
                        name: card.name.clone(),
                        built: built.clone(),
                        running: host.version_string.clone(),
                    });
                }
            }
        }

        debug!("Module '{}' v{} validated ({})", card.name, card.module_version, source);
        Ok(Self {
            visit_card: card,
            factory,
            instances: Vec::new(),
            conf_file: None,
            so_path: so_path.map(Path::to_path_buf),
            generation: 0,
            library: None,
        })
    }

    /// Open a module library and run its pre-init entry point.
    pub fn load(path: &Path, host: &HostInfo) -> Result<Self, ModuleError> {
        let library = unsafe { Library::new(path) }.map_err(|source| ModuleError::LibraryOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let pre_init: PreInitFn = {
            let symbol: Symbol<PreInitFn> = unsafe { library.get(PRE_INIT_SYMBOL) }.map_err(|_| {
                ModuleError::EntryPointMissing {
                    path: path.to_path_buf(),
                    symbol: String::from_utf8_lossy(&PRE_INIT_SYMBOL[..PRE_INIT_SYMBOL.len() - 1]).into_owned(),
                }
            })?;
            *symbol
        };

        let mut module = Self::from_pre_init(pre_init, Some(path), host)?;
        module.library = Some(library);
        Ok(module)
    }

    pub fn name(&self) -> &str {
        &self.visit_card.name
    }

    /// Active means at least one running instance.
    pub fn is_active(&self) -> bool {
        !self.instances.is_empty()
    }

    pub fn instances(&self) -> &[ModuleInstance] {
        &self.instances
    }

    pub fn is_builtin(&self) -> bool {
        self.so_path.is_none()
    }

    pub(crate) fn create_applet(&self) -> BoxedApplet {
        (self.factory)()
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.visit_card.name)
            .field("instances", &self.instances.len())
            .field("so_path", &self.so_path)
            .finish()
    }
}

/// Whether a path looks like a loadable module library.
pub fn is_module_library(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| MODULE_EXTENSIONS.contains(&ext))
}
