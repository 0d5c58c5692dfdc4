//! Pluggable modules: loading, registration and instance lifecycle.

mod applet;
mod error;
mod instance;
mod loader;
mod manager;
mod registry;

pub use applet::{Applet, AppletContext, AppletFactory, BoxedApplet, PreInitFn, PRE_INIT_SYMBOL};
pub use error::ModuleError;
pub use instance::{conf_file_number, numbered_conf_file, InstanceId, ModuleInstance, Placement};
pub use loader::{is_module_library, HostInfo, Module};
pub use manager::ModuleManager;
pub use registry::ModuleRegistry;

pub use rg_dock_types::VisitCard;
