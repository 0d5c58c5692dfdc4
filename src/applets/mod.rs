//! Modules compiled into the dock.

pub mod shared_clock;
pub mod sysmon;

use log::{debug, warn};
use rg_dock_core::module::{ModuleRegistry, PreInitFn};
use std::path::Path;

/// Pre-init functions of every compiled-in module.
pub const BUILTIN_MODULES: &[PreInitFn] = &[sysmon::pre_init, shared_clock::pre_init];

/// Register the compiled-in modules. Those that ship a default config
/// find it under `<share_dir>/plug-ins/<name>`.
pub fn register_builtins(registry: &mut ModuleRegistry, share_dir: &Path) -> usize {
    let mut count = 0;
    for pre_init in BUILTIN_MODULES {
        let name = match registry.register_builtin(*pre_init) {
            Ok(name) => name,
            Err(e) => {
                warn!("Skipping built-in module: {}", e);
                continue;
            }
        };
        if let Some(module) = registry.find_mut(&name) {
            let card = &mut module.visit_card;
            if card.conf_file_name.is_some() && card.share_data_dir.is_none() {
                let dir = share_dir.join("plug-ins").join(&card.name);
                card.share_data_dir = Some(dir.to_string_lossy().into_owned());
            }
        }
        count += 1;
    }
    debug!("Registered {} built-in module(s)", count);
    count
}
