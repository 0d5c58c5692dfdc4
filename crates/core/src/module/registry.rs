//! Registry of known modules, by name.

use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;

use super::applet::PreInitFn;
use super::error::ModuleError;
use super::instance::{InstanceId, ModuleInstance};
use super::loader::{is_module_library, HostInfo, Module};

/// Every module the host knows about
///
/// Modules come from library directories or are compiled in. Auto-loaded
/// modules are also remembered in registration order so they can be
/// started before anything else.
pub struct ModuleRegistry {
    modules: HashMap<String, Module>,
    auto_loaded: Vec<String>,
    host: HostInfo,
}

impl ModuleRegistry {
    pub fn new(host: HostInfo) -> Self {
        Self {
            modules: HashMap::new(),
            auto_loaded: Vec::new(),
            host,
        }
    }

    pub fn host(&self) -> &HostInfo {
        &self.host
    }

    /// Load every module library of a directory. A library that fails to load
    /// is logged and skipped. Returns the number of modules registered.
    pub fn discover(&mut self, dir: &Path) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read module directory {}: {}", dir.display(), e);
                return 0;
            }
        };
        let mut paths: Vec<_> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_module_library(path))
            .collect();
        paths.sort();

        let mut count = 0;
        for path in paths {
            match self.load(&path) {
                Ok(_) => count += 1,
                Err(e) => warn!("Skipping module {}: {}", path.display(), e),
            }
        }
        info!("Loaded {} module(s) from {}", count, dir.display());
        count
    }

    /// Open one module library and register it.
    pub fn load(&mut self, path: &Path) -> Result<String, ModuleError> {
        let module = Module::load(path, &self.host)?;
        let name = module.name().to_string();
        if !self.register(module) {
            return Err(ModuleError::AlreadyRegistered(name));
        }
        Ok(name)
    }

    /// Register a module compiled into the host.
    pub fn register_builtin(&mut self, pre_init: PreInitFn) -> Result<String, ModuleError> {
        let module = Module::from_pre_init(pre_init, None, &self.host)?;
        let name = module.name().to_string();
        if !self.register(module) {
            return Err(ModuleError::AlreadyRegistered(name));
        }
        Ok(name)
    }

    /// Add a module. Never replaces one of the same name.
    pub fn register(&mut self, module: Module) -> bool {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            warn!("Module '{}' is already registered", name);
            return false;
        }
        if module.visit_card.is_auto_loaded() && !self.auto_loaded.contains(&name) {
            self.auto_loaded.push(name.clone());
        }
        info!("Registered module '{}'", name);
        self.modules.insert(name, module);
        true
    }

    /// Remove a module from the table. Its instances must be stopped first.
    pub fn unregister(&mut self, name: &str) -> Option<Module> {
        self.auto_loaded.retain(|n| n != name);
        self.modules.remove(name)
    }

    pub fn find(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.get_mut(name)
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

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn auto_loaded(&self) -> &[String] {
        &self.auto_loaded
    }

    /// Visit modules sorted by display title, case-insensitively. Modules
    /// without a title come last. Stops at the first callback returning true
    /// and returns that module.
    pub fn for_each_alphabetical<F>(&self, mut callback: F) -> Option<&Module>
    where
        F: FnMut(&Module) -> bool,
    {
        let mut sorted: Vec<&Module> = self.modules.values().collect();
        sorted.sort_by_key(|m| {
            (
                m.visit_card.title.is_none(),
                m.visit_card.title.as_deref().unwrap_or_default().to_lowercase(),
                m.visit_card.name.to_lowercase(),
            )
        });
        sorted.into_iter().find(|m| callback(*m))
    }

    pub fn find_instance(&self, id: InstanceId) -> Option<&ModuleInstance> {
        self.modules
            .values()
            .flat_map(|m| m.instances.iter())
            .find(|i| i.id == id)
    }

    pub fn find_instance_mut(&mut self, id: InstanceId) -> Option<&mut ModuleInstance> {
        self.modules
            .values_mut()
            .flat_map(|m| m.instances.iter_mut())
            .find(|i| i.id == id)
    }

    /// Name of the module owning an instance.
    pub fn module_of(&self, id: InstanceId) -> Option<&str> {
        self.modules
            .values()
            .find(|m| m.instances.iter().any(|i| i.id == id))
            .map(|m| m.name())
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new(HostInfo::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Applet, AppletFactory, BoxedApplet};
    use rg_dock_types::{ModuleFlags, VisitCard};

    struct Nothing;
    impl Applet for Nothing {}

    fn nothing() -> BoxedApplet {
        Box::new(Nothing)
    }

    fn zeta(card: &mut VisitCard) -> Option<AppletFactory> {
        card.name = "zeta".into();
        card.title = Some("alpha clock".into());
        Some(nothing)
    }

    fn beta(card: &mut VisitCard) -> Option<AppletFactory> {
        card.name = "beta".into();
        card.title = Some("Beta".into());
        card.flags = ModuleFlags::AUTO_LOAD;
        Some(nothing)
    }

    fn untitled(card: &mut VisitCard) -> Option<AppletFactory> {
        card.name = "aaa".into();
        Some(nothing)
    }

    #[test]
    fn test_register_never_replaces() {
        let mut registry = ModuleRegistry::default();
        assert_eq!(registry.register_builtin(zeta).unwrap(), "zeta");
        assert!(matches!(
            registry.register_builtin(zeta),
            Err(ModuleError::AlreadyRegistered(name)) if name == "zeta"
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister("zeta").is_some());
        assert!(registry.find("zeta").is_none());
    }

    #[test]
    fn test_auto_loaded_are_recorded_once() {
        let mut registry = ModuleRegistry::default();
        registry.register_builtin(beta).unwrap();
        registry.register_builtin(zeta).unwrap();
        assert_eq!(registry.auto_loaded(), ["beta".to_string()]);
        registry.unregister("beta");
        assert!(registry.auto_loaded().is_empty());
    }

    #[test]
    fn test_alphabetical_order() {
        let mut registry = ModuleRegistry::default();
        registry.register_builtin(untitled).unwrap();
        registry.register_builtin(beta).unwrap();
        registry.register_builtin(zeta).unwrap();

        let mut order = Vec::new();
        let found = registry.for_each_alphabetical(|m| {
            order.push(m.name().to_string());
            false
        });
        assert!(found.is_none());
        assert_eq!(order, vec!["zeta", "beta", "aaa"]);

        let found = registry.for_each_alphabetical(|m| m.name() == "beta");
        assert_eq!(found.map(|m| m.name()), Some("beta"));
    }

    #[test]
    fn test_discover_skips_bad_libraries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libcd-broken.so"), b"garbage").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"text").unwrap();
        let mut registry = ModuleRegistry::default();
        assert_eq!(registry.discover(dir.path()), 0);
        assert_eq!(registry.discover(&dir.path().join("missing")), 0);
        assert!(registry.is_empty());
    }
}
