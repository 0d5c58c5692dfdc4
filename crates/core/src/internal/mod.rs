//! Internal modules: the compiled-in configuration categories of the main
//! config file.
//!
//! Each category parses its own group and pushes the effective values into
//! the scene. External modules may link themselves to one category so the
//! config UI shows them together.

mod categories;

pub use categories::{
    AccessibilityConfig, BackgroundConfig, CategoryConfig, ConfigCategory, DeskletsConfig, DialogsConfig,
    IconsConfig, IndicatorsConfig, LabelsConfig, PositionConfig, ScreenBorder, SystemConfig, TaskBarConfig,
    ViewsConfig,
};

use log::{debug, info, warn};
use rg_dock_types::{KeyFile, KeyFileError, ModuleCategory, VisitCard};
use std::any::Any;
use std::collections::BTreeMap;
use std::path::Path;

use crate::module::ModuleRegistry;
use crate::scene::Scene;

/// What the rest of the dock must do after a category changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReloadEffect {
    /// Applet instances must be reloaded (their default size or decoration changed).
    pub reload_applets: bool,
    pub redraw_docks: bool,
}

impl ReloadEffect {
    pub fn merge(&mut self, other: ReloadEffect) {
        self.reload_applets |= other.reload_applets;
        self.redraw_docks |= other.redraw_docks;
    }
}

/// A compiled-in configuration category.
pub trait InternalModule {
    fn name(&self) -> &str;

    fn category(&self) -> ModuleCategory;

    /// Parse this category's group. Returns true when keys were missing and
    /// the file should be rewritten.
    fn get_config(&mut self, key_file: &KeyFile) -> bool;

    /// Push the parsed config into the scene.
    fn apply(&mut self, scene: &mut Scene) -> ReloadEffect;

    /// Re-parse, then apply against the previously applied config.
    fn reload(&mut self, key_file: &KeyFile, scene: &mut Scene) -> ReloadEffect {
        self.get_config(key_file);
        self.apply(scene)
    }

    /// External modules grouped under this category.
    fn external_modules(&self) -> &[String];

    fn add_external_module(&mut self, name: &str);

    fn as_any(&self) -> &dyn Any;
}

pub type BoxedInternalModule = Box<dyn InternalModule>;

/// The fixed table of internal modules
pub struct InternalModuleRegistry {
    modules: BTreeMap<String, BoxedInternalModule>,
}

impl InternalModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in category.
    pub fn preload() -> Self {
        let mut registry = Self::new();
        registry.register(Box::<ConfigCategory<PositionConfig>>::default());
        registry.register(Box::<ConfigCategory<AccessibilityConfig>>::default());
        registry.register(Box::<ConfigCategory<SystemConfig>>::default());
        registry.register(Box::<ConfigCategory<TaskBarConfig>>::default());
        registry.register(Box::<ConfigCategory<BackgroundConfig>>::default());
        registry.register(Box::<ConfigCategory<IconsConfig>>::default());
        registry.register(Box::<ConfigCategory<LabelsConfig>>::default());
        registry.register(Box::<ConfigCategory<DialogsConfig>>::default());
        registry.register(Box::<ConfigCategory<IndicatorsConfig>>::default());
        registry.register(Box::<ConfigCategory<ViewsConfig>>::default());
        registry.register(Box::<ConfigCategory<DeskletsConfig>>::default());
        debug!("Preloaded {} internal modules", registry.len());
        registry
    }

    pub fn register(&mut self, module: BoxedInternalModule) {
        self.modules.insert(module.name().to_string(), module);
    }

    pub fn find(&self, name: &str) -> Option<&dyn InternalModule> {
        self.modules.get(name).map(|m| m.as_ref())
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut BoxedInternalModule> {
        self.modules.get_mut(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Current config of one category.
    pub fn config<C: CategoryConfig>(&self) -> Option<&C> {
        self.modules
            .get(C::NAME)?
            .as_any()
            .downcast_ref::<ConfigCategory<C>>()
            .map(|category| &category.config)
    }

    /// Parse every category from the main config file. Returns true when
    /// any of them wants the file rewritten.
    pub fn aggregate_global_config(&mut self, key_file: &KeyFile) -> bool {
        let mut flush = false;
        for module in self.modules.values_mut() {
            flush |= module.get_config(key_file);
        }
        flush
    }

    pub fn apply_all(&mut self, scene: &mut Scene) -> ReloadEffect {
        let mut effect = ReloadEffect::default();
        for module in self.modules.values_mut() {
            effect.merge(module.apply(scene));
        }
        effect
    }

    /// Re-read one category from an already loaded main config.
    pub fn reload_internal_module_from_keyfile(
        &mut self,
        name: &str,
        key_file: &KeyFile,
        scene: &mut Scene,
    ) -> Option<ReloadEffect> {
        let Some(module) = self.modules.get_mut(name) else {
            warn!("No internal module named '{}'", name);
            return None;
        };
        let effect = module.reload(key_file, scene);
        debug!("Reloaded internal module '{}': {:?}", name, effect);
        Some(effect)
    }

    /// Re-read one category from the main config file.
    pub fn reload_internal_module(
        &mut self,
        name: &str,
        conf_file: &Path,
        scene: &mut Scene,
    ) -> Result<Option<ReloadEffect>, KeyFileError> {
        let key_file = KeyFile::load(conf_file)?;
        Ok(self.reload_internal_module_from_keyfile(name, &key_file, scene))
    }

    /// Group an external module under an internal one.
    ///
    /// Fails when the categories differ or the module is already linked.
    pub fn attach_to_another_module(&mut self, card: &mut VisitCard, name: &str) -> bool {
        let Some(internal) = self.modules.get_mut(name) else {
            warn!("Cannot attach '{}' to unknown internal module '{}'", card.name, name);
            return false;
        };
        if internal.category() != card.category || card.internal_module.is_some() {
            warn!("Module '{}' cannot be attached to '{}'", card.name, name);
            return false;
        }
        internal.add_external_module(&card.name);
        card.internal_module = Some(name.to_string());
        true
    }

    /// Honour the internal module each registered module asked to join.
    ///
    /// A declaration that cannot be honoured stays on the card.
    pub fn link_declared_modules(&mut self, modules: &mut ModuleRegistry) -> usize {
        let mut linked = 0;
        for name in modules.names() {
            let Some(module) = modules.find_mut(&name) else {
                continue;
            };
            let Some(target) = module.visit_card.internal_module.take() else {
                continue;
            };
            if self.attach_to_another_module(&mut module.visit_card, &target) {
                linked += 1;
            } else {
                module.visit_card.internal_module = Some(target);
            }
        }
        if linked > 0 {
            info!("Linked {} module(s) to internal modules", linked);
        }
        linked
    }
}

impl Default for InternalModuleRegistry {
    fn default() -> Self {
        Self::preload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Applet, AppletFactory, BoxedApplet};
    use crate::scene::ScreenGeometry;
    use rg_dock_types::ModuleCategory;

    fn main_conf() -> KeyFile {
        let mut kf = KeyFile::new();
        kf.set_int("Icons", "applet width", 36);
        kf.set_int("Icons", "applet height", 36);
        kf.set_int("System", "fast delta", 20);
        kf.set_string("System", "modules", "clock;weather");
        kf.set_string("Desklets", "decorations", "frame");
        kf
    }

    #[test]
    fn test_preload_registers_every_category() {
        let registry = InternalModuleRegistry::preload();
        assert_eq!(registry.len(), 11);
        for name in [
            "Position",
            "Accessibility",
            "System",
            "TaskBar",
            "Background",
            "Icons",
            "Labels",
            "Dialogs",
            "Indicators",
            "Views",
            "Desklets",
        ] {
            assert!(registry.find(name).is_some(), "{name}");
        }
    }

    #[test]
    fn test_aggregate_and_apply() {
        let mut registry = InternalModuleRegistry::preload();
        let mut scene = Scene::new(ScreenGeometry::default());
        // Most keys are missing, so the file needs rewriting.
        assert!(registry.aggregate_global_config(&main_conf()));
        let effect = registry.apply_all(&mut scene);
        assert!(!effect.reload_applets);

        assert_eq!(scene.settings.fast_delta_ms, 20);
        assert_eq!(scene.settings.slow_delta_ms(), 40);
        assert_eq!(scene.settings.default_icon_size(ModuleCategory::Accessory), (36, 36));
        assert_eq!(scene.settings.default_desklet_decoration, "frame");
        let system = registry.config::<SystemConfig>().unwrap();
        assert_eq!(system.modules, vec!["clock".to_string(), "weather".into()]);
    }

    #[test]
    fn test_reload_reports_icon_size_change() {
        let mut registry = InternalModuleRegistry::preload();
        let mut scene = Scene::new(ScreenGeometry::default());
        let mut kf = main_conf();
        registry.aggregate_global_config(&kf);
        registry.apply_all(&mut scene);

        let unchanged = registry
            .reload_internal_module_from_keyfile("Icons", &kf, &mut scene)
            .unwrap();
        assert!(!unchanged.reload_applets);

        kf.set_int("Icons", "applet width", 48);
        let changed = registry
            .reload_internal_module_from_keyfile("Icons", &kf, &mut scene)
            .unwrap();
        assert!(changed.reload_applets);
        assert_eq!(scene.settings.default_icon_size(ModuleCategory::Accessory), (48, 36));
        assert!(registry
            .reload_internal_module_from_keyfile("Nope", &kf, &mut scene)
            .is_none());
    }

    #[test]
    fn test_reload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.conf");
        main_conf().save(&path).unwrap();
        let mut registry = InternalModuleRegistry::preload();
        let mut scene = Scene::new(ScreenGeometry::default());
        let effect = registry.reload_internal_module("System", &path, &mut scene).unwrap();
        assert!(effect.is_some());
        assert_eq!(scene.settings.fast_delta_ms, 20);
        assert!(registry
            .reload_internal_module("System", &dir.path().join("missing.conf"), &mut scene)
            .is_err());
    }

    #[test]
    fn test_attach_to_another_module() {
        let mut registry = InternalModuleRegistry::preload();
        let mut card = VisitCard::new("shortcuts");
        card.category = ModuleCategory::Theme;
        assert!(registry.attach_to_another_module(&mut card, "Icons"));
        assert_eq!(card.internal_module.as_deref(), Some("Icons"));
        assert_eq!(registry.find("Icons").unwrap().external_modules(), ["shortcuts".to_string()]);

        // Already attached.
        assert!(!registry.attach_to_another_module(&mut card, "Labels"));

        let mut other = VisitCard::new("switcher");
        other.category = ModuleCategory::Accessory;
        assert!(!registry.attach_to_another_module(&mut other, "Icons"));
        assert!(!registry.attach_to_another_module(&mut other, "Nowhere"));
        assert!(other.internal_module.is_none());
    }

    struct Nothing;
    impl Applet for Nothing {}

    fn nothing() -> BoxedApplet {
        Box::new(Nothing)
    }

    fn shortcuts(card: &mut VisitCard) -> Option<AppletFactory> {
        card.name = "shortcuts".into();
        card.category = ModuleCategory::Theme;
        card.internal_module = Some("Icons".into());
        Some(nothing)
    }

    fn switcher(card: &mut VisitCard) -> Option<AppletFactory> {
        card.name = "switcher".into();
        card.category = ModuleCategory::Accessory;
        card.internal_module = Some("Icons".into());
        Some(nothing)
    }

    #[test]
    fn test_link_declared_modules_keeps_failed_links() {
        let mut registry = InternalModuleRegistry::preload();
        let mut modules = ModuleRegistry::default();
        modules.register_builtin(shortcuts).unwrap();
        modules.register_builtin(switcher).unwrap();

        assert_eq!(registry.link_declared_modules(&mut modules), 1);
        let card = |name: &str| modules.find(name).unwrap().visit_card.internal_module.clone();
        assert_eq!(card("shortcuts").as_deref(), Some("Icons"));
        assert_eq!(card("switcher").as_deref(), Some("Icons"));
        assert_eq!(registry.find("Icons").unwrap().external_modules(), ["shortcuts".to_string()]);

        // Linking again changes nothing.
        assert_eq!(registry.link_declared_modules(&mut modules), 1);
        assert_eq!(registry.find("Icons").unwrap().external_modules(), ["shortcuts".to_string()]);
    }
}
