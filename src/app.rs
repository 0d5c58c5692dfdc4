//! The dock application: scene, renderers, modules and the main config file.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rg_dock_core::constants::PLUG_INS_DIR;
use rg_dock_core::data_renderer::RendererRegistry;
use rg_dock_core::internal::SystemConfig;
use rg_dock_core::module::{HostInfo, InstanceId, ModuleError, ModuleManager, ModuleRegistry};
use rg_dock_core::{ContainerRef, InternalModuleRegistry, KeyFile, ReloadEffect, Scene, ScreenGeometry};
use std::path::{Path, PathBuf};

use crate::applets;
use crate::config::AppConfig;
use crate::ui::LauncherBrowser;

/// Sub-directory of the theme holding user renderer themes.
const EXTRAS_DIR: &str = "extras";

/// Default main config, inside the share directory.
const DEFAULT_MAIN_CONF: &str = "rg-dock.conf";

/// One line of `--list-modules`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSummary {
    pub name: String,
    pub title: String,
    pub version: String,
    pub active: bool,
    pub instances: usize,
    pub builtin: bool,
}

pub struct App {
    pub scene: Scene,
    pub renderers: RendererRegistry,
    pub modules: ModuleManager,
    pub internals: InternalModuleRegistry,
    pub browser: LauncherBrowser,
    main_conf: PathBuf,
    share_dir: PathBuf,
    allow_accelerated: bool,
    ticks: u64,
}

impl App {
    /// Set up everything short of loading the main config.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let theme_dir = config.resolved_theme_dir()?;
        std::fs::create_dir_all(theme_dir.join(PLUG_INS_DIR))
            .with_context(|| format!("Cannot create theme directory {}", theme_dir.display()))?;
        let share_dir = config.resolved_share_dir();

        let scene = Scene::new(ScreenGeometry::new(config.screen.width, config.screen.height));

        let mut renderers = RendererRegistry::with_dirs(Some(share_dir.clone()), Some(theme_dir.join(EXTRAS_DIR)));
        rg_dock_render::register_all(&mut renderers);

        let mut registry = ModuleRegistry::new(HostInfo::current(config.easter_eggs));
        applets::register_builtins(&mut registry, &share_dir);
        for dir in &config.module_dirs {
            let found = registry.discover(dir);
            info!("Found {} module(s) in {}", found, dir.display());
        }
        let mut internals = InternalModuleRegistry::preload();
        internals.link_declared_modules(&mut registry);

        info!(
            "{} module(s) and {} internal module(s) available",
            registry.len(),
            internals.len()
        );
        Ok(Self {
            scene,
            renderers,
            modules: ModuleManager::new(registry, &theme_dir),
            internals,
            browser: LauncherBrowser::new(),
            main_conf: theme_dir.join(&config.main_conf_file),
            share_dir,
            allow_accelerated: config.accelerated,
            ticks: 0,
        })
    }

    pub fn main_conf(&self) -> &Path {
        &self.main_conf
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Load the main config and activate the modules it lists.
    pub fn start(&mut self) -> Result<u64> {
        self.load_main_conf()?;
        self.internals.apply_all(&mut self.scene);
        self.restrict_acceleration();

        let names = self.active_module_names();
        let generation = self
            .modules
            .activate_modules_from_list(&mut self.scene, &self.renderers, &names);
        warn!("Dock started with {} active module(s)", names.len());
        Ok(generation)
    }

    /// Re-read the main config: modules it lists are reloaded or started,
    /// the others stopped.
    pub fn reload_main_conf(&mut self) -> Result<()> {
        self.load_main_conf()?;
        let effect = self.internals.apply_all(&mut self.scene);
        self.restrict_acceleration();

        let names = self.active_module_names();
        let generation = self
            .modules
            .activate_modules_from_list(&mut self.scene, &self.renderers, &names);
        self.modules
            .deactivate_old_modules(&mut self.scene, &self.renderers, generation);
        self.apply_effect(effect);
        Ok(())
    }

    /// Re-read one internal module after its group of the main config changed.
    pub fn reload_internal_module(&mut self, name: &str) -> Result<bool> {
        let effect = self
            .internals
            .reload_internal_module(name, &self.main_conf, &mut self.scene)
            .with_context(|| format!("Cannot read {}", self.main_conf.display()))?;
        let Some(effect) = effect else {
            return Ok(false);
        };
        self.restrict_acceleration();
        self.apply_effect(effect);
        Ok(true)
    }

    pub fn activate_module(&mut self, name: &str) -> Result<(), ModuleError> {
        self.modules
            .activate_module_and_load(&mut self.scene, &self.renderers, name)
    }

    pub fn deactivate_module(&mut self, name: &str) -> Result<(), ModuleError> {
        self.modules
            .deactivate_module_and_unload(&mut self.scene, &self.renderers, name)
    }

    pub fn add_instance(&mut self, name: &str) -> Result<InstanceId, ModuleError> {
        self.modules.add_instance(&mut self.scene, &self.renderers, name)
    }

    pub fn remove_instance(&mut self, id: InstanceId) -> Result<(), ModuleError> {
        self.modules.remove_instance(&mut self.scene, &self.renderers, id)
    }

    /// One slow animation tick.
    pub fn tick(&mut self) {
        self.ticks += 1;
        self.scene.tick();
        self.modules.poll_applets(&mut self.scene, &self.renderers);
    }

    /// Deferred work, run when the loop has nothing else to do.
    pub fn idle(&mut self) {
        if self.modules.is_modules_write_pending() {
            match self.modules.flush_active_modules(&self.main_conf) {
                Ok(true) => debug!("Active modules written to {}", self.main_conf.display()),
                Ok(false) => {}
                Err(e) => warn!("Cannot write the active modules: {}", e),
            }
        }
        if self.modules.take_launcher_refresh() {
            if let Err(e) = self.browser.refresh(&self.scene, &mut self.modules) {
                warn!("Cannot refresh the launcher browser: {}", e);
            }
        }
    }

    /// Every known module, alphabetically.
    pub fn list_modules(&self) -> Vec<ModuleSummary> {
        let mut list = Vec::new();
        self.modules.registry().for_each_alphabetical(|module| {
            list.push(ModuleSummary {
                name: module.name().to_string(),
                title: module.visit_card.display_title().to_string(),
                version: module.visit_card.module_version.clone(),
                active: module.is_active(),
                instances: module.instances().len(),
                builtin: module.is_builtin(),
            });
            false
        });
        list
    }

    pub fn shutdown(&mut self) {
        self.browser.close();
        self.modules.shutdown(&mut self.scene, &self.renderers);
        info!("Stopped after {} tick(s)", self.ticks);
    }

    /// Read the main config, installing or upgrading it from the default one
    /// when needed.
    fn load_main_conf(&mut self) -> Result<()> {
        let mut key_file = if self.main_conf.exists() {
            KeyFile::load(&self.main_conf).with_context(|| format!("Cannot read {}", self.main_conf.display()))?
        } else {
            info!("No main config at {}, using defaults", self.main_conf.display());
            KeyFile::new()
        };

        let version = env!("CARGO_PKG_VERSION");
        if self.internals.aggregate_global_config(&key_file) || key_file.is_older_than(version) {
            let template_path = self.share_dir.join(DEFAULT_MAIN_CONF);
            let template = KeyFile::load(&template_path).unwrap_or_else(|e| {
                debug!("No default main config at {}: {}", template_path.display(), e);
                KeyFile::new()
            });
            key_file = key_file.merged_over(&template);
            key_file.version = Some(version.to_string());
            key_file
                .save(&self.main_conf)
                .with_context(|| format!("Cannot write {}", self.main_conf.display()))?;
            self.internals.aggregate_global_config(&key_file);
            debug!("Main config upgraded to v{}", version);
        }
        Ok(())
    }

    fn active_module_names(&self) -> Vec<String> {
        self.internals
            .config::<SystemConfig>()
            .map(|system| system.modules.clone())
            .unwrap_or_default()
    }

    fn restrict_acceleration(&mut self) {
        if !self.allow_accelerated && self.scene.settings.accelerated {
            debug!("Accelerated rendering disabled on the command line");
            self.scene.settings.accelerated = false;
        }
    }

    fn apply_effect(&mut self, effect: ReloadEffect) {
        if effect.reload_applets {
            self.modules.reload_all(&mut self.scene, &self.renderers, false);
        }
        if effect.redraw_docks {
            let docks: Vec<String> = self.scene.docks().map(|d| d.name.clone()).collect();
            for dock in docks {
                self.scene.queue_redraw(&ContainerRef::Dock(dock));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SHARE_DIR;
    use rg_dock_core::internal::IconsConfig;

    fn app_config(dir: &Path) -> AppConfig {
        AppConfig {
            theme_dir: Some(dir.join("theme")),
            share_dir: Some(PathBuf::from(DEFAULT_SHARE_DIR)),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_fresh_theme_gets_default_main_conf() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(&app_config(dir.path())).unwrap();
        app.start().unwrap();

        assert!(app.main_conf().exists());
        let written = KeyFile::load(app.main_conf()).unwrap();
        assert_eq!(written.version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
        assert!(written.has_key("Icons", "applet width"));

        let modules = app.list_modules();
        let sysmon = modules.iter().find(|m| m.name == "sysmon").unwrap();
        assert!(sysmon.active);
        assert_eq!(sysmon.instances, 1);
        assert!(sysmon.builtin);
        let clock = modules.iter().find(|m| m.name == "shared-clock").unwrap();
        assert!(clock.active);
        assert!(dir.path().join("theme/plug-ins/sysmon/sysmon.conf").exists());
        app.shutdown();
    }

    #[test]
    fn test_reload_stops_unlisted_modules() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(&app_config(dir.path())).unwrap();
        app.start().unwrap();

        KeyFile::update_file(app.main_conf(), |kf| {
            kf.set_string("System", "modules", "");
        })
        .unwrap();
        app.reload_main_conf().unwrap();

        let modules = app.list_modules();
        assert!(!modules.iter().find(|m| m.name == "sysmon").unwrap().active);
        assert!(modules.iter().find(|m| m.name == "shared-clock").unwrap().active);
    }

    #[test]
    fn test_internal_reload_resizes_applets() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(&app_config(dir.path())).unwrap();
        app.start().unwrap();

        KeyFile::update_file(app.main_conf(), |kf| {
            kf.set_int("Icons", "applet width", 64);
            kf.set_int("Icons", "applet height", 64);
        })
        .unwrap();
        assert!(app.reload_internal_module("Icons").unwrap());
        assert_eq!(app.internals.config::<IconsConfig>().unwrap().applet_size, (64, 64));
        assert!(!app.reload_internal_module("Nope").unwrap());
    }

    #[test]
    fn test_no_accel_overrides_main_conf() {
        let dir = tempfile::tempdir().unwrap();
        let theme = dir.path().join("theme");
        let mut main_conf = KeyFile::load(&Path::new(DEFAULT_SHARE_DIR).join(DEFAULT_MAIN_CONF)).unwrap();
        main_conf.set_bool("System", "accelerated", true);
        main_conf.save(&theme.join("rg-dock.conf")).unwrap();

        let config = AppConfig {
            accelerated: false,
            ..app_config(dir.path())
        };
        let mut app = App::new(&config).unwrap();
        app.start().unwrap();
        assert!(!app.scene.settings.accelerated);
    }

    #[test]
    fn test_instances_tick_and_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(&app_config(dir.path())).unwrap();
        app.start().unwrap();

        let id = app.add_instance("sysmon").unwrap();
        assert_eq!(app.list_modules().iter().find(|m| m.name == "sysmon").unwrap().instances, 2);
        for _ in 0..3 {
            app.tick();
        }
        assert_eq!(app.ticks(), 3);
        app.remove_instance(id).unwrap();

        app.deactivate_module("sysmon").unwrap();
        app.idle();
        let written = KeyFile::load(app.main_conf()).unwrap();
        assert!(written.get_string_list("System", "modules").is_empty());

        app.activate_module("sysmon").unwrap();
        app.idle();
        let written = KeyFile::load(app.main_conf()).unwrap();
        assert_eq!(written.get_string_list("System", "modules"), vec!["sysmon".to_string()]);
    }
}
