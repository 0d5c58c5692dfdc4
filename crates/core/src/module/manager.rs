//! Instance lifecycle: activation, reload, multi-instance config files and
//! migration between docks and desklets.

use log::{debug, info, warn};
use rg_dock_types::{
    DeskletAttributes, KeyFile, KeyFileError, MinimalAppletConfig, ModuleFlags, VisitCard, DESKLET_GROUP,
    ICON_GROUP,
};
use std::any::Any;
use std::path::{Path, PathBuf};

use super::applet::{Applet, AppletContext};
use super::error::ModuleError;
use super::instance::{conf_file_number, numbered_conf_file, InstanceId, ModuleInstance, Placement};
use super::registry::ModuleRegistry;
use crate::constants::{DEFAULT_DETACH_SIZE, DEFAULT_DOCK_NAME, MODULES_KEY, PLUG_INS_DIR, SYSTEM_GROUP};
use crate::container::ContainerRef;
use crate::data_renderer::RendererRegistry;
use crate::data_slot::DataSlotTable;
use crate::icon::IconId;
use crate::scene::{Scene, SceneSettings};

/// Where an instance should live according to its config.
enum Target {
    Nowhere,
    Dock(String),
    Desklet(DeskletAttributes),
}

/// Owns the module registry and drives every instance through
/// instantiate, reload and stop.
///
/// The scene and the renderer registry are lent on each call; the manager
/// never keeps references into them.
pub struct ModuleManager {
    registry: ModuleRegistry,
    slots: DataSlotTable,
    /// Current theme; user config files live in `<theme_dir>/plug-ins`.
    theme_dir: PathBuf,
    generation: u64,
    next_instance_id: u64,
    auto_loaded_started: bool,
    modules_write_pending: bool,
    launcher_refresh_pending: bool,
}

impl ModuleManager {
    pub fn new(registry: ModuleRegistry, theme_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            slots: DataSlotTable::new(),
            theme_dir: theme_dir.into(),
            generation: 0,
            next_instance_id: 0,
            auto_loaded_started: false,
            modules_write_pending: false,
            launcher_refresh_pending: false,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    pub fn slots(&self) -> &DataSlotTable {
        &self.slots
    }

    pub fn theme_dir(&self) -> &Path {
        &self.theme_dir
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn instance(&self, id: InstanceId) -> Option<&ModuleInstance> {
        self.registry.find_instance(id)
    }

    /// Instances of a module, most recent first.
    pub fn instance_ids(&self, name: &str) -> Vec<InstanceId> {
        self.registry
            .find(name)
            .map(|m| m.instances.iter().map(|i| i.id).collect())
            .unwrap_or_default()
    }

    /// Every running instance, grouped by module name.
    pub fn all_instance_ids(&self) -> Vec<InstanceId> {
        self.registry
            .names()
            .iter()
            .flat_map(|name| self.instance_ids(name))
            .collect()
    }

    /// Instance owning an icon.
    pub fn instance_for_icon(&self, icon: IconId) -> Option<InstanceId> {
        self.registry
            .modules()
            .flat_map(|m| m.instances.iter())
            .find(|i| i.icon == Some(icon))
            .map(|i| i.id)
    }

    fn instance_and_card(&self, id: InstanceId) -> Result<(&ModuleInstance, &VisitCard), ModuleError> {
        let instance = self.registry.find_instance(id).ok_or(ModuleError::UnknownInstance(id))?;
        let module = self
            .registry
            .find(&instance.module_name)
            .ok_or_else(|| ModuleError::NotFound(instance.module_name.clone()))?;
        Ok((instance, &module.visit_card))
    }

    // ===== Config files =====

    /// Make sure the user copy of a module's config file exists.
    ///
    /// Returns `None` for configless modules, or when the default file
    /// cannot be copied.
    pub fn ensure_conf_file(&self, card: &VisitCard) -> Option<PathBuf> {
        let conf_name = card.conf_file_name.as_deref()?;
        let user_dir = self
            .theme_dir
            .join(PLUG_INS_DIR)
            .join(card.user_data_dir.as_deref().unwrap_or(&card.name));
        if let Err(e) = std::fs::create_dir_all(&user_dir) {
            warn!("Cannot create {}: {}", user_dir.display(), e);
            return None;
        }

        let path = user_dir.join(conf_name);
        if !path.exists() {
            let Some(template) = template_path(card) else {
                warn!("Module '{}' ships no default config", card.name);
                return None;
            };
            if let Err(e) = std::fs::copy(&template, &path) {
                warn!("Cannot copy {} to {}: {}", template.display(), path.display(), e);
                return None;
            }
            debug!("Installed default config of '{}' at {}", card.name, path.display());
        }
        Some(path)
    }

    /// Prepare the config file of the next instance of a module.
    ///
    /// The file is cloned from the base file. When the oldest instance lives
    /// in a desklet, the new desklet is shifted sideways so both stay visible.
    pub fn add_conf_file(&self, scene: &Scene, name: &str) -> Result<Option<PathBuf>, ModuleError> {
        let module = self
            .registry
            .find(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;
        if !module.is_active() {
            return Ok(self.ensure_conf_file(&module.visit_card));
        }
        let Some(base) = module.conf_file.clone() else {
            return Ok(None);
        };

        let used: Vec<usize> = module.instances.iter().filter_map(|i| i.file_number(&base)).collect();
        let number = (0..).find(|n| !used.contains(n)).unwrap_or(used.len());
        let path = numbered_conf_file(&base, number);
        if !path.exists() {
            std::fs::copy(&base, &path).map_err(|e| ModuleError::io(&path, e))?;
        }

        let first_desklet = module
            .instances
            .last()
            .and_then(|i| i.placement.desklet())
            .and_then(|id| scene.desklet(id));
        if let Some(desklet) = first_desklet {
            let x = offset_desklet_x(desklet.x, desklet.width, scene.screen.width);
            KeyFile::update_file(&path, |kf| {
                kf.set_int(DESKLET_GROUP, "x position", i64::from(x));
                kf.set_bool(DESKLET_GROUP, "locked", false);
                kf.set_bool(DESKLET_GROUP, "no input", false);
            })
            .map_err(|source| ModuleError::ConfigUnreadable {
                module: name.to_string(),
                source,
            })?;
        }
        debug!("New config file for '{}': {}", name, path.display());
        Ok(Some(path))
    }

    // ===== Instances =====

    /// Create one instance of a module from a config file.
    pub fn instantiate(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        name: &str,
        conf_file: Option<PathBuf>,
    ) -> Result<InstanceId, ModuleError> {
        let module = self
            .registry
            .find(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;
        let card = module.visit_card.clone();
        let mut applet = module.create_applet();

        let mut key_file = match &conf_file {
            Some(path) => Some(KeyFile::load(path).map_err(|source| ModuleError::ConfigUnreadable {
                module: name.to_string(),
                source,
            })?),
            None => None,
        };
        let mut config = minimal_config_from(&card, key_file.as_ref(), &scene.settings);
        let target = target_of(&card, &config);

        if config.order.is_none() && !matches!(target, Target::Nowhere) {
            let dock = match &target {
                Target::Dock(dock) => Some(dock.as_str()),
                _ => None,
            };
            let order = next_order(scene, dock);
            config.order = Some(order);
            if let (Some(kf), Some(path)) = (key_file.as_mut(), conf_file.as_deref()) {
                kf.set_double(ICON_GROUP, "order", order);
                if let Err(e) = kf.save(path) {
                    warn!("Cannot store the order of '{}': {}", name, e);
                }
            }
        }

        self.next_instance_id += 1;
        let id = InstanceId(self.next_instance_id);

        let placement = match &target {
            Target::Nowhere => Placement::None,
            Target::Dock(dock) => {
                scene.create_dock(dock);
                Placement::Dock(dock.clone())
            }
            Target::Desklet(attributes) => Placement::Desklet(scene.create_desklet(attributes, None)),
        };
        let icon = placement.container().map(|container| {
            let icon = scene.create_icon_for_applet(&config, &container, id);
            if let Some(desklet) = placement.desklet() {
                let title = config.label.as_deref().unwrap_or(card.display_title());
                scene.set_desklet_icon(desklet, icon, title);
            }
            icon
        });

        if let (Some(kf), Some(path)) = (key_file.as_mut(), conf_file.as_deref()) {
            let requested = applet.read_config(kf, renderers);
            if requested || conf_needs_flush(&card, kf) {
                flush_conf_file(&card, kf, path);
            }
        }

        let (draw_context, can_init) = draw_context_for(scene, &placement, icon);

        let mut instance = ModuleInstance::new(id, name, conf_file, applet);
        instance.icon = icon;
        instance.placement = placement.clone();
        instance.draw_context = draw_context;
        instance.minimal_config = Some(config);
        match self.registry.find_mut(name) {
            Some(module) => module.instances.insert(0, instance),
            None => return Err(ModuleError::NotFound(name.to_string())),
        }

        if can_init {
            self.run_hook(scene, renderers, id, |applet, ctx| applet.init(ctx));
        } else {
            warn!("Instance {} of '{}' cannot draw on its icon, not started", id, name);
        }

        match &placement {
            Placement::Dock(dock) => {
                if let Some(icon) = icon {
                    scene.insert_icon_in_dock(icon, dock, false, false);
                }
            }
            Placement::Desklet(desklet) => {
                if scene.desklet(*desklet).is_some_and(|d| d.desired_width == 0) {
                    scene.queue_redraw(&ContainerRef::Desklet(*desklet));
                }
            }
            Placement::None => {}
        }
        debug!("Instantiated '{}' as instance {} ({:?})", name, id, placement);
        Ok(id)
    }

    /// Re-apply an instance's config, moving it to another container if the
    /// config now asks for one.
    pub fn reload_instance(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        id: InstanceId,
        reload_config: bool,
    ) -> Result<(), ModuleError> {
        let (instance, card) = self.instance_and_card(id)?;
        let card = card.clone();
        let name = instance.module_name.clone();
        let old_placement = instance.placement.clone();
        let old_container = instance.container();
        let icon = instance.icon;
        let conf_file = instance.conf_file.clone();
        let mut config = instance
            .minimal_config
            .clone()
            .unwrap_or_else(|| minimal_config_from(&card, None, &scene.settings));

        let mut key_file = None;
        if reload_config {
            if let Some(path) = &conf_file {
                let kf = KeyFile::load(path).map_err(|source| ModuleError::ConfigUnreadable {
                    module: name.clone(),
                    source,
                })?;
                let mut fresh = minimal_config_from(&card, Some(&kf), &scene.settings);
                if fresh.order.is_none() {
                    fresh.order = config.order;
                }
                if let Some(icon) = icon {
                    update_icon_identity(scene, icon, &config, &fresh);
                }
                config = fresh;
                key_file = Some(kf);
            }
        }

        let new_placement = match target_of(&card, &config) {
            Target::Nowhere => Placement::None,
            Target::Dock(dock) => {
                scene.create_dock(&dock);
                Placement::Dock(dock)
            }
            Target::Desklet(attributes) => {
                match old_placement.desklet().filter(|d| scene.desklet(*d).is_some()) {
                    Some(desklet) => {
                        if reload_config {
                            scene.configure_desklet(desklet, &attributes);
                        }
                        Placement::Desklet(desklet)
                    }
                    None => Placement::Desklet(scene.create_desklet(&attributes, icon)),
                }
            }
        };
        let moved = new_placement != old_placement;
        if moved && old_placement.dock_name().is_some() {
            if let Some(icon) = icon {
                scene.detach_icon_from_dock(icon);
            }
        }

        if let Some(icon) = icon {
            match &new_placement {
                Placement::Dock(dock) => {
                    if let Some(i) = scene.icon_mut(icon) {
                        i.width = f64::from(config.icon_width);
                        i.height = f64::from(config.icon_height);
                        i.parent_dock = Some(dock.clone());
                    }
                    scene.load_icon_buffers(icon);
                    if moved {
                        scene.insert_icon_in_dock(icon, dock, true, true);
                    } else if reload_config {
                        scene.update_dock_size(dock);
                        scene.queue_redraw(&ContainerRef::Dock(dock.clone()));
                    }
                }
                Placement::Desklet(desklet) => {
                    let title = config.label.as_deref().unwrap_or(card.display_title());
                    scene.set_desklet_icon(*desklet, icon, title);
                    scene.load_icon_buffers(icon);
                }
                Placement::None => {}
            }
        }

        if let (Some(mut kf), Some(path)) = (key_file, conf_file.as_deref()) {
            let requested = match self.registry.find_instance_mut(id).and_then(|i| i.applet.as_mut()) {
                Some(applet) => {
                    applet.reset_config();
                    applet.read_config(&mut kf, renderers)
                }
                None => false,
            };
            if requested || conf_needs_flush(&card, &kf) {
                flush_conf_file(&card, &kf, path);
            }
        }

        let (draw_context, can_reload) = draw_context_for(scene, &new_placement, icon);
        if let Some(instance) = self.registry.find_instance_mut(id) {
            instance.placement = new_placement.clone();
            instance.draw_context = draw_context;
            instance.minimal_config = Some(config);
        }

        if can_reload {
            self.run_hook(scene, renderers, id, move |applet, ctx| {
                applet.reload(ctx, old_container.as_ref(), reload_config)
            });
        } else {
            warn!("Instance {} of '{}' lost its drawing context, not reloaded", id, name);
        }

        if let Placement::Dock(dock) = &new_placement {
            if scene.dock(dock).is_some_and(|d| d.ref_count > 0) {
                scene.redraw_subdock_content(dock);
            }
        }
        self.launcher_refresh_pending = true;

        if moved {
            if let Some(desklet) = old_placement.desklet() {
                scene.destroy_desklet(desklet);
            }
            if let Some(old_dock) = old_placement.dock_name() {
                settle_old_dock(scene, old_dock);
            }
            if new_placement.desklet().is_some() {
                let sub_dock = icon.and_then(|i| scene.icon(i)).and_then(|i| i.sub_dock.clone());
                if let Some(sub_dock) = sub_dock {
                    scene.destroy_dock(&sub_dock);
                }
            }
            debug!("Instance {} moved from {:?} to {:?}", id, old_placement, new_placement);
        }
        Ok(())
    }

    /// Stop an instance and free everything it holds. Returns where it lived.
    fn stop_instance(&mut self, scene: &mut Scene, renderers: &RendererRegistry, id: InstanceId) -> Option<Placement> {
        self.run_hook(scene, renderers, id, |applet, ctx| applet.stop(ctx));
        if let Some(applet) = self.registry.find_instance_mut(id).and_then(|i| i.applet.as_mut()) {
            applet.reset_data();
            applet.reset_config();
        }
        self.slots.release(id);

        let name = self.registry.module_of(id)?.to_string();
        let module = self.registry.find_mut(&name)?;
        let index = module.instances.iter().position(|i| i.id == id)?;
        let mut instance = module.instances.remove(index);

        if let Some(desklet) = instance.placement.desklet() {
            scene.destroy_desklet(desklet);
        }
        instance.draw_context = None;
        if let Some(icon) = instance.icon {
            if let Some(sub_dock) = scene.icon(icon).and_then(|i| i.sub_dock.clone()) {
                scene.destroy_dock(&sub_dock);
            }
            scene.remove_icon(icon);
        }
        debug!("Stopped instance {} of '{}'", id, name);
        Some(instance.placement)
    }

    /// Start one more instance of a running module.
    pub fn add_instance(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        name: &str,
    ) -> Result<InstanceId, ModuleError> {
        let module = self
            .registry
            .find(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;
        let was_active = module.is_active();
        if was_active && !module.visit_card.flags.contains(ModuleFlags::MULTI_INSTANCE) {
            return Err(ModuleError::AlreadyActive(name.to_string()));
        }

        let conf_file = self.add_conf_file(scene, name)?;
        if !was_active {
            if let Some(module) = self.registry.find_mut(name) {
                module.conf_file = conf_file.clone();
            }
        }
        let id = self.instantiate(scene, renderers, name, conf_file)?;
        if let Some(dock) = self.instance(id).and_then(|i| i.placement.dock_name().map(str::to_string)) {
            scene.update_dock_size(&dock);
        }
        self.launcher_refresh_pending = true;
        info!("Added instance {} of '{}'", id, name);
        Ok(id)
    }

    /// Stop an instance and delete its config file.
    ///
    /// The highest-numbered config file then moves into the freed number so
    /// file numbers stay contiguous. Removing the only instance deactivates
    /// the module and keeps its file.
    pub fn remove_instance(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        id: InstanceId,
    ) -> Result<(), ModuleError> {
        let name = self
            .registry
            .module_of(id)
            .ok_or(ModuleError::UnknownInstance(id))?
            .to_string();
        let module = self
            .registry
            .find(&name)
            .ok_or_else(|| ModuleError::NotFound(name.clone()))?;
        if module.instances.len() == 1 {
            return self.deactivate_module_and_unload(scene, renderers, &name);
        }

        let base = module.conf_file.clone();
        let conf_file = module
            .instances
            .iter()
            .find(|i| i.id == id)
            .and_then(|i| i.conf_file.clone());
        if let Some(path) = &conf_file {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Cannot delete {}: {}", path.display(), e);
            }
        }

        if let Some(Placement::Dock(dock)) = self.stop_instance(scene, renderers, id) {
            scene.update_dock_size(&dock);
        }
        if let (Some(base), Some(freed)) = (base, conf_file) {
            self.fill_freed_conf_file(&name, &base, &freed)?;
        }
        self.launcher_refresh_pending = true;
        info!("Removed instance {} of '{}'", id, name);
        Ok(())
    }

    fn fill_freed_conf_file(&mut self, name: &str, base: &Path, freed_path: &Path) -> Result<(), ModuleError> {
        let Some(freed) = conf_file_number(base, freed_path) else {
            return Ok(());
        };
        let Some(module) = self.registry.find_mut(name) else {
            return Ok(());
        };
        let highest = module
            .instances
            .iter_mut()
            .filter_map(|i| i.file_number(base).map(|n| (n, i)))
            .max_by_key(|(n, _)| *n);
        let Some((number, instance)) = highest else {
            return Ok(());
        };
        if number <= freed {
            return Ok(());
        }

        let from = numbered_conf_file(base, number);
        std::fs::rename(&from, freed_path).map_err(|e| ModuleError::io(&from, e))?;
        debug!("Moved {} to {}", from.display(), freed_path.display());
        instance.conf_file = Some(freed_path.to_path_buf());
        Ok(())
    }

    /// Move an instance from its dock to a desklet or back.
    ///
    /// Returns false when the module cannot live in both.
    pub fn detach_instance(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        id: InstanceId,
    ) -> Result<bool, ModuleError> {
        let (instance, card) = self.instance_and_card(id)?;
        if !(card.can_desklet() && card.can_dock()) {
            return Ok(false);
        }
        let Some(path) = instance.conf_file.clone() else {
            return Ok(false);
        };
        let name = instance.module_name.clone();
        let detached = instance.placement.desklet().is_some();

        KeyFile::update_file(&path, |kf| {
            kf.set_bool(DESKLET_GROUP, "initially detached", !detached);
            kf.set_int(DESKLET_GROUP, "accessibility", 0);
        })
        .map_err(|source| ModuleError::ConfigUnreadable { module: name, source })?;

        self.reload_instance(scene, renderers, id, true)?;
        if let Some(desklet) = self.instance(id).and_then(|i| i.placement.desklet()) {
            scene.zoom_out_desklet(desklet);
        }
        Ok(true)
    }

    /// Detach an instance into a desklet centred on a screen point.
    pub fn detach_instance_at_position(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        id: InstanceId,
        center_x: i32,
        center_y: i32,
    ) -> Result<bool, ModuleError> {
        let (instance, card) = self.instance_and_card(id)?;
        if !card.can_desklet() {
            return Ok(false);
        }
        let Some(path) = instance.conf_file.clone() else {
            return Ok(false);
        };
        let name = instance.module_name.clone();

        KeyFile::update_file(&path, |kf| {
            let (mut width, mut height) = kf.get_size(DESKLET_GROUP, "");
            if width <= 0 {
                width = DEFAULT_DETACH_SIZE as i32;
            }
            if height <= 0 {
                height = DEFAULT_DETACH_SIZE as i32;
            }
            kf.set_int(DESKLET_GROUP, "x position", i64::from(center_x - width / 2));
            kf.set_int(DESKLET_GROUP, "y position", i64::from(center_y - height / 2));
            kf.set_bool(DESKLET_GROUP, "initially detached", true);
            kf.set_bool(DESKLET_GROUP, "locked", false);
            kf.set_bool(DESKLET_GROUP, "no input", false);
            kf.set_int(DESKLET_GROUP, "accessibility", 0);
        })
        .map_err(|source| ModuleError::ConfigUnreadable { module: name, source })?;

        self.reload_instance(scene, renderers, id, true)?;
        if let Some(desklet) = self.instance(id).and_then(|i| i.placement.desklet()) {
            scene.zoom_out_desklet(desklet);
        }
        Ok(true)
    }

    // ===== Modules =====

    /// Start every configured instance of a module.
    ///
    /// The base config file is instantiated, then `-1`, `-2`, ... while they
    /// exist. A configless module gets a single instance.
    pub fn activate(&mut self, scene: &mut Scene, renderers: &RendererRegistry, name: &str) -> Result<(), ModuleError> {
        let module = self
            .registry
            .find(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;
        if module.is_active() {
            return Err(ModuleError::AlreadyActive(name.to_string()));
        }
        let conf_file = self.ensure_conf_file(&module.visit_card);
        if let Some(module) = self.registry.find_mut(name) {
            module.conf_file = conf_file.clone();
        }

        match conf_file {
            Some(base) => {
                for number in 0.. {
                    let path = numbered_conf_file(&base, number);
                    if !path.exists() {
                        break;
                    }
                    if let Err(e) = self.instantiate(scene, renderers, name, Some(path)) {
                        warn!("Instance {} of '{}' not created: {}", number, name, e);
                    }
                }
            }
            None => {
                if let Err(e) = self.instantiate(scene, renderers, name, None) {
                    warn!("Module '{}' not instantiated: {}", name, e);
                }
            }
        }

        let count = self.registry.find(name).map_or(0, |m| m.instances.len());
        if count == 0 {
            return Err(ModuleError::NoInstanceCreated(name.to_string()));
        }
        info!("Activated module '{}' ({} instance(s))", name, count);
        Ok(())
    }

    /// Stop every instance of a module, in list order.
    pub fn deactivate(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        name: &str,
    ) -> Result<(), ModuleError> {
        let ids = match self.registry.find(name) {
            None => return Err(ModuleError::NotFound(name.to_string())),
            Some(module) if !module.is_active() => return Err(ModuleError::NotActive(name.to_string())),
            Some(_) => self.instance_ids(name),
        };

        let mut docks: Vec<String> = Vec::new();
        for id in ids {
            if let Some(Placement::Dock(dock)) = self.stop_instance(scene, renderers, id) {
                if !docks.contains(&dock) {
                    docks.push(dock);
                }
            }
        }
        for dock in &docks {
            scene.update_dock_size(dock);
        }
        self.launcher_refresh_pending = true;
        info!("Deactivated module '{}'", name);
        Ok(())
    }

    /// Reload every instance of a module.
    pub fn reload_module(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        name: &str,
        reload_config: bool,
    ) -> Result<(), ModuleError> {
        if !self.registry.contains(name) {
            return Err(ModuleError::NotFound(name.to_string()));
        }
        for id in self.instance_ids(name) {
            if let Err(e) = self.reload_instance(scene, renderers, id, reload_config) {
                warn!("Failed to reload instance {} of '{}': {}", id, name, e);
            }
        }
        Ok(())
    }

    /// Reload every running instance, e.g. after a global setting changed.
    pub fn reload_all(&mut self, scene: &mut Scene, renderers: &RendererRegistry, reload_config: bool) {
        for id in self.all_instance_ids() {
            if let Err(e) = self.reload_instance(scene, renderers, id, reload_config) {
                warn!("Failed to reload instance {}: {}", id, e);
            }
        }
    }

    /// Start auto-loaded modules (on the first call only) and the listed
    /// ones. Running modules in the list are reloaded instead.
    ///
    /// Returns the loading generation every touched module is stamped with.
    pub fn activate_modules_from_list(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        names: &[String],
    ) -> u64 {
        self.generation += 1;
        let generation = self.generation;

        for name in self.registry.auto_loaded().to_vec() {
            let active = self.registry.find(&name).is_some_and(|m| m.is_active());
            if !active && !self.auto_loaded_started {
                if let Err(e) = self.activate(scene, renderers, &name) {
                    warn!("Auto-loaded module '{}' not started: {}", name, e);
                }
            }
            if let Some(module) = self.registry.find_mut(&name) {
                module.generation = generation;
            }
        }
        self.auto_loaded_started = true;

        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            let Some(module) = self.registry.find(name) else {
                warn!("No module named '{}', was it uninstalled?", name);
                continue;
            };
            let result = if module.is_active() {
                self.reload_module(scene, renderers, name, false)
            } else {
                self.activate(scene, renderers, name)
            };
            if let Err(e) = result {
                warn!("Module '{}' not loaded: {}", name, e);
            }
            if let Some(module) = self.registry.find_mut(name) {
                module.generation = generation;
            }
        }
        debug!("Loading pass {} done", generation);
        generation
    }

    /// Stop modules no loading pass touched since `generation`.
    pub fn deactivate_old_modules(&mut self, scene: &mut Scene, renderers: &RendererRegistry, generation: u64) {
        let stale: Vec<String> = self
            .registry
            .modules()
            .filter(|m| m.is_active() && m.generation < generation && !m.visit_card.is_auto_loaded())
            .map(|m| m.name().to_string())
            .collect();
        for name in stale {
            if let Err(e) = self.deactivate(scene, renderers, &name) {
                warn!("Failed to deactivate '{}': {}", name, e);
            }
        }
    }

    /// Start a module on user request and persist the module list.
    pub fn activate_module_and_load(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        name: &str,
    ) -> Result<(), ModuleError> {
        let module = self
            .registry
            .find_mut(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;
        module.generation = 0;
        if module.is_active() {
            self.reload_module(scene, renderers, name, false)?;
        } else {
            self.activate(scene, renderers, name)?;
        }

        let docks: Vec<String> = self
            .registry
            .find(name)
            .map(|m| {
                m.instances
                    .iter()
                    .filter_map(|i| i.placement.dock_name().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        for dock in docks {
            scene.update_dock_size(&dock);
        }
        self.write_active_modules();
        Ok(())
    }

    /// Stop a module on user request and persist the module list.
    pub fn deactivate_module_and_unload(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        name: &str,
    ) -> Result<(), ModuleError> {
        self.deactivate(scene, renderers, name)?;
        self.write_active_modules();
        Ok(())
    }

    pub fn deactivate_all(&mut self, scene: &mut Scene, renderers: &RendererRegistry) {
        let active: Vec<String> = self
            .registry
            .modules()
            .filter(|m| m.is_active())
            .map(|m| m.name().to_string())
            .collect();
        for name in active {
            if let Err(e) = self.deactivate(scene, renderers, &name) {
                warn!("Failed to deactivate '{}': {}", name, e);
            }
        }
        self.modules_write_pending = false;
    }

    /// Stop everything and drop every module, closing their libraries.
    pub fn shutdown(&mut self, scene: &mut Scene, renderers: &RendererRegistry) {
        self.deactivate_all(scene, renderers);
        for name in self.registry.names() {
            self.registry.unregister(&name);
        }
        info!("Module manager shut down");
    }

    // ===== Persisted module list =====

    /// `;`-joined names of the active modules a user chose.
    pub fn list_active_modules(&self) -> String {
        let mut names: Vec<&str> = self
            .registry
            .modules()
            .filter(|m| m.is_active() && !m.visit_card.is_auto_loaded())
            .map(|m| m.name())
            .collect();
        names.sort_unstable();
        names.join(";")
    }

    /// Schedule a write of the module list; see [`Self::flush_active_modules`].
    pub fn write_active_modules(&mut self) {
        self.modules_write_pending = true;
    }

    pub fn is_modules_write_pending(&self) -> bool {
        self.modules_write_pending
    }

    /// Write a scheduled module list into `System.modules` of the main
    /// config file. Returns whether anything was written.
    pub fn flush_active_modules(&mut self, main_conf: &Path) -> Result<bool, KeyFileError> {
        if !self.modules_write_pending {
            return Ok(false);
        }
        self.modules_write_pending = false;
        let mut key_file = if main_conf.exists() {
            KeyFile::load(main_conf)?
        } else {
            KeyFile::new()
        };
        let modules = self.list_active_modules();
        key_file.set_string(SYSTEM_GROUP, MODULES_KEY, &modules);
        key_file.save(main_conf)?;
        debug!("Active modules written: {}", modules);
        Ok(true)
    }

    /// Whether an open config browser should rebuild; clears the flag.
    pub fn take_launcher_refresh(&mut self) -> bool {
        std::mem::take(&mut self.launcher_refresh_pending)
    }

    // ===== Hooks =====

    /// Text of the about dialog of an instance.
    pub fn describe_instance(&self, id: InstanceId) -> Option<String> {
        let (_, card) = self.instance_and_card(id).ok()?;
        Some(format!(
            "{} (v{}) by {}\n{}",
            card.display_title(),
            card.module_version,
            card.author,
            card.description
        ))
    }

    /// Shared data of the instance holding a data slot.
    pub fn shared_data(&self, slot: usize) -> Option<&dyn Any> {
        let owner = self.slots.instance_at(slot)?;
        self.registry.find_instance(owner)?.applet()?.shared_data()
    }

    /// Run the `poll` hook of every instance.
    pub fn poll_applets(&mut self, scene: &mut Scene, renderers: &RendererRegistry) {
        for id in self.all_instance_ids() {
            self.run_hook(scene, renderers, id, |applet, ctx| applet.poll(ctx));
        }
    }

    pub fn load_custom_widget(&mut self, id: InstanceId, key_file: &KeyFile) -> bool {
        match self.registry.find_instance_mut(id).and_then(|i| i.applet.as_mut()) {
            Some(applet) => {
                applet.load_custom_widget(key_file);
                true
            }
            None => false,
        }
    }

    pub fn save_custom_widget(&mut self, id: InstanceId, key_file: &mut KeyFile) -> bool {
        match self.registry.find_instance_mut(id).and_then(|i| i.applet.as_mut()) {
            Some(applet) => {
                applet.save_custom_widget(key_file);
                true
            }
            None => false,
        }
    }

    /// Lend an instance's applet a context and run one hook on it.
    fn run_hook<F>(&mut self, scene: &mut Scene, renderers: &RendererRegistry, id: InstanceId, hook: F) -> bool
    where
        F: FnOnce(&mut dyn Applet, &mut AppletContext),
    {
        let Some(instance) = self.registry.find_instance_mut(id) else {
            warn!("No instance {} to run a hook on", id);
            return false;
        };
        let Some(mut applet) = instance.applet.take() else {
            warn!("Instance {} is already running a hook", id);
            return false;
        };
        let module_name = instance.module_name.clone();
        let conf_file = instance.conf_file.clone();
        let icon = instance.icon;
        let container = instance.container();
        let draw_context = instance.draw_context.clone();

        let mut ctx = AppletContext {
            instance: id,
            module_name,
            conf_file,
            icon,
            container,
            draw_context,
            scene,
            renderers,
            slots: &mut self.slots,
            modules: &self.registry,
        };
        hook(applet.as_mut(), &mut ctx);

        if let Some(instance) = self.registry.find_instance_mut(id) {
            instance.applet = Some(applet);
        }
        true
    }
}

/// Host-side config of an instance, with sizes and label defaulted.
fn minimal_config_from(card: &VisitCard, key_file: Option<&KeyFile>, settings: &SceneSettings) -> MinimalAppletConfig {
    let mut config = match key_file {
        Some(kf) => MinimalAppletConfig::from_key_file(kf, card.can_dock(), card.can_desklet()),
        None => MinimalAppletConfig {
            detached: card.can_desklet() && !card.can_dock(),
            desklet: card.can_desklet().then(DeskletAttributes::default),
            ..Default::default()
        },
    };
    let (width, height) = settings.default_icon_size(card.category);
    if config.icon_width <= 0 {
        config.icon_width = width;
    }
    if config.icon_height <= 0 {
        config.icon_height = height;
    }
    if config.label.is_none() {
        config.label = Some(card.display_title().to_string());
    }
    if let (Some(desklet), Some((w, h))) = (config.desklet.as_mut(), card.static_desklet_size) {
        desklet.width = w;
        desklet.height = h;
    }
    config
}

fn target_of(card: &VisitCard, config: &MinimalAppletConfig) -> Target {
    if card.capabilities.is_plugin() {
        return Target::Nowhere;
    }
    if card.can_desklet() && (config.detached || !card.can_dock()) {
        return Target::Desklet(config.desklet.clone().unwrap_or_default());
    }
    Target::Dock(
        config
            .dock_name
            .clone()
            .unwrap_or_else(|| DEFAULT_DOCK_NAME.to_string()),
    )
}

/// Next integer after the highest icon order of a dock.
fn next_order(scene: &Scene, dock: Option<&str>) -> f64 {
    let highest = dock
        .and_then(|name| scene.dock(name))
        .into_iter()
        .flat_map(|d| d.icons.iter())
        .filter_map(|id| scene.icon(*id))
        .map(|icon| icon.order)
        .fold(None, |max: Option<f64>, order| Some(max.map_or(order, |m| m.max(order))));
    highest.map_or(0.0, |max| max.floor() + 1.0)
}

/// Only dock icons get a drawing context; without a buffer the instance
/// cannot draw.
fn draw_context_for(scene: &Scene, placement: &Placement, icon: Option<IconId>) -> (Option<cairo::Context>, bool) {
    let (Placement::Dock(_), Some(icon)) = (placement, icon) else {
        return (None, true);
    };
    let Some(buffer) = scene.icon(icon).and_then(|i| i.buffer.as_ref()) else {
        return (None, false);
    };
    match cairo::Context::new(buffer) {
        Ok(cr) => (Some(cr), true),
        Err(e) => {
            warn!("No drawing context for {}: {}", icon, e);
            (None, false)
        }
    }
}

fn update_icon_identity(scene: &mut Scene, icon: IconId, old: &MinimalAppletConfig, new: &MinimalAppletConfig) {
    let sub_dock = scene.icon(icon).and_then(|i| i.sub_dock.clone());
    if let (Some(sub_dock), Some(label)) = (sub_dock, new.label.as_deref()) {
        if old.label.as_deref() != Some(label) {
            let renamed = scene.unique_dock_name(label);
            scene.rename_dock(&sub_dock, &renamed);
        }
    }
    if let Some(icon) = scene.icon_mut(icon) {
        icon.name = new.label.clone();
        icon.file_name = new.icon_image.clone();
        icon.always_visible = new.always_visible;
        if let Some(order) = new.order {
            icon.order = order;
        }
    }
}

/// Tear down a dock an icon left if nothing keeps it, else resize it.
fn settle_old_dock(scene: &mut Scene, name: &str) {
    let Some(dock) = scene.dock(name) else {
        return;
    };
    if dock.is_empty() && !dock.is_main && dock.ref_count == 0 {
        scene.destroy_dock(name);
    } else {
        scene.update_dock_size(name);
    }
}

/// X position of a new desklet next to one at `x`, mirrored towards the
/// screen centre. Negative results are relative to the right edge.
fn offset_desklet_x(x: i32, width: i32, screen_width: i32) -> i32 {
    let shifted = if x + width / 2 <= screen_width / 2 {
        x + width
    } else {
        x - width
    };
    if shifted + width / 2 <= screen_width / 2 {
        shifted
    } else {
        shifted - screen_width
    }
}

fn template_path(card: &VisitCard) -> Option<PathBuf> {
    let share = card.share_data_dir.as_deref()?;
    let name = card.conf_file_name.as_deref()?;
    Some(Path::new(share).join(name))
}

fn conf_needs_flush(card: &VisitCard, key_file: &KeyFile) -> bool {
    key_file.is_older_than(&card.module_version)
        || (key_file.has_group(DESKLET_GROUP) && !key_file.has_key(DESKLET_GROUP, "accessibility"))
}

/// Rewrite a config file over the module's default one, keeping the user's
/// values and stamping the module version.
fn flush_conf_file(card: &VisitCard, key_file: &KeyFile, path: &Path) {
    let template = match template_path(card) {
        Some(template) => KeyFile::load(&template).unwrap_or_else(|e| {
            debug!("No template for '{}': {}", card.name, e);
            KeyFile::new()
        }),
        None => KeyFile::new(),
    };
    let mut merged = key_file.merged_over(&template);
    if merged.has_group(DESKLET_GROUP) && !merged.has_key(DESKLET_GROUP, "accessibility") {
        merged.set_int(DESKLET_GROUP, "accessibility", 0);
    }
    merged.version = Some(card.module_version.clone());
    match merged.save(path) {
        Ok(()) => debug!("Flushed {} (v{})", path.display(), card.module_version),
        Err(e) => warn!("Cannot rewrite {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{AppletFactory, BoxedApplet, PreInitFn};
    use crate::scene::ScreenGeometry;
    use rg_dock_types::ContainerCapabilities;
    use std::cell::RefCell;

    thread_local! {
        static CALLS: RefCell<Vec<String>> = RefCell::new(Vec::new());
    }

    fn record(call: String) {
        CALLS.with(|calls| calls.borrow_mut().push(call));
    }

    fn take_calls() -> Vec<String> {
        CALLS.with(|calls| std::mem::take(&mut *calls.borrow_mut()))
    }

    struct Recorder;

    impl Applet for Recorder {
        fn read_config(&mut self, key_file: &mut KeyFile, _renderers: &RendererRegistry) -> bool {
            record("read_config".into());
            let missing = !key_file.has_key("Configuration", "greeting");
            if missing {
                key_file.set_string("Configuration", "greeting", "hello");
            }
            missing
        }

        fn init(&mut self, ctx: &mut AppletContext) {
            record(format!("init {}", ctx.instance));
        }

        fn stop(&mut self, ctx: &mut AppletContext) {
            record(format!("stop {}", ctx.instance));
        }

        fn reload(&mut self, ctx: &mut AppletContext, _old: Option<&ContainerRef>, config_changed: bool) {
            record(format!("reload {} {}", ctx.instance, config_changed));
        }

        fn reset_config(&mut self) {
            record("reset_config".into());
        }

        fn reset_data(&mut self) {
            record("reset_data".into());
        }
    }

    fn recorder() -> BoxedApplet {
        Box::new(Recorder)
    }

    struct Sharer {
        now: String,
    }

    impl Applet for Sharer {
        fn init(&mut self, ctx: &mut AppletContext) {
            ctx.reserve_data_slot().unwrap();
        }

        fn shared_data(&self) -> Option<&dyn Any> {
            Some(&self.now)
        }
    }

    fn sharer() -> BoxedApplet {
        Box::new(Sharer { now: "12:00".into() })
    }

    fn clock(card: &mut VisitCard) -> Option<AppletFactory> {
        card.name = "clock".into();
        card.title = Some("Clock".into());
        card.module_version = "1.2.0".into();
        card.capabilities = ContainerCapabilities::CAN_DOCK | ContainerCapabilities::CAN_DESKLET;
        card.flags = ModuleFlags::MULTI_INSTANCE;
        card.conf_file_name = Some("clock.conf".into());
        card.description = "Shows the time".into();
        card.author = "rg".into();
        Some(recorder)
    }

    fn weather(card: &mut VisitCard) -> Option<AppletFactory> {
        card.name = "weather".into();
        card.capabilities = ContainerCapabilities::CAN_DOCK;
        card.conf_file_name = Some("weather.conf".into());
        Some(recorder)
    }

    fn keeper(card: &mut VisitCard) -> Option<AppletFactory> {
        card.name = "keeper".into();
        card.flags = ModuleFlags::AUTO_LOAD;
        Some(sharer)
    }

    struct Fixture {
        dir: tempfile::TempDir,
        scene: Scene,
        renderers: RendererRegistry,
        manager: ModuleManager,
    }

    impl Fixture {
        fn conf(&self, name: &str) -> PathBuf {
            self.dir.path().join("theme/plug-ins").join(name)
        }
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let share = dir.path().join("share");
        std::fs::create_dir_all(&share).unwrap();

        let mut template = KeyFile::new();
        template.set_int(ICON_GROUP, "icon width", 40);
        template.set_int(ICON_GROUP, "icon height", 40);
        template.set_bool(DESKLET_GROUP, "initially detached", false);
        template.set_int(DESKLET_GROUP, "accessibility", 0);
        template.set_string("Configuration", "format", "24h");
        template.save(&share.join("clock.conf")).unwrap();
        template.save(&share.join("weather.conf")).unwrap();

        let mut registry = ModuleRegistry::default();
        for pre_init in [clock as PreInitFn, weather, keeper] {
            let name = registry.register_builtin(pre_init).unwrap();
            registry.find_mut(&name).unwrap().visit_card.share_data_dir = Some(share.display().to_string());
        }
        let manager = ModuleManager::new(registry, dir.path().join("theme"));
        Fixture {
            dir,
            scene: Scene::new(ScreenGeometry::new(1920, 1080)),
            renderers: RendererRegistry::new(),
            manager,
        }
    }

    #[test]
    fn test_activate_creates_default_dock_and_stamps_conf() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "clock").unwrap();

        let ids = f.manager.instance_ids("clock");
        assert_eq!(ids.len(), 1);
        let instance = f.manager.instance(ids[0]).unwrap();
        assert_eq!(instance.placement, Placement::Dock("Default".into()));
        assert!(instance.draw_context.is_some());

        let icon = instance.icon.unwrap();
        let dock = f.scene.dock("Default").unwrap();
        assert!(dock.is_main);
        assert_eq!(dock.icons, vec![icon]);
        assert_eq!(f.scene.icon(icon).unwrap().width, 40.0);
        assert_eq!(f.scene.icon(icon).unwrap().name.as_deref(), Some("Clock"));

        assert_eq!(take_calls(), vec!["read_config".to_string(), format!("init {}", ids[0])]);

        let conf = KeyFile::load(&f.conf("clock/clock.conf")).unwrap();
        assert_eq!(conf.version.as_deref(), Some("1.2.0"));
        assert_eq!(conf.get_string("Configuration", "greeting").as_deref(), Some("hello"));
        assert_eq!(conf.get_string("Configuration", "format").as_deref(), Some("24h"));
        assert_eq!(conf.get_double_opt(ICON_GROUP, "order"), Some(0.0));
    }

    #[test]
    fn test_desklet_group_without_accessibility_is_flushed() {
        let mut f = fixture();
        let version = f.manager.registry().find("weather").unwrap().visit_card.module_version.clone();
        let path = f.conf("weather/weather.conf");
        let mut user = KeyFile::new();
        user.version = Some(version.clone());
        user.set_bool(DESKLET_GROUP, "initially detached", false);
        user.set_int(DESKLET_GROUP, "x position", 120);
        user.set_string("Configuration", "format", "12h");
        user.set_string("Configuration", "greeting", "hi");
        user.save(&path).unwrap();

        let card = &f.manager.registry().find("weather").unwrap().visit_card;
        assert!(!user.is_older_than(&card.module_version));
        assert!(conf_needs_flush(card, &user));
        user.set_int(DESKLET_GROUP, "accessibility", 2);
        assert!(!conf_needs_flush(card, &user));

        f.manager.activate(&mut f.scene, &f.renderers, "weather").unwrap();

        let conf = KeyFile::load(&path).unwrap();
        assert_eq!(conf.version.as_deref(), Some(version.as_str()));
        assert_eq!(conf.get_int_opt(DESKLET_GROUP, "accessibility"), Some(0));
        assert_eq!(conf.get_int_opt(DESKLET_GROUP, "x position"), Some(120));
        assert_eq!(conf.get_string("Configuration", "format").as_deref(), Some("12h"));
        assert_eq!(conf.get_string("Configuration", "greeting").as_deref(), Some("hi"));
        assert_eq!(conf.get_int_opt(ICON_GROUP, "icon width"), Some(40));
    }

    #[test]
    fn test_activate_twice_and_configless_plugin() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "clock").unwrap();
        assert!(matches!(
            f.manager.activate(&mut f.scene, &f.renderers, "clock"),
            Err(ModuleError::AlreadyActive(_))
        ));
        assert!(matches!(
            f.manager.activate(&mut f.scene, &f.renderers, "ghost"),
            Err(ModuleError::NotFound(_))
        ));

        f.manager.activate(&mut f.scene, &f.renderers, "keeper").unwrap();
        let ids = f.manager.instance_ids("keeper");
        assert_eq!(ids.len(), 1);
        let instance = f.manager.instance(ids[0]).unwrap();
        assert_eq!(instance.placement, Placement::None);
        assert!(instance.icon.is_none());
        assert!(instance.conf_file.is_none());
    }

    #[test]
    fn test_deactivate_stops_every_instance_in_order() {
        let mut f = fixture();
        let dir = f.conf("clock");
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["clock.conf-1", "clock.conf-2"] {
            std::fs::copy(f.dir.path().join("share/clock.conf"), dir.join(name)).unwrap();
        }
        f.manager.activate(&mut f.scene, &f.renderers, "clock").unwrap();
        let ids = f.manager.instance_ids("clock");
        assert_eq!(ids.len(), 3);
        assert_eq!(f.scene.dock("Default").unwrap().icons.len(), 3);
        take_calls();

        f.manager.deactivate(&mut f.scene, &f.renderers, "clock").unwrap();
        let expected: Vec<String> = ids
            .iter()
            .flat_map(|id| [format!("stop {}", id), "reset_data".into(), "reset_config".into()])
            .collect();
        assert_eq!(take_calls(), expected);
        assert!(!f.manager.registry().find("clock").unwrap().is_active());
        assert!(f.scene.dock("Default").unwrap().icons.is_empty());
        assert_eq!(f.scene.icons().count(), 0);
        assert!(matches!(
            f.manager.deactivate(&mut f.scene, &f.renderers, "clock"),
            Err(ModuleError::NotActive(_))
        ));
    }

    #[test]
    fn test_add_then_remove_keeps_numbering() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "clock").unwrap();
        let base = f.conf("clock/clock.conf");
        let first = f.manager.add_instance(&mut f.scene, &f.renderers, "clock").unwrap();
        let second = f.manager.add_instance(&mut f.scene, &f.renderers, "clock").unwrap();
        assert!(numbered_conf_file(&base, 1).exists());
        assert!(numbered_conf_file(&base, 2).exists());

        f.manager.remove_instance(&mut f.scene, &f.renderers, second).unwrap();
        assert!(numbered_conf_file(&base, 1).exists());
        assert!(!numbered_conf_file(&base, 2).exists());

        let third = f.manager.add_instance(&mut f.scene, &f.renderers, "clock").unwrap();
        assert_eq!(
            f.manager.instance(third).unwrap().conf_file,
            Some(numbered_conf_file(&base, 2))
        );

        // Removing a lower number moves the highest file down.
        f.manager.remove_instance(&mut f.scene, &f.renderers, first).unwrap();
        assert!(numbered_conf_file(&base, 1).exists());
        assert!(!numbered_conf_file(&base, 2).exists());
        assert_eq!(
            f.manager.instance(third).unwrap().conf_file,
            Some(numbered_conf_file(&base, 1))
        );
        assert_eq!(f.manager.instance_ids("clock").len(), 2);
        assert_eq!(f.scene.dock("Default").unwrap().icons.len(), 2);
    }

    #[test]
    fn test_single_instance_modules_refuse_more() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "weather").unwrap();
        assert!(matches!(
            f.manager.add_instance(&mut f.scene, &f.renderers, "weather"),
            Err(ModuleError::AlreadyActive(_))
        ));
    }

    #[test]
    fn test_remove_last_instance_deactivates() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "clock").unwrap();
        let id = f.manager.instance_ids("clock")[0];
        f.manager.remove_instance(&mut f.scene, &f.renderers, id).unwrap();
        assert!(!f.manager.registry().find("clock").unwrap().is_active());
        assert!(f.conf("clock/clock.conf").exists());
        assert!(f.manager.is_modules_write_pending());
        assert!(matches!(
            f.manager.remove_instance(&mut f.scene, &f.renderers, id),
            Err(ModuleError::UnknownInstance(_))
        ));
    }

    #[test]
    fn test_detach_toggles_between_dock_and_desklet() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "clock").unwrap();
        let id = f.manager.instance_ids("clock")[0];
        let icon = f.manager.instance(id).unwrap().icon.unwrap();
        take_calls();

        assert!(f.manager.detach_instance(&mut f.scene, &f.renderers, id).unwrap());
        let desklet = f.manager.instance(id).unwrap().placement.desklet().unwrap();
        let window = f.scene.desklet(desklet).unwrap();
        assert!(window.zoomed_out);
        assert_eq!(window.icon, Some(icon));
        assert!(f.scene.dock("Default").unwrap().icons.is_empty());
        assert_eq!(f.scene.icon(icon).unwrap().extent(), (96, 96));
        assert!(f.manager.instance(id).unwrap().draw_context.is_none());
        assert_eq!(
            take_calls(),
            vec!["reset_config".to_string(), "read_config".into(), format!("reload {} true", id)]
        );
        let conf = KeyFile::load(&f.conf("clock/clock.conf")).unwrap();
        assert!(conf.get_bool(DESKLET_GROUP, "initially detached", false));

        assert!(f.manager.detach_instance(&mut f.scene, &f.renderers, id).unwrap());
        assert_eq!(f.manager.instance(id).unwrap().placement, Placement::Dock("Default".into()));
        assert!(f.scene.desklet(desklet).is_none());
        assert_eq!(f.scene.dock("Default").unwrap().icons, vec![icon]);
    }

    #[test]
    fn test_detach_at_position_centres_desklet() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "clock").unwrap();
        let id = f.manager.instance_ids("clock")[0];
        assert!(f
            .manager
            .detach_instance_at_position(&mut f.scene, &f.renderers, id, 500, 300)
            .unwrap());
        let desklet = f.manager.instance(id).unwrap().placement.desklet().unwrap();
        let window = f.scene.desklet(desklet).unwrap();
        assert_eq!((window.x, window.y), (454, 254));

        // Weather cannot live in a desklet.
        f.manager.activate(&mut f.scene, &f.renderers, "weather").unwrap();
        let weather = f.manager.instance_ids("weather")[0];
        assert!(!f.manager.detach_instance(&mut f.scene, &f.renderers, weather).unwrap());
    }

    #[test]
    fn test_new_desklet_instance_is_offset() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "clock").unwrap();
        let id = f.manager.instance_ids("clock")[0];
        f.manager
            .detach_instance_at_position(&mut f.scene, &f.renderers, id, 500, 300)
            .unwrap();

        let path = f.manager.add_conf_file(&f.scene, "clock").unwrap().unwrap();
        assert_eq!(path, numbered_conf_file(&f.conf("clock/clock.conf"), 1));
        let conf = KeyFile::load(&path).unwrap();
        assert_eq!(conf.get_int(DESKLET_GROUP, "x position", 0), 550);
        assert!(!conf.get_bool(DESKLET_GROUP, "locked", true));

        assert_eq!(offset_desklet_x(1500, 96, 1920), -516);
    }

    #[test]
    fn test_reload_moves_icon_between_docks() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "clock").unwrap();
        let id = f.manager.instance_ids("clock")[0];
        let icon = f.manager.instance(id).unwrap().icon.unwrap();
        let path = f.conf("clock/clock.conf");

        KeyFile::update_file(&path, |kf| kf.set_string(ICON_GROUP, "dock name", "Tools")).unwrap();
        f.manager.reload_instance(&mut f.scene, &f.renderers, id, true).unwrap();
        assert_eq!(f.scene.dock("Tools").unwrap().icons, vec![icon]);
        assert!(f.scene.dock("Default").unwrap().icons.is_empty());
        assert!(f.manager.take_launcher_refresh());

        KeyFile::update_file(&path, |kf| {
            kf.remove_key(ICON_GROUP, "dock name");
        })
        .unwrap();
        f.manager.reload_instance(&mut f.scene, &f.renderers, id, true).unwrap();
        assert!(f.scene.dock("Tools").is_none());
        assert_eq!(f.scene.dock("Default").unwrap().icons, vec![icon]);
    }

    #[test]
    fn test_unreadable_config_creates_no_instance() {
        let mut f = fixture();
        let dir = f.conf("clock");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("clock.conf"), "not a config").unwrap();
        assert!(matches!(
            f.manager.activate(&mut f.scene, &f.renderers, "clock"),
            Err(ModuleError::NoInstanceCreated(_))
        ));
        assert!(!f.manager.registry().find("clock").unwrap().is_active());
    }

    #[test]
    fn test_loading_generations() {
        let mut f = fixture();
        let names: Vec<String> = vec!["clock".into(), "weather".into(), "ghost".into()];
        let first = f.manager.activate_modules_from_list(&mut f.scene, &f.renderers, &names);
        for name in ["clock", "weather", "keeper"] {
            assert!(f.manager.registry().find(name).unwrap().is_active(), "{name}");
        }

        let second = f
            .manager
            .activate_modules_from_list(&mut f.scene, &f.renderers, &["clock".to_string()]);
        assert!(second > first);
        f.manager.deactivate_old_modules(&mut f.scene, &f.renderers, second);
        assert!(f.manager.registry().find("clock").unwrap().is_active());
        assert!(f.manager.registry().find("keeper").unwrap().is_active());
        assert!(!f.manager.registry().find("weather").unwrap().is_active());
    }

    #[test]
    fn test_list_and_flush_active_modules() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "keeper").unwrap();
        f.manager
            .activate_module_and_load(&mut f.scene, &f.renderers, "weather")
            .unwrap();
        f.manager
            .activate_module_and_load(&mut f.scene, &f.renderers, "clock")
            .unwrap();
        assert_eq!(f.manager.list_active_modules(), "clock;weather");

        let main_conf = f.dir.path().join("main.conf");
        assert!(f.manager.flush_active_modules(&main_conf).unwrap());
        let written = KeyFile::load(&main_conf).unwrap();
        assert_eq!(
            written.get_string(SYSTEM_GROUP, MODULES_KEY).as_deref(),
            Some("clock;weather")
        );
        assert!(!f.manager.flush_active_modules(&main_conf).unwrap());

        f.manager.write_active_modules();
        f.manager.deactivate_all(&mut f.scene, &f.renderers);
        assert!(!f.manager.is_modules_write_pending());
        assert_eq!(f.manager.list_active_modules(), "");
    }

    #[test]
    fn test_describe_and_shared_data() {
        let mut f = fixture();
        f.manager.activate(&mut f.scene, &f.renderers, "clock").unwrap();
        let id = f.manager.instance_ids("clock")[0];
        assert_eq!(
            f.manager.describe_instance(id).as_deref(),
            Some("Clock (v1.2.0) by rg\nShows the time")
        );

        f.manager.activate(&mut f.scene, &f.renderers, "keeper").unwrap();
        let keeper = f.manager.instance_ids("keeper")[0];
        assert_eq!(f.manager.slots().slot_of(keeper), Some(1));
        let shared = f.manager.shared_data(1).and_then(|d| d.downcast_ref::<String>());
        assert_eq!(shared.map(String::as_str), Some("12:00"));

        f.manager.shutdown(&mut f.scene, &f.renderers);
        assert_eq!(f.manager.slots().used(), 0);
        assert!(f.manager.registry().is_empty());
    }
}
