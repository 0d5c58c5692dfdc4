//! Scene model: every dock, desklet and icon of the running dock.
//!
//! The windowing layer renders what the scene describes; all lifecycle code
//! in this crate mutates the scene only. Containers reference icons by id and
//! icons reference their containers by name/id, so nothing here holds a
//! borrow across calls.

use cairo::{Format, ImageSurface};
use log::{debug, warn};
use rg_dock_types::{DeskletAttributes, DeskletDecoration, MinimalAppletConfig, ModuleCategory};
use std::collections::{BTreeMap, HashMap};

use crate::animation::{AnimationClock, NotificationKind, TickOutcome};
use crate::constants::{
    ATTACH_ANIMATION_STEPS, DEFAULT_ANIMATION_DELTA_MS, DEFAULT_DOCK_NAME, DEFAULT_ICON_SIZE,
    DEFAULT_SUB_DOCK_RATIO, ICON_GAP, REFLECTION_RATIO,
};
use crate::container::{ContainerRef, Desklet, DeskletId, Dock};
pub use crate::container::ScreenGeometry;
use crate::data_renderer;
use crate::hiding::HidingEffect;
use crate::icon::{Icon, IconId, IconKind};
use crate::module::InstanceId;
use crate::texture::TextureStore;

/// Effective global settings, pushed by the internal modules.
#[derive(Debug, Clone)]
pub struct SceneSettings {
    /// New containers render through the accelerated backend.
    pub accelerated: bool,
    pub fast_delta_ms: u32,
    pub hide_steps: u32,
    pub unhide_steps: u32,
    pub hiding_effect: HidingEffect,
    pub use_reflect: bool,
    pub sub_dock_ratio: f64,
    pub attach_animation_steps: u32,
    /// Default applet icon size per module category.
    pub icon_sizes: HashMap<ModuleCategory, (i32, i32)>,
    pub default_desklet_decoration: String,
    pub main_dock_view: String,
    pub sub_dock_view: String,
}

impl SceneSettings {
    pub fn slow_delta_ms(&self) -> u32 {
        self.fast_delta_ms * 2
    }

    pub fn default_icon_size(&self, category: ModuleCategory) -> (i32, i32) {
        self.icon_sizes
            .get(&category)
            .copied()
            .filter(|(w, h)| *w > 0 && *h > 0)
            .unwrap_or((DEFAULT_ICON_SIZE, DEFAULT_ICON_SIZE))
    }
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            accelerated: false,
            fast_delta_ms: DEFAULT_ANIMATION_DELTA_MS,
            hide_steps: 10,
            unhide_steps: 10,
            hiding_effect: HidingEffect::default(),
            use_reflect: false,
            sub_dock_ratio: DEFAULT_SUB_DOCK_RATIO,
            attach_animation_steps: ATTACH_ANIMATION_STEPS,
            icon_sizes: HashMap::new(),
            default_desklet_decoration: "clear".to_string(),
            main_dock_view: "default".to_string(),
            sub_dock_view: "default".to_string(),
        }
    }
}

pub struct Scene {
    docks: BTreeMap<String, Dock>,
    desklets: BTreeMap<DeskletId, Desklet>,
    icons: HashMap<IconId, Icon>,
    next_icon_id: u64,
    next_desklet_id: u64,
    pub screen: ScreenGeometry,
    pub settings: SceneSettings,
    pub clock: AnimationClock,
    pub textures: TextureStore,
}

impl Scene {
    pub fn new(screen: ScreenGeometry) -> Self {
        Self::with_settings(screen, SceneSettings::default())
    }

    pub fn with_settings(screen: ScreenGeometry, settings: SceneSettings) -> Self {
        Self {
            docks: BTreeMap::new(),
            desklets: BTreeMap::new(),
            icons: HashMap::new(),
            next_icon_id: 0,
            next_desklet_id: 0,
            screen,
            settings,
            clock: AnimationClock::new(),
            textures: TextureStore::new(),
        }
    }

    // ===== Docks =====

    pub fn dock(&self, name: &str) -> Option<&Dock> {
        self.docks.get(name)
    }

    pub fn dock_mut(&mut self, name: &str) -> Option<&mut Dock> {
        self.docks.get_mut(name)
    }

    pub fn has_dock(&self, name: &str) -> bool {
        self.docks.contains_key(name)
    }

    pub fn docks(&self) -> impl Iterator<Item = &Dock> {
        self.docks.values()
    }

    pub fn docks_mut(&mut self) -> impl Iterator<Item = &mut Dock> {
        self.docks.values_mut()
    }

    /// Root docks, i.e. docks no icon points to.
    pub fn root_docks(&self) -> impl Iterator<Item = &Dock> {
        self.docks.values().filter(|d| d.is_root())
    }

    /// Find the dock named `name`, creating it if needed.
    pub fn create_dock(&mut self, name: &str) -> &mut Dock {
        let settings = &self.settings;
        self.docks.entry(name.to_string()).or_insert_with(|| {
            debug!("Creating dock '{}'", name);
            Dock {
                name: name.to_string(),
                icons: Vec::new(),
                is_main: name == DEFAULT_DOCK_NAME,
                ref_count: 0,
                ratio: 1.0,
                accelerated: settings.accelerated,
                use_reflect: settings.use_reflect,
                view_name: settings.main_dock_view.clone(),
                width: 0,
                height: 0,
                hide_offset: 0.0,
                is_hiding: false,
                slow_delta_ms: settings.slow_delta_ms(),
                needs_redraw: true,
            }
        })
    }

    /// Create a sub-dock for `icon`, named after `base` but unique.
    pub fn create_sub_dock(&mut self, icon: IconId, base: &str) -> Option<String> {
        if !self.icons.contains_key(&icon) {
            warn!("Cannot create a sub-dock for unknown {}", icon);
            return None;
        }
        let name = self.unique_dock_name(base);
        let ratio = self.settings.sub_dock_ratio;
        let view = self.settings.sub_dock_view.clone();
        let dock = self.create_dock(&name);
        dock.ratio = ratio;
        dock.ref_count = 1;
        dock.is_main = false;
        dock.view_name = view;
        if let Some(icon) = self.icons.get_mut(&icon) {
            icon.sub_dock = Some(name.clone());
        }
        Some(name)
    }

    /// `base` if no dock has that name yet, else `base-1`, `base-2`, ...
    pub fn unique_dock_name(&self, base: &str) -> String {
        if !self.docks.contains_key(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{base}-{i}"))
            .find(|name| !self.docks.contains_key(name))
            .unwrap_or_else(|| base.to_string())
    }

    /// Rename a dock and every reference to it.
    pub fn rename_dock(&mut self, old: &str, new: &str) -> bool {
        if old == new || self.docks.contains_key(new) {
            return false;
        }
        let Some(mut dock) = self.docks.remove(old) else {
            return false;
        };
        debug!("Renaming dock '{}' to '{}'", old, new);
        dock.name = new.to_string();
        self.docks.insert(new.to_string(), dock);
        for icon in self.icons.values_mut() {
            if icon.parent_dock.as_deref() == Some(old) {
                icon.parent_dock = Some(new.to_string());
            }
            if icon.sub_dock.as_deref() == Some(old) {
                icon.sub_dock = Some(new.to_string());
            }
        }
        true
    }

    /// Remove a dock. Its icons are left without a parent dock.
    pub fn destroy_dock(&mut self, name: &str) -> Option<Dock> {
        let dock = self.docks.remove(name)?;
        debug!("Destroying dock '{}' ({} icons)", name, dock.icons.len());
        for id in &dock.icons {
            if let Some(icon) = self.icons.get_mut(id) {
                icon.parent_dock = None;
            }
        }
        for icon in self.icons.values_mut() {
            if icon.sub_dock.as_deref() == Some(name) {
                icon.sub_dock = None;
            }
        }
        Some(dock)
    }

    pub fn update_dock_size(&mut self, name: &str) {
        let Some(dock) = self.docks.get(name) else {
            return;
        };
        let ratio = dock.ratio;
        let (mut width, mut height) = (0.0_f64, 0.0_f64);
        for id in &dock.icons {
            if let Some(icon) = self.icons.get(id) {
                width += icon.width * ratio;
                height = height.max(icon.height * ratio);
            }
        }
        let gaps = dock.icons.len().saturating_sub(1) as i32 * ICON_GAP;
        if let Some(dock) = self.docks.get_mut(name) {
            dock.width = width.round() as i32 + gaps;
            dock.height = height.round() as i32;
            dock.needs_redraw = true;
        }
    }

    pub fn start_hiding(&mut self, name: &str) {
        if let Some(dock) = self.docks.get_mut(name) {
            dock.is_hiding = true;
        }
    }

    pub fn start_showing(&mut self, name: &str) {
        if let Some(dock) = self.docks.get_mut(name) {
            dock.is_hiding = false;
        }
    }

    // ===== Desklets =====

    pub fn desklet(&self, id: DeskletId) -> Option<&Desklet> {
        self.desklets.get(&id)
    }

    pub fn desklet_mut(&mut self, id: DeskletId) -> Option<&mut Desklet> {
        self.desklets.get_mut(&id)
    }

    pub fn desklets(&self) -> impl Iterator<Item = &Desklet> {
        self.desklets.values()
    }

    pub fn desklets_mut(&mut self) -> impl Iterator<Item = &mut Desklet> {
        self.desklets.values_mut()
    }

    pub fn create_desklet(&mut self, attributes: &DeskletAttributes, icon: Option<IconId>) -> DeskletId {
        self.next_desklet_id += 1;
        let id = DeskletId(self.next_desklet_id);
        let desklet = Desklet {
            id,
            icon,
            attributes: attributes.clone(),
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            desired_width: 0,
            desired_height: 0,
            decoration: DeskletDecoration::Default,
            accelerated: self.settings.accelerated,
            title: None,
            zoomed_out: false,
            slow_delta_ms: self.settings.slow_delta_ms(),
            needs_redraw: true,
        };
        self.desklets.insert(id, desklet);
        self.configure_desklet(id, attributes);
        debug!("Created desklet {:?}", id);
        id
    }

    /// Apply position, size and decoration. Negative coordinates are relative
    /// to the right/bottom screen edge.
    pub fn configure_desklet(&mut self, id: DeskletId, attributes: &DeskletAttributes) {
        let screen = self.screen;
        let default_decoration = self.settings.default_desklet_decoration.clone();
        let Some(desklet) = self.desklets.get_mut(&id) else {
            warn!("Cannot configure unknown desklet {:?}", id);
            return;
        };
        desklet.attributes = attributes.clone();
        desklet.x = if attributes.x < 0 {
            screen.width + attributes.x
        } else {
            attributes.x
        };
        desklet.y = if attributes.y < 0 {
            screen.height + attributes.y
        } else {
            attributes.y
        };
        desklet.width = attributes.width;
        desklet.height = attributes.height;
        desklet.desired_width = attributes.width;
        desklet.desired_height = attributes.height;
        desklet.decoration = match &attributes.decoration {
            DeskletDecoration::Default => DeskletDecoration::Theme(default_decoration),
            other => other.clone(),
        };
        desklet.needs_redraw = true;
    }

    pub fn set_desklet_icon(&mut self, id: DeskletId, icon: IconId, title: &str) {
        if let Some(desklet) = self.desklets.get_mut(&id) {
            desklet.icon = Some(icon);
            desklet.title = Some(title.to_string());
        }
    }

    pub fn zoom_out_desklet(&mut self, id: DeskletId) {
        if let Some(desklet) = self.desklets.get_mut(&id) {
            desklet.zoomed_out = true;
            desklet.needs_redraw = true;
        }
    }

    /// Remove a desklet. Its icon stays in the scene.
    pub fn destroy_desklet(&mut self, id: DeskletId) -> Option<Desklet> {
        let desklet = self.desklets.remove(&id);
        if desklet.is_some() {
            debug!("Destroyed desklet {:?}", id);
        }
        desklet
    }

    // ===== Icons =====

    pub fn icon(&self, id: IconId) -> Option<&Icon> {
        self.icons.get(&id)
    }

    pub fn icon_mut(&mut self, id: IconId) -> Option<&mut Icon> {
        self.icons.get_mut(&id)
    }

    pub fn icons(&self) -> impl Iterator<Item = &Icon> {
        self.icons.values()
    }

    fn next_icon_id(&mut self) -> IconId {
        self.next_icon_id += 1;
        IconId(self.next_icon_id)
    }

    /// Create a free-standing icon (launcher, separator, ...).
    pub fn create_icon(&mut self, kind: IconKind, name: Option<String>, order: f64) -> IconId {
        let id = self.next_icon_id();
        let mut icon = Icon::new(id, kind);
        icon.name = name;
        icon.order = order;
        let (w, h) = self.settings.default_icon_size(ModuleCategory::Accessory);
        icon.width = w as f64;
        icon.height = h as f64;
        self.icons.insert(id, icon);
        id
    }

    /// Create the icon of an applet instance and allocate its buffer.
    ///
    /// A desklet gets the icon as its only icon; a dock is only recorded as
    /// the icon's parent, insertion happens later.
    pub fn create_icon_for_applet(
        &mut self,
        config: &MinimalAppletConfig,
        container: &ContainerRef,
        instance: InstanceId,
    ) -> IconId {
        let id = self.next_icon_id();
        let mut icon = Icon::new(id, IconKind::Applet);
        icon.name = config.label.clone();
        icon.file_name = config.icon_image.clone();
        icon.order = config.order.unwrap_or(0.0);
        icon.width = config.icon_width as f64;
        icon.height = config.icon_height as f64;
        icon.always_visible = config.always_visible;
        icon.instance = Some(instance);

        match container {
            ContainerRef::Dock(name) => icon.parent_dock = Some(name.clone()),
            ContainerRef::Desklet(desklet_id) => {
                if let Some(desklet) = self.desklets.get_mut(desklet_id) {
                    desklet.icon = Some(id);
                }
            }
        }
        self.icons.insert(id, icon);
        self.load_icon_buffers(id);
        id
    }

    /// Container currently holding the icon.
    pub fn icon_container(&self, id: IconId) -> Option<ContainerRef> {
        let icon = self.icons.get(&id)?;
        if let Some(dock) = &icon.parent_dock {
            return Some(ContainerRef::Dock(dock.clone()));
        }
        self.desklets
            .values()
            .find(|d| d.icon == Some(id))
            .map(|d| ContainerRef::Desklet(d.id))
    }

    pub fn container_exists(&self, container: &ContainerRef) -> bool {
        match container {
            ContainerRef::Dock(name) => self.docks.contains_key(name),
            ContainerRef::Desklet(id) => self.desklets.contains_key(id),
        }
    }

    pub fn container_ratio(&self, container: &ContainerRef) -> f64 {
        match container {
            ContainerRef::Dock(name) => self.docks.get(name).map(|d| d.ratio).unwrap_or(1.0),
            ContainerRef::Desklet(_) => 1.0,
        }
    }

    pub fn container_is_accelerated(&self, container: &ContainerRef) -> bool {
        match container {
            ContainerRef::Dock(name) => self.docks.get(name).is_some_and(|d| d.accelerated),
            ContainerRef::Desklet(id) => self.desklets.get(id).is_some_and(|d| d.accelerated),
        }
    }

    pub fn container_uses_reflect(&self, container: &ContainerRef) -> bool {
        match container {
            ContainerRef::Dock(name) => self.docks.get(name).is_some_and(|d| d.use_reflect),
            ContainerRef::Desklet(_) => false,
        }
    }

    pub fn container_slow_delta_ms(&self, container: &ContainerRef) -> u32 {
        let delta = match container {
            ContainerRef::Dock(name) => self.docks.get(name).map(|d| d.slow_delta_ms),
            ContainerRef::Desklet(id) => self.desklets.get(id).map(|d| d.slow_delta_ms),
        };
        delta.unwrap_or_else(|| self.settings.slow_delta_ms()).max(1)
    }

    /// (Re)allocate the icon's pixel buffer for its current container.
    pub fn load_icon_buffers(&mut self, id: IconId) {
        let container = self.icon_container(id);
        let Some(icon) = self.icons.get(&id) else {
            return;
        };
        let (width, height) = match &container {
            Some(ContainerRef::Desklet(desklet_id)) => self
                .desklets
                .get(desklet_id)
                .map(|d| (d.width, d.height))
                .unwrap_or((0, 0)),
            Some(c @ ContainerRef::Dock(_)) => {
                let ratio = self.container_ratio(c);
                (
                    (icon.width * ratio).round() as i32,
                    (icon.height * ratio).round() as i32,
                )
            }
            None => (icon.width.round() as i32, icon.height.round() as i32),
        };

        let buffer = if width > 0 && height > 0 {
            match ImageSurface::create(Format::ARgb32, width, height) {
                Ok(surface) => Some(surface),
                Err(e) => {
                    warn!("Failed to allocate {}x{} buffer for {}: {}", width, height, id, e);
                    None
                }
            }
        } else {
            None
        };

        if let Some(icon) = self.icons.get_mut(&id) {
            icon.buffer = buffer;
            icon.reflection = None;
        }
        if let Some(container) = container {
            if self.container_uses_reflect(&container) {
                self.add_reflection(id);
            }
            if self.container_is_accelerated(&container) {
                self.update_icon_texture(id);
            }
        }
    }

    /// Build the mirrored reflection of the icon's buffer.
    pub fn add_reflection(&mut self, id: IconId) {
        let Some(icon) = self.icons.get_mut(&id) else {
            return;
        };
        let Some(buffer) = &icon.buffer else {
            return;
        };
        let height = ((buffer.height() as f64) * REFLECTION_RATIO).round().max(1.0) as i32;
        let reflection = ImageSurface::create(Format::ARgb32, buffer.width(), height).and_then(|surface| {
            let cr = cairo::Context::new(&surface)?;
            cr.translate(0.0, buffer.height() as f64);
            cr.scale(1.0, -1.0);
            cr.set_source_surface(buffer, 0.0, 0.0)?;
            cr.paint_with_alpha(0.5)?;
            drop(cr);
            Ok(surface)
        });
        match reflection {
            Ok(surface) => icon.reflection = Some(surface),
            Err(e) => warn!("Failed to build reflection of {}: {}", id, e),
        }
    }

    /// Upload the icon's buffer into its texture, creating it if needed.
    pub fn update_icon_texture(&mut self, id: IconId) {
        let Some(icon) = self.icons.get_mut(&id) else {
            return;
        };
        let Some(buffer) = &icon.buffer else {
            return;
        };
        let existing = icon.texture;
        let result = match existing {
            Some(texture) => self.textures.replace(texture, buffer),
            None => self.textures.upload(buffer).map(|texture| {
                icon.texture = Some(texture);
            }),
        };
        if let Err(e) = result {
            warn!("Failed to update texture of {}: {}", id, e);
        }
    }

    /// Insert an icon into a dock, keeping the dock sorted by order.
    pub fn insert_icon_in_dock(&mut self, id: IconId, dock_name: &str, update_size: bool, animate: bool) {
        let Some(order) = self.icons.get(&id).map(|i| i.order) else {
            warn!("Cannot insert unknown {} into '{}'", id, dock_name);
            return;
        };
        let icons = &self.icons;
        let Some(dock) = self.docks.get_mut(dock_name) else {
            warn!("Cannot insert {} into unknown dock '{}'", id, dock_name);
            return;
        };
        if !dock.icons.contains(&id) {
            let position = dock
                .icons
                .iter()
                .position(|other| icons.get(other).is_some_and(|o| o.order > order))
                .unwrap_or(dock.icons.len());
            dock.icons.insert(position, id);
        }
        dock.needs_redraw = true;
        if let Some(icon) = self.icons.get_mut(&id) {
            icon.parent_dock = Some(dock_name.to_string());
        }
        if update_size {
            self.update_dock_size(dock_name);
        }
        if animate {
            self.start_attach_animation(id);
        }
    }

    /// Take an icon out of its dock. Returns the dock it was in.
    pub fn detach_icon_from_dock(&mut self, id: IconId) -> Option<String> {
        let dock_name = self.icons.get_mut(&id)?.parent_dock.take()?;
        if let Some(dock) = self.docks.get_mut(&dock_name) {
            dock.icons.retain(|other| *other != id);
            dock.needs_redraw = true;
        }
        Some(dock_name)
    }

    /// Remove an icon for good, tearing down its animations and renderer.
    pub fn remove_icon(&mut self, id: IconId) -> Option<Icon> {
        if !self.icons.contains_key(&id) {
            return None;
        }
        data_renderer::detach(self, id);
        self.clock.unregister_icon(id);
        self.detach_icon_from_dock(id);
        for desklet in self.desklets.values_mut() {
            if desklet.icon == Some(id) {
                desklet.icon = None;
            }
        }
        let icon = self.icons.remove(&id)?;
        if let Some(texture) = icon.texture {
            self.textures.release(texture);
        }
        Some(icon)
    }

    pub fn set_quick_info(&mut self, id: IconId, text: Option<String>) {
        if let Some(icon) = self.icons.get_mut(&id) {
            icon.quick_info = text;
        }
    }

    pub fn queue_redraw(&mut self, container: &ContainerRef) {
        match container {
            ContainerRef::Dock(name) => {
                if let Some(dock) = self.docks.get_mut(name) {
                    dock.needs_redraw = true;
                }
            }
            ContainerRef::Desklet(id) => {
                if let Some(desklet) = self.desklets.get_mut(id) {
                    desklet.needs_redraw = true;
                }
            }
        }
    }

    pub fn redraw_icon(&mut self, id: IconId) {
        let Some(icon) = self.icons.get_mut(&id) else {
            return;
        };
        icon.redraw_requests += 1;
        if let Some(container) = self.icon_container(id) {
            self.queue_redraw(&container);
        }
    }

    /// Redraw the icons pointing at `dock` as their sub-dock.
    pub fn redraw_subdock_content(&mut self, dock: &str) {
        let pointing: Vec<IconId> = self
            .icons
            .values()
            .filter(|i| i.sub_dock.as_deref() == Some(dock))
            .map(|i| i.id)
            .collect();
        for id in pointing {
            self.redraw_icon(id);
        }
    }

    pub fn start_attach_animation(&mut self, id: IconId) {
        let steps = self.settings.attach_animation_steps;
        let Some(icon) = self.icons.get_mut(&id) else {
            return;
        };
        icon.attach_steps = steps;
        if steps > 0 {
            self.clock.register(id, NotificationKind::Attach, attach_tick);
        }
    }

    // ===== Animation =====

    /// Advance hide/show offsets, then run the animation clock.
    ///
    /// Returns whether anything is still animating.
    pub fn tick(&mut self) -> bool {
        let hide_step = 1.0 / self.settings.hide_steps.max(1) as f64;
        let unhide_step = 1.0 / self.settings.unhide_steps.max(1) as f64;
        let mut moving = false;
        for dock in self.docks.values_mut() {
            let target = if dock.is_hiding { 1.0 } else { 0.0 };
            if dock.hide_offset != target {
                dock.hide_offset = if dock.is_hiding {
                    (dock.hide_offset + hide_step).min(1.0)
                } else {
                    (dock.hide_offset - unhide_step).max(0.0)
                };
                dock.needs_redraw = true;
                moving = true;
            }
        }
        self.run_animation_clock();
        moving || !self.clock.is_idle()
    }
}

fn attach_tick(scene: &mut Scene, id: IconId) -> TickOutcome {
    let Some(icon) = scene.icon_mut(id) else {
        return TickOutcome::Stop;
    };
    icon.attach_steps = icon.attach_steps.saturating_sub(1);
    let remaining = icon.attach_steps;
    scene.redraw_icon(id);
    if remaining > 0 {
        TickOutcome::Continue
    } else {
        TickOutcome::Stop
    }
}
