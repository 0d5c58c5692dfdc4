//! The built-in configuration categories and their effect on the scene.

use log::debug;
use rg_dock_types::{Color, KeyFile, ModuleCategory};
use std::any::Any;
use std::fmt::Debug;

use super::{InternalModule, ReloadEffect};
use crate::constants::{DEFAULT_ANIMATION_DELTA_MS, DEFAULT_ICON_SIZE, DEFAULT_SUB_DOCK_RATIO, MODULES_KEY};
use crate::hiding::HidingEffect;
use crate::scene::Scene;

/// Typed config of one group of the main config file.
pub trait CategoryConfig: Clone + Default + PartialEq + Debug + 'static {
    /// Group name, also the internal module's name.
    const NAME: &'static str;
    const CATEGORY: ModuleCategory;

    /// Parse the group. The flag is true when keys were missing.
    fn read(key_file: &KeyFile) -> (Self, bool);

    /// Push the values into the scene. `previous` is the last applied
    /// config, `None` on the first pass.
    fn apply(&self, previous: Option<&Self>, scene: &mut Scene) -> ReloadEffect;
}

/// Internal module backed by a [`CategoryConfig`].
#[derive(Debug, Default)]
pub struct ConfigCategory<C: CategoryConfig> {
    pub config: C,
    applied: Option<C>,
    external: Vec<String>,
}

impl<C: CategoryConfig> InternalModule for ConfigCategory<C> {
    fn name(&self) -> &str {
        C::NAME
    }

    fn category(&self) -> ModuleCategory {
        C::CATEGORY
    }

    fn get_config(&mut self, key_file: &KeyFile) -> bool {
        let (config, missing) = C::read(key_file);
        if missing {
            debug!("Group '{}' is incomplete", C::NAME);
        }
        self.config = config;
        missing
    }

    fn apply(&mut self, scene: &mut Scene) -> ReloadEffect {
        let effect = self.config.apply(self.applied.as_ref(), scene);
        self.applied = Some(self.config.clone());
        effect
    }

    fn external_modules(&self) -> &[String] {
        &self.external
    }

    fn add_external_module(&mut self, name: &str) {
        if !self.external.iter().any(|n| n == name) {
            self.external.push(name.to_string());
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reads one group, remembering whether any key was missing.
struct GroupReader<'a> {
    key_file: &'a KeyFile,
    group: &'static str,
    missing: bool,
}

impl<'a> GroupReader<'a> {
    fn new(key_file: &'a KeyFile, group: &'static str) -> Self {
        Self {
            key_file,
            group,
            missing: false,
        }
    }

    fn present(&mut self, key: &str) -> bool {
        let present = self.key_file.has_key(self.group, key);
        self.missing |= !present;
        present
    }

    fn int(&mut self, key: &str, default: i64) -> i64 {
        if !self.present(key) {
            return default;
        }
        self.key_file.get_int(self.group, key, default)
    }

    fn uint(&mut self, key: &str, default: u32) -> u32 {
        u32::try_from(self.int(key, i64::from(default))).unwrap_or(default)
    }

    fn double(&mut self, key: &str, default: f64) -> f64 {
        if !self.present(key) {
            return default;
        }
        self.key_file.get_double(self.group, key, default)
    }

    fn boolean(&mut self, key: &str, default: bool) -> bool {
        if !self.present(key) {
            return default;
        }
        self.key_file.get_bool(self.group, key, default)
    }

    fn string(&mut self, key: &str, default: &str) -> String {
        if !self.present(key) {
            return default.to_string();
        }
        self.key_file.get_string_or(self.group, key, default)
    }

    fn optional_string(&mut self, key: &str) -> Option<String> {
        if !self.present(key) {
            return None;
        }
        self.key_file.get_string(self.group, key)
    }

    fn string_list(&mut self, key: &str) -> Vec<String> {
        if !self.present(key) {
            return Vec::new();
        }
        self.key_file.get_string_list(self.group, key)
    }

    fn color(&mut self, key: &str, default: Color) -> Color {
        if !self.present(key) {
            return default;
        }
        self.key_file
            .get_double_list(self.group, key)
            .and_then(|components| Color::from_components(&components))
            .unwrap_or(default)
    }

    /// Size from `<prefix>width`/`<prefix>height`, or the legacy `<prefix>size`.
    fn size(&mut self, prefix: &str, default: (i32, i32)) -> (i32, i32) {
        let known = ["width", "height", "size"]
            .iter()
            .any(|suffix| self.key_file.has_key(self.group, &format!("{prefix}{suffix}")));
        if !known {
            self.missing = true;
            return default;
        }
        let (w, h) = self.key_file.get_size(self.group, prefix);
        (
            if w > 0 { w } else { default.0 },
            if h > 0 { h } else { default.1 },
        )
    }

    fn finish<C>(self, config: C) -> (C, bool) {
        (config, self.missing)
    }
}

fn redraw_if_changed<C: PartialEq>(previous: Option<&C>, current: &C) -> ReloadEffect {
    ReloadEffect {
        reload_applets: false,
        redraw_docks: previous.is_some_and(|p| p != current),
    }
}

// ===== Behavior =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenBorder {
    #[default]
    Bottom,
    Top,
    Right,
    Left,
}

impl ScreenBorder {
    fn from_index(index: i64) -> Self {
        match index {
            1 => Self::Top,
            2 => Self::Right,
            3 => Self::Left,
            _ => Self::Bottom,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionConfig {
    pub screen_border: ScreenBorder,
    /// 0 is the left/top end of the border, 1 the other end.
    pub alignment: f64,
    pub x_gap: i32,
    pub y_gap: i32,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            screen_border: ScreenBorder::Bottom,
            alignment: 0.5,
            x_gap: 0,
            y_gap: 0,
        }
    }
}

impl CategoryConfig for PositionConfig {
    const NAME: &'static str = "Position";
    const CATEGORY: ModuleCategory = ModuleCategory::Behavior;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let d = Self::default();
        let config = Self {
            screen_border: ScreenBorder::from_index(r.int("screen border", 0)),
            alignment: r.double("alignment", d.alignment).clamp(0.0, 1.0),
            x_gap: r.int("x gap", 0) as i32,
            y_gap: r.int("y gap", 0) as i32,
        };
        r.finish(config)
    }

    fn apply(&self, previous: Option<&Self>, _scene: &mut Scene) -> ReloadEffect {
        redraw_if_changed(previous, self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessibilityConfig {
    pub auto_hide: bool,
    pub hide_steps: u32,
    pub unhide_steps: u32,
    pub hiding_effect: String,
}

impl Default for AccessibilityConfig {
    fn default() -> Self {
        Self {
            auto_hide: false,
            hide_steps: 10,
            unhide_steps: 10,
            hiding_effect: "move down".to_string(),
        }
    }
}

impl CategoryConfig for AccessibilityConfig {
    const NAME: &'static str = "Accessibility";
    const CATEGORY: ModuleCategory = ModuleCategory::Behavior;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let d = Self::default();
        let config = Self {
            auto_hide: r.boolean("auto-hide", d.auto_hide),
            hide_steps: r.uint("hide steps", d.hide_steps).max(1),
            unhide_steps: r.uint("unhide steps", d.unhide_steps).max(1),
            hiding_effect: r.string("hiding effect", &d.hiding_effect),
        };
        r.finish(config)
    }

    fn apply(&self, previous: Option<&Self>, scene: &mut Scene) -> ReloadEffect {
        scene.settings.hide_steps = self.hide_steps;
        scene.settings.unhide_steps = self.unhide_steps;
        scene.settings.hiding_effect = HidingEffect::from_name(&self.hiding_effect);

        if previous.map(|p| p.auto_hide) != Some(self.auto_hide) {
            let roots: Vec<String> = scene.root_docks().map(|d| d.name.clone()).collect();
            for name in roots {
                if self.auto_hide {
                    scene.start_hiding(&name);
                } else {
                    scene.start_showing(&name);
                }
            }
        }
        ReloadEffect::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    pub fast_delta_ms: u32,
    pub accelerated: bool,
    /// Modules to activate at startup.
    pub modules: Vec<String>,
    /// Whether gauges and graphs write their values by default.
    pub show_values: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            fast_delta_ms: DEFAULT_ANIMATION_DELTA_MS,
            accelerated: false,
            modules: Vec::new(),
            show_values: true,
        }
    }
}

impl CategoryConfig for SystemConfig {
    const NAME: &'static str = "System";
    const CATEGORY: ModuleCategory = ModuleCategory::Behavior;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let d = Self::default();
        let config = Self {
            fast_delta_ms: r.uint("fast delta", d.fast_delta_ms).max(1),
            accelerated: r.boolean("accelerated", d.accelerated),
            modules: r.string_list(MODULES_KEY),
            show_values: r.boolean("show values", d.show_values),
        };
        r.finish(config)
    }

    fn apply(&self, previous: Option<&Self>, scene: &mut Scene) -> ReloadEffect {
        scene.settings.fast_delta_ms = self.fast_delta_ms;
        scene.settings.accelerated = self.accelerated;
        if previous.map(|p| p.fast_delta_ms) != Some(self.fast_delta_ms) {
            let slow = scene.settings.slow_delta_ms();
            for dock in scene.docks_mut() {
                dock.slow_delta_ms = slow;
            }
            for desklet in scene.desklets_mut() {
                desklet.slow_delta_ms = slow;
            }
        }
        ReloadEffect::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskBarConfig {
    pub show_applications: bool,
    pub group_by_class: bool,
    pub only_current_desktop: bool,
}

impl Default for TaskBarConfig {
    fn default() -> Self {
        Self {
            show_applications: true,
            group_by_class: true,
            only_current_desktop: false,
        }
    }
}

impl CategoryConfig for TaskBarConfig {
    const NAME: &'static str = "TaskBar";
    const CATEGORY: ModuleCategory = ModuleCategory::Behavior;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let d = Self::default();
        let config = Self {
            show_applications: r.boolean("show applications", d.show_applications),
            group_by_class: r.boolean("group by class", d.group_by_class),
            only_current_desktop: r.boolean("current desktop only", d.only_current_desktop),
        };
        r.finish(config)
    }

    fn apply(&self, previous: Option<&Self>, _scene: &mut Scene) -> ReloadEffect {
        redraw_if_changed(previous, self)
    }
}

// ===== Theme =====

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundConfig {
    pub color_top: Color,
    pub color_bottom: Color,
    pub border_color: Color,
    pub border_width: i32,
    pub corner_radius: f64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            color_top: Color::new(0.9, 0.9, 1.0, 0.4),
            color_bottom: Color::new(0.6, 0.6, 0.9, 0.4),
            border_color: Color::new(0.2, 0.2, 0.4, 0.6),
            border_width: 1,
            corner_radius: 12.0,
        }
    }
}

impl CategoryConfig for BackgroundConfig {
    const NAME: &'static str = "Background";
    const CATEGORY: ModuleCategory = ModuleCategory::Theme;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let d = Self::default();
        let config = Self {
            color_top: r.color("color top", d.color_top),
            color_bottom: r.color("color bottom", d.color_bottom),
            border_color: r.color("border color", d.border_color),
            border_width: r.int("border width", i64::from(d.border_width)).max(0) as i32,
            corner_radius: r.double("corner radius", d.corner_radius).max(0.0),
        };
        r.finish(config)
    }

    fn apply(&self, previous: Option<&Self>, _scene: &mut Scene) -> ReloadEffect {
        redraw_if_changed(previous, self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconsConfig {
    /// Default size of applet icons.
    pub applet_size: (i32, i32),
    pub use_reflect: bool,
    pub separator_image: Option<String>,
}

impl Default for IconsConfig {
    fn default() -> Self {
        Self {
            applet_size: (DEFAULT_ICON_SIZE, DEFAULT_ICON_SIZE),
            use_reflect: false,
            separator_image: None,
        }
    }
}

/// Categories whose instances take the applet icon size.
const APPLET_CATEGORIES: [ModuleCategory; 3] = [
    ModuleCategory::Accessory,
    ModuleCategory::Desktop,
    ModuleCategory::Controler,
];

impl CategoryConfig for IconsConfig {
    const NAME: &'static str = "Icons";
    const CATEGORY: ModuleCategory = ModuleCategory::Theme;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let d = Self::default();
        let config = Self {
            applet_size: r.size("applet ", d.applet_size),
            use_reflect: r.boolean("reflection", d.use_reflect),
            separator_image: r.optional_string("separator image"),
        };
        r.finish(config)
    }

    fn apply(&self, previous: Option<&Self>, scene: &mut Scene) -> ReloadEffect {
        for category in APPLET_CATEGORIES {
            scene.settings.icon_sizes.insert(category, self.applet_size);
        }
        scene.settings.use_reflect = self.use_reflect;
        for dock in scene.docks_mut() {
            dock.use_reflect = self.use_reflect;
        }
        ReloadEffect {
            reload_applets: previous.is_some_and(|p| p.applet_size != self.applet_size),
            redraw_docks: previous.is_some_and(|p| p != self),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelsConfig {
    pub show_labels: bool,
    pub font: String,
    pub text_color: Color,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            show_labels: true,
            font: "Sans 12".to_string(),
            text_color: Color::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

impl CategoryConfig for LabelsConfig {
    const NAME: &'static str = "Labels";
    const CATEGORY: ModuleCategory = ModuleCategory::Theme;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let d = Self::default();
        let config = Self {
            show_labels: r.boolean("show labels", d.show_labels),
            font: r.string("font", &d.font),
            text_color: r.color("text color", d.text_color),
        };
        r.finish(config)
    }

    fn apply(&self, previous: Option<&Self>, _scene: &mut Scene) -> ReloadEffect {
        redraw_if_changed(previous, self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogsConfig {
    pub bubble_color: Color,
    pub font: String,
    /// How long an info dialog stays, in seconds.
    pub duration_s: u32,
}

impl Default for DialogsConfig {
    fn default() -> Self {
        Self {
            bubble_color: Color::new(1.0, 1.0, 1.0, 0.8),
            font: "Sans 10".to_string(),
            duration_s: 4,
        }
    }
}

impl CategoryConfig for DialogsConfig {
    const NAME: &'static str = "Dialogs";
    const CATEGORY: ModuleCategory = ModuleCategory::Theme;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let d = Self::default();
        let config = Self {
            bubble_color: r.color("bubble color", d.bubble_color),
            font: r.string("font", &d.font),
            duration_s: r.uint("duration", d.duration_s),
        };
        r.finish(config)
    }

    // Dialogs read their settings when they open.
    fn apply(&self, _previous: Option<&Self>, _scene: &mut Scene) -> ReloadEffect {
        ReloadEffect::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorsConfig {
    pub show_running: bool,
    pub running_image: Option<String>,
    pub active_image: Option<String>,
}

impl Default for IndicatorsConfig {
    fn default() -> Self {
        Self {
            show_running: true,
            running_image: None,
            active_image: None,
        }
    }
}

impl CategoryConfig for IndicatorsConfig {
    const NAME: &'static str = "Indicators";
    const CATEGORY: ModuleCategory = ModuleCategory::Theme;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let config = Self {
            show_running: r.boolean("show running", true),
            running_image: r.optional_string("running image"),
            active_image: r.optional_string("active image"),
        };
        r.finish(config)
    }

    fn apply(&self, previous: Option<&Self>, _scene: &mut Scene) -> ReloadEffect {
        redraw_if_changed(previous, self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewsConfig {
    pub main_dock_view: String,
    pub sub_dock_view: String,
    pub sub_dock_ratio: f64,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            main_dock_view: "default".to_string(),
            sub_dock_view: "default".to_string(),
            sub_dock_ratio: DEFAULT_SUB_DOCK_RATIO,
        }
    }
}

impl CategoryConfig for ViewsConfig {
    const NAME: &'static str = "Views";
    const CATEGORY: ModuleCategory = ModuleCategory::Theme;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let d = Self::default();
        let config = Self {
            main_dock_view: r.string("main dock view", &d.main_dock_view),
            sub_dock_view: r.string("sub-dock view", &d.sub_dock_view),
            sub_dock_ratio: r.double("relative icon size", d.sub_dock_ratio).clamp(0.1, 1.0),
        };
        r.finish(config)
    }

    fn apply(&self, previous: Option<&Self>, scene: &mut Scene) -> ReloadEffect {
        scene.settings.main_dock_view = self.main_dock_view.clone();
        scene.settings.sub_dock_view = self.sub_dock_view.clone();
        scene.settings.sub_dock_ratio = self.sub_dock_ratio;

        let changed = previous.is_some_and(|p| p != self);
        if changed {
            let mut resized = Vec::new();
            for dock in scene.docks_mut() {
                if dock.is_root() {
                    dock.view_name = self.main_dock_view.clone();
                } else {
                    dock.view_name = self.sub_dock_view.clone();
                    dock.ratio = self.sub_dock_ratio;
                    resized.push(dock.name.clone());
                }
            }
            for name in resized {
                scene.update_dock_size(&name);
            }
        }
        ReloadEffect {
            reload_applets: false,
            redraw_docks: changed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeskletsConfig {
    /// Decoration used by desklets set to "default".
    pub decoration: String,
}

impl Default for DeskletsConfig {
    fn default() -> Self {
        Self {
            decoration: "clear".to_string(),
        }
    }
}

impl CategoryConfig for DeskletsConfig {
    const NAME: &'static str = "Desklets";
    const CATEGORY: ModuleCategory = ModuleCategory::Theme;

    fn read(key_file: &KeyFile) -> (Self, bool) {
        let mut r = GroupReader::new(key_file, Self::NAME);
        let d = Self::default();
        let config = Self {
            decoration: r.string("decorations", &d.decoration),
        };
        r.finish(config)
    }

    fn apply(&self, previous: Option<&Self>, scene: &mut Scene) -> ReloadEffect {
        scene.settings.default_desklet_decoration = self.decoration.clone();
        ReloadEffect {
            reload_applets: previous.is_some_and(|p| p.decoration != self.decoration),
            redraw_docks: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ScreenGeometry;

    #[test]
    fn test_complete_group_needs_no_flush() {
        let mut kf = KeyFile::new();
        kf.set_string("Desklets", "decorations", "frame");
        let (config, missing) = DeskletsConfig::read(&kf);
        assert!(!missing);
        assert_eq!(config.decoration, "frame");

        let (config, missing) = DeskletsConfig::read(&KeyFile::new());
        assert!(missing);
        assert_eq!(config, DeskletsConfig::default());
    }

    #[test]
    fn test_legacy_applet_size_key() {
        let mut kf = KeyFile::new();
        kf.set_string("Icons", "applet size", "32;24");
        let (config, _) = IconsConfig::read(&kf);
        assert_eq!(config.applet_size, (32, 24));

        kf.set_int("Icons", "applet width", 40);
        let (config, _) = IconsConfig::read(&kf);
        assert_eq!(config.applet_size, (40, DEFAULT_ICON_SIZE));
    }

    #[test]
    fn test_background_color_parsing() {
        let mut kf = KeyFile::new();
        kf.set_string("Background", "color top", "1;0;0");
        kf.set_string("Background", "color bottom", "bad");
        let (config, _) = BackgroundConfig::read(&kf);
        assert_eq!(config.color_top, Color::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(config.color_bottom, BackgroundConfig::default().color_bottom);
    }

    #[test]
    fn test_auto_hide_starts_hiding_root_docks() {
        let mut scene = Scene::new(ScreenGeometry::default());
        scene.create_dock("Default");
        let mut category = ConfigCategory::<AccessibilityConfig>::default();
        let mut kf = KeyFile::new();
        kf.set_bool("Accessibility", "auto-hide", true);
        kf.set_string("Accessibility", "hiding effect", "fade out");
        category.get_config(&kf);
        category.apply(&mut scene);
        assert!(scene.dock("Default").unwrap().is_hiding);
        assert_eq!(scene.settings.hiding_effect, HidingEffect::FadeOut);

        kf.set_bool("Accessibility", "auto-hide", false);
        category.reload(&kf, &mut scene);
        assert!(!scene.dock("Default").unwrap().is_hiding);
    }

    #[test]
    fn test_fast_delta_updates_containers() {
        let mut scene = Scene::new(ScreenGeometry::default());
        scene.create_dock("Default");
        let mut category = ConfigCategory::<SystemConfig>::default();
        let mut kf = KeyFile::new();
        kf.set_int("System", "fast delta", 25);
        category.get_config(&kf);
        category.apply(&mut scene);
        assert_eq!(scene.dock("Default").unwrap().slow_delta_ms, 50);
    }

    #[test]
    fn test_views_change_redraws_and_resizes_sub_docks() {
        let mut scene = Scene::new(ScreenGeometry::default());
        scene.create_dock("Default");
        let mut category = ConfigCategory::<ViewsConfig>::default();
        let mut kf = KeyFile::new();
        assert!(!category.reload(&kf, &mut scene).redraw_docks);

        kf.set_string("Views", "main dock view", "panel");
        let effect = category.reload(&kf, &mut scene);
        assert!(effect.redraw_docks);
        assert!(!effect.reload_applets);
        assert_eq!(scene.dock("Default").unwrap().view_name, "panel");
        assert_eq!(scene.settings.main_dock_view, "panel");
    }

    #[test]
    fn test_decoration_change_reloads_applets() {
        let mut scene = Scene::new(ScreenGeometry::default());
        let mut category = ConfigCategory::<DeskletsConfig>::default();
        let mut kf = KeyFile::new();
        assert!(!category.reload(&kf, &mut scene).reload_applets);
        kf.set_string("Desklets", "decorations", "frame");
        assert!(category.reload(&kf, &mut scene).reload_applets);
        assert_eq!(scene.settings.default_desklet_decoration, "frame");
    }
}
