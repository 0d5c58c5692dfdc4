//! The part of an applet's config file the host reads itself, before the
//! module parses its own keys.

use serde::{Deserialize, Serialize};

use crate::keyfile::KeyFile;

pub const ICON_GROUP: &str = "Icon";
pub const DESKLET_GROUP: &str = "Desklet";

/// Default desklet edge length when the config gives none.
pub const DEFAULT_DESKLET_SIZE: i32 = 96;

/// Stacking behaviour of a desklet window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeskletVisibility {
    #[default]
    Normal,
    KeepAbove,
    KeepBelow,
    WidgetLayer,
    ReserveSpace,
}

impl DeskletVisibility {
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => Self::KeepAbove,
            2 => Self::KeepBelow,
            3 => Self::WidgetLayer,
            4 => Self::ReserveSpace,
            _ => Self::Normal,
        }
    }

    pub fn index(&self) -> i64 {
        match self {
            Self::Normal => 0,
            Self::KeepAbove => 1,
            Self::KeepBelow => 2,
            Self::WidgetLayer => 3,
            Self::ReserveSpace => 4,
        }
    }
}

/// Background/foreground frame drawn around a desklet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum DeskletDecoration {
    /// Use the global default decoration theme.
    #[default]
    Default,
    Theme(String),
    Custom(CustomDecoration),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomDecoration {
    pub background_image: Option<String>,
    pub foreground_image: Option<String>,
    pub background_alpha: f64,
    pub foreground_alpha: f64,
    pub left_offset: i32,
    pub top_offset: i32,
    pub right_offset: i32,
    pub bottom_offset: i32,
}

impl Default for CustomDecoration {
    fn default() -> Self {
        Self {
            background_image: None,
            foreground_image: None,
            background_alpha: 1.0,
            foreground_alpha: 1.0,
            left_offset: 0,
            top_offset: 0,
            right_offset: 0,
            bottom_offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeskletAttributes {
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
    pub visibility: DeskletVisibility,
    pub sticky: bool,
    /// Desktop number, -1 for the current one.
    pub num_desktop: i32,
    pub locked: bool,
    pub no_input: bool,
    /// Rotation in degrees.
    pub rotation: f64,
    pub depth_rotation_y: f64,
    pub depth_rotation_x: f64,
    pub decoration: DeskletDecoration,
}

impl Default for DeskletAttributes {
    fn default() -> Self {
        Self {
            width: DEFAULT_DESKLET_SIZE,
            height: DEFAULT_DESKLET_SIZE,
            x: 0,
            y: 0,
            visibility: DeskletVisibility::Normal,
            sticky: true,
            num_desktop: -1,
            locked: false,
            no_input: false,
            rotation: 0.0,
            depth_rotation_y: 0.0,
            depth_rotation_x: 0.0,
            decoration: DeskletDecoration::Default,
        }
    }
}

impl DeskletAttributes {
    pub fn from_key_file(kf: &KeyFile) -> Self {
        let g = DESKLET_GROUP;
        let (mut width, mut height) = kf.get_size(g, "");
        if width <= 0 {
            width = DEFAULT_DESKLET_SIZE;
        }
        if height <= 0 {
            height = DEFAULT_DESKLET_SIZE;
        }

        let decoration = match kf.get_string(g, "decorations").as_deref() {
            None | Some("default") => DeskletDecoration::Default,
            Some("personnal") | Some("custom") => DeskletDecoration::Custom(CustomDecoration {
                background_image: kf.get_string(g, "bg desklet"),
                foreground_image: kf.get_string(g, "fg desklet"),
                background_alpha: kf.get_double(g, "bg alpha", 1.0),
                foreground_alpha: kf.get_double(g, "fg alpha", 1.0),
                left_offset: kf.get_int(g, "left offset", 0) as i32,
                top_offset: kf.get_int(g, "top offset", 0) as i32,
                right_offset: kf.get_int(g, "right offset", 0) as i32,
                bottom_offset: kf.get_int(g, "bottom offset", 0) as i32,
            }),
            Some(theme) => DeskletDecoration::Theme(theme.to_string()),
        };

        Self {
            width,
            height,
            x: kf.get_int(g, "x position", 0) as i32,
            y: kf.get_int(g, "y position", 0) as i32,
            visibility: DeskletVisibility::from_index(kf.get_int(g, "accessibility", 0)),
            sticky: kf.get_bool(g, "sticky", true),
            num_desktop: kf.get_int(g, "num desktop", -1) as i32,
            locked: kf.get_bool(g, "locked", false),
            no_input: kf.get_bool(g, "no input", false),
            rotation: kf.get_double(g, "rotation", 0.0),
            depth_rotation_y: kf.get_double(g, "depth rotation y", 0.0),
            depth_rotation_x: kf.get_double(g, "depth rotation x", 0.0),
            decoration,
        }
    }
}

/// Host-side settings of one applet instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MinimalAppletConfig {
    /// Requested icon size; 0 means "use the category default".
    pub icon_width: i32,
    pub icon_height: i32,
    pub label: Option<String>,
    pub icon_image: Option<String>,
    /// Position in the dock; `None` until assigned.
    pub order: Option<f64>,
    pub dock_name: Option<String>,
    pub always_visible: bool,
    pub detached: bool,
    /// Present only for modules able to live in a desklet.
    pub desklet: Option<DeskletAttributes>,
}

impl MinimalAppletConfig {
    /// Parse the `Icon` and `Desklet` groups.
    ///
    /// A module that cannot dock is always detached.
    pub fn from_key_file(kf: &KeyFile, can_dock: bool, can_desklet: bool) -> Self {
        let (icon_width, icon_height) = kf.get_size(ICON_GROUP, "icon ");
        let mut config = Self {
            icon_width,
            icon_height,
            label: kf.get_string(ICON_GROUP, "name"),
            icon_image: kf.get_string(ICON_GROUP, "icon"),
            order: kf.get_double_opt(ICON_GROUP, "order"),
            dock_name: kf.get_string(ICON_GROUP, "dock name"),
            always_visible: kf.get_bool(ICON_GROUP, "always visi", false),
            detached: false,
            desklet: None,
        };

        if can_desklet {
            config.detached = !can_dock || kf.get_bool(DESKLET_GROUP, "initially detached", false);
            config.desklet = Some(DeskletAttributes::from_key_file(kf));
        }
        config
    }
}
