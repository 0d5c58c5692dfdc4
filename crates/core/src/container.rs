//! Docks and desklets, the two kinds of icon containers.

use rg_dock_types::{DeskletAttributes, DeskletDecoration};

use crate::icon::IconId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeskletId(pub u64);

/// Non-owning reference to a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerRef {
    Dock(String),
    Desklet(DeskletId),
}

impl ContainerRef {
    pub fn dock_name(&self) -> Option<&str> {
        match self {
            Self::Dock(name) => Some(name),
            Self::Desklet(_) => None,
        }
    }

    pub fn desklet_id(&self) -> Option<DeskletId> {
        match self {
            Self::Desklet(id) => Some(*id),
            Self::Dock(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenGeometry {
    pub width: i32,
    pub height: i32,
}

impl ScreenGeometry {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl Default for ScreenGeometry {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

#[derive(Debug, Clone)]
pub struct Dock {
    pub name: String,
    /// Icons sorted by their `order`.
    pub icons: Vec<IconId>,
    pub is_main: bool,
    /// Number of icons pointing at this dock as their sub-dock.
    pub ref_count: u32,
    /// Icon scale inside this dock.
    pub ratio: f64,
    pub accelerated: bool,
    pub use_reflect: bool,
    pub view_name: String,
    pub width: i32,
    pub height: i32,
    /// 0 fully shown, 1 fully hidden.
    pub hide_offset: f64,
    pub is_hiding: bool,
    pub slow_delta_ms: u32,
    pub needs_redraw: bool,
}

impl Dock {
    pub fn is_root(&self) -> bool {
        self.ref_count == 0
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Desklet {
    pub id: DeskletId,
    pub icon: Option<IconId>,
    pub attributes: DeskletAttributes,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Size the desklet asked the window manager for; (0, 0) until configured.
    pub desired_width: i32,
    pub desired_height: i32,
    pub decoration: DeskletDecoration,
    pub accelerated: bool,
    pub title: Option<String>,
    pub zoomed_out: bool,
    pub slow_delta_ms: u32,
    pub needs_redraw: bool,
}
