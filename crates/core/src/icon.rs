//! Icons: the unit docks and desklets display.

use cairo::ImageSurface;
use std::path::PathBuf;

use crate::data_renderer::DataRendererState;
use crate::module::InstanceId;
use crate::texture::TextureId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IconId(pub u64);

impl std::fmt::Display for IconId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "icon#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IconKind {
    Launcher { desktop_file: PathBuf },
    Separator,
    Applet,
    Other,
}

pub struct Icon {
    pub id: IconId,
    pub kind: IconKind,
    /// Label; also the name of the icon's sub-dock when it has one.
    pub name: Option<String>,
    /// Image name or path.
    pub file_name: Option<String>,
    pub order: f64,
    /// Logical size, before the container ratio is applied.
    pub width: f64,
    pub height: f64,
    pub always_visible: bool,
    pub parent_dock: Option<String>,
    pub sub_dock: Option<String>,
    pub instance: Option<InstanceId>,
    /// Pixel buffer the owner draws into.
    pub buffer: Option<ImageSurface>,
    pub texture: Option<TextureId>,
    pub reflection: Option<ImageSurface>,
    pub quick_info: Option<String>,
    pub data_renderer: Option<Box<DataRendererState>>,
    /// Remaining ticks of the landing animation.
    pub attach_steps: u32,
    /// Number of redraws requested since creation.
    pub redraw_requests: u32,
}

impl Icon {
    pub fn new(id: IconId, kind: IconKind) -> Self {
        Self {
            id,
            kind,
            name: None,
            file_name: None,
            order: 0.0,
            width: 0.0,
            height: 0.0,
            always_visible: false,
            parent_dock: None,
            sub_dock: None,
            instance: None,
            buffer: None,
            texture: None,
            reflection: None,
            quick_info: None,
            data_renderer: None,
            attach_steps: 0,
            redraw_requests: 0,
        }
    }

    pub fn is_applet(&self) -> bool {
        matches!(self.kind, IconKind::Applet)
    }

    pub fn is_launcher(&self) -> bool {
        matches!(self.kind, IconKind::Launcher { .. })
    }

    pub fn is_separator(&self) -> bool {
        matches!(self.kind, IconKind::Separator)
    }

    /// Pixel extent of the icon's buffer, (0, 0) when it has none.
    pub fn extent(&self) -> (i32, i32) {
        self.buffer
            .as_ref()
            .map(|surface| (surface.width(), surface.height()))
            .unwrap_or((0, 0))
    }
}

impl std::fmt::Debug for Icon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Icon")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("order", &self.order)
            .field("parent_dock", &self.parent_dock)
            .field("sub_dock", &self.sub_dock)
            .field("instance", &self.instance)
            .field("extent", &self.extent())
            .field("has_data_renderer", &self.data_renderer.is_some())
            .finish()
    }
}
