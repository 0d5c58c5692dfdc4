//! rg-dock-core: Module lifecycle and scene model for the rg-dock desktop dock.
//!
//! This crate contains the module registry and instance manager, the
//! internal configuration categories, the scene (docks, desklets, icons)
//! and the data-renderer engine that draws value histories into icons.

pub mod animation;
pub mod constants;
pub mod container;
pub mod data_renderer;
pub mod data_slot;
pub mod hiding;
pub mod icon;
pub mod internal;
pub mod module;
pub mod scene;
pub mod texture;

pub use animation::{AnimationClock, NotificationKind, TickFn, TickOutcome};
pub use container::{ContainerRef, Desklet, DeskletId, Dock, ScreenGeometry};
pub use data_slot::{DataSlotTable, SlotError};
pub use hiding::{HidingEffect, HidingTransform};
pub use icon::{Icon, IconId, IconKind};
pub use internal::{InternalModule, InternalModuleRegistry, ReloadEffect};
pub use module::{
    Applet, AppletContext, AppletFactory, BoxedApplet, HostInfo, InstanceId, Module, ModuleError,
    ModuleInstance, ModuleManager, ModuleRegistry, PreInitFn,
};
pub use scene::{Scene, SceneSettings};
pub use texture::{TextureId, TextureStore};

// Re-export the shared types used in public signatures
pub use rg_dock_types::{KeyFile, ModuleCategory, VisitCard};
