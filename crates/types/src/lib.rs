//! rg-dock-types: Shared data types for the rg-dock desktop dock.
//!
//! This crate contains pure data types (config files, module descriptors,
//! renderer attributes) shared by every rg-dock crate. Drawing support is
//! limited to the optional `cairo` feature on [`Color`].

pub mod color;
pub mod keyfile;
pub mod minimal_config;
pub mod renderer_attributes;
pub mod version;
pub mod visit_card;

// Re-export commonly used types at the crate root for convenience
pub use color::Color;
pub use keyfile::{KeyFile, KeyFileError};
pub use minimal_config::{
    CustomDecoration, DeskletAttributes, DeskletDecoration, DeskletVisibility,
    MinimalAppletConfig, DEFAULT_DESKLET_SIZE, DESKLET_GROUP, ICON_GROUP,
};
pub use renderer_attributes::{format_percent, DataRendererAttributes, ValueFormatter};
pub use version::{ParseVersionError, Version};
pub use visit_card::{
    module_name_from_path, ContainerCapabilities, ModuleCategory, ModuleFlags, VisitCard,
};
