//! Static metadata a module publishes at load time.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::version::Version;

bitflags! {
    /// Containers a module's instances can live in.
    ///
    /// An empty set marks a pure plugin: instances get no icon at all.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ContainerCapabilities: u8 {
        const CAN_DOCK = 1 << 0;
        const CAN_DESKLET = 1 << 1;
    }
}

impl ContainerCapabilities {
    pub const IS_PLUGIN: Self = Self::empty();

    pub fn is_plugin(&self) -> bool {
        self.is_empty()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ModuleFlags: u8 {
        /// Activated automatically at startup and never listed in `System.modules`.
        const AUTO_LOAD = 1 << 0;
        /// Several instances may run side by side.
        const MULTI_INSTANCE = 1 << 1;
    }
}

/// Grouping used by the configuration UI and for default icon sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModuleCategory {
    Behavior,
    Theme,
    #[default]
    Accessory,
    Desktop,
    Controler,
    Plugin,
}

impl ModuleCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Behavior => "behavior",
            Self::Theme => "theme",
            Self::Accessory => "accessory",
            Self::Desktop => "desktop",
            Self::Controler => "controler",
            Self::Plugin => "plugin",
        }
    }
}

/// Module descriptor.
///
/// Filled once by the module's pre-init entry point, then treated as
/// read-only by the registry and the instance manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisitCard {
    /// Unique key. Derived from the library file name when left empty.
    pub name: String,
    /// Localised display title, used for alphabetical listing.
    pub title: Option<String>,
    /// Version of the module itself; also stamped into its config files.
    pub module_version: String,
    /// Minimum host version the module runs on.
    pub required_host: Version,
    /// Host version the module was built against, if recorded.
    pub host_version_on_build: Option<String>,
    pub capabilities: ContainerCapabilities,
    pub flags: ModuleFlags,
    pub category: ModuleCategory,
    /// Directory holding the module's default config and themes.
    pub share_data_dir: Option<String>,
    /// Default config file name inside `share_data_dir`; `None` for configless modules.
    pub conf_file_name: Option<String>,
    /// Directory under `<theme>/plug-ins/` holding user config files.
    pub user_data_dir: Option<String>,
    pub icon_file_path: Option<String>,
    pub description: String,
    pub author: String,
    /// Internal module this one is grouped under in the config UI.
    pub internal_module: Option<String>,
    /// Fixed desklet size, if the module imposes one.
    pub static_desklet_size: Option<(i32, i32)>,
}

impl VisitCard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module_version: "0.0.1".to_string(),
            ..Default::default()
        }
    }

    pub fn can_dock(&self) -> bool {
        self.capabilities.contains(ContainerCapabilities::CAN_DOCK)
    }

    pub fn can_desklet(&self) -> bool {
        self.capabilities.contains(ContainerCapabilities::CAN_DESKLET)
    }

    /// Modules started unconditionally: explicitly flagged ones and those
    /// attached to an internal module.
    pub fn is_auto_loaded(&self) -> bool {
        self.flags.contains(ModuleFlags::AUTO_LOAD) || self.internal_module.is_some()
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// Derive a module name from its library path.
///
/// Strips the directory, a `lib` prefix, a `cd-`/`cd_` prefix and the
/// trailing extension: `/usr/lib/dock/libcd-clock.so` gives `clock`.
pub fn module_name_from_path(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    let file = file.strip_prefix("lib").unwrap_or(file);
    let file = file
        .strip_prefix("cd-")
        .or_else(|| file.strip_prefix("cd_"))
        .unwrap_or(file);
    match file.rfind('.') {
        Some(dot) if dot > 0 => file[..dot].to_string(),
        _ => file.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name_from_path() {
        assert_eq!(module_name_from_path("/usr/lib/dock/libcd-clock.so"), "clock");
        assert_eq!(module_name_from_path("libcd_weather.so"), "weather");
        assert_eq!(module_name_from_path("/opt/plugins/dustbin.so"), "dustbin");
        assert_eq!(module_name_from_path("librss-reader.so"), "rss-reader");
        assert_eq!(module_name_from_path("plain"), "plain");
    }

    #[test]
    fn test_capabilities() {
        let mut card = VisitCard::new("clock");
        assert!(card.capabilities.is_plugin());
        card.capabilities = ContainerCapabilities::CAN_DOCK | ContainerCapabilities::CAN_DESKLET;
        assert!(card.can_dock() && card.can_desklet());
        assert!(!card.capabilities.is_plugin());
    }

    #[test]
    fn test_auto_loaded() {
        let mut card = VisitCard::new("shortcuts");
        assert!(!card.is_auto_loaded());
        card.internal_module = Some("Icons".into());
        assert!(card.is_auto_loaded());

        let mut flagged = VisitCard::new("keeper");
        flagged.flags = ModuleFlags::AUTO_LOAD;
        assert!(flagged.is_auto_loaded());
    }

    #[test]
    fn test_display_title_falls_back_to_name() {
        let mut card = VisitCard::new("clock");
        assert_eq!(card.display_title(), "clock");
        card.title = Some("Clock".into());
        assert_eq!(card.display_title(), "Clock");
    }
}
