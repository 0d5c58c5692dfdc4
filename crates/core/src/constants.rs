//! Shared constants for the dock core

use once_cell::sync::Lazy;
use rg_dock_types::Version;
use std::time::Duration;

/// Version of the running host, checked against each module's requirement.
pub static HOST_VERSION: Lazy<Version> =
    Lazy::new(|| env!("CARGO_PKG_VERSION").parse().unwrap_or_default());

/// Host version string compared with the build stamp a module may carry.
pub const HOST_VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

/// Name of the dock applets go to when their config names none.
pub const DEFAULT_DOCK_NAME: &str = "Default";

/// Number of data slots shared by all module instances.
pub const NB_DATA_SLOTS: usize = 12;

/// Icon size used when neither the config nor the category gives one.
pub const DEFAULT_ICON_SIZE: i32 = 48;

/// Desklet edge length used when detaching at a given position.
pub const DEFAULT_DETACH_SIZE: i64 = 92;

/// Default fast animation delta. Slow callbacks run at twice this.
pub const DEFAULT_ANIMATION_DELTA_MS: u32 = 33;

/// Default slow animation interval, used by the event loop.
pub const SLOW_ANIMATION_INTERVAL: Duration =
    Duration::from_millis(2 * DEFAULT_ANIMATION_DELTA_MS as u64);

/// Ticks an icon bounces when it lands in a new dock.
pub const ATTACH_ANIMATION_STEPS: u32 = 8;

/// Size ratio of sub-docks relative to their parent.
pub const DEFAULT_SUB_DOCK_RATIO: f64 = 0.8;

/// Height of an icon reflection relative to the icon.
pub const REFLECTION_RATIO: f64 = 0.4;

/// Gap between two icons of a dock, in pixels.
pub const ICON_GAP: i32 = 4;

/// Directory under the current theme holding module config files.
pub const PLUG_INS_DIR: &str = "plug-ins";

/// Group and key of the main config file listing active modules.
pub const SYSTEM_GROUP: &str = "System";
pub const MODULES_KEY: &str = "modules";

/// Extensions of loadable module libraries.
pub const MODULE_EXTENSIONS: &[&str] = &["so", "dylib", "dll"];
