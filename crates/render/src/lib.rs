//! rg-dock-render: Cairo data renderers for rg-dock icons.
//!
//! `register_all` adds every renderer of this crate to a
//! [`RendererRegistry`] under the model name applets ask for.

pub mod gauge;
pub mod graph;
pub mod paint;

use log::debug;
use rg_dock_core::data_renderer::{RendererRecord, RendererRegistry};

pub use gauge::{Gauge, GaugeStyle};
pub use graph::Graph;

/// Directory holding gauge themes, under the share and user dirs.
pub const GAUGE_THEME_DIR: &str = "gauges";
pub const DEFAULT_GAUGE_THEME: &str = "Turbo-night-fuel";

pub fn register_all(registry: &mut RendererRegistry) {
    registry.register(
        "gauge",
        RendererRecord::new(gauge::create).with_themes(GAUGE_THEME_DIR, DEFAULT_GAUGE_THEME),
    );
    registry.register("graph", RendererRecord::new(graph::create));
    debug!("Registered data renderers: {:?}", registry.list_renderers());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all() {
        let mut registry = RendererRegistry::new();
        register_all(&mut registry);
        assert_eq!(registry.list_renderers(), vec!["gauge".to_string(), "graph".into()]);
        assert_eq!(registry.create("gauge").unwrap().name(), "gauge");
        assert_eq!(registry.create("graph").unwrap().name(), "graph");
        let gauge = registry.record("gauge").unwrap();
        assert_eq!(gauge.theme_dir.as_deref(), Some(GAUGE_THEME_DIR));
        assert!(registry.record("graph").unwrap().theme_dir.is_none());
    }
}
