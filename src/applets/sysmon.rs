//! System monitor applet: CPU and memory usage drawn by a data renderer.

use log::{debug, warn};
use rg_dock_core::data_renderer::RendererRegistry;
use rg_dock_core::module::{Applet, AppletContext, AppletFactory, BoxedApplet};
use rg_dock_core::ContainerRef;
use rg_dock_types::{
    ContainerCapabilities, DataRendererAttributes, KeyFile, ModuleCategory, ModuleFlags, VisitCard,
};
use std::path::PathBuf;
use sysinfo::System;

pub const NAME: &str = "sysmon";

const GROUP: &str = "Configuration";
const DEFAULT_RENDERER: &str = "gauge";

/// Parsed `Configuration` group.
#[derive(Debug, Clone, PartialEq)]
pub struct SysmonConfig {
    /// Renderer model name, `gauge` or `graph`.
    pub renderer: String,
    pub show_cpu: bool,
    pub show_memory: bool,
    /// Sample every N host ticks.
    pub interval_ticks: u32,
    pub write_values: bool,
    /// Samples kept by the graph.
    pub history: usize,
    /// Smoothing between two samples, in ms.
    pub latency_ms: u32,
    pub theme_path: Option<PathBuf>,
}

impl Default for SysmonConfig {
    fn default() -> Self {
        Self {
            renderer: DEFAULT_RENDERER.to_string(),
            show_cpu: true,
            show_memory: true,
            interval_ticks: 15,
            write_values: true,
            history: 30,
            latency_ms: 500,
            theme_path: None,
        }
    }
}

impl SysmonConfig {
    /// Parse the group. Returns true when the file was amended.
    pub fn read(key_file: &mut KeyFile, renderers: &RendererRegistry) -> (Self, bool) {
        let d = Self::default();
        let mut amended = false;
        let renderer = match key_file.get_string(GROUP, "renderer") {
            Some(name) if renderers.record(&name).is_some() => name,
            other => {
                if let Some(name) = other {
                    warn!("Unknown renderer '{}', using '{}'", name, DEFAULT_RENDERER);
                }
                key_file.set_string(GROUP, "renderer", DEFAULT_RENDERER);
                amended = true;
                DEFAULT_RENDERER.to_string()
            }
        };

        let had_theme = key_file.has_key(GROUP, "theme");
        let theme_path = renderers.theme_path_from_config(&renderer, key_file, GROUP, "theme");
        amended |= !had_theme && key_file.has_key(GROUP, "theme");

        let mut config = Self {
            renderer,
            show_cpu: key_file.get_bool(GROUP, "show cpu", d.show_cpu),
            show_memory: key_file.get_bool(GROUP, "show memory", d.show_memory),
            interval_ticks: key_file
                .get_int(GROUP, "interval", i64::from(d.interval_ticks))
                .clamp(1, 10_000) as u32,
            write_values: key_file.get_bool(GROUP, "write values", d.write_values),
            history: key_file.get_int(GROUP, "history", d.history as i64).clamp(2, 1000) as usize,
            latency_ms: key_file.get_int(GROUP, "latency", i64::from(d.latency_ms)).clamp(0, 10_000) as u32,
            theme_path,
        };
        if !config.show_cpu && !config.show_memory {
            config.show_cpu = true;
        }
        (config, amended)
    }

    pub fn nb_values(&self) -> usize {
        usize::from(self.show_cpu) + usize::from(self.show_memory)
    }

    pub fn attributes(&self) -> DataRendererAttributes {
        let mut attributes = DataRendererAttributes::new(self.renderer.clone(), self.nb_values());
        attributes.memory_size = if self.renderer == "graph" { self.history } else { 2 };
        attributes.write_values = self.write_values;
        attributes.latency_ms = self.latency_ms;
        attributes.theme_path = self.theme_path.clone();
        if self.show_cpu {
            attributes.titles.push("CPU".to_string());
        }
        if self.show_memory {
            attributes.titles.push("RAM".to_string());
        }
        attributes
    }
}

/// Normalized usage sample in the order the config lists the values.
fn sample(system: &mut System, config: &SysmonConfig) -> Vec<f64> {
    let mut values = Vec::with_capacity(config.nb_values());
    if config.show_cpu {
        system.refresh_cpu_usage();
        values.push(f64::from(system.global_cpu_usage()) / 100.0);
    }
    if config.show_memory {
        system.refresh_memory();
        let total = system.total_memory();
        values.push(if total > 0 {
            system.used_memory() as f64 / total as f64
        } else {
            0.0
        });
    }
    values
}

#[derive(Default)]
struct Sysmon {
    config: Option<SysmonConfig>,
    system: Option<System>,
    ticks: u64,
}

impl Sysmon {
    fn config(&self) -> SysmonConfig {
        self.config.clone().unwrap_or_default()
    }

    fn push_sample(&mut self, ctx: &mut AppletContext) {
        let config = self.config();
        let system = self.system.get_or_insert_with(System::new);
        let values = sample(system, &config);
        if let Err(e) = ctx.push_values(&values) {
            debug!("Instance {} dropped a sample: {}", ctx.instance, e);
        }
    }
}

impl Applet for Sysmon {
    fn read_config(&mut self, key_file: &mut KeyFile, renderers: &RendererRegistry) -> bool {
        let (config, amended) = SysmonConfig::read(key_file, renderers);
        self.config = Some(config);
        amended
    }

    fn init(&mut self, ctx: &mut AppletContext) {
        if let Err(e) = ctx.attach_data_renderer(self.config().attributes()) {
            warn!("Instance {} of {} has no renderer: {}", ctx.instance, NAME, e);
            return;
        }
        self.push_sample(ctx);
    }

    fn poll(&mut self, ctx: &mut AppletContext) {
        self.ticks += 1;
        if self.ticks % u64::from(self.config().interval_ticks) == 0 {
            self.push_sample(ctx);
        }
    }

    fn reload(&mut self, ctx: &mut AppletContext, _old_container: Option<&ContainerRef>, config_changed: bool) {
        let attributes = config_changed.then(|| self.config().attributes());
        if let Err(e) = ctx.reconfigure_data_renderer(attributes) {
            warn!("Cannot reconfigure the renderer of instance {}: {}", ctx.instance, e);
        }
    }

    fn stop(&mut self, ctx: &mut AppletContext) {
        ctx.detach_data_renderer();
    }

    fn reset_config(&mut self) {
        self.config = None;
    }

    fn reset_data(&mut self) {
        self.system = None;
        self.ticks = 0;
    }
}

fn create() -> BoxedApplet {
    Box::<Sysmon>::default()
}

pub fn pre_init(card: &mut VisitCard) -> Option<AppletFactory> {
    card.name = NAME.to_string();
    card.title = Some("System monitor".to_string());
    card.module_version = env!("CARGO_PKG_VERSION").to_string();
    card.capabilities = ContainerCapabilities::CAN_DOCK | ContainerCapabilities::CAN_DESKLET;
    card.flags = ModuleFlags::MULTI_INSTANCE;
    card.category = ModuleCategory::Accessory;
    card.conf_file_name = Some(format!("{NAME}.conf"));
    card.description = "Shows CPU and memory usage as a gauge or a graph.".to_string();
    card.author = "rg-dock Contributors".to_string();
    Some(create)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderers() -> RendererRegistry {
        let mut registry = RendererRegistry::new();
        rg_dock_render::register_all(&mut registry);
        registry
    }

    #[test]
    fn test_missing_renderer_is_written_back() {
        let mut kf = KeyFile::new();
        let (config, amended) = SysmonConfig::read(&mut kf, &renderers());
        assert!(amended);
        assert_eq!(config.renderer, "gauge");
        assert_eq!(kf.get_string(GROUP, "renderer").as_deref(), Some("gauge"));
        assert_eq!(kf.get_string(GROUP, "theme").as_deref(), Some("Turbo-night-fuel"));

        let (_, amended) = SysmonConfig::read(&mut kf, &renderers());
        assert!(!amended);
    }

    #[test]
    fn test_graph_attributes() {
        let mut kf = KeyFile::new();
        kf.set_string(GROUP, "renderer", "graph");
        kf.set_bool(GROUP, "show memory", false);
        kf.set_int(GROUP, "history", 50);
        let (config, amended) = SysmonConfig::read(&mut kf, &renderers());
        assert!(!amended);
        assert!(config.theme_path.is_none());

        let attributes = config.attributes();
        assert_eq!(attributes.model_name, "graph");
        assert_eq!(attributes.nb_values, 1);
        assert_eq!(attributes.memory_size, 50);
        assert_eq!(attributes.titles, vec!["CPU".to_string()]);
    }

    #[test]
    fn test_at_least_one_value() {
        let mut kf = KeyFile::new();
        kf.set_bool(GROUP, "show cpu", false);
        kf.set_bool(GROUP, "show memory", false);
        let (config, _) = SysmonConfig::read(&mut kf, &renderers());
        assert_eq!(config.nb_values(), 1);
        assert!(config.show_cpu);
    }

    #[test]
    fn test_sample_is_normalized() {
        let mut system = System::new();
        let values = sample(&mut system, &SysmonConfig::default());
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
