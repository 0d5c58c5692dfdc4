//! Module interface: the hooks a module implements and the context the host
//! lends it while a hook runs.

use rg_dock_types::{DataRendererAttributes, KeyFile, VisitCard};
use std::any::Any;
use std::path::PathBuf;

use super::registry::ModuleRegistry;
use super::InstanceId;
use crate::container::ContainerRef;
use crate::data_renderer::{self, RendererError, RendererRegistry};
use crate::data_slot::{DataSlotTable, SlotError};
use crate::icon::IconId;
use crate::scene::Scene;

/// One running configuration of a module.
///
/// Every hook is optional; the defaults do nothing.
pub trait Applet {
    /// Read the module-specific part of the config file.
    ///
    /// The key file may be amended; return true when it must be written back.
    fn read_config(&mut self, _key_file: &mut KeyFile, _renderers: &RendererRegistry) -> bool {
        false
    }

    /// Start the instance. Not called when the icon cannot be drawn on.
    fn init(&mut self, _ctx: &mut AppletContext) {}

    fn stop(&mut self, _ctx: &mut AppletContext) {}

    /// The config or the container changed. `old_container` is where the
    /// instance lived before.
    fn reload(&mut self, _ctx: &mut AppletContext, _old_container: Option<&ContainerRef>, _config_changed: bool) {}

    /// Forget the parsed config.
    fn reset_config(&mut self) {}

    /// Forget runtime data.
    fn reset_data(&mut self) {}

    /// Fill config widgets the generic editor cannot build.
    fn load_custom_widget(&mut self, _key_file: &KeyFile) {}

    /// Write back values edited in custom widgets.
    fn save_custom_widget(&mut self, _key_file: &mut KeyFile) {}

    /// Called on every host tick.
    fn poll(&mut self, _ctx: &mut AppletContext) {}

    /// Data other instances may read through this instance's data slot.
    fn shared_data(&self) -> Option<&dyn Any> {
        None
    }
}

pub type BoxedApplet = Box<dyn Applet>;

/// Creates the applet of each new instance.
pub type AppletFactory = fn() -> BoxedApplet;

/// Entry point every module exposes. Fills the visit card and returns the
/// applet factory, or `None` to decline loading.
pub type PreInitFn = fn(&mut VisitCard) -> Option<AppletFactory>;

/// Symbol name of [`PreInitFn`] in module libraries.
pub const PRE_INIT_SYMBOL: &[u8] = b"rg_dock_module_pre_init\0";

/// Export the pre-init function of a module library.
///
/// Module libraries must be built with the same toolchain as the host.
#[macro_export]
macro_rules! declare_module {
    ($pre_init:path) => {
        #[no_mangle]
        pub fn rg_dock_module_pre_init(
            card: &mut $crate::module::VisitCard,
        ) -> Option<$crate::module::AppletFactory> {
            $pre_init(card)
        }
    };
}

/// What a hook may touch.
pub struct AppletContext<'a> {
    pub instance: InstanceId,
    pub module_name: String,
    pub conf_file: Option<PathBuf>,
    pub icon: Option<IconId>,
    pub container: Option<ContainerRef>,
    pub draw_context: Option<cairo::Context>,
    pub scene: &'a mut Scene,
    pub renderers: &'a RendererRegistry,
    pub slots: &'a mut DataSlotTable,
    pub modules: &'a ModuleRegistry,
}

impl AppletContext<'_> {
    pub fn reserve_data_slot(&mut self) -> Result<usize, SlotError> {
        self.slots.reserve(self.instance)
    }

    pub fn release_data_slot(&mut self) {
        self.slots.release(self.instance);
    }

    pub fn data_slot(&self) -> Option<usize> {
        self.slots.slot_of(self.instance)
    }

    /// Shared data of the instance holding `slot`.
    pub fn shared_data(&self, slot: usize) -> Option<&dyn Any> {
        let owner = self.slots.instance_at(slot)?;
        self.modules.find_instance(owner)?.applet()?.shared_data()
    }

    fn require_icon(&self) -> Result<IconId, RendererError> {
        self.icon.ok_or(RendererError::NoIcon)
    }

    pub fn attach_data_renderer(&mut self, attributes: DataRendererAttributes) -> Result<(), RendererError> {
        let icon = self.require_icon()?;
        data_renderer::attach(self.scene, icon, self.renderers, attributes)
    }

    pub fn reconfigure_data_renderer(
        &mut self,
        attributes: Option<DataRendererAttributes>,
    ) -> Result<(), RendererError> {
        let icon = self.require_icon()?;
        data_renderer::reconfigure(self.scene, icon, self.renderers, attributes)
    }

    pub fn push_values(&mut self, values: &[f64]) -> Result<(), RendererError> {
        let icon = self.require_icon()?;
        data_renderer::push_values(self.scene, icon, values)
    }

    pub fn detach_data_renderer(&mut self) {
        if let Some(icon) = self.icon {
            data_renderer::detach(self.scene, icon);
        }
    }

    pub fn set_quick_info(&mut self, text: Option<String>) {
        if let Some(icon) = self.icon {
            self.scene.set_quick_info(icon, text);
        }
    }

    pub fn redraw_icon(&mut self) {
        if let Some(icon) = self.icon {
            self.scene.redraw_icon(icon);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{HostInfo, Module};

    struct Gauge(u32);

    impl Applet for Gauge {
        fn shared_data(&self) -> Option<&dyn Any> {
            Some(&self.0)
        }
    }

    fn gauge() -> BoxedApplet {
        Box::new(Gauge(7))
    }

    fn gauge_pre_init(card: &mut VisitCard) -> Option<AppletFactory> {
        card.name = "gauge".into();
        card.title = Some("Gauge".into());
        Some(gauge)
    }

    crate::declare_module!(gauge_pre_init);

    #[test]
    fn test_declared_entry_point_loads_as_module() {
        let entry: PreInitFn = rg_dock_module_pre_init;
        let module = Module::from_pre_init(entry, None, &HostInfo::default()).unwrap();
        assert_eq!(module.name(), "gauge");
        assert_eq!(module.visit_card.title.as_deref(), Some("Gauge"));

        let applet = module.create_applet();
        let shared = applet.shared_data().and_then(|d| d.downcast_ref::<u32>());
        assert_eq!(shared, Some(&7));
        assert_eq!(PRE_INIT_SYMBOL, b"rg_dock_module_pre_init\0");
    }
}
