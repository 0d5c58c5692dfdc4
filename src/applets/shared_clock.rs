//! Shared clock: a plug-in that publishes the local time through a data slot.

use chrono::{Local, Timelike};
use log::{info, warn};
use rg_dock_core::module::{Applet, AppletContext, AppletFactory, BoxedApplet};
use rg_dock_types::{ContainerCapabilities, ModuleCategory, ModuleFlags, VisitCard};
use std::any::Any;

pub const NAME: &str = "shared-clock";

/// What other instances read from the clock's data slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedTime {
    pub hour: u32,
    pub minute: u32,
    /// `HH:MM`
    pub text: String,
}

impl SharedTime {
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            hour: now.hour(),
            minute: now.minute(),
            text: now.format("%H:%M").to_string(),
        }
    }
}

#[derive(Default)]
struct SharedClock {
    time: Option<SharedTime>,
}

impl Applet for SharedClock {
    fn init(&mut self, ctx: &mut AppletContext) {
        match ctx.reserve_data_slot() {
            Ok(slot) => info!("Shared clock publishes on data slot {}", slot),
            Err(e) => warn!("Shared clock gets no data slot: {}", e),
        }
        self.time = Some(SharedTime::now());
    }

    fn poll(&mut self, _ctx: &mut AppletContext) {
        self.time = Some(SharedTime::now());
    }

    fn stop(&mut self, ctx: &mut AppletContext) {
        ctx.release_data_slot();
    }

    fn reset_data(&mut self) {
        self.time = None;
    }

    fn shared_data(&self) -> Option<&dyn Any> {
        self.time.as_ref().map(|time| time as &dyn Any)
    }
}

fn create() -> BoxedApplet {
    Box::<SharedClock>::default()
}

pub fn pre_init(card: &mut VisitCard) -> Option<AppletFactory> {
    card.name = NAME.to_string();
    card.title = Some("Shared clock".to_string());
    card.module_version = env!("CARGO_PKG_VERSION").to_string();
    card.capabilities = ContainerCapabilities::IS_PLUGIN;
    card.flags = ModuleFlags::AUTO_LOAD;
    card.category = ModuleCategory::Plugin;
    card.description = "Publishes the local time to other applets.".to_string();
    card.author = "rg-dock Contributors".to_string();
    Some(create)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_text_matches_fields() {
        let time = SharedTime::now();
        assert_eq!(time.text, format!("{:02}:{:02}", time.hour, time.minute));
    }

    #[test]
    fn test_nothing_shared_before_init() {
        let mut clock = SharedClock::default();
        assert!(clock.shared_data().is_none());
        clock.time = Some(SharedTime::now());
        assert!(clock.shared_data().unwrap().downcast_ref::<SharedTime>().is_some());
        clock.reset_data();
        assert!(clock.shared_data().is_none());
    }
}
