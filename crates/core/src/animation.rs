//! Per-icon animation clock.
//!
//! Instead of each icon owning its own timer, every animated icon registers a
//! tick function here. The scene runs all of them once per slow animation
//! tick. An entry lives until its function returns [`TickOutcome::Stop`], its
//! icon disappears, or it is explicitly unregistered.

use crate::icon::IconId;
use crate::scene::Scene;

/// What an icon animates; at most one entry per (icon, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Smoothing between two data renderer samples.
    DataRenderer,
    /// Landing animation after the icon moved to another dock.
    Attach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// Tick function; receives the whole scene so it can redraw its icon.
pub type TickFn = fn(&mut Scene, IconId) -> TickOutcome;

#[derive(Clone, Copy)]
struct AnimationEntry {
    icon: IconId,
    kind: NotificationKind,
    tick_fn: TickFn,
}

#[derive(Default)]
pub struct AnimationClock {
    entries: Vec<AnimationEntry>,
}

impl AnimationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tick function. Registering the same (icon, kind) twice keeps
    /// a single entry.
    pub fn register(&mut self, icon: IconId, kind: NotificationKind, tick_fn: TickFn) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.icon == icon && e.kind == kind)
        {
            entry.tick_fn = tick_fn;
            return;
        }
        self.entries.push(AnimationEntry {
            icon,
            kind,
            tick_fn,
        });
    }

    pub fn unregister(&mut self, icon: IconId, kind: NotificationKind) {
        self.entries.retain(|e| !(e.icon == icon && e.kind == kind));
    }

    /// Drop every entry of an icon.
    pub fn unregister_icon(&mut self, icon: IconId) {
        self.entries.retain(|e| e.icon != icon);
    }

    pub fn is_registered(&self, icon: IconId, kind: NotificationKind) -> bool {
        self.entries.iter().any(|e| e.icon == icon && e.kind == kind)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }

    fn snapshot(&self) -> Vec<AnimationEntry> {
        self.entries.clone()
    }

    fn tick_fn(&self, icon: IconId, kind: NotificationKind) -> Option<TickFn> {
        self.entries
            .iter()
            .find(|e| e.icon == icon && e.kind == kind)
            .map(|e| e.tick_fn)
    }
}

impl Scene {
    /// Run every registered tick function once.
    ///
    /// Entries unregistered by an earlier callback of the same tick are
    /// skipped; entries added during the tick first run on the next one.
    pub(crate) fn run_animation_clock(&mut self) {
        for entry in self.clock.snapshot() {
            let Some(tick_fn) = self.clock.tick_fn(entry.icon, entry.kind) else {
                continue;
            };
            if self.icon(entry.icon).is_none() {
                log::debug!("Dropping animation of vanished {}", entry.icon);
                self.clock.unregister(entry.icon, entry.kind);
                continue;
            }
            if tick_fn(self, entry.icon) == TickOutcome::Stop {
                self.clock.unregister(entry.icon, entry.kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::IconKind;
    use crate::scene::ScreenGeometry;

    fn countdown(scene: &mut Scene, icon: IconId) -> TickOutcome {
        let Some(icon) = scene.icon_mut(icon) else {
            return TickOutcome::Stop;
        };
        icon.redraw_requests += 1;
        if icon.redraw_requests >= 3 {
            TickOutcome::Stop
        } else {
            TickOutcome::Continue
        }
    }

    fn cancel_others(scene: &mut Scene, icon: IconId) -> TickOutcome {
        let others: Vec<IconId> = scene.icons().map(|i| i.id).filter(|id| *id != icon).collect();
        for other in others {
            scene.clock.unregister_icon(other);
        }
        TickOutcome::Stop
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut clock = AnimationClock::new();
        clock.register(IconId(1), NotificationKind::DataRenderer, countdown);
        clock.register(IconId(1), NotificationKind::DataRenderer, countdown);
        clock.register(IconId(1), NotificationKind::Attach, countdown);
        assert_eq!(clock.entry_count(), 2);

        clock.unregister(IconId(1), NotificationKind::Attach);
        assert!(!clock.is_registered(IconId(1), NotificationKind::Attach));
        clock.unregister_icon(IconId(1));
        assert!(clock.is_idle());
    }

    #[test]
    fn test_entry_runs_until_stop() {
        let mut scene = Scene::new(ScreenGeometry::new(1280, 800));
        let icon = scene.create_icon(IconKind::Other, None, 0.0);
        scene.clock.register(icon, NotificationKind::Attach, countdown);

        for _ in 0..5 {
            scene.run_animation_clock();
        }
        assert_eq!(scene.icon(icon).unwrap().redraw_requests, 3);
        assert!(scene.clock.is_idle());
    }

    #[test]
    fn test_vanished_icon_entries_are_dropped() {
        let mut scene = Scene::new(ScreenGeometry::new(1280, 800));
        scene.clock.register(IconId(999), NotificationKind::Attach, countdown);
        scene.run_animation_clock();
        assert!(scene.clock.is_idle());
    }

    #[test]
    fn test_cancellation_within_a_tick() {
        let mut scene = Scene::new(ScreenGeometry::new(1280, 800));
        let first = scene.create_icon(IconKind::Other, None, 0.0);
        let second = scene.create_icon(IconKind::Other, None, 1.0);
        scene.clock.register(first, NotificationKind::Attach, cancel_others);
        scene.clock.register(second, NotificationKind::Attach, countdown);

        scene.run_animation_clock();
        assert_eq!(scene.icon(second).unwrap().redraw_requests, 0);
        assert!(scene.clock.is_idle());
    }
}
