//! Data renderer state attached to an icon, and the operations driving it.
//!
//! A renderer draws either into the icon's pixel buffer (surface path) or
//! into the icon's texture (accelerated path). On the accelerated path a
//! configured latency makes each new sample slide in over several slow
//! animation ticks.

use cairo::{Context, ImageSurface, Operator};
use log::{debug, warn};
use rg_dock_types::DataRendererAttributes;
use std::fs::File;
use std::path::Path;

use super::history::DataHistory;
use super::renderer::{BoxedRenderer, RenderInput, RendererError, RendererRegistry, Zone};
use crate::animation::{NotificationKind, TickOutcome};
use crate::icon::IconId;
use crate::scene::Scene;
use crate::texture::TextureId;

/// Image of an emblem, in the backend of its container.
pub enum EmblemImage {
    Surface(ImageSurface),
    Texture(TextureId),
}

pub struct Emblem {
    pub zone: Zone,
    pub image: Option<EmblemImage>,
}

pub struct DataRendererState {
    renderer: BoxedRenderer,
    pub history: DataHistory,
    pub attributes: DataRendererAttributes,
    pub width: f64,
    pub height: f64,
    /// Remaining smoothing ticks.
    pub smooth_step: u32,
    /// Ticks the current smoothing started with.
    pub smooth_iterations: u32,
    pub emblems: Vec<Emblem>,
    pub text_zones: Vec<Zone>,
    /// Draws through the accelerated backend.
    pub accelerated: bool,
    pub frames_rendered: u64,
}

impl DataRendererState {
    pub fn renderer_name(&self) -> &str {
        self.renderer.name()
    }

    /// Share of the smoothing still to run.
    pub fn fraction(&self) -> f64 {
        if self.smooth_iterations == 0 {
            0.0
        } else {
            self.smooth_step as f64 / self.smooth_iterations as f64
        }
    }

    pub fn is_smoothing(&self) -> bool {
        self.smooth_step > 0
    }

    /// Newline-joined readout of the current values.
    pub fn format_values(&self) -> String {
        (0..self.history.nb_values())
            .map(|i| {
                self.attributes
                    .format_value(self.history.normalized_current(i), i)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Debug for DataRendererState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRendererState")
            .field("renderer", &self.renderer.name())
            .field("nb_values", &self.history.nb_values())
            .field("memory", &self.history.memory())
            .field("accelerated", &self.accelerated)
            .field("smooth_step", &self.smooth_step)
            .finish()
    }
}

fn take_state(scene: &mut Scene, id: IconId) -> Option<Box<DataRendererState>> {
    scene.icon_mut(id)?.data_renderer.take()
}

fn restore_state(scene: &mut Scene, id: IconId, state: Box<DataRendererState>) {
    if let Some(icon) = scene.icon_mut(id) {
        icon.data_renderer = Some(state);
    }
}

fn icon_size(scene: &Scene, id: IconId) -> (f64, f64) {
    let Some(icon) = scene.icon(id) else {
        return (0.0, 0.0);
    };
    match icon.extent() {
        (0, 0) => (icon.width, icon.height),
        (w, h) => (w as f64, h as f64),
    }
}

fn load_emblem(scene: &mut Scene, path: &Path, accelerated: bool) -> Option<EmblemImage> {
    let surface = File::open(path)
        .map_err(|e| e.to_string())
        .and_then(|mut file| ImageSurface::create_from_png(&mut file).map_err(|e| e.to_string()));
    let surface = match surface {
        Ok(surface) => surface,
        Err(e) => {
            warn!("Failed to load emblem {}: {}", path.display(), e);
            return None;
        }
    };
    if !accelerated {
        return Some(EmblemImage::Surface(surface));
    }
    match scene.textures.upload(&surface) {
        Ok(texture) => Some(EmblemImage::Texture(texture)),
        Err(e) => {
            warn!("Failed to upload emblem {}: {}", path.display(), e);
            None
        }
    }
}

fn release_emblems(scene: &mut Scene, state: &mut DataRendererState) {
    for emblem in &mut state.emblems {
        if let Some(EmblemImage::Texture(texture)) = emblem.image.take() {
            scene.textures.release(texture);
        }
    }
}

/// Build a renderer state for the icon, optionally carrying an old history.
fn build_state(
    scene: &mut Scene,
    id: IconId,
    registry: &RendererRegistry,
    attributes: DataRendererAttributes,
    history: Option<DataHistory>,
) -> Result<DataRendererState, RendererError> {
    let (width, height) = icon_size(scene, id);
    let mut renderer = registry.create(&attributes.model_name)?;
    let layout = renderer.load(width, height, &attributes)?;

    let history = match history {
        Some(mut history) => {
            history.resize(attributes.memory_size);
            history.set_update_min_max(attributes.update_min_max);
            history
        }
        None => DataHistory::new(
            attributes.nb_values,
            attributes.memory_size,
            attributes.min_max.as_deref(),
            attributes.update_min_max,
        ),
    };

    let accelerated = scene
        .icon_container(id)
        .is_some_and(|c| scene.container_is_accelerated(&c))
        && renderer.supports_accelerated();

    let nb_values = history.nb_values();
    let mut emblems = Vec::with_capacity(nb_values);
    for i in 0..nb_values {
        let zone = layout.emblems.get(i).copied().unwrap_or_default();
        let image = match attributes.emblems.get(i).and_then(|p| p.as_deref()) {
            Some(path) => load_emblem(scene, path, accelerated),
            None => None,
        };
        emblems.push(Emblem { zone, image });
    }
    let text_zones = (0..nb_values)
        .map(|i| layout.text_zones.get(i).copied().unwrap_or_default())
        .collect();

    Ok(DataRendererState {
        renderer,
        history,
        attributes,
        width,
        height,
        smooth_step: 0,
        smooth_iterations: 0,
        emblems,
        text_zones,
        accelerated,
        frames_rendered: 0,
    })
}

/// Attach a renderer to an icon, replacing any previous one.
pub fn attach(
    scene: &mut Scene,
    id: IconId,
    registry: &RendererRegistry,
    attributes: DataRendererAttributes,
) -> Result<(), RendererError> {
    if scene.icon(id).is_none() {
        return Err(RendererError::NoIcon);
    }
    detach(scene, id);
    let latency = attributes.latency_ms;
    let state = build_state(scene, id, registry, attributes, None)?;
    debug!(
        "Attached '{}' renderer to {} ({} values, accelerated: {})",
        state.renderer_name(),
        id,
        state.history.nb_values(),
        state.accelerated
    );
    if state.accelerated && latency > 0 {
        scene.clock.register(id, NotificationKind::DataRenderer, smoothing_tick);
    }
    restore_state(scene, id, Box::new(state));
    Ok(())
}

/// Record a new sample and draw it.
pub fn push_values(scene: &mut Scene, id: IconId, values: &[f64]) -> Result<(), RendererError> {
    let mut state = take_state(scene, id).ok_or(RendererError::NoRenderer(id))?;
    state.history.push(values);

    let result = if state.accelerated {
        let slow_delta = scene
            .icon_container(id)
            .map(|c| scene.container_slow_delta_ms(&c))
            .unwrap_or_else(|| scene.settings.slow_delta_ms().max(1));
        let steps = state.attributes.latency_ms / slow_delta;
        if steps > 0 {
            state.smooth_iterations = steps;
            state.smooth_step = steps;
            scene.clock.register(id, NotificationKind::DataRenderer, smoothing_tick);
            Ok(())
        } else {
            render_to_texture(scene, id, &mut state, 0.0)
        }
    } else {
        render_to_surface(scene, id, &mut state)
    };

    if state.attributes.write_values && !state.renderer.can_render_text() {
        let text = state.format_values();
        scene.set_quick_info(id, Some(text));
    }
    restore_state(scene, id, state);
    scene.redraw_icon(id);
    result
}

/// Change the history depth, keeping the stored samples.
pub fn resize_history(scene: &mut Scene, id: IconId, memory: usize) -> Result<(), RendererError> {
    let icon = scene.icon_mut(id).ok_or(RendererError::NoRenderer(id))?;
    let state = icon
        .data_renderer
        .as_mut()
        .ok_or(RendererError::NoRenderer(id))?;
    state.history.resize(memory);
    state.attributes.memory_size = state.history.memory();
    Ok(())
}

/// Re-layout the renderer at the icon's current size, or rebuild it with new
/// attributes. The history survives when the number of values is unchanged.
pub fn reconfigure(
    scene: &mut Scene,
    id: IconId,
    registry: &RendererRegistry,
    attributes: Option<DataRendererAttributes>,
) -> Result<(), RendererError> {
    let Some(attributes) = attributes else {
        let (width, height) = icon_size(scene, id);
        let mut state = take_state(scene, id).ok_or(RendererError::NoRenderer(id))?;
        state.renderer.reload(width, height);
        state.width = width;
        state.height = height;
        restore_state(scene, id, state);
        return refresh(scene, id);
    };

    if scene.icon(id).is_some_and(|i| i.data_renderer.is_none()) {
        return attach(scene, id, registry, attributes);
    }
    scene.clock.unregister(id, NotificationKind::DataRenderer);
    let mut old = take_state(scene, id).ok_or(RendererError::NoRenderer(id))?;
    release_emblems(scene, &mut old);

    let kept = (attributes.nb_values.max(1) == old.history.nb_values()).then(|| old.history.clone());
    debug!(
        "Reconfiguring renderer of {} ({})",
        id,
        if kept.is_some() { "history kept" } else { "cold start" }
    );
    drop(old);

    let latency = attributes.latency_ms;
    let state = build_state(scene, id, registry, attributes, kept)?;
    if state.accelerated && latency > 0 {
        scene.clock.register(id, NotificationKind::DataRenderer, smoothing_tick);
    }
    restore_state(scene, id, Box::new(state));
    refresh(scene, id)
}

/// Remove the icon's renderer. Returns whether there was one.
pub fn detach(scene: &mut Scene, id: IconId) -> bool {
    // The tick must be gone before the state it reads is.
    scene.clock.unregister(id, NotificationKind::DataRenderer);
    let Some(mut state) = take_state(scene, id) else {
        return false;
    };
    release_emblems(scene, &mut state);
    debug!("Detached '{}' renderer from {}", state.renderer_name(), id);
    true
}

/// Draw the current data again.
pub fn refresh(scene: &mut Scene, id: IconId) -> Result<(), RendererError> {
    let mut state = take_state(scene, id).ok_or(RendererError::NoRenderer(id))?;
    if state.history.is_empty() {
        restore_state(scene, id, state);
        return Ok(());
    }
    let result = if state.accelerated {
        render_to_texture(scene, id, &mut state, 0.0)
    } else {
        render_to_surface(scene, id, &mut state)
    };
    restore_state(scene, id, state);
    scene.redraw_icon(id);
    result
}

fn emblem_surfaces(scene: &Scene, state: &DataRendererState) -> Vec<Option<ImageSurface>> {
    state
        .emblems
        .iter()
        .map(|emblem| match &emblem.image {
            Some(EmblemImage::Surface(surface)) => Some(surface.clone()),
            Some(EmblemImage::Texture(texture)) => scene.textures.get(*texture).cloned(),
            None => None,
        })
        .collect()
}

fn render_to_surface(scene: &mut Scene, id: IconId, state: &mut DataRendererState) -> Result<(), RendererError> {
    let Some(buffer) = scene.icon(id).and_then(|i| i.buffer.clone()) else {
        return Ok(());
    };
    let emblems = emblem_surfaces(scene, state);
    let emblem_zones: Vec<Zone> = state.emblems.iter().map(|e| e.zone).collect();
    {
        let cr = Context::new(&buffer)?;
        cr.set_operator(Operator::Source);
        cr.set_source_rgba(0.0, 0.0, 0.0, 0.0);
        cr.paint()?;
        cr.set_operator(Operator::Over);

        let input = RenderInput {
            history: &state.history,
            attributes: &state.attributes,
            width: buffer.width() as f64,
            height: buffer.height() as f64,
            fraction: 0.0,
            emblems: &emblems,
            emblem_zones: &emblem_zones,
            text_zones: &state.text_zones,
        };
        cr.save()?;
        state.renderer.render(&cr, &input)?;
        cr.restore()?;
    }
    buffer.flush();
    state.frames_rendered += 1;

    if let Some(container) = scene.icon_container(id) {
        if scene.container_uses_reflect(&container) {
            scene.add_reflection(id);
        }
        if scene.container_is_accelerated(&container) {
            scene.update_icon_texture(id);
        }
    }
    Ok(())
}

fn render_to_texture(
    scene: &mut Scene,
    id: IconId,
    state: &mut DataRendererState,
    fraction: f64,
) -> Result<(), RendererError> {
    let Some(existing) = scene.icon(id).map(|i| i.texture) else {
        return Ok(());
    };
    let texture = match existing {
        Some(texture) => texture,
        None => {
            let (width, height) = icon_size(scene, id);
            let texture = scene
                .textures
                .allocate(width.round() as i32, height.round() as i32)?;
            if let Some(icon) = scene.icon_mut(id) {
                icon.texture = Some(texture);
            }
            texture
        }
    };
    let Some(target) = scene.textures.get(texture).cloned() else {
        return Ok(());
    };
    let emblems = emblem_surfaces(scene, state);
    let emblem_zones: Vec<Zone> = state.emblems.iter().map(|e| e.zone).collect();
    let input = RenderInput {
        history: &state.history,
        attributes: &state.attributes,
        width: target.width() as f64,
        height: target.height() as f64,
        fraction,
        emblems: &emblems,
        emblem_zones: &emblem_zones,
        text_zones: &state.text_zones,
    };
    state.renderer.render_accelerated(&target, &input)?;
    target.flush();
    state.frames_rendered += 1;
    Ok(())
}

/// Slow animation tick of a smoothing renderer.
fn smoothing_tick(scene: &mut Scene, id: IconId) -> TickOutcome {
    let Some(mut state) = take_state(scene, id) else {
        return TickOutcome::Stop;
    };
    if state.smooth_step == 0 {
        restore_state(scene, id, state);
        return TickOutcome::Stop;
    }
    state.smooth_step -= 1;
    let fraction = state.fraction();
    if let Err(e) = render_to_texture(scene, id, &mut state, fraction) {
        warn!("Failed to render smoothing frame of {}: {}", id, e);
    }
    let outcome = if state.smooth_step > 0 {
        TickOutcome::Continue
    } else {
        TickOutcome::Stop
    };
    restore_state(scene, id, state);
    scene.redraw_icon(id);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ContainerRef, ScreenGeometry};
    use crate::data_renderer::{DataRenderer, RendererLayout, RendererRecord};
    use crate::icon::IconKind;
    use rg_dock_types::{format_percent, MinimalAppletConfig};

    struct Bars;

    impl DataRenderer for Bars {
        fn name(&self) -> &str {
            "bars"
        }

        fn load(
            &mut self,
            width: f64,
            height: f64,
            attributes: &DataRendererAttributes,
        ) -> Result<RendererLayout, RendererError> {
            let zone = Zone::new(0.0, 0.0, width, height / attributes.nb_values.max(1) as f64);
            Ok(RendererLayout {
                emblems: vec![zone; attributes.nb_values],
                text_zones: Vec::new(),
            })
        }

        fn render(&self, cr: &Context, input: &RenderInput) -> Result<(), RendererError> {
            for i in 0..input.nb_values() {
                cr.rectangle(0.0, 0.0, input.width * input.value(i), input.height);
            }
            cr.set_source_rgb(1.0, 1.0, 1.0);
            cr.fill()?;
            Ok(())
        }

        fn supports_accelerated(&self) -> bool {
            true
        }
    }

    fn bars() -> BoxedRenderer {
        Box::new(Bars)
    }

    fn registry() -> RendererRegistry {
        let mut registry = RendererRegistry::new();
        registry.register("bars", RendererRecord::new(bars));
        registry
    }

    fn scene_with_icon(accelerated: bool) -> (Scene, IconId) {
        let mut scene = Scene::new(ScreenGeometry::new(1024, 768));
        scene.settings.accelerated = accelerated;
        scene.create_dock("Default");
        let config = MinimalAppletConfig {
            icon_width: 32,
            icon_height: 32,
            ..Default::default()
        };
        let icon = scene.create_icon_for_applet(
            &config,
            &ContainerRef::Dock("Default".into()),
            crate::module::InstanceId(1),
        );
        scene.insert_icon_in_dock(icon, "Default", true, false);
        (scene, icon)
    }

    fn state(scene: &Scene, icon: IconId) -> &DataRendererState {
        scene.icon(icon).unwrap().data_renderer.as_deref().unwrap()
    }

    #[test]
    fn test_surface_path_draws_and_writes_quick_info() {
        let (mut scene, icon) = scene_with_icon(false);
        let mut attributes = DataRendererAttributes::new("bars", 2);
        attributes.write_values = true;
        attributes.formatter = Some(format_percent);
        attach(&mut scene, icon, &registry(), attributes).unwrap();
        assert!(!state(&scene, icon).accelerated);

        push_values(&mut scene, icon, &[0.5, 0.05]).unwrap();
        assert_eq!(state(&scene, icon).frames_rendered, 1);
        assert_eq!(scene.icon(icon).unwrap().quick_info.as_deref(), Some("50%\n5.0%"));
        assert!(scene.clock.is_idle());
    }

    #[test]
    fn test_latency_smooths_over_ticks() {
        let (mut scene, icon) = scene_with_icon(true);
        let mut attributes = DataRendererAttributes::new("bars", 1);
        attributes.latency_ms = 3 * scene.settings.slow_delta_ms();
        attach(&mut scene, icon, &registry(), attributes).unwrap();
        assert!(state(&scene, icon).accelerated);

        push_values(&mut scene, icon, &[0.8]).unwrap();
        assert_eq!(state(&scene, icon).smooth_iterations, 3);
        assert!(scene.clock.is_registered(icon, NotificationKind::DataRenderer));

        scene.tick();
        assert!((state(&scene, icon).fraction() - 2.0 / 3.0).abs() < 1e-9);
        scene.tick();
        scene.tick();
        assert_eq!(state(&scene, icon).smooth_step, 0);
        assert_eq!(state(&scene, icon).frames_rendered, 3);
        assert!(!scene.clock.is_registered(icon, NotificationKind::DataRenderer));
    }

    #[test]
    fn test_accelerated_without_latency_renders_at_once() {
        let (mut scene, icon) = scene_with_icon(true);
        attach(&mut scene, icon, &registry(), DataRendererAttributes::new("bars", 1)).unwrap();
        push_values(&mut scene, icon, &[0.3]).unwrap();
        assert_eq!(state(&scene, icon).frames_rendered, 1);
        assert!(scene.clock.is_idle());
    }

    #[test]
    fn test_reconfigure_keeps_history_for_same_value_count() {
        let (mut scene, icon) = scene_with_icon(false);
        let registry = registry();
        attach(&mut scene, icon, &registry, DataRendererAttributes::new("bars", 1)).unwrap();
        push_values(&mut scene, icon, &[0.4]).unwrap();

        let mut same = DataRendererAttributes::new("bars", 1);
        same.memory_size = 10;
        reconfigure(&mut scene, icon, &registry, Some(same)).unwrap();
        assert_eq!(state(&scene, icon).history.current_value(0), 0.4);
        assert_eq!(state(&scene, icon).history.memory(), 10);

        reconfigure(&mut scene, icon, &registry, Some(DataRendererAttributes::new("bars", 2))).unwrap();
        let history = &state(&scene, icon).history;
        assert!(history.is_empty());
        assert_eq!(history.nb_values(), 2);
        assert!(history.memory() >= 2);
    }

    #[test]
    fn test_reconfigure_takes_new_range_tracking() {
        let (mut scene, icon) = scene_with_icon(false);
        let registry = registry();
        attach(&mut scene, icon, &registry, DataRendererAttributes::new("bars", 1)).unwrap();
        push_values(&mut scene, icon, &[0.5]).unwrap();
        assert!(!state(&scene, icon).history.updates_min_max());

        let mut tracking = DataRendererAttributes::new("bars", 1);
        tracking.update_min_max = true;
        reconfigure(&mut scene, icon, &registry, Some(tracking)).unwrap();
        let history = &state(&scene, icon).history;
        assert!(history.updates_min_max());
        assert_eq!(history.current_value(0), 0.5);

        push_values(&mut scene, icon, &[5.0]).unwrap();
        assert_eq!(state(&scene, icon).history.min_max(0), (0.0, 5.0));
    }

    #[test]
    fn test_detach_cancels_smoothing_first() {
        let (mut scene, icon) = scene_with_icon(true);
        let mut attributes = DataRendererAttributes::new("bars", 1);
        attributes.latency_ms = 10 * scene.settings.slow_delta_ms();
        attach(&mut scene, icon, &registry(), attributes).unwrap();
        push_values(&mut scene, icon, &[0.9]).unwrap();
        scene.tick();

        assert!(detach(&mut scene, icon));
        assert!(!scene.clock.is_registered(icon, NotificationKind::DataRenderer));
        assert!(scene.icon(icon).unwrap().data_renderer.is_none());
        scene.tick();
        assert!(!detach(&mut scene, icon));
    }

    #[test]
    fn test_unknown_renderer_and_missing_state() {
        let (mut scene, icon) = scene_with_icon(false);
        assert!(matches!(
            attach(&mut scene, icon, &registry(), DataRendererAttributes::new("pie", 1)),
            Err(RendererError::UnknownRenderer(_))
        ));
        assert!(matches!(
            push_values(&mut scene, icon, &[1.0]),
            Err(RendererError::NoRenderer(_))
        ));
        let other = scene.create_icon(IconKind::Other, None, 0.0);
        assert!(resize_history(&mut scene, other, 4).is_err());
    }
}
