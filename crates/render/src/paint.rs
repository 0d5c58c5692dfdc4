//! Drawing helpers shared by the renderers.
//!
//! Text goes through Pango rather than Cairo's toy font API, whose font
//! caches are never released.

use cairo::Context;
use pango::{FontDescription, Weight};
use pangocairo::functions::{create_layout, show_layout};
use rg_dock_core::data_renderer::{RenderInput, RendererError, Zone};
use rg_dock_types::Color;

/// Line colors used when the attributes give none.
pub const PALETTE: [Color; 4] = [
    Color { r: 0.2, g: 0.8, b: 0.3, a: 1.0 },
    Color { r: 1.0, g: 0.6, b: 0.1, a: 1.0 },
    Color { r: 0.3, g: 0.6, b: 1.0, a: 1.0 },
    Color { r: 0.9, g: 0.2, b: 0.2, a: 1.0 },
];

/// Color of value `index`: the attribute's, else the palette's.
pub fn value_color(input: &RenderInput, index: usize) -> Color {
    input
        .attributes
        .colors
        .get(index)
        .copied()
        .unwrap_or(PALETTE[index % PALETTE.len()])
}

/// Write one line of text centred in `zone`, shrunk to fit its width.
pub fn show_text_in_zone(cr: &Context, text: &str, zone: &Zone, color: &Color) -> Result<(), RendererError> {
    if text.is_empty() || zone.width <= 0.0 || zone.height <= 0.0 {
        return Ok(());
    }
    let layout = create_layout(cr);
    let mut font = FontDescription::new();
    font.set_family("Sans");
    font.set_weight(Weight::Bold);
    font.set_absolute_size((zone.height * 0.75).max(1.0) * pango::SCALE as f64);
    layout.set_font_description(Some(&font));
    layout.set_text(text);

    let (_, logical) = layout.pixel_extents();
    let (w, h) = (f64::from(logical.width()), f64::from(logical.height()));
    if w <= 0.0 || h <= 0.0 {
        return Ok(());
    }
    let scale = (zone.width / w).min(1.0);

    cr.save()?;
    cr.translate(
        zone.x + (zone.width - w * scale) / 2.0,
        zone.y + (zone.height - h * scale) / 2.0,
    );
    cr.scale(scale, scale);
    color.apply_to_cairo(cr);
    show_layout(cr, &layout);
    cr.restore()?;
    Ok(())
}

/// Paint each loaded emblem stretched over its zone.
pub fn draw_emblems(cr: &Context, input: &RenderInput) -> Result<(), RendererError> {
    for (emblem, zone) in input.emblems.iter().zip(input.emblem_zones) {
        let Some(surface) = emblem else {
            continue;
        };
        let (w, h) = (f64::from(surface.width()), f64::from(surface.height()));
        if w <= 0.0 || h <= 0.0 || zone.width <= 0.0 || zone.height <= 0.0 {
            continue;
        }
        cr.save()?;
        cr.translate(zone.x, zone.y);
        cr.scale(zone.width / w, zone.height / h);
        cr.set_source_surface(surface, 0.0, 0.0)?;
        cr.paint()?;
        cr.restore()?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::{painted, surface};
    use super::*;
    use rg_dock_core::data_renderer::DataHistory;
    use rg_dock_types::DataRendererAttributes;

    #[test]
    fn test_value_color_falls_back_to_palette() {
        let history = DataHistory::new(2, 4, None, false);
        let mut attributes = DataRendererAttributes::new("graph", 2);
        attributes.colors = vec![Color::new(0.0, 0.0, 1.0, 1.0)];
        let input = RenderInput {
            history: &history,
            attributes: &attributes,
            width: 10.0,
            height: 10.0,
            fraction: 0.0,
            emblems: &[],
            emblem_zones: &[],
            text_zones: &[],
        };
        assert_eq!(value_color(&input, 0), Color::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(value_color(&input, 1), PALETTE[1]);
    }

    #[test]
    fn test_emblem_is_stretched_over_zone() {
        let emblem = surface(4);
        {
            let cr = Context::new(&emblem).unwrap();
            cr.set_source_rgb(1.0, 0.0, 0.0);
            cr.paint().unwrap();
        }
        let history = DataHistory::new(1, 2, None, false);
        let attributes = DataRendererAttributes::new("gauge", 1);
        let emblems = [Some(emblem)];
        let zones = [Zone::new(2.0, 2.0, 8.0, 8.0)];
        let input = RenderInput {
            history: &history,
            attributes: &attributes,
            width: 16.0,
            height: 16.0,
            fraction: 0.0,
            emblems: &emblems,
            emblem_zones: &zones,
            text_zones: &[],
        };

        let mut target = surface(16);
        {
            let cr = Context::new(&target).unwrap();
            draw_emblems(&cr, &input).unwrap();
        }
        assert!(painted(&mut target));
    }

    #[test]
    fn test_empty_text_draws_nothing() {
        let mut target = surface(16);
        {
            let cr = Context::new(&target).unwrap();
            show_text_in_zone(&cr, "", &Zone::new(0.0, 0.0, 16.0, 16.0), &Color::default()).unwrap();
        }
        assert!(!painted(&mut target));
    }
}
