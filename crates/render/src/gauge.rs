//! Gauge renderer: one needle per value over a circular dial.

use cairo::{Context, LineCap};
use log::debug;
use rg_dock_core::data_renderer::{
    BoxedRenderer, DataRenderer, RenderInput, RendererError, RendererLayout, Zone,
};
use rg_dock_types::{Color, DataRendererAttributes, KeyFile};
use std::f64::consts::PI;
use std::path::Path;

use crate::paint::{draw_emblems, show_text_in_zone, value_color};

/// File describing a gauge theme, inside the theme directory.
pub const THEME_FILE: &str = "theme.conf";
const THEME_GROUP: &str = "Gauge";

/// Look of the dial, read from a theme.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeStyle {
    /// Angle of the zero mark, in degrees clockwise from 3 o'clock.
    pub start_angle: f64,
    /// Angle covered from zero to full scale.
    pub sweep: f64,
    pub dial_color: Color,
    pub scale_color: Color,
    pub needle_color: Color,
    /// Needle thickness relative to the radius.
    pub needle_width: f64,
    pub nb_ticks: u32,
}

impl Default for GaugeStyle {
    fn default() -> Self {
        Self {
            start_angle: 135.0,
            sweep: 270.0,
            dial_color: Color::new(0.1, 0.1, 0.15, 0.85),
            scale_color: Color::new(0.8, 0.8, 0.8, 1.0),
            needle_color: Color::new(0.9, 0.2, 0.2, 1.0),
            needle_width: 0.06,
            nb_ticks: 10,
        }
    }
}

impl GaugeStyle {
    /// Read a theme directory. A directory without a theme file keeps the
    /// default look.
    pub fn from_theme(dir: &Path) -> Result<Self, RendererError> {
        let path = dir.join(THEME_FILE);
        if !path.exists() {
            debug!("No {} in {}, using the default dial", THEME_FILE, dir.display());
            return Ok(Self::default());
        }
        let key_file = KeyFile::load(&path).map_err(|e| RendererError::Theme {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let d = Self::default();
        let color = |key: &str, default: Color| {
            key_file
                .get_double_list(THEME_GROUP, key)
                .and_then(|c| Color::from_components(&c))
                .unwrap_or(default)
        };
        Ok(Self {
            start_angle: key_file.get_double(THEME_GROUP, "start angle", d.start_angle),
            sweep: key_file.get_double(THEME_GROUP, "sweep", d.sweep).clamp(1.0, 360.0),
            dial_color: color("dial color", d.dial_color),
            scale_color: color("scale color", d.scale_color),
            needle_color: color("needle color", d.needle_color),
            needle_width: key_file
                .get_double(THEME_GROUP, "needle width", d.needle_width)
                .clamp(0.01, 0.3),
            nb_ticks: key_file.get_int(THEME_GROUP, "ticks", i64::from(d.nb_ticks)).clamp(0, 100) as u32,
        })
    }

    /// Needle angle in radians for a normalized value.
    pub fn angle_of(&self, value: f64) -> f64 {
        (self.start_angle + value.clamp(0.0, 1.0) * self.sweep).to_radians()
    }
}

#[derive(Debug, Default)]
pub struct Gauge {
    style: GaugeStyle,
    center: (f64, f64),
    radius: f64,
    write_values: bool,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style(&self) -> &GaugeStyle {
        &self.style
    }

    fn place(&mut self, width: f64, height: f64) {
        self.center = (width / 2.0, height / 2.0);
        self.radius = (width.min(height) / 2.0 * 0.95).max(0.0);
    }

    fn layout(&self, nb_values: usize) -> RendererLayout {
        let (cx, cy) = self.center;
        let r = self.radius;
        let n = nb_values.max(1) as f64;

        let emblem_size = r * 0.35;
        let emblems = (0..nb_values)
            .map(|i| {
                let x = cx - n * emblem_size / 2.0 + i as f64 * emblem_size;
                Zone::new(x, cy + r * 0.5, emblem_size, emblem_size)
            })
            .collect();

        let text_height = r * 0.3 / n.sqrt();
        let text_zones = (0..nb_values)
            .map(|i| Zone::new(cx - r * 0.6, cy + r * 0.1 + i as f64 * text_height, r * 1.2, text_height))
            .collect();

        RendererLayout { emblems, text_zones }
    }

    fn draw_dial(&self, cr: &Context) -> Result<(), RendererError> {
        let (cx, cy) = self.center;
        let r = self.radius;
        let style = &self.style;

        style.dial_color.apply_to_cairo(cr);
        cr.arc(cx, cy, r, 0.0, 2.0 * PI);
        cr.fill()?;

        style.scale_color.apply_to_cairo(cr);
        cr.set_line_width((r * 0.04).max(1.0));
        cr.arc(cx, cy, r * 0.85, style.angle_of(0.0), style.angle_of(1.0));
        cr.stroke()?;

        if style.nb_ticks > 0 {
            for i in 0..=style.nb_ticks {
                let angle = style.angle_of(f64::from(i) / f64::from(style.nb_ticks));
                let (sin, cos) = angle.sin_cos();
                cr.move_to(cx + cos * r * 0.75, cy + sin * r * 0.75);
                cr.line_to(cx + cos * r * 0.85, cy + sin * r * 0.85);
            }
            cr.stroke()?;
        }
        Ok(())
    }

    fn draw_needle(&self, cr: &Context, value: f64, color: &Color) -> Result<(), RendererError> {
        let (cx, cy) = self.center;
        let r = self.radius;
        let (sin, cos) = self.style.angle_of(value).sin_cos();
        color.apply_to_cairo(cr);
        cr.set_line_width((r * self.style.needle_width).max(1.0));
        cr.set_line_cap(LineCap::Round);
        cr.move_to(cx, cy);
        cr.line_to(cx + cos * r * 0.8, cy + sin * r * 0.8);
        cr.stroke()?;
        Ok(())
    }
}

impl DataRenderer for Gauge {
    fn name(&self) -> &str {
        "gauge"
    }

    fn load(
        &mut self,
        width: f64,
        height: f64,
        attributes: &DataRendererAttributes,
    ) -> Result<RendererLayout, RendererError> {
        self.style = match &attributes.theme_path {
            Some(dir) => GaugeStyle::from_theme(dir)?,
            None => GaugeStyle::default(),
        };
        self.write_values = attributes.write_values;
        self.place(width, height);
        Ok(self.layout(attributes.nb_values))
    }

    fn render(&self, cr: &Context, input: &RenderInput) -> Result<(), RendererError> {
        if self.radius <= 0.0 {
            return Ok(());
        }
        self.draw_dial(cr)?;
        draw_emblems(cr, input)?;

        for i in 0..input.nb_values() {
            let color = if input.attributes.colors.is_empty() {
                self.style.needle_color
            } else {
                value_color(input, i)
            };
            self.draw_needle(cr, input.value(i), &color)?;
        }

        let (cx, cy) = self.center;
        self.style.scale_color.apply_to_cairo(cr);
        cr.arc(cx, cy, self.radius * 0.08, 0.0, 2.0 * PI);
        cr.fill()?;

        if self.write_values {
            for (i, zone) in input.text_zones.iter().enumerate().take(input.nb_values()) {
                let text = input.attributes.format_value(input.value(i), i);
                show_text_in_zone(cr, &text, zone, &input.attributes.text_color)?;
            }
        }
        Ok(())
    }

    fn supports_accelerated(&self) -> bool {
        true
    }

    fn reload(&mut self, width: f64, height: f64) {
        self.place(width, height);
    }

    fn can_render_text(&self) -> bool {
        self.write_values
    }
}

pub fn create() -> BoxedRenderer {
    Box::new(Gauge::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::test_support::{painted, surface};
    use rg_dock_core::data_renderer::DataHistory;

    fn input<'a>(
        history: &'a DataHistory,
        attributes: &'a DataRendererAttributes,
        layout: &'a RendererLayout,
        size: f64,
    ) -> RenderInput<'a> {
        RenderInput {
            history,
            attributes,
            width: size,
            height: size,
            fraction: 0.0,
            emblems: &[],
            emblem_zones: &layout.emblems,
            text_zones: &layout.text_zones,
        }
    }

    #[test]
    fn test_layout_has_one_zone_per_value() {
        let mut gauge = Gauge::new();
        let attributes = DataRendererAttributes::new("gauge", 3);
        let layout = gauge.load(64.0, 64.0, &attributes).unwrap();
        assert_eq!(layout.emblems.len(), 3);
        assert_eq!(layout.text_zones.len(), 3);
        for zone in layout.emblems.iter().chain(&layout.text_zones) {
            assert!(zone.x >= 0.0 && zone.y >= 0.0);
            assert!(zone.x + zone.width <= 64.0 && zone.y + zone.height <= 64.0);
        }
        assert!(!gauge.can_render_text());
        assert!(gauge.supports_accelerated());
    }

    #[test]
    fn test_writes_its_own_values_when_asked() {
        let mut gauge = Gauge::new();
        let mut attributes = DataRendererAttributes::new("gauge", 1);
        attributes.write_values = true;
        gauge.load(48.0, 48.0, &attributes).unwrap();
        assert!(gauge.can_render_text());
    }

    #[test]
    fn test_needle_follows_value() {
        let style = GaugeStyle::default();
        assert!((style.angle_of(0.0) - 135f64.to_radians()).abs() < 1e-9);
        assert!((style.angle_of(1.0) - 405f64.to_radians()).abs() < 1e-9);
        assert_eq!(style.angle_of(2.0), style.angle_of(1.0));
    }

    #[test]
    fn test_render_draws_dial() {
        let mut gauge = Gauge::new();
        let attributes = DataRendererAttributes::new("gauge", 1);
        let layout = gauge.load(32.0, 32.0, &attributes).unwrap();
        let mut history = DataHistory::new(1, 2, None, false);
        history.push(&[0.5]);

        let mut target = surface(32);
        {
            let cr = Context::new(&target).unwrap();
            gauge.render(&cr, &input(&history, &attributes, &layout, 32.0)).unwrap();
        }
        assert!(painted(&mut target));
    }

    #[test]
    fn test_theme_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut kf = KeyFile::new();
        kf.set_double("Gauge", "start angle", 180.0);
        kf.set_double("Gauge", "sweep", 180.0);
        kf.set_string("Gauge", "needle color", "0;0;1");
        kf.save(&dir.path().join(THEME_FILE)).unwrap();

        let mut gauge = Gauge::new();
        let mut attributes = DataRendererAttributes::new("gauge", 1);
        attributes.theme_path = Some(dir.path().to_path_buf());
        gauge.load(48.0, 48.0, &attributes).unwrap();
        assert_eq!(gauge.style().start_angle, 180.0);
        assert_eq!(gauge.style().needle_color, Color::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(gauge.style().nb_ticks, 10);

        let empty = tempfile::tempdir().unwrap();
        assert_eq!(GaugeStyle::from_theme(empty.path()).unwrap(), GaugeStyle::default());

        std::fs::write(empty.path().join(THEME_FILE), b"{ not json").unwrap();
        assert!(matches!(
            GaugeStyle::from_theme(empty.path()),
            Err(RendererError::Theme { .. })
        ));
    }
}
