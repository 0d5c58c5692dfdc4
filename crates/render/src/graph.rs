//! Graph renderer: the whole history of each value as a polyline.

use cairo::{Context, LineJoin};
use rg_dock_core::data_renderer::{
    BoxedRenderer, DataRenderer, RenderInput, RendererError, RendererLayout, Zone,
};
use rg_dock_types::{Color, DataRendererAttributes};

use crate::paint::{draw_emblems, value_color};

const BACKGROUND: Color = Color { r: 0.05, g: 0.05, b: 0.1, a: 0.75 };
const GRID: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 0.15 };
const GRID_LINES: u32 = 4;

#[derive(Debug, Default)]
pub struct Graph {
    /// Plot area inside the icon.
    plot: Zone,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn place(&mut self, width: f64, height: f64) {
        let margin = (width.min(height) * 0.06).max(1.0);
        self.plot = Zone::new(
            margin,
            margin,
            (width - 2.0 * margin).max(0.0),
            (height - 2.0 * margin).max(0.0),
        );
    }

    /// Point of sample `i` of `n` with normalized value `v`.
    fn point(&self, i: usize, n: usize, v: f64) -> (f64, f64) {
        let p = &self.plot;
        let x = p.x + p.width * i as f64 / (n.max(2) - 1) as f64;
        let y = p.y + p.height * (1.0 - v.clamp(0.0, 1.0));
        (x, y)
    }

    fn draw_background(&self, cr: &Context, width: f64, height: f64) -> Result<(), RendererError> {
        BACKGROUND.apply_to_cairo(cr);
        cr.rectangle(0.0, 0.0, width, height);
        cr.fill()?;

        let p = &self.plot;
        GRID.apply_to_cairo(cr);
        cr.set_line_width(1.0);
        for i in 0..=GRID_LINES {
            let y = p.y + p.height * f64::from(i) / f64::from(GRID_LINES);
            cr.move_to(p.x, y);
            cr.line_to(p.x + p.width, y);
        }
        cr.stroke()?;
        Ok(())
    }

    fn draw_series(&self, cr: &Context, series: &[f64], color: &Color) -> Result<(), RendererError> {
        let n = series.len();
        if n == 0 {
            return Ok(());
        }
        let (x0, y0) = self.point(0, n, series[0]);
        cr.move_to(x0, y0);
        for (i, v) in series.iter().enumerate().skip(1) {
            let (x, y) = self.point(i, n, *v);
            cr.line_to(x, y);
        }

        color.apply_to_cairo(cr);
        cr.set_line_width((self.plot.height * 0.04).max(1.0));
        cr.set_line_join(LineJoin::Round);
        cr.stroke()?;
        Ok(())
    }
}

impl DataRenderer for Graph {
    fn name(&self) -> &str {
        "graph"
    }

    fn load(
        &mut self,
        width: f64,
        height: f64,
        attributes: &DataRendererAttributes,
    ) -> Result<RendererLayout, RendererError> {
        self.place(width, height);
        let size = (self.plot.height * 0.25).min(self.plot.width / attributes.nb_values.max(1) as f64);
        let emblems = (0..attributes.nb_values)
            .map(|i| Zone::new(self.plot.x + i as f64 * size, self.plot.y, size, size))
            .collect();
        Ok(RendererLayout {
            emblems,
            text_zones: Vec::new(),
        })
    }

    // The history is drawn as is; smoothing only applies to the accelerated path.
    fn render(&self, cr: &Context, input: &RenderInput) -> Result<(), RendererError> {
        self.draw_background(cr, input.width, input.height)?;
        for i in 0..input.nb_values() {
            let series = input.history.normalized_series(i);
            self.draw_series(cr, &series, &value_color(input, i))?;
        }
        draw_emblems(cr, input)
    }

    fn reload(&mut self, width: f64, height: f64) {
        self.place(width, height);
    }
}

pub fn create() -> BoxedRenderer {
    Box::new(Graph::new())
}
