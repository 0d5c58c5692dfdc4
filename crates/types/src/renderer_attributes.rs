//! Parameters an applet passes when it attaches a data renderer to its icon.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::color::Color;

/// Formats a normalized value (0..=1) of the value at `index`.
pub type ValueFormatter = fn(value: f64, index: usize) -> String;

/// Percentage with one decimal below 10 %, none above.
pub fn format_percent(value: f64, _index: usize) -> String {
    let percent = value * 100.0;
    if value < 0.0995 {
        format!("{percent:.1}%")
    } else {
        format!("{percent:.0}%")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRendererAttributes {
    /// Registered renderer name, e.g. `gauge` or `graph`.
    pub model_name: String,
    /// Number of values tracked per sample.
    pub nb_values: usize,
    /// History depth.
    pub memory_size: usize,
    /// Explicit `[min0, max0, min1, max1, ...]` ranges.
    pub min_max: Option<Vec<f64>>,
    /// Widen the range as samples arrive.
    pub update_min_max: bool,
    /// Show a textual readout of the values.
    pub write_values: bool,
    /// Smoothing duration between two samples, in ms. 0 disables smoothing.
    pub latency_ms: u32,
    pub titles: Vec<String>,
    pub text_color: Color,
    /// One optional emblem image per value.
    pub emblems: Vec<Option<PathBuf>>,
    /// Theme directory for renderers that use one.
    pub theme_path: Option<PathBuf>,
    /// Per-value colors for renderers that draw lines.
    pub colors: Vec<Color>,
    #[serde(skip)]
    pub formatter: Option<ValueFormatter>,
}

impl DataRendererAttributes {
    pub fn new(model_name: impl Into<String>, nb_values: usize) -> Self {
        Self {
            model_name: model_name.into(),
            nb_values,
            ..Default::default()
        }
    }

    pub fn format_value(&self, value: f64, index: usize) -> String {
        match self.formatter {
            Some(formatter) => formatter(value, index),
            None => format_percent(value, index),
        }
    }
}

impl Default for DataRendererAttributes {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            nb_values: 1,
            memory_size: 2,
            min_max: None,
            update_min_max: false,
            write_values: false,
            latency_ms: 0,
            titles: Vec::new(),
            text_color: Color::new(1.0, 1.0, 1.0, 1.0),
            emblems: Vec::new(),
            theme_path: None,
            colors: Vec::new(),
            formatter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.05, 0), "5.0%");
        assert_eq!(format_percent(0.5, 0), "50%");
        assert_eq!(format_percent(1.0, 0), "100%");
    }

    #[test]
    fn test_custom_formatter() {
        fn temperature(value: f64, _: usize) -> String {
            format!("{:.0}°C", value * 100.0)
        }
        let mut attrs = DataRendererAttributes::new("gauge", 1);
        assert_eq!(attrs.format_value(0.42, 0), "42%");
        attrs.formatter = Some(temperature);
        assert_eq!(attrs.format_value(0.42, 0), "42°C");
    }
}
