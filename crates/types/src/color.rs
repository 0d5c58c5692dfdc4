//! RGBA color shared by renderer attributes and decorations.

use serde::{Deserialize, Serialize};

/// RGBA color with alpha channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
            a: a as f64 / 255.0,
        }
    }

    /// Build a color from a config list (`r;g;b[;a]`).
    ///
    /// Missing alpha defaults to opaque; fewer than three components yields `None`.
    pub fn from_components(components: &[f64]) -> Option<Self> {
        match components {
            [r, g, b] => Some(Self::new(*r, *g, *b, 1.0)),
            [r, g, b, a, ..] => Some(Self::new(*r, *g, *b, *a)),
            _ => None,
        }
    }

    pub fn to_components(&self) -> [f64; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Apply to Cairo context
    #[cfg(feature = "cairo")]
    pub fn apply_to_cairo(&self, cr: &cairo::Context) {
        cr.set_source_rgba(self.r, self.g, self.b, self.a);
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_components() {
        assert_eq!(
            Color::from_components(&[1.0, 0.5, 0.0]),
            Some(Color::new(1.0, 0.5, 0.0, 1.0))
        );
        assert_eq!(
            Color::from_components(&[1.0, 0.5, 0.0, 0.25]),
            Some(Color::new(1.0, 0.5, 0.0, 0.25))
        );
        assert_eq!(Color::from_components(&[1.0]), None);
    }
}
