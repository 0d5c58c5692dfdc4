//! Dock hide/show effects.
//!
//! The scene advances each dock's `hide_offset` between 0 (fully shown) and
//! 1 (fully hidden) on the animation clock; an effect maps that offset to the
//! transform a dock renderer applies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HidingEffect {
    #[default]
    MoveDown,
    FadeOut,
    SemiTransparent,
    ZoomOut,
    SuckUp,
    Folding,
}

/// Transform applied to a dock for a given hide offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HidingTransform {
    /// Vertical shift towards the screen edge, in pixels.
    pub y_offset: f64,
    pub alpha: f64,
    pub zoom: f64,
}

impl HidingEffect {
    pub fn from_name(name: &str) -> Self {
        match name {
            "fade out" | "fade-out" => Self::FadeOut,
            "semi transparent" | "semi-transparent" => Self::SemiTransparent,
            "zoom out" | "zoom-out" => Self::ZoomOut,
            "suck up" | "suck-up" => Self::SuckUp,
            "folding" => Self::Folding,
            _ => Self::MoveDown,
        }
    }

    pub fn transform(&self, hide_offset: f64, dock_height: f64) -> HidingTransform {
        let t = hide_offset.clamp(0.0, 1.0);
        let identity = HidingTransform {
            y_offset: 0.0,
            alpha: 1.0,
            zoom: 1.0,
        };
        match self {
            Self::MoveDown => HidingTransform {
                y_offset: dock_height * t,
                ..identity
            },
            Self::FadeOut => HidingTransform {
                alpha: 1.0 - t,
                ..identity
            },
            Self::SemiTransparent => HidingTransform {
                alpha: 1.0 - 0.75 * t,
                ..identity
            },
            Self::ZoomOut => HidingTransform {
                zoom: 1.0 - t,
                ..identity
            },
            // Shrinks faster than it fades so the dock seems pulled into the edge.
            Self::SuckUp => HidingTransform {
                zoom: (1.0 - t).powi(2),
                alpha: 1.0 - t,
                y_offset: dock_height * t * 0.5,
            },
            Self::Folding => HidingTransform {
                zoom: 1.0 - t,
                y_offset: dock_height * t,
                ..identity
            },
        }
    }

    /// Whether a hidden dock is still partly visible.
    pub fn keeps_dock_visible(&self) -> bool {
        matches!(self, Self::SemiTransparent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        for effect in [
            HidingEffect::MoveDown,
            HidingEffect::FadeOut,
            HidingEffect::SemiTransparent,
            HidingEffect::ZoomOut,
            HidingEffect::SuckUp,
            HidingEffect::Folding,
        ] {
            let shown = effect.transform(0.0, 50.0);
            assert_eq!(shown.y_offset, 0.0);
            assert_eq!(shown.alpha, 1.0);
            assert_eq!(shown.zoom, 1.0);
        }

        assert_eq!(HidingEffect::MoveDown.transform(1.0, 50.0).y_offset, 50.0);
        assert_eq!(HidingEffect::FadeOut.transform(1.0, 50.0).alpha, 0.0);
        assert_eq!(HidingEffect::SemiTransparent.transform(1.0, 50.0).alpha, 0.25);
        assert_eq!(HidingEffect::ZoomOut.transform(2.0, 50.0).zoom, 0.0);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(HidingEffect::from_name("fade out"), HidingEffect::FadeOut);
        assert_eq!(HidingEffect::from_name("unknown"), HidingEffect::MoveDown);
    }
}
