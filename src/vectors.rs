//! Vector math primitives
//!
//! `glam` provides the float vectors and their arithmetic; this module adds
//! the length-aware normalization the simulation needs and colour parsing.

use glam::{Vec2, Vec3};

use crate::error::{GameError, Result};

/// 2D helpers not covered by glam
pub trait Vec2Ext {
    /// Normalizes given a precomputed length; returns zero for a zero length
    fn normalise_with_length(self, length: f32) -> Vec2;
}

impl Vec2Ext for Vec2 {
    #[inline]
    fn normalise_with_length(self, length: f32) -> Vec2 {
        if length != 0.0 {
            self / length
        } else {
            Vec2::ZERO
        }
    }
}

/// Parse a `#rrggbb` (or `rrggbb`) colour into 8-bit RGB components
pub fn hex_to_rgb(hex: &str) -> Result<[u8; 3]> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(GameError::InvalidColour(hex.to_string()));
    }

    let component = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| GameError::InvalidColour(hex.to_string()))
    };

    Ok([component(0..2)?, component(2..4)?, component(4..6)?])
}

/// Convert 8-bit RGB into a normalized float colour
#[inline]
pub fn rgb_to_vec3(rgb: [u8; 3]) -> Vec3 {
    Vec3::new(rgb[0] as f32, rgb[1] as f32, rgb[2] as f32) / 255.0
}
