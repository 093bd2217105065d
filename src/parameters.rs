//! Simulation parameters
//!
//! Tunable knobs for the mechanical, water and bomb models. Persisted as JSON;
//! every field has a default so partial files load cleanly.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Game simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameParameters {
    // === Mechanics ===
    /// Gravity acceleration (m/s²)
    pub gravity: Vec2,
    /// Multiplier on spring stiffness (must stay below ~1 for stability)
    pub stiffness_adjustment: f32,
    /// Multiplier on spring damping
    pub damping_adjustment: f32,
    /// Multiplier on material strength (higher = harder to break)
    pub strength_adjustment: f32,
    /// Fraction of velocity retained per step
    pub global_damping: f32,
    /// Fraction of breaking elongation at which a spring reports stress
    pub stress_threshold: f32,

    // === Water ===
    /// Multiplier on point buoyancy
    pub buoyancy_adjustment: f32,
    /// Drag applied to submerged points (1/s)
    pub water_drag: f32,
    /// Water intake per second per metre of depth at a leaking point
    pub water_intake_adjustment: f32,
    /// Fraction of a water difference that equalizes per second across a spring
    pub water_diffusion_speed: f32,
    /// Rate at which water runs down along a spring (1/s)
    pub water_flow_rate: f32,
    /// Water spilled per second from leaking points above the surface
    pub water_spill_rate: f32,

    // === Ocean ===
    /// Height of the still sea surface
    pub sea_level: f32,
    /// Amplitude of surface waves
    pub wave_height: f32,
    /// Wave length along x
    pub wave_length: f32,
    /// Wave speed (m/s)
    pub wave_speed: f32,

    // === Bombs ===
    /// Radius of a bomb blast
    pub bomb_blast_radius: f32,
    /// Multiplier on bomb blast force
    pub bomb_blast_force_adjustment: f32,
    /// Radius of the anti-matter implosion pull
    pub anti_matter_bomb_implosion_radius: f32,
    /// Multiplier on the anti-matter implosion pull
    pub anti_matter_bomb_implosion_strength: f32,
}

impl Default for GameParameters {
    fn default() -> Self {
        Self {
            // Mechanics
            gravity: Vec2::new(0.0, -9.80),
            stiffness_adjustment: 0.5,
            damping_adjustment: 0.03,
            strength_adjustment: 1.0,
            global_damping: 0.9996,
            stress_threshold: 0.5,

            // Water
            buoyancy_adjustment: 1.0,
            water_drag: 0.3,
            water_intake_adjustment: 0.6,
            water_diffusion_speed: 2.0,
            water_flow_rate: 4.0,
            water_spill_rate: 0.5,

            // Ocean
            sea_level: 0.0,
            wave_height: 0.3,
            wave_length: 18.0,
            wave_speed: 3.0,

            // Bombs
            bomb_blast_radius: 2.5,
            bomb_blast_force_adjustment: 1.0,
            anti_matter_bomb_implosion_radius: 25.0,
            anti_matter_bomb_implosion_strength: 1.0,
        }
    }
}

impl GameParameters {
    /// Parse parameters from JSON (missing fields take defaults)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let parameters: Self = serde_json::from_str(json)?;
        log::info!("Loaded game parameters");
        Ok(parameters)
    }

    /// Load parameters from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Save parameters as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Game parameters saved to {}", path.display());
        Ok(())
    }

    /// Relative elongation beyond which a spring of the given material strength breaks
    #[inline]
    pub fn breaking_elongation(&self, material_strength: f32) -> f32 {
        material_strength * self.strength_adjustment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_takes_defaults() {
        let parameters =
            GameParameters::from_json_str(r#"{ "sea_level": -5.0, "gravity": [0.0, -3.0] }"#)
                .unwrap();
        assert_eq!(parameters.sea_level, -5.0);
        assert_eq!(parameters.gravity, Vec2::new(0.0, -3.0));
        assert_eq!(
            parameters.water_drag,
            GameParameters::default().water_drag
        );
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let result = GameParameters::from_json_str(r#"{ "sea_level": "deep" }"#);
        assert!(matches!(result, Err(GameError::Json(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let mut parameters = GameParameters::default();
        parameters.bomb_blast_radius = 7.5;
        let json = serde_json::to_string(&parameters).unwrap();
        assert_eq!(GameParameters::from_json_str(&json).unwrap(), parameters);
    }
}
