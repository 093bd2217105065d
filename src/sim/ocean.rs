//! Ocean surface
//!
//! A travelling sine wave over a fixed sea level. Everything below the surface
//! is underwater.

use std::f32::consts::TAU;
use std::time::Duration;

use glam::Vec2;

use crate::parameters::GameParameters;

/// Submersion query consumed by bombs
pub trait WaterSurface {
    fn is_underwater(&self, position: Vec2) -> bool;
}

#[derive(Debug, Clone)]
pub struct OceanSurface {
    sea_level: f32,
    wave_height: f32,
    wave_length: f32,
    wave_speed: f32,
    /// Seconds of simulated time
    time: f32,
}

impl OceanSurface {
    pub fn new(game_parameters: &GameParameters) -> Self {
        let mut ocean = Self {
            sea_level: 0.0,
            wave_height: 0.0,
            wave_length: 1.0,
            wave_speed: 0.0,
            time: 0.0,
        };
        ocean.apply_parameters(game_parameters);
        ocean
    }

    pub fn apply_parameters(&mut self, game_parameters: &GameParameters) {
        self.sea_level = game_parameters.sea_level;
        self.wave_height = game_parameters.wave_height;
        self.wave_length = game_parameters.wave_length.max(f32::EPSILON);
        self.wave_speed = game_parameters.wave_speed;
    }

    /// Move the waves to the given simulated time
    pub fn update(&mut self, now: Duration) {
        self.time = now.as_secs_f32();
    }

    /// Height of the surface at `x`
    pub fn height_at(&self, x: f32) -> f32 {
        let phase = (x - self.wave_speed * self.time) / self.wave_length * TAU;
        self.sea_level + self.wave_height * phase.sin()
    }

    /// Depth of `position` below the surface; negative above it
    #[inline]
    pub fn depth(&self, position: Vec2) -> f32 {
        self.height_at(position.x) - position.y
    }
}

impl WaterSurface for OceanSurface {
    #[inline]
    fn is_underwater(&self, position: Vec2) -> bool {
        position.y < self.height_at(position.x)
    }
}
