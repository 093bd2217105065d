//! Ship Sandbox - structural and fluid simulation core for 2D soft-body ships
//!
//! Core modules:
//! - `sim`: Deterministic simulation (points, springs, water, bombs, world)
//! - `material`: Immutable material descriptions loaded from JSON
//! - `parameters`: Data-driven simulation tuning
//! - `events`: Game event sink consumed by audio/visual collaborators
//! - `render`: Render upload sink (pure reads of simulation buffers)

pub mod error;
pub mod events;
pub mod material;
pub mod parameters;
pub mod render;
pub mod sim;
pub mod vectors;

pub use error::{GameError, Result};
pub use events::{EventLog, GameEvent, GameEventHandler, SizeBucket};
pub use material::{Material, MaterialDatabase};
pub use parameters::GameParameters;

/// Simulation configuration constants
pub mod consts {
    use std::time::Duration;

    /// Fixed simulation timestep (64 Hz)
    pub const SIM_DT: f32 = 1.0 / 64.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Maximum number of springs connected to a single point
    pub const MAX_SPRINGS_PER_POINT: usize = 8;
    /// Maximum number of triangles connected to a single point
    pub const MAX_TRIANGLES_PER_POINT: usize = 8;

    /// Density of sea water (kg/m³)
    pub const WATER_DENSITY: f32 = 1000.0;

    /// Radius within which a tool click picks a point or spring
    pub const TOOL_SEARCH_RADIUS: f32 = 0.75;
    /// Bombs within this distance of a broken spring get disturbed
    pub const BOMB_NEIGHBORHOOD_RADIUS: f32 = 3.5;

    /// Timer bomb: number of discrete fuse steps (same for slow and fast fuses)
    pub const TIMER_BOMB_FUSE_STEP_COUNT: u8 = 16;
    /// Timer bomb: total slow fuse duration
    pub const TIMER_BOMB_SLOW_FUSE_DURATION: Duration = Duration::from_millis(12_000);
    /// Timer bomb: total fast fuse duration
    pub const TIMER_BOMB_FAST_FUSE_DURATION: Duration = Duration::from_millis(1_500);
    /// Timer bomb: fuse steps shown by each fuse length frame
    pub const TIMER_BOMB_FUSE_FRAMES_PER_FUSE_LENGTH: u8 = 4;
    /// Timer bomb: shaking interval between end of fuse and explosion
    pub const TIMER_BOMB_DETONATION_LEAD_IN: Duration = Duration::from_millis(1_500);
    /// Timer bomb: number of defuse steps
    pub const TIMER_BOMB_DEFUSE_STEP_COUNT: u8 = 4;
    /// Timer bomb: total defusing duration
    pub const TIMER_BOMB_DEFUSE_DURATION: Duration = Duration::from_millis(500);

    /// All bombs: number of explosion frames
    pub const BOMB_EXPLOSION_STEP_COUNT: u8 = 8;
    /// All bombs: interval between explosion frames
    pub const BOMB_EXPLOSION_STEP_INTERVAL: Duration = Duration::from_millis(200);

    /// RC bomb: interval between idle pings
    pub const RC_BOMB_SLOW_PING_INTERVAL: Duration = Duration::from_millis(1_000);
    /// RC bomb: interval between pings while leading in to detonation
    pub const RC_BOMB_FAST_PING_INTERVAL: Duration = Duration::from_millis(100);
    /// RC bomb: duration of the detonation lead-in
    pub const RC_BOMB_DETONATION_LEAD_IN: Duration = Duration::from_millis(1_000);

    /// Anti-matter bomb: pre-implosion duration
    pub const ANTI_MATTER_BOMB_PRE_IMPLOSION: Duration = Duration::from_millis(1_000);
    /// Anti-matter bomb: implosion duration
    pub const ANTI_MATTER_BOMB_IMPLOSION: Duration = Duration::from_millis(1_500);
    /// Anti-matter bomb: quiet interval between implosion and explosion
    pub const ANTI_MATTER_BOMB_PRE_EXPLOSION: Duration = Duration::from_millis(250);
    /// Anti-matter bomb: explosion duration
    pub const ANTI_MATTER_BOMB_EXPLOSION: Duration = Duration::from_millis(900);
}

/// Fraction of `interval` elapsed since `start`, clamped to [0, 1]
#[inline]
pub fn progress_between(
    start: std::time::Duration,
    now: std::time::Duration,
    interval: std::time::Duration,
) -> f32 {
    if interval.is_zero() {
        return 1.0;
    }
    let elapsed = now.saturating_sub(start);
    (elapsed.as_secs_f32() / interval.as_secs_f32()).clamp(0.0, 1.0)
}

