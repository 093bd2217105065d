//! Timer bomb
//!
//! Burns a slow fuse once placed; a disturbance nearby switches it to a fast
//! fuse. Submerging it defuses it, and a defused bomb can be re-lit by another
//! disturbance.

use std::time::Duration;

use glam::Vec2;

use super::{BombCore, PhysicsHandler};
use crate::consts::{
    BOMB_EXPLOSION_STEP_COUNT, BOMB_EXPLOSION_STEP_INTERVAL, TIMER_BOMB_DEFUSE_DURATION,
    TIMER_BOMB_DEFUSE_STEP_COUNT, TIMER_BOMB_DETONATION_LEAD_IN, TIMER_BOMB_FAST_FUSE_DURATION,
    TIMER_BOMB_FUSE_FRAMES_PER_FUSE_LENGTH, TIMER_BOMB_FUSE_STEP_COUNT,
    TIMER_BOMB_SLOW_FUSE_DURATION,
};
use crate::parameters::GameParameters;
use crate::render::{RenderContext, TextureFrameId, TextureGroupType};
use crate::sim::ocean::WaterSurface;
use crate::sim::types::BombType;

/// Horizontal offset of the shaking bomb during the lead-in
const SHAKE_OFFSET: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerBombState {
    SlowFuseBurning,
    FastFuseBurning,
    DetonationLeadIn,
    Exploding,
    Defusing,
    Defused,
    Expired,
}

pub struct TimerBomb {
    pub(super) core: BombCore,
    state: TimerBombState,
    next_state_transition_time_point: Duration,
    fuse_flame_frame_index: u8,
    fuse_step_counter: u8,
    exploding_step_counter: u8,
    defuse_step_counter: u8,
    detonation_lead_in_shake_frame_counter: u8,
}

impl TimerBomb {
    pub fn new(core: BombCore, now: Duration) -> Self {
        core.events().on_timer_bomb_fuse(core.id(), Some(false));

        Self {
            core,
            state: TimerBombState::SlowFuseBurning,
            next_state_transition_time_point: now + slow_fuse_step(),
            fuse_flame_frame_index: 0,
            fuse_step_counter: 0,
            exploding_step_counter: 0,
            defuse_step_counter: 0,
            detonation_lead_in_shake_frame_counter: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> TimerBombState {
        self.state
    }

    #[inline]
    pub fn fuse_step_counter(&self) -> u8 {
        self.fuse_step_counter
    }

    #[inline]
    pub fn defuse_step_counter(&self) -> u8 {
        self.defuse_step_counter
    }

    pub fn update(
        &mut self,
        now: Duration,
        game_parameters: &GameParameters,
        water: &dyn WaterSurface,
        physics: &mut dyn PhysicsHandler,
    ) -> bool {
        match self.state {
            TimerBombState::SlowFuseBurning | TimerBombState::FastFuseBurning => {
                if water.is_underwater(self.core.position()) {
                    // Submersion wins over whatever the fuse was doing
                    self.state = TimerBombState::Defusing;

                    self.core.events().on_timer_bomb_fuse(self.core.id(), None);
                    self.core.events().on_timer_bomb_defused(true, 1);

                    self.next_state_transition_time_point = now + defuse_step();
                } else if now > self.next_state_transition_time_point {
                    if self.fuse_step_counter == TIMER_BOMB_FUSE_STEP_COUNT - 1 {
                        self.state = TimerBombState::DetonationLeadIn;

                        self.core.events().on_timer_bomb_fuse(self.core.id(), None);

                        self.next_state_transition_time_point = now + TIMER_BOMB_DETONATION_LEAD_IN;
                    } else {
                        self.fuse_step_counter += 1;

                        self.next_state_transition_time_point = now
                            + if self.state == TimerBombState::SlowFuseBurning {
                                slow_fuse_step()
                            } else {
                                fast_fuse_step()
                            };
                    }
                }

                // Alternate the flame frame
                self.fuse_flame_frame_index = if self.fuse_flame_frame_index == self.fuse_step_counter {
                    self.fuse_step_counter + 1
                } else {
                    self.fuse_step_counter
                };
            }

            TimerBombState::DetonationLeadIn => {
                if now > self.next_state_transition_time_point {
                    self.state = TimerBombState::Exploding;

                    debug_assert_eq!(self.exploding_step_counter, 0);

                    // The blast must not travel with the ship
                    self.core.detach_if_attached();

                    self.core.blast(
                        explosion_progress(self.exploding_step_counter),
                        game_parameters,
                        physics,
                    );

                    self.core.events().on_bomb_explosion(
                        BombType::TimerBomb,
                        water.is_underwater(self.core.position()),
                        1,
                    );

                    self.next_state_transition_time_point = now + BOMB_EXPLOSION_STEP_INTERVAL;
                } else {
                    self.detonation_lead_in_shake_frame_counter =
                        self.detonation_lead_in_shake_frame_counter.wrapping_add(1);
                }
            }

            TimerBombState::Exploding => {
                if now > self.next_state_transition_time_point {
                    debug_assert!(self.exploding_step_counter < BOMB_EXPLOSION_STEP_COUNT);

                    if self.exploding_step_counter == BOMB_EXPLOSION_STEP_COUNT - 1 {
                        self.state = TimerBombState::Expired;
                    } else {
                        self.exploding_step_counter += 1;

                        self.core.blast(
                            explosion_progress(self.exploding_step_counter),
                            game_parameters,
                            physics,
                        );

                        self.next_state_transition_time_point = now + BOMB_EXPLOSION_STEP_INTERVAL;
                    }
                }
            }

            TimerBombState::Defusing => {
                if now > self.next_state_transition_time_point {
                    debug_assert!(self.defuse_step_counter < TIMER_BOMB_DEFUSE_STEP_COUNT);

                    if self.defuse_step_counter == TIMER_BOMB_DEFUSE_STEP_COUNT - 1 {
                        self.state = TimerBombState::Defused;
                    } else {
                        self.defuse_step_counter += 1;
                    }

                    self.next_state_transition_time_point = now + defuse_step();
                }
            }

            TimerBombState::Defused | TimerBombState::Expired => {}
        }

        self.state != TimerBombState::Expired
    }

    pub fn on_neighborhood_disturbed(&mut self, now: Duration) {
        match self.state {
            TimerBombState::SlowFuseBurning | TimerBombState::Defused => {
                if self.state == TimerBombState::Defused {
                    // Re-lit: the fuse starts over
                    self.fuse_step_counter = 0;
                    self.defuse_step_counter = 0;
                }

                self.state = TimerBombState::FastFuseBurning;

                self.core.events().on_timer_bomb_fuse(self.core.id(), Some(true));

                self.next_state_transition_time_point = now + fast_fuse_step();
            }

            _ => {}
        }
    }

    /// Silence the fuse when taken off the ship
    pub fn on_bomb_removed(&mut self) {
        if matches!(
            self.state,
            TimerBombState::SlowFuseBurning | TimerBombState::FastFuseBurning
        ) {
            self.core.events().on_timer_bomb_fuse(self.core.id(), None);
        }
    }

    pub fn upload(&self, ship_id: u32, render: &mut dyn RenderContext) {
        let position = self.core.position();
        let fuse_length_frame = TextureFrameId::new(
            TextureGroupType::TimerBomb,
            u32::from(self.fuse_step_counter / TIMER_BOMB_FUSE_FRAMES_PER_FUSE_LENGTH),
        );

        match self.state {
            TimerBombState::SlowFuseBurning | TimerBombState::FastFuseBurning => {
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(fuse_length_frame, position, 1.0, 1.0),
                );
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(
                        TextureFrameId::new(
                            TextureGroupType::TimerBombFuse,
                            u32::from(self.fuse_flame_frame_index),
                        ),
                        position,
                        1.0,
                        1.0,
                    ),
                );
            }

            TimerBombState::DetonationLeadIn => {
                let shake = if self.detonation_lead_in_shake_frame_counter % 2 == 0 {
                    -SHAKE_OFFSET
                } else {
                    SHAKE_OFFSET
                };
                let fully_burnt_frame = TextureFrameId::new(
                    TextureGroupType::TimerBomb,
                    u32::from(TIMER_BOMB_FUSE_STEP_COUNT / TIMER_BOMB_FUSE_FRAMES_PER_FUSE_LENGTH),
                );
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self
                        .core
                        .texture_at(fully_burnt_frame, position + Vec2::new(shake, 0.0), 1.0, 1.0),
                );
            }

            TimerBombState::Exploding => {
                let scale = 1.0
                    + f32::from(self.exploding_step_counter + 1) / f32::from(BOMB_EXPLOSION_STEP_COUNT);
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(
                        TextureFrameId::new(
                            TextureGroupType::TimerBombExplosion,
                            u32::from(self.exploding_step_counter),
                        ),
                        position,
                        scale,
                        1.0,
                    ),
                );
            }

            TimerBombState::Defusing => {
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(fuse_length_frame, position, 1.0, 1.0),
                );
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(
                        TextureFrameId::new(
                            TextureGroupType::TimerBombDefuse,
                            u32::from(self.defuse_step_counter),
                        ),
                        position,
                        1.0,
                        1.0,
                    ),
                );
            }

            TimerBombState::Defused => {
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(fuse_length_frame, position, 1.0, 1.0),
                );
            }

            TimerBombState::Expired => {}
        }
    }
}

fn slow_fuse_step() -> Duration {
    TIMER_BOMB_SLOW_FUSE_DURATION / u32::from(TIMER_BOMB_FUSE_STEP_COUNT)
}

fn fast_fuse_step() -> Duration {
    TIMER_BOMB_FAST_FUSE_DURATION / u32::from(TIMER_BOMB_FUSE_STEP_COUNT)
}

fn defuse_step() -> Duration {
    TIMER_BOMB_DEFUSE_DURATION / u32::from(TIMER_BOMB_DEFUSE_STEP_COUNT)
}

/// Progress of explosion step `step`, 0 for the first and 1 for the last
pub(super) fn explosion_progress(step: u8) -> f32 {
    f32::from(step) / f32::from(BOMB_EXPLOSION_STEP_COUNT - 1)
}
