//! Remote-controlled bomb
//!
//! Pings slowly while idle and explodes a short while after the remote
//! detonation command.

use std::time::Duration;

use super::timer::explosion_progress;
use super::{BombCore, PhysicsHandler};
use crate::consts::{
    BOMB_EXPLOSION_STEP_COUNT, BOMB_EXPLOSION_STEP_INTERVAL, RC_BOMB_DETONATION_LEAD_IN,
    RC_BOMB_FAST_PING_INTERVAL, RC_BOMB_SLOW_PING_INTERVAL,
};
use crate::parameters::GameParameters;
use crate::render::{RenderContext, TextureFrameId, TextureGroupType};
use crate::sim::ocean::WaterSurface;
use crate::sim::types::BombType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcBombState {
    IdlePingOff,
    IdlePingOn,
    DetonationLeadIn,
    Exploding,
    Expired,
}

pub struct RcBomb {
    pub(super) core: BombCore,
    state: RcBombState,
    next_state_transition_time_point: Duration,
    /// Set while leading in to detonation
    explosion_time_point: Option<Duration>,
    ping_on_step_counter: u32,
    exploding_step_counter: u8,
}

impl RcBomb {
    pub fn new(core: BombCore, now: Duration) -> Self {
        Self {
            core,
            state: RcBombState::IdlePingOff,
            next_state_transition_time_point: now + RC_BOMB_SLOW_PING_INTERVAL,
            explosion_time_point: None,
            ping_on_step_counter: 0,
            exploding_step_counter: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> RcBombState {
        self.state
    }

    pub fn update(
        &mut self,
        now: Duration,
        game_parameters: &GameParameters,
        water: &dyn WaterSurface,
        physics: &mut dyn PhysicsHandler,
    ) -> bool {
        match self.state {
            RcBombState::IdlePingOff => {
                if now > self.next_state_transition_time_point {
                    self.ping_on(water);
                    self.state = RcBombState::IdlePingOn;
                    self.next_state_transition_time_point = now + RC_BOMB_FAST_PING_INTERVAL;
                }
            }

            RcBombState::IdlePingOn => {
                if now > self.next_state_transition_time_point {
                    self.state = RcBombState::IdlePingOff;
                    self.next_state_transition_time_point = now + RC_BOMB_SLOW_PING_INTERVAL;
                }
            }

            RcBombState::DetonationLeadIn => {
                if self
                    .explosion_time_point
                    .is_some_and(|explosion_time_point| now > explosion_time_point)
                {
                    self.state = RcBombState::Exploding;

                    self.core.detach_if_attached();

                    self.core.blast(
                        explosion_progress(self.exploding_step_counter),
                        game_parameters,
                        physics,
                    );

                    self.core.events().on_bomb_explosion(
                        BombType::RcBomb,
                        water.is_underwater(self.core.position()),
                        1,
                    );

                    self.next_state_transition_time_point = now + BOMB_EXPLOSION_STEP_INTERVAL;
                } else if now > self.next_state_transition_time_point {
                    self.ping_on(water);
                    self.next_state_transition_time_point = now + RC_BOMB_FAST_PING_INTERVAL;
                }
            }

            RcBombState::Exploding => {
                if now > self.next_state_transition_time_point {
                    if self.exploding_step_counter == BOMB_EXPLOSION_STEP_COUNT - 1 {
                        self.state = RcBombState::Expired;
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

            RcBombState::Expired => {}
        }

        self.state != RcBombState::Expired
    }

    /// Remote command: start the countdown; ignored unless idle
    pub fn detonate(&mut self, now: Duration) {
        if matches!(self.state, RcBombState::IdlePingOff | RcBombState::IdlePingOn) {
            self.state = RcBombState::DetonationLeadIn;
            self.explosion_time_point = Some(now + RC_BOMB_DETONATION_LEAD_IN);
            self.next_state_transition_time_point = now;
        }
    }

    fn ping_on(&mut self, water: &dyn WaterSurface) {
        self.ping_on_step_counter = self.ping_on_step_counter.wrapping_add(1);
        self.core
            .events()
            .on_rc_bomb_ping(water.is_underwater(self.core.position()), 1);
    }

    pub fn upload(&self, ship_id: u32, render: &mut dyn RenderContext) {
        let position = self.core.position();
        let body = self
            .core
            .texture_at(TextureFrameId::new(TextureGroupType::RcBomb, 0), position, 1.0, 1.0);

        match self.state {
            RcBombState::IdlePingOff => {
                render.upload_ship_generic_texture_render_specification(ship_id, &body);
            }

            RcBombState::IdlePingOn | RcBombState::DetonationLeadIn => {
                render.upload_ship_generic_texture_render_specification(ship_id, &body);
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(
                        TextureFrameId::new(TextureGroupType::RcBombPing, self.ping_on_step_counter % 2),
                        position,
                        1.0,
                        1.0,
                    ),
                );
            }

            RcBombState::Exploding => {
                let scale = 1.0
                    + f32::from(self.exploding_step_counter + 1) / f32::from(BOMB_EXPLOSION_STEP_COUNT);
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(
                        TextureFrameId::new(
                            TextureGroupType::RcBombExplosion,
                            u32::from(self.exploding_step_counter),
                        ),
                        position,
                        scale,
                        1.0,
                    ),
                );
            }

            RcBombState::Expired => {}
        }
    }
}
