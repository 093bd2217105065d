//! Impact bomb: explodes as soon as anything breaks nearby

use std::time::Duration;

use super::timer::explosion_progress;
use super::{BombCore, PhysicsHandler};
use crate::consts::{BOMB_EXPLOSION_STEP_COUNT, BOMB_EXPLOSION_STEP_INTERVAL};
use crate::parameters::GameParameters;
use crate::render::{RenderContext, TextureFrameId, TextureGroupType};
use crate::sim::ocean::WaterSurface;
use crate::sim::types::BombType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactBombState {
    Idle,
    TriggeringExplosion,
    Exploding,
    Expired,
}

pub struct ImpactBomb {
    pub(super) core: BombCore,
    state: ImpactBombState,
    next_state_transition_time_point: Duration,
    exploding_step_counter: u8,
}

impl ImpactBomb {
    pub fn new(core: BombCore) -> Self {
        Self {
            core,
            state: ImpactBombState::Idle,
            next_state_transition_time_point: Duration::ZERO,
            exploding_step_counter: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> ImpactBombState {
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
            ImpactBombState::Idle => {}

            ImpactBombState::TriggeringExplosion => {
                self.state = ImpactBombState::Exploding;

                self.core.detach_if_attached();

                self.core.blast(
                    explosion_progress(self.exploding_step_counter),
                    game_parameters,
                    physics,
                );

                self.core.events().on_bomb_explosion(
                    BombType::ImpactBomb,
                    water.is_underwater(self.core.position()),
                    1,
                );

                self.next_state_transition_time_point = now + BOMB_EXPLOSION_STEP_INTERVAL;
            }

            ImpactBombState::Exploding => {
                if now > self.next_state_transition_time_point {
                    if self.exploding_step_counter == BOMB_EXPLOSION_STEP_COUNT - 1 {
                        self.state = ImpactBombState::Expired;
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

            ImpactBombState::Expired => {}
        }

        self.state != ImpactBombState::Expired
    }

    pub fn on_neighborhood_disturbed(&mut self) {
        if self.state == ImpactBombState::Idle {
            self.state = ImpactBombState::TriggeringExplosion;
        }
    }

    pub fn upload(&self, ship_id: u32, render: &mut dyn RenderContext) {
        let position = self.core.position();

        match self.state {
            ImpactBombState::Idle | ImpactBombState::TriggeringExplosion => {
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(
                        TextureFrameId::new(TextureGroupType::ImpactBomb, 0),
                        position,
                        1.0,
                        1.0,
                    ),
                );
            }

            ImpactBombState::Exploding => {
                let scale = 1.0
                    + f32::from(self.exploding_step_counter + 1) / f32::from(BOMB_EXPLOSION_STEP_COUNT);
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(
                        TextureFrameId::new(
                            TextureGroupType::ImpactBombExplosion,
                            u32::from(self.exploding_step_counter),
                        ),
                        position,
                        scale,
                        1.0,
                    ),
                );
            }

            ImpactBombState::Expired => {}
        }
    }
}
