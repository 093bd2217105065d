//! Anti-matter bomb
//!
//! Sits contained until detonated, then pulls the whole world towards it
//! before blowing everything apart. The blast ignores connected components.

use std::time::Duration;

use super::{BombCore, PhysicsHandler};
use crate::consts::{
    ANTI_MATTER_BOMB_EXPLOSION, ANTI_MATTER_BOMB_IMPLOSION, ANTI_MATTER_BOMB_PRE_EXPLOSION,
    ANTI_MATTER_BOMB_PRE_IMPLOSION, SIM_DT,
};
use crate::parameters::GameParameters;
use crate::progress_between;
use crate::render::{RenderContext, TextureFrameId, TextureGroupType};
use crate::sim::ocean::WaterSurface;
use crate::sim::types::BombType;

/// Rotation speed of the containment cloud (radians/s)
const CLOUD_ROTATION_SPEED: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntiMatterBombState {
    Contained,
    PreImploding,
    Imploding,
    PreExploding,
    Exploding,
    Expired,
}

pub struct AntiMatterBomb {
    pub(super) core: BombCore,
    state: AntiMatterBombState,
    /// When the current state was entered
    state_start_time_point: Duration,
    cloud_rotation_angle: f32,
    current_progress: f32,
    is_notified: bool,
}

impl AntiMatterBomb {
    pub fn new(core: BombCore) -> Self {
        core.events().on_anti_matter_bomb_contained(core.id(), true);

        Self {
            core,
            state: AntiMatterBombState::Contained,
            state_start_time_point: Duration::ZERO,
            cloud_rotation_angle: 0.0,
            current_progress: 0.0,
            is_notified: false,
        }
    }

    #[inline]
    pub fn state(&self) -> AntiMatterBombState {
        self.state
    }

    pub fn update(
        &mut self,
        now: Duration,
        game_parameters: &GameParameters,
        water: &dyn WaterSurface,
        physics: &mut dyn PhysicsHandler,
    ) -> bool {
        self.cloud_rotation_angle += CLOUD_ROTATION_SPEED * SIM_DT;

        match self.state {
            AntiMatterBombState::Contained => {}

            AntiMatterBombState::PreImploding => {
                if !self.is_notified {
                    self.core.events().on_anti_matter_bomb_pre_imploding();
                    self.is_notified = true;
                }

                self.current_progress =
                    progress_between(self.state_start_time_point, now, ANTI_MATTER_BOMB_PRE_IMPLOSION);

                physics.do_anti_matter_bomb_preimplosion(
                    self.core.position(),
                    self.current_progress,
                    game_parameters,
                );

                if self.current_progress >= 1.0 {
                    self.enter(AntiMatterBombState::Imploding, now);
                }
            }

            AntiMatterBombState::Imploding => {
                if !self.is_notified {
                    self.core.events().on_anti_matter_bomb_imploding();
                    self.is_notified = true;
                }

                self.current_progress =
                    progress_between(self.state_start_time_point, now, ANTI_MATTER_BOMB_IMPLOSION);

                physics.do_anti_matter_bomb_implosion(
                    self.core.position(),
                    self.current_progress,
                    game_parameters,
                );

                if self.current_progress >= 1.0 {
                    self.enter(AntiMatterBombState::PreExploding, now);
                }
            }

            AntiMatterBombState::PreExploding => {
                self.current_progress =
                    progress_between(self.state_start_time_point, now, ANTI_MATTER_BOMB_PRE_EXPLOSION);

                if self.current_progress >= 1.0 {
                    self.core.events().on_bomb_explosion(
                        BombType::AntiMatterBomb,
                        water.is_underwater(self.core.position()),
                        1,
                    );
                    self.enter(AntiMatterBombState::Exploding, now);
                }
            }

            AntiMatterBombState::Exploding => {
                self.current_progress =
                    progress_between(self.state_start_time_point, now, ANTI_MATTER_BOMB_EXPLOSION);

                physics.do_anti_matter_bomb_explosion(
                    self.core.position(),
                    self.current_progress,
                    game_parameters,
                );

                if self.current_progress >= 1.0 {
                    self.state = AntiMatterBombState::Expired;
                }
            }

            AntiMatterBombState::Expired => {}
        }

        self.state != AntiMatterBombState::Expired
    }

    /// Release the anti-matter; ignored unless contained
    pub fn detonate(&mut self, now: Duration) {
        if self.state == AntiMatterBombState::Contained {
            // From here on the bomb stays where it was
            self.core.detach_if_attached();
            self.enter(AntiMatterBombState::PreImploding, now);
        }
    }

    pub fn on_bomb_removed(&mut self) {
        if self.state == AntiMatterBombState::Contained {
            self.core
                .events()
                .on_anti_matter_bomb_contained(self.core.id(), false);
        }
    }

    fn enter(&mut self, state: AntiMatterBombState, now: Duration) {
        self.state = state;
        self.state_start_time_point = now;
        self.current_progress = 0.0;
        self.is_notified = false;
    }

    pub fn upload(&self, ship_id: u32, render: &mut dyn RenderContext) {
        let position = self.core.position();
        let cloud_axis = glam::Vec2::from_angle(self.cloud_rotation_angle);

        let sphere = self.core.texture_at(
            TextureFrameId::new(TextureGroupType::AntiMatterBombSphere, 0),
            position,
            1.0,
            1.0,
        );
        let mut cloud = self.core.texture_at(
            TextureFrameId::new(TextureGroupType::AntiMatterBombSphereCloud, 0),
            position,
            1.0,
            1.0,
        );
        cloud.rotation_offset_axis = cloud_axis;

        match self.state {
            AntiMatterBombState::Contained => {
                render.upload_ship_generic_texture_render_specification(ship_id, &cloud);
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(
                        TextureFrameId::new(TextureGroupType::AntiMatterBombArmor, 0),
                        position,
                        1.0,
                        1.0,
                    ),
                );
            }

            AntiMatterBombState::PreImploding => {
                render.upload_ship_generic_texture_render_specification(ship_id, &sphere);
                cloud.scale = 1.0 + self.current_progress;
                render.upload_ship_generic_texture_render_specification(ship_id, &cloud);
            }

            AntiMatterBombState::Imploding => {
                cloud.scale = 2.0 - self.current_progress;
                render.upload_ship_generic_texture_render_specification(ship_id, &cloud);
            }

            AntiMatterBombState::PreExploding => {}

            AntiMatterBombState::Exploding => {
                render.upload_ship_generic_texture_render_specification(
                    ship_id,
                    &self.core.texture_at(
                        TextureFrameId::new(TextureGroupType::AntiMatterBombExplosion, 0),
                        position,
                        1.0 + 4.0 * self.current_progress,
                        1.0 - self.current_progress,
                    ),
                );
            }

            AntiMatterBombState::Expired => {}
        }
    }
}
