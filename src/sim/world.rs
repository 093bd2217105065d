//! The world: ships, ocean and clock
//!
//! Single owner of the simulation. Drives every ship one fixed step at a time
//! and routes tool actions (bombs, pins, destruction) to the ships.

use std::f32::consts::TAU;
use std::rc::Rc;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::bombs::{BombToggle, NewBomb};
use super::clock::GameWallClock;
use super::connectivity::VisitSequence;
use super::ocean::{OceanSurface, WaterSurface};
use super::ship::Ship;
use super::ship_builder::{MaterialGrid, ShipBuilder};
use super::types::{BombType, ObjectId};
use crate::consts::{MAX_SUBSTEPS, SIM_DT};
use crate::events::GameEventHandler;
use crate::parameters::GameParameters;
use crate::render::RenderContext;

/// Longest frame the accumulator accepts (s)
const MAX_FRAME_DT: f32 = 0.1;

pub struct World {
    ships: Vec<Ship>,
    ocean: OceanSurface,
    clock: GameWallClock,
    visit_sequence: VisitSequence,
    game_parameters: GameParameters,
    events: Rc<dyn GameEventHandler>,
    /// Seeded; only used for cosmetic choices such as bomb orientation
    rng: Pcg32,
    next_bomb_id: ObjectId,
    accumulator: f32,
}

impl World {
    pub fn new(game_parameters: GameParameters, events: Rc<dyn GameEventHandler>, seed: u64) -> Self {
        Self {
            ships: Vec::new(),
            ocean: OceanSurface::new(&game_parameters),
            clock: GameWallClock::new(),
            visit_sequence: VisitSequence::new(),
            game_parameters,
            events,
            rng: Pcg32::seed_from_u64(seed),
            next_bomb_id: 1,
            accumulator: 0.0,
        }
    }

    /// Build a ship from a material grid and add it; returns its id
    pub fn add_ship(&mut self, grid: &MaterialGrid) -> u32 {
        let ship_id = self.ships.len() as u32;
        let mut ship = ShipBuilder::build(
            ship_id,
            grid,
            &self.game_parameters,
            Rc::clone(&self.events),
        );
        ship.detect_connected_components(&mut self.visit_sequence);

        self.ships.push(ship);
        ship_id
    }

    /// Advance by exactly one simulation step
    pub fn update(&mut self) {
        self.clock.advance(SIM_DT);
        let now = self.clock.now();

        self.ocean.update(now);

        for ship in &mut self.ships {
            ship.update(
                now,
                &self.game_parameters,
                &self.ocean,
                &mut self.visit_sequence,
            );
        }
    }

    /// Advance by a frame of `dt` seconds in fixed steps; returns the number
    /// of steps taken
    pub fn advance(&mut self, dt: f32) -> u32 {
        // Clamp to keep a long stall from turning into a burst of steps
        self.accumulator += dt.min(MAX_FRAME_DT);

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            self.update();
            self.accumulator -= SIM_DT;
            substeps += 1;
        }

        substeps
    }

    #[inline]
    pub fn now(&self) -> std::time::Duration {
        self.clock.now()
    }

    #[inline]
    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn ship(&self, ship_id: u32) -> Option<&Ship> {
        self.ships.get(ship_id as usize)
    }

    pub fn ship_mut(&mut self, ship_id: u32) -> Option<&mut Ship> {
        self.ships.get_mut(ship_id as usize)
    }

    #[inline]
    pub fn ocean(&self) -> &OceanSurface {
        &self.ocean
    }

    #[inline]
    pub fn parameters(&self) -> &GameParameters {
        &self.game_parameters
    }

    /// Swap in new parameters and recompute everything derived from them
    pub fn set_parameters(&mut self, game_parameters: GameParameters) {
        self.game_parameters = game_parameters;
        self.ocean.apply_parameters(&self.game_parameters);
        for ship in &mut self.ships {
            ship.apply_parameters(&self.game_parameters);
        }
        log::info!("Game parameters applied to {} ships", self.ships.len());
    }

    #[inline]
    pub fn is_underwater(&self, position: Vec2) -> bool {
        self.ocean.is_underwater(position)
    }

    //
    // Tools
    //

    pub fn toggle_timer_bomb_at(&mut self, position: Vec2) -> BombToggle {
        self.toggle_bomb_at(BombType::TimerBomb, position)
    }

    pub fn toggle_rc_bomb_at(&mut self, position: Vec2) -> BombToggle {
        self.toggle_bomb_at(BombType::RcBomb, position)
    }

    pub fn toggle_impact_bomb_at(&mut self, position: Vec2) -> BombToggle {
        self.toggle_bomb_at(BombType::ImpactBomb, position)
    }

    pub fn toggle_anti_matter_bomb_at(&mut self, position: Vec2) -> BombToggle {
        self.toggle_bomb_at(BombType::AntiMatterBomb, position)
    }

    /// The first ship with a bomb or a free spring near `position` gets the toggle
    fn toggle_bomb_at(&mut self, bomb_type: BombType, position: Vec2) -> BombToggle {
        let new_bomb = NewBomb {
            id: self.next_bomb_id,
            rotation_base_axis: Vec2::from_angle(self.rng.random_range(0.0..TAU)),
            now: self.clock.now(),
        };

        for ship in &mut self.ships {
            match ship.toggle_bomb_at(bomb_type, position, new_bomb, &self.ocean) {
                BombToggle::Nothing => continue,
                BombToggle::Placed(id) => {
                    self.next_bomb_id += 1;
                    return BombToggle::Placed(id);
                }
                removed => return removed,
            }
        }

        BombToggle::Nothing
    }

    pub fn detonate_rc_bombs(&mut self) {
        let now = self.clock.now();
        for ship in &mut self.ships {
            ship.detonate_rc_bombs(now);
        }
    }

    pub fn detonate_anti_matter_bombs(&mut self) {
        let now = self.clock.now();
        for ship in &mut self.ships {
            ship.detonate_anti_matter_bombs(now);
        }
    }

    /// Destroy everything within `radius`; returns the number of points destroyed
    pub fn destroy_at(&mut self, position: Vec2, radius: f32) -> u32 {
        self.ships
            .iter_mut()
            .map(|ship| ship.destroy_at(position, radius, &self.ocean))
            .sum()
    }

    /// Pin or unpin the nearest point of the first ship that has one in reach
    pub fn toggle_pin_at(&mut self, position: Vec2) -> bool {
        self.ships
            .iter_mut()
            .any(|ship| ship.toggle_pin_at(position, &self.ocean))
    }

    pub fn upload(&self, render: &mut dyn RenderContext) {
        for ship in &self.ships {
            ship.upload(render);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventLog, GameEvent};
    use crate::material::Material;
    use crate::render::CapturingRenderContext;
    use glam::Vec3;
    use std::sync::Arc;
    use std::time::Duration;

    fn wood() -> Arc<Material> {
        Arc::new(Material {
            name: "Wood".to_string(),
            mass: 500.0,
            strength: 1.0,
            stiffness: 1.0,
            structural_colour: [0x80, 0x40, 0x00],
            render_colour: Vec3::ONE,
            is_hull: false,
            is_rope: false,
            electrical_properties: None,
            sound_properties: None,
        })
    }

    /// Weightless and dry, so ships stay where they were built
    fn still_parameters() -> GameParameters {
        GameParameters {
            gravity: Vec2::ZERO,
            sea_level: -1000.0,
            wave_height: 0.0,
            ..GameParameters::default()
        }
    }

    fn world_with_block(parameters: GameParameters) -> (World, Rc<EventLog>) {
        let log = Rc::new(EventLog::new());
        let mut world = World::new(parameters, log.clone(), 42);
        let wood = wood();
        let grid = MaterialGrid::from_rows(&["#####", "#####", "#####"], |c| {
            (c == '#').then(|| Arc::clone(&wood))
        });
        assert_eq!(world.add_ship(&grid), 0);
        (world, log)
    }

    /// Midpoint of the first spring of ship 0
    fn first_spring_midpoint(world: &World) -> Vec2 {
        let ship = &world.ships()[0];
        ship.springs().midpoint(0, ship.points())
    }

    #[test]
    fn test_update_advances_clock_and_ships() {
        let (mut world, _) = world_with_block(GameParameters {
            sea_level: -1000.0,
            ..GameParameters::default()
        });
        let start_y = world.ships()[0].points().position(0).y;

        for _ in 0..64 {
            world.update();
        }

        assert!((world.now().as_secs_f32() - 1.0).abs() < 1e-3);
        assert!(world.ships()[0].points().position(0).y < start_y);
    }

    #[test]
    fn test_advance_uses_fixed_steps() {
        let (mut world, _) = world_with_block(still_parameters());

        assert_eq!(world.advance(SIM_DT * 3.5), 3);
        // The remainder carries over
        assert_eq!(world.advance(SIM_DT * 0.5), 1);
        // Long stalls are clamped
        assert_eq!(world.advance(10.0), (MAX_FRAME_DT / SIM_DT) as u32);
    }

    #[test]
    fn test_bomb_ids_only_advance_on_placement() {
        let (mut world, log) = world_with_block(still_parameters());
        let position = first_spring_midpoint(&world);

        assert_eq!(world.toggle_impact_bomb_at(Vec2::new(500.0, 500.0)), BombToggle::Nothing);
        assert_eq!(world.toggle_impact_bomb_at(position), BombToggle::Placed(1));
        assert_eq!(world.toggle_impact_bomb_at(position), BombToggle::Removed(1));
        assert_eq!(world.toggle_rc_bomb_at(position), BombToggle::Placed(2));

        assert_eq!(log.count(|e| matches!(e, GameEvent::BombPlaced { .. })), 2);
        assert_eq!(log.count(|e| matches!(e, GameEvent::BombRemoved { .. })), 1);
    }

    #[test]
    fn test_timer_bomb_blows_a_hole() {
        let (mut world, log) = world_with_block(still_parameters());
        let position = world.ships()[0].points().position(7);
        let springs_before = world.ships()[0]
            .springs()
            .iter()
            .filter(|&s| !world.ships()[0].springs().is_deleted(s))
            .count();

        assert!(matches!(world.toggle_timer_bomb_at(position), BombToggle::Placed(_)));

        // Slow fuse plus lead-in plus the whole explosion
        let mut steps = 0;
        while !world.ships()[0].bombs().is_empty() {
            world.update();
            steps += 1;
            assert!(steps < 64 * 30, "timer bomb never went off");
        }

        let ship = &world.ships()[0];
        let springs_after = ship
            .springs()
            .iter()
            .filter(|&s| !ship.springs().is_deleted(s))
            .count();
        assert!(springs_after < springs_before);
        assert!(world.now() > Duration::from_secs(12));
        assert_eq!(log.count(|e| matches!(e, GameEvent::BombExplosion { .. })), 1);
        assert!(log.count(|e| matches!(e, GameEvent::Destroy { .. })) > 0);
    }

    #[test]
    fn test_remote_detonation() {
        let (mut world, log) = world_with_block(still_parameters());
        let position = first_spring_midpoint(&world);
        assert!(matches!(world.toggle_rc_bomb_at(position), BombToggle::Placed(_)));

        world.update();
        world.detonate_rc_bombs();
        for _ in 0..(64 * 4) {
            world.update();
        }

        assert!(world.ships()[0].bombs().is_empty());
        assert_eq!(log.count(|e| matches!(e, GameEvent::BombExplosion { .. })), 1);
    }

    #[test]
    fn test_destroy_and_pin_tools() {
        let (mut world, log) = world_with_block(still_parameters());
        let position = world.ships()[0].points().position(0);

        assert!(world.toggle_pin_at(position));
        assert!(world.ships()[0].points().is_pinned(0));
        assert!(!world.toggle_pin_at(Vec2::new(500.0, 500.0)));

        assert_eq!(world.destroy_at(position, 0.1), 1);
        assert!(world.ships()[0].points().is_deleted(0));
        assert_eq!(log.count(|e| matches!(e, GameEvent::Destroy { .. })), 1);
    }

    #[test]
    fn test_set_parameters_reaches_ocean() {
        let (mut world, _) = world_with_block(still_parameters());
        assert!(!world.is_underwater(Vec2::ZERO));

        world.set_parameters(GameParameters {
            sea_level: 10.0,
            ..still_parameters()
        });

        assert!(world.is_underwater(Vec2::ZERO));
        assert_eq!(world.parameters().sea_level, 10.0);
    }

    #[test]
    fn test_upload_covers_all_ships() {
        let (mut world, _) = world_with_block(still_parameters());
        let position = first_spring_midpoint(&world);
        world.toggle_impact_bomb_at(position);

        let mut render = CapturingRenderContext::new();
        world.upload(&mut render);

        assert_eq!(render.point_count, 15);
        assert_eq!(render.generic_textures.len(), 1);
    }
}
