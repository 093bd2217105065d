//! Bombs
//!
//! Every bomb is attached to a spring when placed and owns a small state
//! machine ticked once per simulation step. Bombs never touch the mechanical
//! model directly: explosions go through the `PhysicsHandler` the ship passes
//! to `update`.

mod anti_matter;
mod impact;
mod rc;
mod timer;

pub use anti_matter::{AntiMatterBomb, AntiMatterBombState};
pub use impact::{ImpactBomb, ImpactBombState};
pub use rc::{RcBomb, RcBombState};
pub use timer::{TimerBomb, TimerBombState};

use std::rc::Rc;
use std::time::Duration;

use glam::Vec2;

use super::ocean::WaterSurface;
use super::points::Points;
use super::springs::Springs;
use super::types::{BombType, ConnectedComponentId, ElementIndex, NONE_CONNECTED_COMPONENT_ID, ObjectId};
use crate::consts::{BOMB_NEIGHBORHOOD_RADIUS, TOOL_SEARCH_RADIUS};
use crate::events::GameEventHandler;
use crate::parameters::GameParameters;
use crate::render::{GenericTextureRenderSpecification, RenderContext, TextureFrameId};

/// Channel through which bombs inject forces into the mechanical model
pub trait PhysicsHandler {
    /// Apply one step of a blast; `progress` runs from 0 (first step) to 1 (last)
    fn do_bomb_explosion(
        &mut self,
        blast_position: Vec2,
        progress: f32,
        connected_component_id: ConnectedComponentId,
        game_parameters: &GameParameters,
    );

    fn do_anti_matter_bomb_preimplosion(
        &mut self,
        center_position: Vec2,
        progress: f32,
        game_parameters: &GameParameters,
    );

    fn do_anti_matter_bomb_implosion(
        &mut self,
        center_position: Vec2,
        progress: f32,
        game_parameters: &GameParameters,
    );

    fn do_anti_matter_bomb_explosion(
        &mut self,
        center_position: Vec2,
        progress: f32,
        game_parameters: &GameParameters,
    );
}

/// State shared by all bomb types
pub struct BombCore {
    id: ObjectId,
    bomb_type: BombType,
    /// Spring the bomb is attached to; `None` once detached
    spring_index: Option<ElementIndex>,
    /// Endpoints of the spring last ridden; outlive the attachment
    anchor_points: [ElementIndex; 2],
    position: Vec2,
    /// Re-read from the anchors every step; `None` once both are gone
    connected_component_id: Option<ConnectedComponentId>,
    rotation_base_axis: Vec2,
    rotation_offset_axis: Vec2,
    events: Rc<dyn GameEventHandler>,
}

impl BombCore {
    pub fn new(
        id: ObjectId,
        bomb_type: BombType,
        spring_index: ElementIndex,
        rotation_base_axis: Vec2,
        events: Rc<dyn GameEventHandler>,
        points: &Points,
        springs: &Springs,
    ) -> Self {
        let mut core = Self {
            id,
            bomb_type,
            spring_index: Some(spring_index),
            anchor_points: springs.endpoints(spring_index),
            position: Vec2::ZERO,
            connected_component_id: None,
            rotation_base_axis,
            rotation_offset_axis: rotation_base_axis,
            events,
        };
        core.refresh(points, springs);
        core
    }

    /// Follow the attached spring; detached bombs stay where they are but keep
    /// tracking the component of whatever is left of their anchor points
    pub fn refresh(&mut self, points: &Points, springs: &Springs) {
        if let Some(spring_index) = self.spring_index {
            let [a, b] = springs.endpoints(spring_index);
            self.anchor_points = [a, b];
            self.position = springs.midpoint(spring_index, points);

            let direction = (points.position(b) - points.position(a)).normalize_or_zero();
            if direction != Vec2::ZERO {
                self.rotation_offset_axis = direction;
            }
        }

        // Component ids are renumbered on every detection pass
        self.connected_component_id = self
            .anchor_points
            .iter()
            .copied()
            .find(|&p| !points.is_deleted(p))
            .map(|p| points.connected_component_id(p));
    }

    /// Apply one blast step to the bomb's component; a bomb whose anchor points
    /// are all destroyed has nothing left to hit
    pub fn blast(
        &self,
        progress: f32,
        game_parameters: &GameParameters,
        physics: &mut dyn PhysicsHandler,
    ) {
        if let Some(connected_component_id) = self.connected_component_id {
            physics.do_bomb_explosion(
                self.position,
                progress,
                connected_component_id,
                game_parameters,
            );
        }
    }

    /// Let go of the spring; returns whether the bomb was attached
    pub fn detach_if_attached(&mut self) -> bool {
        self.spring_index.take().is_some()
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn bomb_type(&self) -> BombType {
        self.bomb_type
    }

    #[inline]
    pub fn spring_index(&self) -> Option<ElementIndex> {
        self.spring_index
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn connected_component_id(&self) -> Option<ConnectedComponentId> {
        self.connected_component_id
    }

    #[inline]
    pub fn anchor_points(&self) -> [ElementIndex; 2] {
        self.anchor_points
    }

    #[inline]
    pub fn events(&self) -> &dyn GameEventHandler {
        self.events.as_ref()
    }

    /// Texture quad at the bomb's position and orientation
    pub fn texture_at(
        &self,
        frame_id: TextureFrameId,
        position: Vec2,
        scale: f32,
        alpha: f32,
    ) -> GenericTextureRenderSpecification {
        GenericTextureRenderSpecification {
            connected_component_id: self
                .connected_component_id
                .unwrap_or(NONE_CONNECTED_COMPONENT_ID),
            frame_id,
            position,
            scale,
            rotation_base_axis: self.rotation_base_axis,
            rotation_offset_axis: self.rotation_offset_axis,
            alpha,
        }
    }
}

/// A bomb of any type
pub enum Bomb {
    Timer(TimerBomb),
    Rc(RcBomb),
    Impact(ImpactBomb),
    AntiMatter(AntiMatterBomb),
}

impl Bomb {
    pub fn core(&self) -> &BombCore {
        match self {
            Bomb::Timer(b) => &b.core,
            Bomb::Rc(b) => &b.core,
            Bomb::Impact(b) => &b.core,
            Bomb::AntiMatter(b) => &b.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut BombCore {
        match self {
            Bomb::Timer(b) => &mut b.core,
            Bomb::Rc(b) => &mut b.core,
            Bomb::Impact(b) => &mut b.core,
            Bomb::AntiMatter(b) => &mut b.core,
        }
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.core().id()
    }

    #[inline]
    pub fn bomb_type(&self) -> BombType {
        self.core().bomb_type()
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.core().position()
    }

    /// Tick the state machine; returns false once the bomb has expired
    pub fn update(
        &mut self,
        now: Duration,
        game_parameters: &GameParameters,
        water: &dyn WaterSurface,
        physics: &mut dyn PhysicsHandler,
    ) -> bool {
        match self {
            Bomb::Timer(b) => b.update(now, game_parameters, water, physics),
            Bomb::Rc(b) => b.update(now, game_parameters, water, physics),
            Bomb::Impact(b) => b.update(now, game_parameters, water, physics),
            Bomb::AntiMatter(b) => b.update(now, game_parameters, water, physics),
        }
    }

    /// Something broke nearby
    pub fn on_neighborhood_disturbed(&mut self, now: Duration) {
        match self {
            Bomb::Timer(b) => b.on_neighborhood_disturbed(now),
            Bomb::Rc(_) => {}
            Bomb::Impact(b) => b.on_neighborhood_disturbed(),
            Bomb::AntiMatter(_) => {}
        }
    }

    /// The bomb is being taken off the ship by the user
    pub fn on_bomb_removed(&mut self, water: &dyn WaterSurface) {
        let core = self.core();
        core.events().on_bomb_removed(
            core.id(),
            core.bomb_type(),
            Some(water.is_underwater(core.position())),
        );

        match self {
            Bomb::Timer(b) => b.on_bomb_removed(),
            Bomb::AntiMatter(b) => b.on_bomb_removed(),
            Bomb::Rc(_) | Bomb::Impact(_) => {}
        }
    }

    pub fn upload(&self, ship_id: u32, render: &mut dyn RenderContext) {
        match self {
            Bomb::Timer(b) => b.upload(ship_id, render),
            Bomb::Rc(b) => b.upload(ship_id, render),
            Bomb::Impact(b) => b.upload(ship_id, render),
            Bomb::AntiMatter(b) => b.upload(ship_id, render),
        }
    }
}

/// What a toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BombToggle {
    Placed(ObjectId),
    Removed(ObjectId),
    Nothing,
}

/// Identity and orientation of a bomb about to be placed
#[derive(Debug, Clone, Copy)]
pub struct NewBomb {
    pub id: ObjectId,
    pub rotation_base_axis: Vec2,
    pub now: Duration,
}

/// The bombs of one ship
#[derive(Default)]
pub struct Bombs {
    bombs: Vec<Bomb>,
}

impl Bombs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bombs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bombs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bomb> {
        self.bombs.iter()
    }

    pub fn get(&self, id: ObjectId) -> Option<&Bomb> {
        self.bombs.iter().find(|b| b.id() == id)
    }

    /// Remove the bomb nearest to `position`, or else place a new one on the
    /// nearest free spring
    #[allow(clippy::too_many_arguments)]
    pub fn toggle_bomb_at(
        &mut self,
        bomb_type: BombType,
        position: Vec2,
        new_bomb: NewBomb,
        points: &Points,
        springs: &Springs,
        water: &dyn WaterSurface,
        events: &Rc<dyn GameEventHandler>,
    ) -> BombToggle {
        let search_radius_squared = TOOL_SEARCH_RADIUS * TOOL_SEARCH_RADIUS;

        // Removal takes precedence
        let nearest_bomb = self
            .bombs
            .iter()
            .enumerate()
            .map(|(i, b)| (i, b.position().distance_squared(position)))
            .filter(|&(_, d)| d < search_radius_squared)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);

        if let Some(i) = nearest_bomb {
            let mut bomb = self.bombs.remove(i);
            bomb.on_bomb_removed(water);
            log::debug!("Removed {} bomb {}", bomb.bomb_type().as_str(), bomb.id());
            return BombToggle::Removed(bomb.id());
        }

        let nearest_spring = springs
            .iter()
            .filter(|&s| !springs.is_deleted(s))
            .filter(|&s| !self.bombs.iter().any(|b| b.core().spring_index() == Some(s)))
            .map(|s| (s, springs.midpoint(s, points).distance_squared(position)))
            .filter(|&(_, d)| d < search_radius_squared)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, _)| s);

        let Some(spring_index) = nearest_spring else {
            return BombToggle::Nothing;
        };

        let core = BombCore::new(
            new_bomb.id,
            bomb_type,
            spring_index,
            new_bomb.rotation_base_axis,
            Rc::clone(events),
            points,
            springs,
        );

        events.on_bomb_placed(new_bomb.id, bomb_type, water.is_underwater(core.position()));

        let bomb = match bomb_type {
            BombType::TimerBomb => Bomb::Timer(TimerBomb::new(core, new_bomb.now)),
            BombType::RcBomb => Bomb::Rc(RcBomb::new(core, new_bomb.now)),
            BombType::ImpactBomb => Bomb::Impact(ImpactBomb::new(core)),
            BombType::AntiMatterBomb => Bomb::AntiMatter(AntiMatterBomb::new(core)),
        };

        log::debug!(
            "Placed {} bomb {} on spring {}",
            bomb_type.as_str(),
            new_bomb.id,
            spring_index
        );
        self.bombs.push(bomb);
        BombToggle::Placed(new_bomb.id)
    }

    pub fn detonate_rc_bombs(&mut self, now: Duration) {
        for bomb in &mut self.bombs {
            if let Bomb::Rc(rc_bomb) = bomb {
                rc_bomb.detonate(now);
            }
        }
    }

    pub fn detonate_anti_matter_bombs(&mut self, now: Duration) {
        for bomb in &mut self.bombs {
            if let Bomb::AntiMatter(anti_matter_bomb) = bomb {
                anti_matter_bomb.detonate(now);
            }
        }
    }

    /// A spring broke: free the bomb riding on it and disturb the neighbourhood
    pub fn on_spring_destroyed(&mut self, spring_index: ElementIndex, spring_midpoint: Vec2, now: Duration) {
        let neighborhood_radius_squared = BOMB_NEIGHBORHOOD_RADIUS * BOMB_NEIGHBORHOOD_RADIUS;

        for bomb in &mut self.bombs {
            if bomb.core().spring_index() == Some(spring_index) {
                bomb.core_mut().detach_if_attached();
            }

            if bomb.position().distance_squared(spring_midpoint) < neighborhood_radius_squared {
                bomb.on_neighborhood_disturbed(now);
            }
        }
    }

    /// Move attached bombs along with their springs
    pub fn refresh(&mut self, points: &Points, springs: &Springs) {
        for bomb in &mut self.bombs {
            bomb.core_mut().refresh(points, springs);
        }
    }

    /// Tick every bomb, dropping the expired ones
    pub fn update(
        &mut self,
        now: Duration,
        game_parameters: &GameParameters,
        water: &dyn WaterSurface,
        physics: &mut dyn PhysicsHandler,
    ) {
        self.bombs.retain_mut(|bomb| {
            let is_alive = bomb.update(now, game_parameters, water, physics);
            if !is_alive {
                log::debug!("{} bomb {} expired", bomb.bomb_type().as_str(), bomb.id());
            }
            is_alive
        });
    }

    pub fn upload(&self, ship_id: u32, render: &mut dyn RenderContext) {
        for bomb in &self.bombs {
            bomb.upload(ship_id, render);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::events::EventLog;
    use crate::material::Material;
    use crate::sim::types::NONE_ELEMENT_INDEX;
    use glam::Vec3;
    use std::cell::Cell;
    use std::sync::Arc;

    /// Water surface whose answer the test controls
    #[derive(Default)]
    pub struct StubWater {
        pub is_underwater: Cell<bool>,
    }

    impl WaterSurface for StubWater {
        fn is_underwater(&self, _position: Vec2) -> bool {
            self.is_underwater.get()
        }
    }

    /// Physics handler that records every call
    #[derive(Debug, Default)]
    pub struct RecordingPhysics {
        pub explosions: Vec<(Vec2, f32, ConnectedComponentId)>,
        pub preimplosions: Vec<f32>,
        pub implosions: Vec<f32>,
        pub anti_matter_explosions: Vec<f32>,
    }

    impl PhysicsHandler for RecordingPhysics {
        fn do_bomb_explosion(
            &mut self,
            blast_position: Vec2,
            progress: f32,
            connected_component_id: ConnectedComponentId,
            _game_parameters: &GameParameters,
        ) {
            self.explosions
                .push((blast_position, progress, connected_component_id));
        }

        fn do_anti_matter_bomb_preimplosion(&mut self, _: Vec2, progress: f32, _: &GameParameters) {
            self.preimplosions.push(progress);
        }

        fn do_anti_matter_bomb_implosion(&mut self, _: Vec2, progress: f32, _: &GameParameters) {
            self.implosions.push(progress);
        }

        fn do_anti_matter_bomb_explosion(&mut self, _: Vec2, progress: f32, _: &GameParameters) {
            self.anti_matter_explosions.push(progress);
        }
    }

    /// Two points, one spring, and a core attached to it
    pub fn attached_core(bomb_type: BombType, log: &Rc<EventLog>) -> (BombCore, Points, Springs) {
        let material = Arc::new(Material {
            name: "Test".to_string(),
            mass: 1.0,
            strength: 1.0,
            stiffness: 1.0,
            structural_colour: [0, 0, 0],
            render_colour: Vec3::ONE,
            is_hull: false,
            is_rope: false,
            electrical_properties: None,
            sound_properties: None,
        });

        let mut points = Points::new(2);
        for x in [0.0, 2.0] {
            points.add(
                Vec2::new(x, 0.0),
                Arc::clone(&material),
                false,
                false,
                NONE_ELEMENT_INDEX,
                1.0,
                Vec3::ONE,
                Vec2::ZERO,
            );
        }
        points.set_connected_component_id(0, 1);
        points.set_connected_component_id(1, 1);

        let mut springs = Springs::new(1);
        let spring_index = springs.add(0, 1, material, &mut points, &GameParameters::default());

        let events: Rc<dyn GameEventHandler> = log.clone();
        let core = BombCore::new(7, bomb_type, spring_index, Vec2::X, events, &points, &springs);
        (core, points, springs)
    }

    /// Advance `now` just past the next scheduled transition and tick
    pub fn tick_after(
        bomb: &mut Bomb,
        now: &mut Duration,
        step: Duration,
        water: &StubWater,
        physics: &mut RecordingPhysics,
    ) -> bool {
        *now += step + Duration::from_millis(1);
        bomb.update(*now, &GameParameters::default(), water, physics)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::events::{EventLog, GameEvent};

    #[test]
    fn test_core_follows_spring() {
        let log = Rc::new(EventLog::new());
        let (core, _, _) = attached_core(BombType::TimerBomb, &log);
        assert_eq!(core.position(), Vec2::new(1.0, 0.0));
        assert_eq!(core.connected_component_id(), Some(1));
        assert_eq!(core.spring_index(), Some(0));
        assert_eq!(core.anchor_points(), [0, 1]);
    }

    #[test]
    fn test_detached_core_tracks_anchor_component() {
        let log = Rc::new(EventLog::new());
        let (mut core, mut points, springs) = attached_core(BombType::RcBomb, &log);
        assert!(core.detach_if_attached());

        // Renumbered by a later detection pass
        points.set_connected_component_id(0, 4);
        points.set_connected_component_id(1, 4);
        core.refresh(&points, &springs);
        assert_eq!(core.connected_component_id(), Some(4));

        let mut physics = RecordingPhysics::default();
        core.blast(0.5, &GameParameters::default(), &mut physics);
        assert_eq!(physics.explosions, vec![(Vec2::new(1.0, 0.0), 0.5, 4)]);

        // One anchor left is enough
        points.destroy(0);
        core.refresh(&points, &springs);
        assert_eq!(core.connected_component_id(), Some(4));

        points.destroy(1);
        core.refresh(&points, &springs);
        assert_eq!(core.connected_component_id(), None);

        core.blast(1.0, &GameParameters::default(), &mut physics);
        assert_eq!(physics.explosions.len(), 1);
    }

    #[test]
    fn test_detached_core_stays_put() {
        let log = Rc::new(EventLog::new());
        let (mut core, mut points, springs) = attached_core(BombType::TimerBomb, &log);
        assert!(core.detach_if_attached());
        assert!(!core.detach_if_attached());

        *points.position_mut(1) = Vec2::new(10.0, 0.0);
        core.refresh(&points, &springs);
        assert_eq!(core.position(), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_toggle_places_then_removes() {
        let log = Rc::new(EventLog::new());
        let (_, points, springs) = attached_core(BombType::TimerBomb, &log);
        let events: Rc<dyn GameEventHandler> = log.clone();
        let water = StubWater::default();
        let mut bombs = Bombs::new();

        let new_bomb = NewBomb {
            id: 3,
            rotation_base_axis: Vec2::Y,
            now: Duration::ZERO,
        };

        let placed = bombs.toggle_bomb_at(
            BombType::ImpactBomb,
            Vec2::new(1.1, 0.0),
            new_bomb,
            &points,
            &springs,
            &water,
            &events,
        );
        assert_eq!(placed, BombToggle::Placed(3));
        assert_eq!(bombs.len(), 1);

        let removed = bombs.toggle_bomb_at(
            BombType::ImpactBomb,
            Vec2::new(1.0, 0.2),
            NewBomb { id: 4, ..new_bomb },
            &points,
            &springs,
            &water,
            &events,
        );
        assert_eq!(removed, BombToggle::Removed(3));
        assert!(bombs.is_empty());

        assert_eq!(log.count(|e| matches!(e, GameEvent::BombPlaced { bomb_id: 3, .. })), 1);
        assert_eq!(
            log.count(|e| matches!(
                e,
                GameEvent::BombRemoved {
                    bomb_id: 3,
                    is_underwater: Some(false),
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn test_toggle_far_from_springs_does_nothing() {
        let log = Rc::new(EventLog::new());
        let (_, points, springs) = attached_core(BombType::TimerBomb, &log);
        let events: Rc<dyn GameEventHandler> = log.clone();
        let mut bombs = Bombs::new();

        let result = bombs.toggle_bomb_at(
            BombType::RcBomb,
            Vec2::new(50.0, 50.0),
            NewBomb {
                id: 1,
                rotation_base_axis: Vec2::X,
                now: Duration::ZERO,
            },
            &points,
            &springs,
            &StubWater::default(),
            &events,
        );
        assert_eq!(result, BombToggle::Nothing);
        assert!(log.is_empty());
    }

    #[test]
    fn test_spring_destroyed_detaches_and_disturbs() {
        let log = Rc::new(EventLog::new());
        let (core, _, _) = attached_core(BombType::ImpactBomb, &log);
        let mut bombs = Bombs::new();
        bombs.bombs.push(Bomb::Impact(ImpactBomb::new(core)));

        bombs.on_spring_destroyed(0, Vec2::new(1.0, 0.0), Duration::ZERO);

        let bomb = &bombs.bombs[0];
        assert_eq!(bomb.core().spring_index(), None);
        let Bomb::Impact(impact_bomb) = bomb else {
            panic!("expected an impact bomb");
        };
        assert_eq!(impact_bomb.state(), ImpactBombState::TriggeringExplosion);
    }

    #[test]
    fn test_update_drops_expired_bombs() {
        let log = Rc::new(EventLog::new());
        let (core, _, _) = attached_core(BombType::ImpactBomb, &log);
        let mut bombs = Bombs::new();
        bombs.bombs.push(Bomb::Impact(ImpactBomb::new(core)));
        bombs.on_spring_destroyed(0, Vec2::new(1.0, 0.0), Duration::ZERO);

        let water = StubWater::default();
        let mut physics = RecordingPhysics::default();
        let parameters = GameParameters::default();
        let mut now = Duration::ZERO;
        for _ in 0..64 {
            now += Duration::from_millis(100);
            bombs.update(now, &parameters, &water, &mut physics);
        }

        assert!(bombs.is_empty());
        assert!(!physics.explosions.is_empty());
    }
}
