//! Ship: one structure of points, springs and triangles, plus its bombs
//!
//! Per-step update order:
//! 1. forces (gravity, buoyancy, water drag, springs)
//! 2. integration
//! 3. spring strain: stress and breakage
//! 4. water intake, diffusion and spill
//! 5. destroy cascade
//! 6. connected components and electricals
//! 7. bombs

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use smallvec::SmallVec;

use super::bombs::{BombToggle, Bombs, NewBomb, PhysicsHandler};
use super::connectivity::{VisitSequence, detect_connected_components};
use super::ocean::{OceanSurface, WaterSurface};
use super::points::{DynamicsBuffers, Points};
use super::springs::Springs;
use super::triangles::Triangles;
use super::types::{BombType, ConnectedComponentId, ElementIndex, NONE_CONNECTED_COMPONENT_ID};
use crate::consts::{MAX_TRIANGLES_PER_POINT, SIM_DT, TOOL_SEARCH_RADIUS, WATER_DENSITY};
use crate::events::GameEventHandler;
use crate::material::{ElectricalElementType, Material};
use crate::parameters::GameParameters;
use crate::render::RenderContext;
use crate::vectors::Vec2Ext;

/// Peak force of a regular bomb blast (N)
const BOMB_BLAST_FORCE: f32 = 3.0e5;
/// Outward push of the anti-matter pre-implosion shock ring (N)
const ANTI_MATTER_PREIMPLOSION_FORCE: f32 = 5.0e4;
/// Width of the pre-implosion shock ring (m)
const ANTI_MATTER_PREIMPLOSION_RING_WIDTH: f32 = 2.0;
/// Pull of the anti-matter implosion (N·m)
const ANTI_MATTER_IMPLOSION_FORCE: f32 = 2.0e5;
/// Push of the anti-matter explosion (N·m)
const ANTI_MATTER_EXPLOSION_FORCE: f32 = 1.0e6;

pub struct Ship {
    id: u32,
    points: Points,
    springs: Springs,
    triangles: Triangles,
    bombs: Bombs,

    events: Rc<dyn GameEventHandler>,
    event_aggregator: EventAggregator,

    // Filled by the destroy handlers, drained by the destroy cascade
    pending_point_destroys: Rc<RefCell<Vec<ElementIndex>>>,
    pending_spring_destroys: Rc<RefCell<Vec<ElementIndex>>>,

    current_time_point: Duration,
    is_structure_dirty: bool,
    connected_component_count: u32,
}

impl Ship {
    pub fn new(
        id: u32,
        mut points: Points,
        mut springs: Springs,
        triangles: Triangles,
        events: Rc<dyn GameEventHandler>,
    ) -> Self {
        let pending_point_destroys = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&pending_point_destroys);
        points.register_destroy_handler(Box::new(move |point_index| {
            sink.borrow_mut().push(point_index);
        }));

        let pending_spring_destroys = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&pending_spring_destroys);
        springs.register_destroy_handler(Box::new(move |spring_index| {
            sink.borrow_mut().push(spring_index);
        }));

        Self {
            id,
            points,
            springs,
            triangles,
            bombs: Bombs::new(),
            events,
            event_aggregator: EventAggregator::default(),
            pending_point_destroys,
            pending_spring_destroys,
            current_time_point: Duration::ZERO,
            is_structure_dirty: true,
            connected_component_count: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn points(&self) -> &Points {
        &self.points
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut Points {
        &mut self.points
    }

    #[inline]
    pub fn springs(&self) -> &Springs {
        &self.springs
    }

    #[inline]
    pub fn triangles(&self) -> &Triangles {
        &self.triangles
    }

    #[inline]
    pub fn bombs(&self) -> &Bombs {
        &self.bombs
    }

    /// Number of components found by the last detection pass
    #[inline]
    pub fn connected_component_count(&self) -> u32 {
        self.connected_component_count
    }

    /// Water held by all live points
    pub fn total_water(&self) -> f32 {
        self.points
            .iter()
            .filter(|&p| !self.points.is_deleted(p))
            .map(|p| self.points.water(p))
            .sum()
    }

    /// Recompute everything derived from parameters
    pub fn apply_parameters(&mut self, game_parameters: &GameParameters) {
        self.springs
            .update_coefficients(&self.points, game_parameters);
    }

    /// Advance the ship by one simulation step
    pub fn update(
        &mut self,
        now: Duration,
        game_parameters: &GameParameters,
        ocean: &OceanSurface,
        visit_sequence: &mut VisitSequence,
    ) {
        self.current_time_point = now;

        self.apply_forces(game_parameters, ocean);
        self.integrate(game_parameters);
        self.update_spring_strains(game_parameters, ocean);
        self.update_water(game_parameters, ocean);

        self.process_pending_destroys();
        if self.is_structure_dirty {
            self.detect_connected_components(visit_sequence);
        }
        self.update_electricals();

        // Bombs see the ship through the physics handler only
        self.bombs.refresh(&self.points, &self.springs);
        let mut bombs = std::mem::take(&mut self.bombs);
        bombs.update(now, game_parameters, ocean, &mut ShipPhysics::new(self, ocean));
        self.bombs = bombs;
        self.process_pending_destroys();

        self.flush_events();
    }

    pub fn detect_connected_components(&mut self, visit_sequence: &mut VisitSequence) {
        self.connected_component_count =
            detect_connected_components(&mut self.points, &self.springs, visit_sequence);
        self.is_structure_dirty = false;
    }

    //
    // Mechanics
    //

    fn apply_forces(&mut self, game_parameters: &GameParameters, ocean: &OceanSurface) {
        let gravity = game_parameters.gravity;

        for p in self.points.iter() {
            if self.points.is_deleted(p) {
                continue;
            }

            let mass = self.points.mass(p);
            let mut force = gravity * mass;

            if ocean.depth(self.points.position(p)) > 0.0 {
                // Displaced water pushes up, less so the more water the point holds
                let buoyancy = game_parameters.buoyancy_adjustment
                    * self.points.buoyancy(p)
                    * (1.0 - self.points.water(p).min(1.0));
                force -= gravity * WATER_DENSITY * buoyancy;

                force -= self.points.velocity(p) * game_parameters.water_drag * mass;
            }

            *self.points.force_mut(p) += force;
        }

        for s in self.springs.iter() {
            if self.springs.is_deleted(s) {
                continue;
            }

            let [a, b] = self.springs.endpoints(s);
            let displacement = self.points.position(b) - self.points.position(a);
            let length = displacement.length();
            let direction = displacement.normalise_with_length(length);

            // Hooke
            let spring_force =
                (length - self.springs.rest_length(s)) * self.springs.stiffness_coefficient(s);

            // Damping along the spring
            let relative_velocity = self.points.velocity(b) - self.points.velocity(a);
            let damping_force =
                relative_velocity.dot(direction) * self.springs.damping_coefficient(s);

            let force = direction * (spring_force + damping_force);
            *self.points.force_mut(a) += force;
            *self.points.force_mut(b) -= force;
        }
    }

    fn integrate(&mut self, game_parameters: &GameParameters) {
        let global_damping = game_parameters.global_damping;

        let DynamicsBuffers {
            positions,
            velocities,
            forces,
            integration_factors,
        } = self.points.dynamics_buffers_mut();

        for i in 0..positions.len() {
            let delta = velocities[i] * SIM_DT + forces[i] * integration_factors[i];
            positions[i] += delta;
            velocities[i] = delta / SIM_DT * global_damping;
            forces[i] = Vec2::ZERO;
        }
    }

    fn update_spring_strains(&mut self, game_parameters: &GameParameters, ocean: &OceanSurface) {
        for s in self.springs.iter() {
            if self.springs.is_deleted(s) {
                continue;
            }

            let strain = self.springs.strain(s, &self.points);
            let breaking_elongation = self.springs.breaking_elongation(s, game_parameters);

            if strain > breaking_elongation {
                let is_underwater = ocean.is_underwater(self.springs.midpoint(s, &self.points));
                if let Some(material) = self.springs.material(s).cloned() {
                    self.event_aggregator.record_break(&material, is_underwater);
                }

                self.springs.destroy(s, &mut self.points);
            } else if strain > game_parameters.stress_threshold * breaking_elongation {
                if !self.springs.is_stressed(s) {
                    self.springs.set_stressed(s, true);

                    let is_underwater = ocean.is_underwater(self.springs.midpoint(s, &self.points));
                    if let Some(material) = self.springs.material(s).cloned() {
                        self.event_aggregator.record_stress(&material, is_underwater);
                    }
                }
            } else if self.springs.is_stressed(s) {
                self.springs.set_stressed(s, false);
            }
        }
    }

    //
    // Water
    //

    fn update_water(&mut self, game_parameters: &GameParameters, ocean: &OceanSurface) {
        self.points.update_water_momenta_from_velocities();

        self.take_water_in(game_parameters, ocean);
        self.diffuse_water(game_parameters);
        self.spill_water(game_parameters, ocean);

        self.points.update_water_velocities_from_momenta();
    }

    /// Leaking points below the surface fill up towards their depth
    fn take_water_in(&mut self, game_parameters: &GameParameters, ocean: &OceanSurface) {
        let mut total_taken = 0.0;

        for p in self.points.iter() {
            if self.points.is_deleted(p) || !self.points.is_leaking(p) {
                continue;
            }

            let depth = ocean.depth(self.points.position(p));
            let water = self.points.water(p);
            if depth > 0.0 && water < depth {
                let taken =
                    (game_parameters.water_intake_adjustment * depth * SIM_DT).min(depth - water);
                self.points.add_water(p, taken);
                total_taken += taken;
            }
        }

        self.event_aggregator.water_taken += total_taken;
    }

    /// Desired flow across a spring, as (from, to, amount ≥ 0)
    ///
    /// Water evens out between the endpoints and runs downhill.
    fn water_flow(
        &self,
        spring_index: ElementIndex,
        water: &[f32],
        game_parameters: &GameParameters,
    ) -> (ElementIndex, ElementIndex, f32) {
        let [a, b] = self.springs.endpoints(spring_index);
        let water_a = water[a as usize];
        let water_b = water[b as usize];

        let position_a = self.points.position(a);
        let position_b = self.points.position(b);
        let length = position_a.distance(position_b).max(f32::EPSILON);
        // Positive when a is above b
        let slope = (position_a.y - position_b.y) / length;

        let diffusion =
            (water_a - water_b) * 0.5 * (game_parameters.water_diffusion_speed * SIM_DT).min(1.0);
        let downhill = if slope > 0.0 { water_a * slope } else { water_b * slope }
            * (game_parameters.water_flow_rate * SIM_DT).min(1.0);

        // Positive means a -> b
        let flow = (diffusion + downhill) * self.springs.water_permeability(spring_index);
        if flow >= 0.0 { (a, b, flow) } else { (b, a, -flow) }
    }

    fn diffuse_water(&mut self, game_parameters: &GameParameters) {
        let water = self.points.make_water_buffer_copy();

        let mut momenta = self.points.allocate_work_buffer_vec2();
        momenta.copy_from_slice(self.points.water_momenta());

        // Pass 1: total desired outflow per point, turned into a scale factor
        // so no point gives away more water than it holds
        let mut outflow_scale = self.points.allocate_work_buffer_float();
        outflow_scale.fill(0.0);
        for s in self.springs.iter() {
            if self.springs.is_deleted(s) || self.springs.water_permeability(s) == 0.0 {
                continue;
            }
            let (from, _, amount) = self.water_flow(s, &water, game_parameters);
            outflow_scale[from as usize] += amount;
        }
        for (scale, &available) in outflow_scale.iter_mut().zip(water.iter()) {
            *scale = if *scale > available && *scale > 0.0 {
                available / *scale
            } else {
                1.0
            };
        }

        // Pass 2: move water, and momentum along with it
        let mut new_water = self.points.make_water_buffer_copy();
        let mut new_momenta = self.points.allocate_work_buffer_vec2();
        new_momenta.copy_from_slice(&momenta);

        for s in self.springs.iter() {
            if self.springs.is_deleted(s) || self.springs.water_permeability(s) == 0.0 {
                continue;
            }

            let (from, to, amount) = self.water_flow(s, &water, game_parameters);
            let (from, to) = (from as usize, to as usize);
            let moved = amount * outflow_scale[from];
            if moved <= 0.0 || water[from] <= 0.0 {
                continue;
            }

            new_water[from] -= moved;
            new_water[to] += moved;

            let carried_momentum = momenta[from] * (moved / water[from]);
            new_momenta[from] -= carried_momentum;
            new_momenta[to] += carried_momentum;
        }

        // Rounding only
        for w in new_water.iter_mut() {
            *w = w.max(0.0);
        }

        self.points.update_water_buffer(&new_water);
        self.points.water_momenta_mut().copy_from_slice(&new_momenta);
    }

    /// Leaking points above the surface lose water
    fn spill_water(&mut self, game_parameters: &GameParameters, ocean: &OceanSurface) {
        let mut total_spilled = 0.0;
        let spill_fraction = (game_parameters.water_spill_rate * SIM_DT).min(1.0);

        for p in self.points.iter() {
            if self.points.is_deleted(p) || !self.points.is_leaking(p) {
                continue;
            }

            let water = self.points.water(p);
            if water > 0.0 && ocean.depth(self.points.position(p)) < 0.0 {
                let spilled = water * spill_fraction;
                self.points.water_momenta_mut()[p as usize] *= 1.0 - spill_fraction;
                self.points.add_water(p, -spilled);
                total_spilled += spilled;
            }
        }

        self.event_aggregator.water_splashed += total_spilled;
    }

    //
    // Structure
    //

    /// Destroy a point, recording the event; connected elements follow in the cascade
    fn destroy_point(&mut self, point_index: ElementIndex, ocean: &OceanSurface) {
        let is_underwater = ocean.is_underwater(self.points.position(point_index));
        if let Some(material) = self.points.material(point_index).cloned() {
            self.event_aggregator.record_destroy(&material, is_underwater);
        }

        self.points.destroy(point_index);
    }

    /// Destroy everything hanging off destroyed points and springs
    fn process_pending_destroys(&mut self) {
        loop {
            let destroyed_points = std::mem::take(&mut *self.pending_point_destroys.borrow_mut());
            let destroyed_springs = std::mem::take(&mut *self.pending_spring_destroys.borrow_mut());
            if destroyed_points.is_empty() && destroyed_springs.is_empty() {
                break;
            }

            self.is_structure_dirty = true;

            for p in destroyed_points {
                for s in self.points.connected_springs(p).to_vec() {
                    self.springs.destroy(s, &mut self.points);
                }
                for t in self.points.connected_triangles(p).to_vec() {
                    self.triangles.destroy(t, &mut self.points);
                }
            }

            for s in destroyed_springs {
                let [a, b] = self.springs.endpoints(s);

                // Triangles resting on the broken edge go too
                let broken_triangles: SmallVec<[ElementIndex; MAX_TRIANGLES_PER_POINT]> = self
                    .points
                    .connected_triangles(a)
                    .iter()
                    .copied()
                    .filter(|&t| self.triangles.contains_edge(t, a, b))
                    .collect();
                for t in broken_triangles {
                    self.triangles.destroy(t, &mut self.points);
                }

                let midpoint = self.springs.midpoint(s, &self.points);
                self.bombs
                    .on_spring_destroyed(s, midpoint, self.current_time_point);
            }
        }
    }

    /// Lamps light up when their component holds a self-powered generator
    fn update_electricals(&mut self) {
        let mut powered_components: HashSet<ConnectedComponentId> = HashSet::new();
        for p in self.points.iter() {
            if self.points.is_deleted(p) {
                continue;
            }
            if let Some(electrical) = self
                .points
                .material(p)
                .and_then(|m| m.electrical_properties)
            {
                if electrical.element_type == ElectricalElementType::Generator
                    && electrical.is_self_powered
                {
                    powered_components.insert(self.points.connected_component_id(p));
                }
            }
        }

        for p in self.points.iter() {
            if self.points.is_deleted(p) {
                continue;
            }
            let Some(electrical) = self
                .points
                .material(p)
                .and_then(|m| m.electrical_properties)
            else {
                continue;
            };

            if electrical.element_type == ElectricalElementType::Lamp {
                let is_lit = electrical.is_self_powered
                    || powered_components.contains(&self.points.connected_component_id(p));
                *self.points.light_mut(p) = if is_lit { 1.0 } else { 0.0 };
            }
        }
    }

    fn flush_events(&mut self) {
        self.event_aggregator.flush(self.events.as_ref());
    }

    //
    // Tools
    //

    /// Destroy all points within `radius` of `position`; returns how many
    pub fn destroy_at(&mut self, position: Vec2, radius: f32, ocean: &OceanSurface) -> u32 {
        let radius_squared = radius * radius;
        let doomed: Vec<ElementIndex> = self
            .points
            .iter()
            .filter(|&p| !self.points.is_deleted(p))
            .filter(|&p| self.points.position(p).distance_squared(position) < radius_squared)
            .collect();

        for &p in &doomed {
            self.destroy_point(p, ocean);
        }

        self.process_pending_destroys();
        self.flush_events();

        if !doomed.is_empty() {
            log::debug!("Ship {}: destroyed {} points", self.id, doomed.len());
        }
        doomed.len() as u32
    }

    /// Pin or unpin the point nearest to `position`; returns whether one was found
    pub fn toggle_pin_at(&mut self, position: Vec2, ocean: &OceanSurface) -> bool {
        let Some(p) = self.points.find_nearest(position, TOOL_SEARCH_RADIUS) else {
            return false;
        };

        let is_pinned = if self.points.is_pinned(p) {
            self.points.unpin(p);
            false
        } else {
            self.points.pin(p);
            true
        };

        self.events
            .on_pin_toggled(is_pinned, ocean.is_underwater(self.points.position(p)));
        true
    }

    pub fn toggle_bomb_at(
        &mut self,
        bomb_type: BombType,
        position: Vec2,
        new_bomb: NewBomb,
        ocean: &OceanSurface,
    ) -> BombToggle {
        self.bombs.toggle_bomb_at(
            bomb_type,
            position,
            new_bomb,
            &self.points,
            &self.springs,
            ocean,
            &self.events,
        )
    }

    pub fn detonate_rc_bombs(&mut self, now: Duration) {
        self.bombs.detonate_rc_bombs(now);
    }

    pub fn detonate_anti_matter_bombs(&mut self, now: Duration) {
        self.bombs.detonate_anti_matter_bombs(now);
    }

    //
    // Render
    //

    pub fn upload(&self, render: &mut dyn RenderContext) {
        self.points.upload(self.id, render);
        self.springs.upload(self.id, render);
        self.triangles.upload(self.id, render);
        self.bombs.upload(self.id, render);
    }
}

/// The ship as its bombs see it during one step
pub struct ShipPhysics<'a> {
    ship: &'a mut Ship,
    ocean: &'a OceanSurface,
}

impl<'a> ShipPhysics<'a> {
    pub fn new(ship: &'a mut Ship, ocean: &'a OceanSurface) -> Self {
        Self { ship, ocean }
    }
}

impl PhysicsHandler for ShipPhysics<'_> {
    fn do_bomb_explosion(
        &mut self,
        blast_position: Vec2,
        progress: f32,
        connected_component_id: ConnectedComponentId,
        game_parameters: &GameParameters,
    ) {
        // The blast front grows as it weakens
        let blast_radius = game_parameters.bomb_blast_radius * (0.6 + 0.4 * progress);
        let blast_force =
            BOMB_BLAST_FORCE * game_parameters.bomb_blast_force_adjustment * (1.0 - 0.5 * progress);
        let destroy_radius = game_parameters.bomb_blast_radius * 0.5;

        for p in self.ship.points.iter() {
            if self.ship.points.is_deleted(p) {
                continue;
            }
            if connected_component_id != NONE_CONNECTED_COMPONENT_ID
                && self.ship.points.connected_component_id(p) != connected_component_id
            {
                continue;
            }

            let displacement = self.ship.points.position(p) - blast_position;
            let distance = displacement.length();

            if progress == 0.0 && distance < destroy_radius {
                self.ship.destroy_point(p, self.ocean);
            } else if distance < blast_radius {
                let direction = displacement.normalise_with_length(distance);
                *self.ship.points.force_mut(p) +=
                    direction * blast_force / (1.0 + distance * distance);
            }
        }
    }

    fn do_anti_matter_bomb_preimplosion(
        &mut self,
        center_position: Vec2,
        progress: f32,
        game_parameters: &GameParameters,
    ) {
        // An expanding shock ring
        let ring_radius = progress * game_parameters.anti_matter_bomb_implosion_radius;
        let strength =
            ANTI_MATTER_PREIMPLOSION_FORCE * game_parameters.anti_matter_bomb_implosion_strength;

        for p in self.ship.points.iter() {
            if self.ship.points.is_deleted(p) {
                continue;
            }

            let displacement = self.ship.points.position(p) - center_position;
            let distance = displacement.length();
            if (distance - ring_radius).abs() < ANTI_MATTER_PREIMPLOSION_RING_WIDTH {
                *self.ship.points.force_mut(p) +=
                    displacement.normalise_with_length(distance) * strength;
            }
        }
    }

    fn do_anti_matter_bomb_implosion(
        &mut self,
        center_position: Vec2,
        progress: f32,
        game_parameters: &GameParameters,
    ) {
        let strength = ANTI_MATTER_IMPLOSION_FORCE
            * game_parameters.anti_matter_bomb_implosion_strength
            * (0.2 + 0.8 * progress);

        for p in self.ship.points.iter() {
            if self.ship.points.is_deleted(p) {
                continue;
            }

            let displacement = center_position - self.ship.points.position(p);
            let distance = displacement.length();
            *self.ship.points.force_mut(p) +=
                displacement.normalise_with_length(distance) * strength / distance.max(1.0);
        }
    }

    fn do_anti_matter_bomb_explosion(
        &mut self,
        center_position: Vec2,
        progress: f32,
        game_parameters: &GameParameters,
    ) {
        let destroy_radius = game_parameters.bomb_blast_radius;
        let strength = ANTI_MATTER_EXPLOSION_FORCE * (1.0 - progress);

        for p in self.ship.points.iter() {
            if self.ship.points.is_deleted(p) {
                continue;
            }

            let displacement = self.ship.points.position(p) - center_position;
            let distance = displacement.length();

            if distance < destroy_radius {
                self.ship.destroy_point(p, self.ocean);
            } else {
                *self.ship.points.force_mut(p) +=
                    displacement.normalise_with_length(distance) * strength / distance;
            }
        }
    }
}

/// Per-step event tallies
///
/// Events about materials are aggregated per (material, underwater) pair so a
/// blast reports one large event rather than hundreds of small ones.
#[derive(Default)]
struct EventAggregator {
    destroy: Vec<MaterialEventTally>,
    stress: Vec<MaterialEventTally>,
    r#break: Vec<MaterialEventTally>,
    water_taken: f32,
    water_splashed: f32,
}

struct MaterialEventTally {
    material: Arc<Material>,
    is_underwater: bool,
    count: u32,
}

impl EventAggregator {
    fn record_destroy(&mut self, material: &Arc<Material>, is_underwater: bool) {
        Self::tally(&mut self.destroy, material, is_underwater);
    }

    fn record_stress(&mut self, material: &Arc<Material>, is_underwater: bool) {
        Self::tally(&mut self.stress, material, is_underwater);
    }

    fn record_break(&mut self, material: &Arc<Material>, is_underwater: bool) {
        Self::tally(&mut self.r#break, material, is_underwater);
    }

    fn tally(tallies: &mut Vec<MaterialEventTally>, material: &Arc<Material>, is_underwater: bool) {
        match tallies
            .iter_mut()
            .find(|t| Arc::ptr_eq(&t.material, material) && t.is_underwater == is_underwater)
        {
            Some(tally) => tally.count += 1,
            None => tallies.push(MaterialEventTally {
                material: Arc::clone(material),
                is_underwater,
                count: 1,
            }),
        }
    }

    fn flush(&mut self, events: &dyn GameEventHandler) {
        for t in self.destroy.drain(..) {
            events.on_destroy(&t.material, t.is_underwater, t.count);
        }
        for t in self.stress.drain(..) {
            events.on_stress(&t.material, t.is_underwater, t.count);
        }
        for t in self.r#break.drain(..) {
            events.on_break(&t.material, t.is_underwater, t.count);
        }

        if self.water_taken > 0.0 {
            events.on_water_taken(self.water_taken);
        }
        if self.water_splashed > 0.0 {
            events.on_water_splashed(self.water_splashed);
        }
        self.water_taken = 0.0;
        self.water_splashed = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventLog, GameEvent};
    use crate::material::{ElectricalProperties, Material};
    use crate::render::CapturingRenderContext;
    use crate::sim::ship_builder::{MaterialGrid, ShipBuilder};
    use glam::Vec3;

    fn material(name: &str, mass: f32, strength: f32) -> Arc<Material> {
        Arc::new(Material {
            name: name.to_string(),
            mass,
            strength,
            stiffness: 1.0,
            structural_colour: [0, 0, 0],
            render_colour: Vec3::ONE,
            is_hull: false,
            is_rope: false,
            electrical_properties: None,
            sound_properties: None,
        })
    }

    /// Dry, calm world far above the sea
    fn dry_parameters() -> GameParameters {
        GameParameters {
            sea_level: -1000.0,
            wave_height: 0.0,
            ..GameParameters::default()
        }
    }

    fn block(width: u32, height: u32, material: &Arc<Material>) -> MaterialGrid {
        let mut grid = MaterialGrid::new(width, height);
        for y in 0..height {
            for x in 0..width {
                grid.set(x, y, Arc::clone(material));
            }
        }
        grid
    }

    struct Fixture {
        ship: Ship,
        log: Rc<EventLog>,
        parameters: GameParameters,
        ocean: OceanSurface,
        visit_sequence: VisitSequence,
        now: Duration,
    }

    impl Fixture {
        fn new(grid: &MaterialGrid, parameters: GameParameters) -> Self {
            let log = Rc::new(EventLog::new());
            let events: Rc<dyn GameEventHandler> = log.clone();
            let mut ship = ShipBuilder::build(0, grid, &parameters, events);
            let mut visit_sequence = VisitSequence::new();
            ship.detect_connected_components(&mut visit_sequence);
            Self {
                ship,
                log,
                ocean: OceanSurface::new(&parameters),
                parameters,
                visit_sequence,
                now: Duration::ZERO,
            }
        }

        fn step(&mut self, count: u32) {
            for _ in 0..count {
                self.now += Duration::from_secs_f32(SIM_DT);
                self.ocean.update(self.now);
                self.ship.update(
                    self.now,
                    &self.parameters,
                    &self.ocean,
                    &mut self.visit_sequence,
                );
            }
        }

        fn physics(&mut self) -> ShipPhysics<'_> {
            ShipPhysics::new(&mut self.ship, &self.ocean)
        }
    }

    #[test]
    fn test_free_fall_keeps_structure() {
        let wood = material("Wood", 500.0, 1.0);
        let mut fixture = Fixture::new(&block(3, 3, &wood), dry_parameters());
        let start_y = fixture.ship.points().position(4).y;

        fixture.step(64);

        let end_y = fixture.ship.points().position(4).y;
        assert!(end_y < start_y - 3.0, "fell from {start_y} to {end_y}");
        assert_eq!(fixture.ship.connected_component_count(), 1);
        assert_eq!(fixture.log.count(|e| matches!(e, GameEvent::Break { .. })), 0);
    }

    #[test]
    fn test_pinned_point_stays_put() {
        let wood = material("Wood", 500.0, 1.0);
        let mut fixture = Fixture::new(&block(2, 2, &wood), dry_parameters());
        let pinned_position = fixture.ship.points().position(0);
        let ocean = fixture.ocean.clone();

        assert!(fixture.ship.toggle_pin_at(pinned_position, &ocean));
        fixture.step(32);

        assert_eq!(fixture.ship.points().position(0), pinned_position);
        assert_eq!(fixture.ship.points().velocity(0), Vec2::ZERO);
        assert_eq!(
            fixture.log.count(|e| matches!(e, GameEvent::PinToggled { is_pinned: true, .. })),
            1
        );

        assert!(fixture.ship.toggle_pin_at(pinned_position, &ocean));
        assert!(!fixture.ship.points().is_pinned(0));
        assert!(fixture.ship.points().integration_factor(0).x > 0.0);
    }

    #[test]
    fn test_overstretched_spring_breaks_and_leaks() {
        let glass = material("Glass", 100.0, 0.1);
        // Limp springs: only the imposed displacement strains them
        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            stiffness_adjustment: 0.0,
            ..dry_parameters()
        };
        let mut fixture = Fixture::new(&block(2, 1, &glass), parameters);

        *fixture.ship.points_mut().position_mut(1) += Vec2::new(1.0, 0.0);
        fixture.step(1);

        assert!(fixture.ship.springs().is_deleted(0));
        assert!(fixture.ship.points().is_leaking(0));
        assert!(fixture.ship.points().is_leaking(1));
        assert_eq!(fixture.ship.connected_component_count(), 2);
        assert_eq!(
            fixture.log.events(),
            vec![GameEvent::Break {
                material: "Glass".to_string(),
                sound: None,
                is_underwater: false,
                size: crate::events::SizeBucket::Small,
            }]
        );
    }

    #[test]
    fn test_breaking_an_edge_removes_its_triangles() {
        let glass = material("Glass", 100.0, 0.1);
        // Limp springs: only the imposed displacement strains them
        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            stiffness_adjustment: 0.0,
            ..dry_parameters()
        };
        let mut fixture = Fixture::new(&block(2, 2, &glass), parameters);
        assert_eq!(fixture.ship.triangles().element_count(), 2);

        // Rip the bottom-right corner away: all three of its springs snap
        *fixture.ship.points_mut().position_mut(3) += Vec2::new(5.0, -5.0);
        fixture.step(1);

        for t in fixture.ship.triangles().iter() {
            assert!(fixture.ship.triangles().is_deleted(t));
        }
        assert_eq!(fixture.ship.connected_component_count(), 2);
    }

    #[test]
    fn test_destroy_at_cascades() {
        let wood = material("Wood", 500.0, 1.0);
        let mut fixture = Fixture::new(&block(3, 3, &wood), dry_parameters());
        let center = fixture.ship.points().position(4);
        let ocean = fixture.ocean.clone();

        assert_eq!(fixture.ship.destroy_at(center, 0.1, &ocean), 1);

        let ship = &fixture.ship;
        assert!(ship.points().is_deleted(4));
        assert!(ship.points().connected_springs(4).is_empty());
        assert!(ship.points().connected_triangles(4).is_empty());
        for s in ship.springs().iter() {
            if !ship.springs().is_deleted(s) {
                assert!(!ship.springs().endpoints(s).contains(&4));
            }
        }
        assert_eq!(
            fixture.log.count(|e| matches!(
                e,
                GameEvent::Destroy {
                    size: crate::events::SizeBucket::Small,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn test_destroy_events_are_aggregated() {
        let wood = material("Wood", 500.0, 1.0);
        let mut fixture = Fixture::new(&block(4, 4, &wood), dry_parameters());
        let ocean = fixture.ocean.clone();

        let destroyed = fixture.ship.destroy_at(Vec2::new(0.0, 1.5), 10.0, &ocean);
        assert_eq!(destroyed, 16);

        let events = fixture.log.events();
        assert_eq!(
            events,
            vec![GameEvent::Destroy {
                material: "Wood".to_string(),
                sound: None,
                is_underwater: false,
                size: crate::events::SizeBucket::Large,
            }]
        );
    }

    #[test]
    fn test_submerged_leak_takes_water() {
        let wood = material("Wood", 500.0, 1.0);
        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            sea_level: 10.0,
            wave_height: 0.0,
            ..GameParameters::default()
        };
        let mut fixture = Fixture::new(&block(2, 2, &wood), parameters);
        fixture.ship.points_mut().set_leaking(0);

        fixture.step(16);

        assert!(fixture.ship.points().water(0) > 0.0);
        assert!(fixture.ship.total_water() > 0.0);
        assert!(
            fixture
                .ship
                .points()
                .water_buffer()
                .iter()
                .all(|&w| w >= 0.0)
        );
        assert!(fixture.log.count(|e| matches!(e, GameEvent::WaterTaken(_))) > 0);
    }

    #[test]
    fn test_ocean_changes_apply_on_the_next_step() {
        let wood = material("Wood", 500.0, 1.0);
        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            ..dry_parameters()
        };
        let mut fixture = Fixture::new(&block(2, 2, &wood), parameters.clone());
        fixture.ship.points_mut().set_leaking(0);

        fixture.step(4);
        assert_eq!(fixture.ship.total_water(), 0.0);

        // Raise the sea without touching the ship
        fixture.ocean.apply_parameters(&GameParameters {
            sea_level: 10.0,
            ..parameters
        });
        fixture.step(4);
        assert!(fixture.ship.points().water(0) > 0.0);
    }

    #[test]
    fn test_diffusion_conserves_water() {
        let wood = material("Wood", 500.0, 1.0);
        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            ..dry_parameters()
        };
        let mut fixture = Fixture::new(&block(3, 3, &wood), parameters);
        fixture.ship.points_mut().add_water(0, 4.0);
        fixture.ship.points_mut().add_water(8, 1.0);

        fixture.step(200);

        let total = fixture.ship.total_water();
        assert!((total - 5.0).abs() < 1e-3, "total water {total}");
        let water = fixture.ship.points().water_buffer();
        assert!(water.iter().all(|&w| w >= 0.0));
        // Spread out
        assert!(water[4] > 0.0);
    }

    #[test]
    fn test_leak_above_water_spills() {
        let wood = material("Wood", 500.0, 1.0);
        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            ..dry_parameters()
        };
        let mut fixture = Fixture::new(&block(1, 1, &wood), parameters);
        fixture.ship.points_mut().add_water(0, 2.0);
        fixture.ship.points_mut().set_leaking(0);

        fixture.step(8);

        assert!(fixture.ship.points().water(0) < 2.0);
        assert!(fixture.ship.points().water(0) >= 0.0);
        assert!(fixture.log.count(|e| matches!(e, GameEvent::WaterSplashed(_))) > 0);
    }

    #[test]
    fn test_explosion_spares_other_components() {
        let wood = material("Wood", 500.0, 1.0);
        let mut grid = MaterialGrid::new(5, 1);
        grid.set(0, 0, Arc::clone(&wood));
        grid.set(1, 0, Arc::clone(&wood));
        grid.set(3, 0, Arc::clone(&wood));
        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            bomb_blast_radius: 10.0,
            ..dry_parameters()
        };
        let mut fixture = Fixture::new(&grid, parameters.clone());
        assert_eq!(fixture.ship.connected_component_count(), 2);

        let left_component = fixture.ship.points().connected_component_id(0);
        let center = fixture.ship.points().position(0);
        fixture
            .physics()
            .do_bomb_explosion(center, 0.0, left_component, &parameters);

        assert!(fixture.ship.points().is_deleted(0));
        assert!(fixture.ship.points().is_deleted(1));
        assert!(!fixture.ship.points().is_deleted(2));
    }

    #[test]
    fn test_blast_does_not_follow_renumbered_components() {
        let wood = material("Wood", 500.0, 1.0);
        let mut grid = MaterialGrid::new(14, 1);
        for x in [0, 1, 5, 6, 12, 13] {
            grid.set(x, 0, Arc::clone(&wood));
        }
        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            bomb_blast_radius: 10.0,
            ..dry_parameters()
        };
        let mut fixture = Fixture::new(&grid, parameters);
        assert_eq!(fixture.ship.connected_component_count(), 3);
        let points = fixture.ship.points();
        assert_eq!(points.connected_component_id(2), 2);
        assert_eq!(points.connected_component_id(4), 3);

        // Middle island carries the bomb
        let bomb_position = (points.position(2) + points.position(3)) * 0.5;
        let new_bomb = NewBomb {
            id: 1,
            rotation_base_axis: Vec2::X,
            now: fixture.now,
        };
        let ocean = fixture.ocean.clone();
        let toggle = fixture
            .ship
            .toggle_bomb_at(BombType::RcBomb, bomb_position, new_bomb, &ocean);
        assert_eq!(toggle, BombToggle::Placed(1));

        let before: Vec<Vec2> = (0..6).map(|p| fixture.ship.points().position(p)).collect();
        fixture.ship.detonate_rc_bombs(fixture.now);
        fixture.step(256);

        let points = fixture.ship.points();
        assert!(points.is_deleted(2));
        assert!(points.is_deleted(3));
        assert!(fixture.ship.bombs().is_empty());

        // The right island inherits the middle island's id once it is gone
        assert_eq!(points.connected_component_id(4), 2);
        for p in [0, 1, 4, 5] {
            assert!(
                points.position(p).distance(before[p as usize]) < 1e-4,
                "point {p} moved to {}",
                points.position(p)
            );
        }
    }

    #[test]
    fn test_later_explosion_steps_push_without_destroying() {
        let wood = material("Wood", 500.0, 1.0);
        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            ..dry_parameters()
        };
        let mut fixture = Fixture::new(&block(3, 1, &wood), parameters.clone());
        let center = fixture.ship.points().position(1);
        let component = fixture.ship.points().connected_component_id(1);

        fixture
            .physics()
            .do_bomb_explosion(center, 0.5, component, &parameters);

        assert!(!fixture.ship.points().is_deleted(1));
        assert!(fixture.ship.points().force(0).x < 0.0);
        assert!(fixture.ship.points().force(2).x > 0.0);
    }

    #[test]
    fn test_implosion_pulls_inwards() {
        let wood = material("Wood", 500.0, 1.0);
        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            ..dry_parameters()
        };
        let mut fixture = Fixture::new(&block(3, 1, &wood), parameters.clone());
        let center = fixture.ship.points().position(1) + Vec2::new(0.0, 5.0);

        fixture
            .physics()
            .do_anti_matter_bomb_implosion(center, 0.5, &parameters);

        for p in 0..3 {
            assert!(fixture.ship.points().force(p).y > 0.0);
        }
    }

    #[test]
    fn test_lamp_lit_by_generator_in_same_component() {
        let mut generator = (*material("Generator", 500.0, 1.0)).clone();
        generator.electrical_properties = Some(ElectricalProperties {
            element_type: ElectricalElementType::Generator,
            is_self_powered: true,
        });
        let mut lamp = (*material("Lamp", 500.0, 1.0)).clone();
        lamp.electrical_properties = Some(ElectricalProperties {
            element_type: ElectricalElementType::Lamp,
            is_self_powered: false,
        });
        let (generator, lamp) = (Arc::new(generator), Arc::new(lamp));

        let mut grid = MaterialGrid::new(4, 1);
        grid.set(0, 0, Arc::clone(&generator));
        grid.set(1, 0, Arc::clone(&lamp));
        grid.set(3, 0, Arc::clone(&lamp));

        let parameters = GameParameters {
            gravity: Vec2::ZERO,
            ..dry_parameters()
        };
        let mut fixture = Fixture::new(&grid, parameters);
        fixture.step(1);

        assert_eq!(fixture.ship.points().light(1), 1.0);
        assert_eq!(fixture.ship.points().light(2), 0.0);
    }

    #[test]
    fn test_upload_uploads_immutable_attributes_once() {
        let wood = material("Wood", 500.0, 1.0);
        let fixture = Fixture::new(&block(2, 2, &wood), dry_parameters());
        let mut render = CapturingRenderContext::new();

        fixture.ship.upload(&mut render);
        render.begin_frame();
        fixture.ship.upload(&mut render);

        assert_eq!(render.immutable_attribute_uploads, 1);
        assert_eq!(render.point_count, 4);
        // 6 springs in a 2x2 block, 2 triangles
        assert_eq!(render.spring_indices.len(), 12);
        assert_eq!(render.triangle_indices.len(), 6);
    }
}
