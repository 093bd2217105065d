//! Points: the particles of a ship
//!
//! One row per point across parallel buffers, addressed by a dense
//! `ElementIndex`. The container is sized once when the ship is built and never
//! grows; destroyed points keep their slot with the deleted flag set.

use std::cell::Cell;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use super::buffer::{Buffer, BufferAllocator, ElementContainer, PooledBuffer};
use super::types::{
    ConnectedComponentId, ElementCount, ElementIndex, NONE_CONNECTED_COMPONENT_ID,
    NONE_ELEMENT_INDEX, NONE_VISIT_SEQUENCE_NUMBER, VisitSequenceNumber,
};
use crate::consts::{MAX_SPRINGS_PER_POINT, MAX_TRIANGLES_PER_POINT, SIM_DT};
use crate::material::Material;
use crate::render::RenderContext;

/// Callback invoked right before a point is marked deleted
pub type DestroyHandler = Box<dyn FnMut(ElementIndex)>;

/// The springs and triangles connected to a point
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub connected_springs: SmallVec<[ElementIndex; MAX_SPRINGS_PER_POINT]>,
    pub connected_triangles: SmallVec<[ElementIndex; MAX_TRIANGLES_PER_POINT]>,
}

/// Which water buffer currently holds the truth about water motion
///
/// Momenta are derived from velocities on demand and are only meaningful until
/// velocities are derived back from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterRepresentation {
    Velocity,
    Momentum,
}

pub struct Points {
    container: ElementContainer,
    next_free_index: ElementIndex,

    // Deletion
    is_deleted_buffer: Buffer<bool>,

    // Material
    material_buffer: Buffer<Option<Arc<Material>>>,
    is_hull_buffer: Buffer<bool>,
    is_rope_buffer: Buffer<bool>,

    // Mechanical dynamics
    position_buffer: Buffer<Vec2>,
    velocity_buffer: Buffer<Vec2>,
    force_buffer: Buffer<Vec2>,
    integration_factor_buffer: Buffer<Vec2>,
    mass_buffer: Buffer<f32>,

    // Water dynamics
    buoyancy_buffer: Buffer<f32>,
    /// Height of a 1m² column of water exerting the same pressure as at this point
    water_buffer: Buffer<f32>,
    water_velocity_buffer: Buffer<Vec2>,
    water_momentum_buffer: Buffer<Vec2>,
    water_representation: WaterRepresentation,
    is_leaking_buffer: Buffer<bool>,

    // Electrical dynamics
    electrical_element_buffer: Buffer<ElementIndex>,
    /// Total illumination, 0.0 -> 1.0
    light_buffer: Buffer<f32>,

    // Structure
    network_buffer: Buffer<Network>,

    // Connected component
    connected_component_id_buffer: Buffer<ConnectedComponentId>,
    visit_sequence_number_buffer: Buffer<VisitSequenceNumber>,

    // Pinning
    is_pinned_buffer: Buffer<bool>,

    // Immutable render attributes
    color_buffer: Buffer<Vec3>,
    texture_coordinates_buffer: Buffer<Vec2>,
    are_immutable_render_attributes_uploaded: Cell<bool>,

    destroy_handler: Option<DestroyHandler>,

    float_buffer_allocator: BufferAllocator<f32>,
    vec2_buffer_allocator: BufferAllocator<Vec2>,
}

impl Points {
    pub fn new(element_count: ElementCount) -> Self {
        Self {
            container: ElementContainer::new(element_count),
            next_free_index: 0,
            // Unused slots count as deleted until added
            is_deleted_buffer: Buffer::new(element_count, true),
            material_buffer: Buffer::new(element_count, None),
            is_hull_buffer: Buffer::new(element_count, false),
            is_rope_buffer: Buffer::new(element_count, false),
            position_buffer: Buffer::new(element_count, Vec2::ZERO),
            velocity_buffer: Buffer::new(element_count, Vec2::ZERO),
            force_buffer: Buffer::new(element_count, Vec2::ZERO),
            integration_factor_buffer: Buffer::new(element_count, Vec2::ZERO),
            mass_buffer: Buffer::new(element_count, 1.0),
            buoyancy_buffer: Buffer::new(element_count, 0.0),
            water_buffer: Buffer::new(element_count, 0.0),
            water_velocity_buffer: Buffer::new(element_count, Vec2::ZERO),
            water_momentum_buffer: Buffer::new(element_count, Vec2::ZERO),
            water_representation: WaterRepresentation::Velocity,
            is_leaking_buffer: Buffer::new(element_count, false),
            electrical_element_buffer: Buffer::new(element_count, NONE_ELEMENT_INDEX),
            light_buffer: Buffer::new(element_count, 0.0),
            network_buffer: Buffer::new(element_count, Network::default()),
            connected_component_id_buffer: Buffer::new(element_count, NONE_CONNECTED_COMPONENT_ID),
            visit_sequence_number_buffer: Buffer::new(element_count, NONE_VISIT_SEQUENCE_NUMBER),
            is_pinned_buffer: Buffer::new(element_count, false),
            color_buffer: Buffer::new(element_count, Vec3::ZERO),
            texture_coordinates_buffer: Buffer::new(element_count, Vec2::ZERO),
            are_immutable_render_attributes_uploaded: Cell::new(false),
            destroy_handler: None,
            float_buffer_allocator: BufferAllocator::new(element_count),
            vec2_buffer_allocator: BufferAllocator::new(element_count),
        }
    }

    #[inline]
    pub fn element_count(&self) -> ElementCount {
        self.container.element_count()
    }

    /// All point indices, deleted ones included
    #[inline]
    pub fn iter(&self) -> std::ops::Range<ElementIndex> {
        self.container.iter()
    }

    /// Set the (single) handler invoked whenever a point is destroyed
    ///
    /// The handler runs right before the point is marked deleted; elements
    /// connected to the point may already be gone. It is not re-entrant:
    /// destroying points from inside it is undefined.
    pub fn register_destroy_handler(&mut self, handler: DestroyHandler) {
        debug_assert!(self.destroy_handler.is_none(), "destroy handler already set");
        self.destroy_handler = Some(handler);
    }

    /// Initialize the next unused slot and return its index
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        position: Vec2,
        material: Arc<Material>,
        is_hull: bool,
        is_rope: bool,
        electrical_element_index: ElementIndex,
        buoyancy: f32,
        color: Vec3,
        texture_coordinates: Vec2,
    ) -> ElementIndex {
        let index = self.next_free_index;
        debug_assert!(index < self.element_count(), "points container is full");
        self.next_free_index += 1;

        let mass = material.mass;

        self.is_deleted_buffer[index] = false;
        self.material_buffer[index] = Some(material);
        self.is_hull_buffer[index] = is_hull;
        self.is_rope_buffer[index] = is_rope;

        self.position_buffer[index] = position;
        self.velocity_buffer[index] = Vec2::ZERO;
        self.force_buffer[index] = Vec2::ZERO;
        self.integration_factor_buffer[index] = Self::calculate_integration_factor(mass);
        self.mass_buffer[index] = mass;

        self.buoyancy_buffer[index] = buoyancy;
        self.water_buffer[index] = 0.0;
        self.water_velocity_buffer[index] = Vec2::ZERO;
        self.water_momentum_buffer[index] = Vec2::ZERO;
        self.is_leaking_buffer[index] = false;

        self.electrical_element_buffer[index] = electrical_element_index;
        self.light_buffer[index] = 0.0;

        self.network_buffer[index] = Network::default();

        self.connected_component_id_buffer[index] = NONE_CONNECTED_COMPONENT_ID;
        self.visit_sequence_number_buffer[index] = NONE_VISIT_SEQUENCE_NUMBER;

        self.is_pinned_buffer[index] = false;

        self.color_buffer[index] = color;
        self.texture_coordinates_buffer[index] = texture_coordinates;

        index
    }

    /// Destroy a point: notify the destroy handler, then mark it deleted
    ///
    /// The slot stays inert for the rest of the ship's life.
    pub fn destroy(&mut self, index: ElementIndex) {
        debug_assert!(!self.is_deleted(index), "point {index} destroyed twice");

        if let Some(handler) = self.destroy_handler.as_mut() {
            handler(index);
        }

        self.is_deleted_buffer[index] = true;

        // Freeze it
        self.integration_factor_buffer[index] = Vec2::ZERO;
        self.velocity_buffer[index] = Vec2::ZERO;
        self.force_buffer[index] = Vec2::ZERO;
    }

    /// Integration factor for a point of the given mass: dt² / m on both axes
    #[inline]
    pub fn calculate_integration_factor(mass: f32) -> Vec2 {
        Vec2::splat(SIM_DT * SIM_DT / mass)
    }

    //
    // Render
    //

    /// Upload per-frame point state; immutable attributes go up once
    pub fn upload(&self, ship_id: u32, render: &mut dyn RenderContext) {
        if !self.are_immutable_render_attributes_uploaded.get() {
            render.upload_ship_point_immutable_attributes(
                ship_id,
                bytemuck::cast_slice(self.color_buffer.as_slice()),
                bytemuck::cast_slice(self.texture_coordinates_buffer.as_slice()),
            );
            self.are_immutable_render_attributes_uploaded.set(true);
        }

        render.upload_ship_points(
            ship_id,
            self.positions_as_floats(),
            self.light_buffer.as_slice(),
            self.water_buffer.as_slice(),
        );
    }

    //
    // IsDeleted
    //

    #[inline]
    pub fn is_deleted(&self, index: ElementIndex) -> bool {
        self.is_deleted_buffer[index]
    }

    //
    // Material
    //

    /// Material of a point; `None` only for never-added slots
    #[inline]
    pub fn material(&self, index: ElementIndex) -> Option<&Arc<Material>> {
        self.material_buffer[index].as_ref()
    }

    #[inline]
    pub fn is_hull(&self, index: ElementIndex) -> bool {
        self.is_hull_buffer[index]
    }

    #[inline]
    pub fn is_rope(&self, index: ElementIndex) -> bool {
        self.is_rope_buffer[index]
    }

    //
    // Dynamics
    //

    #[inline]
    pub fn position(&self, index: ElementIndex) -> Vec2 {
        self.position_buffer[index]
    }

    #[inline]
    pub fn position_mut(&mut self, index: ElementIndex) -> &mut Vec2 {
        &mut self.position_buffer[index]
    }

    #[inline]
    pub fn positions(&self) -> &[Vec2] {
        self.position_buffer.as_slice()
    }

    #[inline]
    pub fn positions_mut(&mut self) -> &mut [Vec2] {
        self.position_buffer.as_mut_slice()
    }

    /// Positions as interleaved x, y floats
    #[inline]
    pub fn positions_as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(self.position_buffer.as_slice())
    }

    #[inline]
    pub fn velocity(&self, index: ElementIndex) -> Vec2 {
        self.velocity_buffer[index]
    }

    #[inline]
    pub fn velocity_mut(&mut self, index: ElementIndex) -> &mut Vec2 {
        &mut self.velocity_buffer[index]
    }

    #[inline]
    pub fn force(&self, index: ElementIndex) -> Vec2 {
        self.force_buffer[index]
    }

    #[inline]
    pub fn force_mut(&mut self, index: ElementIndex) -> &mut Vec2 {
        &mut self.force_buffer[index]
    }

    #[inline]
    pub fn integration_factor(&self, index: ElementIndex) -> Vec2 {
        self.integration_factor_buffer[index]
    }

    #[inline]
    pub fn mass(&self, index: ElementIndex) -> f32 {
        self.mass_buffer[index]
    }

    /// Disjoint views over the buffers the integrator reads and writes
    pub fn dynamics_buffers_mut(&mut self) -> DynamicsBuffers<'_> {
        DynamicsBuffers {
            positions: self.position_buffer.as_mut_slice(),
            velocities: self.velocity_buffer.as_mut_slice(),
            forces: self.force_buffer.as_mut_slice(),
            integration_factors: self.integration_factor_buffer.as_slice(),
        }
    }

    //
    // Water dynamics
    //

    #[inline]
    pub fn buoyancy(&self, index: ElementIndex) -> f32 {
        self.buoyancy_buffer[index]
    }

    #[inline]
    pub fn water(&self, index: ElementIndex) -> f32 {
        self.water_buffer[index]
    }

    #[inline]
    pub fn water_buffer(&self) -> &[f32] {
        self.water_buffer.as_slice()
    }

    /// Add (or, with a negative amount, remove) water at a point
    ///
    /// Callers must never drive the quantity below zero.
    #[inline]
    pub fn add_water(&mut self, index: ElementIndex, water: f32) {
        self.water_buffer[index] += water;
        debug_assert!(
            self.water_buffer[index] >= 0.0,
            "negative water at point {index}"
        );
    }

    /// Snapshot of the water buffer in a pooled scratch buffer
    pub fn make_water_buffer_copy(&self) -> PooledBuffer<f32> {
        let mut copy = self.float_buffer_allocator.allocate();
        copy.copy_from_slice(self.water_buffer.as_slice());
        copy
    }

    /// Replace the water buffer with a (diffused) snapshot
    pub fn update_water_buffer(&mut self, new_water: &[f32]) {
        debug_assert!(new_water.iter().all(|&w| w >= 0.0), "negative water");
        self.water_buffer.copy_from(new_water);
    }

    #[inline]
    pub fn water_representation(&self) -> WaterRepresentation {
        self.water_representation
    }

    #[inline]
    pub fn water_velocity(&self, index: ElementIndex) -> Vec2 {
        debug_assert_eq!(self.water_representation, WaterRepresentation::Velocity);
        self.water_velocity_buffer[index]
    }

    /// Water velocities; only valid while velocities are the current representation
    pub fn water_velocities_mut(&mut self) -> &mut [Vec2] {
        debug_assert_eq!(self.water_representation, WaterRepresentation::Velocity);
        self.water_velocity_buffer.as_mut_slice()
    }

    /// Water momenta; only valid after `update_water_momenta_from_velocities`
    /// and until `update_water_velocities_from_momenta`
    pub fn water_momenta(&self) -> &[Vec2] {
        debug_assert_eq!(
            self.water_representation,
            WaterRepresentation::Momentum,
            "water momenta read while velocities are current"
        );
        self.water_momentum_buffer.as_slice()
    }

    pub fn water_momenta_mut(&mut self) -> &mut [Vec2] {
        debug_assert_eq!(
            self.water_representation,
            WaterRepresentation::Momentum,
            "water momenta written while velocities are current"
        );
        self.water_momentum_buffer.as_mut_slice()
    }

    /// Derive momenta from velocities; momenta become the source of truth
    pub fn update_water_momenta_from_velocities(&mut self) {
        debug_assert_eq!(
            self.water_representation,
            WaterRepresentation::Velocity,
            "momenta derived from stale velocities"
        );

        let water = self.water_buffer.as_slice();
        let velocities = self.water_velocity_buffer.as_slice();
        let momenta = self.water_momentum_buffer.as_mut_slice();

        for ((momentum, &velocity), &quantity) in momenta.iter_mut().zip(velocities).zip(water) {
            *momentum = velocity * quantity;
        }

        self.water_representation = WaterRepresentation::Momentum;
    }

    /// Derive velocities from momenta; velocities become the source of truth
    pub fn update_water_velocities_from_momenta(&mut self) {
        debug_assert_eq!(
            self.water_representation,
            WaterRepresentation::Momentum,
            "velocities derived from stale momenta"
        );

        let water = self.water_buffer.as_slice();
        let momenta = self.water_momentum_buffer.as_slice();
        let velocities = self.water_velocity_buffer.as_mut_slice();

        for ((velocity, &momentum), &quantity) in velocities.iter_mut().zip(momenta).zip(water) {
            *velocity = if quantity != 0.0 {
                momentum / quantity
            } else {
                // No mass, no velocity
                Vec2::ZERO
            };
        }

        self.water_representation = WaterRepresentation::Velocity;
    }

    #[inline]
    pub fn is_leaking(&self, index: ElementIndex) -> bool {
        self.is_leaking_buffer[index]
    }

    #[inline]
    pub fn set_leaking(&mut self, index: ElementIndex) {
        self.is_leaking_buffer[index] = true;
    }

    //
    // Electrical dynamics
    //

    #[inline]
    pub fn electrical_element(&self, index: ElementIndex) -> ElementIndex {
        self.electrical_element_buffer[index]
    }

    #[inline]
    pub fn light(&self, index: ElementIndex) -> f32 {
        self.light_buffer[index]
    }

    #[inline]
    pub fn light_mut(&mut self, index: ElementIndex) -> &mut f32 {
        &mut self.light_buffer[index]
    }

    //
    // Network
    //

    #[inline]
    pub fn connected_springs(&self, index: ElementIndex) -> &[ElementIndex] {
        &self.network_buffer[index].connected_springs
    }

    pub fn add_connected_spring(&mut self, index: ElementIndex, spring: ElementIndex) {
        let springs = &mut self.network_buffer[index].connected_springs;
        debug_assert!(springs.len() < MAX_SPRINGS_PER_POINT, "too many springs at point {index}");
        springs.push(spring);
    }

    /// Unlink a spring; the spring must be connected
    pub fn remove_connected_spring(&mut self, index: ElementIndex, spring: ElementIndex) {
        let found = erase_first(&mut self.network_buffer[index].connected_springs, spring);
        debug_assert!(found, "spring {spring} not connected to point {index}");
    }

    #[inline]
    pub fn connected_triangles(&self, index: ElementIndex) -> &[ElementIndex] {
        &self.network_buffer[index].connected_triangles
    }

    pub fn add_connected_triangle(&mut self, index: ElementIndex, triangle: ElementIndex) {
        let triangles = &mut self.network_buffer[index].connected_triangles;
        debug_assert!(
            triangles.len() < MAX_TRIANGLES_PER_POINT,
            "too many triangles at point {index}"
        );
        triangles.push(triangle);
    }

    /// Unlink a triangle; the triangle must be connected
    pub fn remove_connected_triangle(&mut self, index: ElementIndex, triangle: ElementIndex) {
        let found = erase_first(&mut self.network_buffer[index].connected_triangles, triangle);
        debug_assert!(found, "triangle {triangle} not connected to point {index}");
    }

    //
    // Pinning
    //

    #[inline]
    pub fn is_pinned(&self, index: ElementIndex) -> bool {
        self.is_pinned_buffer[index]
    }

    /// Freeze a point in place; it must not be pinned already
    pub fn pin(&mut self, index: ElementIndex) {
        debug_assert!(!self.is_pinned_buffer[index], "point {index} already pinned");

        self.is_pinned_buffer[index] = true;

        self.integration_factor_buffer[index] = Vec2::ZERO;
        self.velocity_buffer[index] = Vec2::ZERO;
    }

    /// Thaw a pinned point, recomputing its integration factor from its mass
    pub fn unpin(&mut self, index: ElementIndex) {
        debug_assert!(self.is_pinned_buffer[index], "point {index} not pinned");

        self.is_pinned_buffer[index] = false;

        self.integration_factor_buffer[index] =
            Self::calculate_integration_factor(self.mass_buffer[index]);
    }

    //
    // Connected component
    //

    #[inline]
    pub fn connected_component_id(&self, index: ElementIndex) -> ConnectedComponentId {
        self.connected_component_id_buffer[index]
    }

    #[inline]
    pub fn set_connected_component_id(&mut self, index: ElementIndex, id: ConnectedComponentId) {
        self.connected_component_id_buffer[index] = id;
    }

    #[inline]
    pub fn current_connected_component_detection_visit_sequence_number(
        &self,
        index: ElementIndex,
    ) -> VisitSequenceNumber {
        self.visit_sequence_number_buffer[index]
    }

    #[inline]
    pub fn set_current_connected_component_detection_visit_sequence_number(
        &mut self,
        index: ElementIndex,
        visit_sequence_number: VisitSequenceNumber,
    ) {
        self.visit_sequence_number_buffer[index] = visit_sequence_number;
    }

    //
    // Immutable render attributes
    //

    #[inline]
    pub fn color(&self, index: ElementIndex) -> Vec3 {
        self.color_buffer[index]
    }

    #[inline]
    pub fn texture_coordinates(&self, index: ElementIndex) -> Vec2 {
        self.texture_coordinates_buffer[index]
    }

    //
    // Temporary buffers
    //

    pub fn allocate_work_buffer_float(&self) -> PooledBuffer<f32> {
        self.float_buffer_allocator.allocate()
    }

    pub fn allocate_work_buffer_vec2(&self) -> PooledBuffer<Vec2> {
        self.vec2_buffer_allocator.allocate()
    }

    //
    // Queries
    //

    /// Nearest live point within `radius` of `position`
    pub fn find_nearest(&self, position: Vec2, radius: f32) -> Option<ElementIndex> {
        let radius_squared = radius * radius;
        self.iter()
            .filter(|&p| !self.is_deleted(p))
            .map(|p| (p, self.position(p).distance_squared(position)))
            .filter(|&(_, d)| d < radius_squared)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p)
    }
}

/// Mutable views over the mechanical buffers, borrowed together
pub struct DynamicsBuffers<'a> {
    pub positions: &'a mut [Vec2],
    pub velocities: &'a mut [Vec2],
    pub forces: &'a mut [Vec2],
    pub integration_factors: &'a [Vec2],
}

/// Remove the first occurrence of `value` (order not preserved)
fn erase_first<A: smallvec::Array<Item = ElementIndex>>(
    list: &mut SmallVec<A>,
    value: ElementIndex,
) -> bool {
    match list.iter().position(|&v| v == value) {
        Some(i) => {
            list.swap_remove(i);
            true
        }
        None => false,
    }
}
