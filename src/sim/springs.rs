//! Springs: the structural links between points

use std::sync::Arc;

use super::buffer::{Buffer, ElementContainer};
use super::points::{DestroyHandler, Points};
use super::types::{ElementCount, ElementIndex, NONE_ELEMENT_INDEX};
use crate::consts::SIM_DT;
use crate::material::Material;
use crate::parameters::GameParameters;
use crate::render::RenderContext;

pub struct Springs {
    container: ElementContainer,
    next_free_index: ElementIndex,

    is_deleted_buffer: Buffer<bool>,
    /// Point index pairs
    endpoints_buffer: Buffer<[ElementIndex; 2]>,
    material_buffer: Buffer<Option<Arc<Material>>>,
    is_rope_buffer: Buffer<bool>,
    rest_length_buffer: Buffer<f32>,
    stiffness_coefficient_buffer: Buffer<f32>,
    damping_coefficient_buffer: Buffer<f32>,
    /// 0.0 blocks water, 1.0 lets it through
    water_permeability_buffer: Buffer<f32>,
    is_stressed_buffer: Buffer<bool>,

    destroy_handler: Option<DestroyHandler>,
}

impl Springs {
    pub fn new(element_count: ElementCount) -> Self {
        Self {
            container: ElementContainer::new(element_count),
            next_free_index: 0,
            is_deleted_buffer: Buffer::new(element_count, true),
            endpoints_buffer: Buffer::new(element_count, [NONE_ELEMENT_INDEX; 2]),
            material_buffer: Buffer::new(element_count, None),
            is_rope_buffer: Buffer::new(element_count, false),
            rest_length_buffer: Buffer::new(element_count, 1.0),
            stiffness_coefficient_buffer: Buffer::new(element_count, 0.0),
            damping_coefficient_buffer: Buffer::new(element_count, 0.0),
            water_permeability_buffer: Buffer::new(element_count, 0.0),
            is_stressed_buffer: Buffer::new(element_count, false),
            destroy_handler: None,
        }
    }

    #[inline]
    pub fn element_count(&self) -> ElementCount {
        self.container.element_count()
    }

    #[inline]
    pub fn iter(&self) -> std::ops::Range<ElementIndex> {
        self.container.iter()
    }

    /// Set the (single) handler invoked whenever a spring is destroyed
    ///
    /// Not re-entrant: the handler must not destroy springs.
    pub fn register_destroy_handler(&mut self, handler: DestroyHandler) {
        debug_assert!(self.destroy_handler.is_none(), "destroy handler already set");
        self.destroy_handler = Some(handler);
    }

    /// Link two points and register the spring with both of them
    pub fn add(
        &mut self,
        point_a_index: ElementIndex,
        point_b_index: ElementIndex,
        material: Arc<Material>,
        points: &mut Points,
        game_parameters: &GameParameters,
    ) -> ElementIndex {
        let index = self.next_free_index;
        debug_assert!(index < self.element_count(), "springs container is full");
        debug_assert_ne!(point_a_index, point_b_index);
        self.next_free_index += 1;

        self.is_deleted_buffer[index] = false;
        self.endpoints_buffer[index] = [point_a_index, point_b_index];
        self.is_rope_buffer[index] = material.is_rope;
        self.material_buffer[index] = Some(material);
        self.rest_length_buffer[index] = points
            .position(point_a_index)
            .distance(points.position(point_b_index));
        self.is_stressed_buffer[index] = false;

        // Hull to hull is watertight
        self.water_permeability_buffer[index] =
            if points.is_hull(point_a_index) && points.is_hull(point_b_index) {
                0.0
            } else {
                1.0
            };

        self.calculate_coefficients(index, points, game_parameters);

        points.add_connected_spring(point_a_index, index);
        points.add_connected_spring(point_b_index, index);

        index
    }

    /// Destroy a spring
    ///
    /// Notifies the destroy handler, unlinks the spring from its endpoints and
    /// lets water leak in at both of them.
    pub fn destroy(&mut self, index: ElementIndex, points: &mut Points) {
        debug_assert!(!self.is_deleted(index), "spring {index} destroyed twice");

        if let Some(handler) = self.destroy_handler.as_mut() {
            handler(index);
        }

        let [a, b] = self.endpoints_buffer[index];
        points.remove_connected_spring(a, index);
        points.remove_connected_spring(b, index);

        points.set_leaking(a);
        points.set_leaking(b);

        self.is_deleted_buffer[index] = true;
    }

    /// Recompute stiffness and damping after masses or parameters changed
    pub fn update_coefficients(&mut self, points: &Points, game_parameters: &GameParameters) {
        for index in self.iter() {
            if !self.is_deleted(index) {
                self.calculate_coefficients(index, points, game_parameters);
            }
        }
    }

    fn calculate_coefficients(
        &mut self,
        index: ElementIndex,
        points: &Points,
        game_parameters: &GameParameters,
    ) {
        let [a, b] = self.endpoints_buffer[index];
        let mass_a = points.mass(a);
        let mass_b = points.mass(b);
        let mass_factor = (mass_a * mass_b) / (mass_a + mass_b);

        let material_stiffness = self.material_buffer[index]
            .as_ref()
            .map_or(1.0, |m| m.stiffness);

        self.stiffness_coefficient_buffer[index] =
            game_parameters.stiffness_adjustment * material_stiffness * mass_factor
                / (SIM_DT * SIM_DT);

        self.damping_coefficient_buffer[index] =
            game_parameters.damping_adjustment * mass_factor / SIM_DT;
    }

    pub fn upload(&self, ship_id: u32, render: &mut dyn RenderContext) {
        let indices: Vec<[ElementIndex; 2]> = self
            .iter()
            .filter(|&s| !self.is_deleted(s))
            .map(|s| self.endpoints_buffer[s])
            .collect();

        render.upload_ship_springs(ship_id, bytemuck::cast_slice(&indices));
    }

    //
    // Accessors
    //

    #[inline]
    pub fn is_deleted(&self, index: ElementIndex) -> bool {
        self.is_deleted_buffer[index]
    }

    #[inline]
    pub fn endpoints(&self, index: ElementIndex) -> [ElementIndex; 2] {
        self.endpoints_buffer[index]
    }

    #[inline]
    pub fn point_a_index(&self, index: ElementIndex) -> ElementIndex {
        self.endpoints_buffer[index][0]
    }

    #[inline]
    pub fn point_b_index(&self, index: ElementIndex) -> ElementIndex {
        self.endpoints_buffer[index][1]
    }

    /// The endpoint across the spring from `point_index`
    #[inline]
    pub fn other_endpoint(&self, index: ElementIndex, point_index: ElementIndex) -> ElementIndex {
        let [a, b] = self.endpoints_buffer[index];
        if a == point_index { b } else { a }
    }

    #[inline]
    pub fn material(&self, index: ElementIndex) -> Option<&Arc<Material>> {
        self.material_buffer[index].as_ref()
    }

    #[inline]
    pub fn is_rope(&self, index: ElementIndex) -> bool {
        self.is_rope_buffer[index]
    }

    #[inline]
    pub fn rest_length(&self, index: ElementIndex) -> f32 {
        self.rest_length_buffer[index]
    }

    #[inline]
    pub fn stiffness_coefficient(&self, index: ElementIndex) -> f32 {
        self.stiffness_coefficient_buffer[index]
    }

    #[inline]
    pub fn damping_coefficient(&self, index: ElementIndex) -> f32 {
        self.damping_coefficient_buffer[index]
    }

    #[inline]
    pub fn water_permeability(&self, index: ElementIndex) -> f32 {
        self.water_permeability_buffer[index]
    }

    #[inline]
    pub fn is_stressed(&self, index: ElementIndex) -> bool {
        self.is_stressed_buffer[index]
    }

    #[inline]
    pub fn set_stressed(&mut self, index: ElementIndex, is_stressed: bool) {
        self.is_stressed_buffer[index] = is_stressed;
    }

    /// Current length between the endpoints
    #[inline]
    pub fn length(&self, index: ElementIndex, points: &Points) -> f32 {
        let [a, b] = self.endpoints_buffer[index];
        points.position(a).distance(points.position(b))
    }

    /// Relative elongation (or compression) from rest, always ≥ 0
    #[inline]
    pub fn strain(&self, index: ElementIndex, points: &Points) -> f32 {
        let rest_length = self.rest_length_buffer[index];
        (self.length(index, points) - rest_length).abs() / rest_length
    }

    /// Strain at which this spring breaks
    #[inline]
    pub fn breaking_elongation(&self, index: ElementIndex, game_parameters: &GameParameters) -> f32 {
        let strength = self.material_buffer[index]
            .as_ref()
            .map_or(1.0, |m| m.strength);
        game_parameters.breaking_elongation(strength)
    }

    /// Midpoint between the endpoints
    #[inline]
    pub fn midpoint(&self, index: ElementIndex, points: &Points) -> glam::Vec2 {
        let [a, b] = self.endpoints_buffer[index];
        (points.position(a) + points.position(b)) * 0.5
    }
}
