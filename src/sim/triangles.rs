//! Triangles: the surfaces filling in a ship's structure

use super::buffer::{Buffer, ElementContainer};
use super::points::Points;
use super::types::{ElementCount, ElementIndex, NONE_ELEMENT_INDEX};
use crate::render::RenderContext;

pub struct Triangles {
    container: ElementContainer,
    next_free_index: ElementIndex,

    is_deleted_buffer: Buffer<bool>,
    endpoints_buffer: Buffer<[ElementIndex; 3]>,
}

impl Triangles {
    pub fn new(element_count: ElementCount) -> Self {
        Self {
            container: ElementContainer::new(element_count),
            next_free_index: 0,
            is_deleted_buffer: Buffer::new(element_count, true),
            endpoints_buffer: Buffer::new(element_count, [NONE_ELEMENT_INDEX; 3]),
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

    pub fn add(
        &mut self,
        point_a_index: ElementIndex,
        point_b_index: ElementIndex,
        point_c_index: ElementIndex,
        points: &mut Points,
    ) -> ElementIndex {
        let index = self.next_free_index;
        debug_assert!(index < self.element_count(), "triangles container is full");
        self.next_free_index += 1;

        self.is_deleted_buffer[index] = false;
        self.endpoints_buffer[index] = [point_a_index, point_b_index, point_c_index];

        for point_index in [point_a_index, point_b_index, point_c_index] {
            points.add_connected_triangle(point_index, index);
        }

        index
    }

    pub fn destroy(&mut self, index: ElementIndex, points: &mut Points) {
        debug_assert!(!self.is_deleted(index), "triangle {index} destroyed twice");

        for point_index in self.endpoints_buffer[index] {
            points.remove_connected_triangle(point_index, index);
        }

        self.is_deleted_buffer[index] = true;
    }

    pub fn upload(&self, ship_id: u32, render: &mut dyn RenderContext) {
        let indices: Vec<[ElementIndex; 3]> = self
            .iter()
            .filter(|&t| !self.is_deleted(t))
            .map(|t| self.endpoints_buffer[t])
            .collect();

        render.upload_ship_triangles(ship_id, bytemuck::cast_slice(&indices));
    }

    #[inline]
    pub fn is_deleted(&self, index: ElementIndex) -> bool {
        self.is_deleted_buffer[index]
    }

    #[inline]
    pub fn endpoints(&self, index: ElementIndex) -> [ElementIndex; 3] {
        self.endpoints_buffer[index]
    }

    /// Whether both points are vertices of the triangle
    #[inline]
    pub fn contains_edge(&self, index: ElementIndex, a: ElementIndex, b: ElementIndex) -> bool {
        let vertices = &self.endpoints_buffer[index];
        vertices.contains(&a) && vertices.contains(&b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use glam::{Vec2, Vec3};
    use std::sync::Arc;

    fn points(count: u32) -> Points {
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
        let mut points = Points::new(count);
        for i in 0..count {
            points.add(
                Vec2::new(i as f32, (i % 2) as f32),
                Arc::clone(&material),
                false,
                false,
                NONE_ELEMENT_INDEX,
                1.0,
                Vec3::ONE,
                Vec2::ZERO,
            );
        }
        points
    }

    #[test]
    fn test_add_and_destroy_maintain_networks() {
        let mut points = points(4);
        let mut triangles = Triangles::new(2);

        let t0 = triangles.add(0, 1, 2, &mut points);
        let t1 = triangles.add(1, 2, 3, &mut points);
        assert_eq!(points.connected_triangles(1).len(), 2);
        assert!(triangles.contains_edge(t0, 2, 0));
        assert!(!triangles.contains_edge(t0, 0, 3));

        triangles.destroy(t0, &mut points);
        assert!(triangles.is_deleted(t0));
        assert!(points.connected_triangles(0).is_empty());
        assert_eq!(points.connected_triangles(1), &[t1]);
    }
}
