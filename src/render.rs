//! Render upload sink
//!
//! The simulation never draws. Once per frame the host asks each ship to
//! upload its current state into a `RenderContext`, which copies whatever it
//! needs into its own vertex buffers. Uploads are pure reads of simulation
//! state.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::sim::ConnectedComponentId;

/// Groups of frames in the texture atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureGroupType {
    TimerBomb,
    TimerBombFuse,
    TimerBombDefuse,
    TimerBombExplosion,
    RcBomb,
    RcBombPing,
    RcBombExplosion,
    ImpactBomb,
    ImpactBombExplosion,
    AntiMatterBombArmor,
    AntiMatterBombSphere,
    AntiMatterBombSphereCloud,
    AntiMatterBombExplosion,
}

/// A single frame in a texture group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureFrameId {
    pub group: TextureGroupType,
    pub frame_index: u32,
}

impl TextureFrameId {
    pub const fn new(group: TextureGroupType, frame_index: u32) -> Self {
        Self { group, frame_index }
    }
}

/// A textured quad anchored to a ship (bombs and their effects)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenericTextureRenderSpecification {
    pub connected_component_id: ConnectedComponentId,
    pub frame_id: TextureFrameId,
    pub position: Vec2,
    pub scale: f32,
    /// Axis the frame is rotated from
    pub rotation_base_axis: Vec2,
    /// Axis the frame is rotated to
    pub rotation_offset_axis: Vec2,
    pub alpha: f32,
}

impl GenericTextureRenderSpecification {
    /// Quad vertex in the layout render backends consume
    pub fn to_vertex(&self) -> GenericTextureVertex {
        let angle = self.rotation_base_axis.angle_to(self.rotation_offset_axis);
        GenericTextureVertex {
            position: self.position.to_array(),
            scale: self.scale,
            angle,
            alpha: self.alpha,
            frame_index: self.frame_id.frame_index as f32,
        }
    }
}

/// Per-quad vertex data for generic textures
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GenericTextureVertex {
    pub position: [f32; 2],
    pub scale: f32,
    /// Rotation in radians, counter-clockwise
    pub angle: f32,
    pub alpha: f32,
    pub frame_index: f32,
}

/// Receiver of per-frame ship state
pub trait RenderContext {
    /// Colours (rgb triples) and texture coordinates (uv pairs); uploaded once per ship
    fn upload_ship_point_immutable_attributes(
        &mut self,
        ship_id: u32,
        colors: &[f32],
        texture_coordinates: &[f32],
    );

    /// Positions (xy pairs), light and water, one entry per point
    fn upload_ship_points(&mut self, ship_id: u32, positions: &[f32], light: &[f32], water: &[f32]);

    /// Point index pairs of all live springs
    fn upload_ship_springs(&mut self, ship_id: u32, point_indices: &[u32]);

    /// Point index triples of all live triangles
    fn upload_ship_triangles(&mut self, ship_id: u32, point_indices: &[u32]);

    fn upload_ship_generic_texture_render_specification(
        &mut self,
        ship_id: u32,
        specification: &GenericTextureRenderSpecification,
    );
}

/// Render context that keeps the latest upload, for headless runs and tests
#[derive(Debug, Default)]
pub struct CapturingRenderContext {
    pub immutable_attribute_uploads: usize,
    pub point_count: usize,
    pub spring_indices: Vec<u32>,
    pub triangle_indices: Vec<u32>,
    pub generic_textures: Vec<GenericTextureRenderSpecification>,
}

impl CapturingRenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget per-frame state, keeping the immutable attribute counter
    pub fn begin_frame(&mut self) {
        self.point_count = 0;
        self.spring_indices.clear();
        self.triangle_indices.clear();
        self.generic_textures.clear();
    }

    /// Generic texture quads as raw vertex bytes
    pub fn generic_texture_vertex_bytes(&self) -> Vec<u8> {
        let vertices: Vec<GenericTextureVertex> =
            self.generic_textures.iter().map(|s| s.to_vertex()).collect();
        bytemuck::cast_slice(&vertices).to_vec()
    }
}

impl RenderContext for CapturingRenderContext {
    fn upload_ship_point_immutable_attributes(
        &mut self,
        _ship_id: u32,
        _colors: &[f32],
        _texture_coordinates: &[f32],
    ) {
        self.immutable_attribute_uploads += 1;
    }

    fn upload_ship_points(&mut self, _ship_id: u32, positions: &[f32], _light: &[f32], _water: &[f32]) {
        self.point_count += positions.len() / 2;
    }

    fn upload_ship_springs(&mut self, _ship_id: u32, point_indices: &[u32]) {
        self.spring_indices.extend_from_slice(point_indices);
    }

    fn upload_ship_triangles(&mut self, _ship_id: u32, point_indices: &[u32]) {
        self.triangle_indices.extend_from_slice(point_indices);
    }

    fn upload_ship_generic_texture_render_specification(
        &mut self,
        _ship_id: u32,
        specification: &GenericTextureRenderSpecification,
    ) {
        self.generic_textures.push(*specification);
    }
}
