//! Immediate-mode UI draw data
//!
//! The overlay pipeline consumes flat vertex/index arrays rebuilt every
//! frame. Widget logic lives in the application; this module only defines the
//! wire format and a couple of helpers for composing it.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

/// Vertex layout for the UI overlay pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UiVertex {
    /// Position in framebuffer pixels, origin top-left
    pub position: [f32; 2],
    /// Texture coordinate into the bound overlay texture
    pub tex_coord: [f32; 2],
    /// RGBA color multiplied with the sampled texel
    pub color: [f32; 4],
}

impl UiVertex {
    /// Vertex buffer binding description.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<UiVertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    /// Attribute descriptions matching the overlay shader.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32_SFLOAT,
                offset: 8,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: 16,
            },
        ]
    }
}

/// One frame's worth of UI geometry.
#[derive(Debug, Clone, Default)]
pub struct UiDrawData {
    /// Overlay vertices in pixel coordinates
    pub vertices: Vec<UiVertex>,
    /// Triangle-list indices into `vertices`
    pub indices: Vec<u32>,
}

impl UiDrawData {
    /// Clear the lists without releasing capacity.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Whether there is anything to draw.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of indices to draw.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Append a textured quad covering `[x, y] .. [x + w, y + h]`.
    pub fn push_quad(&mut self, x: f32, y: f32, w: f32, h: f32, uv0: [f32; 2], uv1: [f32; 2], color: [f32; 4]) {
        let base = self.vertices.len() as u32;
        self.vertices.push(UiVertex { position: [x, y], tex_coord: [uv0[0], uv0[1]], color });
        self.vertices.push(UiVertex { position: [x + w, y], tex_coord: [uv1[0], uv0[1]], color });
        self.vertices.push(UiVertex { position: [x + w, y + h], tex_coord: [uv1[0], uv1[1]], color });
        self.vertices.push(UiVertex { position: [x, y + h], tex_coord: [uv0[0], uv1[1]], color });
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    /// Append a flat-colored panel.
    pub fn push_panel(&mut self, x: f32, y: f32, w: f32, h: f32, color: [f32; 4]) {
        // Negative texcoords mark untextured geometry; the overlay shader
        // substitutes white for the sampled texel.
        self.push_quad(x, y, w, h, [-1.0, -1.0], [-1.0, -1.0], color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_emits_two_triangles() {
        let mut draw = UiDrawData::default();
        draw.push_quad(10.0, 20.0, 100.0, 50.0, [0.0, 0.0], [1.0, 1.0], [1.0; 4]);
        assert_eq!(draw.vertices.len(), 4);
        assert_eq!(draw.indices.len(), 6);
        assert_eq!(draw.index_count(), 6);
        assert!(draw.indices.iter().all(|&i| (i as usize) < draw.vertices.len()));
    }

    #[test]
    fn indices_offset_by_existing_vertices() {
        let mut draw = UiDrawData::default();
        draw.push_panel(0.0, 0.0, 10.0, 10.0, [0.5; 4]);
        draw.push_panel(20.0, 0.0, 10.0, 10.0, [0.5; 4]);
        assert_eq!(draw.indices[6..], [4, 5, 6, 6, 7, 4]);
    }

    #[test]
    fn clear_keeps_nothing_to_draw() {
        let mut draw = UiDrawData::default();
        draw.push_panel(0.0, 0.0, 1.0, 1.0, [1.0; 4]);
        draw.clear();
        assert!(draw.is_empty());
    }
}
