//! CPU-side mesh data and vertex deduplication
//!
//! Converts parsed OBJ data into the vertex/index arrays the GPU consumes.
//! Identical (position, color, texcoord) triples are collapsed to a single
//! vertex slot, assigned in first-seen order.

use crate::assets::ObjMesh;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use std::mem::size_of;

/// Vertex layout for the textured-mesh pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Vertex color, white unless the source provides one
    pub color: [f32; 3],
    /// Texture coordinate, V flipped for Vulkan's image origin
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Vertex buffer binding description.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    /// Attribute descriptions matching the shader input locations.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: 24,
            },
        ]
    }

    /// Exact-equality key for deduplication. Floats are compared by bit
    /// pattern, so -0.0 and 0.0 are distinct slots, matching the loader's
    /// exact-match contract.
    fn key(&self) -> [u32; 8] {
        [
            self.position[0].to_bits(),
            self.position[1].to_bits(),
            self.position[2].to_bits(),
            self.color[0].to_bits(),
            self.color[1].to_bits(),
            self.color[2].to_bits(),
            self.tex_coord[0].to_bits(),
            self.tex_coord[1].to_bits(),
        ]
    }
}

/// Mesh ready for GPU upload.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Deduplicated vertices
    pub vertices: Vec<Vertex>,
    /// Triangle-list indices into `vertices`
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Build a mesh from parsed OBJ data.
    ///
    /// Positions come through unchanged, texture coordinates are V-flipped
    /// (`v' = 1 - v`), and vertices get a constant white color. Faces without
    /// texcoords map to (0, 0).
    pub fn from_obj(obj: &ObjMesh) -> Self {
        let mut mesh = Mesh::default();
        let mut unique: HashMap<[u32; 8], u32> = HashMap::new();

        for triangle in &obj.triangles {
            for corner in triangle {
                let position = obj.positions[corner.position as usize];
                let tex_coord = corner
                    .tex_coord
                    .map(|index| {
                        let [u, v] = obj.tex_coords[index as usize];
                        [u, 1.0 - v]
                    })
                    .unwrap_or([0.0, 0.0]);
                let vertex = Vertex {
                    position,
                    color: [1.0, 1.0, 1.0],
                    tex_coord,
                };

                let next_index = mesh.vertices.len() as u32;
                let index = *unique.entry(vertex.key()).or_insert_with(|| {
                    mesh.vertices.push(vertex);
                    next_index
                });
                mesh.indices.push(index);
            }
        }

        mesh
    }

    /// Number of indices to draw.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// A unit quad in the XY plane, used by tests and as a fallback model.
    pub fn unit_quad() -> Self {
        let vertices = vec![
            Vertex { position: [-0.5, -0.5, 0.0], color: [1.0; 3], tex_coord: [0.0, 1.0] },
            Vertex { position: [0.5, -0.5, 0.0], color: [1.0; 3], tex_coord: [1.0, 1.0] },
            Vertex { position: [0.5, 0.5, 0.0], color: [1.0; 3], tex_coord: [1.0, 0.0] },
            Vertex { position: [-0.5, 0.5, 0.0], color: [1.0; 3], tex_coord: [0.0, 0.0] },
        ];
        let indices = vec![0, 1, 2, 2, 3, 0];
        Self { vertices, indices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::parse_obj;

    const CUBE_FACE: &str = r#"
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3
f 1/1 3/3 4/4
"#;

    #[test]
    fn shared_corners_are_deduplicated() {
        let obj = parse_obj(CUBE_FACE).unwrap();
        let mesh = Mesh::from_obj(&obj);
        // Six corners, but only four unique (position, color, texcoord) triples
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn loading_twice_yields_identical_arrays() {
        let obj = parse_obj(CUBE_FACE).unwrap();
        let first = Mesh::from_obj(&obj);
        let second = Mesh::from_obj(&obj);
        assert_eq!(first.vertices, second.vertices);
        assert_eq!(first.indices, second.indices);
    }

    #[test]
    fn indices_stay_in_bounds() {
        let obj = parse_obj(CUBE_FACE).unwrap();
        let mesh = Mesh::from_obj(&obj);
        let vertex_count = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&index| index < vertex_count));
    }

    #[test]
    fn tex_coords_are_v_flipped() {
        let obj = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0.25\nvt 1 1\nvt 0 0\nf 1/1 2/2 3/3\n")
            .unwrap();
        let mesh = Mesh::from_obj(&obj);
        assert_eq!(mesh.vertices[0].tex_coord, [0.0, 0.75]);
        assert_eq!(mesh.vertices[1].tex_coord, [1.0, 0.0]);
    }

    #[test]
    fn missing_tex_coords_default_to_origin() {
        let obj = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mesh = Mesh::from_obj(&obj);
        assert!(mesh.vertices.iter().all(|v| v.tex_coord == [0.0, 0.0]));
        assert!(mesh.vertices.iter().all(|v| v.color == [1.0, 1.0, 1.0]));
    }
}
