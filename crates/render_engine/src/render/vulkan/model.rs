//! GPU-resident model: device-local vertex and index buffers

use ash::vk;

use crate::render::mesh::Mesh;
use crate::render::vulkan::{Buffer, CommandPool, VulkanContext, VulkanError, VulkanResult};

/// A mesh uploaded to device-local memory.
///
/// The buffers are exclusively owned; drawing records against them but never
/// transfers ownership.
pub struct Model {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    vertex_count: u32,
}

impl Model {
    /// Upload a mesh through the staging path.
    pub fn new(context: &VulkanContext, pool: &CommandPool, mesh: &Mesh) -> VulkanResult<Self> {
        if mesh.indices.is_empty() || mesh.vertices.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "cannot upload an empty mesh".to_string(),
            ));
        }

        let vertex_buffer = Buffer::device_local(
            context,
            pool,
            bytemuck::cast_slice(&mesh.vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let index_buffer = Buffer::device_local(
            context,
            pool,
            bytemuck::cast_slice(&mesh.indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        log::debug!(
            "uploaded model: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            vertex_count: mesh.vertices.len() as u32,
        })
    }

    /// Record bind-and-draw commands into an open command buffer.
    pub fn record_draw(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[self.vertex_buffer.handle()],
                &[0],
            );
            device.cmd_bind_index_buffer(
                command_buffer,
                self.index_buffer.handle(),
                0,
                vk::IndexType::UINT32,
            );
            device.cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
        }
    }

    /// Number of indices drawn per instance.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Number of unique vertices.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}
