//! Command pool and command buffer management
//!
//! One pool per queue family, created with per-buffer reset so the frame
//! orchestrator can re-record individual buffers. Single-time submission is
//! exposed as a scoped helper: it blocks on queue idle and frees the buffer
//! on every exit path. That blocking design is for load-time uploads and
//! barrier-only operations only — the steady-state frame path synchronizes
//! with fences and semaphores instead.

use ash::vk;
use ash::Device;

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a command pool supporting individual command-buffer reset.
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate primary command buffers from this pool.
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Record and submit a one-shot command buffer, blocking until the queue
    /// drains. The buffer is freed whether recording, submission, or the
    /// idle wait fails.
    pub fn single_time_commands<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let command_buffer = self.allocate_command_buffers(1)?[0];
        let result = self.single_time_inner(queue, command_buffer, record);
        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &[command_buffer]);
        }
        result
    }

    fn single_time_inner<F>(
        &self,
        queue: vk::Queue,
        command_buffer: vk::CommandBuffer,
        record: F,
    ) -> VulkanResult<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        record(command_buffer);

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
            self.device
                .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device
                .queue_wait_idle(queue)
                .map_err(VulkanError::Api)?;
        }

        Ok(())
    }

    /// Command pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // All command buffers are freed with the pool.
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
