//! GPU buffer management
//!
//! RAII buffer + memory pairs. Memory is freed strictly after the buffer
//! handle in `Drop`, and a failed memory-type lookup destroys the freshly
//! created handle before reporting the error, so no partially-created
//! resource ever leaks.
//!
//! Device-local data goes through the staging pattern: a host-visible
//! scratch buffer is filled, a one-shot command buffer copies it into the
//! device-local destination, and the submission blocks until the queue is
//! idle. Acceptable for load-time assets; never used in the per-frame path.

use ash::vk;
use ash::Device;
use std::ffi::c_void;

use crate::render::vulkan::{CommandPool, VulkanContext, VulkanError, VulkanResult};

/// Buffer with exclusively owned backing memory
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: Option<*mut c_void>,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory to it.
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = match super::context::find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            properties,
        ) {
            Some(index) => index,
            None => {
                // The buffer handle must not leak past the failure.
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::NoSuitableMemoryType);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            mapped: None,
        })
    }

    /// Create a host-visible buffer and keep it persistently mapped.
    ///
    /// Used for per-frame uniform buffers: the frame loop writes through the
    /// cached pointer instead of re-mapping every frame.
    pub fn persistent(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let mut buffer = Self::new(
            device,
            memory_properties,
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let mapped = unsafe {
            buffer
                .device
                .map_memory(buffer.memory, 0, size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?
        };
        buffer.mapped = Some(mapped);
        Ok(buffer)
    }

    /// Create a device-local buffer filled through a staging copy.
    pub fn device_local(
        context: &VulkanContext,
        pool: &CommandPool,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let size = data.len() as vk::DeviceSize;
        let memory_properties = &context.physical_device().memory_properties;

        let staging = Self::new(
            context.raw_device(),
            memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(data)?;

        let destination = Self::new(
            context.raw_device(),
            memory_properties,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        pool.single_time_commands(context.graphics_queue(), |command_buffer| {
            let region = vk::BufferCopy::builder().size(size).build();
            unsafe {
                context.device().device.cmd_copy_buffer(
                    command_buffer,
                    staging.handle(),
                    destination.handle(),
                    &[region],
                );
            }
        })?;
        // Staging buffer and memory are released here in every path.

        Ok(destination)
    }

    /// Map, copy, unmap. For one-off writes into host-visible buffers.
    pub fn write_bytes(&self, data: &[u8]) -> VulkanResult<()> {
        if let Some(mapped) = self.mapped {
            unsafe {
                std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast(), data.len());
            }
            return Ok(());
        }

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast(), data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Write POD values through the persistent mapping (or a transient map
    /// when the buffer is not persistently mapped).
    pub fn write_slice<T: bytemuck::Pod>(&self, data: &[T]) -> VulkanResult<()> {
        self.write_bytes(bytemuck::cast_slice(data))
    }

    /// Buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Buffer size in bytes.
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
