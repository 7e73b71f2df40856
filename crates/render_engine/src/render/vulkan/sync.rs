//! Synchronization primitives for CPU/GPU frame coordination
//!
//! RAII wrappers over semaphores and fences, and the per-slot `FrameSync`
//! bundle the orchestrator cycles through. Semaphores order GPU work only;
//! the fence is the single CPU-visible backpressure mechanism that caps how
//! far recording can run ahead of execution.

use ash::vk;
use ash::Device;

use crate::render::vulkan::{VulkanError, VulkanResult};

/// GPU-GPU synchronization primitive with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore.
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Semaphore handle.
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-GPU synchronization primitive with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled. Frame-slot fences start
    /// signaled so the first wait on a never-submitted slot returns at once.
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Block until the fence signals. The timeout is effectively infinite;
    /// a hung driver stalls the process by design.
    pub fn wait(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(VulkanError::Api)
        }
    }

    /// Return the fence to the unsignaled state.
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Fence handle.
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one frame slot
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready for rendering
    pub image_available: Semaphore,
    /// Signaled when this slot's rendering is complete
    pub render_finished: Semaphore,
    /// Signaled when the GPU finishes this slot's submission
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the sync objects for one slot. The fence starts signaled.
    pub fn new(device: Device) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// Replace the image-available semaphore.
    ///
    /// An acquire that was abandoned (stale swapchain) may have left the old
    /// semaphore with a pending signal; it must not be waited on again.
    pub fn recreate_image_available(&mut self, device: Device) -> VulkanResult<()> {
        self.image_available = Semaphore::new(device)?;
        Ok(())
    }
}
