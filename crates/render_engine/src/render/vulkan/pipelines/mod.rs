//! Render pipelines
//!
//! The renderer drives a closed set of pipeline variants through the
//! [`Pipeline`] trait: the offscreen viewport pass that draws the textured
//! model, and the presentation-facing overlay pass that composites the
//! viewport image and immediate-mode UI. Variants are chosen at construction
//! time; the trait only exists so the frame orchestrator can treat them
//! uniformly.

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat4;
use crate::render::ui::UiDrawData;
use crate::render::vulkan::{CommandPool, Swapchain, VulkanContext, VulkanResult};

pub mod overlay;
pub mod viewport;

pub use overlay::OverlayPipeline;
pub use viewport::ViewportPipeline;

/// Per-frame data the application hands the renderer.
pub struct FrameInput<'a> {
    /// Model transform for the scene mesh
    pub model: Mat4,
    /// Camera view matrix
    pub view: Mat4,
    /// Projection matrix (already Vulkan-corrected)
    pub projection: Mat4,
    /// UI geometry for the overlay
    pub ui: &'a UiDrawData,
}

/// Uniform block for the viewport pass, written through a persistent mapping
/// each frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SceneUbo {
    /// Model matrix
    pub model: [[f32; 4]; 4],
    /// View matrix
    pub view: [[f32; 4]; 4],
    /// Projection matrix
    pub projection: [[f32; 4]; 4],
}

/// Uniform block for the overlay pass: pixel-to-clip projection.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct OverlayUbo {
    /// Orthographic projection over the framebuffer
    pub projection: [[f32; 4]; 4],
}

/// Capability interface the frame orchestrator records through.
///
/// Lifecycle: construct, `init_resources` once, then per frame
/// `begin_frame` -> `record_buffer` -> `end_frame`; `recreate_resources`
/// whenever the swapchain was rebuilt.
pub trait Pipeline {
    /// Allocate per-slot resources that need the shared command pool.
    fn init_resources(
        &mut self,
        context: &VulkanContext,
        pool: &CommandPool,
        slots: usize,
    ) -> VulkanResult<()>;

    /// Update this slot's per-frame data (uniforms, dynamic geometry). Called
    /// after the slot's fence wait, so the slot's resources are free.
    fn begin_frame(
        &mut self,
        context: &VulkanContext,
        slot: usize,
        input: &FrameInput<'_>,
        extent: vk::Extent2D,
    ) -> VulkanResult<()>;

    /// Re-record this slot's command buffer against the acquired image.
    fn record_buffer(
        &mut self,
        context: &VulkanContext,
        slot: usize,
        image_index: u32,
    ) -> VulkanResult<vk::CommandBuffer>;

    /// Hook after submission; slots needing post-frame bookkeeping use it.
    fn end_frame(&mut self, slot: usize);

    /// Rebuild swapchain-dependent resources after recreation. Every
    /// pipeline must complete this before any new frame is recorded.
    fn recreate_resources(
        &mut self,
        context: &VulkanContext,
        swapchain: &Swapchain,
    ) -> VulkanResult<()>;
}
