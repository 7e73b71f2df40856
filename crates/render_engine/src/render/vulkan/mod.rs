//! Vulkan rendering backend
//!
//! Everything that talks to the GPU lives here: device setup, swapchain and
//! frame synchronization, resource wrappers, pipelines, and the frame
//! orchestrator. The module is layered leaf-first — `context` has no
//! dependencies on the rest, `renderer` depends on everything.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

pub mod buffer;
pub mod commands;
pub mod context;
pub mod frame;
pub mod framebuffers;
pub mod model;
pub mod pipelines;
pub mod renderer;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use buffer::Buffer;
pub use commands::CommandPool;
pub use context::{
    find_memory_type, LogicalDevice, PhysicalDeviceInfo, QueueFamilyIndices, VulkanContext,
    VulkanInstance,
};
pub use frame::{AcquireOutcome, FrameCycle, PresentOutcome};
pub use framebuffers::{FramebufferSet, ImageSettings};
pub use model::Model;
pub use pipelines::{FrameInput, OverlayPipeline, Pipeline, ViewportPipeline};
pub use renderer::Renderer;
pub use shader::{DescriptorSetLayout, GraphicsPipeline, PipelineSettings, RenderPass, ShaderModule};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use texture::{find_supported_format, DepthImage, TextureImage};

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// Raw Vulkan API error, wrapped at the call site
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Context or resource initialization failed
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// No memory type satisfies the requested properties
    #[error("no suitable memory type found")]
    NoSuitableMemoryType,

    /// A layout transition outside the supported set was requested
    #[error("unsupported image layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Requested source layout
        old: vk::ImageLayout,
        /// Requested destination layout
        new: vk::ImageLayout,
    },

    /// No candidate format supports the requested tiling and features
    #[error("no supported format among candidates")]
    NoSupportedFormat,

    /// Shader bytecode could not be loaded
    #[error("failed to load shader {path:?}: {message}")]
    ShaderLoad {
        /// Path of the missing or unreadable file
        path: PathBuf,
        /// Reason reported by the loader
        message: String,
    },

    /// Window-layer failure surfaced during rendering
    #[error("window error: {0}")]
    Window(#[from] crate::render::window::WindowError),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
