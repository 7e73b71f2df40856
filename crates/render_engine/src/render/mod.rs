//! Rendering layer
//!
//! The window shell, CPU-side mesh and UI data, and the Vulkan backend that
//! turns them into presented frames.

pub mod mesh;
pub mod ui;
pub mod vulkan;
pub mod window;

pub use mesh::{Mesh, Vertex};
pub use ui::{UiDrawData, UiVertex};
pub use vulkan::{FrameInput, Renderer, VulkanError, VulkanResult};
pub use window::{Window, WindowError};
