//! # Render Engine
//!
//! A small real-time 3D rendering engine built directly on Vulkan. It sets
//! up a GPU device, swapchain, pipelines, framebuffers and synchronization
//! primitives, then drives a per-frame loop that draws a textured model into
//! an offscreen viewport and composites it with an immediate-mode UI
//! overlay.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use render_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::load("engine.toml")?;
//!     let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
//!
//!     let obj = render_engine::assets::load_obj("model.obj")?;
//!     let mesh = Mesh::from_obj(&obj);
//!     let pixels = render_engine::assets::load_rgba8("texture.png")?;
//!
//!     let mut renderer = Renderer::new(&mut window, &config.renderer, &mesh, &pixels)?;
//!     let ui = UiDrawData::default();
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         let input = FrameInput {
//!             model: Mat4::identity(),
//!             view: look_at(Point3::new(2.0, 2.0, 2.0), Point3::origin(), Vec3::z()),
//!             projection: perspective_vk(45f32.to_radians(), 16.0 / 9.0, 0.1, 100.0),
//!             ui: &ui,
//!         };
//!         renderer.draw_frame(&mut window, &input)?;
//!     }
//!     renderer.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod render;

pub use config::{ConfigError, EngineConfig, RendererConfig, WindowConfig};
pub use render::{FrameInput, Mesh, Renderer, UiDrawData, Vertex, Window};

/// Common imports for engine users
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::foundation::math::{look_at, perspective_vk, rotation, Mat4, Point3, Vec3};
    pub use crate::render::{
        FrameInput, Mesh, Renderer, UiDrawData, VulkanError, VulkanResult, Window,
    };
}
