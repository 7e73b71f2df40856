//! GLFW-based window management for Vulkan rendering
//!
//! Owns the OS window and event pump. The renderer only sees the opaque
//! window handle, the framebuffer size, and a resize flag set from the
//! framebuffer-size event.

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW library initialization failed
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// Window creation failed
    #[error("window creation failed")]
    CreationFailed,

    /// Other GLFW error
    #[error("GLFW error: {0}")]
    Glfw(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with resize tracking
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    framebuffer_resized: bool,
}

impl Window {
    /// Create a window configured for Vulkan (no client API context).
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
            framebuffer_resized: false,
        })
    }

    /// Whether the user requested the window to close.
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request the window to close.
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Poll pending events and update the resize flag. Returns the drained
    /// events so the application can react to input.
    pub fn poll_events(&mut self) -> Vec<glfw::WindowEvent> {
        self.glfw.poll_events();
        self.drain_events()
    }

    /// Block until at least one event arrives, then drain. Used while the
    /// window is minimized and rendering is pointless.
    pub fn wait_events(&mut self) -> Vec<glfw::WindowEvent> {
        self.glfw.wait_events();
        self.drain_events()
    }

    fn drain_events(&mut self) -> Vec<glfw::WindowEvent> {
        let mut drained = Vec::new();
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::FramebufferSize(_, _) = event {
                self.framebuffer_resized = true;
            }
            drained.push(event);
        }
        drained
    }

    /// Framebuffer size in pixels (can differ from window size on hidpi).
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width as u32, height as u32)
    }

    /// True once after the framebuffer was resized; clears the flag.
    pub fn take_framebuffer_resized(&mut self) -> bool {
        std::mem::take(&mut self.framebuffer_resized)
    }

    /// Peek the resize flag without clearing it.
    pub fn framebuffer_resized(&self) -> bool {
        self.framebuffer_resized
    }

    /// Instance extensions GLFW needs for surface creation.
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::Glfw("no required instance extensions".to_string()))
    }

    /// Create a Vulkan surface for this window.
    pub fn create_surface(&mut self, instance: ash::vk::Instance) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);
        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::Glfw(format!(
                "failed to create Vulkan surface: {:?}",
                result
            )))
        }
    }
}
