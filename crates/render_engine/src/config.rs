//! Engine configuration
//!
//! Configuration for the renderer and demo applications, loadable from a TOML
//! file. Every field has a sensible default so a missing or partial file is
//! never an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the Vulkan driver
    pub application_name: String,
    /// Maximum number of frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: usize,
    /// Clear color for the viewport pass (RGBA)
    pub clear_color: [f32; 4],
    /// Directory holding compiled `<pass>.vert.spv` / `<pass>.frag.spv` files
    pub shader_dir: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "render_engine".to_string(),
            max_frames_in_flight: 2,
            clear_color: [0.02, 0.02, 0.05, 1.0],
            shader_dir: PathBuf::from("target/shaders"),
        }
    }
}

/// Window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial window width in pixels
    pub width: u32,
    /// Initial window height in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Render Engine".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Demo asset locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// OBJ model to display
    pub model: PathBuf,
    /// Texture applied to the model
    pub texture: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("resources/models/cube.obj"),
            texture: PathBuf::from("resources/textures/base.png"),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Window settings
    pub window: WindowConfig,
    /// Demo asset locations
    pub assets: AssetConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Set the application name.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.renderer.application_name = name.into();
        self
    }

    /// Set the frames-in-flight count.
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.renderer.max_frames_in_flight = frames;
        self
    }

    /// Basic sanity checks on the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.renderer.max_frames_in_flight == 0 {
            return Err("max_frames_in_flight must be at least 1".to_string());
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err("window dimensions must be non-zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.renderer.max_frames_in_flight, 2);
    }

    #[test]
    fn parses_partial_toml() {
        let toml = r#"
[window]
width = 640
height = 480

[renderer]
max_frames_in_flight = 3
"#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.window.width, 640);
        assert_eq!(config.renderer.max_frames_in_flight, 3);
        // Unspecified fields keep their defaults
        assert_eq!(config.renderer.application_name, "render_engine");
    }

    #[test]
    fn zero_frames_in_flight_is_rejected() {
        let config = EngineConfig::default().with_max_frames_in_flight(0);
        assert!(config.validate().is_err());
    }
}
