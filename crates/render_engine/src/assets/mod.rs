//! Asset loading
//!
//! Thin file-format collaborators for the renderer: an OBJ mesh parser and an
//! RGBA8 image decoder. Neither touches the GPU; the render layer consumes
//! their output.

pub mod image_loader;
pub mod obj_loader;

pub use image_loader::{load_rgba8, ImageError, RgbaImage};
pub use obj_loader::{load_obj, parse_obj, FaceVertex, MaterialGroup, ObjError, ObjMesh};
