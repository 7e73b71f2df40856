//! Math utilities and types
//!
//! Provides the fundamental math types the renderer needs, plus the
//! Vulkan-specific projection helper.

pub use nalgebra::{Matrix4, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Right-handed perspective projection adjusted for Vulkan clip space.
///
/// Vulkan's framebuffer Y axis points down, so the Y scale of a standard
/// GL-style projection must be negated.
pub fn perspective_vk(fovy_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let mut proj = nalgebra::Perspective3::new(aspect, fovy_radians, near, far).to_homogeneous();
    proj[(1, 1)] *= -1.0;
    proj
}

/// Right-handed look-at view matrix.
pub fn look_at(eye: Point3, target: Point3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(&eye, &target, &up)
}

/// Orthographic projection mapping pixel coordinates to Vulkan clip space,
/// origin at the top-left corner. Used by the UI overlay.
pub fn ortho_pixels(width: f32, height: f32) -> Mat4 {
    Mat4::new(
        2.0 / width, 0.0, 0.0, -1.0,
        0.0, 2.0 / height, 0.0, -1.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Rotation around an axis, as a homogeneous matrix.
pub fn rotation(axis: Unit<Vec3>, angle_radians: f32) -> Mat4 {
    nalgebra::Rotation3::from_axis_angle(&axis, angle_radians).to_homogeneous()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perspective_flips_y_for_vulkan() {
        let gl = nalgebra::Perspective3::new(1.5, 0.8, 0.1, 100.0).to_homogeneous();
        let vk = perspective_vk(0.8, 1.5, 0.1, 100.0);
        assert_relative_eq!(vk[(1, 1)], -gl[(1, 1)]);
        assert_relative_eq!(vk[(0, 0)], gl[(0, 0)]);
    }

    #[test]
    fn ortho_maps_corners_to_clip_space() {
        let proj = ortho_pixels(800.0, 600.0);
        let top_left = proj.transform_point(&Point3::new(0.0, 0.0, 0.0));
        let bottom_right = proj.transform_point(&Point3::new(800.0, 600.0, 0.0));
        assert_relative_eq!(top_left.x, -1.0);
        assert_relative_eq!(top_left.y, -1.0);
        assert_relative_eq!(bottom_right.x, 1.0);
        assert_relative_eq!(bottom_right.y, 1.0);
    }
}
