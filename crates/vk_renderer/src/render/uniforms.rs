//! Per-frame transform payload
//!
//! The matrices are stored column-major, matching GLSL `mat4` with std140
//! layout, so the struct can be copied byte for byte into a mapped buffer.

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};

/// Vertical field of view of the viewer camera
pub const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
/// Near clip plane
pub const NEAR_PLANE: f32 = 0.1;
/// Far clip plane
pub const FAR_PLANE: f32 = 10.0;

/// Uniform block bound at binding 0 of the vertex stage
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    /// Object to world
    pub model: [[f32; 4]; 4],
    /// World to camera
    pub view: [[f32; 4]; 4],
    /// Camera to clip space, Y already flipped for Vulkan
    pub proj: [[f32; 4]; 4],
}

impl UniformBufferObject {
    /// Transforms for the spinning, breathing model at `elapsed` seconds
    ///
    /// The model pulses between half and full size while rotating a quarter
    /// turn per animation unit around +Z; the camera sits at (2, 2, 2) looking
    /// at the origin.
    pub fn animated(elapsed: f32, extent: (u32, u32)) -> Self {
        let t = elapsed / 4.0;
        let scale = (t.sin() + 1.0) / 4.0 + 0.5;

        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), t * 90f32.to_radians());
        let model = Matrix4::new_scaling(scale) * rotation.to_homogeneous();

        let view = Matrix4::look_at_rh(
            &Point3::new(2.0, 2.0, 2.0),
            &Point3::origin(),
            &Vector3::z(),
        );

        let aspect = aspect_ratio(extent);
        let mut proj = perspective_zero_to_one(
            FIELD_OF_VIEW_DEGREES.to_radians(),
            aspect,
            NEAR_PLANE,
            FAR_PLANE,
        );
        // Vulkan clip space has Y pointing down
        proj[(1, 1)] *= -1.0;

        Self {
            model: model.into(),
            view: view.into(),
            proj: proj.into(),
        }
    }

    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

fn aspect_ratio((width, height): (u32, u32)) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

/// Right-handed perspective projection with depth mapped to [0, 1]
fn perspective_zero_to_one(fov_y: f32, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
    let tan_half_fovy = (fov_y * 0.5).tan();

    let mut result = Matrix4::zeros();
    result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
    result[(1, 1)] = 1.0 / tan_half_fovy;
    result[(2, 2)] = far / (near - far);
    result[(2, 3)] = -(far * near) / (far - near);
    result[(3, 2)] = -1.0;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    fn column_major(m: &[[f32; 4]; 4]) -> Matrix4<f32> {
        Matrix4::from_fn(|row, col| m[col][row])
    }

    #[test]
    fn test_layout_is_three_mat4() {
        assert_eq!(std::mem::size_of::<UniformBufferObject>(), 192);
        let ubo = UniformBufferObject::animated(0.0, (800, 600));
        assert_eq!(ubo.as_bytes().len(), 192);
    }

    #[test]
    fn test_model_at_time_zero_is_uniform_scale() {
        let ubo = UniformBufferObject::animated(0.0, (800, 600));
        let model = column_major(&ubo.model);
        assert_relative_eq!(model[(0, 0)], 0.75, epsilon = 1e-6);
        assert_relative_eq!(model[(1, 1)], 0.75, epsilon = 1e-6);
        assert_relative_eq!(model[(2, 2)], 0.75, epsilon = 1e-6);
        assert_relative_eq!(model[(0, 1)], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_model_rotates_quarter_turn_per_unit() {
        // t = 1 after four seconds: rotation of 90 degrees about +Z
        let ubo = UniformBufferObject::animated(4.0, (800, 600));
        let model = column_major(&ubo.model);
        let scale = (1f32.sin() + 1.0) / 4.0 + 0.5;
        let x_axis = model * Vector4::new(1.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(x_axis.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(x_axis.y, scale, epsilon = 1e-5);
    }

    #[test]
    fn test_view_maps_eye_to_origin() {
        let ubo = UniformBufferObject::animated(0.0, (800, 600));
        let view = column_major(&ubo.view);
        let eye = view * Vector4::new(2.0, 2.0, 2.0, 1.0);
        assert_relative_eq!(eye.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye.z, 0.0, epsilon = 1e-5);

        let target = view * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(target.z < 0.0);
    }

    #[test]
    fn test_projection_flips_y_and_maps_depth_range() {
        let ubo = UniformBufferObject::animated(0.0, (800, 600));
        let proj = column_major(&ubo.proj);
        assert!(proj[(1, 1)] < 0.0);
        assert_relative_eq!(proj[(0, 0)] * 800.0 / 600.0, -proj[(1, 1)], epsilon = 1e-5);

        let near = proj * Vector4::new(0.0, 0.0, -NEAR_PLANE, 1.0);
        let far = proj * Vector4::new(0.0, 0.0, -FAR_PLANE, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_height_does_not_divide_by_zero() {
        let ubo = UniformBufferObject::animated(1.0, (800, 0));
        assert!(ubo.proj.iter().flatten().all(|v| v.is_finite()));
    }
}
