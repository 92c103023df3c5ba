use glam::{Mat4, Vec2, Vec3};

/// Column-major view-projection as the shaders read it (`mat4x4<f32>`).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    /// Pixel space: `(0, 0)` is the top-left of a `width × height` target,
    /// y grows downward.
    pub fn identity_ortho(width: f32, height: f32) -> Self {
        Camera2D::new(width * 0.5, height * 0.5).build_view_proj(width, height)
    }

    pub fn from_mat4(m: Mat4) -> Self {
        Self { view_proj: m.to_cols_array_2d() }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_proj)
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::from_mat4(Mat4::IDENTITY)
    }
}

/// Looks at `position` in world pixels; `zoom > 1` magnifies.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera2D {
    pub position: Vec2,
    pub zoom: f32,
}

impl Camera2D {
    pub fn new(center_x: f32, center_y: f32) -> Self {
        Self { position: Vec2::new(center_x, center_y), zoom: 1.0 }
    }

    /// Maps `position` to the center of a `width × height` viewport, y down.
    pub fn build_view_proj(&self, width: f32, height: f32) -> CameraUniform {
        let zoom = self.zoom.max(0.01);
        let to_clip = Mat4::from_scale(Vec3::new(
            2.0 * zoom / width.max(1.0),
            -2.0 * zoom / height.max(1.0),
            1.0,
        ));
        CameraUniform::from_mat4(to_clip * Mat4::from_translation((-self.position).extend(0.0)))
    }

    /// Inverse of `build_view_proj`: clip-space `(x, y)` back to world pixels.
    pub fn clip_to_world(&self, width: f32, height: f32, clip: Vec2) -> Vec2 {
        let inv = self.build_view_proj(width, height).to_mat4().inverse();
        inv.transform_point3(clip.extend(0.0)).truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_space_corners_hit_clip_corners() {
        let m = CameraUniform::identity_ortho(800.0, 600.0).to_mat4();
        let tl = m.transform_point3(Vec3::ZERO);
        let br = m.transform_point3(Vec3::new(800.0, 600.0, 0.0));
        assert!((tl - Vec3::new(-1.0, 1.0, 0.0)).length() < 1e-6);
        assert!((br - Vec3::new(1.0, -1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn zoomed_camera_keeps_its_center() {
        let cam = Camera2D { position: Vec2::new(100.0, 50.0), zoom: 2.0 };
        let m = cam.build_view_proj(400.0, 300.0).to_mat4();
        assert!(m.transform_point3(Vec3::new(100.0, 50.0, 0.0)).truncate().length() < 1e-6);
        // Twice the zoom halves the visible width: 100px right of center is the edge.
        assert!((m.transform_point3(Vec3::new(200.0, 50.0, 0.0)).x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clip_to_world_inverts_projection() {
        let cam = Camera2D::new(10.0, -20.0);
        let world = cam.clip_to_world(640.0, 480.0, Vec2::new(-1.0, 1.0));
        assert!((world - Vec2::new(-310.0, -260.0)).length() < 1e-3);
    }
}
