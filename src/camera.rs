// Camera - pure matrix production
//
// Produces the model-view-projection matrix pushed to the vertex stage.
// Vulkan clip space points +y down, so the projection flips the y axis
// relative to the usual GL-style convention.

use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    fovy: f32,
    near: f32,
    far: f32,
    eye: Vec3,
    center: Vec3,
    up: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fovy: 60.0_f32.to_radians(),
            near: 0.1,
            far: 100.0,
            eye: Vec3::new(0.0, 0.0, 2.0),
            center: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

impl Camera {
    pub fn set_perspective(&mut self, fovy_radians: f32, near: f32, far: f32) {
        self.fovy = fovy_radians;
        self.near = near;
        self.far = far;
    }

    pub fn set_look_at(&mut self, eye: Vec3, center: Vec3, up: Vec3) {
        self.eye = eye;
        self.center = center;
        self.up = up;
    }

    pub fn mvp(&self, aspect: f32, model: Mat4) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.center, self.up);
        let mut proj = Mat4::perspective_rh(self.fovy, aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj * view * model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn matrix_is_finite_and_invertible() {
        let cam = Camera::default();
        let m = cam.mvp(16.0 / 9.0, Mat4::IDENTITY);
        assert!(m.is_finite());
        assert!(m.determinant().abs() > f32::EPSILON);
    }

    #[test]
    fn y_axis_is_flipped_for_vulkan_clip_space() {
        // A point above the look-at center must land below it in clip space.
        let cam = Camera::default();
        let m = cam.mvp(1.0, Mat4::IDENTITY);
        let clip = m * Vec4::new(0.0, 0.5, 0.0, 1.0);
        assert!(clip.w > 0.0);
        assert!(clip.y < 0.0);
    }

    #[test]
    fn wider_aspect_compresses_x() {
        let cam = Camera::default();
        let narrow = cam.mvp(1.0, Mat4::IDENTITY) * Vec4::new(1.0, 0.0, 0.0, 1.0);
        let wide = cam.mvp(2.0, Mat4::IDENTITY) * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!(wide.x.abs() < narrow.x.abs());
    }

    #[test]
    fn center_projects_onto_the_view_axis() {
        let mut cam = Camera::default();
        cam.set_look_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::Y);
        let m = cam.mvp(1.0, Mat4::IDENTITY);
        let clip = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(clip.x.abs() < 1e-6);
        assert!(clip.y.abs() < 1e-6);
    }

    #[test]
    fn model_transform_is_applied() {
        let cam = Camera::default();
        let model = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let moved = cam.mvp(1.0, model) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let origin = cam.mvp(1.0, Mat4::IDENTITY) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((moved.x - origin.x).abs() > 0.1);
    }
}
