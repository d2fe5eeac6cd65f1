//! Perspective camera used by the viewer

use glam::{Mat4, Vec3};

/// Smallest near plane the camera will accept
pub const MIN_NEAR_PLANE: f32 = 0.001;

/// Perspective camera - manages view and projection
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 50.0,
            aspect_ratio: 1.0,
            near: 0.3,
            far: 30.0,
        }
    }
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect_ratio: f32) -> Self {
        Self {
            fov,
            aspect_ratio,
            ..Self::default()
        }
    }

    /// Get view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get projection matrix (perspective)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov.to_radians(),
            self.aspect_ratio,
            self.near,
            self.far,
        )
    }

    /// Get view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Place the camera on the view axis and rederive the clip planes
    pub fn set_distance(&mut self, distance: f32) {
        self.position = Vec3::new(0.0, 0.0, distance);
        self.near = (distance / 10.0).max(MIN_NEAR_PLANE);
        self.far = distance * 10.0;
    }

    pub fn distance(&self) -> f32 {
        self.position.z
    }

    /// Update aspect ratio (e.g., on panel resize)
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Update aspect ratio from a pixel size, ignoring degenerate sizes
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn distance_rederives_clip_planes() {
        let mut camera = PerspectiveCamera::default();
        camera.set_distance(4.0);
        assert_relative_eq!(camera.near, 0.4);
        assert_relative_eq!(camera.far, 40.0);
        assert_relative_eq!(camera.distance(), 4.0);
    }

    #[test]
    fn tiny_distance_keeps_a_usable_near_plane() {
        let mut camera = PerspectiveCamera::default();
        camera.set_distance(0.0001);
        assert_relative_eq!(camera.near, MIN_NEAR_PLANE);
    }

    #[test]
    fn zero_height_keeps_previous_aspect() {
        let mut camera = PerspectiveCamera::new(50.0, 1.5);
        camera.set_viewport_size(800, 0);
        assert_relative_eq!(camera.aspect_ratio, 1.5);
    }
}
