//! Camera rig controller
//!
//! Owns the committed model orientation, the inertial momentum left by a drag,
//! the smoothed hover/parallax offsets and the zoom distance. Event handlers
//! only write targets and deltas; [`CameraRig::step`] advances everything once
//! per frame and [`CameraRig::apply`] writes the result into the scene.

use glam::{Vec2, Vec3};

use crate::camera::PerspectiveCamera;
use crate::config::ViewerConfig;
use crate::scene::{NodeId, SceneGraph};

/// Fraction of drag momentum kept each frame
pub const MOMENTUM_DAMPING: f32 = 0.925;
/// Fraction of the remaining hover offset closed each frame
pub const HOVER_DAMPING: f32 = 0.12;
/// Fraction of the remaining parallax offset closed each frame
pub const PARALLAX_DAMPING: f32 = 0.05;

/// Committed model orientation in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationState {
    pub yaw: f32,
    pub pitch: f32,
}

/// Residual rotation velocity from a drag release, radians per frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MomentumState {
    pub dx: f32,
    pub dy: f32,
}

impl MomentumState {
    pub fn decay(&mut self, factor: f32) {
        self.dx *= factor;
        self.dy *= factor;
    }
}

/// Exponentially smoothed 2-D value chasing a target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothed {
    pub current: Vec2,
    pub target: Vec2,
    pub factor: f32,
}

impl Smoothed {
    pub fn new(factor: f32) -> Self {
        Self {
            current: Vec2::ZERO,
            target: Vec2::ZERO,
            factor,
        }
    }

    pub fn step(&mut self) {
        self.current += (self.target - self.current) * self.factor;
    }

    /// Jump to `value` without smoothing
    pub fn snap(&mut self, value: Vec2) {
        self.current = value;
        self.target = value;
    }
}

/// Scene nodes driven by the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigNodes {
    /// Receives the configured offset plus the parallax translation
    pub pivot: NodeId,
    /// Child of the pivot, receives the rotation and holds the model
    pub group: NodeId,
}

/// Final transform values for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigPose {
    pub pitch: f32,
    pub yaw: f32,
    pub offset: Vec3,
    pub parallax: Vec3,
}

#[derive(Debug, Clone)]
pub struct CameraRig {
    pub rotation: RotationState,
    pub momentum: MomentumState,
    /// x = pitch offset, y = yaw offset, radians
    pub hover: Smoothed,
    /// World-space translation added to the pivot offset
    pub parallax: Smoothed,
    zoom: f32,
    pinch_baseline: f32,
    min_zoom: f32,
    max_zoom: f32,
}

impl CameraRig {
    pub fn new(config: &ViewerConfig) -> Self {
        let (min_zoom, max_zoom) = config.zoom_limits();
        let mut rig = Self {
            rotation: RotationState::default(),
            momentum: MomentumState::default(),
            hover: Smoothed::new(HOVER_DAMPING),
            parallax: Smoothed::new(PARALLAX_DAMPING),
            zoom: config.default_zoom,
            pinch_baseline: config.default_zoom,
            min_zoom,
            max_zoom,
        };
        rig.set_zoom(config.default_zoom, true);
        rig.reset_view(config);
        rig
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pinch_baseline(&self) -> f32 {
        self.pinch_baseline
    }

    pub fn zoom_limits(&self) -> (f32, f32) {
        (self.min_zoom, self.max_zoom)
    }

    /// Re-read zoom limits from the configuration and re-clamp the current zoom
    pub fn set_limits(&mut self, config: &ViewerConfig) {
        let (min_zoom, max_zoom) = config.zoom_limits();
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        let zoom = self.zoom;
        self.set_zoom(zoom, true);
    }

    /// Clamp and store a zoom distance; returns the stored value
    pub fn set_zoom(&mut self, value: f32, commit_as_baseline: bool) -> f32 {
        let value = if value.is_nan() { self.zoom } else { value };
        self.zoom = value.clamp(self.min_zoom, self.max_zoom);
        if commit_as_baseline {
            self.pinch_baseline = self.zoom;
        }
        self.zoom
    }

    /// Commit the current zoom as the baseline for the next pinch
    pub fn commit_zoom_baseline(&mut self) {
        self.pinch_baseline = self.zoom;
    }

    /// Return to the configured default orientation with no hover or parallax
    pub fn reset_view(&mut self, config: &ViewerConfig) {
        let (pitch, yaw) = config.default_rotation();
        self.rotation = RotationState { yaw, pitch };
        self.hover.snap(Vec2::ZERO);
        self.parallax.snap(Vec2::ZERO);
    }

    /// Apply a manual rotation delta now and keep it as momentum
    pub fn rotate_by(&mut self, dx: f32, dy: f32) {
        self.rotation.yaw += dx;
        self.rotation.pitch += dy;
        self.momentum = MomentumState { dx, dy };
    }

    /// Advance smoothing, momentum and auto-rotation by one frame
    pub fn step(&mut self, dt: f32, config: &ViewerConfig) {
        self.hover.step();
        self.parallax.step();

        self.rotation.yaw += self.momentum.dx;
        self.rotation.pitch += self.momentum.dy;
        self.momentum.decay(MOMENTUM_DAMPING);

        if config.auto_rotate {
            self.rotation.yaw += config.auto_rotate_speed.to_radians() * dt;
        }
    }

    pub fn pose(&self, config: &ViewerConfig) -> RigPose {
        RigPose {
            pitch: self.rotation.pitch + self.hover.current.x,
            yaw: self.rotation.yaw + self.hover.current.y,
            offset: Vec3::new(config.offset_x, config.offset_y, 0.0),
            parallax: self.parallax.current.extend(0.0),
        }
    }

    /// Write the current pose into the scene and aim the camera at the model.
    /// Does nothing until both the nodes and the camera exist.
    pub fn apply(
        &self,
        scene: &mut SceneGraph,
        nodes: Option<RigNodes>,
        camera: Option<&mut PerspectiveCamera>,
        config: &ViewerConfig,
    ) {
        let (Some(nodes), Some(camera)) = (nodes, camera) else {
            return;
        };
        if !scene.contains(nodes.pivot) || !scene.contains(nodes.group) {
            return;
        }

        let pose = self.pose(config);
        scene.update_transform(nodes.pivot, |t| {
            t.position = pose.offset + pose.parallax;
        });
        scene.update_transform(nodes.group, |t| {
            t.set_euler(pose.pitch, pose.yaw, 0.0);
        });

        camera.set_distance(self.zoom);
        camera.look_at(scene.world_position(nodes.group));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Transform;
    use approx::assert_relative_eq;

    fn rig_scene() -> (SceneGraph, RigNodes) {
        let mut scene = SceneGraph::new();
        let pivot = scene.spawn("pivot", Transform::default());
        let group = scene.spawn_child(pivot, "group", Transform::default());
        (scene, RigNodes { pivot, group })
    }

    #[test]
    fn zoom_is_clamped_and_idempotent() {
        let config = ViewerConfig::default();
        let mut rig = CameraRig::new(&config);
        for value in [-100.0, 0.0, 2.5, 1e9, f32::INFINITY, f32::NEG_INFINITY] {
            let first = rig.set_zoom(value, true);
            assert!(first >= config.min_zoom && first <= config.max_zoom);
            assert_eq!(rig.set_zoom(value, true), first);
        }
    }

    #[test]
    fn uncommitted_zoom_keeps_pinch_baseline() {
        let config = ViewerConfig::default();
        let mut rig = CameraRig::new(&config);
        rig.set_zoom(4.0, true);
        rig.set_zoom(5.0, false);
        assert_relative_eq!(rig.zoom(), 5.0);
        assert_relative_eq!(rig.pinch_baseline(), 4.0);
        rig.commit_zoom_baseline();
        assert_relative_eq!(rig.pinch_baseline(), 5.0);
    }

    #[test]
    fn momentum_decays_geometrically() {
        let config = ViewerConfig::default();
        let mut rig = CameraRig::new(&config);
        rig.rotate_by(0.5, 0.0);
        assert_relative_eq!(rig.rotation.yaw, 0.5);
        rig.step(1.0 / 60.0, &config);
        assert_relative_eq!(rig.momentum.dx, 0.4625, epsilon = 1e-6);

        for _ in 0..400 {
            rig.step(1.0 / 60.0, &config);
            assert!(rig.momentum.dx >= 0.0);
        }
        assert!(rig.momentum.dx < 1e-6);
    }

    #[test]
    fn smoothing_converges_without_overshoot() {
        let mut smoothed = Smoothed::new(PARALLAX_DAMPING);
        smoothed.target = Vec2::new(1.0, -0.5);
        let mut previous = smoothed.current;
        for _ in 0..600 {
            smoothed.step();
            assert!(smoothed.current.x >= previous.x && smoothed.current.x <= 1.0);
            assert!(smoothed.current.y <= previous.y && smoothed.current.y >= -0.5);
            previous = smoothed.current;
        }
        assert!((smoothed.current - smoothed.target).length() < 1e-4);
    }

    #[test]
    fn auto_rotate_adds_degrees_per_second() {
        let config = ViewerConfig {
            auto_rotate: true,
            auto_rotate_speed: 90.0,
            ..Default::default()
        };
        let mut rig = CameraRig::new(&config);
        rig.step(0.5, &config);
        assert_relative_eq!(rig.rotation.yaw, std::f32::consts::FRAC_PI_4, epsilon = 1e-6);
    }

    #[test]
    fn reset_view_snaps_offsets_to_zero() {
        let config = ViewerConfig {
            rotation_x: 10.0,
            rotation_y: -30.0,
            ..Default::default()
        };
        let mut rig = CameraRig::new(&config);
        rig.rotate_by(1.0, 1.0);
        rig.hover.target = Vec2::new(0.1, 0.1);
        rig.parallax.target = Vec2::new(0.05, 0.0);
        rig.step(0.016, &config);

        rig.reset_view(&config);
        assert_relative_eq!(rig.rotation.pitch, 10f32.to_radians());
        assert_relative_eq!(rig.rotation.yaw, (-30f32).to_radians());
        assert_eq!(rig.hover.current, Vec2::ZERO);
        assert_eq!(rig.parallax.current, Vec2::ZERO);
        assert_eq!(rig.parallax.target, Vec2::ZERO);
    }

    #[test]
    fn apply_without_nodes_is_a_no_op() {
        let config = ViewerConfig::default();
        let rig = CameraRig::new(&config);
        let mut scene = SceneGraph::new();
        let mut camera = PerspectiveCamera::default();
        let before = camera.clone();
        rig.apply(&mut scene, None, Some(&mut camera), &config);
        assert_eq!(camera, before);
    }

    #[test]
    fn camera_follows_parallax_translation() {
        let config = ViewerConfig {
            offset_x: 0.2,
            ..Default::default()
        };
        let mut rig = CameraRig::new(&config);
        rig.parallax.snap(Vec2::new(0.0, 0.1));
        let (mut scene, nodes) = rig_scene();
        let mut camera = PerspectiveCamera::default();
        rig.apply(&mut scene, Some(nodes), Some(&mut camera), &config);

        assert_relative_eq!(camera.target.x, 0.2, epsilon = 1e-6);
        assert_relative_eq!(camera.target.y, 0.1, epsilon = 1e-6);
        assert_relative_eq!(camera.position.z, config.default_zoom);
        assert_relative_eq!(camera.near, config.default_zoom / 10.0);
    }

    #[test]
    fn parallax_stays_in_world_space_when_rotated() {
        let config = ViewerConfig {
            rotation_y: 90.0,
            offset_x: 0.2,
            ..Default::default()
        };
        let mut rig = CameraRig::new(&config);
        rig.parallax.snap(Vec2::new(0.1, 0.0));
        let (mut scene, nodes) = rig_scene();
        let mut camera = PerspectiveCamera::default();
        rig.apply(&mut scene, Some(nodes), Some(&mut camera), &config);

        let position = scene.world_position(nodes.group);
        assert_relative_eq!(position.x, 0.3, epsilon = 1e-6);
        assert_relative_eq!(position.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(position.z, 0.0, epsilon = 1e-6);
        assert_relative_eq!(camera.target.x, 0.3, epsilon = 1e-6);

        let (_, rotation, _) = scene.world_matrix(nodes.group).to_scale_rotation_translation();
        let forward = rotation * -Vec3::Z;
        assert_relative_eq!(forward.x, -1.0, epsilon = 1e-5);
    }
}
