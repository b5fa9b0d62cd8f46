use glam::Vec3;

use super::camera::{CameraPose, OrbitCamera};
use super::picking::Aabb;

/// What is being framed; decides the margin around the model
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitContext {
    Mesh,
    Skeleton,
}

impl FitContext {
    pub fn multiplier(self) -> f32 {
        match self {
            FitContext::Mesh => 1.2,
            FitContext::Skeleton => 1.0,
        }
    }
}

/// Camera placement that keeps a bounding volume fully in view
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraFit {
    pub center: Vec3,
    /// Largest box extent, also drives the lighting rig
    pub max_dim: f32,
    pub distance: f32,
    pub near: f32,
    pub far: f32,
    pub max_distance: f32,
}

impl CameraFit {
    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.center + Vec3::Z * self.distance,
            target: self.center,
        }
    }

    /// Clip planes and orbit limits only; the pose is set separately so it
    /// can be animated.
    pub fn apply_limits(&self, camera: &mut OrbitCamera) {
        camera.near = self.near;
        camera.far = self.far;
        camera.min_distance = 0.0;
        camera.max_distance = self.max_distance;
    }

    pub fn apply(&self, camera: &mut OrbitCamera) {
        self.apply_limits(camera);
        camera.set_pose(self.pose());
    }
}

/// Distance at which a box of extent `size` fills a vertical field of view
pub fn required_distance(size: f32, fov: f32) -> f32 {
    (size / (2.0 * (fov * 0.5).tan())).abs()
}

pub fn fit_aabb(aabb: &Aabb, fov: f32, context: FitContext) -> CameraFit {
    let mut size = aabb.max_dim();
    if !size.is_finite() || size <= f32::EPSILON {
        size = 1.0;
    }

    CameraFit {
        center: aabb.center(),
        max_dim: size,
        distance: required_distance(size, fov) * context.multiplier(),
        near: size * 0.0001,
        far: size * 10.0,
        max_distance: size * 5.0,
    }
}

pub fn fit_points(points: impl IntoIterator<Item = Vec3>, fov: f32, context: FitContext) -> Option<CameraFit> {
    Aabb::from_points(points).map(|aabb| fit_aabb(&aabb, fov, context))
}
