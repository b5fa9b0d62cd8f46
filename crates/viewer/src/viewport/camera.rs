use glam::{Mat4, Vec3, Vec4};

use super::picking::Ray;

/// Default vertical field of view (degrees)
pub const DEFAULT_FOV_DEG: f32 = 75.0;

/// Camera position and look-at target, the unit of animation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    /// Component-wise linear interpolation of position and target
    pub fn lerp(&self, other: &CameraPose, t: f32) -> CameraPose {
        CameraPose {
            position: self.position.lerp(other.position, t),
            target: self.target.lerp(other.target, t),
        }
    }
}

/// Orbit camera for the 3D viewport.
///
/// Stored as an explicit position/target pair so fits and focus animations
/// can place it directly; orbiting converts to spherical coordinates around
/// the target on the fly.
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view (radians)
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Orbit distance limits
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::ZERO,
            fov: DEFAULT_FOV_DEG.to_radians(),
            near: 0.1,
            far: 1000.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            target: self.target,
        }
    }

    pub fn set_pose(&mut self, pose: CameraPose) {
        self.position = pose.position;
        self.target = pose.target;
    }

    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    /// Orbit around the target. Angles in degrees.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let offset = self.position - self.target;
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return;
        }

        let mut yaw = offset.x.atan2(offset.z);
        let mut pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();
        yaw -= dx.to_radians();
        pitch = (pitch + dy.to_radians()).clamp(-1.5, 1.5);

        let (sy, cy) = yaw.sin_cos();
        let (sp, cp) = pitch.sin_cos();
        self.position = self.target + Vec3::new(radius * cp * sy, radius * sp, radius * cp * cy);
    }

    /// Dolly toward (positive delta) or away from the target
    pub fn zoom(&mut self, delta: f32) {
        let offset = self.position - self.target;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return;
        }
        let new_distance = (distance * (1.0 - delta)).clamp(self.min_distance.max(1e-6), self.max_distance);
        self.position = self.target + offset / distance * new_distance;
    }

    /// Move target and position together in the view plane
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let offset = self.right_vector() * dx + self.up_vector() * dy;
        self.target += offset;
        self.position += offset;
    }

    /// View matrix (world -> camera)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Projection matrix (camera -> clip)
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    fn right_vector(&self) -> Vec3 {
        let fwd = (self.target - self.position).normalize_or_zero();
        fwd.cross(Vec3::Y).normalize_or_zero()
    }

    fn up_vector(&self) -> Vec3 {
        let fwd = (self.target - self.position).normalize_or_zero();
        self.right_vector().cross(fwd).normalize_or_zero()
    }

    /// Cast a ray from a screen position into the 3D scene
    pub fn screen_ray(&self, screen_pos: egui::Pos2, rect: egui::Rect) -> Ray {
        let aspect = rect.width() / rect.height();

        // Screen → NDC
        let ndc_x = (screen_pos.x - rect.center().x) / (rect.width() * 0.5);
        let ndc_y = -(screen_pos.y - rect.center().y) / (rect.height() * 0.5);

        let vp_inv = self.view_projection(aspect).inverse();

        let near_world = vp_inv * Vec4::new(ndc_x, ndc_y, -1.0, 1.0);
        let far_world = vp_inv * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);

        let near = near_world.truncate() / near_world.w;
        let far = far_world.truncate() / far_world.w;

        Ray {
            origin: self.position,
            direction: (far - near).normalize_or_zero(),
        }
    }
}
