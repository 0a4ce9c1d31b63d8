//! Preview camera and orbit controls

use crate::core::types::{Mat4, Quat, Vec3};

/// Perspective camera with position, rotation, and projection parameters
#[derive(Clone, Debug)]
pub struct Camera {
    /// World position
    pub position: Vec3,
    /// Rotation as quaternion
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(position: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Camera placed on the (1, 1, 1) diagonal at `distance` along each axis,
    /// looking at the origin
    pub fn diagonal(distance: f32, aspect: f32) -> Self {
        let mut camera = Self::new(Vec3::splat(distance), 50.0, aspect);
        camera.look_at(Vec3::ZERO);
        camera
    }

    /// Rotate in place so the camera faces `target` with +Y up
    pub fn look_at(&mut self, target: Vec3) {
        let forward = (target - self.position).normalize_or_zero();
        if forward == Vec3::ZERO {
            return;
        }
        let mut right = forward.cross(Vec3::Y);
        if right.length_squared() < 1e-8 {
            right = Vec3::X;
        }
        let right = right.normalize();
        let up = right.cross(forward);
        self.rotation = Quat::from_mat3(&glam::Mat3::from_cols(right, up, -forward));
    }

    /// Get view matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        let rotation_matrix = Mat4::from_quat(self.rotation.conjugate());
        let translation_matrix = Mat4::from_translation(-self.position);
        rotation_matrix * translation_matrix
    }

    /// Get projection matrix (camera to clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get forward direction (negative Z in camera space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Update aspect ratio from pixel dimensions
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 5.0), 50.0, 1.0)
    }
}

/// Orbit controls for detail previews
///
/// Pointer drags feed `rotate`; `update` applies the pending rotation around
/// `target` (damped when enabled) and re-aims the camera.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    /// Point the camera orbits and looks at
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    /// Pending azimuth change in radians
    delta_theta: f32,
    /// Pending polar change in radians
    delta_phi: f32,
}

impl OrbitControls {
    pub fn new() -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: true,
            damping_factor: 0.05,
            delta_theta: 0.0,
            delta_phi: 0.0,
        }
    }

    /// Queue a rotation (radians) to be applied by subsequent updates
    pub fn rotate(&mut self, azimuth: f32, polar: f32) {
        self.delta_theta += azimuth;
        self.delta_phi += polar;
    }

    /// Advance one frame
    pub fn update(&mut self, camera: &mut Camera) {
        let offset = camera.position - self.target;
        let radius = offset.length();
        if radius > 0.0 {
            let mut theta = offset.x.atan2(offset.z);
            let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

            let factor = if self.enable_damping { self.damping_factor } else { 1.0 };
            theta += self.delta_theta * factor;
            phi = (phi + self.delta_phi * factor).clamp(1e-4, std::f32::consts::PI - 1e-4);

            camera.position = self.target + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );

            if self.enable_damping {
                self.delta_theta *= 1.0 - self.damping_factor;
                self.delta_phi *= 1.0 - self.damping_factor;
            } else {
                self.delta_theta = 0.0;
                self.delta_phi = 0.0;
            }
        }
        camera.look_at(self.target);
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new()
    }
}
