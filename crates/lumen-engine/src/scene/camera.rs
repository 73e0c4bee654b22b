use glam::{Mat3, Mat4, Vec2, Vec3, Vec4Swizzles};

use crate::math::Euler;

/// Maps the camera frame (looking along +X, Z up) onto the view frame (looking along -Z, Y up).
const CAMERA_TO_VIEW: Mat3 = Mat3::from_cols(
    Vec3::new(0.0, 0.0, -1.0),
    Vec3::new(-1.0, 0.0, 0.0),
    Vec3::new(0.0, 1.0, 0.0),
);

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Projection {
    /// `fov_y` in radians.
    Perspective { fov_y: f32, near: f32, far: f32 },
    /// `height` of the visible volume in world units.
    Orthographic { height: f32, near: f32, far: f32 },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: 60f32.to_radians(),
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Projection {
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        match *self {
            Projection::Perspective { fov_y, near, far } => {
                Mat4::perspective_rh(fov_y, aspect, near, far)
            }
            Projection::Orthographic { height, near, far } => {
                let h = height * 0.5;
                let w = h * aspect;
                Mat4::orthographic_rh(-w, w, -h, h, near, far)
            }
        }
    }
}

/// Matrices and basis vectors derived from the camera state.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

/// World ray through a screen point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Scene camera. The world is Z-up; an unrotated camera looks along +X.
///
/// Matrices are computed on demand and cached until a setter changes the state.
#[derive(Debug, Clone)]
pub struct Camera {
    translation: Vec3,
    rotation: Euler,
    projection: Projection,
    aspect: f32,
    cached: Option<CameraMatrices>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Projection::default())
    }
}

impl Camera {
    pub fn new(projection: Projection) -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Euler::ZERO,
            projection,
            aspect: 1.0,
            cached: None,
        }
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn rotation(&self) -> Euler {
        self.rotation
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.cached = None;
    }

    pub fn set_rotation(&mut self, rotation: Euler) {
        self.rotation = rotation;
        self.cached = None;
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.cached = None;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect != self.aspect {
            self.aspect = aspect;
            self.cached = None;
        }
    }

    /// Points the camera at `target` by adjusting pitch and yaw. Roll is reset.
    pub fn look_at(&mut self, target: Vec3) {
        let Some(dir) = (target - self.translation).try_normalize() else { return };
        let yaw = dir.y.atan2(dir.x);
        let pitch = -dir.z.clamp(-1.0, 1.0).asin();
        self.set_rotation(Euler::new(0.0, pitch, yaw));
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    pub fn matrices(&mut self) -> CameraMatrices {
        if let Some(m) = self.cached {
            return m;
        }

        let rotation = self.rotation.to_mat3();
        let view = Mat4::from_mat3(CAMERA_TO_VIEW)
            * Mat4::from_mat3(rotation.transpose())
            * Mat4::from_translation(-self.translation);
        let projection = self.projection.matrix(self.aspect);

        let m = CameraMatrices {
            view,
            projection,
            view_projection: projection * view,
            position: self.translation,
            forward: rotation * Vec3::X,
            right: rotation * Vec3::NEG_Y,
            up: rotation * Vec3::Z,
        };
        self.cached = Some(m);
        m
    }

    /// Projects a world point to window pixels (top-left origin).
    ///
    /// Returns `None` for points behind the camera.
    pub fn world_to_screen(&mut self, point: Vec3, viewport: Vec2) -> Option<Vec2> {
        let clip = self.matrices().view_projection * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.xy() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * viewport.x,
            (1.0 - ndc.y) * 0.5 * viewport.y,
        ))
    }

    /// Ray from the near plane through the given window pixel.
    pub fn screen_to_world(&mut self, screen: Vec2, viewport: Vec2) -> Ray {
        let inverse = self.matrices().view_projection.inverse();
        let ndc = Vec2::new(
            screen.x / viewport.x.max(1.0) * 2.0 - 1.0,
            1.0 - screen.y / viewport.y.max(1.0) * 2.0,
        );
        let near = inverse.project_point3(ndc.extend(0.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray {
            origin: near,
            direction: (far - near).try_normalize().unwrap_or(Vec3::X),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

    #[test]
    fn camera_to_view_is_a_rotation() {
        assert!((CAMERA_TO_VIEW.determinant() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn looks_along_positive_x() {
        let mut cam = Camera::default();
        cam.set_aspect(VIEWPORT.x / VIEWPORT.y);

        let center = cam.world_to_screen(Vec3::new(5.0, 0.0, 0.0), VIEWPORT).unwrap();
        assert!(center.abs_diff_eq(VIEWPORT * 0.5, 1e-3));

        // +Y is to the left, +Z is up.
        let left = cam.world_to_screen(Vec3::new(5.0, 1.0, 0.0), VIEWPORT).unwrap();
        assert!(left.x < VIEWPORT.x * 0.5);
        let up = cam.world_to_screen(Vec3::new(5.0, 0.0, 1.0), VIEWPORT).unwrap();
        assert!(up.y < VIEWPORT.y * 0.5);

        assert!(cam.world_to_screen(Vec3::new(-5.0, 0.0, 0.0), VIEWPORT).is_none());
    }

    #[test]
    fn yaw_turns_the_view() {
        let mut cam = Camera::default();
        cam.set_rotation(Euler::new(0.0, 0.0, FRAC_PI_2));
        let m = cam.matrices();
        assert!(m.forward.abs_diff_eq(Vec3::Y, 1e-6));
        let p = cam.world_to_screen(Vec3::new(0.0, 3.0, 0.0), Vec2::splat(100.0)).unwrap();
        assert!(p.abs_diff_eq(Vec2::splat(50.0), 1e-3));
    }

    #[test]
    fn matrices_are_cached_until_a_setter_runs() {
        let mut cam = Camera::default();
        assert!(!cam.is_cached());
        let first = cam.matrices();
        assert!(cam.is_cached());

        cam.set_aspect(1.0);
        assert!(cam.is_cached(), "unchanged aspect keeps the cache");

        cam.set_translation(Vec3::new(0.0, 0.0, 2.0));
        assert!(!cam.is_cached());
        assert_ne!(cam.matrices().view, first.view);
    }

    #[test]
    fn screen_center_ray_points_forward() {
        let mut cam = Camera::default();
        cam.set_translation(Vec3::new(1.0, 2.0, 3.0));
        cam.set_aspect(VIEWPORT.x / VIEWPORT.y);
        let ray = cam.screen_to_world(VIEWPORT * 0.5, VIEWPORT);
        assert!(ray.direction.abs_diff_eq(Vec3::X, 1e-4));
    }

    #[test]
    fn look_at_faces_target() {
        let mut cam = Camera::default();
        cam.set_translation(Vec3::new(-4.0, 0.0, 4.0));
        cam.look_at(Vec3::ZERO);
        let f = cam.matrices().forward;
        assert!(f.abs_diff_eq(Vec3::new(1.0, 0.0, -1.0).normalize(), 1e-5));
    }
}
