use glam::{Mat4, Vec3};

use super::Euler;

/// World-space placement of a 3D object.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Euler,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Euler::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }

    /// Model matrix, composed as `translation * rotation * scale`.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_mat3(self.rotation.to_mat3())
            * Mat4::from_scale(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn default_is_identity() {
        assert_eq!(Transform::default().matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn composes_translation_rotation_scale() {
        let t = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Euler::new(FRAC_PI_2, FRAC_PI_2, FRAC_PI_2),
            scale: Vec3::new(2.0, 1.0, 1.0),
        };

        let expected = Mat4::from_cols(
            Vec4::new(0.0, 0.0, -2.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(1.0, 2.0, 3.0, 1.0),
        );
        assert!(t.matrix().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn scale_applies_before_rotation() {
        let t = Transform {
            rotation: Euler::new(0.0, 0.0, FRAC_PI_2),
            scale: Vec3::new(3.0, 1.0, 1.0),
            ..Transform::default()
        };
        // Stretched along local X first, then turned onto world Y.
        let p = t.matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-6));
    }
}
