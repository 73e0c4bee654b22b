use glam::{Mat3, Quat, Vec3};

/// Euler angles in radians.
///
/// Convention: `roll` about X, `pitch` about Y, `yaw` about Z, applied in that order about the
/// fixed world axes. The composed rotation is `Rz(yaw) * Ry(pitch) * Rx(roll)`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Euler {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl Euler {
    pub const ZERO: Self = Self { roll: 0.0, pitch: 0.0, yaw: 0.0 };

    #[inline]
    pub const fn new(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Builds angles from `(x, y, z)` degrees.
    pub fn from_degrees(x: f32, y: f32, z: f32) -> Self {
        Self::new(x.to_radians(), y.to_radians(), z.to_radians())
    }

    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.roll, self.pitch, self.yaw)
    }

    pub fn to_mat3(self) -> Mat3 {
        Mat3::from_rotation_z(self.yaw)
            * Mat3::from_rotation_y(self.pitch)
            * Mat3::from_rotation_x(self.roll)
    }

    pub fn to_quat(self) -> Quat {
        Quat::from_euler(glam::EulerRot::ZYX, self.yaw, self.pitch, self.roll)
    }
}

impl From<Vec3> for Euler {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn zero_is_identity() {
        assert!(Euler::ZERO.to_mat3().abs_diff_eq(Mat3::IDENTITY, 1e-6));
    }

    #[test]
    fn single_axis_matches_glam() {
        let r = Euler::new(0.0, 0.0, FRAC_PI_2).to_mat3();
        assert!(r.abs_diff_eq(Mat3::from_rotation_z(FRAC_PI_2), 1e-6));
        // +X rotates onto +Y under a quarter turn of yaw.
        assert!((r * Vec3::X).abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn quarter_turn_about_each_axis() {
        let r = Euler::new(FRAC_PI_2, FRAC_PI_2, FRAC_PI_2).to_mat3();
        // Rows [[0,0,1],[0,1,0],[-1,0,0]] written column by column.
        let expected = Mat3::from_cols(
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        assert!(r.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn quat_agrees_with_matrix() {
        let e = Euler::from_degrees(30.0, -45.0, 120.0);
        let from_quat = Mat3::from_quat(e.to_quat());
        assert!(from_quat.abs_diff_eq(e.to_mat3(), 1e-5));
    }
}
