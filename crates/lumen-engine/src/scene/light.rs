use glam::{Mat4, Vec3};

use crate::paint::Color;

/// Global directional light plus ambient term.
///
/// `pitch` tilts the light below the horizon, `yaw` turns it about +Z (radians).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    pub luminance: f32,
    pub pitch: f32,
    pub yaw: f32,
    /// Ambient intensity in `[0, 1]`.
    pub ambient: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            luminance: 1.0,
            pitch: 50f32.to_radians(),
            yaw: 30f32.to_radians(),
            ambient: 0.2,
        }
    }
}

impl DirectionalLight {
    /// Unit vector the light travels along, in world space.
    pub fn direction(&self) -> Vec3 {
        let (sp, cp) = self.pitch.sin_cos();
        let (sy, cy) = self.yaw.sin_cos();
        Vec3::new(cp * cy, cp * sy, -sp)
    }

    /// Linear RGB scaled by luminance.
    pub fn radiance(&self) -> [f32; 3] {
        let (r, g, b, _) = self.color.to_straight();
        [r * self.luminance, g * self.luminance, b * self.luminance]
    }

    /// Orthographic view-projection covering a cube of half-size `extent` around `center`.
    pub fn view_projection(&self, center: Vec3, extent: f32) -> Mat4 {
        let dir = self.direction();
        let up = if dir.z.abs() > 0.99 { Vec3::X } else { Vec3::Z };
        let eye = center - dir * (extent * 2.0);
        let view = Mat4::look_to_rh(eye, dir, up);
        let proj = Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.0, extent * 4.0);
        proj * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_down_light() {
        let light = DirectionalLight { pitch: 90f32.to_radians(), ..Default::default() };
        assert!(light.direction().abs_diff_eq(Vec3::NEG_Z, 1e-6));
    }

    #[test]
    fn shadow_volume_contains_center() {
        let light = DirectionalLight::default();
        let center = Vec3::new(3.0, -2.0, 1.0);
        let clip = light.view_projection(center, 10.0).project_point3(center);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&clip.z));
    }
}
