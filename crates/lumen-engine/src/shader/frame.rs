use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

use crate::scene::{CameraMatrices, DirectionalLight};

/// CPU-side state shared by every draw of a frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameState {
    pub camera: CameraMatrices,
    /// Logical pixels to clip space, top-left origin.
    pub screen_projection: Mat4,
    pub light_view_projection: Mat4,
    pub viewport: Vec2,
    pub shadows: bool,
}

impl FrameState {
    pub fn new(
        camera: CameraMatrices,
        viewport: Vec2,
        light: &DirectionalLight,
        shadows: bool,
        shadow_extent: f32,
    ) -> Self {
        let viewport = viewport.max(Vec2::ONE);
        Self {
            camera,
            screen_projection: Mat4::orthographic_rh(0.0, viewport.x, viewport.y, 0.0, -1.0, 1.0),
            light_view_projection: light.view_projection(camera.position, shadow_extent),
            viewport,
            shadows,
        }
    }

    /// Uniform block pushed once per frame. Light direction is expressed in view space.
    pub fn uniforms(&self, light: &DirectionalLight) -> FrameUniforms {
        let dir = self.camera.view.transform_vector3(light.direction()).normalize_or_zero();
        let [r, g, b] = light.radiance();
        FrameUniforms {
            view: self.camera.view.to_cols_array_2d(),
            projection: self.camera.projection.to_cols_array_2d(),
            light_view_projection: self.light_view_projection.to_cols_array_2d(),
            light_direction: [dir.x, dir.y, dir.z, 0.0],
            light_color: [r, g, b, light.ambient],
            viewport: [
                self.viewport.x,
                self.viewport.y,
                1.0 / self.viewport.x,
                1.0 / self.viewport.y,
            ],
        }
    }
}

/// Per-frame uniform block (group 0, binding 0).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_view_projection: [[f32; 4]; 4],
    /// View-space direction the light travels along.
    pub light_direction: [f32; 4],
    /// Radiance in `rgb`, ambient intensity in `a`.
    pub light_color: [f32; 4],
    /// `(width, height, 1/width, 1/height)` in logical pixels.
    pub viewport: [f32; 4],
}
