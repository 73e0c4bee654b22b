use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4};

use crate::scene::{Material, Object, ObjectKind, Surface};

use super::{FrameState, ShaderProgram};

/// Bits of [`DrawUniforms::flags`]`[0]`.
pub mod flags {
    pub const SHADOWED: u32 = 1 << 0;
    pub const TEXTURED: u32 = 1 << 8;
}

/// Per-draw uniform block (group 1, binding 0, dynamic offset).
///
/// Every field is written for every draw, so nothing from the previous object leaks through.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub mvp: [[f32; 4]; 4],
    pub model_view: [[f32; 4]; 4],
    /// Inverse transpose of `model_view`, upper 3x3 used.
    pub normal: [[f32; 4]; 4],
    pub light_mvp: [[f32; 4]; 4],
    /// Premultiplied tint.
    pub color: [f32; 4],
    /// `(metalness, roughness, ambient_occlusion, specular)`.
    pub material: [f32; 4],
    /// `(diffusion, 0, 0, 0)`.
    pub params: [f32; 4],
    pub flags: [u32; 4],
}

/// Builds the uniform block for one draw of `object` with `program`.
///
/// `textured` says whether a real texture will be bound; when false the backend binds its
/// placeholder and the `TEXTURED` flag stays clear.
pub fn bind_uniforms(
    program: ShaderProgram,
    object: &Object,
    material: Option<&Material>,
    frame: &FrameState,
    textured: bool,
) -> DrawUniforms {
    let camera = &frame.camera;
    let model = match object.kind() {
        ObjectKind::Object2D(o) => o.model_matrix(frame.viewport),
        ObjectKind::Object3D(o) => o.model_matrix(),
        ObjectKind::Particle3D(o) => o.model_matrix(camera.right, camera.up),
        ObjectKind::Line3D(o) => o.model_matrix(),
    };

    let (view_projection, view) = match program {
        ShaderProgram::Sprite2D => (frame.screen_projection, Mat4::IDENTITY),
        ShaderProgram::ShadowMap => (frame.light_view_projection, Mat4::IDENTITY),
        _ => (camera.view_projection, camera.view),
    };
    let model_view = view * model;

    let surface = match (material, object.kind()) {
        (Some(m), _) => [m.metalness, m.roughness, m.ambient_occlusion, m.specular],
        (None, ObjectKind::Object3D(o)) => surface_params(o.surface),
        (None, _) => [0.0, 1.0, 1.0, 0.0],
    };
    let diffusion = material.map_or(1.0, |m| m.diffusion);
    let color = match material {
        Some(m) => object.color().tint(m.color),
        None => object.color(),
    };

    let mut bits = 0;
    if textured {
        bits |= flags::TEXTURED;
    }
    if frame.shadows && program == ShaderProgram::General3D {
        bits |= flags::SHADOWED;
    }

    DrawUniforms {
        mvp: (view_projection * model).to_cols_array_2d(),
        model_view: model_view.to_cols_array_2d(),
        normal: normal_matrix(model_view).to_cols_array_2d(),
        light_mvp: (frame.light_view_projection * model).to_cols_array_2d(),
        color: color.to_array(),
        material: surface,
        params: [diffusion, 0.0, 0.0, 0.0],
        flags: [bits, 0, 0, 0],
    }
}

fn surface_params(s: Surface) -> [f32; 4] {
    [s.metalness, s.roughness, s.ambient_occlusion, 0.5]
}

fn normal_matrix(model_view: Mat4) -> Mat4 {
    let m = Mat3::from_mat4(model_view);
    if m.determinant().abs() <= f32::EPSILON {
        return Mat4::IDENTITY;
    }
    Mat4::from_mat3(m.inverse().transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{ImageData, ResourceLoader};
    use crate::paint::Color;
    use crate::scene::{Camera, DirectionalLight, MaterialId};
    use glam::{Vec2, Vec3};

    fn frame(shadows: bool) -> FrameState {
        let mut camera = Camera::default();
        FrameState::new(
            camera.matrices(),
            Vec2::new(200.0, 100.0),
            &DirectionalLight::default(),
            shadows,
            10.0,
        )
    }

    #[test]
    fn flags_are_recomputed_per_draw() {
        let loader = ResourceLoader::new();
        let textured = Object::sphere(&loader, 1.0).with_texture(ImageData::solid(1, 1, [255; 4]));
        let plain = Object::sphere(&loader, 1.0);
        let f = frame(true);

        let a = bind_uniforms(ShaderProgram::General3D, &textured, None, &f, true);
        assert_eq!(a.flags[0], flags::TEXTURED | flags::SHADOWED);

        let b = bind_uniforms(ShaderProgram::General3D, &plain, None, &f, false);
        assert_eq!(b.flags[0], flags::SHADOWED);

        let c = bind_uniforms(ShaderProgram::General3D, &plain, None, &frame(false), false);
        assert_eq!(c.flags[0], 0);
    }

    #[test]
    fn sprite_maps_to_screen_clip_space() {
        let loader = ResourceLoader::new();
        let sprite = Object::sprite(&loader, ImageData::solid(1, 1, [255; 4]), Vec2::new(200.0, 100.0));
        let u = bind_uniforms(ShaderProgram::Sprite2D, &sprite, None, &frame(false), true);
        let mvp = Mat4::from_cols_array_2d(&u.mvp);

        // Top-left corner of a full-window sprite lands on clip (-1, 1).
        let tl = mvp.project_point3(Vec3::new(-0.5, -0.5, 0.0));
        assert!(tl.truncate().abs_diff_eq(Vec2::new(-1.0, 1.0), 1e-5));
        let br = mvp.project_point3(Vec3::new(0.5, 0.5, 0.0));
        assert!(br.truncate().abs_diff_eq(Vec2::new(1.0, -1.0), 1e-5));
    }

    #[test]
    fn material_overrides_surface_and_tints() {
        let loader = ResourceLoader::new();
        let object = Object::cuboid(&loader, 1.0, 1.0, 1.0)
            .with_color(Color::rgb(1.0, 0.5, 1.0))
            .with_material(MaterialId(1));
        let material = Material::new("steel")
            .with_color(Color::rgb(0.5, 1.0, 1.0))
            .with_surface(1.0, 0.2, 0.9);

        let u = bind_uniforms(ShaderProgram::General3D, &object, Some(&material), &frame(false), false);
        assert_eq!(u.color, [0.5, 0.5, 1.0, 1.0]);
        assert_eq!(u.material, [1.0, 0.2, 0.9, 0.5]);

        let bare = bind_uniforms(ShaderProgram::General3D, &object, None, &frame(false), false);
        assert_eq!(bare.material, [0.0, 0.6, 0.6, 0.5]);
    }

    #[test]
    fn shadow_program_uses_light_projection() {
        let loader = ResourceLoader::new();
        let object = Object::cuboid(&loader, 1.0, 1.0, 1.0);
        let f = frame(true);
        let u = bind_uniforms(ShaderProgram::ShadowMap, &object, None, &f, false);
        assert_eq!(u.mvp, u.light_mvp);
        assert_eq!(u.mvp, f.light_view_projection.to_cols_array_2d());
    }
}
