use crate::scene::{Object, ObjectKind};

/// The fixed set of GPU programs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderProgram {
    /// Lit, optionally textured and shadowed 3D surfaces.
    General3D,
    /// Unlit 3D segments.
    Line3D,
    /// Camera-facing textured quads, alpha blended, no depth writes.
    Particle,
    /// Screen-space quads, alpha blended, no depth test.
    Sprite2D,
    /// Depth-only pass from the light.
    ShadowMap,
}

impl ShaderProgram {
    pub const ALL: [ShaderProgram; 5] = [
        ShaderProgram::General3D,
        ShaderProgram::Line3D,
        ShaderProgram::Particle,
        ShaderProgram::Sprite2D,
        ShaderProgram::ShadowMap,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ShaderProgram::General3D => "general3d",
            ShaderProgram::Line3D => "line3d",
            ShaderProgram::Particle => "particle",
            ShaderProgram::Sprite2D => "sprite2d",
            ShaderProgram::ShadowMap => "shadow",
        }
    }

    /// Programs that read the bound texture slot.
    pub fn samples_texture(self) -> bool {
        matches!(
            self,
            ShaderProgram::General3D | ShaderProgram::Particle | ShaderProgram::Sprite2D
        )
    }
}

/// Picks the main-pass program for `object`.
pub fn select_shader(object: &Object) -> ShaderProgram {
    match object.kind() {
        ObjectKind::Object3D(_) => ShaderProgram::General3D,
        ObjectKind::Line3D(_) => ShaderProgram::Line3D,
        ObjectKind::Particle3D(_) => ShaderProgram::Particle,
        ObjectKind::Object2D(_) => ShaderProgram::Sprite2D,
    }
}

/// Whether `object` is drawn into the shadow map.
pub fn casts_shadow(object: &Object) -> bool {
    matches!(object.kind(), ObjectKind::Object3D(_) | ObjectKind::Line3D(_))
}
