use crate::paint::Color;
use crate::scene::{DirectionalLight, Projection};

/// Construction parameters for a [`Context`](crate::Context).
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Color the surface is cleared to before the 3D pass.
    pub clear_color: Color,

    /// Projection of the initial camera. The aspect ratio follows the context size.
    pub projection: Projection,

    /// Initial directional light and ambient term.
    pub light: DirectionalLight,

    /// Render the shadow map pass before the main pass.
    pub shadows: bool,

    /// Half-size in world units of the cube around the camera covered by the shadow map.
    pub shadow_extent: f32,

    /// Most uploads run per frame. `None` drains the whole queue every frame.
    pub upload_budget: Option<usize>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            clear_color: Color::rgb(0.05, 0.05, 0.07),
            projection: Projection::default(),
            light: DirectionalLight::default(),
            shadows: true,
            shadow_extent: 20.0,
            upload_budget: None,
        }
    }
}
