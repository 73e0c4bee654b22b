use crate::loader::{ImageData, ResourceHandle, ResourceLoader};
use crate::paint::Color;

/// Named bundle of surface parameters shared by 3D objects.
///
/// Owned by the context registry; objects refer to it by [`MaterialId`](super::MaterialId).
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub color: Color,
    pub diffusion: f32,
    pub specular: f32,
    pub roughness: f32,
    pub metalness: f32,
    pub ambient_occlusion: f32,
    texture: Option<ResourceHandle>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: Color::WHITE,
            diffusion: 1.0,
            specular: 0.5,
            roughness: 0.6,
            metalness: 0.0,
            ambient_occlusion: 0.6,
            texture: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_surface(mut self, metalness: f32, roughness: f32, ambient_occlusion: f32) -> Self {
        self.metalness = metalness;
        self.roughness = roughness;
        self.ambient_occlusion = ambient_occlusion;
        self
    }

    /// Requests `image` from `loader` and uses it as the base color map.
    pub fn with_texture(mut self, loader: &ResourceLoader, image: ImageData) -> Self {
        self.texture = Some(loader.request_texture(image));
        self
    }

    pub fn texture(&self) -> Option<&ResourceHandle> {
        self.texture.as_ref()
    }

    /// Replaces the texture; the previous one is released.
    pub fn set_texture(&mut self, loader: &ResourceLoader, image: Option<ImageData>) {
        self.texture = image.map(|image| loader.request_texture(image));
    }
}
