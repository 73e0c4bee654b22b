use std::hash::{Hash, Hasher};

use crate::error::BackendError;

/// Primitive assembly for a mesh.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Topology {
    #[default]
    TriangleList,
    LineList,
}

/// CPU-side mesh arrays.
///
/// `normals` must match `positions` in length. `uvs`, when present, as well.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
    pub topology: Topology,
}

impl MeshData {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Checks array lengths and index bounds before anything is sent to a device.
    pub fn validate(&self) -> Result<(), BackendError> {
        if self.positions.is_empty() || self.indices.is_empty() {
            return Err(BackendError::InvalidMesh("mesh has no geometry".into()));
        }
        if self.normals.len() != self.positions.len() {
            return Err(BackendError::InvalidMesh(format!(
                "{} normals for {} positions",
                self.normals.len(),
                self.positions.len()
            )));
        }
        if let Some(uvs) = &self.uvs {
            if uvs.len() != self.positions.len() {
                return Err(BackendError::InvalidMesh(format!(
                    "{} uvs for {} positions",
                    uvs.len(),
                    self.positions.len()
                )));
            }
        }
        let per_primitive = match self.topology {
            Topology::TriangleList => 3,
            Topology::LineList => 2,
        };
        if self.indices.len() % per_primitive != 0 {
            return Err(BackendError::InvalidMesh(format!(
                "{} indices is not a whole number of primitives",
                self.indices.len()
            )));
        }
        let count = self.positions.len() as u32;
        if let Some(bad) = self.indices.iter().find(|&&i| i >= count) {
            return Err(BackendError::InvalidMesh(format!(
                "index {bad} out of range for {count} vertices"
            )));
        }
        Ok(())
    }
}

impl PartialEq for MeshData {
    fn eq(&self, other: &Self) -> bool {
        self.topology == other.topology
            && bytes_of_slice(&self.positions) == bytes_of_slice(&other.positions)
            && bytes_of_slice(&self.normals) == bytes_of_slice(&other.normals)
            && self.uvs.as_deref().map(bytes_of_slice) == other.uvs.as_deref().map(bytes_of_slice)
            && self.indices == other.indices
    }
}

impl Eq for MeshData {}

impl Hash for MeshData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.topology.hash(state);
        bytes_of_slice(&self.positions).hash(state);
        bytes_of_slice(&self.normals).hash(state);
        self.uvs.as_deref().map(bytes_of_slice).hash(state);
        self.indices.hash(state);
    }
}

/// Texture filtering requested by an image.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Sampling {
    #[default]
    Linear,
    Nearest,
}

/// Decoded pixel buffer, row-major, top row first, 8 bits per channel.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
    pub sampling: Sampling,
}

impl ImageData {
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        Self { width, height, channels, pixels, sampling: Sampling::Linear }
    }

    /// A `width` x `height` RGBA image filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat(pixel_count(width, height));
        Self::new(width, height, 4, pixels)
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        if self.width == 0 || self.height == 0 {
            return Err(BackendError::UnsupportedImage("image has zero size".into()));
        }
        if !(1..=4).contains(&self.channels) {
            return Err(BackendError::UnsupportedImage(format!(
                "{} channels per pixel",
                self.channels
            )));
        }
        let expected = pixel_count(self.width, self.height) * self.channels as usize;
        if self.pixels.len() != expected {
            return Err(BackendError::UnsupportedImage(format!(
                "expected {expected} bytes for {}x{}x{}, got {}",
                self.width,
                self.height,
                self.channels,
                self.pixels.len()
            )));
        }
        Ok(())
    }

    /// Expands the pixels to RGBA8.
    ///
    /// One channel is luminance, two are luminance + alpha.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let channels = self.channels.max(1) as usize;
        let mut out = Vec::with_capacity(self.pixels.len() / channels * 4);
        for px in self.pixels.chunks_exact(channels) {
            let rgba = match *px {
                [l] => [l, l, l, 255],
                [l, a] => [l, l, l, a],
                [r, g, b] => [r, g, b, 255],
                [r, g, b, a] => [r, g, b, a],
                _ => [0, 0, 0, 0],
            };
            out.extend_from_slice(&rgba);
        }
        out
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Mesh,
    Texture,
}

/// Content-identifying value for a GPU resource.
///
/// Two descriptors that compare equal resolve to the same loader entry.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Descriptor {
    Mesh(MeshData),
    Texture(ImageData),
}

impl Descriptor {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Descriptor::Mesh(_) => ResourceKind::Mesh,
            Descriptor::Texture(_) => ResourceKind::Texture,
        }
    }
}

impl From<MeshData> for Descriptor {
    fn from(mesh: MeshData) -> Self {
        Descriptor::Mesh(mesh)
    }
}

impl From<ImageData> for Descriptor {
    fn from(image: ImageData) -> Self {
        Descriptor::Texture(image)
    }
}

/// Pixels in a `width` x `height` image, counted without overflowing `u32`.
fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn bytes_of_slice<T: bytemuck::Pod>(values: &[T]) -> &[u8] {
    bytemuck::cast_slice(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshData {
        MeshData {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            uvs: None,
            indices: vec![0, 1, 2],
            topology: Topology::TriangleList,
        }
    }

    #[test]
    fn equal_content_is_equal_descriptor() {
        assert_eq!(Descriptor::from(triangle()), Descriptor::from(triangle()));

        let mut moved = triangle();
        moved.positions[2][1] = 2.0;
        assert_ne!(Descriptor::from(triangle()), Descriptor::from(moved));
    }

    #[test]
    fn mesh_and_texture_never_collide() {
        let image = ImageData::solid(1, 1, [255; 4]);
        assert_ne!(Descriptor::from(triangle()), Descriptor::from(image));
    }

    #[test]
    fn mesh_validation() {
        assert!(triangle().validate().is_ok());

        let mut out_of_range = triangle();
        out_of_range.indices[1] = 7;
        assert!(matches!(out_of_range.validate(), Err(BackendError::InvalidMesh(_))));

        let mut missing_normals = triangle();
        missing_normals.normals.pop();
        assert!(missing_normals.validate().is_err());
    }

    #[test]
    fn image_validation() {
        assert!(ImageData::solid(2, 2, [1, 2, 3, 4]).validate().is_ok());
        assert!(ImageData::new(2, 2, 4, vec![0; 3]).validate().is_err());
        assert!(ImageData::new(1, 1, 5, vec![0; 5]).validate().is_err());
        assert!(ImageData::new(0, 1, 4, vec![]).validate().is_err());
    }

    #[test]
    fn pixel_count_exceeds_u32() {
        assert_eq!(pixel_count(70_000, 70_000) as u64, 4_900_000_000);
        assert_eq!(ImageData::solid(3, 2, [1, 2, 3, 4]).pixels.len(), 24);
    }

    #[test]
    fn expands_to_rgba() {
        let gray = ImageData::new(2, 1, 1, vec![10, 20]);
        assert_eq!(gray.to_rgba8(), vec![10, 10, 10, 255, 20, 20, 20, 255]);

        let rgb = ImageData::new(1, 1, 3, vec![1, 2, 3]);
        assert_eq!(rgb.to_rgba8(), vec![1, 2, 3, 255]);
    }
}
