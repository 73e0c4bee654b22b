//! Error taxonomy shared by the loader, the scene registry and the backends.

use std::fmt;
use std::thread::ThreadId;

use crate::scene::{MaterialId, ObjectId};

/// Identifies what an [`RenderError::InvalidReference`] pointed at.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Reference {
    Object(ObjectId),
    Material(MaterialId),
    Resource,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Object(id) => write!(f, "{id}"),
            Reference::Material(id) => write!(f, "{id}"),
            Reference::Resource => f.write_str("resource handle"),
        }
    }
}

/// Errors raised by the rendering core.
///
/// `NotReady` and `ResourceLoadFailed` are per-resource conditions; the render pass degrades
/// the affected object and keeps going. The remaining variants are contract violations and are
/// returned straight to the caller.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("resource is not resident yet")]
    NotReady,

    #[error("resource upload failed: {0}")]
    ResourceLoadFailed(BackendError),

    #[error("called from {actual:?} but the context is owned by {owner:?}")]
    WrongThread { owner: ThreadId, actual: ThreadId },

    #[error("{0} does not refer to a live entry")]
    InvalidReference(Reference),

    #[error("{material} is still referenced by {count} object(s)")]
    DanglingMaterialReference { material: MaterialId, count: usize },

    #[error("object was built against another context's loader")]
    ForeignObject,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Failures reported by a [`GpuBackend`](crate::backend::GpuBackend).
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("surface lost and could not be recovered")]
    SurfaceLost,

    #[error("gpu out of memory")]
    OutOfMemory,

    #[error("owning context was torn down")]
    ContextDropped,
}

/// Returned by the image decoder when a blob cannot be turned into pixels.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Returned by the model importer. Only the object being built fails.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("model contains no faces")]
    Empty,
}
