//! GPU backends.
//!
//! The render pass talks to the GPU through [`GpuBackend`]. Two implementations exist:
//! - [`WgpuBackend`] draws into a window surface
//! - [`HeadlessBackend`] records calls without a device (tests, tooling)

mod headless;
mod pipelines;
mod wgpu_backend;

pub use headless::{HeadlessBackend, HeadlessFrame, HeadlessLog};
pub use wgpu_backend::WgpuBackend;

use crate::error::BackendError;
use crate::loader::{ImageData, MeshData};
use crate::paint::Color;
use crate::scene::ObjectId;
use crate::shader::{DrawUniforms, FrameUniforms, ShaderProgram};

/// Opaque backend resource handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct GpuHandle(u64);

impl GpuHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Per-frame globals, pushed once before any draw.
#[derive(Debug, Copy, Clone)]
pub struct FrameGlobals {
    pub uniforms: FrameUniforms,
    pub clear_color: Color,
    pub shadows: bool,
}

/// One draw of one object.
#[derive(Debug, Copy, Clone)]
pub struct DrawCall {
    pub object: ObjectId,
    pub program: ShaderProgram,
    pub mesh: GpuHandle,
    pub texture: Option<GpuHandle>,
    pub uniforms: DrawUniforms,
}

/// Device-side operations the renderer needs.
///
/// Every method is called on the thread that owns the rendering context.
pub trait GpuBackend {
    fn name(&self) -> &'static str;

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<GpuHandle, BackendError>;

    fn upload_texture(&mut self, image: &ImageData) -> Result<GpuHandle, BackendError>;

    /// Unknown handles are ignored.
    fn free(&mut self, handle: GpuHandle);

    /// Drawable size in physical pixels.
    fn resize(&mut self, width: u32, height: u32);

    /// Starts a frame. `Ok(false)` means the frame should be skipped (surface busy or rebuilt).
    fn begin_frame(&mut self, globals: &FrameGlobals) -> Result<bool, BackendError>;

    /// Shadow-map draws go to their own pass ahead of the main pass; the rest run in
    /// submission order.
    fn draw(&mut self, call: &DrawCall);

    fn end_frame(&mut self) -> Result<(), BackendError>;
}
