//! wgpu device and window surface.
//!
//! Creates the Instance/Adapter/Device/Queue, configures the swapchain and hands out frames.
//! Drawing itself lives in [`crate::backend::WgpuBackend`].

mod gpu;
mod init;

pub use gpu::{Gpu, GpuFrame, SurfaceErrorAction};
pub use init::GpuInit;
