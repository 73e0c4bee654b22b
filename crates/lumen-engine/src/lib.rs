//! Lumen engine crate.
//!
//! Scene registry, resource loader and shader dispatch on top of wgpu, plus the winit runtime
//! that drives them from a window.

pub mod backend;
pub mod device;
pub mod import;
pub mod input;
pub mod loader;
pub mod logging;
pub mod math;
pub mod paint;
pub mod scene;
pub mod shader;
pub mod text;
pub mod time;
pub mod window;
pub mod core;

mod config;
mod context;
mod error;

pub use config::ContextConfig;
pub use context::{Context, FrameReport};
pub use error::{BackendError, DecodeError, ModelLoadError, Reference, RenderError};
