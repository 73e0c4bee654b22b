//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and the window, and wires them to a rendering [`Context`](crate::Context).

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
pub use winit::window::CursorIcon;
