//! Core app-facing contracts.
//!
//! This module defines the interface between the window runtime and user code. It keeps
//! runtime internals out of applications and provides a consistent per-frame context.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
