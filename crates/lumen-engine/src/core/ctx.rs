use winit::window::{CursorIcon, Window};

use crate::context::Context;
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

/// Borrowed window handle with the few operations apps need.
pub struct WindowCtx<'a> {
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    /// Returns the logical window size as `(width, height)` in logical pixels.
    pub fn logical_size(&self) -> (f32, f32) {
        let phys = self.window.inner_size();
        let logi: winit::dpi::LogicalSize<f64> = phys.to_logical(self.window.scale_factor());
        (logi.width as f32, logi.height as f32)
    }

    pub fn set_cursor(&self, cursor: CursorIcon) {
        self.window.set_cursor(cursor);
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
}

/// Per-frame context passed to [`App::update`](super::App::update).
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window borrow carried by the rendering [`Context`]
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub context: &'a mut Context<'w>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl FrameCtx<'_, '_> {
    /// Seconds since the previous frame.
    pub fn dt(&self) -> f32 {
        self.time.dt
    }

    pub fn exit(&mut self) {
        self.runtime.exit();
    }
}
