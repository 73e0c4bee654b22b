use crate::context::{Context, FrameReport};

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by the window runtime.
pub trait App {
    /// Called once after the window and its context exist. Build the scene and install input
    /// handlers here.
    fn setup(&mut self, ctx: &mut Context<'_>) -> anyhow::Result<()>;

    /// Called once per redraw, before the frame is rendered.
    fn update(&mut self, frame: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Called after each rendered frame.
    fn frame_rendered(&mut self, report: &FrameReport) {
        let _ = report;
    }
}
