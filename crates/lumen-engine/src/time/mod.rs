//! Frame timing.
//!
//! One [`FrameClock`] per context; `render_frame` ticks it once per presented frame.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
