//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! The runtime translates platform events into [`InputEvent`]s and hands them to the context,
//! which updates its [`InputState`] and fires the matching callback.

mod platform;
mod state;
mod types;

pub(crate) use platform::winit::translate_window_event;
pub use state::InputState;
pub use types::{
    InputEvent, Key, KeyEvent, Modifiers, MouseButton, MouseWheelDelta, PointerButtonEvent,
    WheelEvent,
};
