use std::fmt;

use glam::Vec2;

/// Keyboard key identifier.
///
/// The runtime maps platform key codes into these variants where possible. Anything else is
/// reported as `Key::Unknown` with a stable platform code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,

    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    Shift,
    Control,
    Alt,
    Meta,

    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    F1, F2, F3, F4, F5, F6,
    F7, F8, F9, F10, F11, F12,

    Unknown(u32),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// `Line` is notch-style scrolling; `Pixel` comes from touchpads.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MouseWheelDelta {
    Line { x: f32, y: f32 },
    Pixel { x: f32, y: f32 },
}

impl MouseWheelDelta {
    /// Delta in lines, assuming `line_height` pixels per line for pixel deltas.
    pub fn lines(self, line_height: f32) -> Vec2 {
        match self {
            MouseWheelDelta::Line { x, y } => Vec2::new(x, y),
            MouseWheelDelta::Pixel { x, y } => Vec2::new(x, y) / line_height.max(1.0),
        }
    }
}

/// Pointer button press or release, position in logical pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerButtonEvent {
    pub button: MouseButton,
    pub position: Vec2,
    pub modifiers: Modifiers,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WheelEvent {
    pub delta: MouseWheelDelta,
    pub modifiers: Modifiers,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
    /// Platform scancode when available.
    pub code: u32,
    pub repeat: bool,
}

/// Platform-agnostic input events emitted by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    ModifiersChanged(Modifiers),
    KeyPressed(KeyEvent),
    KeyReleased(KeyEvent),
    /// Logical pixels, top-left origin.
    PointerMoved(Vec2),
    PointerPressed(PointerButtonEvent),
    PointerReleased(PointerButtonEvent),
    Wheel(WheelEvent),
    /// `true` when the pointer entered the window, `false` when it left.
    PointerEntry(bool),
    Focused(bool),
}
