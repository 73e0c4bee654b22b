use glam::Vec2;
use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};

use crate::input::{
    InputEvent, InputState, Key, KeyEvent, Modifiers, MouseButton, MouseWheelDelta,
    PointerButtonEvent, WheelEvent,
};

/// Translates a winit `WindowEvent` into an engine `InputEvent`.
///
/// `state` supplies what winit 0.30 does not attach to every event (modifiers, pointer
/// position). Returns `None` for events the input layer does not represent.
pub(crate) fn translate_window_event(
    scale_factor: f64,
    state: &InputState,
    event: &WindowEvent,
) -> Option<InputEvent> {
    let ev = match event {
        WindowEvent::ModifiersChanged(m) => InputEvent::ModifiersChanged(map_modifiers(m.state())),
        WindowEvent::Focused(f) => InputEvent::Focused(*f),
        WindowEvent::CursorEntered { .. } => InputEvent::PointerEntry(true),
        WindowEvent::CursorLeft { .. } => InputEvent::PointerEntry(false),
        WindowEvent::CursorMoved { position, .. } => {
            InputEvent::PointerMoved(to_logical(scale_factor, *position))
        }

        WindowEvent::MouseInput { state: st, button, .. } => {
            let ev = PointerButtonEvent {
                button: map_mouse_button(*button),
                position: state.pointer.unwrap_or(Vec2::ZERO),
                modifiers: state.modifiers,
            };
            match st {
                ElementState::Pressed => InputEvent::PointerPressed(ev),
                ElementState::Released => InputEvent::PointerReleased(ev),
            }
        }

        WindowEvent::MouseWheel { delta, .. } => {
            let delta = match delta {
                MouseScrollDelta::LineDelta(x, y) => MouseWheelDelta::Line { x: *x, y: *y },
                MouseScrollDelta::PixelDelta(p) => {
                    let v = to_logical(scale_factor, *p);
                    MouseWheelDelta::Pixel { x: v.x, y: v.y }
                }
            };
            InputEvent::Wheel(WheelEvent { delta, modifiers: state.modifiers })
        }

        WindowEvent::KeyboardInput { event, .. } => {
            let (key, code) = map_key(event.physical_key);
            let ev = KeyEvent { key, modifiers: state.modifiers, code, repeat: event.repeat };
            match event.state {
                ElementState::Pressed => InputEvent::KeyPressed(ev),
                ElementState::Released => InputEvent::KeyReleased(ev),
            }
        }

        _ => return None,
    };
    Some(ev)
}

fn to_logical(scale_factor: f64, pos: PhysicalPosition<f64>) -> Vec2 {
    let logical = pos.to_logical::<f64>(scale_factor);
    Vec2::new(logical.x as f32, logical.y as f32)
}

fn map_modifiers(m: ModifiersState) -> Modifiers {
    Modifiers {
        shift: m.shift_key(),
        ctrl: m.control_key(),
        alt: m.alt_key(),
        meta: m.super_key(),
    }
}

fn map_mouse_button(b: WinitMouseButton) -> MouseButton {
    match b {
        WinitMouseButton::Left => MouseButton::Left,
        WinitMouseButton::Right => MouseButton::Right,
        WinitMouseButton::Middle => MouseButton::Middle,
        WinitMouseButton::Back => MouseButton::Back,
        WinitMouseButton::Forward => MouseButton::Forward,
        WinitMouseButton::Other(v) => MouseButton::Other(v),
    }
}

const KEY_TABLE: &[(KeyCode, Key)] = &[
    (KeyCode::Escape, Key::Escape), (KeyCode::Enter, Key::Enter), (KeyCode::Tab, Key::Tab),
    (KeyCode::Backspace, Key::Backspace), (KeyCode::Space, Key::Space),
    (KeyCode::Insert, Key::Insert), (KeyCode::Delete, Key::Delete), (KeyCode::Home, Key::Home),
    (KeyCode::End, Key::End), (KeyCode::PageUp, Key::PageUp), (KeyCode::PageDown, Key::PageDown),
    (KeyCode::ArrowUp, Key::ArrowUp), (KeyCode::ArrowDown, Key::ArrowDown),
    (KeyCode::ArrowLeft, Key::ArrowLeft), (KeyCode::ArrowRight, Key::ArrowRight),
    (KeyCode::ShiftLeft, Key::Shift), (KeyCode::ShiftRight, Key::Shift),
    (KeyCode::ControlLeft, Key::Control), (KeyCode::ControlRight, Key::Control),
    (KeyCode::AltLeft, Key::Alt), (KeyCode::AltRight, Key::Alt),
    (KeyCode::SuperLeft, Key::Meta), (KeyCode::SuperRight, Key::Meta),
    (KeyCode::KeyA, Key::A), (KeyCode::KeyB, Key::B), (KeyCode::KeyC, Key::C),
    (KeyCode::KeyD, Key::D), (KeyCode::KeyE, Key::E), (KeyCode::KeyF, Key::F),
    (KeyCode::KeyG, Key::G), (KeyCode::KeyH, Key::H), (KeyCode::KeyI, Key::I),
    (KeyCode::KeyJ, Key::J), (KeyCode::KeyK, Key::K), (KeyCode::KeyL, Key::L),
    (KeyCode::KeyM, Key::M), (KeyCode::KeyN, Key::N), (KeyCode::KeyO, Key::O),
    (KeyCode::KeyP, Key::P), (KeyCode::KeyQ, Key::Q), (KeyCode::KeyR, Key::R),
    (KeyCode::KeyS, Key::S), (KeyCode::KeyT, Key::T), (KeyCode::KeyU, Key::U),
    (KeyCode::KeyV, Key::V), (KeyCode::KeyW, Key::W), (KeyCode::KeyX, Key::X),
    (KeyCode::KeyY, Key::Y), (KeyCode::KeyZ, Key::Z),
    (KeyCode::Digit0, Key::Digit0), (KeyCode::Digit1, Key::Digit1), (KeyCode::Digit2, Key::Digit2),
    (KeyCode::Digit3, Key::Digit3), (KeyCode::Digit4, Key::Digit4), (KeyCode::Digit5, Key::Digit5),
    (KeyCode::Digit6, Key::Digit6), (KeyCode::Digit7, Key::Digit7), (KeyCode::Digit8, Key::Digit8),
    (KeyCode::Digit9, Key::Digit9),
    (KeyCode::F1, Key::F1), (KeyCode::F2, Key::F2), (KeyCode::F3, Key::F3),
    (KeyCode::F4, Key::F4), (KeyCode::F5, Key::F5), (KeyCode::F6, Key::F6),
    (KeyCode::F7, Key::F7), (KeyCode::F8, Key::F8), (KeyCode::F9, Key::F9),
    (KeyCode::F10, Key::F10), (KeyCode::F11, Key::F11), (KeyCode::F12, Key::F12),
];

fn map_key(pk: PhysicalKey) -> (Key, u32) {
    match pk {
        PhysicalKey::Code(code) => {
            let key = KEY_TABLE
                .iter()
                .find(|(k, _)| *k == code)
                .map(|(_, key)| *key)
                .unwrap_or(Key::Unknown(code as u32));
            (key, code as u32)
        }
        PhysicalKey::Unidentified(_) => (Key::Unknown(0), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_and_unknown_keys() {
        assert_eq!(map_key(PhysicalKey::Code(KeyCode::KeyW)).0, Key::W);
        assert_eq!(map_key(PhysicalKey::Code(KeyCode::ShiftRight)).0, Key::Shift);
        assert!(matches!(map_key(PhysicalKey::Code(KeyCode::NumLock)).0, Key::Unknown(_)));
    }

    #[test]
    fn cursor_position_is_logical() {
        let v = to_logical(2.0, PhysicalPosition::new(200.0, 100.0));
        assert_eq!(v, Vec2::new(100.0, 50.0));
    }
}
