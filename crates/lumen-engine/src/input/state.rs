use std::collections::HashSet;

use glam::Vec2;

use super::types::{InputEvent, Key, Modifiers, MouseButton};

/// Held keys and buttons plus pointer position for one window.
#[derive(Debug, Default)]
pub struct InputState {
    pub modifiers: Modifiers,
    pub focused: bool,
    /// Logical pixels; `None` while the pointer is outside the window.
    pub pointer: Option<Vec2>,
    pub keys_down: HashSet<Key>,
    pub buttons_down: HashSet<MouseButton>,
}

impl InputState {
    pub fn apply(&mut self, event: &InputEvent) {
        match event {
            InputEvent::ModifiersChanged(m) => self.modifiers = *m,

            InputEvent::Focused(focused) => {
                self.focused = *focused;
                if !focused {
                    // Releases are not delivered while unfocused.
                    self.keys_down.clear();
                    self.buttons_down.clear();
                }
            }

            InputEvent::PointerMoved(p) => self.pointer = Some(*p),
            InputEvent::PointerEntry(false) => self.pointer = None,
            InputEvent::PointerEntry(true) => {}

            InputEvent::KeyPressed(k) => {
                self.modifiers = k.modifiers;
                self.keys_down.insert(k.key);
            }
            InputEvent::KeyReleased(k) => {
                self.modifiers = k.modifiers;
                self.keys_down.remove(&k.key);
            }

            InputEvent::PointerPressed(b) => {
                self.pointer = Some(b.position);
                self.modifiers = b.modifiers;
                self.buttons_down.insert(b.button);
            }
            InputEvent::PointerReleased(b) => {
                self.pointer = Some(b.position);
                self.modifiers = b.modifiers;
                self.buttons_down.remove(&b.button);
            }

            InputEvent::Wheel(w) => self.modifiers = w.modifiers,
        }
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{KeyEvent, PointerButtonEvent};

    #[test]
    fn focus_loss_clears_held_input() {
        let mut state = InputState::default();
        state.apply(&InputEvent::KeyPressed(KeyEvent {
            key: Key::W,
            modifiers: Modifiers::default(),
            code: 17,
            repeat: false,
        }));
        state.apply(&InputEvent::PointerPressed(PointerButtonEvent {
            button: MouseButton::Left,
            position: Vec2::new(3.0, 4.0),
            modifiers: Modifiers::default(),
        }));
        assert!(state.key_down(Key::W));
        assert!(state.button_down(MouseButton::Left));
        assert_eq!(state.pointer, Some(Vec2::new(3.0, 4.0)));

        state.apply(&InputEvent::Focused(false));
        assert!(!state.key_down(Key::W));
        assert!(!state.button_down(MouseButton::Left));
    }

    #[test]
    fn leaving_the_window_forgets_the_pointer() {
        let mut state = InputState::default();
        state.apply(&InputEvent::PointerMoved(Vec2::ONE));
        state.apply(&InputEvent::PointerEntry(false));
        assert_eq!(state.pointer, None);
    }
}
