use std::collections::HashSet;

use super::frame::InputFrame;
use super::types::{InputEvent, Key, KeyState};

/// Keys currently held in the window.
#[derive(Debug, Default)]
pub struct InputState {
    keys_down: HashSet<Key>,
}

impl InputState {
    /// Applies an event to the current state and records new presses in `frame`.
    ///
    /// Key repeats do not count as new presses.
    pub fn apply_event(&mut self, frame: &mut InputFrame, ev: InputEvent) {
        match ev {
            // Releases are not delivered while unfocused; avoid stuck keys.
            InputEvent::Focused(false) => self.keys_down.clear(),
            InputEvent::Focused(true) => {}

            InputEvent::Key { key, state: KeyState::Pressed, .. } => {
                if self.keys_down.insert(key) {
                    frame.record_press(key);
                }
            }
            InputEvent::Key { key, state: KeyState::Released, .. } => {
                self.keys_down.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: Key, state: KeyState, repeat: bool) -> InputEvent {
        InputEvent::Key { key, state, repeat }
    }

    #[test]
    fn press_is_recorded_once() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(&mut frame, key(Key::Escape, KeyState::Pressed, false));
        state.apply_event(&mut frame, key(Key::Escape, KeyState::Pressed, true));
        assert!(frame.pressed(Key::Escape));

        frame.clear();
        state.apply_event(&mut frame, key(Key::Escape, KeyState::Pressed, true));
        assert!(!frame.pressed(Key::Escape));
    }

    #[test]
    fn release_allows_a_new_press() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(&mut frame, key(Key::Escape, KeyState::Pressed, false));
        state.apply_event(&mut frame, key(Key::Escape, KeyState::Released, false));
        frame.clear();
        state.apply_event(&mut frame, key(Key::Escape, KeyState::Pressed, false));

        assert!(frame.pressed(Key::Escape));
    }

    #[test]
    fn focus_loss_clears_held_keys() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(&mut frame, InputEvent::Focused(true));
        state.apply_event(&mut frame, key(Key::Escape, KeyState::Pressed, false));
        state.apply_event(&mut frame, InputEvent::Focused(false));
        frame.clear();

        // Without the clear this would be swallowed as a held key.
        state.apply_event(&mut frame, key(Key::Escape, KeyState::Pressed, false));
        assert!(frame.pressed(Key::Escape));
    }
}
