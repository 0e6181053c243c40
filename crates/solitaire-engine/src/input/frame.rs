use std::collections::HashSet;

use super::types::Key;

/// Keys pressed since the last rendered frame.
///
/// `InputState` holds what is currently down. The runtime clears the frame
/// after each `on_frame`.
#[derive(Debug, Default)]
pub struct InputFrame {
    keys_pressed: HashSet<Key>,
}

impl InputFrame {
    pub fn clear(&mut self) {
        self.keys_pressed.clear();
    }

    pub fn pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub(crate) fn record_press(&mut self, key: Key) {
        self.keys_pressed.insert(key);
    }
}
