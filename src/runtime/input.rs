/// Keyboard state with per-frame edge detection
///
/// Platforms feed key transitions through `set_key`; gameplay code queries
/// `key_down` (held) and `key_pressed` (went down this frame).

use std::collections::HashSet;

use winit::keyboard::KeyCode;

#[derive(Debug, Clone, Default)]
pub struct InputState {
    down: HashSet<KeyCode>,
    pressed: HashSet<KeyCode>,
    released: HashSet<KeyCode>,
    quit_requested: bool,
    /// Set when a UI layer owns the keyboard this frame
    pub ui_capture_keyboard: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the per-frame edge sets
    pub fn begin_frame(&mut self) {
        self.pressed.clear();
        self.released.clear();
    }

    pub fn set_key(&mut self, key: KeyCode, down: bool) {
        if down {
            if self.down.insert(key) {
                self.pressed.insert(key);
            }
        } else if self.down.remove(&key) {
            self.released.insert(key);
        }
    }

    /// Replace the held set, generating edges against the previous frame
    pub fn apply_snapshot(&mut self, keys: &[KeyCode]) {
        let next: HashSet<KeyCode> = keys.iter().copied().collect();
        let gone: Vec<KeyCode> = self.down.difference(&next).copied().collect();
        for key in gone {
            self.set_key(key, false);
        }
        for key in next {
            self.set_key(key, true);
        }
    }

    pub fn key_down(&self, key: KeyCode) -> bool {
        !self.ui_capture_keyboard && self.down.contains(&key)
    }

    pub fn key_pressed(&self, key: KeyCode) -> bool {
        !self.ui_capture_keyboard && self.pressed.contains(&key)
    }

    pub fn key_released(&self, key: KeyCode) -> bool {
        !self.ui_capture_keyboard && self.released.contains(&key)
    }

    /// Raw held state, ignoring UI capture
    pub fn key_down_raw(&self, key: KeyCode) -> bool {
        self.down.contains(&key)
    }

    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressed_is_edge_triggered() {
        let mut input = InputState::new();
        input.begin_frame();
        input.set_key(KeyCode::KeyT, true);
        assert!(input.key_pressed(KeyCode::KeyT));
        input.begin_frame();
        input.set_key(KeyCode::KeyT, true);
        assert!(input.key_down(KeyCode::KeyT));
        assert!(!input.key_pressed(KeyCode::KeyT));
    }

    #[test]
    fn test_ui_capture_hides_keys() {
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, true);
        input.ui_capture_keyboard = true;
        assert!(!input.key_down(KeyCode::KeyW));
        assert!(input.key_down_raw(KeyCode::KeyW));
    }
}
