//! Input events forwarded by the peer engine.
//!
//! Pointer events carry the engine's raw `(kind, mask, x, y)` tuple in screen
//! pixels of the applied [`ScreenInfo`](crate::ScreenInfo). Key events carry
//! a platform keycode plus a meta-state bitmask.

use serde::{Deserialize, Serialize};

// MARK: - Pointer masks

/// Left button pressed.
pub const LEFT_DOWN: i32 = 9;
/// Pointer moved with the left button held.
pub const LEFT_MOVE: i32 = 8;
pub const LEFT_UP: i32 = 10;

// MARK: - PointerKind

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    Touch,
    Mouse,
    /// Kinds this side does not understand; passed through as-is.
    Other(i32),
}

impl PointerKind {
    pub fn from_raw(kind: i32) -> Self {
        match kind {
            0 => Self::Touch,
            1 => Self::Mouse,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            Self::Touch => 0,
            Self::Mouse => 1,
            Self::Other(raw) => *raw,
        }
    }
}

// MARK: - PointerInput

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerInput {
    pub kind: PointerKind,
    pub mask: i32,
    pub x: i32,
    pub y: i32,
}

impl PointerInput {
    pub fn new(kind: PointerKind, mask: i32, x: i32, y: i32) -> Self {
        Self { kind, mask, x, y }
    }

    /// Whether this event should turn a dark screen back on instead of being
    /// delivered: any touch, or a left-button press.
    pub fn is_wake_gesture(&self) -> bool {
        self.kind == PointerKind::Touch || self.mask == LEFT_DOWN
    }
}

// MARK: - KeyInput

/// Key event as decoded from the peer protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub key_code: i32,
    /// Platform meta-state bitmask.
    #[serde(default)]
    pub modifiers: i32,
    /// Key is going down (`false` = going up).
    #[serde(default)]
    pub down: bool,
    /// Full press: down immediately followed by up.
    #[serde(default)]
    pub press: bool,
}

impl KeyInput {
    /// Returns `(send_down, send_up)`.
    pub fn actions(&self) -> (bool, bool) {
        (self.down || self.press, !self.down || self.press)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_actions() {
        let k = |down, press| KeyInput { key_code: 29, modifiers: 0, down, press };
        assert_eq!(k(true, false).actions(), (true, false));
        assert_eq!(k(false, false).actions(), (false, true));
        assert_eq!(k(false, true).actions(), (true, true));
        assert_eq!(k(true, true).actions(), (true, true));
    }

    #[test]
    fn wake_gesture() {
        assert!(PointerInput::new(PointerKind::Touch, LEFT_MOVE, 1, 1).is_wake_gesture());
        assert!(PointerInput::new(PointerKind::Mouse, LEFT_DOWN, 1, 1).is_wake_gesture());
        assert!(!PointerInput::new(PointerKind::Mouse, LEFT_UP, 1, 1).is_wake_gesture());
    }

    #[test]
    fn pointer_kind_raw_mapping() {
        for raw in [0, 1, 7] {
            assert_eq!(PointerKind::from_raw(raw).as_raw(), raw);
        }
        assert_eq!(PointerKind::from_raw(7), PointerKind::Other(7));
    }

    #[test]
    fn key_input_defaults_missing_flags() {
        let k: KeyInput = serde_json::from_str(r#"{"key_code": 66}"#).unwrap();
        assert_eq!(k, KeyInput { key_code: 66, modifiers: 0, down: false, press: false });
    }
}
