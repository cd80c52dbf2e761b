// Input-side event model.

use std::fmt;
use std::time::Instant;

use crate::Key;

/// What happened to a key, as reported by evdev (`value` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Release,
    Press,
    Repeat,
}

impl KeyAction {
    /// Map an evdev event value (0/1/2) to an action.
    pub fn from_event_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyAction::Release),
            1 => Some(KeyAction::Press),
            2 => Some(KeyAction::Repeat),
            _ => None,
        }
    }

    pub fn is_press(self) -> bool {
        matches!(self, KeyAction::Press)
    }

    pub fn is_release(self) -> bool {
        matches!(self, KeyAction::Release)
    }

    pub fn is_repeat(self) -> bool {
        matches!(self, KeyAction::Repeat)
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Release => write!(f, "release"),
            KeyAction::Press => write!(f, "press"),
            KeyAction::Repeat => write!(f, "repeat"),
        }
    }
}

/// A decoded key event with its arrival time and source device.
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub key: Key,
    pub action: KeyAction,
    pub time: Instant,
    pub device: String,
}

impl KeyEvent {
    pub fn new(key: Key, action: KeyAction, time: Instant, device: impl Into<String>) -> Self {
        Self {
            key,
            action,
            time,
            device: device.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_from_event_value() {
        assert_eq!(KeyAction::from_event_value(0), Some(KeyAction::Release));
        assert_eq!(KeyAction::from_event_value(1), Some(KeyAction::Press));
        assert_eq!(KeyAction::from_event_value(2), Some(KeyAction::Repeat));
        assert_eq!(KeyAction::from_event_value(3), None);
    }

    #[test]
    fn action_predicates() {
        assert!(KeyAction::Press.is_press());
        assert!(!KeyAction::Press.is_release());
        assert!(KeyAction::Release.is_release());
        assert!(KeyAction::Repeat.is_repeat());
    }

    #[test]
    fn event_carries_device() {
        let ev = KeyEvent::new(Key(30), KeyAction::Press, Instant::now(), "kbd0");
        assert_eq!(ev.device, "kbd0");
        assert_eq!(ev.key, Key(30));
    }
}
