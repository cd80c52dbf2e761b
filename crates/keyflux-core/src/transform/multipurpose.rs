// Pending state for dual-role (tap/hold) keys.
//
// A pressed multipurpose key sits here while undecided. It leaves on one
// of three paths: its own release before the deadline (tap), any other
// key press (hold, decided in press order), or its timer firing (hold).

use indexmap::IndexMap;
use std::time::Instant;

use crate::Key;

/// An undecided multipurpose key.
#[derive(Debug, Clone)]
pub struct PendingKey {
    pub key: Key,
    pub tap: Key,
    pub hold: Key,
    pub deadline: Instant,
}

/// Undecided multipurpose keys, in press order.
#[derive(Debug, Default)]
pub struct PendingMultipurpose {
    entries: IndexMap<u16, PendingKey>,
}

impl PendingMultipurpose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, key: Key, tap: Key, hold: Key, deadline: Instant) {
        self.entries.insert(
            key.code(),
            PendingKey {
                key,
                tap,
                hold,
                deadline,
            },
        );
    }

    pub fn is_pending(&self, key: Key) -> bool {
        self.entries.contains_key(&key.code())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take one pending key out (its release arrived or its timer fired).
    pub fn take(&mut self, key: Key) -> Option<PendingKey> {
        self.entries.shift_remove(&key.code())
    }

    /// Decide every pending key as its hold role, in press order.
    pub fn drain(&mut self) -> Vec<PendingKey> {
        self.entries.drain(..).map(|(_, p)| p).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn arm_and_take() {
        let mut pending = PendingMultipurpose::new();
        let deadline = Instant::now() + Duration::from_secs(1);
        pending.arm(Key(28), Key(28), Key(97), deadline);

        assert!(pending.is_pending(Key(28)));
        let p = pending.take(Key(28)).unwrap();
        assert_eq!(p.tap, Key(28));
        assert_eq!(p.hold, Key(97));
        assert!(pending.is_empty());
    }

    #[test]
    fn drain_preserves_press_order() {
        let mut pending = PendingMultipurpose::new();
        let deadline = Instant::now() + Duration::from_secs(1);
        pending.arm(Key(58), Key(1), Key(29), deadline);
        pending.arm(Key(28), Key(28), Key(97), deadline);

        let drained = pending.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].key, Key(58));
        assert_eq!(drained[1].key, Key(28));
        assert!(pending.is_empty());
    }

    #[test]
    fn take_unknown_key_is_none() {
        let mut pending = PendingMultipurpose::new();
        assert!(pending.take(Key(30)).is_none());
    }
}
