// Output-side pressed-key bookkeeping.
//
// The tracker is the engine's record of what the synthetic device
// currently holds down. Every emission goes through it so that the
// "every press has a matching release" invariant can be enforced on any
// exit path.

use indexmap::IndexSet;

use crate::output::sink::{OutputError, Sink};
use crate::{Key, Modifier};

/// Keys currently pressed on the output device, in press order.
#[derive(Debug, Default)]
pub struct OutputTracker {
    held: IndexSet<Key>,
}

impl OutputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, sink: &mut dyn Sink, key: Key) -> Result<(), OutputError> {
        sink.press(key)?;
        self.held.insert(key);
        Ok(())
    }

    pub fn release(&mut self, sink: &mut dyn Sink, key: Key) -> Result<(), OutputError> {
        sink.release(key)?;
        self.held.shift_remove(&key);
        Ok(())
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Held modifier keys, in press order.
    pub fn pressed_mods(&self) -> Vec<Key> {
        self.held
            .iter()
            .copied()
            .filter(|&k| Modifier::is_modifier_key(k))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Release everything still held, most recent first, ending with a
    /// sync. Used for emergency eject and orderly shutdown.
    pub fn release_all(&mut self, sink: &mut dyn Sink) -> Result<(), OutputError> {
        if self.held.is_empty() {
            return Ok(());
        }
        let held: Vec<Key> = self.held.iter().copied().collect();
        for key in held.into_iter().rev() {
            sink.release(key)?;
        }
        self.held.clear();
        sink.sync()
    }
}
