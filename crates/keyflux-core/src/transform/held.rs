// Input-side held-key bookkeeping.
//
// One entry per physically held key, in press order. The suspend queue is
// the ordered subset of entries whose modifier press is still withheld.

use indexmap::IndexMap;
use smallvec::SmallVec;
use std::time::Instant;

use crate::{Key, Modifier};

/// State of one physically held input key.
#[derive(Debug, Clone)]
pub struct HeldKey {
    /// The physical key as reported by the device.
    pub key: Key,
    /// Identity after modmap substitution (what the key acts as).
    pub out: Key,
    pub pressed_at: Instant,
    /// Modifier press withheld, awaiting commit or discard.
    pub suspended: bool,
    /// Consumed by a remap; the eventual release emits nothing.
    pub spent: bool,
    /// Press has been emitted on the output device.
    pub on_output: bool,
    /// Output modifiers retained by a Bind fired from this key.
    pub bound_mods: Vec<Key>,
}

impl HeldKey {
    fn new(key: Key, out: Key, pressed_at: Instant) -> Self {
        Self {
            key,
            out,
            pressed_at,
            suspended: false,
            spent: false,
            on_output: false,
            bound_mods: Vec::new(),
        }
    }
}

/// Press-ordered table of held input keys.
#[derive(Debug, Default)]
pub struct HeldKeys {
    entries: IndexMap<u16, HeldKey>,
}

impl HeldKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Key, out: Key, pressed_at: Instant) -> &mut HeldKey {
        self.entries
            .insert(key.code(), HeldKey::new(key, out, pressed_at));
        self.entries.get_mut(&key.code()).expect("just inserted")
    }

    pub fn get(&self, key: Key) -> Option<&HeldKey> {
        self.entries.get(&key.code())
    }

    pub fn get_mut(&mut self, key: Key) -> Option<&mut HeldKey> {
        self.entries.get_mut(&key.code())
    }

    /// Remove preserving the order of the remaining entries.
    pub fn remove(&mut self, key: Key) -> Option<HeldKey> {
        self.entries.shift_remove(&key.code())
    }

    pub fn contains(&self, key: Key) -> bool {
        self.entries.contains_key(&key.code())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeldKey> {
        self.entries.values()
    }

    /// Effective modifier keys currently held, in press order. Includes
    /// suspended and spent entries: a physically held modifier keeps
    /// counting toward combo masks even when its press was withheld or
    /// consumed.
    pub fn mod_keys(&self) -> SmallVec<[Key; 4]> {
        self.entries
            .values()
            .filter(|e| Modifier::is_modifier_key(e.out))
            .map(|e| e.out)
            .collect()
    }

    /// Keys whose modifier press is currently withheld, in press order.
    pub fn suspended_keys(&self) -> Vec<Key> {
        self.entries
            .values()
            .filter(|e| e.suspended)
            .map(|e| e.key)
            .collect()
    }

    pub fn has_suspended(&self) -> bool {
        self.entries.values().any(|e| e.suspended)
    }
}
