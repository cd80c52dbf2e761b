// A modifier set plus a base key.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::modifier::Modifier;
use crate::Key;

/// A key combination: zero or more modifier roles and a base key.
///
/// Equality and hashing are order-independent over the modifier set, so
/// "Ctrl-Shift-A" and "Shift-Ctrl-A" are the same combo.
#[derive(Debug, Clone)]
pub struct Combo {
    modifiers: Vec<Modifier>,
    key: Key,
}

impl Combo {
    pub fn new(modifiers: impl IntoIterator<Item = Modifier>, key: Key) -> Self {
        Self {
            modifiers: modifiers.into_iter().collect(),
            key,
        }
    }

    /// A bare key with no modifiers.
    pub fn bare(key: Key) -> Self {
        Self {
            modifiers: Vec::new(),
            key,
        }
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn key(&self) -> Key {
        self.key
    }

    /// Whether every modifier fixes a specific side. Fully-sided combos
    /// shadow unsided equivalents during keymap lookup.
    pub fn is_fully_sided(&self) -> bool {
        self.modifiers.iter().all(|m| m.is_sided())
    }

    /// Match this combo against the currently held modifier keys and a
    /// pressed base key.
    ///
    /// Every combo modifier must be satisfied by a distinct held key, and
    /// every held key must satisfy some combo modifier (a combo does not
    /// match when extra modifiers are held). A sided modifier is satisfied
    /// only by its own key; an unsided one by either side.
    pub fn matches(&self, held_mod_keys: &[Key], key: Key) -> bool {
        if key != self.key {
            return false;
        }

        let mut remaining: Vec<Key> = held_mod_keys.to_vec();

        // Claim keys for sided modifiers first so an unsided sibling in the
        // same combo cannot steal their only key.
        for modifier in self.modifiers.iter().filter(|m| m.is_sided()) {
            match remaining.iter().position(|&k| modifier.accepts(k)) {
                Some(pos) => {
                    remaining.remove(pos);
                }
                None => return false,
            }
        }
        for modifier in self.modifiers.iter().filter(|m| !m.is_sided()) {
            match remaining.iter().position(|&k| modifier.accepts(k)) {
                Some(pos) => {
                    remaining.remove(pos);
                }
                None => return false,
            }
        }

        remaining.is_empty()
    }
}

impl PartialEq for Combo {
    fn eq(&self, other: &Self) -> bool {
        if self.key != other.key || self.modifiers.len() != other.modifiers.len() {
            return false;
        }
        self.modifiers.iter().all(|m| other.modifiers.contains(m))
    }
}

impl Eq for Combo {}

impl Hash for Combo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut ids: Vec<u64> = self
            .modifiers
            .iter()
            .map(|m| {
                let mut h = std::collections::hash_map::DefaultHasher::new();
                m.hash(&mut h);
                h.finish()
            })
            .collect();
        ids.sort_unstable();
        ids.hash(state);
        self.key.hash(state);
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}-", modifier.primary_alias())?;
        }
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modifier(alias: &str) -> Modifier {
        Modifier::from_alias(alias).unwrap()
    }

    #[test]
    fn equality_ignores_modifier_order() {
        let a = Combo::new([modifier("Ctrl"), modifier("Shift")], Key(30));
        let b = Combo::new([modifier("Shift"), modifier("Ctrl")], Key(30));
        assert_eq!(a, b);

        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn sided_and_unsided_are_distinct() {
        let unsided = Combo::new([modifier("Ctrl")], Key(30));
        let sided = Combo::new([modifier("LCtrl")], Key(30));
        assert_ne!(unsided, sided);
    }

    #[test]
    fn unsided_matches_either_side() {
        let combo = Combo::new([modifier("Ctrl")], Key(30));
        assert!(combo.matches(&[Key(29)], Key(30)));
        assert!(combo.matches(&[Key(97)], Key(30)));
        assert!(!combo.matches(&[], Key(30)));
    }

    #[test]
    fn sided_matches_only_its_side() {
        let combo = Combo::new([modifier("LCtrl")], Key(30));
        assert!(combo.matches(&[Key(29)], Key(30)));
        assert!(!combo.matches(&[Key(97)], Key(30)));
    }

    #[test]
    fn extra_held_modifiers_reject_the_match() {
        let combo = Combo::new([modifier("Ctrl")], Key(30));
        assert!(!combo.matches(&[Key(29), Key(42)], Key(30)));
        assert!(!combo.matches(&[Key(29), Key(97)], Key(30)));
    }

    #[test]
    fn base_key_must_agree() {
        let combo = Combo::new([modifier("Ctrl")], Key(30));
        assert!(!combo.matches(&[Key(29)], Key(31)));
    }

    #[test]
    fn bare_combo_matches_no_modifiers() {
        let combo = Combo::bare(Key(30));
        assert!(combo.matches(&[], Key(30)));
        assert!(!combo.matches(&[Key(29)], Key(30)));
    }

    #[test]
    fn sided_modifier_claims_its_key_first() {
        // LCtrl-Ctrl-A needs both control keys; the sided claim must not be
        // consumed by the unsided modifier.
        let combo = Combo::new([modifier("Ctrl"), modifier("LCtrl")], Key(30));
        assert!(combo.matches(&[Key(29), Key(97)], Key(30)));
        assert!(!combo.matches(&[Key(29)], Key(30)));
    }

    #[test]
    fn multi_modifier_match() {
        let combo = Combo::new([modifier("Ctrl"), modifier("Alt")], Key(30));
        assert!(combo.matches(&[Key(29), Key(56)], Key(30)));
        assert!(combo.matches(&[Key(100), Key(97)], Key(30)));
        assert!(!combo.matches(&[Key(29)], Key(30)));
    }

    #[test]
    fn display_prints_aliases() {
        let combo = Combo::new([modifier("Ctrl")], Key(30));
        assert_eq!(combo.to_string(), "Ctrl-A");
        assert_eq!(Combo::bare(Key(28)).to_string(), "ENTER");
    }

    #[test]
    fn fully_sided_detection() {
        assert!(Combo::new([modifier("LCtrl")], Key(30)).is_fully_sided());
        assert!(!Combo::new([modifier("Ctrl")], Key(30)).is_fully_sided());
        assert!(Combo::bare(Key(30)).is_fully_sided());
    }
}
