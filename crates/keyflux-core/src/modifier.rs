// Logical modifier roles (Control, Alt, Shift, Meta, Fn, user-defined).
//
// Each role maps to one or more physical keys. Sided variants (L_/R_) map
// to a single key; the unsided role covers both sides. A global registry
// holds the built-in roles plus any registered at config load.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::LazyLock;

use crate::Key;

static REGISTRY: LazyLock<RwLock<Registry>> =
    LazyLock::new(|| RwLock::new(Registry::with_defaults()));
static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Key codes of the built-in modifier keys, for lock-free hot-path checks.
const BUILTIN_MODIFIER_CODES: &[u16] = &[
    29, 97, // ctrl
    56, 100, // alt
    42, 54, // shift
    125, 126, // meta
    0x1d0, // fn
];

struct Registry {
    by_name: HashMap<String, Modifier>,
    by_alias: HashMap<String, Modifier>,
    by_key: HashMap<Key, Modifier>,
}

impl Registry {
    fn empty() -> Self {
        Self {
            by_name: HashMap::new(),
            by_alias: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    fn with_defaults() -> Self {
        let mut reg = Self::empty();
        reg.insert_builtin("L_CONTROL", &["LCtrl", "LC"], &[29]);
        reg.insert_builtin("R_CONTROL", &["RCtrl", "RC"], &[97]);
        reg.insert_builtin("CONTROL", &["Ctrl", "C"], &[29, 97]);
        reg.insert_builtin("L_ALT", &["LAlt", "LA", "LOpt", "LOption"], &[56]);
        reg.insert_builtin("R_ALT", &["RAlt", "RA", "ROpt", "ROption"], &[100]);
        reg.insert_builtin("ALT", &["Alt", "A", "Opt", "Option"], &[56, 100]);
        reg.insert_builtin("L_SHIFT", &["LShift"], &[42]);
        reg.insert_builtin("R_SHIFT", &["RShift"], &[54]);
        reg.insert_builtin("SHIFT", &["Shift"], &[42, 54]);
        reg.insert_builtin(
            "L_META",
            &["LSuper", "LWin", "LCommand", "LCmd", "LMeta"],
            &[125],
        );
        reg.insert_builtin(
            "R_META",
            &["RSuper", "RWin", "RCommand", "RCmd", "RMeta"],
            &[126],
        );
        reg.insert_builtin(
            "META",
            &["Super", "Win", "Command", "Cmd", "Meta"],
            &[125, 126],
        );
        reg.insert_builtin("FN", &["Fn"], &[0x1d0]);
        reg
    }

    fn insert_builtin(&mut self, name: &str, aliases: &[&str], codes: &[u16]) {
        let modifier = Modifier {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            keys: codes.iter().map(|&c| Key(c)).collect(),
        };
        self.index(modifier);
    }

    fn index(&mut self, modifier: Modifier) {
        for alias in &modifier.aliases {
            self.by_alias.insert(alias.clone(), modifier.clone());
        }
        for &key in &modifier.keys {
            // Sided roles win the by-key slot over unsided ones so that
            // key-to-role lookups preserve left/right identity.
            self.by_key
                .entry(key)
                .and_modify(|existing| {
                    if !existing.is_sided() && modifier.is_sided() {
                        *existing = modifier.clone();
                    }
                })
                .or_insert_with(|| modifier.clone());
        }
        self.by_name.insert(modifier.name.clone(), modifier);
    }

    fn register(&mut self, modifier: Modifier) -> Result<(), ModifierError> {
        if self.by_name.contains_key(&modifier.name) {
            return Err(ModifierError::NameExists(modifier.name));
        }
        for &key in &modifier.keys {
            if let Some(existing) = self.by_key.get(&key) {
                return Err(ModifierError::KeyClaimed(key, existing.name.clone()));
            }
        }
        self.index(modifier);
        Ok(())
    }
}

/// A logical modifier role.
#[derive(Debug, Clone)]
pub struct Modifier {
    id: u32,
    name: String,
    aliases: Vec<String>,
    keys: Vec<Key>,
}

impl Modifier {
    /// Register a user-defined modifier (e.g. Hyper) with the keys that
    /// activate it. Fails if the name exists or a key is already claimed.
    pub fn register(
        name: &str,
        aliases: Vec<String>,
        keys: Vec<Key>,
    ) -> Result<(), ModifierError> {
        if keys.is_empty() {
            return Err(ModifierError::NoKeys(name.to_string()));
        }
        let modifier = Modifier {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            aliases,
            keys,
        };
        REGISTRY.write().register(modifier)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Preferred display spelling ("Ctrl", "LAlt", ...).
    pub fn primary_alias(&self) -> &str {
        self.aliases.first().map(|s| s.as_str()).unwrap_or(&self.name)
    }

    /// Whether this role fixes a single physical key (left/right variant).
    pub fn is_sided(&self) -> bool {
        self.keys.len() == 1
    }

    /// Physical keys that activate this role.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Key pressed on output when this role must be synthesized. For an
    /// unsided role this is the left-hand key.
    pub fn output_key(&self) -> Key {
        self.keys[0]
    }

    /// Whether the given held key activates this role.
    pub fn accepts(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }

    pub fn from_name(name: &str) -> Option<Modifier> {
        REGISTRY.read().by_name.get(name).cloned()
    }

    pub fn from_alias(alias: &str) -> Option<Modifier> {
        let reg = REGISTRY.read();
        reg.by_name
            .get(alias)
            .or_else(|| reg.by_alias.get(alias))
            .cloned()
    }

    /// The role a physical key belongs to (sided variant when one exists).
    pub fn from_key(key: Key) -> Option<Modifier> {
        REGISTRY.read().by_key.get(&key).cloned()
    }

    /// Whether a key belongs to any modifier role. Built-in keys take a
    /// lock-free path; registered custom keys fall back to the registry.
    pub fn is_modifier_key(key: Key) -> bool {
        if BUILTIN_MODIFIER_CODES.contains(&key.code()) {
            return true;
        }
        REGISTRY.read().by_key.contains_key(&key)
    }
}

impl PartialEq for Modifier {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Modifier {}

impl std::hash::Hash for Modifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary_alias())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModifierError {
    #[error("modifier '{0}' already exists")]
    NameExists(String),

    #[error("key {0} already assigned to modifier '{1}'")]
    KeyClaimed(Key, String),

    #[error("modifier '{0}' defines no keys")]
    NoKeys(String),
}
