// Rule tables: modmaps, multipurpose modmaps, keymaps, and the bindings
// keymap entries resolve to.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::predicate::Predicate;
use crate::window::Context;
use crate::{Combo, Key};

/// Plain key-identity substitution, applied before any other processing.
#[derive(Debug, Clone)]
pub struct Modmap {
    name: String,
    map: IndexMap<Key, Key>,
    predicate: Option<Predicate>,
}

impl Modmap {
    pub fn new(name: impl Into<String>, map: IndexMap<Key, Key>) -> Self {
        Self {
            name: name.into(),
            map,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn get(&self, key: Key) -> Option<Key> {
        self.map.get(&key).copied()
    }

    pub fn applies(&self, ctx: &Context) -> bool {
        self.predicate.as_ref().map_or(true, |p| p.eval(ctx))
    }
}

/// Tap and hold identities for a dual-role key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapHold {
    pub tap: Key,
    pub hold: Key,
}

/// Dual-role (tap vs hold) key table.
#[derive(Debug, Clone)]
pub struct MultiModmap {
    name: String,
    map: IndexMap<Key, TapHold>,
    predicate: Option<Predicate>,
}

impl MultiModmap {
    pub fn new(name: impl Into<String>, map: IndexMap<Key, TapHold>) -> Self {
        Self {
            name: name.into(),
            map,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: Key) -> Option<TapHold> {
        self.map.get(&key).copied()
    }

    pub fn applies(&self, ctx: &Context) -> bool {
        self.predicate.as_ref().map_or(true, |p| p.eval(ctx))
    }
}

/// What a matched combo resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Press required modifiers, tap the key, restore modifier state.
    Combo(Combo),
    /// Execute children in order, recomputing modifier bracketing between
    /// them.
    Sequence(Vec<Binding>),
    /// Push a nested keymap awaiting the next stroke; the optional entry
    /// binding runs immediately.
    Submap {
        keymap: Keymap,
        on_entry: Option<Box<Binding>>,
    },
    /// Emit the next input key verbatim, bypassing all rules.
    EscapeNext,
    /// Drop the next input key.
    IgnoreNext,
    /// Emit the combo but keep its added output modifiers held until the
    /// triggering input key is released.
    Bind(Combo),
    /// Invoke a host-provided hook; an error is logged and acts as a no-op.
    Custom(CustomHook),
}

/// Error surfaced by a custom hook. Isolated at the call site: the engine
/// logs it and leaves its state untouched.
#[derive(Debug, Clone, thiserror::Error)]
#[error("custom hook failed: {0}")]
pub struct CustomHookError(pub String);

type HookFn = dyn Fn(&Context) -> Result<Option<Binding>, CustomHookError> + Send + Sync;

/// A named host-provided callback usable as a keymap binding.
#[derive(Clone)]
pub struct CustomHook {
    name: String,
    func: Arc<HookFn>,
}

impl CustomHook {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&Context) -> Result<Option<Binding>, CustomHookError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, ctx: &Context) -> Result<Option<Binding>, CustomHookError> {
        (self.func)(ctx)
    }
}

impl fmt::Debug for CustomHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomHook").field("name", &self.name).finish()
    }
}

impl PartialEq for CustomHook {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// An ordered combo table. Entry order is semantic: earlier entries shadow
/// later ones, and fully-sided combos shadow unsided equivalents.
#[derive(Debug, Clone)]
pub struct Keymap {
    name: String,
    map: IndexMap<Combo, Binding>,
    predicate: Option<Predicate>,
}

impl PartialEq for Keymap {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.map == other.map
    }
}

impl Keymap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            map: IndexMap::new(),
            predicate: None,
        }
    }

    pub fn with_entries(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (Combo, Binding)>,
    ) -> Self {
        Self {
            name: name.into(),
            map: entries.into_iter().collect(),
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, combo: Combo, binding: Binding) {
        self.map.insert(combo, binding);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Combo, &Binding)> {
        self.map.iter()
    }

    pub fn applies(&self, ctx: &Context) -> bool {
        self.predicate.as_ref().map_or(true, |p| p.eval(ctx))
    }

    /// Find the binding for the held modifier keys and pressed key.
    /// Fully-sided entries are tried first so they shadow unsided ones.
    pub fn lookup(&self, held_mod_keys: &[Key], key: Key) -> Option<&Binding> {
        self.map
            .iter()
            .find(|(combo, _)| combo.is_fully_sided() && combo.matches(held_mod_keys, key))
            .or_else(|| {
                self.map
                    .iter()
                    .find(|(combo, _)| !combo.is_fully_sided() && combo.matches(held_mod_keys, key))
            })
            .map(|(_, binding)| binding)
    }
}

/// Timeouts for the suspend and multipurpose state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub multipurpose: Duration,
    pub suspend: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            multipurpose: Duration::from_secs(1),
            suspend: Duration::from_secs(1),
        }
    }
}

/// Output throttle delays around synthesized key taps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleDelays {
    pub key_pre_delay: Duration,
    pub key_post_delay: Duration,
}

/// The complete compiled rule set the engine runs against.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub modmaps: Vec<Modmap>,
    pub multipurpose: Vec<MultiModmap>,
    pub keymaps: Vec<Keymap>,
    pub timeouts: Timeouts,
    pub delays: ThrottleDelays,
    pub diagnostics_key: Key,
    pub emergency_eject_key: Key,
    /// Inactivity window after which an entered submap expires. `None`
    /// keeps the submap armed until the next key press.
    pub submap_timeout: Option<Duration>,
    /// Device names/paths to remap; empty means autodetect keyboards.
    pub device_filter: Vec<String>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            modmaps: Vec::new(),
            multipurpose: Vec::new(),
            keymaps: Vec::new(),
            timeouts: Timeouts::default(),
            delays: ThrottleDelays::default(),
            diagnostics_key: Key(185),     // F15
            emergency_eject_key: Key(186), // F16
            submap_timeout: None,
            device_filter: Vec::new(),
        }
    }
}

impl RuleSet {
    /// Apply modmap substitution: the first rule applicable in this context
    /// that contains the key wins; otherwise the key passes through.
    pub fn effective_key(&self, ctx: &Context, key: Key) -> Key {
        self.modmaps
            .iter()
            .filter(|m| m.applies(ctx))
            .find_map(|m| m.get(key))
            .unwrap_or(key)
    }

    /// First applicable multipurpose rule containing the key.
    pub fn tap_hold(&self, ctx: &Context, key: Key) -> Option<TapHold> {
        self.multipurpose
            .iter()
            .filter(|m| m.applies(ctx))
            .find_map(|m| m.get(key))
    }

    /// Resolve a combo against the composed keymap stack: applicable
    /// keymaps in order, earlier entries shadowing later ones.
    pub fn resolve(&self, ctx: &Context, held_mod_keys: &[Key], key: Key) -> Option<&Binding> {
        self.keymaps
            .iter()
            .filter(|k| k.applies(ctx))
            .find_map(|k| k.lookup(held_mod_keys, key))
    }
}
