// TOML configuration surface: file → compiled RuleSet.
//
// Errors here are fatal at load; the engine refuses to start on any of
// them rather than running with a partially-understood rule set.

pub mod combo_parser;

pub use combo_parser::{parse_combo, ComboParseError};

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mapping::{
    Binding, Keymap, Modmap, MultiModmap, RuleSet, TapHold, ThrottleDelays, Timeouts,
};
use crate::modifier::ModifierError;
use crate::predicate::{Predicate, PredicateError};
use crate::window::{DesktopEnv, SessionType};
use crate::{Key, Modifier};

const MAX_DELAY_MS: u64 = 150;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    Parse(String),

    #[error("invalid combo: {0}")]
    Combo(#[from] ComboParseError),

    #[error("invalid condition: {0}")]
    Condition(#[from] PredicateError),

    #[error("unknown key name: '{0}'")]
    UnknownKey(String),

    #[error(transparent)]
    Modifier(#[from] ModifierError),

    #[error("delay {0}ms out of range (0-{MAX_DELAY_MS})")]
    DelayOutOfRange(u64),

    #[error("invalid keymap entry for '{0}': {1}")]
    BadBinding(String, String),

    #[error("multipurpose entry for '{0}' must be [tap, hold]")]
    BadTapHold(String),

    #[error("unknown session type: '{0}'")]
    UnknownSession(String),

    #[error("unknown desktop: '{0}'")]
    UnknownDesktop(String),
}

/// A loaded configuration: the compiled rule set plus the provider
/// selection overrides consumed by startup wiring.
#[derive(Debug)]
pub struct Config {
    pub rules: RuleSet,
    pub session_type: Option<SessionType>,
    pub desktop: Option<DesktopEnv>,
}

impl Config {
    /// Default location: `~/.config/keyflux/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("keyflux").join("config.toml"))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        compile(raw)
    }
}

// ---------------------------------------------------------------------------
// Raw TOML shapes

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    general: RawGeneral,

    #[serde(default)]
    timeouts: RawTimeouts,

    #[serde(default)]
    delays: RawDelays,

    #[serde(default)]
    devices: RawDevices,

    #[serde(default, rename = "modifier")]
    modifiers: Vec<RawModifier>,

    #[serde(default, rename = "modmap")]
    modmaps: Vec<RawModmap>,

    #[serde(default, rename = "multipurpose_modmap")]
    multipurpose: Vec<RawMultiModmap>,

    #[serde(default, rename = "keymap")]
    keymaps: Vec<RawKeymap>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawGeneral {
    dump_diagnostics_key: Option<String>,
    emergency_eject_key: Option<String>,
    session_type: Option<String>,
    desktop: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawTimeouts {
    /// Seconds; fractional values accepted.
    multipurpose: Option<f64>,
    suspend: Option<f64>,
    /// Submap inactivity window, seconds. Absent = until next key press.
    submap: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawDelays {
    key_pre_delay_ms: Option<u64>,
    key_post_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawDevices {
    #[serde(default)]
    only: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModifier {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModmap {
    name: Option<String>,
    condition: Option<String>,
    map: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMultiModmap {
    name: Option<String>,
    condition: Option<String>,
    map: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKeymap {
    name: Option<String>,
    condition: Option<String>,
    map: IndexMap<String, RawBinding>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBinding {
    Combo(String),
    Sequence(Vec<RawBinding>),
    Table(RawBindingTable),
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawBindingTable {
    bind: Option<String>,
    escape_next: Option<bool>,
    ignore_next: Option<bool>,
    submap: Option<IndexMap<String, RawBinding>>,
    /// Runs immediately when the submap is entered.
    on_entry: Option<Box<RawBinding>>,
}

// ---------------------------------------------------------------------------
// Compilation

fn compile(raw: RawConfig) -> Result<Config, ConfigError> {
    // Custom modifiers first so combos can reference them.
    for m in raw.modifiers {
        let keys = m
            .keys
            .iter()
            .map(|name| lookup_key(name))
            .collect::<Result<Vec<_>, _>>()?;
        Modifier::register(&m.name, m.aliases, keys)?;
    }

    let mut rules = RuleSet {
        timeouts: Timeouts {
            multipurpose: raw
                .timeouts
                .multipurpose
                .map(Duration::from_secs_f64)
                .unwrap_or(Timeouts::default().multipurpose),
            suspend: raw
                .timeouts
                .suspend
                .map(Duration::from_secs_f64)
                .unwrap_or(Timeouts::default().suspend),
        },
        delays: ThrottleDelays {
            key_pre_delay: Duration::from_millis(checked_delay(raw.delays.key_pre_delay_ms)?),
            key_post_delay: Duration::from_millis(checked_delay(raw.delays.key_post_delay_ms)?),
        },
        submap_timeout: raw.timeouts.submap.map(Duration::from_secs_f64),
        device_filter: raw.devices.only,
        ..RuleSet::default()
    };

    if let Some(name) = raw.general.dump_diagnostics_key {
        rules.diagnostics_key = lookup_key(&name)?;
    }
    if let Some(name) = raw.general.emergency_eject_key {
        rules.emergency_eject_key = lookup_key(&name)?;
    }

    for (index, m) in raw.modmaps.into_iter().enumerate() {
        let name = m.name.unwrap_or_else(|| format!("modmap{index}"));
        let mut map = IndexMap::new();
        for (from, to) in m.map {
            map.insert(lookup_key(&from)?, lookup_key(&to)?);
        }
        let mut modmap = Modmap::new(name, map);
        if let Some(cond) = m.condition {
            modmap = modmap.with_predicate(Predicate::parse(&cond)?);
        }
        rules.modmaps.push(modmap);
    }

    for (index, m) in raw.multipurpose.into_iter().enumerate() {
        let name = m.name.unwrap_or_else(|| format!("multipurpose{index}"));
        let mut map = IndexMap::new();
        for (trigger, pair) in m.map {
            let [tap, hold] = pair.as_slice() else {
                return Err(ConfigError::BadTapHold(trigger));
            };
            map.insert(
                lookup_key(&trigger)?,
                TapHold {
                    tap: lookup_key(tap)?,
                    hold: lookup_key(hold)?,
                },
            );
        }
        let mut mm = MultiModmap::new(name, map);
        if let Some(cond) = m.condition {
            mm = mm.with_predicate(Predicate::parse(&cond)?);
        }
        rules.multipurpose.push(mm);
    }

    for (index, k) in raw.keymaps.into_iter().enumerate() {
        let name = k.name.unwrap_or_else(|| format!("keymap{index}"));
        let keymap = compile_keymap(&name, k.map)?;
        let keymap = match k.condition {
            Some(cond) => keymap.with_predicate(Predicate::parse(&cond)?),
            None => keymap,
        };
        rules.keymaps.push(keymap);
    }

    let session_type = raw
        .general
        .session_type
        .map(|s| SessionType::parse(&s).ok_or(ConfigError::UnknownSession(s)))
        .transpose()?;
    let desktop = raw
        .general
        .desktop
        .map(|s| DesktopEnv::parse(&s).ok_or(ConfigError::UnknownDesktop(s)))
        .transpose()?;

    Ok(Config {
        rules,
        session_type,
        desktop,
    })
}

fn compile_keymap(
    name: &str,
    entries: IndexMap<String, RawBinding>,
) -> Result<Keymap, ConfigError> {
    let mut keymap = Keymap::new(name);
    for (combo_str, raw_binding) in entries {
        let combo = parse_combo(&combo_str)?;
        let binding = compile_binding(name, &combo_str, raw_binding)?;
        keymap.insert(combo, binding);
    }
    Ok(keymap)
}

fn compile_binding(
    keymap_name: &str,
    combo_str: &str,
    raw: RawBinding,
) -> Result<Binding, ConfigError> {
    match raw {
        RawBinding::Combo(expr) => Ok(Binding::Combo(parse_combo(&expr)?)),
        RawBinding::Sequence(items) => {
            let children = items
                .into_iter()
                .map(|item| compile_binding(keymap_name, combo_str, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Binding::Sequence(children))
        }
        RawBinding::Table(table) => compile_binding_table(keymap_name, combo_str, table),
    }
}

fn compile_binding_table(
    keymap_name: &str,
    combo_str: &str,
    table: RawBindingTable,
) -> Result<Binding, ConfigError> {
    let RawBindingTable {
        bind,
        escape_next,
        ignore_next,
        submap,
        on_entry,
    } = table;

    let set = [
        bind.is_some(),
        escape_next.is_some(),
        ignore_next.is_some(),
        submap.is_some(),
    ]
    .iter()
    .filter(|&&b| b)
    .count();
    if set != 1 {
        return Err(ConfigError::BadBinding(
            combo_str.to_string(),
            "expected exactly one of: bind, escape_next, ignore_next, submap".to_string(),
        ));
    }
    if on_entry.is_some() && submap.is_none() {
        return Err(ConfigError::BadBinding(
            combo_str.to_string(),
            "on_entry is only valid together with submap".to_string(),
        ));
    }

    if let Some(expr) = bind {
        return Ok(Binding::Bind(parse_combo(&expr)?));
    }
    if escape_next == Some(true) {
        return Ok(Binding::EscapeNext);
    }
    if ignore_next == Some(true) {
        return Ok(Binding::IgnoreNext);
    }
    if let Some(entries) = submap {
        let nested_name = format!("{keymap_name}/{combo_str}");
        let keymap = compile_keymap(&nested_name, entries)?;
        let on_entry = on_entry
            .map(|raw| compile_binding(keymap_name, combo_str, *raw).map(Box::new))
            .transpose()?;
        return Ok(Binding::Submap { keymap, on_entry });
    }
    Err(ConfigError::BadBinding(
        combo_str.to_string(),
        "escape_next / ignore_next must be true when present".to_string(),
    ))
}

fn checked_delay(value: Option<u64>) -> Result<u64, ConfigError> {
    let ms = value.unwrap_or(0);
    if ms > MAX_DELAY_MS {
        return Err(ConfigError::DelayOutOfRange(ms));
    }
    Ok(ms)
}

fn lookup_key(name: &str) -> Result<Key, ConfigError> {
    Key::from_name(name).ok_or_else(|| ConfigError::UnknownKey(name.to_string()))
}
