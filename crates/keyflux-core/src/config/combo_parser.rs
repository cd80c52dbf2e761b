// Combo string parser: "(<Mod>-)*<Key>" into a Combo.

use crate::{Combo, Key, Modifier};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComboParseError {
    #[error("combo string cannot be empty")]
    Empty,

    #[error("combo string cannot end with '-'")]
    MissingKey,

    #[error("unknown key name: '{0}'")]
    UnknownKey(String),

    #[error("unknown modifier: '{0}'")]
    UnknownModifier(String),

    #[error("duplicate modifier: '{0}'")]
    DuplicateModifier(String),
}

/// Parse a combo expression such as "Ctrl-Shift-A" or "LC-Tab".
///
/// The last `-`-separated token is the key, resolved case-insensitively;
/// everything before it is a modifier alias, matched case-sensitively
/// against the registry ("Ctrl" parses, "ctrl" does not). Repeating a
/// modifier role is an error.
pub fn parse_combo(expr: &str) -> Result<Combo, ComboParseError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(ComboParseError::Empty);
    }
    if trimmed.ends_with('-') {
        return Err(ComboParseError::MissingKey);
    }

    let parts: Vec<&str> = trimmed.split('-').collect();
    let (key_token, modifier_tokens) = parts.split_last().expect("nonempty split");

    let key = Key::from_name(key_token)
        .ok_or_else(|| ComboParseError::UnknownKey(key_token.to_string()))?;

    let mut modifiers: Vec<Modifier> = Vec::with_capacity(modifier_tokens.len());
    for token in modifier_tokens {
        let modifier = Modifier::from_alias(token)
            .ok_or_else(|| ComboParseError::UnknownModifier(token.to_string()))?;
        if modifiers.contains(&modifier) {
            return Err(ComboParseError::DuplicateModifier(token.to_string()));
        }
        modifiers.push(modifier);
    }

    Ok(Combo::new(modifiers, key))
}
