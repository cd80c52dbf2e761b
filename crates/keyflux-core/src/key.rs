// Physical key identifiers.
// Numeric values match Linux input-event-codes.h.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A single physical key, identified by its kernel keycode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Key(pub u16);

impl Key {
    /// Raw kernel keycode.
    pub fn code(self) -> u16 {
        self.0
    }

    /// Canonical display name, or "UNKNOWN" for codes without one.
    pub fn name(self) -> &'static str {
        name_by_code()
            .get(&self.0)
            .copied()
            .unwrap_or("UNKNOWN")
    }

    /// Resolve a key from its name or alias, case-insensitively.
    pub fn from_name(name: &str) -> Option<Key> {
        let upper = name.to_uppercase();
        code_by_name().get(upper.as_str()).map(|&code| Key(code))
    }
}

impl From<u16> for Key {
    fn from(code: u16) -> Self {
        Key(code)
    }
}

impl From<Key> for u16 {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::from_name(s).ok_or_else(|| format!("unknown key: {s}"))
    }
}

/// Canonical (code, name) pairs. The first name listed for a code is the
/// display name; reverse lookup also accepts the aliases below.
const KEY_TABLE: &[(u16, &str)] = &[
    (1, "ESC"),
    (2, "KEY_1"),
    (3, "KEY_2"),
    (4, "KEY_3"),
    (5, "KEY_4"),
    (6, "KEY_5"),
    (7, "KEY_6"),
    (8, "KEY_7"),
    (9, "KEY_8"),
    (10, "KEY_9"),
    (11, "KEY_0"),
    (12, "MINUS"),
    (13, "EQUAL"),
    (14, "BACKSPACE"),
    (15, "TAB"),
    (16, "Q"),
    (17, "W"),
    (18, "E"),
    (19, "R"),
    (20, "T"),
    (21, "Y"),
    (22, "U"),
    (23, "I"),
    (24, "O"),
    (25, "P"),
    (26, "LEFT_BRACE"),
    (27, "RIGHT_BRACE"),
    (28, "ENTER"),
    (29, "LEFT_CTRL"),
    (30, "A"),
    (31, "S"),
    (32, "D"),
    (33, "F"),
    (34, "G"),
    (35, "H"),
    (36, "J"),
    (37, "K"),
    (38, "L"),
    (39, "SEMICOLON"),
    (40, "APOSTROPHE"),
    (41, "GRAVE"),
    (42, "LEFT_SHIFT"),
    (43, "BACKSLASH"),
    (44, "Z"),
    (45, "X"),
    (46, "C"),
    (47, "V"),
    (48, "B"),
    (49, "N"),
    (50, "M"),
    (51, "COMMA"),
    (52, "DOT"),
    (53, "SLASH"),
    (54, "RIGHT_SHIFT"),
    (55, "KPASTERISK"),
    (56, "LEFT_ALT"),
    (57, "SPACE"),
    (58, "CAPSLOCK"),
    (59, "F1"),
    (60, "F2"),
    (61, "F3"),
    (62, "F4"),
    (63, "F5"),
    (64, "F6"),
    (65, "F7"),
    (66, "F8"),
    (67, "F9"),
    (68, "F10"),
    (69, "NUMLOCK"),
    (70, "SCROLLLOCK"),
    (71, "KP7"),
    (72, "KP8"),
    (73, "KP9"),
    (74, "KPMINUS"),
    (75, "KP4"),
    (76, "KP5"),
    (77, "KP6"),
    (78, "KPPLUS"),
    (79, "KP1"),
    (80, "KP2"),
    (81, "KP3"),
    (82, "KP0"),
    (83, "KPDOT"),
    (86, "KEY_102ND"),
    (87, "F11"),
    (88, "F12"),
    (96, "KPENTER"),
    (97, "RIGHT_CTRL"),
    (98, "KPSLASH"),
    (99, "SYSRQ"),
    (100, "RIGHT_ALT"),
    (102, "HOME"),
    (103, "UP"),
    (104, "PAGE_UP"),
    (105, "LEFT"),
    (106, "RIGHT"),
    (107, "END"),
    (108, "DOWN"),
    (109, "PAGE_DOWN"),
    (110, "INSERT"),
    (111, "DELETE"),
    (113, "MUTE"),
    (114, "VOLUMEDOWN"),
    (115, "VOLUMEUP"),
    (117, "KPEQUAL"),
    (119, "PAUSE"),
    (121, "KPCOMMA"),
    (125, "LEFT_META"),
    (126, "RIGHT_META"),
    (127, "COMPOSE"),
    (139, "MENU"),
    (163, "NEXTSONG"),
    (164, "PLAYPAUSE"),
    (165, "PREVIOUSSONG"),
    (166, "STOPCD"),
    (183, "F13"),
    (184, "F14"),
    (185, "F15"),
    (186, "F16"),
    (187, "F17"),
    (188, "F18"),
    (189, "F19"),
    (190, "F20"),
    (191, "F21"),
    (192, "F22"),
    (193, "F23"),
    (194, "F24"),
    (0x1d0, "FN"),
];

/// Extra accepted spellings for reverse lookup.
const KEY_ALIASES: &[(&str, u16)] = &[
    ("ESCAPE", 1),
    ("1", 2),
    ("2", 3),
    ("3", 4),
    ("4", 5),
    ("5", 6),
    ("6", 7),
    ("7", 8),
    ("8", 9),
    ("9", 10),
    ("0", 11),
    ("PRINT", 99),
    ("PRTSCR", 99),
    ("RETURN", 28),
];

fn name_by_code() -> &'static HashMap<u16, &'static str> {
    static MAP: OnceLock<HashMap<u16, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| KEY_TABLE.iter().copied().collect())
}

fn code_by_name() -> &'static HashMap<&'static str, u16> {
    static MAP: OnceLock<HashMap<&'static str, u16>> = OnceLock::new();
    MAP.get_or_init(|| {
        let mut map: HashMap<&'static str, u16> = HashMap::new();
        for &(code, name) in KEY_TABLE {
            map.insert(name, code);
        }
        for &(alias, code) in KEY_ALIASES {
            map.insert(alias, code);
        }
        map
    })
}
