//! Key table mapping firmware key ids to the A1/A2 buttons. The table is
//! either the built-in TOUGHPAD table or loaded once from a toml keymap.

use itertools::Itertools;
use serde_derive::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, fs,
    path::Path,
    str::FromStr,
};
use thiserror::Error;

/// Largest key id; the firmware reports key ids in the low 7 bits
pub const MAX_KEY_ID: u8 = 0x7f;

/// Logical button reported to the input layer
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub enum LogicalKey {
    /// The A1 button
    Button1,
    /// The A2 button
    Button2,
}

impl LogicalKey {
    pub const ALL: [LogicalKey; 2] = [LogicalKey::Button1, LogicalKey::Button2];

    /// Name of the button as printed on the case
    pub fn name(self) -> &'static str {
        match self {
            LogicalKey::Button1 => "A1",
            LogicalKey::Button2 => "A2",
        }
    }

    /// Linux input keycode
    pub fn keycode(self) -> u16 {
        match self {
            LogicalKey::Button1 => 148,
            LogicalKey::Button2 => 149,
        }
    }

    pub fn keycode_name(self) -> &'static str {
        match self {
            LogicalKey::Button1 => "KEY_PROG1",
            LogicalKey::Button2 => "KEY_PROG2",
        }
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for LogicalKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalKey::ALL
            .into_iter()
            .find(|key| {
                s == key.name()
                    || s == key.keycode_name()
                    || s == format!("{key:?}")
            })
            .ok_or_else(|| format!("unknown key {s}"))
    }
}

/// Whether the button went down or up
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub enum Action {
    Pressed,
    Released,
}

impl Action {
    /// Value for the input event
    pub fn value(self) -> i32 {
        match self {
            Action::Pressed => 1,
            Action::Released => 0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::Pressed => write!(f, "pressed"),
            Action::Released => write!(f, "released"),
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pressed" | "press" => Ok(Action::Pressed),
            "released" | "release" => Ok(Action::Released),
            _ => Err(format!("unknown action {s}")),
        }
    }
}

/// A decoded button event
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct KeyEvent {
    pub key: LogicalKey,
    pub action: Action,
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.key, self.action)
    }
}

/// Which logical keys get registered with the input sink
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum RegistrationPolicy {
    /// Only keys which have a press entry
    PressEntries,
    /// Every key referenced by any entry
    #[default]
    AllEntries,
}

impl FromStr for RegistrationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "press" => Ok(RegistrationPolicy::PressEntries),
            "all" => Ok(RegistrationPolicy::AllEntries),
            _ => Err(format!("unknown registration policy {s}, expected press or all")),
        }
    }
}

#[derive(Error, Debug)]
pub enum KeymapError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    InFile {
        path: String,
        source: Box<KeymapError>,
    },
    #[error("{0}")]
    Toml(#[from] toml::de::Error),
    #[error("key id {0:#x} out of range")]
    OutOfRange(i64),
    #[error("duplicate entry for key id {0:#04x}")]
    Duplicate(u8),
    #[error("entry {code:#04x}: {message}")]
    Invalid { code: u8, message: String },
    #[error("keymap has no keys")]
    Empty,
    #[error("key {key} has {count} {action} codes, expected {expected}")]
    Unbalanced {
        key: LogicalKey,
        action: Action,
        count: usize,
        expected: &'static str,
    },
}

/// Immutable table of key id to button and action. Press and release codes
/// are separate entries.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct KeyTable {
    name: String,
    entries: BTreeMap<u8, KeyEvent>,
}

const TOUGHPAD: [(u8, LogicalKey, Action); 4] = [
    (0x38, LogicalKey::Button1, Action::Released),
    (0x39, LogicalKey::Button1, Action::Pressed),
    (0x42, LogicalKey::Button2, Action::Released),
    (0x43, LogicalKey::Button2, Action::Pressed),
];

impl Default for KeyTable {
    fn default() -> Self {
        KeyTable {
            name: String::from("toughpad"),
            entries: TOUGHPAD
                .iter()
                .map(|(code, key, action)| {
                    (
                        *code,
                        KeyEvent {
                            key: *key,
                            action: *action,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct KeymapFile {
    name: Option<String>,
    keys: Vec<KeyEntry>,
}

#[derive(Deserialize)]
struct KeyEntry {
    code: i64,
    key: String,
    action: String,
}

impl KeyTable {
    /// Build a table; every key id must be in range and appear only once, and
    /// every key must have one press code and no more than one release code
    pub fn new<I>(name: &str, entries: I) -> Result<Self, KeymapError>
    where
        I: IntoIterator<Item = (u8, KeyEvent)>,
    {
        let mut map = BTreeMap::new();

        for (code, event) in entries {
            if code > MAX_KEY_ID {
                return Err(KeymapError::OutOfRange(code.into()));
            }

            if map.insert(code, event).is_some() {
                return Err(KeymapError::Duplicate(code));
            }
        }

        if map.is_empty() {
            return Err(KeymapError::Empty);
        }

        // each key needs exactly one press code and at most one release code
        let counts = map.values().counts();

        for key in map.values().map(|event| event.key).unique() {
            let pressed = counts
                .get(&KeyEvent {
                    key,
                    action: Action::Pressed,
                })
                .copied()
                .unwrap_or_default();

            if pressed != 1 {
                return Err(KeymapError::Unbalanced {
                    key,
                    action: Action::Pressed,
                    count: pressed,
                    expected: "exactly one",
                });
            }

            let released = counts
                .get(&KeyEvent {
                    key,
                    action: Action::Released,
                })
                .copied()
                .unwrap_or_default();

            if released > 1 {
                return Err(KeymapError::Unbalanced {
                    key,
                    action: Action::Released,
                    count: released,
                    expected: "at most one",
                });
            }
        }

        Ok(KeyTable {
            name: name.to_owned(),
            entries: map,
        })
    }

    /// Parse a toml keymap
    pub fn parse(s: &str) -> Result<Self, KeymapError> {
        let file: KeymapFile = toml::from_str(s)?;

        let mut entries = Vec::new();

        for entry in file.keys {
            let code = u8::try_from(entry.code)
                .ok()
                .filter(|code| *code <= MAX_KEY_ID)
                .ok_or(KeymapError::OutOfRange(entry.code))?;

            let key = entry
                .key
                .parse::<LogicalKey>()
                .map_err(|message| KeymapError::Invalid { code, message })?;

            let action = entry
                .action
                .parse::<Action>()
                .map_err(|message| KeymapError::Invalid { code, message })?;

            entries.push((code, KeyEvent { key, action }));
        }

        KeyTable::new(file.name.as_deref().unwrap_or("keymap"), entries)
    }

    /// Read and parse a toml keymap file
    pub fn parse_file(path: &Path) -> Result<Self, KeymapError> {
        let contents = fs::read_to_string(path).map_err(|source| KeymapError::Io {
            path: path.display().to_string(),
            source,
        })?;

        KeyTable::parse(&contents).map_err(|e| KeymapError::InFile {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a key id
    pub fn lookup(&self, key_id: u8) -> Option<KeyEvent> {
        self.entries.get(&key_id).copied()
    }

    /// All entries, ordered by key id
    pub fn entries(&self) -> impl Iterator<Item = (u8, KeyEvent)> + '_ {
        self.entries.iter().map(|(code, event)| (*code, *event))
    }

    /// The logical keys to register with the input sink
    pub fn registered_keys(&self, policy: RegistrationPolicy) -> BTreeSet<LogicalKey> {
        self.entries
            .values()
            .filter(|event| {
                policy == RegistrationPolicy::AllEntries || event.action == Action::Pressed
            })
            .map(|event| event.key)
            .collect()
    }
}

impl fmt::Display for KeyTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "keymap: {}", self.name)?;

        write!(
            f,
            "{}",
            self.entries
                .iter()
                .map(|(code, event)| format!(
                    "{code:#04x} {} {} {}\n",
                    event.key,
                    event.key.keycode_name(),
                    event.action
                ))
                .join("")
        )
    }
}
