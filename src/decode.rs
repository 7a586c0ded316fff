//! Classify platform notifications and decode the HINF status into button
//! events.

use crate::keymap::{KeyEvent, KeyTable};
use log::debug;
use thiserror::Error;

/// Notification code sent when one of the buttons changes state
pub const BUTTON_ACTIVITY: u32 = 0x80;

/// Key id occupies the low 7 bits of the status
pub const KEY_ID_MASK: u64 = 0x7f;

/// Activity sense as reported by firmware. The polarity is not known, so
/// the action always comes from the key table rather than this bit.
pub const ACTIVITY_BIT: u64 = 0x80;

/// What to do with a notification
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Notification {
    /// Query the firmware for the status
    NeedsStatusQuery,
    Ignore,
}

/// Classify a notification code from the platform bus
pub fn classify(code: u32) -> Notification {
    match code {
        BUTTON_ACTIVITY => Notification::NeedsStatusQuery,
        _ => Notification::Ignore,
    }
}

/// Fields of a raw status value
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct RawStatus(pub u64);

impl RawStatus {
    pub fn key_id(self) -> u8 {
        (self.0 & KEY_ID_MASK) as u8
    }

    pub fn activity(self) -> bool {
        (self.0 & ACTIVITY_BIT) != 0
    }
}

/// The key id of the status is not in the key table
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[error("unrecognized status {0:#x}")]
pub struct UnrecognizedStatus(pub u64);

impl KeyTable {
    /// Resolve a raw status to a button event
    pub fn resolve(&self, raw_status: u64) -> Result<KeyEvent, UnrecognizedStatus> {
        let status = RawStatus(raw_status);

        debug!(
            "status {raw_status:#x}: key id {:#04x} activity {}",
            status.key_id(),
            status.activity()
        );

        self.lookup(status.key_id())
            .ok_or(UnrecognizedStatus(raw_status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{Action, LogicalKey};

    #[test]
    fn classify_codes() {
        assert_eq!(classify(0x80), Notification::NeedsStatusQuery);

        for code in (0..0x1000).chain([u32::MAX, 0x8000_0080, 0x180]) {
            if code != 0x80 {
                assert_eq!(classify(code), Notification::Ignore, "code {code:#x}");
            }
        }
    }

    #[test]
    fn resolve_toughpad() {
        let table = KeyTable::default();

        assert_eq!(
            table.resolve(0x39),
            Ok(KeyEvent {
                key: LogicalKey::Button1,
                action: Action::Pressed
            })
        );
        assert_eq!(
            table.resolve(0x38),
            Ok(KeyEvent {
                key: LogicalKey::Button1,
                action: Action::Released
            })
        );
        assert_eq!(
            table.resolve(0x43),
            Ok(KeyEvent {
                key: LogicalKey::Button2,
                action: Action::Pressed
            })
        );
        assert_eq!(
            table.resolve(0x42),
            Ok(KeyEvent {
                key: LogicalKey::Button2,
                action: Action::Released
            })
        );
    }

    #[test]
    fn activity_bit_does_not_change_action() {
        let table = KeyTable::default();

        assert_eq!(table.resolve(0xb9), table.resolve(0x39));
        assert_eq!(table.resolve(0xb8), table.resolve(0x38));
        // bits above the low byte are not part of the key id either
        assert_eq!(table.resolve(0x1_0000_0043), table.resolve(0x43));

        assert!(RawStatus(0xb9).activity());
        assert!(!RawStatus(0x39).activity());
        assert_eq!(RawStatus(0xb9).key_id(), 57);
    }

    #[test]
    fn unrecognized() {
        let table = KeyTable::default();

        for raw in 0..0x200u64 {
            let key_id = raw & KEY_ID_MASK;
            if ![56, 57, 66, 67].contains(&key_id) {
                assert_eq!(table.resolve(raw), Err(UnrecognizedStatus(raw)));
            }
        }

        assert_eq!(
            format!("{}", table.resolve(0x3a).unwrap_err()),
            "unrecognized status 0x3a"
        );
    }

    #[test]
    fn idempotent() {
        let table = KeyTable::default();

        for raw in [0u64, 0x38, 0x39, 0x42, 0x43, 0xc3, 0x7f, u64::MAX] {
            assert_eq!(table.resolve(raw), table.resolve(raw));
        }
    }
}
