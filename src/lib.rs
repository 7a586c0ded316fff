//! Decode the A1/A2 button notifications of Panasonic TOUGHPAD firmware into
//! key press and release events.

pub mod acpi;
pub mod decode;
pub mod driver;
#[cfg(target_os = "linux")]
pub mod input;
pub mod keymap;
