use log::error;
use num_integer::Integer;
use std::{path::Path, sync::Arc};
use tbtn::keymap::KeyTable;

pub mod decode;
pub mod keymap;
#[cfg(target_os = "linux")]
pub mod list;
#[cfg(target_os = "linux")]
pub mod run;

/// Load the keymap given on the command line, or the built-in table
pub fn load_keymap(path: Option<&Path>) -> Arc<KeyTable> {
    match path {
        Some(path) => match KeyTable::parse_file(path) {
            Ok(table) => Arc::new(table),
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        },
        None => Arc::new(KeyTable::default()),
    }
}

/// Parse a number which is either decimal or hex with 0x prefix
pub fn parse_number<T: Integer>(s: &str) -> Result<T, String> {
    let res = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        T::from_str_radix(hex, 16)
    } else {
        T::from_str_radix(s, 10)
    };

    res.map_err(|_| format!("invalid number {s}"))
}
