//! Find the button devices in sysfs, evaluate their HINF method through the
//! acpi_call module, and read notifications from acpid.

use crate::driver::{Device, FirmwareQuery, QueryError, SUPPORTED_IDS};
use log::debug;
use std::{
    fs::{self, OpenOptions},
    io::{self, BufRead, Read, Seek, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Where ACPI devices are listed in sysfs
pub const SYSFS_ACPI_DEVICES: &str = "/sys/bus/acpi/devices";

/// Control file of the acpi_call module
pub const ACPI_CALL: &str = "/proc/acpi/call";

/// Default acpid socket
pub const ACPID_SOCKET: &str = "/var/run/acpid.socket";

/// Firmware method which returns the button status
pub const STATUS_METHOD: &str = "HINF";

/// Get the list of supported button devices present in sysfs
pub fn enumerate_devices(sysfs: &Path) -> io::Result<Vec<Device>> {
    let mut devices = Vec::new();

    for entry in fs::read_dir(sysfs)? {
        let entry = entry?;
        let Some(bus_id) = entry.file_name().to_str().map(|s| s.to_owned()) else {
            continue;
        };

        let hid = match fs::read_to_string(entry.path().join("hid")) {
            Ok(hid) => hid.trim().to_owned(),
            Err(_) => bus_id.split(':').next().unwrap_or_default().to_owned(),
        };

        if !SUPPORTED_IDS.contains(&hid.as_str()) {
            continue;
        }

        let path = fs::read_to_string(entry.path().join("path"))
            .map_err(|e| io::Error::new(e.kind(), format!("{bus_id}: path: {e}")))?
            .trim()
            .to_owned();

        debug!("found {bus_id} hid:{hid} path:{path}");

        devices.push(Device { bus_id, hid, path });
    }

    devices.sort_by(|a, b| a.bus_id.cmp(&b.bus_id));

    Ok(devices)
}

/// Evaluate the status method of a device through acpi_call
pub struct AcpiCall {
    call: PathBuf,
    method: String,
}

impl AcpiCall {
    pub fn new(device: &Device) -> Self {
        AcpiCall::with_call_path(device, Path::new(ACPI_CALL))
    }

    pub fn with_call_path(device: &Device, call: &Path) -> Self {
        AcpiCall {
            call: call.to_owned(),
            method: format!("{}.{STATUS_METHOD}", device.path),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl FirmwareQuery for AcpiCall {
    fn query_status(&mut self) -> Result<u64, QueryError> {
        let mut f = OpenOptions::new().read(true).write(true).open(&self.call)?;

        f.write_all(self.method.as_bytes())?;
        f.rewind()?;

        let mut reply = String::new();
        f.read_to_string(&mut reply)?;

        debug!("{} returned {reply:?}", self.method);

        parse_reply(&reply)
    }
}

/// Parse the reply of acpi_call for an integer method
pub fn parse_reply(reply: &str) -> Result<u64, QueryError> {
    let reply = reply.trim_matches(|c: char| c == '\0' || c.is_whitespace());

    if let Some(error) = reply.strip_prefix("Error:") {
        return Err(QueryError::Firmware(error.trim().to_owned()));
    }

    reply
        .strip_prefix("0x")
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
        .ok_or_else(|| QueryError::Malformed(reply.to_owned()))
}

/// An event line from acpid, e.g. `button/tbtn MAT002A:00 00000080 00000000`
#[derive(PartialEq, Eq, Debug)]
pub struct AcpiEvent {
    pub class: String,
    pub bus_id: String,
    pub code: u32,
    pub data: u32,
}

impl AcpiEvent {
    /// Hardware id part of the bus id
    pub fn hid(&self) -> &str {
        self.bus_id.split(':').next().unwrap_or_default()
    }

    /// Whether the event comes from a device this driver handles
    pub fn is_supported(&self) -> bool {
        SUPPORTED_IDS.contains(&self.hid())
    }
}

impl FromStr for AcpiEvent {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let elements: Vec<_> = line.split_whitespace().collect();

        if elements.len() != 4 {
            return Err(format!("expected 4 fields, got {}", elements.len()));
        }

        let code = u32::from_str_radix(elements[2], 16)
            .map_err(|e| format!("event {}: {e}", elements[2]))?;
        let data = u32::from_str_radix(elements[3], 16)
            .map_err(|e| format!("data {}: {e}", elements[3]))?;

        Ok(AcpiEvent {
            class: elements[0].to_owned(),
            bus_id: elements[1].to_owned(),
            code,
            data,
        })
    }
}

/// Read acpid events until end of stream. Lines which are not ACPI events are
/// skipped.
pub fn read_events<R, F>(reader: R, mut callback: F) -> io::Result<()>
where
    R: BufRead,
    F: FnMut(AcpiEvent),
{
    for line in reader.lines() {
        let line = line?;

        match line.parse::<AcpiEvent>() {
            Ok(event) => callback(event),
            Err(e) => debug!("ignoring acpid line {line:?}: {e}"),
        }
    }

    Ok(())
}
