use log::{error, info};
use std::{
    collections::BTreeSet,
    io::{self, BufReader},
    os::unix::net::UnixStream,
    sync::Arc,
};
use tbtn::{
    acpi::{enumerate_devices, read_events, AcpiCall},
    driver::{Device, PlatformDriver, TbtnDriver},
    input::UinputSink,
    keymap::{KeyTable, LogicalKey, RegistrationPolicy},
};

pub fn run(args: &crate::Run, table: Arc<KeyTable>, policy: RegistrationPolicy) {
    let devices = match enumerate_devices(&args.sysfs) {
        Ok(devices) => devices,
        Err(e) => {
            error!("{}: {e}", args.sysfs.display());
            std::process::exit(1);
        }
    };

    let acpi_call = args.acpi_call.clone();

    let mut driver = TbtnDriver::new(
        table,
        policy,
        Box::new(
            move |device: &Device, keys: &BTreeSet<LogicalKey>| -> io::Result<_> {
                Ok((
                    AcpiCall::with_call_path(device, &acpi_call),
                    UinputSink::new(keys)?,
                ))
            },
        ),
    );

    for device in &devices {
        if let Err(e) = driver.add(device) {
            error!("{e}");
            std::process::exit(1);
        }
    }

    if driver.is_empty() {
        error!("no supported devices found");
        std::process::exit(1);
    }

    let socket = match UnixStream::connect(&args.socket) {
        Ok(socket) => socket,
        Err(e) => {
            error!("{}: {e}", args.socket.display());
            std::process::exit(1);
        }
    };

    info!("listening for events on {}", args.socket.display());

    // acpid forwards every ACPI event, not only ours
    let res = read_events(BufReader::new(socket), |event| {
        if event.is_supported() {
            driver.notify(&event.bus_id, event.code);
        }
    });

    for bus_id in driver.bus_ids() {
        driver.remove(&bus_id);
    }

    if let Err(e) = res {
        error!("{}: {e}", args.socket.display());
        std::process::exit(1);
    }

    info!("{}: closed", args.socket.display());
}
