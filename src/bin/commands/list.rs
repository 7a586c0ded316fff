use tbtn::acpi::enumerate_devices;

pub fn list(args: &crate::List) {
    match enumerate_devices(&args.sysfs) {
        Ok(list) if list.is_empty() => {
            log::error!("no supported devices found");
            std::process::exit(1);
        }
        Ok(list) => {
            for device in list {
                println!("{}:", device.bus_id);
                println!("\tHardware ID\t: {}", device.hid);
                println!("\tACPI Path\t: {}", device.path);
            }
        }
        Err(err) => {
            log::error!("{}: {err}", args.sysfs.display());
            std::process::exit(1);
        }
    }
}
