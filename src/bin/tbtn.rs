use clap::{ArgAction, Args, Parser, Subcommand};
use log::{Level, LevelFilter, Metadata, Record};
use std::path::PathBuf;
use tbtn::keymap::RegistrationPolicy;

mod commands;

#[derive(Parser)]
#[command(
    name = "tbtn",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "TOUGHPAD A1/A2 buttons",
    subcommand_required = true
)]
struct App {
    /// Increase message verbosity
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    /// Silence all warnings
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Keymap toml file, replacing the built-in key table
    #[arg(long = "keymap", short = 'k', global = true)]
    keymap: Option<PathBuf>,

    /// Register keys with a press entry (press) or every key in the keymap (all)
    #[arg(long = "policy", global = true, default_value = "all")]
    policy: RegistrationPolicy,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode status values as returned by HINF and print the key events
    Decode(Decode),
    /// Print the key table
    Keymap,
    /// List supported ACPI devices
    #[cfg(target_os = "linux")]
    List(List),
    /// Report button events through uinput until acpid goes away
    #[cfg(target_os = "linux")]
    Run(Run),
}

#[derive(Args)]
struct Decode {
    /// Notification code to decode the status for
    #[arg(long = "notification", short = 'n', default_value = "0x80", value_parser = commands::parse_number::<u32>)]
    notification: u32,

    /// Status values, decimal or hex with 0x prefix
    #[arg(name = "STATUS", required = true, value_parser = commands::parse_number::<u64>)]
    status: Vec<u64>,
}

#[cfg(target_os = "linux")]
#[derive(Args)]
struct List {
    /// Directory of ACPI devices in sysfs
    #[arg(long = "sysfs", hide = true, default_value = tbtn::acpi::SYSFS_ACPI_DEVICES)]
    sysfs: PathBuf,
}

#[cfg(target_os = "linux")]
#[derive(Args)]
struct Run {
    /// acpid socket to read events from
    #[arg(long = "socket", short = 's', default_value = tbtn::acpi::ACPID_SOCKET)]
    socket: PathBuf,

    /// acpi_call control file
    #[arg(long = "acpi-call", default_value = tbtn::acpi::ACPI_CALL)]
    acpi_call: PathBuf,

    /// Directory of ACPI devices in sysfs
    #[arg(long = "sysfs", hide = true, default_value = tbtn::acpi::SYSFS_ACPI_DEVICES)]
    sysfs: PathBuf,
}

fn main() {
    let args = App::parse();

    log::set_logger(&CLI_LOGGER).unwrap();

    let level = if args.quiet {
        LevelFilter::Error
    } else {
        match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    log::set_max_level(level);

    let table = commands::load_keymap(args.keymap.as_deref());

    match &args.command {
        Commands::Decode(decode) => commands::decode::decode(decode, table, args.policy),
        Commands::Keymap => commands::keymap::keymap(&table),
        #[cfg(target_os = "linux")]
        Commands::List(list) => commands::list::list(list),
        #[cfg(target_os = "linux")]
        Commands::Run(run) => commands::run::run(run, table, args.policy),
    }
}

static CLI_LOGGER: CliLogger = CliLogger;

struct CliLogger;

impl log::Log for CliLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "{}: {}",
                match record.level() {
                    Level::Trace => "trace",
                    Level::Debug => "debug",
                    Level::Info => "info",
                    Level::Warn => "warn",
                    Level::Error => "error",
                },
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
