//! libusb-package diagnostic command
//!
//! Reports what the runtime locator sees: the bundled library, individual
//! lookups, attached devices and the binaries a repackager would embed.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::setup_logging;
use locator::{BackendChoice, DeviceFilter, LibraryContext, collect_dynamic_libs};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "libusb-package")]
#[command(author, version, about = "Locate the bundled libusb and list USB devices")]
#[command(long_about = "
Inspects the libusb package: which shared library it bundles, what a
library lookup resolves to, and which USB devices are visible through it.

EXAMPLES:
    # Where is the bundled library?
    libusb-package path

    # List every device through the bundled libusb
    libusb-package devices --all

    # Same, through the system libusb only
    libusb-package devices --all --system

    # Find a specific device
    libusb-package devices --vid 1d50 --pid 6018

ENVIRONMENT:
    LIBUSB_PACKAGE_DIR   Package directory to search (defaults to the
                         directory containing this executable)
    RUST_LOG             Log filter, overrides --log-level
")]
struct Args {
    /// Package directory to search
    #[arg(short, long, value_name = "DIR", global = true)]
    package_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the bundled library path
    Path,

    /// Print what a backend lookup for CANDIDATE resolves to
    FindLibrary {
        /// Library name, e.g. usb-1.0
        candidate: String,
    },

    /// List USB devices
    Devices {
        /// Vendor ID (hex)
        #[arg(long, value_parser = parse_hex_u16)]
        vid: Option<u16>,

        /// Product ID (hex)
        #[arg(long, value_parser = parse_hex_u16)]
        pid: Option<u16>,

        /// List every match instead of the first
        #[arg(long)]
        all: bool,

        /// Use the system libusb, ignoring the bundled one
        #[arg(long)]
        system: bool,

        /// Print devices as JSON
        #[arg(long)]
        json: bool,
    },

    /// List dynamic libraries a repackager should embed
    Bundle {
        /// Install root to walk (defaults to the package directory)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
    },
}

fn parse_hex_u16(s: &str) -> std::result::Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex ID '{}': {}", s, e))
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level).context("Failed to setup logging")?;

    let context = match args.package_dir {
        Some(dir) => LibraryContext::new(common::Platform::host(), dir),
        None => LibraryContext::from_env(),
    };
    debug!(
        "Package directory: {} ({})",
        context.package_dir().display(),
        context.platform()
    );

    match args.command {
        Command::Path => match context.library_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("none"),
        },
        Command::FindLibrary { candidate } => match context.find_library(&candidate) {
            Some(source) => println!("{}", source),
            None => println!("none"),
        },
        Command::Devices {
            vid,
            pid,
            all,
            system,
            json,
        } => {
            let mut filter = if all {
                DeviceFilter::all()
            } else {
                DeviceFilter::first()
            };
            filter.vendor_id = vid;
            filter.product_id = pid;

            let backend = if system {
                BackendChoice::System
            } else {
                BackendChoice::Default
            };
            let devices = context
                .find_devices(&filter, backend)
                .context("Failed to enumerate USB devices")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("No matching devices");
            } else {
                for device in &devices {
                    println!("{}", device);
                }
            }
        }
        Command::Bundle { root } => {
            let root = root.unwrap_or_else(|| context.package_dir().to_path_buf());
            let binaries = collect_dynamic_libs(&root)
                .with_context(|| format!("Failed to walk {}", root.display()))?;
            for binary in &binaries {
                println!(
                    "{} -> {}",
                    binary.source.display(),
                    binary.destination.display()
                );
            }
        }
    }

    context.shutdown();
    Ok(())
}
