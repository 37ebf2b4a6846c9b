//! eepman - EEPROM configuration store CLI
//!
//! Manages JSON-encoded non-volatile data replicated across EEPROM
//! devices. Exit code is 0 on success, or the engine's stable negative
//! error code (truncated to 8 bits by the OS, as usual).

use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eepman::{EepromStore, Result, SetOptions, VerifyStatus, DEFAULT_CONFIG_PATH};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Manage JSON-encoded non-volatile data replicated across EEPROM devices
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Suppress all output except read values
    #[arg(short, long)]
    quiet: bool,

    /// Print values as shell assignments: key="value"
    #[arg(short = 'b', long)]
    shell: bool,

    /// Do not create the key if it does not exist (set only)
    #[arg(short, long)]
    no_create: bool,

    /// Zero-fill the devices before writing (slow, set only)
    #[arg(short, long)]
    zero: bool,

    /// Configuration file listing the replica devices
    #[arg(long, env = "EEPROM_MANAGER_CONF", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read the value of one or more keys
    Read {
        /// Keys to read
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Set a key to a value
    Set {
        /// Key to modify
        key: String,
        /// Value words, joined with spaces; empty means the empty string
        value: Vec<String>,
    },
    /// Remove a key
    Remove {
        /// Key to delete
        key: String,
    },
    /// List every key and value
    All,
    /// Erase all data, resetting every device to the empty document
    Clear,
    /// Check every replica's digest, repairing mismatches
    Verify,
    /// Show the configured replica pool
    Info,
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    let args = Args::parse();
    init_logging(&args);

    match run(&args) {
        Ok(()) => exit(0),
        Err(e) => {
            if !args.quiet {
                eprintln!("ERROR: {e}");
            }
            exit(e.code());
        }
    }
}

fn run(args: &Args) -> Result<()> {
    warn_unused_flags(args);
    let store = EepromStore::open(&args.config)?;

    match &args.command {
        Command::Read { keys } => {
            for key in keys {
                let value = store.get(key)?;
                print_pair(args, key, &value);
            }
        }
        Command::Set { key, value } => {
            let value = value.join(" ");
            let options = SetOptions {
                no_create: args.no_create,
                zero_fill: args.zero,
            };
            store.set(key, &value, options)?;
            if !args.quiet {
                println!("Set value for key {key} to {value}.");
            }
        }
        Command::Remove { key } => {
            store.remove(key)?;
            if !args.quiet {
                println!("Removed key {key}.");
            }
        }
        Command::All => {
            for (key, value) in store.entries()? {
                print_pair(args, &key, &value);
            }
        }
        Command::Clear => {
            store.clear()?;
            if !args.quiet {
                println!("All EEPROM contents erased.");
            }
        }
        Command::Verify => {
            let status = store.verify()?;
            if !args.quiet {
                match status {
                    VerifyStatus::AllPassed => println!("All EEPROMs passed verification."),
                    VerifyStatus::Repaired => {
                        println!(
                            "One or more EEPROMs did not pass verification \
                             but have since been corrected."
                        );
                        println!("Everything is ok.");
                    }
                }
            }
        }
        Command::Info => {
            if !args.quiet {
                for device in store.info() {
                    println!(
                        "{}  block_size={}  size={}  blocks={}",
                        device.path.display(),
                        device.block_size,
                        device.byte_size,
                        device.block_count,
                    );
                }
            }
        }
    }

    Ok(())
}

// =============================================================================
// Output Helpers
// =============================================================================

fn print_pair(args: &Args, key: &str, value: &str) {
    if args.shell {
        println!("{key}=\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""));
    } else if args.quiet {
        println!("{value}");
    } else {
        println!("{key} = {value}");
    }
}

fn warn_unused_flags(args: &Args) {
    if matches!(args.command, Command::Set { .. }) {
        return;
    }
    if args.no_create && !args.quiet {
        eprintln!("WARNING: ignoring argument -n");
    }
    if args.zero && !args.quiet {
        eprintln!("WARNING: ignoring argument -z");
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    // -q means silent: no diagnostics on stderr at all, regardless of the
    // environment
    let filter = if args.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Tests
// =============================================================================
