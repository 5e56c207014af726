//! # Calor CLI
//!
//! Command-line interface for serial thermal printers.
//!
//! ## Usage
//!
//! ```bash
//! # Run the HTTP API against the configured serial device
//! calor serve --config printer.toml
//!
//! # Validate a configuration file
//! calor check-config printer.toml
//!
//! # Encode an operation to raw printer bytes
//! echo '{"op":"text","text":"Hello"}' | calor encode - --output hello.bin
//!
//! # Print one operation directly, without the server
//! calor print job.json --device /dev/ttyUSB0
//! ```

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{Level, info, warn};

use calor::{
    CalorError, Config, Operation, ThermalPrinter,
    channel::{ByteChannel, SerialChannel},
    encoder::Encoder,
    printer::load_config,
    scheduler::TickOutcome,
};

/// Give up on a direct print after this long
const PRINT_TIMEOUT: Duration = Duration::from_secs(60);

/// Calor - print-job queue for serial thermal printers
#[derive(Parser, Debug)]
#[command(name = "calor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Configuration file (defaults are used when omitted)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Override the listen address
        #[arg(long)]
        listen: Option<String>,

        /// Override the serial device
        #[arg(long)]
        device: Option<String>,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Configuration file
        path: PathBuf,
    },

    /// Encode an operation (JSON) into printer bytes
    Encode {
        /// Operation file, or `-` for stdin
        input: PathBuf,

        /// Configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Write bytes here instead of stdout
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Prepend the session header (wake, init, heat)
        #[arg(long)]
        header: bool,
    },

    /// Print one operation (JSON) directly to the serial device
    Print {
        /// Operation file, or `-` for stdin
        input: PathBuf,

        /// Configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Override the serial device
        #[arg(long)]
        device: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn run(command: Commands) -> Result<(), CalorError> {
    match command {
        Commands::Serve {
            config,
            listen,
            device,
        } => {
            let mut config = config_or_default(config.as_deref())?;
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            if let Some(device) = device {
                config.serial.device = device;
            }
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(calor::server::serve(config))
        }

        Commands::CheckConfig { path } => {
            let config = load_config(&path)?;
            config.log_summary();
            println!("{} is valid", path.display());
            Ok(())
        }

        Commands::Encode {
            input,
            config,
            output,
            header,
        } => {
            let config = config_or_default(config.as_deref())?;
            let operation = read_operation(&input)?;
            let encoder = Encoder::new(&config.printer);
            let job = encoder.encode(&operation)?;

            let mut data = Vec::new();
            if header {
                data.extend(encoder.session_header());
            }
            data.extend(&job.payload);

            match output {
                Some(path) => {
                    fs::write(&path, &data)?;
                    println!(
                        "Wrote {} bytes ({} lines) to {}",
                        data.len(),
                        job.estimated_lines,
                        path.display()
                    );
                }
                None => io::stdout().write_all(&data)?,
            }
            Ok(())
        }

        Commands::Print {
            input,
            config,
            device,
        } => {
            let mut config = config_or_default(config.as_deref())?;
            if let Some(device) = device {
                config.serial.device = device;
            }
            let operation = read_operation(&input)?;
            print_direct(&config, &operation)
        }
    }
}

fn config_or_default(path: Option<&Path>) -> Result<Config, CalorError> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn read_operation(input: &Path) -> Result<Operation, CalorError> {
    let text = if input == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        text
    } else {
        fs::read_to_string(input)?
    };
    Ok(serde_json::from_str(&text)?)
}

/// Queue one job and run the scheduler until it has been handed to the driver.
fn print_direct(config: &Config, operation: &Operation) -> Result<(), CalorError> {
    let mut printer_config = config.printer.clone();
    printer_config.startup_message = false;
    printer_config.enable_queue_system = true;
    printer_config.auto_process_queue = true;

    let handshake_line = printer_config
        .dtr_pin
        .filter(|_| printer_config.enable_dtr_handshaking);
    let channel = SerialChannel::open(&config.serial.device, config.serial.baud_rate, handshake_line)?;
    let mut printer = ThermalPrinter::new(channel, &printer_config, Instant::now())?;
    printer.submit(operation, Instant::now())?;

    let tick = Duration::from_millis(config.server.tick_interval_ms);
    let started = Instant::now();
    while !printer.scheduler().queue().is_empty() {
        if started.elapsed() > PRINT_TIMEOUT {
            return Err(CalorError::NotReady("timed out waiting for the printer"));
        }
        match printer.tick(Instant::now()) {
            TickOutcome::Transmitted { id, bytes } => info!(%id, bytes, "job sent"),
            TickOutcome::Rejected {
                required_mm,
                remaining_mm,
                ..
            } => {
                return Err(CalorError::InsufficientPaper {
                    required_mm,
                    remaining_mm,
                });
            }
            TickOutcome::Dropped { error, .. } => return Err(error.into()),
            TickOutcome::Halted => return Err(CalorError::Halted),
            TickOutcome::DtrTimeout => warn!("printer still busy"),
            _ => {}
        }
        thread::sleep(tick);
    }

    let channel = printer.scheduler_mut().channel_mut();
    while channel.pending_len() > 0 {
        if started.elapsed() > PRINT_TIMEOUT {
            return Err(CalorError::NotReady("timed out flushing the serial buffer"));
        }
        channel.write(&[])?;
        thread::sleep(tick);
    }

    println!("Printed successfully!");
    Ok(())
}
