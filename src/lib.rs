//! # Calor - Thermal Printer Job Queue
//!
//! Calor drives small serial thermal printers (58 mm ESC/POS receipt
//! printers) that have little buffering and a print head that overheats
//! when fed continuously. It provides:
//!
//! - **Protocol implementation**: ESC/POS command builders
//! - **Encoder**: text, QR, barcode, receipt and list layouts to bytes
//! - **Job queue**: bounded FIFO of encoded jobs
//! - **Scheduler**: paced transmission with cooling, DTR and paper gating
//! - **Health monitor**: paper estimate, sensor state and counters
//! - **Server**: an HTTP API over a single printer task
//!
//! ## Quick Start
//!
//! ```
//! use std::time::Instant;
//! use calor::{
//!     channel::MemoryChannel,
//!     encoder::{Operation, TextParams},
//!     printer::PrinterConfig,
//!     ThermalPrinter,
//! };
//!
//! let config = PrinterConfig {
//!     startup_message: false,
//!     ..PrinterConfig::default()
//! };
//! let now = Instant::now();
//! let mut printer = ThermalPrinter::new(MemoryChannel::new(), &config, now)?;
//!
//! printer.submit(&Operation::Text(TextParams::new("Hello")), now)?;
//! printer.tick(now);
//!
//! assert!(!printer.scheduler().channel().bytes().is_empty());
//! # Ok::<(), calor::CalorError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | ESC/POS command builders |
//! | [`channel`] | Serial and in-memory byte channels |
//! | [`encoder`] | Operations to printer bytes |
//! | [`queue`] | Bounded job queue |
//! | [`scheduler`] | Paced transmission state machine |
//! | [`health`] | Paper and health monitoring |
//! | [`service`] | Request-level API over one printer |
//! | [`runtime`] | Printer task and its handle |
//! | [`server`] | HTTP API |
//! | [`printer`] | Configuration |
//! | [`error`] | Error types |

pub mod channel;
pub mod encoder;
pub mod error;
pub mod health;
pub mod printer;
pub mod protocol;
pub mod queue;
pub mod runtime;
pub mod scheduler;
pub mod server;
pub mod service;

// Re-exports for convenience
pub use encoder::Operation;
pub use error::CalorError;
pub use printer::{Config, PrinterConfig};
pub use service::ThermalPrinter;
