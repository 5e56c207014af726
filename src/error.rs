//! # Error Types
//!
//! This module defines the crate-level error type. Each layer owns a narrower
//! error enum ([`ConfigError`], [`EncodingError`], [`QueueFull`],
//! [`ChannelError`]) which converts into [`CalorError`] with `?`.
//!
//! ## Recovery Classes
//!
//! | Error | Raised | Recovery |
//! |-------|--------|----------|
//! | `Config` | setup | none, fix the configuration |
//! | `QueueFull` | enqueue | caller retries or drops |
//! | `Encoding` | encode | job discarded, retrying reproduces it |
//! | `InsufficientPaper` | check / dequeue | replace the roll |
//! | `Channel` | transmit | reconnect event |

use thiserror::Error;

use crate::channel::ChannelError;
use crate::encoder::EncodingError;
use crate::printer::ConfigError;
use crate::queue::{JobId, QueueFull};

/// Main error type for calor operations
#[derive(Debug, Error)]
pub enum CalorError {
    /// Invalid configuration, rejected at setup
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The job queue is at capacity
    #[error(transparent)]
    QueueFull(#[from] QueueFull),

    /// The operation could not be turned into printer commands
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The remaining paper cannot cover the job
    #[error("Insufficient paper: need {required_mm:.1}mm, {remaining_mm:.1}mm remaining")]
    InsufficientPaper { required_mm: f32, remaining_mm: f32 },

    /// The paper sensor reports no paper
    #[error("Paper out")]
    PaperOut,

    /// A synchronous print was attempted inside the cooling window
    #[error("Printer cooling down, {remaining_ms}ms remaining")]
    Cooling { remaining_ms: u64 },

    /// A synchronous print was attempted while the printer cannot take data
    #[error("Printer not ready: {0}")]
    NotReady(&'static str),

    /// The scheduler is halted until the channel reconnects
    #[error("Printer halted after channel failure")]
    Halted,

    /// No queued job carries this id
    #[error("Unknown job {0}")]
    UnknownJob(JobId),

    /// The task that owns the printer is gone
    #[error("Printer task stopped")]
    Unavailable,

    /// Byte channel failure
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Usage file (de)serialisation
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
