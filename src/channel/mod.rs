//! # Byte Channel
//!
//! The half-duplex serial link between host and printer.
//!
//! ## Available Channels
//!
//! - [`serial`]: a tty device in raw, non-blocking mode (Linux/Unix)
//! - [`memory`]: an in-memory recorder with scripted failures, for tests and
//!   dry runs
//!
//! ## Contract
//!
//! `write` never blocks the caller: bytes the driver cannot take yet stay
//! buffered inside the channel, up to a bound. Past it the write is refused
//! with [`ChannelError::Busy`] and the job stays queued. Other transient I/O
//! failures cost the current job. [`ChannelError::Disconnected`] halts the
//! scheduler until [`ByteChannel::reconnect`] succeeds.

pub mod memory;
pub mod serial;

pub use memory::MemoryChannel;
pub use serial::SerialChannel;

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// A write or status read failed, the link itself is still up
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    /// The driver is behind; nothing was accepted, try again later
    #[error("channel busy, {pending} bytes still buffered")]
    Busy { pending: usize },

    /// The device went away
    #[error("device disconnected: {0}")]
    Disconnected(String),

    /// The device could not be opened or configured
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),
}

impl ChannelError {
    /// Whether the scheduler must halt rather than drop one job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChannelError::Disconnected(_))
    }

    /// Whether the write was refused without losing anything.
    pub fn is_busy(&self) -> bool {
        matches!(self, ChannelError::Busy { .. })
    }

    /// Sort an OS error into transient or fatal.
    pub fn classify(err: io::Error) -> Self {
        let gone = matches!(
            err.kind(),
            io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::UnexpectedEof
        ) || matches!(
            err.raw_os_error(),
            Some(libc::EIO) | Some(libc::ENXIO) | Some(libc::ENODEV)
        );
        if gone {
            ChannelError::Disconnected(err.to_string())
        } else {
            ChannelError::Io(err)
        }
    }
}

/// A link to the printer.
pub trait ByteChannel {
    /// Hand bytes to the driver. Must not block.
    fn write(&mut self, bytes: &[u8]) -> Result<(), ChannelError>;

    /// State of the printer's readiness (DTR) line.
    ///
    /// Channels without a handshake line report `true`.
    fn dtr_asserted(&mut self) -> Result<bool, ChannelError>;

    /// Next byte received from the printer, if one is waiting.
    fn read_byte(&mut self) -> Result<Option<u8>, ChannelError>;

    /// Try to re-establish a lost link. Returns `true` once usable again.
    fn reconnect(&mut self) -> bool;
}
