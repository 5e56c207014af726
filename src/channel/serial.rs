//! # Serial TTY Channel
//!
//! Drives a printer attached to a UART, USB-serial adapter or RFCOMM node.
//!
//! ## TTY Configuration
//!
//! The device is opened non-blocking and switched to raw mode so binary
//! command data passes unmodified:
//!
//! - **No input processing**: IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR,
//!   ICRNL and software flow control (IXON/IXOFF/IXANY) disabled
//! - **No output processing**: OPOST disabled (no LF to CRLF translation)
//! - **8N1**: CS8, no parity, CLOCAL | CREAD
//! - **Non-canonical, no echo**, VMIN = VTIME = 0
//!
//! XON/XOFF must stay off: 0x11 and 0x13 occur inside QR and barcode payloads.
//!
//! ## DTR Handshake
//!
//! Many of these printers raise a DTR output while their buffer has room.
//! Wire it to one of the adapter's modem-status inputs (CTS, DSR, DCD or RI)
//! and name that line in the configuration; [`SerialChannel::dtr_asserted`]
//! reads it with `TIOCMGET`. Buffered bytes are only pushed to the driver
//! while that line is asserted.
//!
//! ## Buffering
//!
//! Bytes the driver cannot take yet are held in memory, up to
//! [`MAX_PENDING`]. A write that would grow the buffer past that fails with
//! [`ChannelError::Busy`] and nothing of it is kept.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{ByteChannel, ChannelError};
use crate::printer::ModemLine;

/// Most bytes held back from the driver before writes are refused
pub const MAX_PENDING: usize = 8 * 1024;

/// # Serial Printer Channel
///
/// ```no_run
/// use calor::channel::{ByteChannel, SerialChannel};
/// use calor::protocol::commands;
///
/// let mut channel = SerialChannel::open("/dev/ttyUSB0", 19200, None)?;
/// channel.write(&commands::init())?;
/// # Ok::<(), calor::channel::ChannelError>(())
/// ```
pub struct SerialChannel {
    path: PathBuf,
    baud_rate: u32,
    handshake_line: Option<ModemLine>,
    file: Option<File>,
    /// Bytes accepted from the scheduler but not yet taken by the driver
    pending: VecDeque<u8>,
}

impl SerialChannel {
    /// Open and configure the device.
    ///
    /// ## Errors
    ///
    /// - the device does not exist or permission is denied (dialout group)
    /// - the baud rate has no termios constant
    /// - TTY configuration fails
    pub fn open<P: AsRef<Path>>(
        device: P,
        baud_rate: u32,
        handshake_line: Option<ModemLine>,
    ) -> Result<Self, ChannelError> {
        let path = device.as_ref().to_path_buf();
        let file = open_device(&path, baud_rate)?;
        info!(device = %path.display(), baud_rate, "serial channel open");
        Ok(Self {
            path,
            baud_rate,
            handshake_line,
            file: Some(file),
            pending: VecDeque::new(),
        })
    }

    /// Bytes still waiting for room in the driver buffer.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn closed(&self) -> ChannelError {
        ChannelError::Disconnected(format!("{} is closed", self.path.display()))
    }

    fn file(&mut self) -> Result<&mut File, ChannelError> {
        match self.file {
            Some(ref mut file) => Ok(file),
            None => Err(ChannelError::Disconnected(format!(
                "{} is closed",
                self.path.display()
            ))),
        }
    }

    fn fail(&mut self, err: io::Error) -> ChannelError {
        let err = ChannelError::classify(err);
        if err.is_fatal() {
            warn!(device = %self.path.display(), error = %err, "serial device lost");
            self.file = None;
            self.pending.clear();
        }
        err
    }

    /// Push as much of `pending` into the driver as it will take right now.
    ///
    /// Holds everything back while the handshake line is deasserted.
    fn drain(&mut self) -> Result<(), ChannelError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if let Some(line) = self.handshake_line {
            let Some(file) = self.file.as_ref() else {
                return Err(self.closed());
            };
            match read_modem_line(file, line) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => return Err(self.fail(e)),
            }
        }

        while !self.pending.is_empty() {
            let Some(file) = self.file.as_mut() else {
                return Err(self.closed());
            };
            let (head, _) = self.pending.as_slices();
            let result = file.write(head);
            match result {
                Ok(0) => break,
                Ok(n) => {
                    self.pending.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.fail(e)),
            }
        }
        Ok(())
    }
}

impl ByteChannel for SerialChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.file()?;
        self.drain()?;
        // A single payload larger than the limit is still taken when nothing is held
        if !self.pending.is_empty() && self.pending.len() + bytes.len() > MAX_PENDING {
            debug!(buffered = self.pending.len(), incoming = bytes.len(), "serial buffer full");
            return Err(ChannelError::Busy {
                pending: self.pending.len(),
            });
        }
        self.pending.extend(bytes);
        self.drain()?;
        if !self.pending.is_empty() {
            debug!(buffered = self.pending.len(), "driver buffer full, holding bytes");
        }
        Ok(())
    }

    fn dtr_asserted(&mut self) -> Result<bool, ChannelError> {
        let Some(line) = self.handshake_line else {
            return Ok(true);
        };
        let result = {
            let file = self.file()?;
            read_modem_line(file, line)
        };
        result.map_err(|e| self.fail(e))
    }

    fn read_byte(&mut self) -> Result<Option<u8>, ChannelError> {
        self.drain()?;
        let mut buf = [0u8; 1];
        let result = self.file()?.read(&mut buf);
        match result {
            Ok(1) => Ok(Some(buf[0])),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn reconnect(&mut self) -> bool {
        if self.file.is_some() {
            return true;
        }
        match open_device(&self.path, self.baud_rate) {
            Ok(file) => {
                info!(device = %self.path.display(), "serial device reconnected");
                self.file = Some(file);
                true
            }
            Err(e) => {
                debug!(device = %self.path.display(), error = %e, "reconnect attempt failed");
                false
            }
        }
    }
}

// ============================================================================
// TTY HELPERS
// ============================================================================

#[cfg(unix)]
fn open_device(path: &Path, baud_rate: u32) -> Result<File, ChannelError> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    let speed = baud_constant(baud_rate).ok_or(ChannelError::UnsupportedBaud(baud_rate))?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| ChannelError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    configure_tty_raw(file.as_raw_fd(), speed).map_err(|e| ChannelError::Open {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_device(path: &Path, _baud_rate: u32) -> Result<File, ChannelError> {
    Err(ChannelError::Open {
        path: path.display().to_string(),
        reason: "serial channels are only supported on Unix".to_string(),
    })
}

#[cfg(unix)]
fn baud_constant(baud_rate: u32) -> Option<libc::speed_t> {
    let speed = match baud_rate {
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        _ => return None,
    };
    Some(speed)
}

/// Configure a file descriptor for raw 8N1 at `speed`.
#[cfg(unix)]
fn configure_tty_raw(fd: i32, speed: libc::speed_t) -> io::Result<()> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB | libc::CSTOPB);
    termios.c_cflag |= libc::CS8 | libc::CLOCAL | libc::CREAD;
    termios.c_cc[libc::VMIN] = 0;
    termios.c_cc[libc::VTIME] = 0;

    unsafe {
        if libc::cfsetispeed(&mut termios, speed) != 0
            || libc::cfsetospeed(&mut termios, speed) != 0
        {
            return Err(io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &termios) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(unix)]
fn read_modem_line(file: &File, line: ModemLine) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let mut bits: libc::c_int = 0;
    if unsafe { libc::ioctl(file.as_raw_fd(), libc::TIOCMGET, &mut bits) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let mask = match line {
        ModemLine::Cts => libc::TIOCM_CTS,
        ModemLine::Dsr => libc::TIOCM_DSR,
        ModemLine::Dcd => libc::TIOCM_CAR,
        ModemLine::Ri => libc::TIOCM_RNG,
    };
    Ok(bits & mask != 0)
}

#[cfg(not(unix))]
fn read_modem_line(_file: &File, _line: ModemLine) -> io::Result<bool> {
    Ok(true)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device() {
        let err = SerialChannel::open("/dev/does-not-exist-calor", 19200, None)
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::Open { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_unsupported_baud() {
        let err = SerialChannel::open("/dev/null", 12345, None).err().unwrap();
        assert!(matches!(err, ChannelError::UnsupportedBaud(12345)));
    }

    #[cfg(unix)]
    #[test]
    fn test_supported_bauds() {
        for baud in [9600, 19200, 38400, 57600, 115200] {
            assert!(baud_constant(baud).is_some());
        }
    }

    /// Open a pseudo-terminal pair, returning the master and the slave path.
    #[cfg(unix)]
    fn pty_pair() -> (File, PathBuf) {
        use std::ffi::CStr;
        use std::os::unix::io::FromRawFd;

        unsafe {
            let fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
            assert!(fd >= 0, "posix_openpt failed");
            assert_eq!(libc::grantpt(fd), 0);
            assert_eq!(libc::unlockpt(fd), 0);
            let name = libc::ptsname(fd);
            assert!(!name.is_null());
            let path = PathBuf::from(CStr::from_ptr(name).to_string_lossy().into_owned());
            (File::from_raw_fd(fd), path)
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_write_reaches_device() {
        let (mut master, slave) = pty_pair();
        let mut channel = SerialChannel::open(&slave, 19200, None).unwrap();

        channel.write(b"hello").unwrap();
        assert_eq!(channel.pending_len(), 0);

        let mut received = [0u8; 5];
        master.read_exact(&mut received).unwrap();
        assert_eq!(&received, b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_pending_is_bounded() {
        // Nobody reads the master, so the driver buffer fills up
        let (_master, slave) = pty_pair();
        let mut channel = SerialChannel::open(&slave, 19200, None).unwrap();
        let chunk = vec![0x55; 4096];

        let mut busy = 0;
        for _ in 0..1000 {
            match channel.write(&chunk) {
                Ok(()) => {}
                Err(e) => {
                    assert!(e.is_busy(), "{e}");
                    assert!(!e.is_fatal());
                    busy += 1;
                }
            }
            assert!(channel.pending_len() <= MAX_PENDING);
        }
        assert!(busy > 0);
    }

    // Other serial tests require an attached printer; the scheduler tests use
    // MemoryChannel instead.
}
