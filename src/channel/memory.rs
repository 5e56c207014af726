//! # In-Memory Channel
//!
//! Records every write and lets a test script the link: DTR level, transient
//! or fatal write failures, reconnection and status replies.

use std::collections::VecDeque;
use std::io;

use super::{ByteChannel, ChannelError};

/// How the next write should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Transient I/O error, the link stays up
    Io,
    /// The device disappears
    Disconnect,
    /// The driver buffer is full, nothing is accepted
    Busy,
}

/// Recording channel.
///
/// ```
/// use calor::channel::{ByteChannel, MemoryChannel};
///
/// let mut channel = MemoryChannel::new();
/// channel.write(b"hello").unwrap();
/// assert_eq!(channel.bytes(), b"hello".to_vec());
/// ```
#[derive(Debug)]
pub struct MemoryChannel {
    writes: Vec<Vec<u8>>,
    dtr: bool,
    connected: bool,
    reconnect_ready: bool,
    fail_next: Option<Failure>,
    drop_on_dtr_read: bool,
    replies: VecDeque<u8>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self {
            writes: Vec::new(),
            dtr: true,
            connected: true,
            reconnect_ready: false,
            fail_next: None,
            drop_on_dtr_read: false,
            replies: VecDeque::new(),
        }
    }
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each successful `write` call, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Everything written, concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.writes.concat()
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }

    pub fn set_dtr(&mut self, asserted: bool) {
        self.dtr = asserted;
    }

    pub fn fail_next_write(&mut self, failure: Failure) {
        self.fail_next = Some(failure);
    }

    /// The next DTR read finds the device gone.
    pub fn disconnect_on_dtr_read(&mut self) {
        self.drop_on_dtr_read = true;
    }

    /// Drop the link; it stays down until [`MemoryChannel::allow_reconnect`].
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn allow_reconnect(&mut self) {
        self.reconnect_ready = true;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Queue a byte for the host to read, e.g. a status reply.
    pub fn push_reply(&mut self, byte: u8) {
        self.replies.push_back(byte);
    }

    fn gone() -> ChannelError {
        ChannelError::Disconnected("memory channel disconnected".to_string())
    }
}

impl ByteChannel for MemoryChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(Self::gone());
        }
        match self.fail_next.take() {
            Some(Failure::Io) => Err(ChannelError::Io(io::Error::other("injected write failure"))),
            Some(Failure::Disconnect) => {
                self.connected = false;
                Err(Self::gone())
            }
            Some(Failure::Busy) => Err(ChannelError::Busy { pending: 0 }),
            None => {
                self.writes.push(bytes.to_vec());
                Ok(())
            }
        }
    }

    fn dtr_asserted(&mut self) -> Result<bool, ChannelError> {
        if std::mem::take(&mut self.drop_on_dtr_read) {
            self.connected = false;
        }
        if !self.connected {
            return Err(Self::gone());
        }
        Ok(self.dtr)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, ChannelError> {
        if !self.connected {
            return Err(Self::gone());
        }
        Ok(self.replies.pop_front())
    }

    fn reconnect(&mut self) -> bool {
        if self.connected {
            return true;
        }
        if self.reconnect_ready {
            self.connected = true;
            self.reconnect_ready = false;
        }
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_writes() {
        let mut channel = MemoryChannel::new();
        channel.write(&[1, 2]).unwrap();
        channel.write(&[3]).unwrap();
        assert_eq!(channel.writes().len(), 2);
        assert_eq!(channel.bytes(), vec![1, 2, 3]);
    }

    #[test]
    fn test_injected_io_failure_is_transient() {
        let mut channel = MemoryChannel::new();
        channel.fail_next_write(Failure::Io);
        let err = channel.write(&[1]).unwrap_err();
        assert!(!err.is_fatal());
        assert!(channel.write(&[2]).is_ok());
        assert_eq!(channel.bytes(), vec![2]);
    }

    #[test]
    fn test_busy_write_keeps_nothing() {
        let mut channel = MemoryChannel::new();
        channel.write(&[1]).unwrap();
        channel.clear();
        channel.fail_next_write(Failure::Busy);
        assert!(channel.write(&[2]).unwrap_err().is_busy());
        assert!(channel.writes().is_empty());
        assert!(channel.is_connected());
    }

    #[test]
    fn test_dtr_read_can_lose_the_link() {
        let mut channel = MemoryChannel::new();
        channel.disconnect_on_dtr_read();
        assert!(channel.dtr_asserted().unwrap_err().is_fatal());
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_disconnect_until_reconnect_allowed() {
        let mut channel = MemoryChannel::new();
        channel.disconnect();
        assert!(channel.write(&[1]).unwrap_err().is_fatal());
        assert!(!channel.reconnect());
        assert!(!channel.is_connected());
        channel.allow_reconnect();
        assert!(channel.reconnect());
        assert!(channel.is_connected());
        assert!(channel.write(&[1]).is_ok());
    }

    #[test]
    fn test_replies_in_order() {
        let mut channel = MemoryChannel::new();
        channel.push_reply(0x0C);
        channel.push_reply(0x00);
        assert_eq!(channel.read_byte().unwrap(), Some(0x0C));
        assert_eq!(channel.read_byte().unwrap(), Some(0x00));
        assert_eq!(channel.read_byte().unwrap(), None);
    }
}
