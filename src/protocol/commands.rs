//! # Printer Control Commands
//!
//! Byte builders for the ESC/POS dialect spoken by the small serial thermal
//! printers (CSN-A2, QR204 and friends) this crate drives.
//!
//! ## Escape Sequence Structure
//!
//! - Single byte: `LF`, `HT`, the wake byte `0xFF`
//! - Two bytes: `ESC @`
//! - With parameters: `ESC d n`, `ESC 7 n1 n2 n3`
//!
//! Multi-byte integers are **little-endian**.
//!
//! These sequences were taken from firmware that drove the printer directly;
//! confirm them against the datasheet of the exact model before relying on
//! anything beyond text and feeds.

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix (barcodes, 2D codes, invert)
pub const GS: u8 = 0x1D;

/// DC2 (Device Control 2) - Vendor command prefix (test page)
pub const DC2: u8 = 0x12;

/// LF (Line Feed) - Print the line buffer and advance one line
pub const LF: u8 = 0x0A;

/// HT (Horizontal Tab)
pub const HT: u8 = 0x09;

/// Wake byte. The printer ignores it when awake and leaves sleep mode otherwise.
pub const WAKE: u8 = 0xFF;

/// NUL bytes sent after [`WAKE`]; they pace the link while the head powers up.
const WAKE_PADDING: usize = 10;

// ============================================================================
// SESSION COMMANDS
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Clears the print buffer and resets all modes to power-on defaults.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

/// # Wake Sequence
///
/// `0xFF` followed by NUL padding. Safe to send to an awake printer.
///
/// ```
/// use calor::protocol::commands;
///
/// let wake = commands::wake();
/// assert_eq!(wake[0], 0xFF);
/// assert!(wake[1..].iter().all(|&b| b == 0));
/// ```
pub fn wake() -> Vec<u8> {
    let mut cmd = Vec::with_capacity(1 + WAKE_PADDING);
    cmd.push(WAKE);
    cmd.extend(std::iter::repeat_n(0u8, WAKE_PADDING));
    cmd
}

/// # Sleep After Idle (ESC 8 nL nH)
///
/// Programs the printer to enter low-power mode after `seconds` without data.
/// `0` disables the timer.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC 8 nL nH |
/// | Hex     | 1B 38 nL nH |
#[inline]
pub fn sleep_after(seconds: u16) -> Vec<u8> {
    let [lo, hi] = u16_le(seconds);
    vec![ESC, b'8', lo, hi]
}

/// # Heat Configuration (ESC 7 n1 n2 n3)
///
/// Controls how hard the print head is driven.
///
/// ## Parameters
///
/// - `dots`: max heating dots, in units of 8 dots (`n1`)
/// - `time`: heating time, in units of 10 microseconds (`n2`)
/// - `interval`: heating interval, in units of 10 microseconds (`n3`)
///
/// More dots and longer heating print darker but draw more current and heat
/// the head faster; a longer interval lets it recover between bursts.
///
/// ```
/// use calor::protocol::commands;
///
/// assert_eq!(commands::heat_config(7, 80, 2), vec![0x1B, 0x37, 7, 80, 2]);
/// ```
#[inline]
pub fn heat_config(dots: u8, time: u8, interval: u8) -> Vec<u8> {
    vec![ESC, b'7', dots, time, interval]
}

/// # Select Online / Offline (ESC = n)
///
/// An offline printer ignores everything except this command.
#[inline]
pub fn set_online(online: bool) -> Vec<u8> {
    vec![ESC, b'=', u8::from(online)]
}

/// # Self-Test Page (DC2 T)
#[inline]
pub fn test_page() -> Vec<u8> {
    vec![DC2, b'T']
}

// ============================================================================
// STATUS COMMANDS
// ============================================================================

/// # Transmit Paper Sensor Status (ESC v 0)
///
/// The printer answers with a single status byte, decoded by
/// [`crate::health::StatusByte`].
#[inline]
pub fn status_query() -> Vec<u8> {
    vec![ESC, b'v', 0]
}

// ============================================================================
// PAPER FEED COMMANDS
// ============================================================================

/// # Print and Feed Lines (ESC d n)
///
/// ```
/// use calor::protocol::commands;
///
/// assert_eq!(commands::feed_lines(3), vec![0x1B, 0x64, 3]);
/// ```
#[inline]
pub fn feed_lines(n: u8) -> Vec<u8> {
    vec![ESC, b'd', n]
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Encode a u16 value as little-endian bytes [low, high]
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// TESTS
// ============================================================================
