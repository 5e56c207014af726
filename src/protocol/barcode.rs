//! # Barcode Commands
//!
//! 1D barcodes (`GS k`) and printer-native QR codes (`GS ( k`).
//!
//! The printer renders both symbologies itself; the host only sends the
//! payload and a few layout parameters.

use serde::{Deserialize, Serialize};

use super::commands::{GS, u16_le};

// ============================================================================
// 1D BARCODES
// ============================================================================

/// Barcode symbologies understood by `GS k m`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeType {
    UpcA = 0,
    UpcE = 1,
    Ean13 = 2,
    Ean8 = 3,
    Code39 = 4,
    Itf = 5,
    Codabar = 6,
    Code93 = 7,
    Code128 = 8,
}

/// # Set Barcode Height (GS h n)
#[inline]
pub fn height(dots: u8) -> Vec<u8> {
    vec![GS, b'h', dots.max(1)]
}

/// # Print Barcode
///
/// HRI text below the bars (`GS H 2`), module width 3 (`GS w 3`), then the
/// NUL-terminated payload (`GS k m data NUL`).
///
/// ```
/// use calor::protocol::barcode::{barcode, BarcodeType};
///
/// let cmd = barcode(BarcodeType::Code39, b"ABC");
/// assert_eq!(&cmd[6..9], &[0x1D, 0x6B, 4]);
/// assert_eq!(*cmd.last().unwrap(), 0);
/// ```
pub fn barcode(kind: BarcodeType, data: &[u8]) -> Vec<u8> {
    let mut cmd = vec![GS, b'H', 2, GS, b'w', 3, GS, b'k', kind as u8];
    cmd.extend_from_slice(data);
    cmd.push(0);
    cmd
}

// ============================================================================
// QR CODES
// ============================================================================

/// QR Code command builders
///
/// Every `GS ( k` command carries a little-endian parameter length, the
/// symbol class `cn = 49` (QR) and a function number.
pub mod qr {
    use super::{GS, u16_le};

    /// Smallest accepted size step
    pub const MIN_SIZE: u8 = 1;

    /// Largest accepted size step
    pub const MAX_SIZE: u8 = 4;

    /// Highest error-correction level (H)
    pub const MAX_ERROR_CORRECTION: u8 = 3;

    /// Upper bound on the payload regardless of error correction
    pub const MAX_DATA_LEN: usize = 2048;

    /// Module sizes in dots for size steps 1..=4
    const MODULE_DOTS: [u8; 4] = [3, 4, 6, 8];

    /// Byte-mode capacity of a version 40 symbol at levels L, M, Q, H
    const CAPACITY: [usize; 4] = [2953, 2331, 1663, 1273];

    /// Largest payload the printer can encode at `error_correction`.
    ///
    /// ```
    /// use calor::protocol::barcode::qr;
    ///
    /// assert_eq!(qr::capacity(0), 2048);
    /// assert_eq!(qr::capacity(3), 1273);
    /// ```
    pub fn capacity(error_correction: u8) -> usize {
        let level = error_correction.min(MAX_ERROR_CORRECTION) as usize;
        CAPACITY[level].min(MAX_DATA_LEN)
    }

    fn function(func: u8, params: &[u8]) -> Vec<u8> {
        let len = u16::try_from(params.len() + 2).unwrap_or(u16::MAX);
        let [pl, ph] = u16_le(len);
        let mut cmd = vec![GS, b'(', b'k', pl, ph, 49, func];
        cmd.extend_from_slice(params);
        cmd
    }

    /// # Select Model 2 (fn 65)
    pub fn model2() -> Vec<u8> {
        function(65, &[50, 0])
    }

    /// # Module Size (fn 67)
    ///
    /// `size` is a step in 1..=4, clamped.
    pub fn module_size(size: u8) -> Vec<u8> {
        let step = size.clamp(MIN_SIZE, MAX_SIZE);
        function(67, &[MODULE_DOTS[(step - 1) as usize]])
    }

    /// # Error Correction Level (fn 69)
    ///
    /// 0 = L (7%), 1 = M (15%), 2 = Q (25%), 3 = H (30%); clamped.
    pub fn error_correction(level: u8) -> Vec<u8> {
        function(69, &[48 + level.min(MAX_ERROR_CORRECTION)])
    }

    /// # Store Symbol Data (fn 80)
    pub fn store(data: &[u8]) -> Vec<u8> {
        let mut params = Vec::with_capacity(data.len() + 1);
        params.push(48);
        params.extend_from_slice(data);
        function(80, &params)
    }

    /// # Print Stored Symbol (fn 81)
    pub fn print() -> Vec<u8> {
        function(81, &[48])
    }

    /// Full sequence: model, size, error correction, data, print.
    pub fn generate(data: &[u8], size: u8, error_correction_level: u8) -> Vec<u8> {
        let mut cmd = Vec::with_capacity(data.len() + 40);
        cmd.extend(model2());
        cmd.extend(module_size(size));
        cmd.extend(error_correction(error_correction_level));
        cmd.extend(store(data));
        cmd.extend(print());
        cmd
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barcode_layout() {
        let cmd = barcode(BarcodeType::Ean13, b"4006381333931");
        assert_eq!(&cmd[..9], &[0x1D, 0x48, 2, 0x1D, 0x77, 3, 0x1D, 0x6B, 2]);
        assert_eq!(cmd.len(), 9 + 13 + 1);
    }

    #[test]
    fn test_barcode_height_minimum() {
        assert_eq!(height(0), vec![0x1D, 0x68, 1]);
    }

    #[test]
    fn test_qr_model() {
        assert_eq!(qr::model2(), vec![0x1D, 0x28, 0x6B, 4, 0, 49, 65, 50, 0]);
    }

    #[test]
    fn test_qr_size_clamps() {
        assert_eq!(qr::module_size(0), vec![0x1D, 0x28, 0x6B, 3, 0, 49, 67, 3]);
        assert_eq!(qr::module_size(9), vec![0x1D, 0x28, 0x6B, 3, 0, 49, 67, 8]);
    }

    #[test]
    fn test_qr_error_correction_clamps() {
        assert_eq!(qr::error_correction(1), vec![0x1D, 0x28, 0x6B, 3, 0, 49, 69, 49]);
        assert_eq!(qr::error_correction(7), vec![0x1D, 0x28, 0x6B, 3, 0, 49, 69, 51]);
    }

    #[test]
    fn test_qr_store_length_prefix() {
        let cmd = qr::store(b"hello");
        // pL pH = len(data) + 3
        assert_eq!(&cmd[..8], &[0x1D, 0x28, 0x6B, 8, 0, 49, 80, 48]);
        assert_eq!(&cmd[8..], b"hello");
    }

    #[test]
    fn test_qr_capacity_table() {
        assert_eq!(qr::capacity(1), 2048);
        assert_eq!(qr::capacity(2), 1663);
        assert_eq!(qr::capacity(200), 1273);
    }
}
