//! # ESC/POS Protocol Implementation
//!
//! Low-level command builders for serial thermal printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: session, status and feed commands
//! - [`text`]: alignment, size and emphasis
//! - [`barcode`]: 1D barcodes and native QR codes
//! - [`cp437`]: text transcoding
//!
//! ## Usage Example
//!
//! ```
//! use calor::protocol::{commands, text};
//!
//! let mut data = Vec::new();
//! data.extend(commands::init());
//! data.extend(text::align(text::Alignment::Center));
//! data.extend(text::bold(true));
//! data.extend(b"RECEIPT\n");
//! data.extend(text::TextStyle::reset());
//! data.extend(commands::feed_lines(3));
//! ```

pub mod barcode;
pub mod commands;
pub mod cp437;
pub mod text;
