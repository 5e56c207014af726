//! # Command Encoder
//!
//! Turns a logical print [`Operation`] into an [`EncodedJob`]: the printer
//! command bytes plus an estimate of how many lines of paper they use.
//!
//! ## Session Header vs. Job Payload
//!
//! Heat parameters, the sleep timer and default modes live in the *session
//! header* ([`Encoder::session_header`]), sent once after start-up, reconnect,
//! a heat change or an auto-sleep. Job payloads assume that state and leave
//! the printer in it, so any job can follow any other.
//!
//! ```text
//! header:  FF 00.. | ESC @ | ESC 7 dots time interval | ESC 8 sleep | ESC t 0 | ESC = 1, defaults
//! job:     style on | CP437 text LF ... | style reset
//! ```
//!
//! ## Example
//!
//! ```
//! use calor::encoder::{Encoder, Operation, TextParams};
//! use calor::printer::PrinterConfig;
//!
//! let encoder = Encoder::new(&PrinterConfig::default());
//! let job = encoder
//!     .encode(&Operation::Text(TextParams::new("Hello from the queue")))
//!     .unwrap();
//! assert_eq!(job.estimated_lines, 1);
//! ```

pub mod layout;
pub mod templates;

pub use templates::{ReceiptItem, ReceiptParams, ShoppingListParams};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::printer::{HeatSettings, PrinterConfig};
use crate::protocol::barcode::{self, BarcodeType, qr};
use crate::protocol::commands;
use crate::protocol::text::{self, Alignment, DEFAULT_LINE_HEIGHT, TextSize, TextStyle};
use crate::queue::JobKind;
use layout::Composer;

/// Idle time after which the printer sleeps when `auto_sleep` is on
pub const AUTO_SLEEP_SECONDS: u16 = 60;

/// Longest payload `GS k` accepts
const MAX_BARCODE_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum EncodingError {
    /// The operation needs a feature the configuration turned off
    #[error("{0} is disabled in the printer configuration")]
    UnsupportedFeature(&'static str),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Fixed-width layout does not fit on one line
    #[error("layout needs {needed} columns but the line has {width}")]
    LayoutOverflow { needed: usize, width: usize },
}

/// Output of the encoder, ready for the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedJob {
    pub kind: JobKind,
    pub payload: Vec<u8>,
    pub estimated_lines: u32,
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Styled, word-wrapped text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextParams {
    pub text: String,
    pub size: TextSize,
    pub align: Alignment,
    pub bold: bool,
    pub underline: bool,
    pub inverse: bool,
}

impl TextParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    fn style(&self) -> TextStyle {
        TextStyle::new()
            .alignment(self.align)
            .size(self.size)
            .bold(self.bold)
            .underline(self.underline)
            .inverse(self.inverse)
    }
}

fn default_rotation() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatedTextParams {
    pub text: String,
    /// Quarter turns clockwise, 1..=3
    #[serde(default = "default_rotation")]
    pub rotation: u8,
}

fn default_qr_size() -> u8 {
    3
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrParams {
    pub data: String,
    /// Module size step, clamped to 1..=4
    #[serde(default = "default_qr_size")]
    pub size: u8,
    /// 0 = L .. 3 = H, clamped
    #[serde(default)]
    pub error_correction: u8,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoColumnParams {
    pub left: String,
    pub right: String,
    /// Fill with dots instead of spaces
    #[serde(default = "default_true")]
    pub fill_dots: bool,
    #[serde(default)]
    pub size: TextSize,
}

fn default_barcode_height() -> u8 {
    80
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeParams {
    pub kind: BarcodeType,
    pub data: String,
    /// Bar height in dots
    #[serde(default = "default_barcode_height")]
    pub height: u8,
}

/// Two or three cells on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRowParams {
    pub col1: String,
    pub col2: String,
    #[serde(default)]
    pub col3: Option<String>,
}

/// Everything the encoder knows how to print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Text(TextParams),
    RotatedText(RotatedTextParams),
    QrCode(QrParams),
    TwoColumn(TwoColumnParams),
    Receipt(ReceiptParams),
    ShoppingList(ShoppingListParams),
    Barcode(BarcodeParams),
    Feed { lines: u8 },
    Separator,
    TableRow(TableRowParams),
    /// Pre-encoded bytes, passed through untouched
    Raw { bytes: Vec<u8>, estimated_lines: u32 },
}

impl Operation {
    pub fn kind(&self) -> JobKind {
        match self {
            Operation::Text(_) => JobKind::Text,
            Operation::RotatedText(_) => JobKind::RotatedText,
            Operation::QrCode(_) => JobKind::QrCode,
            Operation::TwoColumn(_) => JobKind::TwoColumn,
            Operation::Receipt(_) => JobKind::Receipt,
            Operation::ShoppingList(_) => JobKind::ShoppingList,
            Operation::Barcode(_) => JobKind::Barcode,
            Operation::Feed { .. } => JobKind::Feed,
            Operation::Separator => JobKind::Separator,
            Operation::TableRow(_) => JobKind::TableRow,
            Operation::Raw { .. } => JobKind::Raw,
        }
    }
}

// ============================================================================
// ENCODER
// ============================================================================

/// Stateless apart from configuration; cheap to clone.
#[derive(Debug, Clone)]
pub struct Encoder {
    chars_per_line: usize,
    enable_rotation: bool,
    enable_qr_codes: bool,
    auto_sleep: bool,
    heat: HeatSettings,
}

impl Encoder {
    /// `config` must already be validated.
    pub fn new(config: &PrinterConfig) -> Self {
        Self {
            chars_per_line: usize::from(config.chars_per_line),
            enable_rotation: config.enable_rotation,
            enable_qr_codes: config.enable_qr_codes,
            auto_sleep: config.auto_sleep,
            heat: config.heat(),
        }
    }

    pub fn chars_per_line(&self) -> usize {
        self.chars_per_line
    }

    pub fn heat(&self) -> HeatSettings {
        self.heat
    }

    /// Replace the heat parameters used by future session headers.
    pub fn set_heat(&mut self, heat: HeatSettings) {
        self.heat = heat;
    }

    /// Idle period after which the printer is asleep and needs a new header.
    pub fn sleep_timeout(&self) -> Option<Duration> {
        self.auto_sleep
            .then(|| Duration::from_secs(u64::from(AUTO_SLEEP_SECONDS)))
    }

    /// Wake, reset, heat configuration, sleep timer and print defaults.
    pub fn session_header(&self) -> Vec<u8> {
        let mut header = commands::wake();
        header.extend(commands::init());
        header.extend(commands::heat_config(
            self.heat.dots,
            self.heat.time,
            self.heat.interval,
        ));
        let sleep = if self.auto_sleep { AUTO_SLEEP_SECONDS } else { 0 };
        header.extend(commands::sleep_after(sleep));
        header.extend(text::code_page(0));
        header.extend(text::print_defaults());
        header
    }

    /// Encode one operation.
    ///
    /// ## Errors
    ///
    /// - [`EncodingError::UnsupportedFeature`] for rotation or QR codes when
    ///   disabled
    /// - [`EncodingError::InvalidParameter`] for empty content or values
    ///   outside what the printer accepts
    /// - [`EncodingError::LayoutOverflow`] when fixed columns do not fit
    pub fn encode(&self, operation: &Operation) -> Result<EncodedJob, EncodingError> {
        let (payload, estimated_lines) = match operation {
            Operation::Text(p) => self.text(p)?,
            Operation::RotatedText(p) => self.rotated_text(p)?,
            Operation::QrCode(p) => self.qr_code(p)?,
            Operation::TwoColumn(p) => self.two_column(p)?,
            Operation::Receipt(p) => templates::receipt(p, self.chars_per_line)?,
            Operation::ShoppingList(p) => templates::shopping_list(p, self.chars_per_line)?,
            Operation::Barcode(p) => self.barcode(p)?,
            Operation::Feed { lines } => {
                if *lines == 0 {
                    return Err(EncodingError::InvalidParameter(
                        "feed needs at least one line".into(),
                    ));
                }
                (commands::feed_lines(*lines), u32::from(*lines))
            }
            Operation::Separator => {
                let mut c = Composer::new();
                c.line(&layout::divider('=', self.chars_per_line));
                c.finish()
            }
            Operation::TableRow(p) => self.table_row(p)?,
            Operation::Raw {
                bytes,
                estimated_lines,
            } => {
                if bytes.is_empty() {
                    return Err(EncodingError::InvalidParameter("raw payload is empty".into()));
                }
                (bytes.clone(), *estimated_lines)
            }
        };

        let kind = operation.kind();
        debug!(?kind, bytes = payload.len(), estimated_lines, "encoded job");
        Ok(EncodedJob {
            kind,
            payload,
            estimated_lines,
        })
    }

    /// The "printer ready" banner printed once at start-up.
    pub fn startup_banner(&self) -> EncodedJob {
        let (payload, estimated_lines) = templates::startup_banner();
        EncodedJob {
            kind: JobKind::Text,
            payload,
            estimated_lines,
        }
    }

    fn text(&self, p: &TextParams) -> Result<(Vec<u8>, u32), EncodingError> {
        if p.text.trim().is_empty() {
            return Err(EncodingError::InvalidParameter("text is empty".into()));
        }
        let mut c = Composer::new();
        c.style(p.style());
        c.wrapped(&p.text, p.size.columns(self.chars_per_line));
        Ok(c.finish())
    }

    fn rotated_text(&self, p: &RotatedTextParams) -> Result<(Vec<u8>, u32), EncodingError> {
        if !self.enable_rotation {
            return Err(EncodingError::UnsupportedFeature("rotation"));
        }
        if !(1..=3).contains(&p.rotation) {
            return Err(EncodingError::InvalidParameter(format!(
                "rotation must be 1..=3 quarter turns, got {}",
                p.rotation
            )));
        }
        if p.text.trim().is_empty() {
            return Err(EncodingError::InvalidParameter("text is empty".into()));
        }
        let mut c = Composer::new();
        c.raw(&text::rotation(p.rotation), 0);
        c.style(TextStyle::new().alignment(Alignment::Center));
        c.wrapped(&p.text, self.chars_per_line);
        c.raw(&text::rotation(0), 0);
        c.feed(3);
        Ok(c.finish())
    }

    fn qr_code(&self, p: &QrParams) -> Result<(Vec<u8>, u32), EncodingError> {
        if !self.enable_qr_codes {
            return Err(EncodingError::UnsupportedFeature("QR codes"));
        }
        if p.data.is_empty() {
            return Err(EncodingError::InvalidParameter("QR data is empty".into()));
        }
        let level = p.error_correction.min(qr::MAX_ERROR_CORRECTION);
        let capacity = qr::capacity(level);
        if p.data.len() > capacity {
            return Err(EncodingError::InvalidParameter(format!(
                "QR data is {} bytes, error correction level {level} holds {capacity}",
                p.data.len()
            )));
        }
        let size = p.size.clamp(qr::MIN_SIZE, qr::MAX_SIZE);

        let mut c = Composer::new();
        c.style(TextStyle::new().alignment(Alignment::Center));
        c.raw(
            &qr::generate(p.data.as_bytes(), size, level),
            2 * u32::from(size) + 4,
        );
        c.feed(2);
        Ok(c.finish())
    }

    fn two_column(&self, p: &TwoColumnParams) -> Result<(Vec<u8>, u32), EncodingError> {
        let width = p.size.columns(self.chars_per_line);
        let pad = if p.fill_dots { '.' } else { ' ' };
        let line = layout::padded_line(&p.left, &p.right, width, pad)?;
        let mut c = Composer::new();
        c.style(TextStyle::new().size(p.size));
        c.line(&line);
        Ok(c.finish())
    }

    fn table_row(&self, p: &TableRowParams) -> Result<(Vec<u8>, u32), EncodingError> {
        let line = match &p.col3 {
            None => layout::padded_line(&p.col1, &p.col2, self.chars_per_line, ' ')?,
            Some(col3) => layout::three_columns([&p.col1, &p.col2, col3], self.chars_per_line),
        };
        let mut c = Composer::new();
        c.line(&line);
        Ok(c.finish())
    }

    fn barcode(&self, p: &BarcodeParams) -> Result<(Vec<u8>, u32), EncodingError> {
        if p.data.is_empty() || p.data.len() > MAX_BARCODE_LEN {
            return Err(EncodingError::InvalidParameter(format!(
                "barcode data must be 1..={MAX_BARCODE_LEN} bytes"
            )));
        }
        if !p.data.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
            return Err(EncodingError::InvalidParameter(
                "barcode data must be printable ASCII".into(),
            ));
        }
        let bar_lines = u32::from(p.height).div_ceil(u32::from(DEFAULT_LINE_HEIGHT));

        let mut c = Composer::new();
        c.style(TextStyle::new().alignment(Alignment::Center));
        c.raw(&barcode::height(p.height), 0);
        // bars plus the HRI line underneath
        c.raw(&barcode::barcode(p.kind, p.data.as_bytes()), bar_lines + 1);
        c.feed(1);
        Ok(c.finish())
    }
}

// ============================================================================
// TESTS
// ============================================================================
