//! # Text Styling Commands
//!
//! Text formatting commands for ESC/POS serial thermal printers.
//!
//! ## Text Styling Overview
//!
//! | Style | Command | Effect |
//! |-------|---------|--------|
//! | Size | ESC ! n | Small / medium (double height) / large (double both) |
//! | Bold | ESC E n | Emphasized text |
//! | Underline | ESC - n | Underlined text |
//! | Inverse | GS B n | White on black |
//! | Rotation | ESC V n | 90° steps |
//!
//! ## Column Widths
//!
//! The printer fits `chars_per_line` small characters on a line. Larger sizes
//! use fewer columns; the ratios below match what the printer firmware lays out
//! on 58mm paper (32 / 24 / 16 columns).

use serde::{Deserialize, Serialize};

use super::commands::{ESC, GS, set_online};

// ============================================================================
// TEXT ALIGNMENT
// ============================================================================

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    #[serde(alias = "L")]
    Left = 0,
    #[serde(alias = "C")]
    Center = 1,
    #[serde(alias = "R")]
    Right = 2,
}

/// # Set Justification (ESC a n)
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC a n |
/// | Hex     | 1B 61 n |
///
/// ```
/// use calor::protocol::text::{align, Alignment};
///
/// assert_eq!(align(Alignment::Center), vec![0x1B, 0x61, 0x01]);
/// ```
pub fn align(alignment: Alignment) -> Vec<u8> {
    vec![ESC, b'a', alignment as u8]
}

// ============================================================================
// CHARACTER SIZE
// ============================================================================

/// Character size presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSize {
    /// Normal glyphs
    #[default]
    #[serde(alias = "S")]
    Small,
    /// Double height
    #[serde(alias = "M")]
    Medium,
    /// Double height and width
    #[serde(alias = "L")]
    Large,
}

impl TextSize {
    /// `ESC !` print-mode bits for this size.
    fn mode_bits(self) -> u8 {
        match self {
            TextSize::Small => 0x00,
            TextSize::Medium => 0x10,
            TextSize::Large => 0x30,
        }
    }

    /// Columns available at this size, given the small-glyph line width.
    ///
    /// ```
    /// use calor::protocol::text::TextSize;
    ///
    /// assert_eq!(TextSize::Small.columns(32), 32);
    /// assert_eq!(TextSize::Medium.columns(32), 24);
    /// assert_eq!(TextSize::Large.columns(32), 16);
    /// ```
    pub fn columns(self, chars_per_line: usize) -> usize {
        match self {
            TextSize::Small => chars_per_line,
            TextSize::Medium => chars_per_line * 3 / 4,
            TextSize::Large => chars_per_line / 2,
        }
    }

    /// Paper lines consumed by `lines` printed lines at this size.
    pub fn paper_lines(self, lines: u32) -> u32 {
        match self {
            TextSize::Small => lines,
            TextSize::Medium => (lines * 3).div_ceil(2),
            TextSize::Large => lines * 2,
        }
    }
}

/// # Select Print Mode (ESC ! n)
#[inline]
pub fn size(size: TextSize) -> Vec<u8> {
    vec![ESC, b'!', size.mode_bits()]
}

// ============================================================================
// EMPHASIS
// ============================================================================

/// # Bold (ESC E n)
#[inline]
pub fn bold(enabled: bool) -> Vec<u8> {
    vec![ESC, b'E', u8::from(enabled)]
}

/// # Underline (ESC - n)
#[inline]
pub fn underline(enabled: bool) -> Vec<u8> {
    vec![ESC, b'-', u8::from(enabled)]
}

/// # Inverse / Reverse Printing (GS B n)
#[inline]
pub fn inverse(enabled: bool) -> Vec<u8> {
    vec![GS, b'B', u8::from(enabled)]
}

// ============================================================================
// LINE AND PAGE LAYOUT
// ============================================================================

/// Smallest line spacing the printer accepts, in dot rows
pub const MIN_LINE_HEIGHT: u8 = 24;

/// Default line spacing, in dot rows
pub const DEFAULT_LINE_HEIGHT: u8 = 32;

/// # Set Line Spacing (ESC 3 n)
///
/// Values below [`MIN_LINE_HEIGHT`] are raised to it.
#[inline]
pub fn line_height(dots: u8) -> Vec<u8> {
    vec![ESC, b'3', dots.max(MIN_LINE_HEIGHT)]
}

/// # Rotate 90° Clockwise (ESC V n)
///
/// `quarter_turns` is taken modulo 4; `0` cancels rotation.
#[inline]
pub fn rotation(quarter_turns: u8) -> Vec<u8> {
    vec![ESC, b'V', quarter_turns & 0x03]
}

/// # Select Character Code Table (ESC t n)
///
/// Table 0 is PC437 on every printer this crate targets.
#[inline]
pub fn code_page(n: u8) -> Vec<u8> {
    vec![ESC, b't', n]
}

// ============================================================================
// STYLE BUNDLES
// ============================================================================

/// Text styling for one run of text.
///
/// ```
/// use calor::protocol::text::{TextStyle, Alignment, TextSize};
///
/// let style = TextStyle::new()
///     .alignment(Alignment::Center)
///     .size(TextSize::Medium)
///     .bold(true);
///
/// let commands = style.to_commands();
/// assert!(commands.windows(3).any(|w| w == [0x1B, 0x45, 0x01]));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStyle {
    pub alignment: Alignment,
    pub size: TextSize,
    pub bold: bool,
    pub underline: bool,
    pub inverse: bool,
}

impl TextStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alignment(mut self, a: Alignment) -> Self {
        self.alignment = a;
        self
    }

    pub fn size(mut self, s: TextSize) -> Self {
        self.size = s;
        self
    }

    pub fn bold(mut self, enabled: bool) -> Self {
        self.bold = enabled;
        self
    }

    pub fn underline(mut self, enabled: bool) -> Self {
        self.underline = enabled;
        self
    }

    pub fn inverse(mut self, enabled: bool) -> Self {
        self.inverse = enabled;
        self
    }

    /// Commands that switch the printer into this style.
    ///
    /// Only departures from the default style are emitted, since every job
    /// ends with [`TextStyle::reset`].
    pub fn to_commands(&self) -> Vec<u8> {
        let mut cmds = Vec::new();
        if self.size != TextSize::Small {
            cmds.extend(size(self.size));
        }
        if self.alignment != Alignment::Left {
            cmds.extend(align(self.alignment));
        }
        if self.bold {
            cmds.extend(bold(true));
        }
        if self.underline {
            cmds.extend(underline(true));
        }
        if self.inverse {
            cmds.extend(inverse(true));
        }
        cmds
    }

    /// Return every style to its default.
    pub fn reset() -> Vec<u8> {
        let mut cmds = Vec::new();
        cmds.extend(align(Alignment::Left));
        cmds.extend(inverse(false));
        cmds.extend(bold(false));
        cmds.extend(underline(false));
        cmds.extend(size(TextSize::Small));
        cmds
    }
}

/// Online, default style and default line spacing.
///
/// Sent in the session header right after the heat configuration.
pub fn print_defaults() -> Vec<u8> {
    let mut cmds = set_online(true);
    cmds.extend(TextStyle::reset());
    cmds.extend(line_height(DEFAULT_LINE_HEIGHT));
    cmds
}

// ============================================================================
// TESTS
// ============================================================================
