//! # Line Layout
//!
//! Character-grid helpers: word wrap, padded columns and dividers, plus the
//! [`Composer`] that accumulates a payload and its paper estimate.
//!
//! All widths are in characters. Text is transcoded to code page 437, one
//! byte per character, so a character count is also a column count.

use super::EncodingError;
use crate::protocol::commands::{LF, feed_lines};
use crate::protocol::cp437;
use crate::protocol::text::{TextSize, TextStyle};

// ============================================================================
// WORD WRAP
// ============================================================================

/// Wrap `text` to lines of at most `width` characters.
///
/// Breaks on whitespace, keeps explicit newlines, and hard-breaks words longer
/// than the line on character boundaries.
///
/// ```
/// use calor::encoder::layout::wrap;
///
/// assert_eq!(wrap("the quick brown fox", 10), vec!["the quick", "brown fox"]);
/// assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
/// ```
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.trim_end_matches('\n').split('\n') {
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in paragraph.split_whitespace() {
            let mut chars: Vec<char> = word.chars().collect();

            // Hard-break a word that can never fit
            while chars.len() > width {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = chars.split_off(width);
                lines.push(chars.into_iter().collect());
                chars = rest;
            }

            let len = chars.len();
            if len == 0 {
                continue;
            }
            if current_len == 0 {
                current.extend(chars);
                current_len = len;
            } else if current_len + 1 + len <= width {
                current.push(' ');
                current.extend(chars);
                current_len += 1 + len;
            } else {
                lines.push(std::mem::take(&mut current));
                current.extend(chars);
                current_len = len;
            }
        }
        lines.push(current);
    }
    lines
}

// ============================================================================
// COLUMNS
// ============================================================================

/// Left text, `pad` fill, right text: exactly `width` characters.
///
/// ```
/// use calor::encoder::layout::padded_line;
///
/// assert_eq!(padded_line("Tea", "2.50", 12, '.').unwrap(), "Tea.....2.50");
/// assert!(padded_line("a long item", "9.99", 12, '.').is_err());
/// ```
pub fn padded_line(left: &str, right: &str, width: usize, pad: char) -> Result<String, EncodingError> {
    let needed = left.chars().count() + right.chars().count();
    if needed > width {
        return Err(EncodingError::LayoutOverflow { needed, width });
    }
    let mut line = String::with_capacity(width);
    line.push_str(left);
    line.extend(std::iter::repeat_n(pad, width - needed));
    line.push_str(right);
    Ok(line)
}

/// Three fixed-width columns separated by single spaces; cells are truncated.
///
/// ```
/// use calor::encoder::layout::three_columns;
///
/// assert_eq!(three_columns(["Qty", "Item", "Price"], 20), "Qty    Item   Price ");
/// ```
pub fn three_columns(cells: [&str; 3], width: usize) -> String {
    let cell = width.saturating_sub(2) / 3;
    cells
        .iter()
        .map(|c| {
            let mut s: String = c.chars().take(cell).collect();
            let len = s.chars().count();
            s.extend(std::iter::repeat_n(' ', cell - len));
            s
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A full-width run of one character.
pub fn divider(ch: char, width: usize) -> String {
    std::iter::repeat_n(ch, width).collect()
}

// ============================================================================
// COMPOSER
// ============================================================================

/// Accumulates command bytes and counts the paper they will use.
///
/// Paper is counted in half lines so medium text (1.5 lines per line) sums
/// exactly; [`Composer::estimated_lines`] rounds up.
#[derive(Debug, Default)]
pub struct Composer {
    payload: Vec<u8>,
    half_lines: u32,
    size: TextSize,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch style; subsequent lines are counted at the style's size.
    pub fn style(&mut self, style: TextStyle) -> &mut Self {
        self.payload.extend(style.to_commands());
        self.size = style.size;
        self
    }

    pub fn reset(&mut self) -> &mut Self {
        self.payload.extend(TextStyle::reset());
        self.size = TextSize::Small;
        self
    }

    /// One printed line, terminated by LF.
    pub fn line(&mut self, text: &str) -> &mut Self {
        self.payload.extend(cp437::encode(text));
        self.payload.push(LF);
        self.half_lines += self.size.paper_lines(2);
        self
    }

    /// Wrap `text` at `width` and print every resulting line.
    pub fn wrapped(&mut self, text: &str, width: usize) -> &mut Self {
        for line in wrap(text, width) {
            self.line(&line);
        }
        self
    }

    pub fn feed(&mut self, lines: u8) -> &mut Self {
        if lines > 0 {
            self.payload.extend(feed_lines(lines));
            self.half_lines += 2 * u32::from(lines);
        }
        self
    }

    /// Commands with a caller-supplied paper cost.
    pub fn raw(&mut self, bytes: &[u8], lines: u32) -> &mut Self {
        self.payload.extend_from_slice(bytes);
        self.half_lines += 2 * lines;
        self
    }

    pub fn estimated_lines(&self) -> u32 {
        self.half_lines.div_ceil(2)
    }

    /// Restore default style and hand back the bytes and line estimate.
    pub fn finish(mut self) -> (Vec<u8>, u32) {
        self.reset();
        let lines = self.estimated_lines();
        (self.payload, lines)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wrap_fits_on_one_line() {
        assert_eq!(wrap("hello world", 32), vec!["hello world"]);
    }

    #[test]
    fn test_wrap_keeps_newlines() {
        assert_eq!(wrap("one\ntwo\n", 32), vec!["one", "two"]);
        assert_eq!(wrap("a\n\nb", 32), vec!["a", "", "b"]);
    }

    #[test]
    fn test_wrap_exact_width() {
        assert_eq!(wrap("abcd efgh", 4), vec!["abcd", "efgh"]);
        assert_eq!(wrap("ab cd", 5), vec!["ab cd"]);
    }

    #[test]
    fn test_wrap_long_word_mid_line() {
        assert_eq!(wrap("hi abcdefghij", 4), vec!["hi", "abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_counts_chars_not_bytes() {
        let lines = wrap("ñandú ñandú", 5);
        assert_eq!(lines, vec!["ñandú", "ñandú"]);
    }

    #[test]
    fn test_wrap_is_deterministic() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit";
        assert_eq!(wrap(text, 16), wrap(text, 16));
        assert!(wrap(text, 16).iter().all(|l| l.chars().count() <= 16));
    }

    #[test]
    fn test_padded_line_zero_padding() {
        assert_eq!(padded_line("ab", "cd", 4, '.').unwrap(), "abcd");
    }

    #[test]
    fn test_padded_line_overflow() {
        let err = padded_line("abc", "de", 4, ' ').unwrap_err();
        assert!(matches!(err, EncodingError::LayoutOverflow { needed: 5, width: 4 }));
    }

    #[test]
    fn test_three_columns_truncate() {
        assert_eq!(three_columns(["abcdefghijkl", "b", "c"], 32).chars().count(), 32);
        assert!(three_columns(["abcdefghijkl", "b", "c"], 32).starts_with("abcdefghij "));
    }

    #[test]
    fn test_composer_counts_sizes() {
        let mut c = Composer::new();
        c.style(TextStyle::new().size(TextSize::Medium));
        c.line("a");
        c.reset();
        c.line("b");
        // 1.5 + 1 rounds up to 3
        assert_eq!(c.estimated_lines(), 3);
    }

    #[test]
    fn test_composer_feed_and_finish() {
        let mut c = Composer::new();
        c.line("x").feed(2);
        let (payload, lines) = c.finish();
        assert_eq!(lines, 3);
        assert_eq!(&payload[..2], b"x\n");
        assert!(payload.ends_with(&TextStyle::reset()));
    }
}
