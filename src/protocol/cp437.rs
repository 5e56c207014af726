//! # Code Page 437 Transcoding
//!
//! The printers this crate targets boot into character table 0 (PC437).
//! ASCII passes through; the upper half is looked up in [`UPPER_HALF`];
//! anything else becomes `?`.

use tracing::warn;

/// Unicode characters for CP437 bytes 0x80..=0xFF, in byte order.
const UPPER_HALF: [char; 128] = [
    // 0x80
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    // 0x90
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    // 0xA0
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    // 0xB0
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    // 0xC0
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    // 0xD0
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    // 0xE0
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    // 0xF0
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{00A0}',
];

/// Byte used for characters with no CP437 glyph
pub const REPLACEMENT: u8 = b'?';

/// Look up the CP437 byte for one character.
pub fn byte_for(ch: char) -> Option<u8> {
    if ch.is_ascii() {
        return Some(ch as u8);
    }
    UPPER_HALF
        .iter()
        .position(|&c| c == ch)
        .map(|i| 0x80 + i as u8)
}

/// Encode a string as CP437, replacing unmapped characters.
///
/// ```
/// use calor::protocol::cp437;
///
/// assert_eq!(cp437::encode("café"), b"caf\x82".to_vec());
/// assert_eq!(cp437::encode("☃"), b"?".to_vec());
/// ```
pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut unmapped = 0usize;
    for ch in s.chars() {
        match byte_for(ch) {
            Some(b) => out.push(b),
            None => {
                unmapped += 1;
                out.push(REPLACEMENT);
            }
        }
    }
    if unmapped > 0 {
        warn!(unmapped, "characters outside code page 437 replaced with '?'");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(encode("Hello, World!"), b"Hello, World!".to_vec());
    }

    #[test]
    fn test_table_positions() {
        assert_eq!(byte_for('Ç'), Some(0x80));
        assert_eq!(byte_for('ñ'), Some(0xA4));
        assert_eq!(byte_for('─'), Some(0xC4));
        assert_eq!(byte_for('°'), Some(0xF8));
        assert_eq!(byte_for('\u{00A0}'), Some(0xFF));
    }

    #[test]
    fn test_unmapped_char_becomes_question_mark() {
        assert_eq!(encode("a→b"), vec![b'a', b'?', b'b']);
    }

    #[test]
    fn test_one_byte_per_char() {
        let s = "Größe: ½ µm";
        assert_eq!(encode(s).len(), s.chars().count());
    }
}
