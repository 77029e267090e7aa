// Text encodings used by ID3 frames

use encoding_rs::{UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};

/// ID3v2 text encoding byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Iso8859_1 = 0,
    Utf16 = 1,
    Utf16BE = 2,
    Utf8 = 3,
}

impl TextEncoding {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => TextEncoding::Utf16,
            2 => TextEncoding::Utf16BE,
            3 => TextEncoding::Utf8,
            _ => TextEncoding::Iso8859_1,
        }
    }

    /// Width of the string terminator for this encoding
    fn terminator_len(self) -> usize {
        match self {
            TextEncoding::Utf16 | TextEncoding::Utf16BE => 2,
            _ => 1,
        }
    }
}

/// Decode text with specified encoding, dropping trailing terminators
pub fn decode_text(data: &[u8], encoding: TextEncoding) -> String {
    let text = match encoding {
        TextEncoding::Iso8859_1 => WINDOWS_1252.decode(data).0,
        TextEncoding::Utf16 => {
            // BOM decides the byte order; little-endian without one
            if data.len() >= 2 && data[0..2] == [0xFE, 0xFF] {
                UTF_16BE.decode_without_bom_handling(&data[2..]).0
            } else if data.len() >= 2 && data[0..2] == [0xFF, 0xFE] {
                UTF_16LE.decode_without_bom_handling(&data[2..]).0
            } else {
                UTF_16LE.decode_without_bom_handling(data).0
            }
        }
        TextEncoding::Utf16BE => UTF_16BE.decode_without_bom_handling(data).0,
        TextEncoding::Utf8 => UTF_8.decode(data).0,
    };
    text.trim_end_matches('\0').to_string()
}

/// Split `data` at the first terminator for `encoding`.
///
/// Returns the text before the terminator and the bytes after it. Without a
/// terminator everything is text and the remainder is empty.
pub fn split_terminated(data: &[u8], encoding: TextEncoding) -> (&[u8], &[u8]) {
    let width = encoding.terminator_len();
    let mut i = 0;
    while i + width <= data.len() {
        if data[i..i + width].iter().all(|&b| b == 0) {
            return (&data[..i], &data[i + width..]);
        }
        i += width;
    }
    (data, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_text(b"Caf\xe9\0", TextEncoding::Iso8859_1), "Café");
    }

    #[test]
    fn test_decode_utf16_bom() {
        let le = [0xFF, 0xFE, b'h', 0, b'i', 0];
        let be = [0xFE, 0xFF, 0, b'h', 0, b'i'];
        assert_eq!(decode_text(&le, TextEncoding::Utf16), "hi");
        assert_eq!(decode_text(&be, TextEncoding::Utf16), "hi");
        assert_eq!(decode_text(&[0, b'o', 0, b'k'], TextEncoding::Utf16BE), "ok");
    }

    #[test]
    fn test_split_terminated() {
        let (text, rest) = split_terminated(b"image/png\0\x03rest", TextEncoding::Iso8859_1);
        assert_eq!(text, b"image/png");
        assert_eq!(rest, b"\x03rest");

        // UTF-16 terminators are aligned to code units
        let data = [b'a', 0, 0, b'b', 0, 0, 0xAA];
        let (text, rest) = split_terminated(&data, TextEncoding::Utf16);
        assert_eq!(text, &[b'a', 0, 0, b'b']);
        assert_eq!(rest, &[0xAA]);

        let (text, rest) = split_terminated(b"none", TextEncoding::Utf8);
        assert_eq!(text, b"none");
        assert!(rest.is_empty());
    }
}
