// ID3v1 tag implementation

use serde_json::Value;

use crate::error::{Error, Result};
use crate::field_mapping::ValueConverter;
use crate::metadata::TagFields;
use crate::utils::encoding::{decode_text, TextEncoding};

/// ID3v1 tag structure
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Id3v1Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub comment: String,
    pub track: Option<u8>,
    pub genre: u8,
}

impl Id3v1Tag {
    pub const TAG_SIZE: usize = 128;
    const TAG_ID: [u8; 3] = [b'T', b'A', b'G'];

    /// Parse an ID3v1 tag from its 128-byte block
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() != Self::TAG_SIZE {
            return Err(Error::InvalidArgument(format!(
                "ID3v1 block is {} bytes, expected {}",
                buffer.len(),
                Self::TAG_SIZE
            )));
        }
        if buffer[0..3] != Self::TAG_ID {
            return Err(Error::mismatch("TAG", &buffer[0..3]));
        }

        // ID3v1.1 stores the track number in the last two comment bytes
        let (comment, track) = if buffer[125] == 0 && buffer[126] != 0 {
            (Self::parse_string(&buffer[97..125]), Some(buffer[126]))
        } else {
            (Self::parse_string(&buffer[97..127]), None)
        };

        Ok(Id3v1Tag {
            title: Self::parse_string(&buffer[3..33]),
            artist: Self::parse_string(&buffer[33..63]),
            album: Self::parse_string(&buffer[63..93]),
            year: Self::parse_string(&buffer[93..97]),
            comment,
            track,
            genre: buffer[127],
        })
    }

    /// Parse null-terminated string
    fn parse_string(bytes: &[u8]) -> String {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        decode_text(&bytes[..end], TextEncoding::Iso8859_1).trim().to_string()
    }

    pub fn into_fields(self) -> TagFields {
        let mut fields = TagFields {
            title: self.title,
            artist: self.artist,
            album: self.album,
            comment: self.comment,
            year: ValueConverter::parse_year(&self.year).unwrap_or(0),
            genre: ValueConverter::id3v1_genre(self.genre)
                .unwrap_or_default()
                .to_string(),
            ..TagFields::default()
        };
        if let Some(track) = self.track {
            fields.track = (track as u32, 0);
        }
        fields.raw.insert("genre_index".to_string(), Value::from(self.genre));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(title: &str, track: Option<u8>, genre: u8) -> Vec<u8> {
        let mut buf = vec![0u8; 128];
        buf[0..3].copy_from_slice(b"TAG");
        buf[3..3 + title.len()].copy_from_slice(title.as_bytes());
        buf[33..39].copy_from_slice(b"Artist");
        buf[93..97].copy_from_slice(b"1987");
        buf[97..104].copy_from_slice(b"Comment");
        if let Some(track) = track {
            buf[126] = track;
        }
        buf[127] = genre;
        buf
    }

    #[test]
    fn test_parse_v11() {
        let tag = Id3v1Tag::parse(&block("Title", Some(7), 17)).unwrap();
        assert_eq!(tag.title, "Title");
        assert_eq!(tag.artist, "Artist");
        assert_eq!(tag.comment, "Comment");
        assert_eq!(tag.track, Some(7));

        let fields = tag.into_fields();
        assert_eq!(fields.year, 1987);
        assert_eq!(fields.track, (7, 0));
        assert_eq!(fields.genre, "Rock");
    }

    #[test]
    fn test_parse_rejects_bad_block() {
        assert!(matches!(Id3v1Tag::parse(&[0u8; 10]), Err(Error::InvalidArgument(_))));
        assert!(matches!(Id3v1Tag::parse(&[0u8; 128]), Err(Error::FormatMismatch { .. })));
    }
}
