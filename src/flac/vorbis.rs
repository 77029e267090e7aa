// Vorbis comment decoding, shared by FLAC and OGG

use std::io::Read;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tracing::warn;

use super::picture::FlacPicture;
use crate::error::Result;
use crate::field_mapping::{FieldMappings, StandardField};
use crate::metadata::TagFields;
use crate::utils::io::{read_bytes_capped, read_le_u32};

/// Vorbis comment structure
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VorbisComment {
    pub vendor_string: String,
    pub comments: Vec<(String, String)>,
}

impl VorbisComment {
    /// Read a comment header: vendor string, then `count` length-prefixed
    /// `KEY=value` entries, all lengths little-endian
    pub fn read<R: Read + ?Sized>(reader: &mut R, cap: usize) -> Result<Self> {
        let vendor_length = read_le_u32(reader)? as usize;
        let vendor_string = String::from_utf8_lossy(&read_bytes_capped(reader, vendor_length, cap)?).into_owned();

        let count = read_le_u32(reader)?;
        let mut comments = Vec::new();
        for _ in 0..count {
            let length = read_le_u32(reader)? as usize;
            let entry = read_bytes_capped(reader, length, cap)?;
            let entry = String::from_utf8_lossy(&entry);
            match entry.split_once('=') {
                Some((field, value)) => comments.push((field.to_string(), value.to_string())),
                None => warn!(%entry, "vorbis comment without '='"),
            }
        }

        Ok(VorbisComment {
            vendor_string,
            comments,
        })
    }

    /// Get a comment value by field name
    pub fn get(&self, field: &str) -> Option<&str> {
        self.comments
            .iter()
            .find(|(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, v)| v.as_str())
    }

    /// Map the comments onto standard fields. Later duplicates overwrite
    /// earlier ones; raw keys are lowercased.
    pub fn into_fields(self) -> TagFields {
        let mut fields = TagFields::default();
        if !self.vendor_string.is_empty() {
            fields.raw.insert("vendor".to_string(), Value::from(self.vendor_string));
        }

        for (key, value) in self.comments {
            match FieldMappings::from_vorbis(&key) {
                Some(StandardField::Cover) => match decode_block_picture(&value) {
                    Some(picture) => {
                        fields.picture = Some(picture.into_picture());
                    }
                    None => warn!("undecodable METADATA_BLOCK_PICTURE"),
                },
                Some(field) => {
                    fields.set(field, &value);
                    fields.raw.insert(key.to_ascii_lowercase(), Value::from(value));
                }
                None => {
                    fields.raw.insert(key.to_ascii_lowercase(), Value::from(value));
                }
            }
        }
        fields
    }
}

/// METADATA_BLOCK_PICTURE holds a base64 FLAC picture block
fn decode_block_picture(value: &str) -> Option<FlacPicture> {
    let bytes = STANDARD.decode(value.trim()).ok()?;
    FlacPicture::read(&mut bytes.as_slice(), bytes.len()).ok()
}

#[cfg(test)]
pub(crate) fn comment_bytes(vendor: &str, entries: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    out.extend_from_slice(vendor.as_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        out.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        out.extend_from_slice(entry.as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flac::picture::picture_block;

    #[test]
    fn test_read_comment() {
        let data = comment_bytes(
            "reference libFLAC 1.4.2",
            &["TITLE=Song", "artist=Someone", "TRACKNUMBER=3/12", "DATE=2001-02-03", "REPLAYGAIN_TRACK_GAIN=-6.5 dB"],
        );
        let comment = VorbisComment::read(&mut data.as_slice(), 1024).unwrap();
        assert_eq!(comment.vendor_string, "reference libFLAC 1.4.2");
        assert_eq!(comment.get("title"), Some("Song"));

        let fields = comment.into_fields();
        assert_eq!(fields.title, "Song");
        assert_eq!(fields.artist, "Someone");
        assert_eq!(fields.track, (3, 12));
        assert_eq!(fields.year, 2001);
        assert_eq!(fields.raw["replaygain_track_gain"], "-6.5 dB");
    }

    #[test]
    fn test_truncated_comment_is_eof() {
        let mut data = comment_bytes("v", &["TITLE=Song"]);
        data.truncate(data.len() - 2);
        let err = VorbisComment::read(&mut data.as_slice(), 1024).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn test_block_picture() {
        let block = picture_block(3, "image/png", b"\x89PNG");
        let entry = format!("METADATA_BLOCK_PICTURE={}", STANDARD.encode(&block));
        let data = comment_bytes("v", &[entry.as_str()]);
        let fields = VorbisComment::read(&mut data.as_slice(), 1024).unwrap().into_fields();
        let picture = fields.picture.unwrap();
        assert_eq!(picture.mime_type, "image/png");
        assert_eq!(picture.data, b"\x89PNG");
    }
}
