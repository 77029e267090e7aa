// DSF (DSD stream file) support
//
// Layout, all integers little-endian:
//   "DSD " chunk: id (4), chunk size (8), file size (8), metadata pointer (8)
//   "fmt " chunk: id (4), size (8), version (4), format id (4),
//                 channel type (4), channel count (4), sample rate (4),
//                 bits per sample (4), sample count (8), ...
// The metadata pointer is the absolute offset of an ID3v2 tag, 0 if none.

use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::decoder::TagDecoder;
use crate::error::{Error, Result};
use crate::id3::read_id3v2_region;
use crate::identify::{ContainerType, Id3v2Version, TagFormat};
use crate::metadata::{Metadata, Raw, TagFields};
use crate::utils::io::{read_array, read_le_u32, read_le_u64, skip};

pub const DSF_SIGNATURE: &[u8; 4] = b"DSD ";

/// Metadata read from a DSF file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DsfMetadata {
    pub channels: u32,
    pub sample_rate: u32,
    pub bits_per_sample: u32,
    pub sample_count: u64,
    pub id3_version: Option<Id3v2Version>,
    pub tags: Option<TagFields>,
    pub duration: Duration,
}

impl Metadata for DsfMetadata {
    fn format(&self) -> TagFormat {
        self.id3_version.map_or(TagFormat::Unknown, TagFormat::Id3v2)
    }

    fn file_type(&self) -> ContainerType {
        ContainerType::Dsf
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn technical(&self) -> Raw {
        let mut raw = Raw::new();
        raw.insert("channels".to_string(), Value::from(self.channels));
        raw.insert("sample_rate".to_string(), Value::from(self.sample_rate));
        raw.insert("bits_per_sample".to_string(), Value::from(self.bits_per_sample));
        raw.insert("sample_count".to_string(), Value::from(self.sample_count));
        raw
    }

    fn tags(&self) -> Option<&TagFields> {
        self.tags.as_ref()
    }
}

/// Read a DSF file positioned at its "DSD " signature
pub fn read_dsf<R, D>(reader: &mut R, decoder: &D) -> Result<DsfMetadata>
where
    R: Read + Seek + ?Sized,
    D: TagDecoder + ?Sized,
{
    let signature: [u8; 4] = read_array(reader)?;
    if &signature != DSF_SIGNATURE {
        return Err(Error::mismatch("DSD ", &signature));
    }

    // chunk size and file size
    skip(reader, 16)?;
    let tag_offset = read_le_u64(reader)?;

    // fmt chunk header, format version and id, channel type
    skip(reader, 24)?;
    let channels = read_le_u32(reader)?;
    let sample_rate = read_le_u32(reader)?;
    let bits_per_sample = read_le_u32(reader)?;
    let sample_count = read_le_u64(reader)?;

    // whole seconds, truncated
    let duration = match sample_count.checked_div(sample_rate as u64) {
        Some(seconds) => Duration::from_secs(seconds),
        None => Duration::ZERO,
    };

    let mut m = DsfMetadata {
        channels,
        sample_rate,
        bits_per_sample,
        sample_count,
        duration,
        ..DsfMetadata::default()
    };

    if tag_offset == 0 {
        debug!(?duration, "read DSF without ID3 tag");
        return Ok(m);
    }
    reader.seek(SeekFrom::Start(tag_offset))?;
    let (header, tags) = read_id3v2_region(reader, decoder)?;
    m.id3_version = Some(header.version);
    m.tags = Some(tags);

    debug!(?duration, tag_offset, "read DSF");
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::StandardTagDecoder;
    use std::io::Cursor;

    fn dsf(sample_rate: u32, sample_count: u64, tag: Option<&[u8]>) -> Vec<u8> {
        let mut data = DSF_SIGNATURE.to_vec();
        data.extend_from_slice(&28u64.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());

        data.extend_from_slice(b"fmt ");
        data.extend_from_slice(&52u64.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&sample_rate.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&sample_count.to_le_bytes());
        data.extend_from_slice(&4096u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());

        data.extend_from_slice(b"data");
        data.extend_from_slice(&(12u64 + 64).to_le_bytes());
        data.extend_from_slice(&[0x69; 64]);

        if let Some(tag) = tag {
            let offset = data.len() as u64;
            data[20..28].copy_from_slice(&offset.to_le_bytes());
            data.extend_from_slice(tag);
        }
        data
    }

    #[test]
    fn test_read_dsf_with_tag() {
        let mut tag = b"ID3\x03\x00\x00\x00\x00\x00\x11".to_vec();
        tag.extend_from_slice(b"TPE1\x00\x00\x00\x07\x00\x00\x00Artist");
        let data = dsf(2_822_400, 2_822_400 * 7 + 100, Some(&tag));

        let m = read_dsf(&mut Cursor::new(data), &StandardTagDecoder::default()).unwrap();
        assert_eq!(m.file_type(), ContainerType::Dsf);
        assert_eq!(m.format(), TagFormat::Id3v2(Id3v2Version::V3));
        assert_eq!(m.artist(), "Artist");
        assert_eq!(m.duration(), Duration::from_secs(7));
        assert_eq!(m.raw()["channels"], 2);
        assert_eq!(m.raw()["sample_rate"], 2_822_400);
    }

    #[test]
    fn test_read_dsf_without_tag() {
        let m = read_dsf(&mut Cursor::new(dsf(5_644_800, 5_644_800, None)), &StandardTagDecoder::default()).unwrap();
        assert_eq!(m.format(), TagFormat::Unknown);
        assert!(m.tags.is_none());
        assert_eq!(m.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_sample_rate_and_bad_magic() {
        let m = read_dsf(&mut Cursor::new(dsf(0, 1000, None)), &StandardTagDecoder::default()).unwrap();
        assert_eq!(m.duration(), Duration::ZERO);

        let mut data = dsf(44100, 44100, None);
        data[0] = b'X';
        let err = read_dsf(&mut Cursor::new(data), &StandardTagDecoder::default()).unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { .. }));
    }
}
