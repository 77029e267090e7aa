// MP3 support
//
// Tags come from a leading ID3v2 tag or a trailing ID3v1 block; the duration
// is estimated from the first MPEG frame header after the tag.

pub mod frame;

use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

pub use frame::{compute_duration, FrameHeader};

use crate::decoder::TagDecoder;
use crate::error::Result;
use crate::id3::{read_id3v1_region, read_id3v2_region};
use crate::identify::{ContainerType, Id3v2Version, TagFormat, ID3V1_TAG_SIZE};
use crate::metadata::{Metadata, Raw, TagFields};
use crate::utils::io::read_array;

/// Metadata read from an MP3 file
#[derive(Debug, Clone, PartialEq)]
pub struct Mp3Metadata {
    /// `None` for files tagged with ID3v1 only
    pub id3_version: Option<Id3v2Version>,
    pub tags: TagFields,
    pub frame: FrameHeader,
    pub duration: Duration,
}

impl Metadata for Mp3Metadata {
    fn format(&self) -> TagFormat {
        self.id3_version.map_or(TagFormat::Id3v1, TagFormat::Id3v2)
    }

    fn file_type(&self) -> ContainerType {
        ContainerType::Mp3
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn technical(&self) -> Raw {
        let mut raw = Raw::new();
        raw.insert("mpeg_version".to_string(), Value::from(self.frame.version_name()));
        raw.insert("layer".to_string(), Value::from(self.frame.layer_number()));
        raw.insert("bitrate".to_string(), Value::from(self.frame.bitrate_kbps));
        raw.insert("sample_rate".to_string(), Value::from(self.frame.sample_rate));
        raw
    }

    fn tags(&self) -> Option<&TagFields> {
        Some(&self.tags)
    }
}

/// Read the 4-byte header of the frame at the cursor
fn read_frame_header<R: Read + ?Sized>(reader: &mut R) -> Result<FrameHeader> {
    let header: [u8; 4] = read_array(reader)?;
    // Only the fields are decoded; a missing sync word is tolerated
    if header[0] != 0xff || header[1] & 0xe0 != 0xe0 {
        warn!(header = ?header, "no MPEG sync word where the first frame should start");
    }
    FrameHeader::parse(&header)
}

/// MP3 with a leading ID3v2 tag. The cursor must be at the tag; `size` is
/// the total stream length.
pub fn read_id3v2_mp3<R, D>(reader: &mut R, decoder: &D, size: u64) -> Result<Mp3Metadata>
where
    R: Read + Seek + ?Sized,
    D: TagDecoder + ?Sized,
{
    let (header, tags) = read_id3v2_region(reader, decoder)?;
    let tag_end = reader.stream_position()?;

    let frame = read_frame_header(reader)?;
    let duration = frame.duration(size.saturating_sub(tag_end));
    debug!(?duration, bitrate = frame.bitrate_kbps, "read MP3 (ID3v2)");

    Ok(Mp3Metadata {
        id3_version: Some(header.version),
        tags,
        frame,
        duration,
    })
}

/// MP3 with a trailing ID3v1 tag; `size` is the total stream length
pub fn read_id3v1_mp3<R, D>(reader: &mut R, decoder: &D, size: u64) -> Result<Mp3Metadata>
where
    R: Read + Seek + ?Sized,
    D: TagDecoder + ?Sized,
{
    let tags = read_id3v1_region(reader, decoder)?;

    reader.seek(SeekFrom::Start(0))?;
    let frame = read_frame_header(reader)?;
    let duration = frame.duration(size.saturating_sub(ID3V1_TAG_SIZE));
    debug!(?duration, bitrate = frame.bitrate_kbps, "read MP3 (ID3v1)");

    Ok(Mp3Metadata {
        id3_version: None,
        tags,
        frame,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::StandardTagDecoder;
    use crate::error::Error;
    use std::io::Cursor;

    const FRAME: [u8; 4] = [0xff, 0xfa, 0x90, 0x64];
    const FRAME_SIZE: usize = 421;

    fn frames(count: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(count * FRAME_SIZE);
        for _ in 0..count {
            data.extend_from_slice(&FRAME);
            data.resize(data.len() + FRAME_SIZE - 4, 0);
        }
        data
    }

    fn id3v1_block(title: &str) -> Vec<u8> {
        let mut block = vec![0u8; 128];
        block[0..3].copy_from_slice(b"TAG");
        block[3..3 + title.len()].copy_from_slice(title.as_bytes());
        block[127] = 17;
        block
    }

    #[test]
    fn test_id3v2_mp3() {
        // v2.4 tag with footer: 10 + 16 + 10 bytes before the audio
        let mut data = b"ID3\x04\x00\x10\x00\x00\x00\x10".to_vec();
        data.extend_from_slice(b"TIT2\x00\x00\x00\x03\x00\x00\x00Hi");
        data.resize(26, 0);
        data.extend_from_slice(b"3DI\x04\x00\x10\x00\x00\x00\x10");
        data.extend(frames(100));
        let size = data.len() as u64;

        let m = read_id3v2_mp3(&mut Cursor::new(data), &StandardTagDecoder::default(), size).unwrap();
        assert_eq!(m.format(), TagFormat::Id3v2(Id3v2Version::V4));
        assert_eq!(m.file_type(), ContainerType::Mp3);
        assert_eq!(m.title(), "Hi");
        assert_eq!(m.duration(), Duration::from_secs(3));
        assert_eq!(m.raw()["bitrate"], 128);
    }

    #[test]
    fn test_id3v1_mp3() {
        let mut data = frames(200);
        data.extend(id3v1_block("Old"));
        let size = data.len() as u64;

        let m = read_id3v1_mp3(&mut Cursor::new(data), &StandardTagDecoder::default(), size).unwrap();
        assert_eq!(m.format(), TagFormat::Id3v1);
        assert_eq!(m.title(), "Old");
        assert_eq!(m.genre(), "Rock");
        // 200 * 1152 / 44100 = 5.22s
        assert_eq!(m.duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_reserved_first_frame() {
        let mut data = b"ID3\x03\x00\x00\x00\x00\x00\x00".to_vec();
        data.extend_from_slice(&[0xff, 0xea, 0x90, 0x00]);
        let size = data.len() as u64;
        let err = read_id3v2_mp3(&mut Cursor::new(data), &StandardTagDecoder::default(), size).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
