// ID3 tag support
//
// The container readers only locate ID3 regions; the bytes inside are handed
// to a `TagDecoder`.

pub mod frames;
pub mod v1;
pub mod v2;

use std::io::{Read, Seek, SeekFrom};

use tracing::debug;

pub use v1::Id3v1Tag;
pub use v2::{Id3Frame, Id3v2Header};

use crate::decoder::TagDecoder;
use crate::error::Result;
use crate::identify::ID3V1_TAG_SIZE;
use crate::metadata::TagFields;
use crate::utils::io::read_bytes;

/// Decode the ID3v2 tag starting at the cursor.
///
/// The decoder sees exactly the tag body; afterwards the cursor is placed
/// right after the tag (footer included) whatever the decoder consumed.
pub fn read_id3v2_region<R, D>(reader: &mut R, decoder: &D) -> Result<(Id3v2Header, TagFields)>
where
    R: Read + Seek + ?Sized,
    D: TagDecoder + ?Sized,
{
    let start = reader.stream_position()?;
    let header = Id3v2Header::read(reader)?;
    debug!(version = header.version.major(), size = header.size, start, "ID3v2 tag");

    let fields = {
        let mut body = (&mut *reader).take(header.size as u64);
        decoder.decode_id3v2(&header, &mut body)?
    };

    reader.seek(SeekFrom::Start(start + header.tag_size()))?;
    Ok((header, fields))
}

/// Decode the 128-byte ID3v1 trailer at the end of the stream
pub fn read_id3v1_region<R, D>(reader: &mut R, decoder: &D) -> Result<TagFields>
where
    R: Read + Seek + ?Sized,
    D: TagDecoder + ?Sized,
{
    reader.seek(SeekFrom::End(-(ID3V1_TAG_SIZE as i64)))?;
    let block = read_bytes(reader, ID3V1_TAG_SIZE as usize)?;
    decoder.decode_id3v1(&block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::StandardTagDecoder;
    use std::io::Cursor;

    #[test]
    fn test_region_cursor_lands_after_tag() {
        let mut data = b"ID3\x03\x00\x00\x00\x00\x00\x20".to_vec();
        data.extend_from_slice(b"TIT2\x00\x00\x00\x06\x00\x00\x00Hello");
        data.resize(10 + 0x20, 0);
        data.extend_from_slice(&[0xff, 0xfb, 0x90, 0x64]);

        let mut cursor = Cursor::new(data);
        let (header, fields) = read_id3v2_region(&mut cursor, &StandardTagDecoder::default()).unwrap();
        assert_eq!(header.size, 0x20);
        assert_eq!(fields.title, "Hello");
        assert_eq!(cursor.position(), 42);
    }

    #[test]
    fn test_v1_region() {
        let mut data = vec![0u8; 200];
        let tag = data.len() - 128;
        data[tag..tag + 3].copy_from_slice(b"TAG");
        data[tag + 3..tag + 8].copy_from_slice(b"Title");
        let fields = read_id3v1_region(&mut Cursor::new(data), &StandardTagDecoder::default()).unwrap();
        assert_eq!(fields.title, "Title");
    }
}
