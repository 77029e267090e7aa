// ID3v2 tag header and frame splitting

use std::io::Read;

use tracing::warn;

use crate::error::{Error, Result};
use crate::identify::Id3v2Version;
use crate::utils::io::{get_7bit_chunked_value, get_chunked_value, read_array};

/// ID3v2 header structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id3v2Header {
    pub version: Id3v2Version,
    pub revision: u8,
    pub flags: u8,
    /// Tag size excluding the header and footer
    pub size: u32,
}

impl Id3v2Header {
    pub const SIZE: u64 = 10;

    /// Read ID3v2 header from reader
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let buffer: [u8; 10] = read_array(reader)?;
        if &buffer[0..3] != b"ID3" {
            return Err(Error::mismatch("ID3", &buffer[0..3]));
        }
        Self::parse(&buffer)
    }

    fn parse(buffer: &[u8; 10]) -> Result<Self> {
        let version = Id3v2Version::from_major(buffer[3])?;
        Ok(Id3v2Header {
            version,
            revision: buffer[4],
            flags: buffer[5],
            size: get_7bit_chunked_value(&buffer[6..10]) as u32,
        })
    }

    pub fn unsynchronised(&self) -> bool {
        self.flags & 0x80 != 0
    }

    pub fn has_extended_header(&self) -> bool {
        self.version != Id3v2Version::V2 && self.flags & 0x40 != 0
    }

    /// Only ID3v2.4 tags may carry a footer
    pub fn has_footer(&self) -> bool {
        self.version == Id3v2Version::V4 && self.flags & 0x10 != 0
    }

    /// Bytes occupied by the whole tag: header, body and optional footer
    pub fn tag_size(&self) -> u64 {
        let footer = if self.has_footer() { Self::SIZE } else { 0 };
        Self::SIZE + self.size as u64 + footer
    }
}

/// ID3v2 frame structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id3Frame {
    pub frame_id: String,
    pub data: Vec<u8>,
}

/// Reverse unsynchronisation: every `FF 00` becomes `FF`
pub fn remove_unsync(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        out.push(data[i]);
        if data[i] == 0xFF && data.get(i + 1) == Some(&0x00) {
            i += 1;
        }
        i += 1;
    }
    out
}

/// Split a tag body (everything after the 10-byte header) into frames
pub fn split_frames(header: &Id3v2Header, body: &[u8]) -> Result<Vec<Id3Frame>> {
    let unsynced;
    let mut body = body;
    if header.unsynchronised() && header.version != Id3v2Version::V4 {
        unsynced = remove_unsync(body);
        body = &unsynced;
    }

    let mut pos = 0usize;
    if header.has_extended_header() {
        if body.len() < 4 {
            return Err(Error::InvalidArgument("extended header truncated".to_string()));
        }
        let size = match header.version {
            // v2.3 size excludes its own four bytes, v2.4 (synchsafe) includes them
            Id3v2Version::V3 => get_chunked_value(&body[0..4]) as usize + 4,
            _ => get_7bit_chunked_value(&body[0..4]) as usize,
        };
        pos = size;
    }

    let (id_len, header_len) = match header.version {
        Id3v2Version::V2 => (3, 6),
        _ => (4, 10),
    };

    let mut frames = Vec::new();
    while pos + header_len <= body.len() {
        let id = &body[pos..pos + id_len];
        // Padding, or garbage past the last frame
        if !id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            break;
        }
        // the size field is as wide as the frame ID
        let size_bytes = &body[pos + id_len..pos + 2 * id_len];
        let size = match header.version {
            Id3v2Version::V4 => get_7bit_chunked_value(size_bytes),
            _ => get_chunked_value(size_bytes),
        } as usize;
        let flags = if id_len == 4 {
            u16::from_be_bytes([body[pos + 8], body[pos + 9]])
        } else {
            0
        };
        let frame_id = String::from_utf8_lossy(id).into_owned();
        pos += header_len;

        if size > body.len() - pos {
            warn!(%frame_id, size, "ID3v2 frame overruns tag body");
            break;
        }
        let raw = &body[pos..pos + size];
        pos += size;

        if let Some(data) = frame_payload(header.version, flags, raw) {
            frames.push(Id3Frame { frame_id, data });
        }
    }

    Ok(frames)
}

/// Apply per-frame format flags; compressed or encrypted frames are dropped
fn frame_payload(version: Id3v2Version, flags: u16, raw: &[u8]) -> Option<Vec<u8>> {
    match version {
        Id3v2Version::V2 => Some(raw.to_vec()),
        Id3v2Version::V3 => {
            if flags & 0x00C0 != 0 {
                return None;
            }
            Some(raw.to_vec())
        }
        Id3v2Version::V4 => {
            if flags & 0x000C != 0 {
                return None;
            }
            let mut data = raw;
            if flags & 0x0001 != 0 {
                // data length indicator
                data = data.get(4..)?;
            }
            if flags & 0x0002 != 0 {
                Some(remove_unsync(data))
            } else {
                Some(data.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame_v3(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn test_header_parse() {
        let mut cursor = Cursor::new(b"ID3\x04\x00\x10\x00\x00\x02\x01".to_vec());
        let header = Id3v2Header::read(&mut cursor).unwrap();
        assert_eq!(header.version, Id3v2Version::V4);
        assert_eq!(header.size, 257);
        assert!(header.has_footer());
        assert_eq!(header.tag_size(), 277);
    }

    #[test]
    fn test_header_rejects_bad_magic_and_version() {
        let mut cursor = Cursor::new(b"TAG\x03\x00\x00\x00\x00\x00\x00".to_vec());
        assert!(matches!(Id3v2Header::read(&mut cursor), Err(Error::FormatMismatch { .. })));
        let mut cursor = Cursor::new(b"ID3\x01\x00\x00\x00\x00\x00\x00".to_vec());
        assert!(matches!(Id3v2Header::read(&mut cursor), Err(Error::UnsupportedVersion(_))));
    }

    #[test]
    fn test_split_frames_v3_with_padding() {
        let mut body = frame_v3(b"TIT2", b"\x00Title");
        body.extend(frame_v3(b"TPE1", b"\x00Artist"));
        body.extend_from_slice(&[0u8; 20]);
        let header = Id3v2Header {
            version: Id3v2Version::V3,
            revision: 0,
            flags: 0,
            size: body.len() as u32,
        };
        let frames = split_frames(&header, &body).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].frame_id, "TIT2");
        assert_eq!(frames[1].data, b"\x00Artist");
    }

    #[test]
    fn test_split_frames_v2() {
        let mut body = b"TT2\x00\x00\x04\x00abc".to_vec();
        body.extend_from_slice(b"TP1\x00\x00\x02\x00z");
        let header = Id3v2Header {
            version: Id3v2Version::V2,
            revision: 0,
            flags: 0,
            size: body.len() as u32,
        };
        let frames = split_frames(&header, &body).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].frame_id, "TT2");
        assert_eq!(frames[0].data, b"\x00abc");
    }

    #[test]
    fn test_split_frames_stops_on_overrun() {
        let mut body = frame_v3(b"TIT2", b"\x00ok");
        body.extend_from_slice(b"TALB\x00\x00\x10\x00\x00\x00short");
        let header = Id3v2Header {
            version: Id3v2Version::V3,
            revision: 0,
            flags: 0,
            size: body.len() as u32,
        };
        let frames = split_frames(&header, &body).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_remove_unsync() {
        assert_eq!(remove_unsync(&[0xFF, 0x00, 0xE0, 0x01]), vec![0xFF, 0xE0, 0x01]);
        assert_eq!(remove_unsync(&[0xFF]), vec![0xFF]);
    }
}
