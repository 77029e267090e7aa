// MP4/M4A/M4B/M4P support
//
// MP4 files are trees of atoms: a big-endian u32 size (header included),
// a 4-byte type, then the payload. Size 1 means a u64 size follows the type;
// size 0 means the atom runs to the end of its parent.
//
// - ftyp: File type atom (major brand)
// - moov: Movie atom
//   - mvhd: Movie header (timescale, duration)
//   - udta: User data atom
//     - meta: Metadata atom (version and flags, then children)
//       - ilst: Item list, handed to the tag decoder
// - mdat: Media data atom

pub mod items;

use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::decoder::TagDecoder;
use crate::error::{Error, Result};
use crate::identify::{ContainerType, Mp4Brand, TagFormat};
use crate::metadata::{samples_to_duration, Metadata, Raw, TagFields};
use crate::utils::io::{peek, read_array, read_be_u32, read_be_u64, skip, stream_len};

pub mod atoms {
    pub const FTYP: &[u8; 4] = b"ftyp";
    pub const MOOV: &[u8; 4] = b"moov";
    pub const MVHD: &[u8; 4] = b"mvhd";
    pub const UDTA: &[u8; 4] = b"udta";
    pub const META: &[u8; 4] = b"meta";
    pub const HDLR: &[u8; 4] = b"hdlr";
    pub const ILST: &[u8; 4] = b"ilst";
}

/// Position of one atom in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    pub kind: [u8; 4],
    /// First payload byte
    pub start: u64,
    /// First byte after the atom
    pub end: u64,
}

impl AtomHeader {
    /// Read the header at the cursor; `parent_end` resolves size 0 and
    /// bounds the atom.
    pub fn read<R: Read + Seek + ?Sized>(reader: &mut R, parent_end: u64) -> Result<Self> {
        let offset = reader.stream_position()?;
        let size = read_be_u32(reader)?;
        let kind: [u8; 4] = read_array(reader)?;

        let (header_len, size) = match size {
            0 => (8, parent_end.saturating_sub(offset)),
            1 => (16, read_be_u64(reader)?),
            n => (8, n as u64),
        };
        if size < header_len {
            return Err(Error::InvalidArgument(format!(
                "atom {:?} at {} has size {}",
                String::from_utf8_lossy(&kind),
                offset,
                size
            )));
        }

        let mut end = offset.saturating_add(size);
        if end > parent_end {
            warn!(kind = %String::from_utf8_lossy(&kind), end, parent_end, "atom overruns its parent");
            end = parent_end;
        }
        Ok(AtomHeader {
            kind,
            start: offset + header_len,
            end,
        })
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Visit the atoms laid out between `start` and `end`. The cursor is at each
/// atom's payload when `visit` runs.
pub fn for_each_atom<R, F>(reader: &mut R, start: u64, end: u64, mut visit: F) -> Result<()>
where
    R: Read + Seek + ?Sized,
    F: FnMut(&AtomHeader, &mut R) -> Result<()>,
{
    let mut pos = start;
    while pos + 8 <= end {
        reader.seek(SeekFrom::Start(pos))?;
        let atom = AtomHeader::read(reader, end)?;
        trace!(kind = %String::from_utf8_lossy(&atom.kind), start = atom.start, end = atom.end, "atom");
        visit(&atom, reader)?;
        pos = atom.end;
    }
    reader.seek(SeekFrom::Start(end))?;
    Ok(())
}

/// Metadata read from an MP4 file
#[derive(Debug, Clone, PartialEq)]
pub struct Mp4Metadata {
    pub brand: Mp4Brand,
    pub major_brand: String,
    pub timescale: u32,
    /// Movie duration in timescale units
    pub duration_units: u64,
    pub tags: Option<TagFields>,
    pub duration: Duration,
}

impl Default for Mp4Metadata {
    fn default() -> Self {
        Mp4Metadata {
            brand: Mp4Brand::Unknown,
            major_brand: String::new(),
            timescale: 0,
            duration_units: 0,
            tags: None,
            duration: Duration::ZERO,
        }
    }
}

impl Metadata for Mp4Metadata {
    fn format(&self) -> TagFormat {
        TagFormat::Mp4
    }

    fn file_type(&self) -> ContainerType {
        ContainerType::Mp4(self.brand)
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn technical(&self) -> Raw {
        let mut raw = Raw::new();
        raw.insert("major_brand".to_string(), Value::from(self.major_brand.clone()));
        raw.insert("timescale".to_string(), Value::from(self.timescale));
        raw
    }

    fn tags(&self) -> Option<&TagFields> {
        self.tags.as_ref()
    }
}

/// Read an MP4 file positioned at its `ftyp` atom
pub fn read_mp4<R, D>(reader: &mut R, decoder: &D) -> Result<Mp4Metadata>
where
    R: Read + Seek + ?Sized,
    D: TagDecoder + ?Sized,
{
    let start = reader.stream_position()?;
    let len = stream_len(reader)?;
    let mut m = Mp4Metadata::default();
    let mut seen_ftyp = false;

    for_each_atom(reader, start, len, |atom, reader| {
        match &atom.kind {
            atoms::FTYP => {
                let brand: [u8; 4] = read_array(reader)?;
                m.brand = Mp4Brand::from_brand(&brand[..3]);
                m.major_brand = String::from_utf8_lossy(&brand).trim_end().to_string();
                seen_ftyp = true;
            }
            atoms::MOOV => read_moov(reader, atom, decoder, &mut m)?,
            _ => {}
        }
        Ok(())
    })?;

    if !seen_ftyp {
        return Err(Error::FormatMismatch {
            expected: "ftyp",
            found: "no ftyp atom".to_string(),
        });
    }
    debug!(brand = %m.major_brand, duration = ?m.duration, tagged = m.tags.is_some(), "read MP4");
    Ok(m)
}

fn read_moov<R, D>(reader: &mut R, moov: &AtomHeader, decoder: &D, m: &mut Mp4Metadata) -> Result<()>
where
    R: Read + Seek + ?Sized,
    D: TagDecoder + ?Sized,
{
    for_each_atom(reader, moov.start, moov.end, |atom, reader| {
        match &atom.kind {
            atoms::MVHD => read_mvhd(reader, m)?,
            atoms::UDTA => {
                for_each_atom(reader, atom.start, atom.end, |child, reader| {
                    if &child.kind == atoms::META {
                        read_meta(reader, child, decoder, m)?;
                    }
                    Ok(())
                })?;
            }
            atoms::META => read_meta(reader, atom, decoder, m)?,
            _ => {}
        }
        Ok(())
    })
}

fn read_meta<R, D>(reader: &mut R, meta: &AtomHeader, decoder: &D, m: &mut Mp4Metadata) -> Result<()>
where
    R: Read + Seek + ?Sized,
    D: TagDecoder + ?Sized,
{
    // ISO meta atoms carry version and flags; QuickTime ones go straight to hdlr
    let mut start = meta.start;
    if meta.len() >= 8 {
        let probe = peek(reader, 8)?;
        if &probe[4..8] != atoms::HDLR {
            start += 4;
        }
    }

    for_each_atom(reader, start, meta.end, |atom, reader| {
        if &atom.kind == atoms::ILST && m.tags.is_none() {
            let fields = decoder.decode_mp4_items(&mut (&mut *reader).take(atom.len()))?;
            m.tags = Some(fields);
        }
        Ok(())
    })
}

fn read_mvhd<R: Read + Seek + ?Sized>(reader: &mut R, m: &mut Mp4Metadata) -> Result<()> {
    let [version, _, _, _]: [u8; 4] = read_array(reader)?;
    let (timescale, units) = if version == 1 {
        // creation and modification times
        skip(reader, 16)?;
        (read_be_u32(reader)?, read_be_u64(reader)?)
    } else {
        skip(reader, 8)?;
        (read_be_u32(reader)?, read_be_u32(reader)? as u64)
    };
    m.timescale = timescale;
    m.duration_units = units;
    m.duration = samples_to_duration(units, timescale as u64);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::items::item;
    use super::*;
    use crate::decoder::StandardTagDecoder;
    use std::io::Cursor;

    fn atom(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((8 + payload.len()) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    fn mvhd_v0(timescale: u32, duration: u32) -> Vec<u8> {
        let mut payload = vec![0u8; 12];
        payload.extend_from_slice(&timescale.to_be_bytes());
        payload.extend_from_slice(&duration.to_be_bytes());
        payload.resize(100, 0);
        atom(b"mvhd", &payload)
    }

    fn m4a(moov_children: &[u8]) -> Vec<u8> {
        let mut data = atom(b"ftyp", b"M4A \0\0\0\0M4A mp42isom");
        data.extend(atom(b"free", &[0u8; 8]));
        data.extend(atom(b"moov", moov_children));
        data.extend(atom(b"mdat", &[0u8; 64]));
        data
    }

    fn ilst(items: &[Vec<u8>]) -> Vec<u8> {
        atom(b"ilst", &items.concat())
    }

    #[test]
    fn test_read_m4a() {
        let mut meta = vec![0u8; 4];
        meta.extend(atom(b"hdlr", &[0u8; 25]));
        meta.extend(ilst(&[
            item(b"\xA9nam", 1, b"Song"),
            item(b"\xA9alb", 1, b"Album"),
            item(b"trkn", 0, &[0, 0, 0, 2, 0, 9, 0, 0]),
        ]));
        let mut moov = mvhd_v0(44100, 44100 * 185);
        moov.extend(atom(b"udta", &atom(b"meta", &meta)));

        let m = read_mp4(&mut Cursor::new(m4a(&moov)), &StandardTagDecoder::default()).unwrap();
        assert_eq!(m.file_type(), ContainerType::Mp4(Mp4Brand::M4a));
        assert_eq!(m.format(), TagFormat::Mp4);
        assert_eq!(m.title(), "Song");
        assert_eq!(m.album(), "Album");
        assert_eq!(m.track(), (2, 9));
        assert_eq!(m.duration(), Duration::from_secs(185));
        assert_eq!(m.raw()["major_brand"], "M4A");
    }

    #[test]
    fn test_quicktime_meta_and_mvhd_v1() {
        let mut mvhd = vec![1u8, 0, 0, 0];
        mvhd.extend_from_slice(&[0u8; 16]);
        mvhd.extend_from_slice(&1000u32.to_be_bytes());
        mvhd.extend_from_slice(&1500u64.to_be_bytes());
        let mut moov = atom(b"mvhd", &mvhd);
        let mut meta = atom(b"hdlr", &[0u8; 25]);
        meta.extend(ilst(&[item(b"\xA9ART", 1, b"Someone")]));
        moov.extend(atom(b"meta", &meta));

        let m = read_mp4(&mut Cursor::new(m4a(&moov)), &StandardTagDecoder::default()).unwrap();
        assert_eq!(m.artist(), "Someone");
        assert_eq!(m.duration(), Duration::from_millis(1500));
    }

    #[test]
    fn test_extended_and_open_ended_sizes() {
        let mut data = atom(b"ftyp", b"M4B \0\0\0\0");
        // 64-bit size
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"free");
        data.extend_from_slice(&24u64.to_be_bytes());
        data.extend_from_slice(&[0u8; 8]);
        let mut moov = mvhd_v0(600, 6000);
        moov.extend(atom(b"udta", &atom(b"meta", &[&[0u8; 4][..], &ilst(&[item(b"\xA9nam", 1, b"Book")])].concat())));
        data.extend(atom(b"moov", &moov));
        // size 0: runs to the end of the file
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&[0u8; 40]);

        let m = read_mp4(&mut Cursor::new(data), &StandardTagDecoder::default()).unwrap();
        assert_eq!(m.file_type(), ContainerType::Mp4(Mp4Brand::M4b));
        assert_eq!(m.title(), "Book");
        assert_eq!(m.duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_undersized_atom() {
        let mut data = atom(b"ftyp", b"M4A \0\0\0\0");
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(b"moov");
        let err = read_mp4(&mut Cursor::new(data), &StandardTagDecoder::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
