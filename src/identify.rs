// Format identification
//
// Classifies a stream into a (tag format, container) pair from a 12-byte
// prefix, the RIFF payload end for WAV files, or the ID3v1 trailer.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ReadOptions;
use crate::error::{Error, IdentifyError, Result};
use crate::utils::io::{peek, read_array, skip, stream_len};
use crate::wav;

/// Size of an ID3v1 trailer
pub const ID3V1_TAG_SIZE: u64 = 128;

/// ID3v2 major version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Id3v2Version {
    V2,
    V3,
    V4,
}

impl Id3v2Version {
    pub fn from_major(major: u8) -> Result<Self> {
        match major {
            2 => Ok(Id3v2Version::V2),
            3 => Ok(Id3v2Version::V3),
            4 => Ok(Id3v2Version::V4),
            other => Err(Error::UnsupportedVersion(format!(
                "ID3 version {}, expected 2, 3 or 4",
                other
            ))),
        }
    }

    pub fn major(self) -> u8 {
        match self {
            Id3v2Version::V2 => 2,
            Id3v2Version::V3 => 3,
            Id3v2Version::V4 => 4,
        }
    }
}

/// Tag dialect carried by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum TagFormat {
    #[default]
    Unknown,
    Id3v1,
    Id3v2(Id3v2Version),
    /// Vorbis comments (FLAC, OGG Vorbis, Opus)
    Vorbis,
    /// iTunes-style MP4 item list
    Mp4,
}

impl fmt::Display for TagFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagFormat::Unknown => write!(f, "unknown"),
            TagFormat::Id3v1 => write!(f, "ID3v1"),
            TagFormat::Id3v2(v) => write!(f, "ID3v2.{}", v.major()),
            TagFormat::Vorbis => write!(f, "VORBIS"),
            TagFormat::Mp4 => write!(f, "MP4"),
        }
    }
}

/// MP4 file subtype taken from the `ftyp` major brand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mp4Brand {
    M4a,
    M4b,
    M4p,
    Unknown,
}

impl Mp4Brand {
    pub fn from_brand(brand: &[u8]) -> Self {
        match brand {
            b"M4A" => Mp4Brand::M4a,
            b"M4B" => Mp4Brand::M4b,
            b"M4P" => Mp4Brand::M4p,
            _ => Mp4Brand::Unknown,
        }
    }
}

/// Container type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ContainerType {
    #[default]
    Unknown,
    Mp3,
    Flac,
    Ogg,
    Mp4(Mp4Brand),
    Wav,
    Dsf,
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerType::Unknown => write!(f, "unknown"),
            ContainerType::Mp3 => write!(f, "MP3"),
            ContainerType::Flac => write!(f, "FLAC"),
            ContainerType::Ogg => write!(f, "OGG"),
            ContainerType::Mp4(Mp4Brand::M4a) => write!(f, "M4A"),
            ContainerType::Mp4(Mp4Brand::M4b) => write!(f, "M4B"),
            ContainerType::Mp4(Mp4Brand::M4p) => write!(f, "M4P"),
            ContainerType::Mp4(Mp4Brand::Unknown) => write!(f, "MP4"),
            ContainerType::Wav => write!(f, "WAV"),
            ContainerType::Dsf => write!(f, "DSF"),
        }
    }
}

/// Outcome of one sniff pass
enum Sniff {
    Found(TagFormat, ContainerType),
    /// RIFF/WAVE prefix: sniff again after the audio payload
    WavWrapped,
}

/// Identify the tag format and container of `reader` with default options
pub fn identify<R: Read + Seek>(reader: &mut R) -> std::result::Result<(TagFormat, ContainerType), IdentifyError> {
    identify_with(reader, &ReadOptions::default())
}

/// Identify the tag format and container of `reader`.
///
/// The cursor position afterwards is unspecified. WAV files are re-sniffed
/// after their audio payload to find a trailing tag; the container reported
/// is then always `Wav`, and errors from that hop carry `Wav` as the best
/// guess.
pub fn identify_with<R: Read + Seek>(
    reader: &mut R,
    options: &ReadOptions,
) -> std::result::Result<(TagFormat, ContainerType), IdentifyError> {
    let mut outer: Option<ContainerType> = None;
    let with_outer = |source: Error, outer: Option<ContainerType>| IdentifyError {
        container: outer.unwrap_or_default(),
        source,
    };

    for _ in 0..options.max_identify_depth.max(1) {
        match sniff(reader).map_err(|e| with_outer(e, outer))? {
            Sniff::Found(format, container) => {
                let container = outer.unwrap_or(container);
                debug!(%format, %container, "identified stream");
                return Ok((format, container));
            }
            Sniff::WavWrapped => {
                outer = Some(ContainerType::Wav);
                seek_to_trailing_tag(reader).map_err(|e| with_outer(e, outer))?;
            }
        }
    }

    Err(with_outer(
        Error::UnsupportedFormat("nested RIFF wrapping exceeds identify depth".to_string()),
        outer,
    ))
}

/// Position the cursor where a tag appended after the WAV audio would start
fn seek_to_trailing_tag<R: Read + Seek>(reader: &mut R) -> Result<()> {
    wav::seek_past_payload(reader)?;
    let marker = match peek(reader, 4) {
        Ok(marker) => marker,
        Err(e) if e.is_eof() => return Ok(()),
        Err(e) => return Err(e),
    };
    // Some encoders (Serato among them) wrap the trailing tag in an `id3 `
    // chunk; skip its 8-byte header
    if &marker[0..3] == b"id3" || &marker[..] == b"ID3 " {
        trace!("skipping id3 chunk header after WAV payload");
        skip(reader, 8)?;
    }
    Ok(())
}

fn sniff<R: Read + Seek>(reader: &mut R) -> Result<Sniff> {
    let b: [u8; 12] = read_array(reader)?;
    skip(reader, -12)?;
    trace!(prefix = ?&b[..], "sniffing");

    if &b[0..4] == b"fLaC" {
        return Ok(Sniff::Found(TagFormat::Vorbis, ContainerType::Flac));
    }
    if &b[0..4] == b"OggS" {
        return Ok(Sniff::Found(TagFormat::Vorbis, ContainerType::Ogg));
    }
    if &b[4..8] == b"ftyp" {
        let brand = Mp4Brand::from_brand(&b[8..11]);
        return Ok(Sniff::Found(TagFormat::Mp4, ContainerType::Mp4(brand)));
    }
    if &b[0..3] == b"ID3" {
        let version = Id3v2Version::from_major(b[3])?;
        return Ok(Sniff::Found(TagFormat::Id3v2(version), ContainerType::Mp3));
    }
    if &b[0..4] == b"RIFF" && &b[8..12] == b"WAVE" {
        return Ok(Sniff::WavWrapped);
    }

    let len = stream_len(reader)?;
    if len < ID3V1_TAG_SIZE {
        return Err(Error::NoTagsFound);
    }
    reader.seek(SeekFrom::End(-(ID3V1_TAG_SIZE as i64)))?;
    let tag: [u8; 3] = read_array(reader)?;
    if &tag != b"TAG" {
        return Err(Error::NoTagsFound);
    }
    Ok(Sniff::Found(TagFormat::Id3v1, ContainerType::Mp3))
}
