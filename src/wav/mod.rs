// RIFF/WAVE support
//
// A WAV file is a RIFF container: "RIFF", a little-endian size, "WAVE", then
// chunks of (4-byte id, little-endian u32 size, payload). Odd-sized payloads
// are followed by one pad byte. Only PCM audio is accepted.

use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::decoder::TagDecoder;
use crate::error::{Error, Result};
use crate::id3::{read_id3v1_region, read_id3v2_region};
use crate::identify::{ContainerType, Id3v2Version, TagFormat, ID3V1_TAG_SIZE};
use crate::metadata::{samples_to_duration, Metadata, Raw, TagFields};
use crate::utils::io::{read_array, read_exact_or_eof, read_le_u16, read_le_u32, skip, stream_len};

pub const RIFF_SIGNATURE: &[u8; 4] = b"RIFF";
pub const WAVE_SIGNATURE: &[u8; 4] = b"WAVE";

const WAVE_FORMAT_PCM: u16 = 1;

/// RIFF chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: [u8; 4],
    pub size: u32,
}

impl ChunkHeader {
    pub const SIZE: u64 = 8;

    /// Read a chunk header; `Ok(None)` when the stream ends before it
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Self>> {
        let mut buffer = [0u8; 8];
        if !read_exact_or_eof(reader, &mut buffer)? {
            return Ok(None);
        }
        Ok(Some(ChunkHeader {
            id: [buffer[0], buffer[1], buffer[2], buffer[3]],
            size: u32::from_le_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]),
        }))
    }

    /// Payload plus the pad byte of odd-sized chunks
    pub fn padded_size(&self) -> u64 {
        self.size as u64 + (self.size as u64 & 1)
    }

    fn id_str(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }
}

/// Metadata read from a WAV file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WavMetadata {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    pub data_size: u32,
    /// Dialect of the tag found in or after the RIFF body
    pub tag_format: TagFormat,
    pub tags: Option<TagFields>,
    pub duration: Duration,
}

impl Metadata for WavMetadata {
    fn format(&self) -> TagFormat {
        self.tag_format
    }

    fn file_type(&self) -> ContainerType {
        ContainerType::Wav
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn technical(&self) -> Raw {
        let mut raw = Raw::new();
        raw.insert("sample_rate".to_string(), Value::from(self.sample_rate));
        raw.insert("bits_per_sample".to_string(), Value::from(self.bits_per_sample));
        raw.insert("channels".to_string(), Value::from(self.channels));
        raw.insert("data_size".to_string(), Value::from(self.data_size));
        raw
    }

    fn tags(&self) -> Option<&TagFields> {
        self.tags.as_ref()
    }
}

impl WavMetadata {
    /// Parse the first 16 bytes of a "fmt " chunk
    fn read_fmt<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<()> {
        let audio_format = read_le_u16(reader)?;
        self.channels = read_le_u16(reader)?;
        self.sample_rate = read_le_u32(reader)?;
        // byte rate and block align
        let _: [u8; 6] = read_array(reader)?;
        self.bits_per_sample = read_le_u16(reader)?;

        if audio_format != WAVE_FORMAT_PCM {
            return Err(Error::UnsupportedFormat(format!(
                "WAV audio format {}, only PCM (1) is supported",
                audio_format
            )));
        }
        Ok(())
    }

    fn set_id3v2(&mut self, version: Id3v2Version, fields: TagFields) {
        self.tag_format = TagFormat::Id3v2(version);
        self.tags = Some(fields);
    }

    fn bytes_per_second(&self) -> u64 {
        let bytes_per_sample = (self.bits_per_sample as u64 + 7) / 8;
        self.sample_rate as u64 * self.channels as u64 * bytes_per_sample
    }
}

/// Check the 12-byte RIFF/WAVE header at the cursor
fn read_riff_header<R: Read + ?Sized>(reader: &mut R) -> Result<()> {
    let header: [u8; 12] = read_array(reader)?;
    if &header[0..4] != RIFF_SIGNATURE {
        return Err(Error::mismatch("RIFF", &header[0..4]));
    }
    if &header[8..12] != WAVE_SIGNATURE {
        return Err(Error::mismatch("WAVE", &header[8..12]));
    }
    Ok(())
}

/// An ID3v2 tag appended without a chunk header reads as an "ID3" chunk id
/// followed by a version byte
fn is_bare_id3(id: &[u8; 4]) -> bool {
    &id[0..3] == b"ID3" && (2..=4).contains(&id[3])
}

/// True when the last 128 bytes of the stream are an ID3v1 block
fn has_id3v1_trailer<R: Read + Seek + ?Sized>(reader: &mut R, len: u64) -> Result<bool> {
    // the RIFF header alone takes 12 bytes
    if len < ID3V1_TAG_SIZE + 12 {
        return Ok(false);
    }
    let pos = reader.stream_position()?;
    reader.seek(SeekFrom::Start(len - ID3V1_TAG_SIZE))?;
    let marker: [u8; 3] = read_array(reader)?;
    reader.seek(SeekFrom::Start(pos))?;
    Ok(&marker == b"TAG")
}

/// Read a WAV file positioned at its RIFF header
pub fn read_wav<R, D>(reader: &mut R, decoder: &D) -> Result<WavMetadata>
where
    R: Read + Seek + ?Sized,
    D: TagDecoder + ?Sized,
{
    read_riff_header(reader)?;
    let len = stream_len(reader)?;
    let has_id3v1 = has_id3v1_trailer(reader, len)?;
    // chunks stop where an ID3v1 trailer starts
    let body_end = if has_id3v1 { len - ID3V1_TAG_SIZE } else { len };

    let mut m = WavMetadata::default();
    let mut have_fmt = false;

    while reader.stream_position()? + ChunkHeader::SIZE <= body_end {
        let Some(chunk) = ChunkHeader::read(reader)? else {
            break;
        };
        let start = reader.stream_position()?;

        if is_bare_id3(&chunk.id) {
            reader.seek(SeekFrom::Start(start - ChunkHeader::SIZE))?;
            let (header, fields) = read_id3v2_region(reader, decoder)?;
            m.set_id3v2(header.version, fields);
            continue;
        }

        let end = start + chunk.padded_size();
        trace!(id = %chunk.id_str(), size = chunk.size, start, "RIFF chunk");
        if start + chunk.size as u64 > body_end {
            warn!(id = %chunk.id_str(), size = chunk.size, "chunk overruns end of stream");
        }

        match &chunk.id {
            b"fmt " => {
                m.read_fmt(&mut (&mut *reader).take(chunk.size as u64))?;
                have_fmt = true;
            }
            b"data" => {
                m.data_size = chunk.size;
            }
            b"id3 " | b"ID3 " => {
                let (header, fields) = read_id3v2_region(reader, decoder)?;
                m.set_id3v2(header.version, fields);
            }
            _ => {}
        }

        reader.seek(SeekFrom::Start(end))?;
    }

    // an ID3v2 tag carries more than the trailer, so it wins
    if has_id3v1 && m.tags.is_none() {
        m.tags = Some(read_id3v1_region(reader, decoder)?);
        m.tag_format = TagFormat::Id3v1;
    }

    if have_fmt {
        m.duration = samples_to_duration(m.data_size as u64, m.bytes_per_second());
    } else {
        warn!("WAV without fmt chunk, duration unknown");
    }
    debug!(duration = ?m.duration, tagged = m.tags.is_some(), "read WAV");
    Ok(m)
}

/// Starting at a RIFF header, move the cursor to the first byte after the
/// audio payload (pad byte included), where an appended tag would begin.
/// Returns that position.
pub fn seek_past_payload<R: Read + Seek + ?Sized>(reader: &mut R) -> Result<u64> {
    read_riff_header(reader)?;
    while let Some(chunk) = ChunkHeader::read(reader)? {
        let end = skip(reader, chunk.padded_size() as i64)?;
        if &chunk.id == b"data" {
            trace!(end, "WAV payload end");
            return Ok(end);
        }
    }
    Err(Error::FormatMismatch {
        expected: "data",
        found: "end of stream".to_string(),
    })
}

/// Build a PCM WAV file of silence
#[cfg(test)]
pub(crate) fn create_test_wav(sample_rate: u32, channels: u16, bits_per_sample: u16, seconds: f64) -> Vec<u8> {
    let bytes_per_sample = (bits_per_sample as u32 + 7) / 8;
    let total_samples = (sample_rate as f64 * seconds) as u32;
    let data_size = total_samples * channels as u32 * bytes_per_sample;

    let mut buf = Vec::new();
    buf.extend_from_slice(RIFF_SIGNATURE);
    buf.extend_from_slice(&(36 + data_size).to_le_bytes());
    buf.extend_from_slice(WAVE_SIGNATURE);
    buf.extend_from_slice(&fmt_chunk(WAVE_FORMAT_PCM, sample_rate, channels, bits_per_sample));
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    buf.resize(buf.len() + data_size as usize, 0);
    buf
}

#[cfg(test)]
fn fmt_chunk(format: u16, sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let bytes_per_sample = (bits_per_sample as u32 + 7) / 8;
    let mut chunk = b"fmt ".to_vec();
    chunk.extend_from_slice(&16u32.to_le_bytes());
    chunk.extend_from_slice(&format.to_le_bytes());
    chunk.extend_from_slice(&channels.to_le_bytes());
    chunk.extend_from_slice(&sample_rate.to_le_bytes());
    chunk.extend_from_slice(&(sample_rate * channels as u32 * bytes_per_sample).to_le_bytes());
    chunk.extend_from_slice(&(channels * bytes_per_sample as u16).to_le_bytes());
    chunk.extend_from_slice(&bits_per_sample.to_le_bytes());
    chunk
}
