// OGG Vorbis and Opus metadata support
//
// OGG File Structure:
// - OGG Page Header (27 bytes)
//   - Capture Pattern: "OggS" (4 bytes)
//   - Version: 0 (1 byte)
//   - Header Type: 1=continuation, 2=bos, 4=eos (1 byte)
//   - Granule Position (8 bytes)
//   - Bitstream Serial Number (4 bytes)
//   - Page Sequence Number (4 bytes)
//   - CRC Checksum (4 bytes)
//   - Number of Page Segments (1 byte)
//   - Segment Table (variable)
//
// Vorbis streams open with an identification packet ("\x01vorbis") and a
// comment packet ("\x03vorbis"); Opus with "OpusHead" and "OpusTags".

pub mod crc;
pub mod page;

use std::io::Read;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

pub use page::{DemuxedPage, OggDemuxer, OggPageHeader};

use crate::decoder::TagDecoder;
use crate::error::{Error, Result};
use crate::identify::{ContainerType, TagFormat};
use crate::metadata::{samples_to_duration, Metadata, Raw, TagFields};

// OGG signature
pub const OGG_SIGNATURE: &[u8; 4] = b"OggS";

// OGG page header types
pub const OGG_HEADER_TYPE_CONTINUATION: u8 = 0x01;

const VORBIS_IDENTIFICATION: &[u8] = b"\x01vorbis";
const VORBIS_COMMENT: &[u8] = b"\x03vorbis";
const OPUS_HEAD: &[u8] = b"OpusHead";
const OPUS_TAGS: &[u8] = b"OpusTags";

/// Opus always decodes at 48 kHz, whatever the input rate in its header
const OPUS_SAMPLE_RATE: u32 = 48000;

/// Codec of the logical stream carrying the tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OggCodec {
    #[default]
    Unknown,
    Vorbis,
    Opus,
}

/// Metadata read from an OGG stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OggMetadata {
    pub codec: OggCodec,
    pub sample_rate: u32,
    pub channels: u8,
    /// Granule position of the last page that finished a packet
    pub granule_position: u64,
    pub tags: Option<TagFields>,
    pub duration: Duration,
}

impl Metadata for OggMetadata {
    fn format(&self) -> TagFormat {
        TagFormat::Vorbis
    }

    fn file_type(&self) -> ContainerType {
        ContainerType::Ogg
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn technical(&self) -> Raw {
        let mut raw = Raw::new();
        raw.insert("codec".to_string(), serde_json::to_value(self.codec).unwrap_or(Value::Null));
        raw.insert("sample_rate".to_string(), Value::from(self.sample_rate));
        raw.insert("channels".to_string(), Value::from(self.channels));
        raw
    }

    fn tags(&self) -> Option<&TagFields> {
        self.tags.as_ref()
    }
}

/// Demux the whole stream, decoding the first comment packet found.
///
/// Fails with `NoTagsFound` when no comment packet appears before the end.
pub fn read_ogg<R, D>(reader: &mut R, decoder: &D) -> Result<OggMetadata>
where
    R: Read + ?Sized,
    D: TagDecoder + ?Sized,
{
    let mut demuxer = OggDemuxer::new();
    let mut m = OggMetadata::default();

    while let Some(page) = demuxer.read_page(reader)? {
        // -1 marks a page on which no packet finishes
        if page.granule_position != u64::MAX {
            m.granule_position = page.granule_position;
        }
        for packet in &page.packets {
            m.read_packet(packet, decoder)?;
        }
    }

    if m.tags.is_none() {
        return Err(Error::NoTagsFound);
    }
    if m.sample_rate == 0 {
        warn!("OGG stream without a sample rate, duration unknown");
    }
    m.duration = samples_to_duration(m.granule_position, m.sample_rate as u64);
    debug!(codec = ?m.codec, duration = ?m.duration, "read OGG");
    Ok(m)
}

impl OggMetadata {
    fn read_packet<D: TagDecoder + ?Sized>(&mut self, packet: &[u8], decoder: &D) -> Result<()> {
        if let Some(body) = packet.strip_prefix(VORBIS_COMMENT) {
            self.codec = OggCodec::Vorbis;
            self.decode_comment(body, decoder)?;
        } else if let Some(body) = packet.strip_prefix(OPUS_TAGS) {
            self.codec = OggCodec::Opus;
            self.sample_rate = OPUS_SAMPLE_RATE;
            self.decode_comment(body, decoder)?;
        } else if let Some(body) = packet.strip_prefix(VORBIS_IDENTIFICATION) {
            // version (4), channels (1), sample rate (4)
            if body.len() < 9 {
                return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            self.codec = OggCodec::Vorbis;
            self.channels = body[4];
            self.sample_rate = u32::from_le_bytes([body[5], body[6], body[7], body[8]]);
        } else if let Some(body) = packet.strip_prefix(OPUS_HEAD) {
            // version (1), channels (1)
            self.codec = OggCodec::Opus;
            self.sample_rate = OPUS_SAMPLE_RATE;
            if let Some(&channels) = body.get(1) {
                self.channels = channels;
            }
        }
        Ok(())
    }

    /// Only the first comment packet is decoded
    fn decode_comment<D: TagDecoder + ?Sized>(&mut self, mut body: &[u8], decoder: &D) -> Result<()> {
        if self.tags.is_some() {
            trace!(len = body.len(), "skipping extra comment packet");
            return Ok(());
        }
        self.tags = Some(decoder.decode_vorbis_comment(&mut body)?);
        Ok(())
    }
}
