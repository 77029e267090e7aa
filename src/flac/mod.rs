// FLAC metadata handling module
//
// A FLAC stream starts with "fLaC" followed by metadata blocks, each with a
// 4-byte header (last-block flag, 7-bit type, 24-bit length). The last block
// is flagged; audio frames follow it.

pub mod metadata;
pub mod picture;
pub mod vorbis;

use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace, warn};

pub use metadata::{FlacMetadataBlockHeader, FlacMetadataBlockType, StreamInfo, FLAC_SIGNATURE};
pub use picture::FlacPicture;
pub use vorbis::VorbisComment;

use crate::decoder::TagDecoder;
use crate::error::{Error, Result};
use crate::identify::{ContainerType, TagFormat};
use crate::metadata::{samples_to_duration, Metadata, Raw, TagFields};
use crate::utils::io::{read_array, read_bytes};

/// Metadata read from a FLAC stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlacMetadata {
    pub stream_info: Option<StreamInfo>,
    pub tags: Option<TagFields>,
    pub duration: Duration,
}

impl Metadata for FlacMetadata {
    fn format(&self) -> TagFormat {
        TagFormat::Vorbis
    }

    fn file_type(&self) -> ContainerType {
        ContainerType::Flac
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn technical(&self) -> Raw {
        let mut raw = Raw::new();
        if let Some(info) = &self.stream_info {
            raw.insert("sample_rate".to_string(), Value::from(info.sample_rate));
            raw.insert("channels".to_string(), Value::from(info.channels));
            raw.insert("bits_per_sample".to_string(), Value::from(info.bits_per_sample));
            raw.insert("total_samples".to_string(), Value::from(info.total_samples));
        }
        raw
    }

    fn tags(&self) -> Option<&TagFields> {
        self.tags.as_ref()
    }
}

/// Walk the metadata blocks after the signature, calling `visit` with each
/// block header while the cursor sits at the block payload.
///
/// Whatever `visit` consumes, the cursor moves to the next block header
/// afterwards. Walking stops after the block flagged last.
pub fn walk_blocks<R, F>(reader: &mut R, mut visit: F) -> Result<()>
where
    R: Read + Seek + ?Sized,
    F: FnMut(&FlacMetadataBlockHeader, &mut R) -> Result<()>,
{
    loop {
        let header = FlacMetadataBlockHeader::read(reader)?;
        let start = reader.stream_position()?;
        trace!(block_type = ?header.block_type, length = header.length, start, "FLAC block");

        visit(&header, reader)?;
        reader.seek(SeekFrom::Start(start + header.length as u64))?;

        if header.is_last {
            return Ok(());
        }
    }
}

/// Read a FLAC stream positioned at its "fLaC" signature
pub fn read_flac<R, D>(reader: &mut R, decoder: &D) -> Result<FlacMetadata>
where
    R: Read + Seek + ?Sized,
    D: TagDecoder + ?Sized,
{
    let signature: [u8; 4] = read_array(reader)?;
    if &signature != FLAC_SIGNATURE {
        return Err(Error::mismatch("fLaC", &signature));
    }

    let mut m = FlacMetadata::default();
    let mut have_comment = false;
    walk_blocks(reader, |header, reader| {
        let length = header.length as u64;
        match header.block_type {
            FlacMetadataBlockType::StreamInfo => {
                let data = read_bytes(reader, header.length as usize)?;
                let info = StreamInfo::parse(&data)?;
                if info.sample_rate == 0 {
                    warn!("FLAC stream info has zero sample rate");
                }
                m.duration = samples_to_duration(info.total_samples, info.sample_rate as u64);
                m.stream_info = Some(info);
            }
            // only one comment block is allowed; later ones are ignored
            FlacMetadataBlockType::VorbisComment if have_comment => {
                warn!(length, "ignoring extra VORBIS_COMMENT block");
            }
            FlacMetadataBlockType::VorbisComment => {
                have_comment = true;
                let fields = decoder.decode_vorbis_comment(&mut (&mut *reader).take(length))?;
                let picture = m.tags.take().and_then(|t| t.picture);
                m.tags = Some(TagFields {
                    picture: fields.picture.or(picture),
                    ..fields
                });
            }
            FlacMetadataBlockType::Picture => {
                let picture = decoder.decode_picture(&mut (&mut *reader).take(length))?;
                let tags = m.tags.get_or_insert_with(TagFields::default);
                // First front cover wins, otherwise the first picture
                let keep_current = tags
                    .picture
                    .as_ref()
                    .map_or(false, |p| p.picture_type == "Cover (front)" || picture.picture_type != "Cover (front)");
                if !keep_current {
                    tags.picture = Some(picture);
                }
            }
            _ => {}
        }
        Ok(())
    })?;

    debug!(duration = ?m.duration, tagged = m.tags.is_some(), "read FLAC");
    Ok(m)
}
