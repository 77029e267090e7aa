//! Audioprobe - structural metadata extraction for audio containers
//!
//! Reads tags, encoding parameters and duration from MP3 (ID3v1/ID3v2),
//! FLAC, OGG (Vorbis, Opus), MP4 (M4A/M4B/M4P), WAV and DSF streams.
//!
//! ```no_run
//! use audioprobe::Metadata;
//!
//! let mut file = std::fs::File::open("song.flac")?;
//! let metadata = audioprobe::read_from(&mut file)?;
//! println!("{} - {} ({:?})", metadata.artist(), metadata.title(), metadata.duration());
//! # Ok::<(), audioprobe::Error>(())
//! ```

pub mod config;
pub mod decoder;
pub mod dsf;
pub mod error;
pub mod field_mapping;
pub mod flac;
pub mod id3;
pub mod identify;
pub mod metadata;
pub mod mp3;
pub mod mp4;
pub mod ogg;
pub mod utils;
pub mod wav;

use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, warn};

pub use config::ReadOptions;
pub use decoder::{StandardTagDecoder, TagDecoder};
pub use error::{Error, IdentifyError, Result};
pub use identify::{identify, identify_with, ContainerType, Id3v2Version, Mp4Brand, TagFormat};
pub use metadata::{AudioMetadata, Metadata, Picture, Raw, TagFields};

use utils::io::{peek, stream_len};

/// Read the metadata of any supported container with the bundled decoder
/// and default options
pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<AudioMetadata> {
    let options = ReadOptions::default();
    read_from_with(reader, &StandardTagDecoder::with_options(options.clone()), &options)
}

/// Read the metadata of any supported container.
///
/// The stream is read from its start regardless of the current position.
pub fn read_from_with<R, D>(reader: &mut R, decoder: &D, options: &ReadOptions) -> Result<AudioMetadata>
where
    R: Read + Seek,
    D: TagDecoder + ?Sized,
{
    reader.seek(SeekFrom::Start(0))?;
    if peek(reader, 4)?.as_slice() == dsf::DSF_SIGNATURE {
        return Ok(dsf::read_dsf(reader, decoder)?.into());
    }

    let (format, container) = match identify_with(reader, options) {
        Ok(found) => found,
        Err(e) if e.container == ContainerType::Wav => {
            // no trailing tag after the audio is still a valid WAV
            debug!(error = %e.source, "WAV without trailing tag");
            (TagFormat::Unknown, ContainerType::Wav)
        }
        Err(e) => return Err(e.into()),
    };

    reader.seek(SeekFrom::Start(0))?;
    let metadata: AudioMetadata = match container {
        ContainerType::Flac => flac::read_flac(reader, decoder)?.into(),
        ContainerType::Ogg => ogg::read_ogg(reader, decoder)?.into(),
        ContainerType::Wav => wav::read_wav(reader, decoder)?.into(),
        ContainerType::Dsf => dsf::read_dsf(reader, decoder)?.into(),
        ContainerType::Mp4(_) => mp4::read_mp4(reader, decoder)?.into(),
        ContainerType::Mp3 => {
            let size = stream_len(reader)?;
            match format {
                TagFormat::Id3v2(_) => mp3::read_id3v2_mp3(reader, decoder, size)?.into(),
                TagFormat::Id3v1 => mp3::read_id3v1_mp3(reader, decoder, size)?.into(),
                other => {
                    return Err(Error::UnsupportedFormat(format!("MP3 with {} tags", other)));
                }
            }
        }
        ContainerType::Unknown => {
            warn!(%format, "identified a tag format without a container");
            return Err(Error::NoTagsFound);
        }
    };

    debug!(format = %metadata.format(), container = %metadata.file_type(), "read metadata");
    Ok(metadata)
}
