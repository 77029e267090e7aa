// Metadata model shared by all containers
//
// Each container reader produces its own struct implementing `Metadata`;
// `AudioMetadata` is the closed set of them returned by the dispatcher.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Serialize, Serializer};
use tracing::trace;

use crate::dsf::DsfMetadata;
use crate::field_mapping::{StandardField, ValueConverter};
use crate::flac::FlacMetadata;
use crate::identify::{ContainerType, TagFormat};
use crate::mp3::Mp3Metadata;
use crate::mp4::Mp4Metadata;
use crate::ogg::OggMetadata;
use crate::wav::WavMetadata;

/// Container-specific technical values (sample rate, bit depth, ...) and raw
/// tag entries, for machine inspection
pub type Raw = BTreeMap<String, serde_json::Value>;

/// Embedded picture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Picture {
    pub mime_type: String,
    /// File extension implied by the MIME type
    pub ext: String,
    pub picture_type: String,
    pub description: String,
    #[serde(serialize_with = "serialize_base64")]
    pub data: Vec<u8>,
}

impl Picture {
    pub fn new(mime_type: String, picture_type: String, description: String, data: Vec<u8>) -> Self {
        let ext = extension_for(&mime_type).to_string();
        Picture {
            mime_type,
            ext,
            picture_type,
            description,
            data,
        }
    }
}

/// Get file extension based on MIME type
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" | "jpg" => "jpg",
        "image/png" | "png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        _ => "",
    }
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}

/// Picture type names shared by ID3v2 APIC frames and FLAC picture blocks
pub fn picture_type_name(index: u32) -> &'static str {
    match index {
        1 => "File Icon",
        2 => "Other File Icon",
        3 => "Cover (front)",
        4 => "Cover (back)",
        5 => "Leaflet page",
        6 => "Media",
        7 => "Lead artist",
        8 => "Artist",
        9 => "Conductor",
        10 => "Band",
        11 => "Composer",
        12 => "Lyricist",
        13 => "Recording Location",
        14 => "During recording",
        15 => "During performance",
        16 => "Video screen capture",
        17 => "Bright coloured fish",
        18 => "Illustration",
        19 => "Band logo",
        20 => "Publisher logo",
        _ => "Other",
    }
}

/// Fields produced by a tag decoder
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagFields {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub album_artist: String,
    pub composer: String,
    pub genre: String,
    pub comment: String,
    pub lyrics: String,
    pub year: i32,
    pub track: (u32, u32),
    pub disc: (u32, u32),
    pub picture: Option<Picture>,
    pub raw: Raw,
}

impl TagFields {
    /// Store a textual value for a standard field. Empty values are ignored.
    pub fn set(&mut self, field: StandardField, value: &str) {
        let value = value.trim_end_matches('\0');
        if value.is_empty() {
            return;
        }
        trace!(field = field.as_str(), value, "tag field");
        match field {
            StandardField::Title => self.title = value.to_string(),
            StandardField::Artist => self.artist = value.to_string(),
            StandardField::Album => self.album = value.to_string(),
            StandardField::AlbumArtist => self.album_artist = value.to_string(),
            StandardField::Composer => self.composer = value.to_string(),
            StandardField::Genre => self.genre = value.to_string(),
            StandardField::Comment => self.comment = value.to_string(),
            StandardField::Lyrics => self.lyrics = value.to_string(),
            StandardField::Year => {
                if let Some(year) = ValueConverter::parse_year(value) {
                    self.year = year;
                }
            }
            StandardField::Track => set_position(&mut self.track, value),
            StandardField::Disc => set_position(&mut self.disc, value),
            StandardField::TrackTotal => {
                if let Ok(total) = value.trim().parse() {
                    self.track.1 = total;
                }
            }
            StandardField::DiscTotal => {
                if let Ok(total) = value.trim().parse() {
                    self.disc.1 = total;
                }
            }
            // Pictures arrive as binary and are stored directly
            StandardField::Cover => {}
        }
    }
}

fn set_position(position: &mut (u32, u32), value: &str) {
    let (number, total) = ValueConverter::parse_position(value);
    position.0 = number;
    if total != 0 {
        position.1 = total;
    }
}

/// Queryable metadata common to every container.
///
/// Containers that cannot express a field return its zero value.
pub trait Metadata {
    /// Tag dialect
    fn format(&self) -> TagFormat;

    /// Container
    fn file_type(&self) -> ContainerType;

    /// Playback duration, zero when unknown
    fn duration(&self) -> Duration;

    /// Technical fields read from the container itself
    fn technical(&self) -> Raw;

    /// Decoded tag fields, if the container carried a tag
    fn tags(&self) -> Option<&TagFields> {
        None
    }

    fn title(&self) -> &str {
        self.tags().map_or("", |t| t.title.as_str())
    }

    fn album(&self) -> &str {
        self.tags().map_or("", |t| t.album.as_str())
    }

    fn artist(&self) -> &str {
        self.tags().map_or("", |t| t.artist.as_str())
    }

    fn album_artist(&self) -> &str {
        self.tags().map_or("", |t| t.album_artist.as_str())
    }

    fn composer(&self) -> &str {
        self.tags().map_or("", |t| t.composer.as_str())
    }

    fn genre(&self) -> &str {
        self.tags().map_or("", |t| t.genre.as_str())
    }

    fn comment(&self) -> &str {
        self.tags().map_or("", |t| t.comment.as_str())
    }

    fn lyrics(&self) -> &str {
        self.tags().map_or("", |t| t.lyrics.as_str())
    }

    fn year(&self) -> i32 {
        self.tags().map_or(0, |t| t.year)
    }

    /// (number, total)
    fn track(&self) -> (u32, u32) {
        self.tags().map_or((0, 0), |t| t.track)
    }

    /// (number, total)
    fn disc(&self) -> (u32, u32) {
        self.tags().map_or((0, 0), |t| t.disc)
    }

    fn picture(&self) -> Option<&Picture> {
        self.tags().and_then(|t| t.picture.as_ref())
    }

    /// Raw tag entries merged with the technical fields (technical wins)
    fn raw(&self) -> Raw {
        let mut raw = self.tags().map(|t| t.raw.clone()).unwrap_or_default();
        raw.extend(self.technical());
        raw
    }
}

/// Metadata for any supported container
#[derive(Debug, Clone, PartialEq)]
pub enum AudioMetadata {
    Mp3(Mp3Metadata),
    Flac(FlacMetadata),
    Ogg(OggMetadata),
    Mp4(Mp4Metadata),
    Wav(WavMetadata),
    Dsf(DsfMetadata),
}

impl AudioMetadata {
    fn inner(&self) -> &dyn Metadata {
        match self {
            AudioMetadata::Mp3(m) => m,
            AudioMetadata::Flac(m) => m,
            AudioMetadata::Ogg(m) => m,
            AudioMetadata::Mp4(m) => m,
            AudioMetadata::Wav(m) => m,
            AudioMetadata::Dsf(m) => m,
        }
    }
}

impl Metadata for AudioMetadata {
    fn format(&self) -> TagFormat {
        self.inner().format()
    }

    fn file_type(&self) -> ContainerType {
        self.inner().file_type()
    }

    fn duration(&self) -> Duration {
        self.inner().duration()
    }

    fn technical(&self) -> Raw {
        self.inner().technical()
    }

    fn tags(&self) -> Option<&TagFields> {
        self.inner().tags()
    }
}

macro_rules! impl_from_metadata {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AudioMetadata {
                fn from(m: $ty) -> Self {
                    AudioMetadata::$variant(m)
                }
            }
        )*
    };
}

impl_from_metadata! {
    Mp3 => Mp3Metadata,
    Flac => FlacMetadata,
    Ogg => OggMetadata,
    Mp4 => Mp4Metadata,
    Wav => WavMetadata,
    Dsf => DsfMetadata,
}

/// Convert a sample count to a duration without losing sub-second precision.
/// A zero rate yields a zero (unknown) duration.
pub(crate) fn samples_to_duration(samples: u64, rate: u64) -> Duration {
    if rate == 0 {
        return Duration::ZERO;
    }
    let nanos = samples as u128 * 1_000_000_000 / rate as u128;
    let secs = (nanos / 1_000_000_000).min(u64::MAX as u128) as u64;
    Duration::new(secs, (nanos % 1_000_000_000) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_fields() {
        let mut tags = TagFields::default();
        tags.set(StandardField::Title, "Song\0");
        tags.set(StandardField::Year, "2003-04-01");
        tags.set(StandardField::Track, "4/12");
        tags.set(StandardField::Disc, "2");
        tags.set(StandardField::DiscTotal, "3");
        tags.set(StandardField::Artist, "");
        assert_eq!(tags.title, "Song");
        assert_eq!(tags.year, 2003);
        assert_eq!(tags.track, (4, 12));
        assert_eq!(tags.disc, (2, 3));
        assert!(tags.artist.is_empty());
    }

    #[test]
    fn test_picture_serializes_base64() {
        let picture = Picture::new("image/png".into(), "Cover (front)".into(), String::new(), vec![1, 2, 3]);
        assert_eq!(picture.ext, "png");
        let value = serde_json::to_value(&picture).unwrap();
        assert_eq!(value["data"], "AQID");
        assert_eq!(value["mime_type"], "image/png");
    }

    #[test]
    fn test_samples_to_duration() {
        assert_eq!(samples_to_duration(44100 * 3, 44100), Duration::from_secs(3));
        assert_eq!(samples_to_duration(22050, 44100), Duration::from_millis(500));
        assert_eq!(samples_to_duration(1000, 0), Duration::ZERO);
    }

    struct Bare;

    impl Metadata for Bare {
        fn format(&self) -> TagFormat {
            TagFormat::Unknown
        }
        fn file_type(&self) -> ContainerType {
            ContainerType::Unknown
        }
        fn duration(&self) -> Duration {
            Duration::ZERO
        }
        fn technical(&self) -> Raw {
            Raw::new()
        }
    }

    #[test]
    fn test_missing_tags_return_zero_values() {
        let m = Bare;
        assert_eq!(m.title(), "");
        assert_eq!(m.year(), 0);
        assert_eq!(m.track(), (0, 0));
        assert!(m.picture().is_none());
        assert!(m.raw().is_empty());
    }
}
