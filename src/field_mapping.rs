// Unified metadata field mapping
//
// Each tag dialect names the same fields differently:
// - ID3v2.3/2.4: four-character frame IDs (TIT2, TPE1, TALB, ...)
// - ID3v2.2: three-character frame IDs (TT2, TP1, TAL, ...)
// - Vorbis comments: case-insensitive keys (TITLE, ARTIST, ALBUM, ...)
// - MP4: iTunes item atoms (©nam, ©ART, ©alb, ...)
//
// This module maps all of them onto one set of standard fields.

/// Standard metadata fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardField {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Composer,
    Year,
    Track,
    TrackTotal,
    Disc,
    DiscTotal,
    Genre,
    Comment,
    Lyrics,
    Cover,
}

impl StandardField {
    /// Get standard field name (lowercase)
    pub fn as_str(&self) -> &'static str {
        match self {
            StandardField::Title => "title",
            StandardField::Artist => "artist",
            StandardField::Album => "album",
            StandardField::AlbumArtist => "album_artist",
            StandardField::Composer => "composer",
            StandardField::Year => "year",
            StandardField::Track => "track",
            StandardField::TrackTotal => "track_total",
            StandardField::Disc => "disc",
            StandardField::DiscTotal => "disc_total",
            StandardField::Genre => "genre",
            StandardField::Comment => "comment",
            StandardField::Lyrics => "lyrics",
            StandardField::Cover => "cover",
        }
    }
}

/// Format-specific field mappings
pub struct FieldMappings;

impl FieldMappings {
    /// Convert an ID3v2 frame ID (either generation) to a standard field
    pub fn from_id3v2(frame_id: &str) -> Option<StandardField> {
        match frame_id {
            "TIT2" | "TT2" => Some(StandardField::Title),
            "TPE1" | "TP1" => Some(StandardField::Artist),
            "TALB" | "TAL" => Some(StandardField::Album),
            "TPE2" | "TP2" => Some(StandardField::AlbumArtist),
            "TCOM" | "TCM" => Some(StandardField::Composer),
            "TDRC" | "TYER" | "TYE" => Some(StandardField::Year),
            "TRCK" | "TRK" => Some(StandardField::Track),
            "TPOS" | "TPA" => Some(StandardField::Disc),
            "TCON" | "TCO" => Some(StandardField::Genre),
            "COMM" | "COM" => Some(StandardField::Comment),
            "USLT" | "ULT" => Some(StandardField::Lyrics),
            "APIC" | "PIC" => Some(StandardField::Cover),
            _ => None,
        }
    }

    /// Convert a Vorbis comment key to a standard field
    pub fn from_vorbis(key: &str) -> Option<StandardField> {
        match key.to_ascii_uppercase().as_str() {
            "TITLE" => Some(StandardField::Title),
            "ARTIST" => Some(StandardField::Artist),
            "ALBUM" => Some(StandardField::Album),
            "ALBUMARTIST" | "ALBUM ARTIST" => Some(StandardField::AlbumArtist),
            "COMPOSER" => Some(StandardField::Composer),
            "DATE" | "YEAR" => Some(StandardField::Year),
            "TRACKNUMBER" => Some(StandardField::Track),
            "TRACKTOTAL" | "TOTALTRACKS" => Some(StandardField::TrackTotal),
            "DISCNUMBER" => Some(StandardField::Disc),
            "DISCTOTAL" | "TOTALDISCS" => Some(StandardField::DiscTotal),
            "GENRE" => Some(StandardField::Genre),
            "COMMENT" | "DESCRIPTION" => Some(StandardField::Comment),
            "LYRICS" | "UNSYNCEDLYRICS" => Some(StandardField::Lyrics),
            "METADATA_BLOCK_PICTURE" => Some(StandardField::Cover),
            _ => None,
        }
    }

    /// Convert an MP4 item atom name to a standard field
    pub fn from_mp4(atom: &[u8; 4]) -> Option<StandardField> {
        match atom {
            b"\xA9nam" => Some(StandardField::Title),
            b"\xA9ART" => Some(StandardField::Artist),
            b"\xA9alb" => Some(StandardField::Album),
            b"aART" => Some(StandardField::AlbumArtist),
            b"\xA9wrt" => Some(StandardField::Composer),
            b"\xA9day" => Some(StandardField::Year),
            b"trkn" => Some(StandardField::Track),
            b"disk" => Some(StandardField::Disc),
            b"\xA9gen" | b"gnre" => Some(StandardField::Genre),
            b"\xA9cmt" => Some(StandardField::Comment),
            b"\xA9lyr" => Some(StandardField::Lyrics),
            b"covr" => Some(StandardField::Cover),
            _ => None,
        }
    }
}

/// Metadata value converter for handling format-specific value formats
pub struct ValueConverter;

impl ValueConverter {
    /// Extract the year from a date such as "2024-01-15" or "2024"
    pub fn parse_year(value: &str) -> Option<i32> {
        let digits: String = value.trim().chars().take(4).collect();
        if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
            digits.parse().ok()
        } else {
            None
        }
    }

    /// Split a position such as "3/12" into (3, 12); missing parts are 0
    pub fn parse_position(value: &str) -> (u32, u32) {
        let mut parts = value.trim().splitn(2, '/');
        let number = parts.next().and_then(|n| n.trim().parse().ok()).unwrap_or(0);
        let total = parts.next().and_then(|t| t.trim().parse().ok()).unwrap_or(0);
        (number, total)
    }

    /// Resolve an ID3 genre, which may be a numeric reference such as "(17)",
    /// "17" or "(17)Rock"
    pub fn resolve_genre(value: &str) -> String {
        let value = value.trim();
        if let Some(rest) = value.strip_prefix('(') {
            if let Some((index, refinement)) = rest.split_once(')') {
                if !refinement.is_empty() {
                    return refinement.to_string();
                }
                if let Some(name) = index.parse().ok().and_then(Self::id3v1_genre) {
                    return name.to_string();
                }
            }
        }
        if let Some(name) = value.parse().ok().and_then(Self::id3v1_genre) {
            return name.to_string();
        }
        value.to_string()
    }

    /// Name of an ID3v1 genre index
    pub fn id3v1_genre(index: u8) -> Option<&'static str> {
        ID3V1_GENRES.get(index as usize).copied()
    }
}

const ID3V1_GENRES: [&str; 80] = [
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge", "Hip-Hop",
    "Jazz", "Metal", "New Age", "Oldies", "Other", "Pop", "R&B", "Rap",
    "Reggae", "Rock", "Techno", "Industrial", "Alternative", "Ska", "Death Metal", "Pranks",
    "Soundtrack", "Euro-Techno", "Ambient", "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance",
    "Classical", "Instrumental", "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise",
    "AlternRock", "Bass", "Soul", "Punk", "Space", "Meditative", "Instrumental Pop", "Instrumental Rock",
    "Ethnic", "Gothic", "Darkwave", "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream",
    "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40", "Christian Rap", "Pop/Funk", "Jungle",
    "Native American", "Cabaret", "New Wave", "Psychadelic", "Rave", "Showtunes", "Trailer", "Lo-Fi",
    "Tribal", "Acid Punk", "Acid Jazz", "Polka", "Retro", "Musical", "Rock & Roll", "Hard Rock",
];
