// ID3v2 frame decoding into standard fields

use serde_json::Value;

use super::v2::Id3Frame;
use crate::field_mapping::{FieldMappings, StandardField, ValueConverter};
use crate::metadata::{picture_type_name, Picture, TagFields};
use crate::utils::encoding::{decode_text, split_terminated, TextEncoding};

/// Index of the front cover in APIC/PIC picture types
const COVER_FRONT: u8 = 3;

/// Decode the frames of one tag into fields
pub fn frames_to_fields(frames: &[Id3Frame]) -> TagFields {
    let mut fields = TagFields::default();
    let mut picture_type: Option<u8> = None;

    for frame in frames {
        let id = frame.frame_id.as_str();
        let data = frame.data.as_slice();

        match id {
            "TXXX" | "TXX" => {
                if let Some((description, value)) = decode_user_text(data) {
                    fields.raw.insert(format!("{}:{}", id, description), Value::from(value));
                }
            }
            "COMM" | "COM" | "USLT" | "ULT" => {
                if let Some((description, text)) = decode_comment(data) {
                    let key = if description.is_empty() {
                        id.to_string()
                    } else {
                        format!("{}:{}", id, description)
                    };
                    if let Some(field) = FieldMappings::from_id3v2(id) {
                        // The description-less comment is the canonical one
                        let current = match field {
                            StandardField::Lyrics => &fields.lyrics,
                            _ => &fields.comment,
                        };
                        if current.is_empty() || description.is_empty() {
                            fields.set(field, &text);
                        }
                    }
                    fields.raw.insert(key, Value::from(text));
                }
            }
            "APIC" | "PIC" => {
                if let Some((kind, picture)) = decode_picture(data, id == "PIC") {
                    // Keep the front cover if there is one, else the first picture
                    let replace = match picture_type {
                        None => true,
                        Some(current) => current != COVER_FRONT && kind == COVER_FRONT,
                    };
                    if replace {
                        picture_type = Some(kind);
                        fields.picture = Some(picture);
                    }
                }
            }
            _ if id.starts_with('T') => {
                let text = decode_text_frame(data);
                if let Some(field) = FieldMappings::from_id3v2(id) {
                    let value = if field == StandardField::Genre {
                        ValueConverter::resolve_genre(&text)
                    } else {
                        text.clone()
                    };
                    fields.set(field, &value);
                }
                fields.raw.insert(id.to_string(), Value::from(text));
            }
            _ => {}
        }
    }

    fields
}

/// Decode text frame data; only the first of several NUL-separated values is kept
pub fn decode_text_frame(data: &[u8]) -> String {
    let Some((&encoding, text)) = data.split_first() else {
        return String::new();
    };
    let encoding = TextEncoding::from_byte(encoding);
    let (first, _) = split_terminated(text, encoding);
    decode_text(first, encoding)
}

/// TXXX: encoding, description, value
fn decode_user_text(data: &[u8]) -> Option<(String, String)> {
    let (&encoding, rest) = data.split_first()?;
    let encoding = TextEncoding::from_byte(encoding);
    let (description, value) = split_terminated(rest, encoding);
    Some((decode_text(description, encoding), decode_text(value, encoding)))
}

/// COMM/USLT: encoding, 3-byte language, description, text
fn decode_comment(data: &[u8]) -> Option<(String, String)> {
    if data.len() < 4 {
        return None;
    }
    let encoding = TextEncoding::from_byte(data[0]);
    let (description, text) = split_terminated(&data[4..], encoding);
    Some((decode_text(description, encoding), decode_text(text, encoding)))
}

/// APIC: encoding, MIME type, picture type, description, data.
/// PIC (ID3v2.2) has a 3-character image format instead of a MIME type.
fn decode_picture(data: &[u8], v22: bool) -> Option<(u8, Picture)> {
    let (&encoding, rest) = data.split_first()?;
    let encoding = TextEncoding::from_byte(encoding);

    let (mime_type, rest) = if v22 {
        if rest.len() < 3 {
            return None;
        }
        let mime = match &rest[..3] {
            b"JPG" | b"jpg" => "image/jpeg".to_string(),
            b"PNG" | b"png" => "image/png".to_string(),
            other => String::from_utf8_lossy(other).into_owned(),
        };
        (mime, &rest[3..])
    } else {
        let (mime, rest) = split_terminated(rest, TextEncoding::Iso8859_1);
        (decode_text(mime, TextEncoding::Iso8859_1), rest)
    };

    let (&kind, rest) = rest.split_first()?;
    let (description, image) = split_terminated(rest, encoding);
    let picture = Picture::new(
        mime_type,
        picture_type_name(kind as u32).to_string(),
        decode_text(description, encoding),
        image.to_vec(),
    );
    Some((kind, picture))
}
