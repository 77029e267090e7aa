// iTunes-style item list (`ilst`) decoding
//
// Each child of `ilst` is an item atom named by its key (©nam, trkn, ...)
// holding one or more `data` atoms: type indicator (4), locale (4), value.
// Freeform items (`----`) add `mean` and `name` atoms before the data.

use std::io::Read;

use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::field_mapping::{FieldMappings, StandardField, ValueConverter};
use crate::metadata::{picture_type_name, Picture, TagFields};
use crate::utils::encoding::{decode_text, TextEncoding};

// data atom type indicators
const TYPE_UTF8: u32 = 1;
const TYPE_UTF16: u32 = 2;
const TYPE_JPEG: u32 = 13;
const TYPE_PNG: u32 = 14;
const TYPE_INTEGER: u32 = 21;
const TYPE_BMP: u32 = 27;

/// Iterates over the atoms packed in a byte slice
pub struct Atoms<'a> {
    data: &'a [u8],
}

impl<'a> Atoms<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Atoms { data }
    }
}

impl<'a> Iterator for Atoms<'a> {
    type Item = ([u8; 4], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < 8 {
            return None;
        }
        let kind = [self.data[4], self.data[5], self.data[6], self.data[7]];
        let (header, size) = match u32::from_be_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]) {
            0 => (8, self.data.len()),
            1 if self.data.len() >= 16 => {
                let mut large = [0u8; 8];
                large.copy_from_slice(&self.data[8..16]);
                (16, usize::try_from(u64::from_be_bytes(large)).unwrap_or(usize::MAX))
            }
            1 => (16, usize::MAX),
            n => (8, n as usize),
        };
        if size < header || size > self.data.len() {
            warn!(kind = ?String::from_utf8_lossy(&kind), size, "malformed atom in item list");
            self.data = &[];
            return None;
        }
        let payload = &self.data[header..size];
        self.data = &self.data[size..];
        Some((kind, payload))
    }
}

/// One `data` atom
struct DataValue<'a> {
    kind: u32,
    value: &'a [u8],
}

fn data_values(item: &[u8]) -> impl Iterator<Item = DataValue<'_>> {
    Atoms::new(item).filter_map(|(kind, payload)| {
        if &kind != b"data" || payload.len() < 8 {
            return None;
        }
        Some(DataValue {
            // the top byte is the version, always 0
            kind: u32::from_be_bytes([0, payload[1], payload[2], payload[3]]),
            value: &payload[8..],
        })
    })
}

/// Decode the children of an `ilst` atom; `reader` must be bounded to it
pub fn decode_items<R: Read + ?Sized>(reader: &mut R) -> Result<TagFields> {
    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;
    Ok(items_to_fields(&body))
}

fn items_to_fields(body: &[u8]) -> TagFields {
    let mut fields = TagFields::default();

    for (kind, item) in Atoms::new(body) {
        if &kind == b"----" {
            read_freeform(item, &mut fields);
            continue;
        }
        let key = decode_text(&kind, TextEncoding::Iso8859_1);

        for data in data_values(item) {
            match FieldMappings::from_mp4(&kind) {
                Some(StandardField::Track) => {
                    if let Some(position) = read_position(data.value) {
                        fields.track = position;
                        fields.raw.insert(key.clone(), Value::from(vec![position.0, position.1]));
                    }
                }
                Some(StandardField::Disc) => {
                    if let Some(position) = read_position(data.value) {
                        fields.disc = position;
                        fields.raw.insert(key.clone(), Value::from(vec![position.0, position.1]));
                    }
                }
                Some(StandardField::Cover) => {
                    if fields.picture.is_none() {
                        fields.picture = Some(read_cover(data.kind, data.value));
                    }
                }
                Some(StandardField::Genre) if data.kind != TYPE_UTF8 => {
                    // gnre: 1-based ID3v1 genre index
                    if data.value.len() >= 2 {
                        let index = u16::from_be_bytes([data.value[0], data.value[1]]);
                        let name = index
                            .checked_sub(1)
                            .and_then(|i| u8::try_from(i).ok())
                            .and_then(ValueConverter::id3v1_genre);
                        if let Some(name) = name {
                            fields.genre = name.to_string();
                        }
                        fields.raw.insert(key.clone(), Value::from(index));
                    }
                }
                field => {
                    if let Some(value) = data_to_value(&data) {
                        if let (Some(field), Value::String(text)) = (field, &value) {
                            fields.set(field, text);
                        }
                        fields.raw.insert(key.clone(), value);
                    }
                }
            }
        }
    }

    fields
}

/// `----` items: reverse-DNS `mean`, `name`, then `data`
fn read_freeform(item: &[u8], fields: &mut TagFields) {
    let mut name = None;
    for (kind, payload) in Atoms::new(item) {
        if &kind == b"name" && payload.len() >= 4 {
            // version and flags precede the name
            name = Some(String::from_utf8_lossy(&payload[4..]).into_owned());
        }
    }
    let Some(name) = name else {
        return;
    };
    if let Some(value) = data_values(item).find_map(|data| data_to_value(&data)) {
        fields.raw.insert(name, value);
    }
}

/// trkn/disk: reserved (2), number (2), total (2)
fn read_position(value: &[u8]) -> Option<(u32, u32)> {
    if value.len() < 6 {
        return None;
    }
    let number = u16::from_be_bytes([value[2], value[3]]) as u32;
    let total = u16::from_be_bytes([value[4], value[5]]) as u32;
    Some((number, total))
}

fn read_cover(kind: u32, value: &[u8]) -> Picture {
    let mime = match kind {
        TYPE_PNG => "image/png",
        TYPE_BMP => "image/bmp",
        TYPE_JPEG => "image/jpeg",
        // untyped covers are almost always JPEG
        _ if value.starts_with(b"\x89PNG") => "image/png",
        _ => "image/jpeg",
    };
    Picture::new(mime.to_string(), picture_type_name(3).to_string(), String::new(), value.to_vec())
}

fn data_to_value(data: &DataValue<'_>) -> Option<Value> {
    match data.kind {
        TYPE_UTF8 => Some(Value::from(String::from_utf8_lossy(data.value).into_owned())),
        TYPE_UTF16 => Some(Value::from(decode_text(data.value, TextEncoding::Utf16BE))),
        TYPE_INTEGER | 0 => {
            let v = data.value;
            let n = match v.len() {
                1 => v[0] as i8 as i64,
                2 => i16::from_be_bytes([v[0], v[1]]) as i64,
                4 => i32::from_be_bytes([v[0], v[1], v[2], v[3]]) as i64,
                8 => i64::from_be_bytes([v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]]),
                _ => return None,
            };
            Some(Value::from(n))
        }
        _ => None,
    }
}

/// Build an item atom holding one `data` atom
#[cfg(test)]
pub(crate) fn item(kind: &[u8; 4], data_type: u32, value: &[u8]) -> Vec<u8> {
    let mut data = ((16 + value.len()) as u32).to_be_bytes().to_vec();
    data.extend_from_slice(b"data");
    data.extend_from_slice(&data_type.to_be_bytes());
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(value);

    let mut out = ((8 + data.len()) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_positions() {
        let mut body = item(b"\xA9nam", TYPE_UTF8, "Caf\u{e9}".as_bytes());
        body.extend(item(b"\xA9ART", TYPE_UTF8, b"Artist"));
        body.extend(item(b"\xA9day", TYPE_UTF8, b"2015-06-01T07:00:00Z"));
        body.extend(item(b"trkn", 0, &[0, 0, 0, 4, 0, 11, 0, 0]));
        body.extend(item(b"disk", 0, &[0, 0, 0, 1, 0, 2]));
        body.extend(item(b"gnre", 0, &[0, 18]));
        body.extend(item(b"tmpo", TYPE_INTEGER, &[0, 120]));

        let fields = decode_items(&mut body.as_slice()).unwrap();
        assert_eq!(fields.title, "Café");
        assert_eq!(fields.artist, "Artist");
        assert_eq!(fields.year, 2015);
        assert_eq!(fields.track, (4, 11));
        assert_eq!(fields.disc, (1, 2));
        assert_eq!(fields.genre, "Rock");
        assert_eq!(fields.raw["tmpo"], 120);
        assert_eq!(fields.raw["©nam"], "Café");
    }

    #[test]
    fn test_cover_and_freeform() {
        let mut body = item(b"covr", TYPE_PNG, b"\x89PNGdata");

        let mut freeform = Vec::new();
        freeform.extend_from_slice(&28u32.to_be_bytes());
        freeform.extend_from_slice(b"mean\0\0\0\0com.apple.iTunes");
        freeform.extend_from_slice(&20u32.to_be_bytes());
        freeform.extend_from_slice(b"name\0\0\0\0iTunSMPB");
        let data = item(b"xxxx", TYPE_UTF8, b" 00000000");
        freeform.extend_from_slice(&data[8..]);
        let mut atom = ((8 + freeform.len()) as u32).to_be_bytes().to_vec();
        atom.extend_from_slice(b"----");
        atom.extend(freeform);
        body.extend(atom);

        let fields = items_to_fields(&body);
        let picture = fields.picture.unwrap();
        assert_eq!(picture.mime_type, "image/png");
        assert_eq!(picture.data, b"\x89PNGdata");
        assert_eq!(fields.raw["iTunSMPB"], " 00000000");
    }

    #[test]
    fn test_malformed_atom_stops() {
        let mut body = item(b"\xA9nam", TYPE_UTF8, b"ok");
        body.extend_from_slice(&[0, 0, 0, 0x40, b'\xA9', b'a', b'l', b'b', 1, 2]);
        let fields = items_to_fields(&body);
        assert_eq!(fields.title, "ok");
        assert!(fields.album.is_empty());
    }
}
