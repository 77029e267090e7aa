// FLAC PICTURE block implementation

use std::io::Read;

use crate::error::Result;
use crate::metadata::{picture_type_name, Picture};
use crate::utils::io::{read_be_u32, read_bytes_capped};

/// FLAC PICTURE block structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlacPicture {
    pub picture_type: u32,
    pub mime_type: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub colors: u32,
    pub data: Vec<u8>,
}

impl FlacPicture {
    /// Read a PICTURE block payload; all integers are big-endian
    pub fn read<R: Read + ?Sized>(reader: &mut R, cap: usize) -> Result<Self> {
        let picture_type = read_be_u32(reader)?;

        let mime_length = read_be_u32(reader)? as usize;
        let mime_type = String::from_utf8_lossy(&read_bytes_capped(reader, mime_length, cap)?).into_owned();

        let desc_length = read_be_u32(reader)? as usize;
        let description = String::from_utf8_lossy(&read_bytes_capped(reader, desc_length, cap)?).into_owned();

        let width = read_be_u32(reader)?;
        let height = read_be_u32(reader)?;
        let depth = read_be_u32(reader)?;
        let colors = read_be_u32(reader)?;

        let data_length = read_be_u32(reader)? as usize;
        let data = read_bytes_capped(reader, data_length, cap)?;

        Ok(FlacPicture {
            picture_type,
            mime_type,
            description,
            width,
            height,
            depth,
            colors,
            data,
        })
    }

    pub fn into_picture(self) -> Picture {
        Picture::new(
            self.mime_type,
            picture_type_name(self.picture_type).to_string(),
            self.description,
            self.data,
        )
    }
}

/// Build a PICTURE block payload
#[cfg(test)]
pub(crate) fn picture_block(picture_type: u32, mime: &str, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&picture_type.to_be_bytes());
    out.extend_from_slice(&(mime.len() as u32).to_be_bytes());
    out.extend_from_slice(mime.as_bytes());
    out.extend_from_slice(&4u32.to_be_bytes());
    out.extend_from_slice(b"desc");
    for value in [600u32, 600, 24, 0] {
        out.extend_from_slice(&value.to_be_bytes());
    }
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
    out
}
