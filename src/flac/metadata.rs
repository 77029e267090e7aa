// FLAC metadata block implementation

use std::io::Read;

use crate::error::{Error, Result};
use crate::utils::io::{cut_bits, read_array};

/// FLAC metadata block types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlacMetadataBlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    CueSheet,
    Picture,
    /// Reserved or invalid type, skipped by length
    Other(u8),
}

impl FlacMetadataBlockType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => FlacMetadataBlockType::StreamInfo,
            1 => FlacMetadataBlockType::Padding,
            2 => FlacMetadataBlockType::Application,
            3 => FlacMetadataBlockType::SeekTable,
            4 => FlacMetadataBlockType::VorbisComment,
            5 => FlacMetadataBlockType::CueSheet,
            6 => FlacMetadataBlockType::Picture,
            other => FlacMetadataBlockType::Other(other),
        }
    }
}

/// FLAC metadata block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlacMetadataBlockHeader {
    pub is_last: bool,
    pub block_type: FlacMetadataBlockType,
    pub length: u32,
}

impl FlacMetadataBlockHeader {
    pub const HEADER_SIZE: usize = 4;

    /// Read FLAC metadata block header from reader
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let buffer: [u8; Self::HEADER_SIZE] = read_array(reader)?;

        let is_last = (buffer[0] & 0x80) != 0;
        let block_type = FlacMetadataBlockType::from_byte(buffer[0] & 0x7F);

        // Length is big-endian 24-bit
        let length = u32::from_be_bytes([0, buffer[1], buffer[2], buffer[3]]);

        Ok(FlacMetadataBlockHeader {
            is_last,
            block_type,
            length,
        })
    }
}

/// Fields of the STREAMINFO block used for duration and technical data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    pub total_samples: u64,
}

impl StreamInfo {
    /// STREAMINFO is 34 bytes
    pub const SIZE: usize = 34;

    /// Parse the STREAMINFO payload.
    ///
    /// Bit layout after the 80 bits of block/frame size limits: sample rate
    /// (20), channels - 1 (3), bits per sample - 1 (5), total samples (36).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::InvalidArgument(format!(
                "STREAMINFO block is {} bytes, expected {}",
                data.len(),
                Self::SIZE
            )));
        }
        Ok(StreamInfo {
            sample_rate: cut_bits(data, 80, 20)? as u32,
            channels: cut_bits(data, 100, 3)? as u8 + 1,
            bits_per_sample: cut_bits(data, 103, 5)? as u8 + 1,
            total_samples: cut_bits(data, 108, 36)?,
        })
    }
}

/// FLAC file signature
pub const FLAC_SIGNATURE: &[u8; 4] = b"fLaC";

/// Build a STREAMINFO payload
#[cfg(test)]
pub(crate) fn stream_info_block(sample_rate: u32, channels: u8, bits: u8, total_samples: u64) -> Vec<u8> {
    let mut data = vec![0u8; StreamInfo::SIZE];
    data[0..2].copy_from_slice(&4096u16.to_be_bytes());
    data[2..4].copy_from_slice(&4096u16.to_be_bytes());
    let packed: u64 = (sample_rate as u64) << 44
        | ((channels as u64 - 1) << 41)
        | ((bits as u64 - 1) << 36)
        | total_samples;
    data[10..18].copy_from_slice(&packed.to_be_bytes());
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_header() {
        let header = FlacMetadataBlockHeader::read(&mut &[0x84u8, 0x00, 0x01, 0x02][..]).unwrap();
        assert!(header.is_last);
        assert_eq!(header.block_type, FlacMetadataBlockType::VorbisComment);
        assert_eq!(header.length, 0x0102);

        let header = FlacMetadataBlockHeader::read(&mut &[0x09u8, 0, 0, 0][..]).unwrap();
        assert!(!header.is_last);
        assert_eq!(header.block_type, FlacMetadataBlockType::Other(9));
    }

    #[test]
    fn test_stream_info() {
        let info = StreamInfo::parse(&stream_info_block(44100, 2, 16, 441000)).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.total_samples, 441000);
    }

    #[test]
    fn test_stream_info_too_short() {
        assert!(matches!(StreamInfo::parse(&[0u8; 12]), Err(Error::InvalidArgument(_))));
    }
}
