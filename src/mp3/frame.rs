// MPEG audio frame header decoding
//
// Only the first frame is decoded; the stream is assumed to be constant
// bitrate, so its size and duration stand for every frame.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::utils::io::cut_bits;

/// Bitrates in kbps by [version][layer][index]; version and layer use the
/// header's raw 2-bit codes (version 0 = MPEG 2.5, 1 = reserved, 2 = MPEG 2,
/// 3 = MPEG 1; layer 0 = reserved, 1 = III, 2 = II, 3 = I)
static BITRATES: [[[u32; 15]; 4]; 4] = [
    [
        [0; 15],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    ],
    [[0; 15]; 4],
    [
        [0; 15],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    ],
    [
        [0; 15],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
        [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    ],
];

/// Sample rates in Hz by [version][index]
static SAMPLE_RATES: [[u32; 3]; 4] = [
    [11025, 12000, 8000],
    [0, 0, 0],
    [22050, 24000, 16000],
    [44100, 48000, 32000],
];

/// Samples per frame by [version][layer]
static SAMPLES_PER_FRAME: [[u32; 4]; 4] = [
    [0, 576, 1152, 384],
    [0, 0, 0, 0],
    [0, 576, 1152, 384],
    [0, 1152, 1152, 384],
];

/// Padding slot size in bytes by layer
static SLOT_SIZE: [u32; 4] = [0, 1, 1, 4];

const VERSION_RESERVED: usize = 1;
const LAYER_RESERVED: usize = 0;
const HEADER_SIZE: f64 = 4.0;

/// Decoded first-frame parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    /// Raw 2-bit version code
    pub version: u8,
    /// Raw 2-bit layer code
    pub layer: u8,
    pub protection: bool,
    pub padding: bool,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub samples_per_frame: u32,
}

impl FrameHeader {
    /// Decode the fields at bit offsets 11 (version), 13 (layer),
    /// 15 (protection), 16 (bitrate index), 20 (sample rate index) and
    /// 21 (padding) of a 4-byte header.
    pub fn parse(header: &[u8]) -> Result<Self> {
        let version = cut_bits(header, 11, 2)? as usize;
        let layer = cut_bits(header, 13, 2)? as usize;
        let protection = cut_bits(header, 15, 1)? == 1;
        let bitrate_index = cut_bits(header, 16, 4)? as usize;
        let sample_rate_index = cut_bits(header, 20, 2)? as usize;
        let padding = cut_bits(header, 21, 1)? == 1;

        if version == VERSION_RESERVED {
            return Err(Error::UnsupportedFormat("reserved MPEG version".to_string()));
        }
        if layer == LAYER_RESERVED {
            return Err(Error::UnsupportedFormat("reserved MPEG layer".to_string()));
        }
        let sample_rate = *SAMPLE_RATES[version]
            .get(sample_rate_index)
            .ok_or_else(|| Error::UnsupportedFormat("reserved MPEG sample rate index".to_string()))?;
        let bitrate_kbps = match BITRATES[version][layer].get(bitrate_index) {
            Some(&0) => return Err(Error::UnsupportedFormat("free-format MPEG bitrate".to_string())),
            Some(&kbps) => kbps,
            None => return Err(Error::UnsupportedFormat("invalid MPEG bitrate index".to_string())),
        };

        Ok(FrameHeader {
            version: version as u8,
            layer: layer as u8,
            protection,
            padding,
            bitrate_kbps,
            sample_rate,
            samples_per_frame: SAMPLES_PER_FRAME[version][layer],
        })
    }

    /// Playback time of one frame, in seconds
    pub fn frame_duration(&self) -> f64 {
        self.samples_per_frame as f64 / self.sample_rate as f64
    }

    /// Bytes per frame including the 4-byte header. The protection bit adds
    /// two bytes when set.
    pub fn frame_size(&self) -> f64 {
        let mut size = (self.frame_duration() * self.bitrate_kbps as f64 * 1000.0 / 8.0).floor();
        if self.padding {
            size += SLOT_SIZE[self.layer as usize] as f64;
        }
        if self.protection {
            size += 2.0;
        }
        size + HEADER_SIZE
    }

    /// "1", "2" or "2.5"
    pub fn version_name(&self) -> &'static str {
        match self.version {
            0 => "2.5",
            2 => "2",
            _ => "1",
        }
    }

    /// Layer number: 1, 2 or 3
    pub fn layer_number(&self) -> u8 {
        4 - self.layer
    }

    /// Duration of `stripped` audio bytes, rounded to whole seconds
    pub fn duration(&self, stripped: u64) -> Duration {
        let seconds = (stripped as f64 / self.frame_size() * self.frame_duration()).round();
        Duration::from_secs(seconds as u64)
    }
}

/// Duration of a constant-bitrate stream from its first frame header and
/// the number of bytes outside any tag
pub fn compute_duration(header: &[u8], stripped: u64) -> Result<Duration> {
    Ok(FrameHeader::parse(header)?.duration(stripped))
}

#[cfg(test)]
mod tests {
    use super::*;

    // MPEG-1 layer III, no CRC flag, 128 kbps, 44.1 kHz
    const MPEG1_L3_128: [u8; 4] = [0xff, 0xfa, 0x90, 0x64];

    #[test]
    fn test_parse_mpeg1_layer3() {
        let frame = FrameHeader::parse(&MPEG1_L3_128).unwrap();
        assert_eq!(frame.bitrate_kbps, 128);
        assert_eq!(frame.sample_rate, 44100);
        assert_eq!(frame.samples_per_frame, 1152);
        assert!(!frame.protection);
        assert!(!frame.padding);
        assert_eq!(frame.frame_size(), 421.0);
        assert_eq!(frame.version_name(), "1");
        assert_eq!(frame.layer_number(), 3);
    }

    #[test]
    fn test_hundred_frames() {
        // 100 * 1152 / 44100 = 2.61s, rounded
        assert_eq!(compute_duration(&MPEG1_L3_128, 100 * 421).unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn test_protection_bit_adds_two_bytes() {
        let frame = FrameHeader::parse(&[0xff, 0xfb, 0x90, 0x64]).unwrap();
        assert!(frame.protection);
        assert_eq!(frame.frame_size(), 423.0);
    }

    #[test]
    fn test_mpeg2_layer3() {
        // version 2, layer III, bitrate index 8 (64 kbps), 22.05 kHz
        let frame = FrameHeader::parse(&[0xff, 0xf2, 0x80, 0x00]).unwrap();
        assert_eq!(frame.version_name(), "2");
        assert_eq!(frame.bitrate_kbps, 64);
        assert_eq!(frame.sample_rate, 22050);
        assert_eq!(frame.samples_per_frame, 576);
        // floor(576 / 22050 * 64000 / 8) = 208, plus the header
        assert_eq!(frame.frame_size(), 212.0);
    }

    #[test]
    fn test_padding_bit_shares_rate_index() {
        // 48 kHz sets the low bit of the rate index, which is also read as padding
        let frame = FrameHeader::parse(&[0xff, 0xfe, 0x14, 0x00]).unwrap();
        assert_eq!(frame.layer_number(), 1);
        assert_eq!(frame.sample_rate, 48000);
        assert!(frame.padding);
        // floor(384 / 48000 * 32000 / 8) = 32, + 4-byte slot + header
        assert_eq!(frame.frame_size(), 40.0);
    }

    #[test]
    fn test_reserved_values_rejected() {
        let reserved = [
            [0xff, 0xea, 0x90, 0x00], // version 01
            [0xff, 0xf8, 0x90, 0x00], // layer 00
            [0xff, 0xfa, 0x9c, 0x00], // sample rate index 3
            [0xff, 0xfa, 0xf0, 0x00], // bitrate index 15
            [0xff, 0xfa, 0x00, 0x00], // free format
        ];
        for header in reserved {
            assert!(
                matches!(FrameHeader::parse(&header), Err(Error::UnsupportedFormat(_))),
                "{:02x?}",
                header
            );
        }
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(compute_duration(&[0xff, 0xfa], 1000), Err(Error::InvalidArgument(_))));
    }
}
