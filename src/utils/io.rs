// Byte and bit level primitives used by every container parser

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use crate::config::DEFAULT_MAX_UPFRONT_READ;
use crate::error::{Error, Result};

/// Read exactly `n` bytes using the default up-front allocation cap
pub fn read_bytes<R: Read + ?Sized>(reader: &mut R, n: usize) -> Result<Vec<u8>> {
    read_bytes_capped(reader, n, DEFAULT_MAX_UPFRONT_READ)
}

/// Read exactly `n` bytes.
///
/// Requests above `cap` grow the buffer as data actually arrives, so a corrupt
/// length field cannot force one huge allocation.
pub fn read_bytes_capped<R: Read + ?Sized>(reader: &mut R, n: usize, cap: usize) -> Result<Vec<u8>> {
    if n > cap {
        let mut buffer = Vec::with_capacity(cap);
        let read = (&mut *reader).take(n as u64).read_to_end(&mut buffer)?;
        if read != n {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("expected {} bytes, got {}", n, read),
            )));
        }
        return Ok(buffer);
    }

    let mut buffer = vec![0u8; n];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Read a fixed-size array
pub fn read_array<R: Read + ?Sized, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buffer = [0u8; N];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Fill `buffer` completely, or return `Ok(false)` if the stream was already
/// exhausted before the first byte. A partial fill is an `UnexpectedEof` error.
pub fn read_exact_or_eof<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(Error::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("stream ended after {} of {} bytes", filled, buffer.len()),
                )))
            }
            Ok(read) => filled += read,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Read `n` bytes as text, for magic-string comparison
pub fn read_string<R: Read + ?Sized>(reader: &mut R, n: usize) -> Result<String> {
    let bytes = read_bytes(reader, n)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read big-endian 16-bit integer
pub fn read_be_u16<R: Read + ?Sized>(reader: &mut R) -> Result<u16> {
    Ok(u16::from_be_bytes(read_array(reader)?))
}

/// Read big-endian 24-bit integer
pub fn read_be_u24<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let [a, b, c] = read_array::<_, 3>(reader)?;
    Ok(u32::from_be_bytes([0, a, b, c]))
}

/// Read big-endian 32-bit integer
pub fn read_be_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    Ok(u32::from_be_bytes(read_array(reader)?))
}

/// Read big-endian 64-bit integer
pub fn read_be_u64<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    Ok(u64::from_be_bytes(read_array(reader)?))
}

/// Read little-endian 16-bit integer
pub fn read_le_u16<R: Read + ?Sized>(reader: &mut R) -> Result<u16> {
    Ok(u16::from_le_bytes(read_array(reader)?))
}

/// Read little-endian 32-bit integer
pub fn read_le_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array(reader)?))
}

/// Read little-endian 64-bit integer
pub fn read_le_u64<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array(reader)?))
}

/// Move the cursor `n` bytes forward (or backward when negative)
pub fn skip<R: Seek + ?Sized>(reader: &mut R, n: i64) -> Result<u64> {
    Ok(reader.seek(SeekFrom::Current(n))?)
}

/// Read `n` bytes and restore the cursor
pub fn peek<R: Read + Seek + ?Sized>(reader: &mut R, n: usize) -> Result<Vec<u8>> {
    let pos = reader.stream_position()?;
    let bytes = read_bytes(reader, n);
    reader.seek(SeekFrom::Start(pos))?;
    bytes
}

/// Total stream length, leaving the cursor where it was
pub fn stream_len<R: Seek + ?Sized>(reader: &mut R) -> Result<u64> {
    let pos = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    if pos != len {
        reader.seek(SeekFrom::Start(pos))?;
    }
    Ok(len)
}

/// Extract `width` bits starting `offset` bits into `data`, most significant
/// bit first.
pub fn cut_bits(data: &[u8], offset: usize, width: usize) -> Result<u64> {
    if width > 64 {
        return Err(Error::InvalidArgument(format!(
            "bit width {} exceeds 64",
            width
        )));
    }
    let end = offset
        .checked_add(width)
        .ok_or_else(|| Error::InvalidArgument("bit range overflows".to_string()))?;
    if end > data.len() * 8 {
        return Err(Error::InvalidArgument(format!(
            "bit range {}..{} out of bounds for {} bytes",
            offset,
            end,
            data.len()
        )));
    }
    if width == 0 {
        return Ok(0);
    }

    // At most 9 bytes cover any 64-bit span, which fits in a u128.
    let first = offset / 8;
    let last = (end - 1) / 8;
    let mut acc: u128 = 0;
    for &byte in &data[first..=last] {
        acc = (acc << 8) | byte as u128;
    }
    let trailing = (last + 1) * 8 - end;
    let mask = if width == 64 { u64::MAX as u128 } else { (1u128 << width) - 1 };
    Ok(((acc >> trailing) & mask) as u64)
}

/// Decode a big-endian base-128 (synchsafe) integer
pub fn get_7bit_chunked_value(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, &b| (acc << 7) | (b & 0x7f) as u64)
}

/// Decode a big-endian base-256 integer
pub fn get_chunked_value(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // Reference big-endian bit packer.
    fn put_bits(data: &mut [u8], offset: usize, width: usize, value: u64) {
        for i in 0..width {
            let bit = (value >> (width - 1 - i)) & 1;
            let pos = offset + i;
            let mask = 0x80u8 >> (pos % 8);
            if bit == 1 {
                data[pos / 8] |= mask;
            } else {
                data[pos / 8] &= !mask;
            }
        }
    }

    #[test]
    fn test_cut_bits_round_trip() {
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        for width in 1..=64usize {
            for offset in [0usize, 1, 3, 7, 8, 13, 21] {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let value = if width == 64 { seed } else { seed & ((1u64 << width) - 1) };
                let mut data = vec![0xa5u8; 12];
                put_bits(&mut data, offset, width, value);
                assert_eq!(cut_bits(&data, offset, width).unwrap(), value, "width {} offset {}", width, offset);
            }
        }
    }

    #[test]
    fn test_cut_bits_bounds() {
        let data = [0xffu8; 4];
        assert!(matches!(cut_bits(&data, 0, 65), Err(Error::InvalidArgument(_))));
        assert!(matches!(cut_bits(&data, 30, 3), Err(Error::InvalidArgument(_))));
        assert_eq!(cut_bits(&data, 32, 0).unwrap(), 0);
        assert_eq!(cut_bits(&data, 29, 3).unwrap(), 0b111);
    }

    #[test]
    fn test_cut_bits_known_values() {
        // MPEG-1 layer III header: 0xFFFB9064
        let header = [0xff, 0xfb, 0x90, 0x64];
        assert_eq!(cut_bits(&header, 11, 2).unwrap(), 3);
        assert_eq!(cut_bits(&header, 13, 2).unwrap(), 1);
        assert_eq!(cut_bits(&header, 15, 1).unwrap(), 1);
        assert_eq!(cut_bits(&header, 16, 4).unwrap(), 9);
    }

    #[test]
    fn test_chunked_values() {
        assert_eq!(get_7bit_chunked_value(&[0x00, 0x00, 0x02, 0x01]), 257);
        assert_eq!(get_7bit_chunked_value(&[0x7f, 0x7f]), 0x3fff);
        assert_eq!(get_chunked_value(&[0x01, 0x00]), 256);
        assert_eq!(get_chunked_value(&[0x12, 0x34, 0x56]), 0x123456);
    }

    #[test]
    fn test_fixed_width_reads() {
        let mut cursor = Cursor::new(vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(read_le_u16(&mut cursor).unwrap(), 0x0201);
        assert_eq!(read_be_u16(&mut cursor).unwrap(), 0x0304);
        assert_eq!(read_le_u32(&mut cursor).unwrap(), 0x0807_0605);
        assert!(read_be_u32(&mut cursor).unwrap_err().is_eof());

        let mut cursor = Cursor::new(vec![1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(read_le_u64(&mut cursor).unwrap(), 1);
        let mut cursor = Cursor::new(vec![0, 0, 0, 0, 0, 0, 0, 1, 0xab, 0xcd, 0xef]);
        assert_eq!(read_be_u64(&mut cursor).unwrap(), 1);
        assert_eq!(read_be_u24(&mut cursor).unwrap(), 0xabcdef);
    }

    #[test]
    fn test_read_bytes_incremental_above_cap() {
        let data: Vec<u8> = (0..100u8).collect();
        let mut cursor = Cursor::new(data.clone());
        assert_eq!(read_bytes_capped(&mut cursor, 100, 16).unwrap(), data);

        let mut short = Cursor::new(vec![0u8; 10]);
        assert!(read_bytes_capped(&mut short, 40, 16).unwrap_err().is_eof());
    }

    #[test]
    fn test_read_exact_or_eof() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 2];
        assert!(read_exact_or_eof(&mut cursor, &mut buf).unwrap());
        assert!(read_exact_or_eof(&mut cursor, &mut buf).unwrap_err().is_eof());

        let mut empty = Cursor::new(Vec::new());
        assert!(!read_exact_or_eof(&mut empty, &mut buf).unwrap());
    }

    #[test]
    fn test_peek_restores_cursor() {
        let mut cursor = Cursor::new(b"fLaC....".to_vec());
        skip(&mut cursor, 1).unwrap();
        assert_eq!(peek(&mut cursor, 3).unwrap(), b"LaC");
        assert_eq!(cursor.position(), 1);
        assert_eq!(stream_len(&mut cursor).unwrap(), 8);
        assert_eq!(cursor.position(), 1);
        assert_eq!(read_string(&mut cursor, 3).unwrap(), "LaC");
    }
}
