// OGG page parsing and packet reassembly

use std::collections::HashMap;
use std::io::Read;

use tracing::trace;

use super::crc;
use super::{OGG_HEADER_TYPE_CONTINUATION, OGG_SIGNATURE};
use crate::error::{Error, Result};
use crate::utils::io::{read_bytes, read_exact_or_eof};

/// OGG Page Header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPageHeader {
    pub version: u8,
    pub header_type: u8,
    pub granule_position: u64,
    pub bitstream_serial: u32,
    pub page_sequence: u32,
    pub crc: u32,
    pub segment_table: Vec<u8>,
}

impl OggPageHeader {
    /// Fixed part of the header, before the segment table
    pub const FIXED_SIZE: usize = 27;

    /// Read a page header. `Ok(None)` means the stream ended cleanly at a
    /// page boundary.
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Self>> {
        let mut header = [0u8; Self::FIXED_SIZE];
        if !read_exact_or_eof(reader, &mut header)? {
            return Ok(None);
        }
        Self::parse(&header, reader).map(Some)
    }

    fn parse<R: Read + ?Sized>(header: &[u8; Self::FIXED_SIZE], reader: &mut R) -> Result<Self> {
        if &header[0..4] != OGG_SIGNATURE {
            return Err(Error::mismatch("OggS", &header[0..4]));
        }

        let le32 = |at: usize| u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]]);
        let mut granule = [0u8; 8];
        granule.copy_from_slice(&header[6..14]);

        let segment_table = read_bytes(reader, header[26] as usize)?;

        Ok(OggPageHeader {
            version: header[4],
            header_type: header[5],
            granule_position: u64::from_le_bytes(granule),
            bitstream_serial: le32(14),
            page_sequence: le32(18),
            crc: le32(22),
            segment_table,
        })
    }

    /// Calculate total page data size from segment table
    pub fn data_size(&self) -> usize {
        self.segment_table.iter().map(|&x| x as usize).sum()
    }

    /// The first packet on this page continues one from an earlier page
    pub fn is_continuation(&self) -> bool {
        self.header_type & OGG_HEADER_TYPE_CONTINUATION != 0
    }

    /// Checksum over the header (CRC field zeroed), segment table and data
    pub fn compute_crc(&self, data: &[u8]) -> u32 {
        let mut fixed = [0u8; Self::FIXED_SIZE];
        fixed[0..4].copy_from_slice(OGG_SIGNATURE);
        fixed[4] = self.version;
        fixed[5] = self.header_type;
        fixed[6..14].copy_from_slice(&self.granule_position.to_le_bytes());
        fixed[14..18].copy_from_slice(&self.bitstream_serial.to_le_bytes());
        fixed[18..22].copy_from_slice(&self.page_sequence.to_le_bytes());
        fixed[26] = self.segment_table.len() as u8;

        let crc = crc::update(0, &fixed);
        let crc = crc::update(crc, &self.segment_table);
        crc::update(crc, data)
    }
}

/// Packets completed by one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxedPage {
    pub packets: Vec<Vec<u8>>,
    pub granule_position: u64,
    pub serial: u32,
}

/// Demuxing session for one physical stream.
///
/// Holds the unfinished packet of every logical stream (by serial number)
/// between pages; create a new one per stream.
#[derive(Debug, Default)]
pub struct OggDemuxer {
    pending: HashMap<u32, Vec<u8>>,
}

impl OggDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one page and return the packets it completes.
    ///
    /// A page carrying only part of a packet yields an empty packet list.
    /// `Ok(None)` at end of stream.
    pub fn read_page<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<Option<DemuxedPage>> {
        let Some(header) = OggPageHeader::read(reader)? else {
            return Ok(None);
        };
        let data = read_bytes(reader, header.data_size())?;

        let computed = header.compute_crc(&data);
        if computed != header.crc {
            return Err(Error::ChecksumMismatch {
                stored: header.crc,
                computed,
            });
        }

        let serial = header.bitstream_serial;
        let mut packet = if header.is_continuation() {
            self.pending
                .remove(&serial)
                .ok_or(Error::OrphanedContinuation { serial })?
        } else {
            if let Some(dropped) = self.pending.remove(&serial).filter(|p| !p.is_empty()) {
                trace!(serial, bytes = dropped.len(), "discarding unfinished packet");
            }
            Vec::new()
        };

        let mut packets = Vec::new();
        let mut offset = 0;
        for &segment in &header.segment_table {
            let end = offset + segment as usize;
            packet.extend_from_slice(&data[offset..end]);
            offset = end;
            // a segment shorter than 255 bytes ends the packet
            if segment < 255 {
                packets.push(std::mem::take(&mut packet));
            }
        }
        self.pending.insert(serial, packet);

        trace!(
            serial,
            sequence = header.page_sequence,
            granule = header.granule_position,
            packets = packets.len(),
            "OGG page"
        );
        Ok(Some(DemuxedPage {
            packets,
            granule_position: header.granule_position,
            serial,
        }))
    }
}

/// Build one page with a valid checksum; `lacing` is its segment table
#[cfg(test)]
pub(crate) fn build_page(header_type: u8, granule: u64, serial: u32, sequence: u32, lacing: &[u8], payload: &[u8]) -> Vec<u8> {
    let header = OggPageHeader {
        version: 0,
        header_type,
        granule_position: granule,
        bitstream_serial: serial,
        page_sequence: sequence,
        crc: 0,
        segment_table: lacing.to_vec(),
    };
    let crc = header.compute_crc(payload);

    let mut page = OGG_SIGNATURE.to_vec();
    page.push(0);
    page.push(header_type);
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&serial.to_le_bytes());
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&crc.to_le_bytes());
    page.push(lacing.len() as u8);
    page.extend_from_slice(lacing);
    page.extend_from_slice(payload);
    page
}

/// Segment table for one whole packet of `len` bytes
#[cfg(test)]
pub(crate) fn lacing(len: usize) -> Vec<u8> {
    let mut table = vec![255u8; len / 255];
    table.push((len % 255) as u8);
    table
}
