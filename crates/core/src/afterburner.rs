//! GPU-monitoring segment (`MAHMSharedMemory`) layout and decoder.
//!
//! The segment is a header followed by `entry_count` sensor records spaced
//! `entry_size` bytes apart starting at `header_size`. Each record carries
//! a sensor name and unit as fixed 260-byte text buffers, the current
//! reading and the index of the GPU it belongs to.

use encoding_rs::Encoding;

use crate::classify::classify;
use crate::error::DecodeError;
use crate::layout::{read_fixed, FixedRecord, FixedText, SegmentCursor};
use crate::metrics::MetricMap;

/// `'MHAM'` read as a little-endian `u32`.
pub const MAHM_SIGNATURE: u32 = 0x4D41_484D;

/// Capacity of every text field in a sensor record.
pub const TEXT_CAPACITY: usize = 260;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MahmHeader {
    pub signature: u32,
    pub version: u32,
    pub header_size: u32,
    pub entry_count: u32,
    pub entry_size: u32,
    pub time: i32,
    pub gpu_count: u32,
    pub gpu_entry_size: u32,
}

impl FixedRecord for MahmHeader {
    const SIZE: usize = 32;

    fn read(cursor: &mut SegmentCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            signature: cursor.read_u32()?,
            version: cursor.read_u32()?,
            header_size: cursor.read_u32()?,
            entry_count: cursor.read_u32()?,
            entry_size: cursor.read_u32()?,
            time: cursor.read_i32()?,
            gpu_count: cursor.read_u32()?,
            gpu_entry_size: cursor.read_u32()?,
        })
    }
}

impl MahmHeader {
    /// Reject headers that cannot describe a readable entry array.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.signature != MAHM_SIGNATURE {
            return Err(DecodeError::MalformedHeader(format!(
                "signature {:#010x}, expected {MAHM_SIGNATURE:#010x}",
                self.signature
            )));
        }
        if self.entry_count == 0 || self.entry_size == 0 {
            return Err(DecodeError::MalformedHeader(format!(
                "entry_count={} entry_size={}",
                self.entry_count, self.entry_size
            )));
        }
        if (self.entry_size as usize) < MahmEntry::SIZE {
            return Err(DecodeError::MalformedHeader(format!(
                "entry_size={} is smaller than a sensor record ({} bytes)",
                self.entry_size,
                MahmEntry::SIZE
            )));
        }
        Ok(())
    }

    /// Byte offset of entry `index`.
    pub fn entry_offset(&self, index: u32) -> u64 {
        u64::from(self.header_size) + u64::from(index) * u64::from(self.entry_size)
    }

    /// One past the last byte the declared entry array covers.
    pub fn array_end(&self) -> u64 {
        self.entry_offset(self.entry_count)
    }
}

/// One sensor record.
#[derive(Debug, Clone, PartialEq)]
pub struct MahmEntry {
    pub name: FixedText<TEXT_CAPACITY>,
    pub units: FixedText<TEXT_CAPACITY>,
    pub local_name: FixedText<TEXT_CAPACITY>,
    pub local_units: FixedText<TEXT_CAPACITY>,
    pub format: FixedText<TEXT_CAPACITY>,
    pub data: f32,
    pub min_limit: f32,
    pub max_limit: f32,
    pub flags: u32,
    pub gpu: u32,
}

impl FixedRecord for MahmEntry {
    const SIZE: usize = 5 * TEXT_CAPACITY + 5 * 4;

    fn read(cursor: &mut SegmentCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: cursor.read_text()?,
            units: cursor.read_text()?,
            local_name: cursor.read_text()?,
            local_units: cursor.read_text()?,
            format: cursor.read_text()?,
            data: cursor.read_f32()?,
            min_limit: cursor.read_f32()?,
            max_limit: cursor.read_f32()?,
            flags: cursor.read_u32()?,
            gpu: cursor.read_u32()?,
        })
    }
}

/// A decoded sensor reading, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub name: String,
    pub unit: String,
    pub value: f32,
    pub gpu_index: u32,
}

/// Validate the header and walk the entry array.
///
/// Entries whose name is empty or whitespace are skipped. Any read past
/// the end of `bytes` fails the whole walk.
pub fn read_readings(bytes: &[u8], legacy: &'static Encoding) -> Result<Vec<RawReading>, DecodeError> {
    let header: MahmHeader = read_fixed(bytes, 0)?;
    header.validate()?;

    let array_end = header.array_end();
    if array_end > bytes.len() as u64 {
        return Err(DecodeError::OutOfBounds {
            offset: u64::from(header.header_size),
            size: usize::try_from(array_end - u64::from(header.header_size)).unwrap_or(usize::MAX),
            len: bytes.len(),
        });
    }

    let mut readings = Vec::with_capacity(header.entry_count as usize);
    for index in 0..header.entry_count {
        let entry: MahmEntry = read_fixed(bytes, header.entry_offset(index))?;

        let name = entry.name.to_text_with(legacy);
        if name.trim().is_empty() {
            continue;
        }

        readings.push(RawReading {
            name,
            unit: entry.units.to_text_with(legacy),
            value: entry.data,
            gpu_index: entry.gpu,
        });
    }

    Ok(readings)
}

/// Bytes from the start of the segment to the end of the declared entry
/// array, read from a copy holding at least the header.
pub fn required_len(header_bytes: &[u8]) -> Result<u64, DecodeError> {
    let header: MahmHeader = read_fixed(header_bytes, 0)?;
    header.validate()?;
    Ok(header.array_end())
}

/// Decode a GPU-monitoring segment snapshot into canonical metrics.
pub fn decode_segment(bytes: &[u8], legacy: &'static Encoding) -> Result<MetricMap, DecodeError> {
    let mut metrics = MetricMap::new();
    for reading in read_readings(bytes, legacy)? {
        for metric in classify(&reading.name, &reading.unit, reading.value, reading.gpu_index) {
            metrics.apply(metric);
        }
    }
    Ok(metrics)
}
