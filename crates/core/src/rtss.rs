//! Frame-rate-overlay segment (`RTSSSharedMemoryV2`) layout and decoder.
//!
//! The overlay publishes one application record per hooked process. Only
//! one frame rate is reported per cycle: the active record with the highest
//! frame rate, which in practice is the foreground game rather than the
//! overlay's own helper windows.

use crate::error::DecodeError;
use crate::layout::{read_fixed, FixedRecord, FixedText, SegmentCursor};
use crate::metric_names::{RTSS_FPS, RTSS_FRAMETIME_MS};
use crate::metrics::{truncate, MetricMap};

/// `'RTSS'` read as a little-endian `u32`.
pub const RTSS_SIGNATURE: u32 = 0x5353_5452;

/// Capacity of the application name buffer.
pub const APP_NAME_CAPACITY: usize = 260;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtssHeader {
    pub signature: u32,
    pub version: u32,
    pub header_size: u32,
    pub app_entry_size: u32,
    pub app_array_offset: u32,
    pub app_array_size: u32,
    pub osd_entry_offset: u32,
    pub osd_entry_size: u32,
    pub busy: u32,
}

impl FixedRecord for RtssHeader {
    const SIZE: usize = 36;

    fn read(cursor: &mut SegmentCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            signature: cursor.read_u32()?,
            version: cursor.read_u32()?,
            header_size: cursor.read_u32()?,
            app_entry_size: cursor.read_u32()?,
            app_array_offset: cursor.read_u32()?,
            app_array_size: cursor.read_u32()?,
            osd_entry_offset: cursor.read_u32()?,
            osd_entry_size: cursor.read_u32()?,
            busy: cursor.read_u32()?,
        })
    }
}

impl RtssHeader {
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.signature != RTSS_SIGNATURE {
            return Err(DecodeError::MalformedHeader(format!(
                "signature {:#010x}, expected {RTSS_SIGNATURE:#010x}",
                self.signature
            )));
        }
        if self.app_entry_size == 0 || self.app_array_size == 0 {
            return Err(DecodeError::MalformedHeader(format!(
                "app_entry_size={} app_array_size={}",
                self.app_entry_size, self.app_array_size
            )));
        }
        if (self.app_entry_size as usize) < RtssAppEntry::SIZE {
            return Err(DecodeError::MalformedHeader(format!(
                "app_entry_size={} is smaller than an application record ({} bytes)",
                self.app_entry_size,
                RtssAppEntry::SIZE
            )));
        }
        Ok(())
    }

    /// Offsets of every application slot that fits inside the declared array.
    pub fn app_offsets(&self) -> impl Iterator<Item = u64> {
        let start = u64::from(self.app_array_offset);
        let end = start + u64::from(self.app_array_size);
        let step = u64::from(self.app_entry_size);
        (0..)
            .map(move |i: u64| start + i * step)
            .take_while(move |&pos| pos + step <= end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RtssAppEntry {
    pub process_id: u32,
    pub name: FixedText<APP_NAME_CAPACITY>,
    pub flags: u32,
    pub frame: u32,
    pub frame_rate: f32,
    pub frame_time: f32,
}

impl FixedRecord for RtssAppEntry {
    const SIZE: usize = 4 + APP_NAME_CAPACITY + 4 * 4;

    fn read(cursor: &mut SegmentCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            process_id: cursor.read_u32()?,
            name: cursor.read_text()?,
            flags: cursor.read_u32()?,
            frame: cursor.read_u32()?,
            frame_rate: cursor.read_f32()?,
            frame_time: cursor.read_f32()?,
        })
    }
}

impl RtssAppEntry {
    /// Slots with a zero process id are unused.
    pub fn is_active(&self) -> bool {
        self.process_id != 0
    }
}

/// Walk the application array and pick the active entry with the highest
/// frame rate. Ties keep the earlier entry. `None` if no active entry has a
/// positive frame rate.
pub fn select_foreground_app(bytes: &[u8]) -> Result<Option<RtssAppEntry>, DecodeError> {
    let header: RtssHeader = read_fixed(bytes, 0)?;
    header.validate()?;

    let mut best: Option<RtssAppEntry> = None;
    for offset in header.app_offsets() {
        let entry: RtssAppEntry = read_fixed(bytes, offset)?;
        if !entry.is_active() {
            continue;
        }

        let best_rate = best.as_ref().map_or(0.0, |b| b.frame_rate);
        if entry.frame_rate > best_rate {
            best = Some(entry);
        }
    }

    Ok(best)
}

/// Bytes from the start of the segment to the end of the application
/// array, read from a copy holding at least the header. The OSD buffers
/// that follow are never needed.
pub fn required_len(header_bytes: &[u8]) -> Result<u64, DecodeError> {
    let header: RtssHeader = read_fixed(header_bytes, 0)?;
    header.validate()?;
    Ok(u64::from(header.app_array_offset) + u64::from(header.app_array_size))
}

/// Decode a frame-overlay segment snapshot into `rtss_fps` and
/// `rtss_frametime_ms`. An empty map means no application is rendering.
pub fn decode_segment(bytes: &[u8]) -> Result<MetricMap, DecodeError> {
    let mut metrics = MetricMap::new();

    if let Some(app) = select_foreground_app(bytes)? {
        metrics.set(RTSS_FPS, truncate(app.frame_rate));
        if app.frame_time > 0.0 {
            metrics.set(RTSS_FRAMETIME_MS, truncate(app.frame_time));
        }
    }

    Ok(metrics)
}
