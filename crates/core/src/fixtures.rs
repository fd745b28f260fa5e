//! Synthetic segment images for tests.
//!
//! Builders emit the same packed little-endian layout the producers
//! publish. Header fields default to a well-formed segment and can be
//! overridden individually to produce malformed ones.

use crate::afterburner::{MahmEntry, MahmHeader, MAHM_SIGNATURE, TEXT_CAPACITY};
use crate::layout::{FixedRecord, FixedText};
use crate::rtss::{RtssAppEntry, RtssHeader, APP_NAME_CAPACITY, RTSS_SIGNATURE};

/// One sensor record for [`MahmSegment`].
#[derive(Debug, Clone)]
pub struct Sensor {
    pub name: Vec<u8>,
    pub units: Vec<u8>,
    pub value: f32,
    pub gpu: u32,
}

impl Sensor {
    pub fn new(name: &str, units: &str, value: f32, gpu: u32) -> Self {
        Self::from_raw(name.as_bytes(), units.as_bytes(), value, gpu)
    }

    /// Sensor whose text fields are arbitrary bytes, e.g. not UTF-8.
    pub fn from_raw(name: &[u8], units: &[u8], value: f32, gpu: u32) -> Self {
        Self {
            name: name.to_vec(),
            units: units.to_vec(),
            value,
            gpu,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MahmSegment {
    pub signature: u32,
    pub header_size: u32,
    pub entry_size: u32,
    /// Declared count; defaults to the number of sensors.
    pub entry_count: Option<u32>,
    pub sensors: Vec<Sensor>,
}

impl Default for MahmSegment {
    fn default() -> Self {
        Self {
            signature: MAHM_SIGNATURE,
            header_size: MahmHeader::SIZE as u32,
            entry_size: MahmEntry::SIZE as u32,
            entry_count: None,
            sensors: Vec::new(),
        }
    }
}

impl MahmSegment {
    pub fn with_sensor(mut self, sensor: Sensor) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let count = self
            .entry_count
            .unwrap_or(self.sensors.len() as u32);

        let mut out = Vec::new();
        for field in [
            self.signature,
            2, // version
            self.header_size,
            count,
            self.entry_size,
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(&0i32.to_le_bytes()); // time
        out.extend_from_slice(&1u32.to_le_bytes()); // gpu_count
        out.extend_from_slice(&0u32.to_le_bytes()); // gpu_entry_size

        for (index, sensor) in self.sensors.iter().enumerate() {
            let offset = self.header_size as usize + index * self.entry_size as usize;
            write_at(&mut out, offset, &encode_sensor(sensor));
        }

        let declared_end = self.header_size as usize + self.sensors.len() * self.entry_size as usize;
        if out.len() < declared_end {
            out.resize(declared_end, 0);
        }
        out
    }
}

fn encode_sensor(sensor: &Sensor) -> Vec<u8> {
    let mut out = Vec::with_capacity(MahmEntry::SIZE);
    out.extend_from_slice(FixedText::<TEXT_CAPACITY>::from_slice(&sensor.name).as_bytes());
    out.extend_from_slice(FixedText::<TEXT_CAPACITY>::from_slice(&sensor.units).as_bytes());
    for _ in 0..3 {
        // local name, local units, format
        out.extend_from_slice(&[0u8; TEXT_CAPACITY]);
    }
    out.extend_from_slice(&sensor.value.to_le_bytes());
    out.extend_from_slice(&0f32.to_le_bytes()); // min limit
    out.extend_from_slice(&100f32.to_le_bytes()); // max limit
    out.extend_from_slice(&0u32.to_le_bytes()); // flags
    out.extend_from_slice(&sensor.gpu.to_le_bytes());
    out
}

/// One application record for [`RtssSegment`].
#[derive(Debug, Clone)]
pub struct RtssApp {
    pub process_id: u32,
    pub name: String,
    pub frame_rate: f32,
    pub frame_time: f32,
}

impl RtssApp {
    pub fn new(process_id: u32, name: &str, frame_rate: f32, frame_time: f32) -> Self {
        Self {
            process_id,
            name: name.to_owned(),
            frame_rate,
            frame_time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RtssSegment {
    pub signature: u32,
    pub app_entry_size: u32,
    pub app_array_offset: u32,
    /// Declared array size in bytes; defaults to `apps.len() * app_entry_size`.
    pub app_array_size: Option<u32>,
    pub apps: Vec<RtssApp>,
}

impl Default for RtssSegment {
    fn default() -> Self {
        Self {
            signature: RTSS_SIGNATURE,
            app_entry_size: RtssAppEntry::SIZE as u32,
            app_array_offset: RtssHeader::SIZE as u32,
            app_array_size: None,
            apps: Vec::new(),
        }
    }
}

impl RtssSegment {
    pub fn with_app(mut self, app: RtssApp) -> Self {
        self.apps.push(app);
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let array_size = self
            .app_array_size
            .unwrap_or(self.apps.len() as u32 * self.app_entry_size);

        let mut out = Vec::new();
        for field in [
            self.signature,
            2, // version
            RtssHeader::SIZE as u32,
            self.app_entry_size,
            self.app_array_offset,
            array_size,
            0, // osd entry offset
            0, // osd entry size
            0, // busy
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }

        for (index, app) in self.apps.iter().enumerate() {
            let offset = self.app_array_offset as usize + index * self.app_entry_size as usize;
            write_at(&mut out, offset, &encode_app(app));
        }
        out
    }
}

fn encode_app(app: &RtssApp) -> Vec<u8> {
    let mut out = Vec::with_capacity(RtssAppEntry::SIZE);
    out.extend_from_slice(&app.process_id.to_le_bytes());
    out.extend_from_slice(FixedText::<APP_NAME_CAPACITY>::from_slice(app.name.as_bytes()).as_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // flags
    out.extend_from_slice(&0u32.to_le_bytes()); // frame counter
    out.extend_from_slice(&app.frame_rate.to_le_bytes());
    out.extend_from_slice(&app.frame_time.to_le_bytes());
    out
}

fn write_at(out: &mut Vec<u8>, offset: usize, record: &[u8]) {
    let end = offset + record.len();
    if out.len() < end {
        out.resize(end, 0);
    }
    out[offset..end].copy_from_slice(record);
}
