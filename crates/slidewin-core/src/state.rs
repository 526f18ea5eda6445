//! Versioned state records.
//!
//! Records are bincode-encoded serde structs written to any `std::io::Write`.
//! The driver record comes first, followed by whatever the operator writes.
//! Decoding never touches a live object: records are read into plain values,
//! validated, and only then committed by the caller.

use std::io::{Read, Write};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::MAX_WINDOW_SIZE;
use crate::{Error, Result};

/// Upper bound on a single decoded record.
const MAX_RECORD_BYTES: u64 = 64 * 1024 * 1024;

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_RECORD_BYTES)
}

/// Write one record.
pub fn write_record<T: Serialize>(writer: &mut dyn Write, record: &T) -> Result<()> {
    codec().serialize_into(writer, record)?;
    Ok(())
}

/// Read one record.
pub fn read_record<T: DeserializeOwned>(reader: &mut dyn Read) -> Result<T> {
    Ok(codec().deserialize_from(reader)?)
}

/// Layout of a saved state stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateVersion {
    /// Sizes and history only.
    V1,
    /// Full streaming state: history, mirror and queued output.
    V2,
}

impl StateVersion {
    /// Version written by `save`.
    pub const CURRENT: Self = Self::V2;

    pub fn tag(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(Error::UnsupportedVersion(other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WindowRecordV1 {
    window_size: u32,
    overlap: u32,
    last_filtered_sample: u32,
    previous_data: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WindowRecordV2 {
    window_size: u64,
    overlap: u64,
    last_filtered_sample: u64,
    previous_data: Vec<f64>,
    mirror_data: Vec<f64>,
    delivered: u64,
    fill: f64,
    primed: u64,
    last_hop: u64,
    cold: bool,
    windows: u64,
    shift_blocks: u64,
    pending: Vec<f64>,
}

/// Driver state decoded from a stream, not yet adopted.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    pub window_size: usize,
    pub overlap: usize,
    pub last_filtered_sample: usize,
    pub previous_data: Vec<f32>,
    pub mirror_data: Vec<f32>,
    pub delivered: u64,
    pub fill: f32,
    pub primed: usize,
    pub last_hop: usize,
    pub cold: bool,
    pub windows: u64,
    pub shift_blocks: u64,
    pub pending: Vec<f32>,
}

fn to_usize(value: u64, field: &'static str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::CorruptState(format!("{field} out of range")))
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::SizeMismatch {
            field,
            expected,
            found,
        });
    }
    Ok(())
}

impl WindowState {
    pub fn write(&self, writer: &mut dyn Write) -> Result<()> {
        let widen = |v: &[f32]| v.iter().map(|&s| f64::from(s)).collect::<Vec<_>>();
        let record = WindowRecordV2 {
            window_size: self.window_size as u64,
            overlap: self.overlap as u64,
            last_filtered_sample: self.last_filtered_sample as u64,
            previous_data: widen(&self.previous_data),
            mirror_data: widen(&self.mirror_data),
            delivered: self.delivered,
            fill: f64::from(self.fill),
            primed: self.primed as u64,
            last_hop: self.last_hop as u64,
            cold: self.cold,
            windows: self.windows,
            shift_blocks: self.shift_blocks,
            pending: widen(&self.pending),
        };
        write_record(writer, &record)
    }

    /// Decode and validate a driver record of the given version.
    pub fn read(reader: &mut dyn Read, version: StateVersion) -> Result<Self> {
        let state = match version {
            StateVersion::V1 => Self::from_v1(read_record(reader)?)?,
            StateVersion::V2 => Self::from_v2(read_record(reader)?)?,
        };
        state.validate()?;
        Ok(state)
    }

    fn from_v1(record: WindowRecordV1) -> Result<Self> {
        let window_size = record.window_size as usize;
        let overlap = record.overlap as usize;
        let last_filtered_sample = record.last_filtered_sample as usize;
        check_len("previous_data", window_size, record.previous_data.len())?;
        if window_size == 0 || last_filtered_sample >= window_size {
            return Err(Error::CorruptState(format!(
                "counter {last_filtered_sample} invalid for window {window_size}"
            )));
        }

        // No mirror was stored; reflect the oldest retained history instead.
        let mut mirror_data = vec![0.0; window_size];
        crate::mirror::fill_mirror(&mut mirror_data, &record.previous_data, 0.0);

        Ok(Self {
            window_size,
            overlap,
            last_filtered_sample,
            primed: window_size - 1 - last_filtered_sample,
            previous_data: record.previous_data,
            mirror_data,
            delivered: window_size as u64,
            fill: 0.0,
            last_hop: window_size - overlap.min(window_size - 1),
            cold: false,
            windows: 1,
            shift_blocks: 1,
            pending: Vec::new(),
        })
    }

    fn from_v2(record: WindowRecordV2) -> Result<Self> {
        let narrow = |v: Vec<f64>| v.into_iter().map(|s| s as f32).collect::<Vec<_>>();
        Ok(Self {
            window_size: to_usize(record.window_size, "window_size")?,
            overlap: to_usize(record.overlap, "overlap")?,
            last_filtered_sample: to_usize(record.last_filtered_sample, "last_filtered_sample")?,
            previous_data: narrow(record.previous_data),
            mirror_data: narrow(record.mirror_data),
            delivered: record.delivered,
            fill: record.fill as f32,
            primed: to_usize(record.primed, "primed")?,
            last_hop: to_usize(record.last_hop, "last_hop")?,
            cold: record.cold,
            windows: record.windows,
            shift_blocks: record.shift_blocks,
            pending: narrow(record.pending),
        })
    }

    fn validate(&self) -> Result<()> {
        let size = self.window_size;
        if size == 0 || size > MAX_WINDOW_SIZE {
            return Err(Error::CorruptState(format!("window size {size}")));
        }
        if self.overlap >= size {
            return Err(Error::CorruptState(format!(
                "overlap {} not below window size {size}",
                self.overlap
            )));
        }
        check_len("previous_data", size, self.previous_data.len())?;
        check_len("mirror_data", size, self.mirror_data.len())?;
        if self.last_hop == 0 || self.last_hop > size {
            return Err(Error::CorruptState(format!("last hop {}", self.last_hop)));
        }
        for (field, value) in [
            ("last_filtered_sample", self.last_filtered_sample),
            ("primed", self.primed),
            ("queued output", self.pending.len()),
        ] {
            if value >= size {
                return Err(Error::CorruptState(format!(
                    "{field} {value} not below window size {size}"
                )));
            }
        }
        let owed = self
            .pending
            .len()
            .checked_add(self.last_filtered_sample)
            .and_then(|n| n.checked_add(self.primed))
            .ok_or_else(|| Error::CorruptState("output counters overflow".into()))?;
        check_len("queued output", size - 1, owed)?;
        if !self.fill.is_finite() {
            return Err(Error::CorruptState("non-finite reset value".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state(size: usize) -> WindowState {
        WindowState {
            window_size: size,
            overlap: size / 2,
            last_filtered_sample: 2,
            previous_data: (0..size).map(|i| i as f32 * 0.125).collect(),
            mirror_data: vec![0.5; size],
            delivered: 40,
            fill: 0.0,
            primed: 0,
            last_hop: size / 2,
            cold: false,
            windows: 3,
            shift_blocks: 0,
            pending: vec![0.25; size - 3],
        }
    }

    #[test]
    fn test_version_tags() {
        assert_eq!(StateVersion::from_tag(1).unwrap(), StateVersion::V1);
        assert_eq!(StateVersion::CURRENT.tag(), 2);
        assert!(matches!(
            StateVersion::from_tag(7),
            Err(Error::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_write_read() {
        let state = sample_state(8);
        let mut buf = Vec::new();
        state.write(&mut buf).unwrap();

        let decoded = WindowState::read(&mut buf.as_slice(), StateVersion::V2).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_truncated_stream() {
        let mut buf = Vec::new();
        sample_state(8).write(&mut buf).unwrap();
        buf.truncate(buf.len() / 2);

        assert!(WindowState::read(&mut buf.as_slice(), StateVersion::V2).is_err());
    }

    #[test]
    fn test_mismatched_mirror() {
        let mut state = sample_state(8);
        state.mirror_data.pop();
        let mut buf = Vec::new();
        state.write(&mut buf).unwrap();

        let err = WindowState::read(&mut buf.as_slice(), StateVersion::V2).unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                field: "mirror_data",
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_range_counter_rejected() {
        for primed in [8, usize::MAX] {
            let mut state = sample_state(8);
            state.primed = primed;
            let mut buf = Vec::new();
            state.write(&mut buf).unwrap();

            let err = WindowState::read(&mut buf.as_slice(), StateVersion::V2).unwrap_err();
            assert!(matches!(err, Error::CorruptState(_)), "primed {primed}: {err}");
        }

        let mut state = sample_state(8);
        state.last_filtered_sample = usize::MAX;
        state.pending.clear();
        let mut buf = Vec::new();
        state.write(&mut buf).unwrap();
        assert!(WindowState::read(&mut buf.as_slice(), StateVersion::V2).is_err());
    }

    #[test]
    fn test_v1_migration() {
        let record = WindowRecordV1 {
            window_size: 4,
            overlap: 1,
            last_filtered_sample: 2,
            previous_data: vec![1.0, 2.0, 3.0, 4.0],
        };
        let mut buf = Vec::new();
        write_record(&mut buf, &record).unwrap();

        let state = WindowState::read(&mut buf.as_slice(), StateVersion::V1).unwrap();
        assert_eq!(state.window_size, 4);
        assert_eq!(state.primed, 1);
        assert!(state.pending.is_empty());
        // Mirror reflects the oldest history sample about time zero
        assert_eq!(state.mirror_data, vec![4.0, 3.0, 2.0, 1.0]);
    }
}
