//! Spike suppression for control and sensor streams.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use slidewin_core::{read_record, write_record, Error, Result, ShiftFrame, StateVersion, WindowOp};

/// Limits sample-to-sample jumps larger than a tolerance.
///
/// A jump beyond `tolerance` starts a spike. While it lasts, each output is
/// pulled towards the previous output plus the tolerance by `effect`
/// (`1.0` clamps fully, `0.0` leaves the input alone). A sample that comes
/// back to the trajectory the stream followed before the spike ends it
/// unchanged. A spike running longer than `size` samples is taken as a real
/// level change and the new level is accepted.
#[derive(Debug, Clone)]
pub struct Despike {
    size: usize,
    tolerance: f32,
    effect: f32,
    /// Slope of the stream before the current spike.
    spike_slope: f32,
    previous: f32,
    primed: bool,
    run: usize,
    anchor: f32,
    spike_sign: f32,
}

#[derive(Serialize, Deserialize)]
struct DespikeRecordV1 {
    spike_slope: f32,
    tolerance: f32,
    effect: f32,
}

#[derive(Serialize, Deserialize)]
struct DespikeRecord {
    spike_slope: f32,
    tolerance: f32,
    effect: f32,
    size: u64,
    previous: f32,
    primed: bool,
    run: u64,
    anchor: f32,
    spike_sign: f32,
}

impl Despike {
    pub fn new(size: usize, tolerance: f32, effect: f32) -> Self {
        let mut despike = Self {
            size: 1,
            tolerance: 0.0,
            effect: 1.0,
            spike_slope: 0.0,
            previous: 0.0,
            primed: false,
            run: 0,
            anchor: 0.0,
            spike_sign: 0.0,
        };
        despike.set_despike_parms(size, tolerance, effect);
        despike
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn effect(&self) -> f32 {
        self.effect
    }

    pub fn spike_slope(&self) -> f32 {
        self.spike_slope
    }

    /// `size`: longest run of out-of-tolerance samples treated as a spike.
    pub fn set_despike_parms(&mut self, size: usize, tolerance: f32, effect: f32) {
        let size_c = size.max(1);
        let tolerance_c = if tolerance.is_finite() {
            tolerance.max(0.0)
        } else {
            0.0
        };
        let effect_c = if effect.is_finite() {
            effect.clamp(0.0, 1.0)
        } else {
            1.0
        };
        if size_c != size || tolerance_c != tolerance || effect_c != effect {
            tracing::warn!(
                size,
                tolerance,
                effect,
                "despike parameters clamped to ({}, {}, {})",
                size_c,
                tolerance_c,
                effect_c
            );
        }
        self.size = size_c;
        self.tolerance = tolerance_c;
        self.effect = effect_c;
    }

    fn accept(&mut self, x: f32, slope: f32) -> f32 {
        self.spike_slope = slope;
        self.anchor = x;
        self.run = 0;
        x
    }

    fn despike(&mut self, x: f32) -> f32 {
        let d = x - self.previous;
        let tol = self.tolerance;

        if d.abs() <= tol {
            return self.accept(x, d);
        }

        if self.run > 0 && d.signum() != self.spike_sign {
            let expected = self.anchor + self.spike_slope * (self.run + 1) as f32;
            if (x - expected).abs() <= tol {
                let slope = self.spike_slope;
                return self.accept(x, slope);
            }
        }

        if self.run == 0 {
            self.spike_sign = d.signum();
        }
        self.run += 1;
        if self.run > self.size {
            return self.accept(x, 0.0);
        }
        let limit = self.previous + d.signum() * tol;
        x + self.effect * (limit - x)
    }
}

impl Default for Despike {
    fn default() -> Self {
        Self::new(4, 0.1, 1.0)
    }
}

impl WindowOp for Despike {
    fn name(&self) -> &'static str {
        "despike"
    }

    fn shift_op(&mut self, frame: &mut ShiftFrame<'_>) {
        if !self.primed {
            self.previous = frame.previous();
            self.anchor = self.previous;
            self.primed = true;
        }
        for (out, &x) in frame.output.iter_mut().zip(frame.input) {
            let y = self.despike(x);
            self.previous = y;
            *out = y;
        }
    }

    fn reset(&mut self) {
        self.spike_slope = 0.0;
        self.previous = 0.0;
        self.primed = false;
        self.run = 0;
        self.anchor = 0.0;
        self.spike_sign = 0.0;
    }

    fn save_state(&self, writer: &mut dyn Write) -> Result<()> {
        write_record(
            writer,
            &DespikeRecord {
                spike_slope: self.spike_slope,
                tolerance: self.tolerance,
                effect: self.effect,
                size: self.size as u64,
                previous: self.previous,
                primed: self.primed,
                run: self.run as u64,
                anchor: self.anchor,
                spike_sign: self.spike_sign,
            },
        )
    }

    fn load_state(&mut self, reader: &mut dyn Read, version: StateVersion) -> Result<()> {
        let restored = match version {
            StateVersion::V1 => {
                let record: DespikeRecordV1 = read_record(reader)?;
                let mut restored = self.clone();
                restored.reset();
                restored.spike_slope = record.spike_slope;
                restored.tolerance = record.tolerance;
                restored.effect = record.effect;
                restored
            }
            StateVersion::V2 => {
                let record: DespikeRecord = read_record(reader)?;
                Self {
                    size: usize::try_from(record.size)
                        .map_err(|_| Error::CorruptState("despike size".into()))?,
                    tolerance: record.tolerance,
                    effect: record.effect,
                    spike_slope: record.spike_slope,
                    previous: record.previous,
                    primed: record.primed,
                    run: usize::try_from(record.run)
                        .map_err(|_| Error::CorruptState("despike run".into()))?,
                    anchor: record.anchor,
                    spike_sign: record.spike_sign,
                }
            }
        };
        if restored.size == 0
            || restored.tolerance.is_nan()
            || restored.tolerance < 0.0
            || !(0.0..=1.0).contains(&restored.effect)
        {
            return Err(Error::CorruptState("despike parameters".into()));
        }
        // A spike never outlives `size` samples.
        if restored.run > restored.size
            || !restored.spike_slope.is_finite()
            || !restored.previous.is_finite()
            || !restored.anchor.is_finite()
            || !restored.spike_sign.is_finite()
        {
            return Err(Error::CorruptState("despike run state".into()));
        }
        *self = restored;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use slidewin_core::SlidingWindow;

    fn run(despike: Despike, input: &[f32]) -> Vec<f32> {
        let mut window = SlidingWindow::new(8, 0, despike);
        let mut output = vec![0.0; input.len()];
        window.shift_samples(input, &mut output, input.len());
        output
    }

    #[test]
    fn test_single_spike_clamped() {
        let mut input = vec![0.0; 20];
        input[10] = 10.0;
        let output = run(Despike::new(3, 0.1, 1.0), &input);

        assert_relative_eq!(output[10], 0.1, epsilon = 1e-5);
        assert!(output[11..].iter().all(|&s| s == 0.0));
        assert!(output[..10].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_long_step_accepted() {
        let mut input = vec![0.0; 10];
        input[4..].fill(5.0);
        let output = run(Despike::new(3, 0.1, 1.0), &input);

        assert_relative_eq!(output[4], 0.1, epsilon = 1e-5);
        assert_relative_eq!(output[5], 0.2, epsilon = 1e-5);
        assert_relative_eq!(output[6], 0.3, epsilon = 1e-5);
        // Fourth out-of-tolerance sample exceeds the spike width
        assert_eq!(output[7], 5.0);
        assert_eq!(output[9], 5.0);
    }

    #[test]
    fn test_return_to_trajectory_accepted() {
        let mut input: Vec<f32> = (0..20).map(|i| i as f32 * 0.05).collect();
        input[10] = 5.0;
        let output = run(Despike::new(3, 0.1, 0.5), &input);

        assert!(output[10] < 5.0 && output[10] > 0.5);
        // Back on the ramp: passed unchanged
        assert_eq!(output[11], input[11]);
        assert_eq!(&output[12..], &input[12..]);
    }

    #[test]
    fn test_zero_effect_is_transparent() {
        let mut input = vec![0.0; 12];
        input[3] = 4.0;
        input[7] = -4.0;
        let output = run(Despike::new(2, 0.1, 0.0), &input);
        assert_eq!(output, input);
    }

    #[test]
    fn test_parameter_clamping() {
        let despike = Despike::new(0, -1.0, 3.0);
        assert_eq!(despike.size(), 1);
        assert_eq!(despike.tolerance(), 0.0);
        assert_eq!(despike.effect(), 1.0);
    }

    #[test]
    fn test_state_roundtrip_mid_spike() {
        let mut input = vec![1.0; 16];
        input[6..9].fill(9.0);

        let mut reference = SlidingWindow::new(4, 0, Despike::new(4, 0.2, 0.8));
        let mut expected = vec![0.0; 16];
        reference.shift_samples(&input, &mut expected, 16);

        let mut first = SlidingWindow::new(4, 0, Despike::new(4, 0.2, 0.8));
        let mut output = vec![0.0; 16];
        first.shift_samples(&input[..7], &mut output[..7], 7);
        let mut buf = Vec::new();
        first.save(&mut buf).unwrap();

        let mut second = SlidingWindow::new(4, 0, Despike::default());
        second.load(buf.as_slice(), StateVersion::V2).unwrap();
        second.shift_samples(&input[7..], &mut output[7..], 9);
        assert_eq!(output, expected);
        assert_eq!(second.op().tolerance(), 0.2);
    }

    #[test]
    fn test_v1_record_restores_parameters() {
        let mut buf = Vec::new();
        write_record(
            &mut buf,
            &DespikeRecordV1 {
                spike_slope: 0.5,
                tolerance: 0.3,
                effect: 0.25,
            },
        )
        .unwrap();

        let mut despike = Despike::default();
        despike
            .load_state(&mut buf.as_slice(), StateVersion::V1)
            .unwrap();
        assert_eq!(despike.tolerance(), 0.3);
        assert_eq!(despike.effect(), 0.25);
        assert_eq!(despike.spike_slope(), 0.5);
    }

    fn record(run: u64, previous: f32, anchor: f32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_record(
            &mut buf,
            &DespikeRecord {
                spike_slope: 0.0,
                tolerance: 0.1,
                effect: 1.0,
                size: 4,
                previous,
                primed: true,
                run,
                anchor,
                spike_sign: 1.0,
            },
        )
        .unwrap();
        buf
    }

    #[test]
    fn test_corrupt_run_state_rejected() {
        for buf in [
            record(5, 0.0, 0.0),
            record(u64::MAX, 0.0, 0.0),
            record(0, f32::NAN, 0.0),
            record(0, 0.0, f32::INFINITY),
        ] {
            let mut despike = Despike::new(2, 0.5, 0.5);
            assert!(despike
                .load_state(&mut buf.as_slice(), StateVersion::V2)
                .is_err());
            // Rejected records leave the operator untouched
            assert_eq!(despike.size(), 2);
            assert_eq!(despike.tolerance(), 0.5);
        }

        let mut despike = Despike::default();
        despike
            .load_state(&mut record(4, 1.0, 0.5).as_slice(), StateVersion::V2)
            .unwrap();
        assert_eq!(despike.size(), 4);
    }
}
