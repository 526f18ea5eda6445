//! Delay-line pitch shifter.
//!
//! Two read taps trail the write head of a one-grain delay line, half a
//! grain apart. Their delay sweeps at `1 - ratio` samples per sample, which
//! plays the signal back `ratio` times faster without changing its length.
//! When a tap's delay wraps around the grain its weight on the triangular
//! blend curve is zero, so the jump is inaudible; the two weights always sum
//! to one.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use slidewin_core::{
    read_record, write_record, Error, Result, ShiftFrame, StateVersion, WindowFrame, WindowOp,
};

pub const MIN_RATIO: f32 = 0.25;
pub const MAX_RATIO: f32 = 4.0;
pub const MIN_CHUNK: usize = 16;
pub const MAX_CHUNK: usize = 65536;
pub const MAX_OVERSAMPLE: usize = 16;

/// Samples kept beyond one grain for interpolation.
const GUARD: usize = 2;

pub struct PitchShift {
    ratio: f32,
    oversample: usize,
    chunk: usize,
    /// One grain of input plus guard samples.
    single_sample: Vec<f32>,
    write_pos: usize,
    /// Delay of the first tap in samples, `[0, chunk)`.
    phase: f32,
    blend: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct PitchShiftRecord {
    ratio: f32,
    oversample: u32,
    chunk: u64,
    single_sample: Vec<f32>,
    write_pos: u64,
    phase: f32,
}

impl PitchShift {
    pub fn new(chunk: usize) -> Self {
        let chunk = clamp_chunk(chunk);
        let mut shifter = Self {
            ratio: 1.0,
            oversample: 4,
            chunk,
            single_sample: vec![0.0; chunk + GUARD],
            write_pos: 0,
            phase: 0.0,
            blend: Vec::new(),
        };
        shifter.make_blend_curve();
        shifter
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn oversample(&self) -> usize {
        self.oversample
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk
    }

    /// Set the frequency ratio; clamped to `[0.25, 4.0]`.
    pub fn set_pitch_shift(&mut self, ratio: f32) {
        let clamped = if ratio.is_finite() {
            ratio.clamp(MIN_RATIO, MAX_RATIO)
        } else {
            1.0
        };
        if clamped != ratio {
            tracing::warn!(requested = ratio, "pitch shift ratio clamped to {}", clamped);
        }
        self.ratio = clamped;
    }

    /// Blend-curve resolution per sample of delay; clamped to `1..=16`.
    pub fn set_oversample(&mut self, oversample: usize) {
        let clamped = oversample.clamp(1, MAX_OVERSAMPLE);
        if clamped != oversample {
            tracing::warn!(requested = oversample, "oversample clamped to {}", clamped);
        }
        if clamped != self.oversample {
            self.oversample = clamped;
            self.make_blend_curve();
        }
    }

    /// Grain length in samples; clamped to `[16, 65536]`.
    pub fn set_chunk_size(&mut self, chunk: usize) {
        let clamped = clamp_chunk(chunk);
        if clamped != chunk {
            tracing::warn!(requested = chunk, "chunk size clamped to {}", clamped);
        }
        if clamped == self.chunk {
            return;
        }
        tracing::debug!(from = self.chunk, to = clamped, "pitch shift grain resized");
        self.chunk = clamped;
        self.single_sample = vec![0.0; clamped + GUARD];
        self.write_pos = 0;
        self.phase = 0.0;
        self.make_blend_curve();
    }

    /// Triangular weight table with `chunk * oversample` entries.
    fn make_blend_curve(&mut self) {
        let len = self.chunk * self.oversample;
        self.blend.clear();
        self.blend.reserve(len);
        let half = len as f32 / 2.0;
        for i in 0..len {
            self.blend.push(1.0 - (i as f32 - half).abs() / half);
        }
    }

    /// Weights of the two taps for the current phase.
    #[inline]
    fn tap_weights(&self) -> (f32, f32) {
        let len = self.blend.len();
        let index = ((self.phase * self.oversample as f32) as usize).min(len - 1);
        let a = self.blend[index];
        (a, 1.0 - a)
    }

    /// Read the delay line `delay` samples behind the newest sample.
    #[inline]
    fn tap(&self, delay: f32) -> f32 {
        let len = self.single_sample.len();
        let whole = delay as usize;
        let frac = delay - whole as f32;
        let newest = self.write_pos + len - 1;
        let a = self.single_sample[(newest - whole) % len];
        let b = self.single_sample[(newest + len - whole - 1) % len];
        a + (b - a) * frac
    }

    #[inline]
    fn push(&mut self, sample: f32) {
        self.single_sample[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.single_sample.len();
    }

    #[inline]
    fn single(&mut self, sample: f32) -> f32 {
        self.push(sample);
        let chunk = self.chunk as f32;
        let second = (self.phase + chunk / 2.0) % chunk;
        let (wa, wb) = self.tap_weights();
        wa * self.tap(self.phase) + wb * self.tap(second)
    }

    /// Delay shrinks; taps wrap from 0 back to a full grain.
    fn pitch_shift_up(&mut self, samples: &mut [f32]) {
        let step = self.ratio - 1.0;
        let chunk = self.chunk as f32;
        for s in samples.iter_mut() {
            *s = self.single(*s);
            self.phase -= step;
            if self.phase < 0.0 {
                self.phase += chunk;
            }
        }
    }

    /// Delay grows; taps wrap from a full grain back to 0.
    fn pitch_shift_down(&mut self, samples: &mut [f32]) {
        let step = 1.0 - self.ratio;
        let chunk = self.chunk as f32;
        for s in samples.iter_mut() {
            *s = self.single(*s);
            self.phase += step;
            if self.phase >= chunk {
                self.phase -= chunk;
            }
        }
    }

    fn process(&mut self, samples: &mut [f32]) {
        if self.ratio > 1.0 {
            self.pitch_shift_up(samples);
        } else if self.ratio < 1.0 {
            self.pitch_shift_down(samples);
        } else {
            // Delay line stays current at unity.
            for &s in samples.iter() {
                self.push(s);
            }
        }
    }
}

fn clamp_chunk(chunk: usize) -> usize {
    chunk.clamp(MIN_CHUNK, MAX_CHUNK)
}

impl Default for PitchShift {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl WindowOp for PitchShift {
    fn name(&self) -> &'static str {
        "pitch_shift"
    }

    fn window_op(&mut self, frame: &mut WindowFrame<'_>) {
        self.process(frame.emitted_mut());
    }

    fn shift_op(&mut self, frame: &mut ShiftFrame<'_>) {
        frame.output.copy_from_slice(frame.input);
        self.process(frame.output);
    }

    fn reset(&mut self) {
        self.single_sample.fill(0.0);
        self.write_pos = 0;
        self.phase = 0.0;
    }

    fn save_state(&self, writer: &mut dyn Write) -> Result<()> {
        write_record(
            writer,
            &PitchShiftRecord {
                ratio: self.ratio,
                oversample: self.oversample as u32,
                chunk: self.chunk as u64,
                single_sample: self.single_sample.clone(),
                write_pos: self.write_pos as u64,
                phase: self.phase,
            },
        )
    }

    fn load_state(&mut self, reader: &mut dyn Read, version: StateVersion) -> Result<()> {
        if version == StateVersion::V1 {
            return Ok(());
        }
        let record: PitchShiftRecord = read_record(reader)?;
        let chunk = record.chunk as usize;
        if chunk != clamp_chunk(chunk) {
            return Err(Error::CorruptState(format!("pitch shift chunk {chunk}")));
        }
        if record.single_sample.len() != chunk + GUARD {
            return Err(Error::SizeMismatch {
                field: "pitch shift delay line",
                expected: chunk + GUARD,
                found: record.single_sample.len(),
            });
        }
        let oversample = record.oversample as usize;
        let phase_ok = record.phase.is_finite() && (0.0..chunk as f32).contains(&record.phase);
        if !(1..=MAX_OVERSAMPLE).contains(&oversample)
            || !(MIN_RATIO..=MAX_RATIO).contains(&record.ratio)
            || record.write_pos as usize >= record.single_sample.len()
            || !phase_ok
        {
            return Err(Error::CorruptState("pitch shift parameters".into()));
        }

        self.ratio = record.ratio;
        self.oversample = oversample;
        self.chunk = chunk;
        self.single_sample = record.single_sample;
        self.write_pos = record.write_pos as usize;
        self.phase = record.phase;
        self.make_blend_curve();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use slidewin_core::SlidingWindow;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    /// Frequency from rising zero crossings.
    fn measure_frequency(samples: &[f32], sample_rate: f32) -> f32 {
        let crossings = samples
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        crossings as f32 * sample_rate / samples.len() as f32
    }

    #[test]
    fn test_blend_weights_sum_to_one() {
        let mut shifter = PitchShift::new(64);
        shifter.set_oversample(3);
        assert_eq!(shifter.blend.len(), 192);
        for step in 0..640 {
            shifter.phase = step as f32 * 0.1;
            let (a, b) = shifter.tap_weights();
            assert_relative_eq!(a + b, 1.0);
        }
        // Triangle peaks mid-grain and vanishes at the wrap point
        assert_relative_eq!(shifter.blend[0], 0.0);
        assert_relative_eq!(shifter.blend[96], 1.0);
    }

    #[test]
    fn test_parameter_clamping() {
        let mut shifter = PitchShift::new(4);
        assert_eq!(shifter.chunk_size(), MIN_CHUNK);
        shifter.set_pitch_shift(10.0);
        assert_eq!(shifter.ratio(), MAX_RATIO);
        shifter.set_pitch_shift(0.0);
        assert_eq!(shifter.ratio(), MIN_RATIO);
        shifter.set_oversample(0);
        assert_eq!(shifter.oversample(), 1);
        shifter.set_chunk_size(1 << 20);
        assert_eq!(shifter.chunk_size(), MAX_CHUNK);
    }

    #[test]
    fn test_unity_ratio_passes_through() {
        let mut window = SlidingWindow::new(32, 0, PitchShift::new(256));
        let input = sine(300.0, 8000.0, 256);
        let mut output = vec![0.0; 256];
        window.shift_samples(&input, &mut output, 256);
        assert_eq!(output, input);
    }

    #[test]
    fn test_octave_up_doubles_frequency() {
        let sample_rate = 8000.0;
        let mut shifter = PitchShift::new(400);
        shifter.set_pitch_shift(2.0);
        let mut window = SlidingWindow::new(64, 0, shifter);

        let input = sine(200.0, sample_rate, 16000);
        let mut output = vec![0.0; 16000];
        window.shift_samples(&input, &mut output, 16000);

        let measured = measure_frequency(&output[800..], sample_rate);
        assert!((measured - 400.0).abs() < 40.0, "measured {measured} Hz");
    }

    #[test]
    fn test_octave_down_halves_frequency() {
        let sample_rate = 8000.0;
        let mut shifter = PitchShift::new(400);
        shifter.set_pitch_shift(0.5);
        let mut window = SlidingWindow::new(64, 16, shifter);

        let input = sine(400.0, sample_rate, 16000);
        let mut output = vec![0.0; 16000];
        window.filter_samples(&input, &mut output);

        let measured = measure_frequency(&output[800..], sample_rate);
        assert!((measured - 200.0).abs() < 20.0, "measured {measured} Hz");
    }

    proptest! {
        #[test]
        fn prop_tap_weights_partition_unity(
            chunk in 16usize..4096,
            oversample in 1usize..=16,
            position in 0.0f32..1.0,
        ) {
            let mut shifter = PitchShift::new(chunk);
            shifter.set_oversample(oversample);
            shifter.phase = position * chunk as f32;
            let (a, b) = shifter.tap_weights();
            prop_assert!((0.0..=1.0).contains(&a));
            prop_assert!((a + b - 1.0).abs() < 1e-6);
        }
    }
}
