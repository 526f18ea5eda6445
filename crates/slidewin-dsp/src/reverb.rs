//! Multi-tap echo reverb.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use slidewin_core::{read_record, write_record, Error, Result, StateVersion, WindowFrame, WindowOp};

use crate::Error as DspError;

/// One echo: the dry signal `delay` samples ago, scaled by `gain`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EchoTap {
    pub delay: usize,
    pub gain: f32,
}

impl EchoTap {
    pub fn new(delay: usize, gain: f32) -> Self {
        Self { delay, gain }
    }

    /// Parse flat `(delay, gain)` pairs. Delays are rounded to whole samples.
    pub fn from_pairs(pairs: &[f32]) -> crate::Result<Vec<EchoTap>> {
        if pairs.len() % 2 != 0 {
            return Err(DspError::InvalidParameter(format!(
                "reverb pairs need an even length, got {}",
                pairs.len()
            )));
        }
        pairs
            .chunks_exact(2)
            .map(|pair| {
                let (delay, gain) = (pair[0], pair[1]);
                if !delay.is_finite() || delay < 0.0 || !gain.is_finite() {
                    return Err(DspError::InvalidParameter(format!(
                        "reverb tap ({delay}, {gain})"
                    )));
                }
                Ok(EchoTap::new(delay.round() as usize, gain))
            })
            .collect()
    }
}

/// Adds delayed, scaled copies of the dry signal.
///
/// Echoes only ever reach back to the last reset: a tap whose delay points
/// before the first sample contributes nothing.
pub struct Reverb {
    taps: Vec<EchoTap>,
    max_reverb: usize,
    /// Dry history, `max_reverb + 1` samples.
    dry: Vec<f32>,
    write_pos: usize,
    seen: u64,
}

#[derive(Serialize, Deserialize)]
struct ReverbRecord {
    taps: Vec<EchoTap>,
    max_reverb: u64,
    dry: Vec<f32>,
    write_pos: u64,
    seen: u64,
}

impl Reverb {
    pub const DEFAULT_MAX_REVERB: usize = 48_000;
    /// Ten seconds at the highest supported sample rate.
    pub const MAX_REVERB: usize = 3_840_000;

    pub fn new(max_reverb: usize) -> Self {
        let max_reverb = Self::clamp_max_reverb(max_reverb);
        Self {
            taps: Vec::new(),
            max_reverb,
            dry: vec![0.0; max_reverb + 1],
            write_pos: 0,
            seen: 0,
        }
    }

    fn clamp_max_reverb(max: usize) -> usize {
        if max > Self::MAX_REVERB {
            tracing::warn!(requested = max, "reverb length clamped to {}", Self::MAX_REVERB);
        }
        max.min(Self::MAX_REVERB)
    }

    pub fn taps(&self) -> &[EchoTap] {
        &self.taps
    }

    pub fn max_reverb(&self) -> usize {
        self.max_reverb
    }

    /// Replace the echo taps. Delays beyond `max_reverb` are clamped.
    pub fn set_reverb_filter(&mut self, taps: &[EchoTap]) {
        let max = self.max_reverb;
        self.taps = taps
            .iter()
            .map(|tap| {
                if tap.delay > max {
                    tracing::warn!(delay = tap.delay, max, "reverb tap delay clamped");
                }
                let gain = if tap.gain.is_finite() { tap.gain } else { 0.0 };
                EchoTap::new(tap.delay.min(max), gain)
            })
            .collect();
        tracing::debug!(taps = self.taps.len(), "reverb taps set");
    }

    /// Replace the echo taps from flat `(delay, gain)` pairs.
    ///
    /// Malformed input leaves the current taps in place.
    pub fn set_reverb_pairs(&mut self, pairs: &[f32]) {
        match EchoTap::from_pairs(pairs) {
            Ok(taps) => self.set_reverb_filter(&taps),
            Err(err) => tracing::warn!(%err, "reverb pairs ignored"),
        }
    }

    /// Longest echo in samples, at most [`Self::MAX_REVERB`]. Re-clamps
    /// existing taps and keeps the newest dry history.
    pub fn set_max_reverb(&mut self, max: usize) {
        let max = Self::clamp_max_reverb(max);
        if max == self.max_reverb {
            return;
        }
        let old_len = self.dry.len();
        let new_len = max + 1;
        let keep = old_len.min(new_len);
        let mut dry = vec![0.0; new_len];
        for k in 0..keep {
            // k-th newest sample
            let src = (self.write_pos + old_len - 1 - k) % old_len;
            dry[keep - 1 - k] = self.dry[src];
        }
        self.dry = dry;
        self.write_pos = keep % new_len;
        self.max_reverb = max;
        let taps = std::mem::take(&mut self.taps);
        self.set_reverb_filter(&taps);
    }

    #[inline]
    fn echo(&mut self, x: f32) -> f32 {
        let len = self.dry.len();
        self.dry[self.write_pos] = x;
        let newest = self.write_pos;
        self.write_pos = (self.write_pos + 1) % len;
        self.seen += 1;

        let mut out = x;
        for tap in &self.taps {
            // seen - 1 is the index of x since reset
            if (tap.delay as u64) < self.seen {
                out += tap.gain * self.dry[(newest + len - tap.delay) % len];
            }
        }
        out
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_REVERB)
    }
}

impl WindowOp for Reverb {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn window_op(&mut self, frame: &mut WindowFrame<'_>) {
        for s in frame.emitted_mut() {
            *s = self.echo(*s);
        }
    }

    fn reset(&mut self) {
        self.dry.fill(0.0);
        self.write_pos = 0;
        self.seen = 0;
    }

    fn save_state(&self, writer: &mut dyn Write) -> Result<()> {
        write_record(
            writer,
            &ReverbRecord {
                taps: self.taps.clone(),
                max_reverb: self.max_reverb as u64,
                dry: self.dry.clone(),
                write_pos: self.write_pos as u64,
                seen: self.seen,
            },
        )
    }

    fn load_state(&mut self, reader: &mut dyn Read, version: StateVersion) -> Result<()> {
        if version == StateVersion::V1 {
            return Ok(());
        }
        let record: ReverbRecord = read_record(reader)?;
        let max_reverb = usize::try_from(record.max_reverb)
            .ok()
            .filter(|&max| max <= Self::MAX_REVERB)
            .ok_or_else(|| Error::CorruptState("reverb length".into()))?;
        if record.dry.len() != max_reverb.saturating_add(1) {
            return Err(Error::SizeMismatch {
                field: "reverb history",
                expected: max_reverb.saturating_add(1),
                found: record.dry.len(),
            });
        }
        if record.write_pos as usize >= record.dry.len()
            || record.taps.iter().any(|tap| tap.delay > max_reverb)
        {
            return Err(Error::CorruptState("reverb taps".into()));
        }
        self.taps = record.taps;
        self.max_reverb = max_reverb;
        self.dry = record.dry;
        self.write_pos = record.write_pos as usize;
        self.seen = record.seen;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use slidewin_core::SlidingWindow;

    fn impulse(len: usize) -> Vec<f32> {
        let mut v = vec![0.0; len];
        v[0] = 1.0;
        v
    }

    #[test]
    fn test_impulse_response() {
        let mut reverb = Reverb::new(100);
        reverb.set_reverb_filter(&[EchoTap::new(5, 0.5), EchoTap::new(12, -0.25)]);
        let mut window = SlidingWindow::new(8, 4, reverb);

        let input = impulse(40);
        let mut output = vec![0.0; 40];
        window.filter_samples(&input, &mut output);

        let response = &output[window.latency()..];
        assert_relative_eq!(response[0], 1.0);
        assert_relative_eq!(response[5], 0.5);
        assert_relative_eq!(response[12], -0.25);
        let energy: f32 = response.iter().map(|s| s.abs()).sum();
        assert_relative_eq!(energy, 1.75);
    }

    #[test]
    fn test_no_echo_before_stream_start() {
        let mut reverb = Reverb::new(16);
        reverb.set_reverb_filter(&[EchoTap::new(3, 1.0)]);
        let mut window = SlidingWindow::new(4, 0, reverb);
        window.reset(0.0);

        let input = vec![1.0; 12];
        let mut output = vec![0.0; 12];
        window.filter_samples(&input, &mut output);

        let response = &output[window.latency()..];
        assert_eq!(&response[..3], &[1.0, 1.0, 1.0]);
        assert!(response[3..].iter().all(|&s| s == 2.0));
    }

    #[test]
    fn test_max_reverb_clamps_taps() {
        let mut reverb = Reverb::new(1000);
        reverb.set_reverb_filter(&[EchoTap::new(900, 0.3)]);
        reverb.set_max_reverb(200);
        assert_eq!(reverb.taps()[0].delay, 200);
    }

    #[test]
    fn test_reverb_pairs() {
        let mut reverb = Reverb::new(100);
        reverb.set_reverb_pairs(&[10.0, 0.5, 20.4, 0.25]);
        assert_eq!(reverb.taps(), &[EchoTap::new(10, 0.5), EchoTap::new(20, 0.25)]);

        // Odd length is rejected and keeps the previous taps
        reverb.set_reverb_pairs(&[1.0, 0.5, 3.0]);
        assert_eq!(reverb.taps().len(), 2);
        assert!(EchoTap::from_pairs(&[-1.0, 0.5]).is_err());
    }

    #[test]
    fn test_max_reverb_keeps_history() {
        let mut reverb = Reverb::new(4);
        reverb.set_reverb_filter(&[EchoTap::new(2, 1.0)]);
        for x in [1.0, 2.0, 3.0] {
            reverb.echo(x);
        }
        reverb.set_max_reverb(8);
        // Next sample echoes the one two samples back
        assert_relative_eq!(reverb.echo(0.0), 2.0);
    }

    #[test]
    fn test_max_reverb_upper_bound() {
        let mut reverb = Reverb::new(16);
        reverb.set_reverb_filter(&[EchoTap::new(8, 0.5)]);
        reverb.set_max_reverb(usize::MAX);
        assert_eq!(reverb.max_reverb(), Reverb::MAX_REVERB);
        assert_eq!(reverb.taps()[0].delay, 8);

        assert_eq!(Reverb::new(usize::MAX).max_reverb(), Reverb::MAX_REVERB);
    }

    #[test]
    fn test_oversized_record_rejected() {
        let mut buf = Vec::new();
        write_record(
            &mut buf,
            &ReverbRecord {
                taps: Vec::new(),
                max_reverb: u64::MAX,
                dry: vec![0.0; 4],
                write_pos: 0,
                seen: 0,
            },
        )
        .unwrap();

        let mut reverb = Reverb::new(16);
        assert!(reverb
            .load_state(&mut buf.as_slice(), StateVersion::V2)
            .is_err());
        assert_eq!(reverb.max_reverb(), 16);
    }
}
