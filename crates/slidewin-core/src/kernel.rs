//! Magnitude kernels over the non-redundant FFT bins.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A band shape with edges in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BandDesign {
    LowPass { cutoff: f32 },
    HighPass { cutoff: f32 },
    BandPass { low: f32, high: f32 },
    BandStop { low: f32, high: f32 },
}

impl BandDesign {
    /// Gain at `freq`, with raised-cosine transitions `rolloff` Hz wide.
    pub fn gain(&self, freq: f32, rolloff: f32) -> f32 {
        match *self {
            Self::LowPass { cutoff } => 1.0 - rising_edge(freq, cutoff, rolloff),
            Self::HighPass { cutoff } => rising_edge(freq, cutoff, rolloff),
            Self::BandPass { low, high } => {
                let (low, high) = ordered(low, high);
                rising_edge(freq, low, rolloff) * (1.0 - rising_edge(freq, high, rolloff))
            }
            Self::BandStop { low, high } => {
                let (low, high) = ordered(low, high);
                1.0 - rising_edge(freq, low, rolloff) * (1.0 - rising_edge(freq, high, rolloff))
            }
        }
    }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// 0 below `edge - width/2`, 1 above `edge + width/2`.
fn rising_edge(freq: f32, edge: f32, width: f32) -> f32 {
    if width <= 0.0 {
        return if freq >= edge { 1.0 } else { 0.0 };
    }
    let t = ((freq - edge) / width + 0.5).clamp(0.0, 1.0);
    0.5 - 0.5 * (PI * t).cos()
}

/// Centre frequency of bin `k` for an FFT of `size` samples.
#[inline]
pub fn bin_frequency(k: usize, size: usize, sample_rate: f64) -> f32 {
    (k as f64 * sample_rate / size.max(1) as f64) as f32
}

/// Fill `out` with `bins` gains of `design` for an FFT of `2 * (bins - 1)`.
pub fn design_band_kernel(
    design: BandDesign,
    sample_rate: f64,
    bins: usize,
    rolloff: f32,
    out: &mut Vec<f32>,
) {
    let size = 2 * bins.saturating_sub(1);
    out.clear();
    out.extend((0..bins).map(|k| design.gain(bin_frequency(k, size, sample_rate), rolloff)));
}

/// Linearly resample `src` across `bins` entries, endpoints aligned.
///
/// An empty source becomes an all-pass kernel.
pub fn resample_kernel(src: &[f32], bins: usize, out: &mut Vec<f32>) {
    out.clear();
    match src.len() {
        0 => out.resize(bins, 1.0),
        1 => out.resize(bins, src[0]),
        n if n == bins => out.extend_from_slice(src),
        n => {
            let step = if bins > 1 {
                (n - 1) as f32 / (bins - 1) as f32
            } else {
                0.0
            };
            out.extend((0..bins).map(|k| {
                let pos = k as f32 * step;
                let i = (pos as usize).min(n - 2);
                let frac = pos - i as f32;
                src[i] + (src[i + 1] - src[i]) * frac
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lowpass_kernel() {
        let mut kernel = Vec::new();
        design_band_kernel(
            BandDesign::LowPass { cutoff: 1000.0 },
            8000.0,
            65,
            100.0,
            &mut kernel,
        );
        assert_eq!(kernel.len(), 65);
        assert_relative_eq!(kernel[0], 1.0);
        assert_relative_eq!(kernel[64], 0.0);
        // Bin 16 sits exactly on the cutoff
        assert_relative_eq!(kernel[16], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_bandstop_is_complement() {
        let pass = BandDesign::BandPass {
            low: 200.0,
            high: 800.0,
        };
        let stop = BandDesign::BandStop {
            low: 800.0,
            high: 200.0,
        };
        for f in [0.0, 150.0, 200.0, 500.0, 790.0, 2000.0] {
            assert_relative_eq!(pass.gain(f, 50.0) + stop.gain(f, 50.0), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_resample_kernel() {
        let mut out = Vec::new();
        resample_kernel(&[0.0, 1.0], 5, &mut out);
        assert_eq!(out.len(), 5);
        assert_relative_eq!(out[2], 0.5);
        assert_relative_eq!(out[4], 1.0);

        resample_kernel(&[], 3, &mut out);
        assert_eq!(out, vec![1.0; 3]);
    }
}
