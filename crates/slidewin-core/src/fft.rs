//! Owned real-signal FFT.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

pub type Complex32 = Complex<f32>;

/// Forward/inverse plans for one size plus the buffers they run on.
///
/// Plans are created once per size; `forward_real`/`inverse_real` never
/// allocate.
pub struct Fft {
    size: usize,
    forward: Arc<dyn rustfft::Fft<f32>>,
    inverse: Arc<dyn rustfft::Fft<f32>>,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl Fft {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            size,
            forward,
            inverse,
            buffer: vec![Complex32::new(0.0, 0.0); size],
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Non-redundant bins of a real signal.
    pub fn bins(&self) -> usize {
        self.size / 2 + 1
    }

    pub fn resize(&mut self, size: usize) {
        if size.max(1) != self.size {
            *self = Self::new(size);
        }
    }

    /// Transform `input` (zero-padded or truncated to the FFT size).
    pub fn forward_real(&mut self, input: &[f32]) {
        for (i, bin) in self.buffer.iter_mut().enumerate() {
            *bin = Complex32::new(input.get(i).copied().unwrap_or(0.0), 0.0);
        }
        self.forward
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
    }

    /// Transform `input * window`.
    pub fn forward_windowed(&mut self, input: &[f32], window: &[f32]) {
        for (i, bin) in self.buffer.iter_mut().enumerate() {
            let x = input.get(i).copied().unwrap_or(0.0);
            let w = window.get(i).copied().unwrap_or(0.0);
            *bin = Complex32::new(x * w, 0.0);
        }
        self.forward
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
    }

    /// Inverse-transform the spectrum and write the real part, scaled by `1/n`.
    pub fn inverse_real(&mut self, output: &mut [f32]) {
        self.inverse
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        let scale = 1.0 / self.size as f32;
        for (out, bin) in output.iter_mut().zip(self.buffer.iter()) {
            *out = bin.re * scale;
        }
    }

    pub fn spectrum(&self) -> &[Complex32] {
        &self.buffer
    }

    pub fn spectrum_mut(&mut self) -> &mut [Complex32] {
        &mut self.buffer
    }
}

impl std::fmt::Debug for Fft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fft").field("size", &self.size).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    #[test]
    fn test_roundtrip_identity() {
        let mut fft = Fft::new(64);
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).sin()).collect();
        let mut output = vec![0.0; 64];

        fft.forward_real(&input);
        fft.inverse_real(&mut output);

        for (a, b) in input.iter().zip(output.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_sine_peak_bin() {
        let size = 128;
        let mut fft = Fft::new(size);
        let input: Vec<f32> = (0..size)
            .map(|i| (2.0 * PI * 8.0 * i as f32 / size as f32).sin())
            .collect();
        fft.forward_real(&input);

        let peak = fft.spectrum()[..fft.bins()]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(8));
    }

    #[test]
    fn test_resize() {
        let mut fft = Fft::new(32);
        fft.resize(0);
        assert_eq!(fft.len(), 1);
        fft.resize(256);
        assert_eq!(fft.len(), 256);
        assert_eq!(fft.bins(), 129);
        assert_eq!(fft.spectrum().len(), 256);
    }
}
