//! FFT convolution filter with overlap crossfading.
//!
//! Each window is transformed, multiplied by a magnitude (and optional
//! phase) kernel and transformed back. Consecutive windows share `overlap`
//! samples; across that span the current window fades in against the
//! previous window's result with a sin² curve whose complement sums to one,
//! so an identity kernel reproduces the input exactly.

use std::f32::consts::PI;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use slidewin_core::{
    design_band_kernel, read_record, resample_kernel, write_record, BandDesign, Complex32, Error,
    Fft, Result, StateVersion, WindowFrame, WindowOp,
};

/// Width of a band transition, in bins.
const BAND_ROLLOFF_BINS: f32 = 4.0;

pub struct Filter {
    size: usize,
    fft: Fft,
    /// Magnitude per non-redundant bin.
    filter: Vec<f32>,
    /// Phase rotation per bin (radians).
    phase: Option<Vec<f32>>,
    /// Kernels as supplied, resampled again on resize.
    source_filter: Vec<f32>,
    source_phase: Option<Vec<f32>>,
    window: Vec<f32>,
    unwindow: Vec<f32>,
    crossfade: usize,
    /// Previous transformed window.
    tail: Vec<f32>,
    has_tail: bool,
    virtual_prev: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct FilterRecord {
    size: u64,
    filter: Vec<f32>,
    phase: Option<Vec<f32>>,
    tail: Vec<f32>,
    has_tail: bool,
}

impl Filter {
    /// Identity filter for windows of `size` samples.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let mut filter = Self {
            size,
            fft: Fft::new(size),
            filter: Vec::with_capacity(size / 2 + 1),
            phase: None,
            source_filter: Vec::new(),
            source_phase: None,
            window: Vec::with_capacity(size),
            unwindow: Vec::with_capacity(size),
            crossfade: 0,
            tail: vec![0.0; size],
            has_tail: false,
            virtual_prev: vec![0.0; size],
        };
        filter.rebuild_kernel();
        filter
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bins(&self) -> usize {
        self.size / 2 + 1
    }

    /// Current magnitude kernel, one gain per bin.
    pub fn kernel(&self) -> &[f32] {
        &self.filter
    }

    /// Set the magnitude kernel and optional phase kernel.
    ///
    /// Kernels of any length are stretched across `0..=Nyquist`. An empty
    /// magnitude kernel passes everything.
    pub fn set_filter(&mut self, filter: &[f32], phase: Option<&[f32]>) {
        self.source_filter = filter.iter().map(|g| sanitize(*g)).collect();
        self.source_phase = phase.map(|p| p.iter().map(|r| sanitize(*r)).collect());
        self.rebuild_kernel();
        self.compute_window(self.crossfade);
    }

    /// Build the magnitude kernel from a band design.
    pub fn set_band(&mut self, design: BandDesign, sample_rate: f64) {
        let rolloff = BAND_ROLLOFF_BINS * (sample_rate / self.size as f64) as f32;
        let mut kernel = Vec::new();
        design_band_kernel(design, sample_rate, self.bins(), rolloff, &mut kernel);
        tracing::debug!(?design, sample_rate, rolloff, "filter band set");
        self.set_filter(&kernel, None);
    }

    fn rebuild_kernel(&mut self) {
        let bins = self.bins();
        if !self.source_filter.is_empty() && self.source_filter.len() != bins {
            tracing::debug!(
                from = self.source_filter.len(),
                to = bins,
                "resampling filter kernel"
            );
        }
        resample_kernel(&self.source_filter, bins, &mut self.filter);
        self.phase = self.source_phase.as_ref().map(|src| {
            let mut phase = Vec::with_capacity(bins);
            if src.is_empty() {
                phase.resize(bins, 0.0);
            } else {
                resample_kernel(src, bins, &mut phase);
            }
            phase
        });
    }

    /// Crossfade curves for an overlap of `overlap` samples.
    fn compute_window(&mut self, overlap: usize) {
        let overlap = overlap.min(self.size);
        self.crossfade = overlap;
        self.window.clear();
        self.unwindow.clear();
        for j in 0..overlap {
            let s = (PI * (j as f32 + 0.5) / (2.0 * overlap as f32)).sin();
            let w = s * s;
            self.window.push(w);
            self.unwindow.push(1.0 - w);
        }
    }

    /// Forward FFT, kernel multiply, inverse FFT, in place.
    fn convolve(&mut self, samples: &mut [f32]) {
        self.fft.forward_real(samples);
        let size = self.size;
        let spectrum = self.fft.spectrum_mut();
        for (k, &gain) in self.filter.iter().enumerate() {
            let factor = match &self.phase {
                Some(phase) => Complex32::from_polar(gain, phase[k]),
                None => Complex32::new(gain, 0.0),
            };
            spectrum[k] *= factor;
            let mirror = size - k;
            if k != 0 && mirror != k && mirror < size {
                spectrum[mirror] *= factor.conj();
            }
        }
        self.fft.inverse_real(samples);
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl WindowOp for Filter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn window_op(&mut self, frame: &mut WindowFrame<'_>) {
        let size = self.size;
        if frame.len() != size {
            return;
        }
        let overlap = frame.overlap.min(size);
        if overlap != self.crossfade {
            self.compute_window(overlap);
        }

        if overlap > 0 && (frame.first || !self.has_tail) {
            // Virtual previous window: mirror history followed by the head
            // of the current window, offset by the shared span.
            let shift = size - overlap;
            let mut virtual_prev = std::mem::take(&mut self.virtual_prev);
            let mirror_start = frame.mirror.len().saturating_sub(shift);
            virtual_prev[..shift].copy_from_slice(&frame.mirror[mirror_start..]);
            virtual_prev[shift..].copy_from_slice(&frame.samples[..overlap]);
            self.convolve(&mut virtual_prev);
            self.tail.copy_from_slice(&virtual_prev);
            self.virtual_prev = virtual_prev;
        }

        self.convolve(frame.samples);

        // Tail becomes the unblended transform of this window. Writing
        // tail[j] never clobbers a tail[j + shift] still to be read.
        let shift = size - overlap;
        for j in 0..overlap {
            let current = frame.samples[j];
            let previous = self.tail[j + shift];
            self.tail[j] = current;
            frame.samples[j] = self.window[j] * current + self.unwindow[j] * previous;
        }
        self.tail[overlap..].copy_from_slice(&frame.samples[overlap..]);
        self.has_tail = true;
    }

    fn reset(&mut self) {
        self.tail.fill(0.0);
        self.has_tail = false;
    }

    fn resize(&mut self, size: usize) {
        let size = size.max(1);
        if size == self.size {
            return;
        }
        tracing::debug!(from = self.size, to = size, "filter resized");
        self.size = size;
        self.fft.resize(size);
        self.tail = vec![0.0; size];
        self.virtual_prev = vec![0.0; size];
        self.has_tail = false;
        self.window = Vec::with_capacity(size);
        self.unwindow = Vec::with_capacity(size);
        self.rebuild_kernel();
        self.compute_window(self.crossfade.min(size));
    }

    fn max_filter_samples(&self) -> Option<usize> {
        Some(self.size)
    }

    fn accepts_window_size(&self, size: usize) -> bool {
        size == self.size
    }

    fn save_state(&self, writer: &mut dyn Write) -> Result<()> {
        write_record(
            writer,
            &FilterRecord {
                size: self.size as u64,
                filter: self.source_filter.clone(),
                phase: self.source_phase.clone(),
                tail: self.tail.clone(),
                has_tail: self.has_tail,
            },
        )
    }

    fn load_state(&mut self, reader: &mut dyn Read, version: StateVersion) -> Result<()> {
        if version == StateVersion::V1 {
            return Ok(());
        }
        let record: FilterRecord = read_record(reader)?;
        if record.size != self.size as u64 {
            return Err(Error::SizeMismatch {
                field: "filter size",
                expected: self.size,
                found: record.size as usize,
            });
        }
        if record.tail.len() != self.size {
            return Err(Error::SizeMismatch {
                field: "filter tail",
                expected: self.size,
                found: record.tail.len(),
            });
        }
        self.source_filter = record.filter;
        self.source_phase = record.phase;
        self.tail = record.tail;
        self.has_tail = record.has_tail;
        Ok(())
    }

    fn state_restored(&mut self, _size: usize) {
        self.rebuild_kernel();
        self.compute_window(self.crossfade);
    }
}
