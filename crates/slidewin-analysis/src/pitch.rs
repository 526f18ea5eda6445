//! Spectral pitch detection.
//!
//! Each window is Hann-weighted and transformed; local spectral peaks become
//! [`PitchNode`]s, and peaks sitting at integer multiples of a lower peak are
//! linked to it as harmonics. The strongest candidate inside the active band
//! wins, subject to a level gate, optional jump smoothing and an optional
//! frequency hint.
//!
//! ## Harmonic compensation
//!
//! With compensation on, a candidate scores the sum of its own amplitude and
//! those of its linked harmonics, and pairs of peaks whose frequency ratio is
//! a small fraction `m/n` add a virtual node at their common fundamental.
//! A voice or instrument whose fundamental is weak or missing is then still
//! reported at the right pitch. With `correct` also set, a winner that is
//! itself a harmonic is walked back down its chain to the fundamental.
//!
//! ## Results
//!
//! [`PitchDetect::pitch_result`] always returns the latest estimate. When no
//! peak clears the level gate the result keeps the previous frequency with
//! zero volume, so an unvoiced frame never reports a noise bin.

use std::f32::consts::PI;

use slidewin_core::{
    bin_frequency, design_band_kernel, BandDesign, Fft, WindowConfig, WindowFrame, WindowOp,
};

use crate::{Error, Result};

/// Highest harmonic number linked to a candidate.
const MAX_HARMONIC: usize = 8;

/// Score multiplier for candidates near the frequency hint.
const HINT_BIAS: f32 = 1.5;

/// Upper bound on multi-band divisions.
const MAX_BANDS: usize = 256;

/// Result of pitch detection for a single window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PitchResult {
    /// Detected frequency in Hz. Held from the previous window when unvoiced.
    pub frequency: f32,
    /// Amplitude of the winning candidate (0.0 when unvoiced)
    pub volume: f32,
    /// Nearest MIDI note number (if voiced)
    pub midi_note: Option<u8>,
    /// Cents deviation from nearest note (-50 to +50)
    pub cents_offset: f32,
}

impl PitchResult {
    pub fn voiced(frequency: f32, volume: f32) -> Self {
        let (note, cents) = freq_to_midi(frequency);
        Self {
            frequency,
            volume,
            midi_note: (frequency > 0.0).then_some(note),
            cents_offset: cents,
        }
    }

    /// "No pitch": keeps `frequency`, reports zero volume.
    pub fn unvoiced(frequency: f32) -> Self {
        Self {
            frequency,
            ..Self::default()
        }
    }

    /// Check if a pitch was detected
    pub fn is_voiced(&self) -> bool {
        self.frequency > 0.0 && self.volume > 0.0
    }

    /// Get note name with sharp notation (e.g., "A4", "C#5")
    pub fn note_name(&self) -> Option<String> {
        self.midi_note.map(|note| {
            const NAMES: [&str; 12] = [
                "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
            ];
            let name = NAMES[(note % 12) as usize];
            let octave = (note / 12) as i32 - 1;
            format!("{}{}", name, octave)
        })
    }
}

/// Convert frequency to the nearest MIDI note and the cents offset from it.
pub fn freq_to_midi(freq: f32) -> (u8, f32) {
    if freq <= 0.0 {
        return (0, 0.0);
    }

    let note_float = 69.0 + 12.0 * (freq / 440.0).log2();
    let note = (note_float.round() as i32).clamp(0, 127) as u8;

    let cents = 1200.0 * (freq / midi_to_freq(note)).log2();
    (note, cents)
}

/// Convert MIDI note to frequency
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * 2.0f32.powf((note as f32 - 69.0) / 12.0)
}

/// A spectral peak, real or inferred, and its harmonic links.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchNode {
    pub frequency: f32,
    /// Amplitude of this peak alone.
    pub single: f32,
    /// `single` plus the amplitudes of linked harmonics.
    pub accumulated: f32,
    /// Lowest linked harmonic.
    pub next: Option<usize>,
    /// Fundamental this node is a harmonic of.
    pub prev: Option<usize>,
    pub is_harmonic: bool,
}

impl PitchNode {
    fn new(frequency: f32, single: f32) -> Self {
        Self {
            frequency,
            single,
            accumulated: single,
            next: None,
            prev: None,
            is_harmonic: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HarmonicCompensation {
    on: bool,
    correct: bool,
    error: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrequencyHint {
    frequency: f32,
    bandwidth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MultiBand {
    start: f32,
    end: f32,
    divs: usize,
    log: bool,
}

/// Spectral pitch detector driven by the window path.
///
/// The audio passes through unchanged.
pub struct PitchDetect {
    size: usize,
    sample_rate: f64,
    fft: Fft,
    hann: Vec<f32>,
    hann_sum: f32,
    amplitude: Vec<f32>,

    low_freq: f32,
    high_freq: f32,
    floating: Option<f32>,
    compensation: HarmonicCompensation,
    min_level: f32,
    smooth_jumps: Option<f32>,
    hint: Option<FrequencyHint>,
    prefilter: Option<f32>,
    prefilter_kernel: Vec<f32>,

    last: PitchResult,
    candidate: Option<f32>,
    nodes: Vec<PitchNode>,

    multi: bool,
    multi_band: MultiBand,
    band_edges: Vec<f32>,
    multi_results: Vec<PitchResult>,
}

impl PitchDetect {
    pub fn new(size: usize, sample_rate: f64) -> Self {
        let config = WindowConfig::new(size, 0).with_sample_rate(sample_rate).sanitized();
        let size = config.window_size;
        let nyquist = (config.sample_rate / 2.0) as f32;
        let mut detect = Self {
            size,
            sample_rate: config.sample_rate,
            fft: Fft::new(size),
            hann: Vec::new(),
            hann_sum: 1.0,
            amplitude: Vec::new(),
            low_freq: 20.0_f32.min(nyquist),
            high_freq: nyquist,
            floating: None,
            compensation: HarmonicCompensation {
                on: false,
                correct: false,
                error: 0.03,
            },
            min_level: 0.01,
            smooth_jumps: None,
            hint: None,
            prefilter: None,
            prefilter_kernel: Vec::new(),
            last: PitchResult::default(),
            candidate: None,
            nodes: Vec::new(),
            multi: false,
            multi_band: MultiBand {
                start: 50.0,
                end: 5000.0,
                divs: 8,
                log: true,
            },
            band_edges: Vec::new(),
            multi_results: Vec::new(),
        };
        detect.allocate();
        detect.rebuild_bands();
        detect
    }

    pub fn builder() -> PitchDetectBuilder {
        PitchDetectBuilder::default()
    }

    fn allocate(&mut self) {
        let size = self.size;
        let bins = size / 2 + 1;
        self.fft.resize(size);
        self.hann = (0..size)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
            .collect();
        self.hann_sum = self.hann.iter().sum::<f32>().max(f32::EPSILON);
        self.amplitude = vec![0.0; bins];
        self.prefilter_kernel = Vec::with_capacity(bins);
        self.nodes = Vec::with_capacity(bins / 2 + 2 * MAX_HARMONIC);
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn nyquist(&self) -> f32 {
        (self.sample_rate / 2.0) as f32
    }

    /// Frequency resolution in Hz.
    pub fn bin_width(&self) -> f32 {
        bin_frequency(1, self.size, self.sample_rate)
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        let config = WindowConfig::new(self.size, 0)
            .with_sample_rate(sample_rate)
            .sanitized();
        if config.sample_rate != sample_rate {
            tracing::warn!(requested = sample_rate, "sample rate clamped to {}", config.sample_rate);
        }
        self.sample_rate = config.sample_rate;
        let (low, high) = (self.low_freq, self.high_freq);
        self.set_bandwidth(low, high);
        self.rebuild_bands();
    }

    /// Single-band (`false`) or multi-band (`true`) detection.
    pub fn set_pitch_mode(&mut self, multi: bool) {
        self.multi = multi;
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Partition `[start, end]` into `divs` bands, linearly or logarithmically.
    pub fn set_multi_parms(&mut self, start: f32, end: f32, divs: usize, log: bool) {
        let nyquist = self.nyquist();
        let mut start = finite_or(start, 0.0).clamp(0.0, nyquist);
        let end = finite_or(end, nyquist).clamp(0.0, nyquist);
        if log && start < 1.0 {
            start = 1.0;
        }
        let divs_c = divs.clamp(1, MAX_BANDS);
        if divs_c != divs {
            tracing::warn!(requested = divs, "band count clamped to {}", divs_c);
        }
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.multi_band = MultiBand {
            start,
            end,
            divs: divs_c,
            log,
        };
        self.rebuild_bands();
    }

    fn rebuild_bands(&mut self) {
        let MultiBand {
            start,
            end,
            divs,
            log,
        } = self.multi_band;
        self.band_edges.clear();
        for i in 0..=divs {
            let t = i as f32 / divs as f32;
            let edge = if log && start > 0.0 {
                start * (end / start).powf(t)
            } else {
                start + (end - start) * t
            };
            self.band_edges.push(edge);
        }
        self.multi_results.clear();
        self.multi_results.resize(divs, PitchResult::default());
        tracing::debug!(divs, start, end, log, "pitch bands rebuilt");
    }

    /// Restrict single-band detection to `[low, high]` Hz.
    pub fn set_bandwidth(&mut self, low: f32, high: f32) {
        let nyquist = self.nyquist();
        let low = finite_or(low, 0.0).clamp(0.0, nyquist);
        let high = finite_or(high, nyquist).clamp(0.0, nyquist);
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        self.low_freq = low;
        self.high_freq = high;
    }

    pub fn bandwidth(&self) -> (f32, f32) {
        (self.low_freq, self.high_freq)
    }

    /// Amplitude below which no pitch is reported.
    pub fn set_min_level(&mut self, min: f32) {
        self.min_level = finite_or(min, 0.0).max(0.0);
    }

    /// Track the last pitch within `± bandwidth` Hz.
    pub fn set_floating_bandwidth(&mut self, on: bool, bandwidth: f32) {
        self.floating = on.then(|| finite_or(bandwidth, 0.0).max(0.0));
    }

    /// `error` is the relative tolerance for a harmonic match, clamped to `[0, 0.5]`.
    pub fn set_harmonic_compensation(&mut self, on: bool, correct: bool, error: f32) {
        let error_c = finite_or(error, 0.03).clamp(0.0, 0.5);
        if error_c != error {
            tracing::warn!(requested = error, "harmonic error clamped to {}", error_c);
        }
        self.compensation = HarmonicCompensation {
            on,
            correct,
            error: error_c,
        };
    }

    /// Report a jump larger than `min_jump` Hz only once the next window
    /// confirms it.
    pub fn set_smooth_jumps(&mut self, on: bool, min_jump: f32) {
        self.smooth_jumps = on.then(|| finite_or(min_jump, 0.0).max(0.0));
        self.candidate = None;
    }

    /// Prefer candidates within `hint ± bandwidth` Hz.
    pub fn set_frequency_hint(&mut self, on: bool, hint: f32, bandwidth: f32) {
        self.hint = on.then(|| FrequencyHint {
            frequency: finite_or(hint, 0.0).max(0.0),
            bandwidth: finite_or(bandwidth, 0.0).max(0.0),
        });
    }

    /// Weight the spectrum by a band-pass around the active band before
    /// peak picking, with `rolloff` Hz transitions.
    pub fn set_prefilter(&mut self, on: bool, rolloff: f32) {
        self.prefilter = on.then(|| finite_or(rolloff, 0.0).max(0.0));
    }

    /// Latest estimate. Pure accessor.
    pub fn pitch_result(&self) -> PitchResult {
        self.last
    }

    /// Per-band results of the last window in multi-band mode, lowest band
    /// first.
    pub fn multi_results(&self) -> &[PitchResult] {
        &self.multi_results
    }

    /// Band edges in Hz; band `i` spans `edges[i]..edges[i + 1]`.
    pub fn band_edges(&self) -> &[f32] {
        &self.band_edges
    }

    /// Candidates from the last window, ascending in frequency.
    pub fn nodes(&self) -> &[PitchNode] {
        &self.nodes
    }

    /// Active single band: the configured band, narrowed around the last
    /// pitch while floating.
    fn select_band(&self) -> (f32, f32) {
        match self.floating {
            Some(bw) if self.last.is_voiced() => {
                let f = self.last.frequency;
                ((f - bw).max(self.low_freq), (f + bw).min(self.high_freq))
            }
            _ => (self.low_freq, self.high_freq),
        }
    }

    fn select_multiple_bands(&self, band: usize) -> (f32, f32) {
        (self.band_edges[band], self.band_edges[band + 1])
    }

    /// Weight the amplitude spectrum by a band-pass over `[low, high]`.
    fn design_filter(&mut self, low: f32, high: f32) {
        let Some(rolloff) = self.prefilter else {
            return;
        };
        design_band_kernel(
            BandDesign::BandPass { low, high },
            self.sample_rate,
            self.amplitude.len(),
            rolloff,
            &mut self.prefilter_kernel,
        );
        for (a, g) in self.amplitude.iter_mut().zip(self.prefilter_kernel.iter()) {
            *a *= g;
        }
    }

    /// Hann-windowed amplitude spectrum, scaled so a full-scale sine reads
    /// its amplitude.
    fn analyze(&mut self, samples: &[f32]) {
        self.fft.forward_windowed(samples, &self.hann);
        let scale = 2.0 / self.hann_sum;
        for (a, bin) in self.amplitude.iter_mut().zip(self.fft.spectrum()) {
            *a = bin.norm() * scale;
        }
    }

    /// Parabolic peak interpolation on log amplitudes around bin `k`.
    fn interpolate_peak(&self, k: usize) -> (f32, f32) {
        let ln = |a: f32| (a + 1e-12).ln();
        let alpha = ln(self.amplitude[k - 1]);
        let beta = ln(self.amplitude[k]);
        let gamma = ln(self.amplitude[k + 1]);
        let denom = alpha - 2.0 * beta + gamma;
        let p = if denom.abs() > f32::EPSILON {
            (0.5 * (alpha - gamma) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        let frequency = (k as f32 + p) * self.bin_width();
        let amplitude = (beta - 0.25 * (alpha - gamma) * p).exp();
        (frequency, amplitude)
    }

    /// Rebuild the candidate list from the current spectrum.
    fn detect_harmonics(&mut self) {
        self.nodes.clear();
        let floor = self.min_level / 4.0;
        let bins = self.amplitude.len();
        for k in 1..bins.saturating_sub(1) {
            let a = self.amplitude[k];
            if a > 0.0 && a >= floor && a > self.amplitude[k - 1] && a >= self.amplitude[k + 1] {
                let (frequency, amplitude) = self.interpolate_peak(k);
                self.nodes.push(PitchNode::new(frequency, amplitude));
            }
        }

        if self.compensation.on {
            self.add_missing_fundamentals();
        }
        self.link_harmonics();
    }

    /// For peaks at a ratio `m/n` (reduced, `n >= 2`), add a node at the
    /// fundamental they share unless one is already there.
    fn add_missing_fundamentals(&mut self) {
        let error = self.compensation.error;
        let real = self.nodes.len();
        for i in 0..real {
            if self.nodes[i].single < self.min_level {
                continue;
            }
            for j in (i + 1)..real {
                if self.nodes[j].single < self.min_level {
                    continue;
                }
                let low = self.nodes[i].frequency;
                let ratio = self.nodes[j].frequency / low;
                let Some(n) = small_fraction_denominator(ratio, error) else {
                    continue;
                };
                let fundamental = low / n as f32;
                if fundamental < self.bin_width() {
                    continue;
                }
                let tol = error * fundamental;
                let exists = self
                    .nodes
                    .iter()
                    .any(|node| (node.frequency - fundamental).abs() <= tol);
                if !exists {
                    self.nodes.push(PitchNode::new(fundamental, 0.0));
                }
            }
        }
        if self.nodes.len() > real {
            self.nodes
                .sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
        }
    }

    fn link_harmonics(&mut self) {
        let error = self.compensation.error;
        let count = self.nodes.len();
        for i in 0..count {
            let base = self.nodes[i].frequency;
            let mut accumulated = self.nodes[i].single;
            let mut first_link = None;
            for k in 2..=MAX_HARMONIC {
                let target = base * k as f32;
                let tol = error * target;
                let Some(j) = nearest_node(&self.nodes, target, tol) else {
                    continue;
                };
                if j <= i {
                    continue;
                }
                accumulated += self.nodes[j].single;
                self.nodes[j].is_harmonic = true;
                if self.nodes[j].prev.is_none() {
                    self.nodes[j].prev = Some(i);
                }
                first_link.get_or_insert(j);
            }
            self.nodes[i].accumulated = accumulated;
            self.nodes[i].next = first_link;
        }
    }

    fn score_basis(&self, node: &PitchNode) -> f32 {
        if self.compensation.on {
            node.accumulated
        } else {
            node.single
        }
    }

    /// Strongest candidate in `[low, high]` as `(frequency, volume)`.
    fn select_candidate(&self, low: f32, high: f32) -> Option<(f32, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.frequency < low || node.frequency > high {
                continue;
            }
            let mut score = self.score_basis(node);
            if let Some(hint) = self.hint {
                if (node.frequency - hint.frequency).abs() <= hint.bandwidth {
                    score *= HINT_BIAS;
                }
            }
            // Strictly greater: ties keep the lower frequency.
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        let (mut index, _) = best?;
        let volume = self.score_basis(&self.nodes[index]);
        if self.compensation.on && self.compensation.correct {
            while let Some(prev) = self.nodes[index].prev {
                index = prev;
            }
        }
        Some((self.nodes[index].frequency, volume))
    }

    fn smooth(&mut self, frequency: f32, volume: f32) -> PitchResult {
        let Some(min_jump) = self.smooth_jumps else {
            return PitchResult::voiced(frequency, volume);
        };
        if !self.last.is_voiced() || (frequency - self.last.frequency).abs() <= min_jump {
            self.candidate = None;
            return PitchResult::voiced(frequency, volume);
        }
        match self.candidate {
            Some(candidate) if (frequency - candidate).abs() <= min_jump => {
                self.candidate = None;
                PitchResult::voiced(frequency, volume)
            }
            _ => {
                self.candidate = Some(frequency);
                PitchResult::voiced(self.last.frequency, volume)
            }
        }
    }

    fn detect_single(&mut self) {
        let (low, high) = self.select_band();
        self.design_filter(low, high);
        self.detect_harmonics();
        self.last = match self.select_candidate(low, high) {
            Some((frequency, volume)) if volume >= self.min_level && volume > 0.0 => {
                self.smooth(frequency, volume)
            }
            _ => {
                self.candidate = None;
                PitchResult::unvoiced(self.last.frequency)
            }
        };
    }

    fn detect_multi(&mut self) {
        let (start, end) = (self.band_edges[0], self.band_edges[self.band_edges.len() - 1]);
        self.design_filter(start, end);
        self.detect_harmonics();
        let mut loudest: Option<PitchResult> = None;
        for band in 0..self.multi_results.len() {
            let (low, high) = self.select_multiple_bands(band);
            let result = match self.select_candidate(low, high) {
                Some((frequency, volume)) if volume >= self.min_level && volume > 0.0 => {
                    PitchResult::voiced(frequency, volume)
                }
                _ => PitchResult::unvoiced(self.multi_results[band].frequency),
            };
            if result.is_voiced() && loudest.map_or(true, |l| result.volume > l.volume) {
                loudest = Some(result);
            }
            self.multi_results[band] = result;
        }
        self.last = loudest.unwrap_or_else(|| PitchResult::unvoiced(self.last.frequency));
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Smallest `n >= 2` such that `ratio ≈ m/n` (reduced, `n < m <= 8`).
fn small_fraction_denominator(ratio: f32, error: f32) -> Option<usize> {
    for n in 2..MAX_HARMONIC {
        for m in (n + 1)..=MAX_HARMONIC {
            if gcd(m, n) != 1 {
                continue;
            }
            let target = m as f32 / n as f32;
            if (ratio - target).abs() <= error * target {
                return Some(n);
            }
        }
    }
    None
}

/// Index of the node closest to `target` within `tol`. `nodes` is sorted.
fn nearest_node(nodes: &[PitchNode], target: f32, tol: f32) -> Option<usize> {
    let start = nodes.partition_point(|n| n.frequency < target - tol);
    nodes[start..]
        .iter()
        .take_while(|n| n.frequency <= target + tol)
        .enumerate()
        .min_by(|a, b| {
            (a.1.frequency - target)
                .abs()
                .total_cmp(&(b.1.frequency - target).abs())
        })
        .map(|(offset, _)| start + offset)
}

impl Default for PitchDetect {
    fn default() -> Self {
        Self::new(2048, 44100.0)
    }
}

impl WindowOp for PitchDetect {
    fn name(&self) -> &'static str {
        "pitch_detect"
    }

    fn window_op(&mut self, frame: &mut WindowFrame<'_>) {
        if frame.len() != self.size {
            self.resize(frame.len());
        }
        self.analyze(frame.samples);
        if self.multi {
            self.detect_multi();
        } else {
            self.detect_single();
        }
    }

    fn reset(&mut self) {
        self.last = PitchResult::default();
        self.candidate = None;
        self.nodes.clear();
        self.multi_results.fill(PitchResult::default());
    }

    fn resize(&mut self, size: usize) {
        let size = size.max(1);
        if size == self.size {
            return;
        }
        tracing::debug!(from = self.size, to = size, "pitch detector resized");
        self.size = size;
        self.allocate();
    }

    fn max_filter_samples(&self) -> Option<usize> {
        Some(self.size)
    }
}

/// Builder for configuring a [`PitchDetect`] with fluent API.
#[derive(Clone, Debug)]
pub struct PitchDetectBuilder {
    size: usize,
    sample_rate: f64,
    band: Option<(f32, f32)>,
    min_level: f32,
    floating: Option<f32>,
    compensation: Option<(bool, f32)>,
    smooth_jumps: Option<f32>,
    hint: Option<(f32, f32)>,
    prefilter: Option<f32>,
    multi: Option<(f32, f32, usize, bool)>,
}

impl Default for PitchDetectBuilder {
    fn default() -> Self {
        Self {
            size: 2048,
            sample_rate: 44100.0,
            band: None,
            min_level: 0.01,
            floating: None,
            compensation: None,
            smooth_jumps: None,
            hint: None,
            prefilter: None,
            multi: None,
        }
    }
}

impl PitchDetectBuilder {
    /// FFT size in samples (matches the driving window)
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Detection band in Hz
    pub fn band(mut self, low: f32, high: f32) -> Self {
        self.band = Some((low, high));
        self
    }

    pub fn min_level(mut self, min: f32) -> Self {
        self.min_level = min;
        self
    }

    pub fn floating_bandwidth(mut self, bandwidth: f32) -> Self {
        self.floating = Some(bandwidth);
        self
    }

    pub fn harmonic_compensation(mut self, correct: bool, error: f32) -> Self {
        self.compensation = Some((correct, error));
        self
    }

    pub fn smooth_jumps(mut self, min_jump: f32) -> Self {
        self.smooth_jumps = Some(min_jump);
        self
    }

    pub fn frequency_hint(mut self, hint: f32, bandwidth: f32) -> Self {
        self.hint = Some((hint, bandwidth));
        self
    }

    pub fn prefilter(mut self, rolloff: f32) -> Self {
        self.prefilter = Some(rolloff);
        self
    }

    /// Multi-band mode over `[start, end]` split into `divs` bands
    pub fn multi_band(mut self, start: f32, end: f32, divs: usize, log: bool) -> Self {
        self.multi = Some((start, end, divs, log));
        self
    }

    /// Validate and build. Unlike the setters, nothing is clamped silently.
    pub fn build(self) -> Result<PitchDetect> {
        WindowConfig::new(self.size, 0)
            .with_sample_rate(self.sample_rate)
            .validate()?;
        let nyquist = (self.sample_rate / 2.0) as f32;
        if let Some((low, high)) = self.band {
            if !(low.is_finite() && high.is_finite()) || low < 0.0 || high <= low || high > nyquist
            {
                return Err(Error::InvalidBand { low, high });
            }
        }
        if !self.min_level.is_finite() || self.min_level < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "min level {}",
                self.min_level
            )));
        }

        let mut detect = PitchDetect::new(self.size, self.sample_rate);
        if let Some((low, high)) = self.band {
            detect.set_bandwidth(low, high);
        }
        detect.set_min_level(self.min_level);
        if let Some(bandwidth) = self.floating {
            detect.set_floating_bandwidth(true, bandwidth);
        }
        if let Some((correct, error)) = self.compensation {
            detect.set_harmonic_compensation(true, correct, error);
        }
        if let Some(min_jump) = self.smooth_jumps {
            detect.set_smooth_jumps(true, min_jump);
        }
        if let Some((hint, bandwidth)) = self.hint {
            detect.set_frequency_hint(true, hint, bandwidth);
        }
        if let Some(rolloff) = self.prefilter {
            detect.set_prefilter(true, rolloff);
        }
        if let Some((start, end, divs, log)) = self.multi {
            detect.set_multi_parms(start, end, divs, log);
            detect.set_pitch_mode(true);
        }
        Ok(detect)
    }
}
