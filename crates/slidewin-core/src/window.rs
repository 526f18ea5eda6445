//! The sliding-window driver.

use std::collections::VecDeque;
use std::io::{Read, Write};

use crate::config::{WindowConfig, MAX_WINDOW_SIZE};
use crate::mirror::fill_mirror;
use crate::op::{ShiftFrame, WindowFrame, WindowOp};
use crate::state::{StateVersion, WindowState};
use crate::{Error, Result};

/// Streams samples through a [`WindowOp`], one window or block at a time.
///
/// Two entry points share one history:
///
/// - [`filter_samples`](Self::filter_samples) assembles overlapping windows
///   and emits each window's first `hop` samples after the operator ran.
///   Output lags input by a constant `window_size - 1` samples, so the
///   result does not depend on how the input is chunked.
/// - [`shift_samples`](Self::shift_samples) hands blocks of new samples to
///   the operator together with the history that precedes them. No latency.
///
/// # Example
///
/// ```
/// use slidewin_core::{Passthrough, SlidingWindow};
///
/// let mut window = SlidingWindow::new(4, 2, Passthrough);
/// let input = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
/// let mut output = [0.0; 6];
/// window.filter_samples(&input, &mut output);
/// assert_eq!(output, [0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
/// ```
pub struct SlidingWindow<Op> {
    window_size: usize,
    overlap: usize,
    last_filtered_sample: usize,
    previous_data: VecDeque<f32>,
    mirror_data: Vec<f32>,
    /// Window copy for `window_op`, history view for `shift_op`.
    scratch: Vec<f32>,
    shift_out: Vec<f32>,
    pending: VecDeque<f32>,
    primed: usize,
    delivered: u64,
    fill: f32,
    last_hop: usize,
    cold: bool,
    windows: u64,
    shift_blocks: u64,
    op: Op,
}

impl<Op: WindowOp> SlidingWindow<Op> {
    /// Version tag written by [`save`](Self::save).
    pub const STATE_VERSION: StateVersion = StateVersion::CURRENT;

    pub fn new(window_size: usize, overlap: usize, op: Op) -> Self {
        let config = WindowConfig::new(window_size, overlap).sanitized();
        Self::with_config(&config, op)
    }

    pub fn with_config(config: &WindowConfig, mut op: Op) -> Self {
        let config = config.sanitized();
        let size = config.window_size;
        op.resize(size);

        let mut window = Self {
            window_size: size,
            overlap: config.overlap,
            last_filtered_sample: 0,
            previous_data: VecDeque::from(vec![0.0; size]),
            mirror_data: vec![0.0; size],
            scratch: vec![0.0; size],
            shift_out: vec![0.0; size],
            pending: VecDeque::with_capacity(size),
            primed: size - 1,
            delivered: 0,
            fill: 0.0,
            last_hop: size - config.overlap,
            cold: true,
            windows: 0,
            shift_blocks: 0,
            op,
        };
        window.reset(0.0);
        window
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Samples emitted per window.
    pub fn hop(&self) -> usize {
        self.window_size - self.overlap
    }

    /// Samples in the window currently being assembled.
    pub fn last_filtered_sample(&self) -> usize {
        self.last_filtered_sample
    }

    /// The most recent `window_size` samples, oldest first.
    pub fn previous_data(&self) -> &VecDeque<f32> {
        &self.previous_data
    }

    /// Before-stream history, oldest first.
    pub fn mirror_data(&self) -> &[f32] {
        &self.mirror_data
    }

    /// Delay of the window path in samples.
    pub fn latency(&self) -> usize {
        self.window_size - 1
    }

    /// Samples delivered through either path since the last reset.
    pub fn samples_delivered(&self) -> u64 {
        self.delivered
    }

    pub fn max_filter_samples(&self) -> Option<usize> {
        self.op.max_filter_samples()
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn op_mut(&mut self) -> &mut Op {
        &mut self.op
    }

    pub fn into_op(self) -> Op {
        self.op
    }

    /// Change the overlap for subsequent windows.
    pub fn set_overlap(&mut self, overlap: usize) {
        let clamped = overlap.min(self.window_size - 1);
        if clamped != overlap {
            tracing::warn!(
                requested = overlap,
                window_size = self.window_size,
                "overlap clamped to {}",
                clamped
            );
        }
        self.overlap = clamped;
    }

    /// Clear all stream state and treat everything before the next sample
    /// as `val`.
    pub fn reset(&mut self, val: f32) {
        let val = if val.is_finite() {
            val
        } else {
            tracing::warn!("non-finite reset value replaced by 0");
            0.0
        };
        self.fill = val;
        self.previous_data.iter_mut().for_each(|s| *s = val);
        self.mirror_data.fill(val);
        self.pending.clear();
        self.last_filtered_sample = 0;
        self.primed = self.window_size - 1;
        self.delivered = 0;
        self.last_hop = self.window_size - self.overlap;
        self.cold = true;
        self.windows = 0;
        self.shift_blocks = 0;
        self.op.reset();
    }

    /// Change the window size.
    ///
    /// With `preserve`, the newest history stays right-aligned and queued
    /// output survives (oldest dropped first when it no longer fits).
    /// Otherwise the stream restarts from silence at the new size.
    pub fn resize(&mut self, size: usize, preserve: bool) {
        let clamped = size.clamp(1, MAX_WINDOW_SIZE);
        if clamped != size {
            tracing::warn!(requested = size, "window size clamped to {}", clamped);
        }
        let size = clamped;
        tracing::debug!(
            op = self.op.name(),
            from = self.window_size,
            to = size,
            preserve,
            "resizing sliding window"
        );

        let keep = self.window_size.min(size);
        let mut history = VecDeque::with_capacity(size);
        history.extend(std::iter::repeat(self.fill).take(size - keep));
        history.extend(self.previous_data.iter().skip(self.window_size - keep));
        self.previous_data = history;

        let mut mirror = vec![self.fill; size];
        mirror[size - keep..].copy_from_slice(&self.mirror_data[self.window_size - keep..]);
        self.mirror_data = mirror;

        self.scratch.resize(size, 0.0);
        self.shift_out.resize(size, 0.0);
        self.window_size = size;
        self.overlap = self.overlap.min(size - 1);
        self.last_hop = self.last_hop.min(size);
        self.op.resize(size);

        if !preserve {
            self.pending = VecDeque::with_capacity(size);
            self.reset(0.0);
            return;
        }

        while self.pending.len() > size - 1 {
            self.pending.pop_front();
        }
        self.pending.reserve(size.saturating_sub(self.pending.len()));
        self.last_filtered_sample = self
            .last_filtered_sample
            .min(size - 1 - self.pending.len());
        self.primed = size - 1 - self.pending.len() - self.last_filtered_sample;
    }

    /// Window path. Consumes `min(source.len(), dest.len())` samples and
    /// writes the same number of output samples.
    pub fn filter_samples(&mut self, source: &[f32], dest: &mut [f32]) -> usize {
        let count = source.len().min(dest.len());
        for (&input, out) in source[..count].iter().zip(dest[..count].iter_mut()) {
            self.push_history(input);
            self.last_filtered_sample += 1;
            if self.last_filtered_sample >= self.window_size {
                self.run_window();
            }
            *out = match self.pending.pop_front() {
                Some(sample) => sample,
                None => {
                    self.primed = self.primed.saturating_sub(1);
                    self.fill
                }
            };
        }
        count
    }

    /// Shift path. The last `shift` samples of `source` are new; the rest is
    /// context already delivered earlier.
    ///
    /// `dest` is aligned to the end of `source`: new samples receive the
    /// operator output and context samples are copied through. Returns the
    /// number of new samples consumed.
    pub fn shift_samples(&mut self, source: &[f32], dest: &mut [f32], shift: usize) -> usize {
        let shift = shift.min(source.len());
        let fresh_start = source.len() - shift;
        let aligned = source.len().min(dest.len());
        let skip = source.len() - aligned;
        let dest_offset = dest.len() - aligned;

        for i in skip..fresh_start {
            dest[dest_offset + i - skip] = source[i];
        }

        let mut offset = fresh_start;
        while offset < source.len() {
            let end = (offset + self.window_size).min(source.len());
            let block = &source[offset..end];
            self.run_shift(block);
            for (j, &value) in self.shift_out[..block.len()].iter().enumerate() {
                let i = offset + j;
                if i >= skip {
                    dest[dest_offset + i - skip] = value;
                }
            }
            offset = end;
        }
        shift
    }

    /// Write the driver record followed by the operator record.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        let state = WindowState {
            window_size: self.window_size,
            overlap: self.overlap,
            last_filtered_sample: self.last_filtered_sample,
            previous_data: self.previous_data.iter().copied().collect(),
            mirror_data: self.mirror_data.clone(),
            delivered: self.delivered,
            fill: self.fill,
            primed: self.primed,
            last_hop: self.last_hop,
            cold: self.cold,
            windows: self.windows,
            shift_blocks: self.shift_blocks,
            pending: self.pending.iter().copied().collect(),
        };
        state.write(&mut writer)?;
        self.op.save_state(&mut writer)
    }

    /// Restore from a stream written with `version`.
    ///
    /// Everything is decoded and validated before anything is adopted; on
    /// error the window and its operator are unchanged.
    pub fn load<R: Read>(&mut self, mut reader: R, version: StateVersion) -> Result<()> {
        let state = WindowState::read(&mut reader, version)?;
        if !self.op.accepts_window_size(state.window_size) {
            tracing::warn!(
                op = self.op.name(),
                size = state.window_size,
                "restored window size rejected"
            );
            return Err(Error::RejectedWindowSize {
                op: self.op.name(),
                size: state.window_size,
            });
        }
        self.op.load_state(&mut reader, version)?;

        let resized = state.window_size != self.window_size;
        self.commit(state);
        if resized {
            self.op.resize(self.window_size);
        }
        self.op.state_restored(self.window_size);
        tracing::debug!(
            op = self.op.name(),
            window_size = self.window_size,
            version = version.tag(),
            "sliding window state restored"
        );
        Ok(())
    }

    fn commit(&mut self, state: WindowState) {
        let size = state.window_size;
        self.window_size = size;
        self.overlap = state.overlap;
        self.last_filtered_sample = state.last_filtered_sample;
        self.previous_data = VecDeque::from(state.previous_data);
        self.mirror_data = state.mirror_data;
        self.scratch.resize(size, 0.0);
        self.shift_out.resize(size, 0.0);
        let mut pending = VecDeque::with_capacity(size);
        pending.extend(state.pending);
        self.pending = pending;
        self.primed = state.primed;
        self.delivered = state.delivered;
        self.fill = state.fill;
        self.last_hop = state.last_hop;
        self.cold = state.cold;
        self.windows = state.windows;
        self.shift_blocks = state.shift_blocks;
    }

    #[inline]
    fn push_history(&mut self, sample: f32) {
        self.previous_data.pop_front();
        self.previous_data.push_back(sample);
        self.delivered += 1;
    }

    /// Real samples currently held in history.
    fn real_in_history(&self) -> usize {
        self.delivered.min(self.window_size as u64) as usize
    }

    /// Rebuild the mirror from the oldest real samples available, followed
    /// by `upcoming`.
    fn warm_mirror(&mut self, upcoming: &[f32]) {
        let size = self.window_size;
        let real = self.real_in_history();
        let (front, back) = self.previous_data.as_slices();
        let mut n = 0;
        for &s in front.iter().chain(back).skip(size - real) {
            self.scratch[n] = s;
            n += 1;
        }
        for &s in upcoming.iter().take(size - n) {
            self.scratch[n] = s;
            n += 1;
        }
        fill_mirror(&mut self.mirror_data, &self.scratch[..n], self.fill);
        self.cold = false;
    }

    fn run_window(&mut self) {
        if self.cold {
            self.warm_mirror(&[]);
        }
        let size = self.window_size;
        let hop = size - self.overlap;
        let first = self.windows == 0;
        let shared = if first { size - hop } else { size - self.last_hop };

        let (front, back) = self.previous_data.as_slices();
        self.scratch[..front.len()].copy_from_slice(front);
        self.scratch[front.len()..size].copy_from_slice(back);

        let mut frame = WindowFrame {
            samples: &mut self.scratch[..size],
            hop,
            overlap: shared,
            start: self.delivered.saturating_sub(size as u64),
            first,
            mirror: &self.mirror_data,
        };
        self.op.window_op(&mut frame);

        self.pending.extend(self.scratch[..hop].iter().copied());
        self.last_filtered_sample = size - hop;
        self.last_hop = hop;
        self.windows += 1;
    }

    fn run_shift(&mut self, block: &[f32]) {
        if self.cold {
            self.warm_mirror(block);
        }
        let size = self.window_size;
        let real = self.real_in_history();
        let before = size - real;

        // History view: mirror tail, then the real samples delivered so far.
        self.scratch[..before].copy_from_slice(&self.mirror_data[real..]);
        for (slot, &s) in self.scratch[before..size]
            .iter_mut()
            .zip(self.previous_data.iter().skip(before))
        {
            *slot = s;
        }

        let len = block.len();
        let mut frame = ShiftFrame {
            history: &self.scratch[..size],
            input: block,
            output: &mut self.shift_out[..len],
            start: self.delivered,
            first: self.shift_blocks == 0,
        };
        self.op.shift_op(&mut frame);

        for &s in block {
            self.push_history(s);
        }
        self.shift_blocks += 1;
    }
}

impl<Op: WindowOp + Default> Default for SlidingWindow<Op> {
    fn default() -> Self {
        Self::with_config(&WindowConfig::default(), Op::default())
    }
}

impl<Op> std::fmt::Debug for SlidingWindow<Op> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindow")
            .field("window_size", &self.window_size)
            .field("overlap", &self.overlap)
            .field("last_filtered_sample", &self.last_filtered_sample)
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}
