//! Operator hooks invoked by the sliding-window driver.

use std::io::{Read, Write};

use crate::{Result, StateVersion};

/// A full window handed to [`WindowOp::window_op`].
///
/// `samples` is a private copy of the most recent `window_size` samples and
/// may be transformed in place. Only the first `hop` samples are emitted
/// once the hook returns; the rest of the window is seen again by the next
/// window.
pub struct WindowFrame<'a> {
    pub samples: &'a mut [f32],
    /// Leading samples that become final output after this window.
    pub hop: usize,
    /// Samples this window shares with the previous one.
    pub overlap: usize,
    /// Absolute stream index (since reset) of `samples[0]`.
    pub start: u64,
    /// First window since reset.
    pub first: bool,
    /// Before-stream history, oldest first.
    pub mirror: &'a [f32],
}

impl WindowFrame<'_> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn emitted(&self) -> &[f32] {
        &self.samples[..self.hop]
    }

    pub fn emitted_mut(&mut self) -> &mut [f32] {
        &mut self.samples[..self.hop]
    }
}

/// A block of new samples handed to [`WindowOp::shift_op`].
pub struct ShiftFrame<'a> {
    /// The `window_size` samples preceding `input`, oldest first. Samples
    /// from before the stream start come from the mirror.
    pub history: &'a [f32],
    pub input: &'a [f32],
    /// Same length as `input`.
    pub output: &'a mut [f32],
    /// Absolute stream index (since reset) of `input[0]`.
    pub start: u64,
    /// First block since reset.
    pub first: bool,
}

impl ShiftFrame<'_> {
    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Last sample before this block.
    pub fn previous(&self) -> f32 {
        self.history.last().copied().unwrap_or(0.0)
    }
}

/// Per-algorithm transform driven by [`SlidingWindow`](crate::SlidingWindow).
///
/// Every method has a default so an operator only overrides the hooks it
/// needs: the default window op leaves the window untouched and the
/// default shift op copies input to output.
pub trait WindowOp {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str {
        "passthrough"
    }

    /// Transform a completed window in place.
    fn window_op(&mut self, _frame: &mut WindowFrame<'_>) {}

    /// Transform a block of new samples into `frame.output`.
    fn shift_op(&mut self, frame: &mut ShiftFrame<'_>) {
        frame.output.copy_from_slice(frame.input);
    }

    /// Drop per-stream state. Called by the driver's `reset`.
    fn reset(&mut self) {}

    /// Rebuild buffers sized to the window.
    fn resize(&mut self, _size: usize) {}

    /// Largest `filter_samples` request served without internal chunking.
    fn max_filter_samples(&self) -> Option<usize> {
        None
    }

    /// Whether restored state with this window size can be adopted.
    fn accepts_window_size(&self, _size: usize) -> bool {
        true
    }

    fn save_state(&self, _writer: &mut dyn Write) -> Result<()> {
        Ok(())
    }

    /// Must leave the operator untouched when it returns an error.
    fn load_state(&mut self, _reader: &mut dyn Read, _version: StateVersion) -> Result<()> {
        Ok(())
    }

    /// Called after the driver committed restored state.
    fn state_restored(&mut self, _size: usize) {}
}

/// Operator that changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl WindowOp for Passthrough {}

impl<T: WindowOp + ?Sized> WindowOp for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn window_op(&mut self, frame: &mut WindowFrame<'_>) {
        (**self).window_op(frame)
    }

    fn shift_op(&mut self, frame: &mut ShiftFrame<'_>) {
        (**self).shift_op(frame)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn resize(&mut self, size: usize) {
        (**self).resize(size)
    }

    fn max_filter_samples(&self) -> Option<usize> {
        (**self).max_filter_samples()
    }

    fn accepts_window_size(&self, size: usize) -> bool {
        (**self).accepts_window_size(size)
    }

    fn save_state(&self, writer: &mut dyn Write) -> Result<()> {
        (**self).save_state(writer)
    }

    fn load_state(&mut self, reader: &mut dyn Read, version: StateVersion) -> Result<()> {
        (**self).load_state(reader, version)
    }

    fn state_restored(&mut self, size: usize) {
        (**self).state_restored(size)
    }
}
