//! Window configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest window the driver will allocate.
pub const MAX_WINDOW_SIZE: usize = 1 << 20;

/// Configuration for a sliding-window operator.
///
/// Constructors clamp whatever they are given, so `validate()` is only for
/// callers that want to reject bad values before building anything.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub window_size: usize,
    pub overlap: usize,
    pub sample_rate: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: 1024,
            overlap: 512,
            sample_rate: 44100.0,
        }
    }
}

impl WindowConfig {
    pub fn new(window_size: usize, overlap: usize) -> Self {
        Self {
            window_size,
            overlap,
            ..Self::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Samples emitted per window (`window_size - overlap`).
    pub fn hop(&self) -> usize {
        let sane = self.sanitized();
        sane.window_size - sane.overlap
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.window_size > MAX_WINDOW_SIZE {
            return Err(Error::InvalidConfig(format!(
                "window_size {} out of range (1-{})",
                self.window_size, MAX_WINDOW_SIZE
            )));
        }
        if self.overlap >= self.window_size {
            return Err(Error::InvalidConfig(format!(
                "overlap {} must be smaller than window_size {}",
                self.overlap, self.window_size
            )));
        }
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// The nearest valid configuration.
    pub fn sanitized(&self) -> Self {
        let window_size = self.window_size.clamp(1, MAX_WINDOW_SIZE);
        Self {
            window_size,
            overlap: self.overlap.min(window_size - 1),
            sample_rate: if self.sample_rate.is_finite() {
                self.sample_rate.clamp(8000.0, 384000.0)
            } else {
                44100.0
            },
        }
    }
}
