//! Pattern stamping and real-time pattern matching.

use std::fmt;

use slidewin_core::{ShiftFrame, WindowFrame, WindowOp};

/// What [`RealtimeStamp`] does with its pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum StampFunction {
    /// Overwrite the output with the pattern once per enable.
    #[default]
    Stamp,
    /// Watch the input for the pattern.
    Convolve,
}

/// Reported to the stamp callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampEvent {
    /// Stream index (since reset) where the pattern starts.
    pub index: u64,
    /// Normalized correlation of the match; 1.0 for a stamp.
    pub correlation: f32,
    pub function: StampFunction,
}

/// Convolve-mode trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Disabled,
    /// Fires on the next correlation at or above the threshold.
    Armed,
    /// Waits for the correlation to fall below `threshold - hysteresis`.
    Triggered,
}

pub type StampCallback = Box<dyn FnMut(StampEvent) + Send>;

/// Writes a stored pattern into the stream, or detects it in the input.
///
/// Stamping is one-shot: enabling it writes the whole pattern starting at the
/// next processed sample and then disables it again. Matching leaves the audio
/// alone and fires the callback each time the normalized cross-correlation
/// of the most recent `pattern.len()` inputs crosses the threshold.
pub struct RealtimeStamp {
    pattern: Vec<f32>,
    pattern_norm: f32,
    threshold: f32,
    hysteresis: f32,
    function: StampFunction,
    enabled: bool,
    trigger: TriggerState,
    /// Next pattern sample to write while stamping.
    stamp_pos: usize,
    ring: Vec<f32>,
    ring_pos: usize,
    filled: usize,
    last_stamped: Option<u64>,
    callback: Option<StampCallback>,
}

impl RealtimeStamp {
    pub const DEFAULT_HYSTERESIS: f32 = 0.05;

    pub fn new() -> Self {
        Self {
            pattern: Vec::new(),
            pattern_norm: 0.0,
            threshold: 0.9,
            hysteresis: Self::DEFAULT_HYSTERESIS,
            function: StampFunction::Stamp,
            enabled: false,
            trigger: TriggerState::Disabled,
            stamp_pos: 0,
            ring: Vec::new(),
            ring_pos: 0,
            filled: 0,
            last_stamped: None,
            callback: None,
        }
    }

    /// Store the pattern. `threshold` is the correlation magnitude a match
    /// must reach, clamped to `[0, 1]`, so an inverted copy of the pattern
    /// matches too. The event carries the signed correlation.
    pub fn set_stamp_data(&mut self, data: &[f32], threshold: f32) {
        let threshold_c = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            1.0
        };
        if threshold_c != threshold {
            tracing::warn!(requested = threshold, "stamp threshold clamped to {}", threshold_c);
        }
        self.pattern = data
            .iter()
            .map(|&s| if s.is_finite() { s } else { 0.0 })
            .collect();
        self.pattern_norm = self.pattern.iter().map(|s| s * s).sum::<f32>().sqrt();
        self.threshold = threshold_c;
        self.ring = vec![0.0; self.pattern.len()];
        self.ring_pos = 0;
        self.filled = 0;
        self.stamp_pos = 0;
        tracing::debug!(len = self.pattern.len(), threshold = threshold_c, "stamp pattern set");
    }

    pub fn pattern(&self) -> &[f32] {
        &self.pattern
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_function(&mut self, function: StampFunction) {
        if function == self.function {
            return;
        }
        self.function = function;
        self.stamp_pos = 0;
        self.trigger = if self.enabled {
            TriggerState::Armed
        } else {
            TriggerState::Disabled
        };
    }

    pub fn function(&self) -> StampFunction {
        self.function
    }

    /// Enable or disable stamping/matching. Enabling arms the trigger.
    pub fn set_stamp_state(&mut self, on: bool) {
        self.enabled = on;
        if on {
            if self.trigger == TriggerState::Disabled {
                self.trigger = TriggerState::Armed;
            }
        } else {
            self.trigger = TriggerState::Disabled;
            self.stamp_pos = 0;
        }
    }

    pub fn stamp_state(&self) -> bool {
        self.enabled
    }

    pub fn trigger_state(&self) -> TriggerState {
        self.trigger
    }

    pub fn set_stamp_callback(&mut self, callback: impl FnMut(StampEvent) + Send + 'static) {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear_stamp_callback(&mut self) {
        self.callback = None;
    }

    /// Start index of the most recent stamp or match.
    pub fn last_stamped_index(&self) -> Option<u64> {
        self.last_stamped
    }

    /// Margin below the threshold the correlation must drop to before the
    /// matcher re-arms. Clamped to `[0, 1]`.
    pub fn set_hysteresis(&mut self, hysteresis: f32) {
        let hysteresis_c = if hysteresis.is_finite() {
            hysteresis.clamp(0.0, 1.0)
        } else {
            Self::DEFAULT_HYSTERESIS
        };
        if hysteresis_c != hysteresis {
            tracing::warn!(requested = hysteresis, "stamp hysteresis clamped to {}", hysteresis_c);
        }
        self.hysteresis = hysteresis_c;
    }

    pub fn hysteresis(&self) -> f32 {
        self.hysteresis
    }

    fn fire(&mut self, index: u64, correlation: f32) {
        self.last_stamped = Some(index);
        let event = StampEvent {
            index,
            correlation,
            function: self.function,
        };
        tracing::trace!(index, correlation, function = ?self.function, "stamp event");
        if let Some(callback) = self.callback.as_mut() {
            callback(event);
        }
    }

    /// Normalized cross-correlation of the ring (oldest first) with the
    /// pattern. `None` when either side has no energy.
    fn correlation(&self) -> Option<f32> {
        let len = self.ring.len();
        let mut dot = 0.0;
        let mut energy = 0.0;
        for (i, &p) in self.pattern.iter().enumerate() {
            let x = self.ring[(self.ring_pos + i) % len];
            dot += x * p;
            energy += x * x;
        }
        let denom = energy.sqrt() * self.pattern_norm;
        (denom > f32::EPSILON).then(|| dot / denom)
    }

    fn stamp(&mut self, x: f32, index: u64) -> f32 {
        if !self.enabled || self.pattern.is_empty() {
            return x;
        }
        if self.stamp_pos == 0 {
            self.fire(index, 1.0);
        }
        let out = self.pattern[self.stamp_pos];
        self.stamp_pos += 1;
        if self.stamp_pos == self.pattern.len() {
            self.stamp_pos = 0;
            self.enabled = false;
            self.trigger = TriggerState::Disabled;
        }
        out
    }

    fn convolve(&mut self, x: f32, index: u64) {
        let len = self.ring.len();
        if len == 0 {
            return;
        }
        self.ring[self.ring_pos] = if x.is_finite() { x } else { 0.0 };
        self.ring_pos = (self.ring_pos + 1) % len;
        self.filled = (self.filled + 1).min(len);
        if self.filled < len || self.trigger == TriggerState::Disabled {
            return;
        }

        // Silence neither matches nor holds a match.
        let correlation = self.correlation();
        let magnitude = correlation.map_or(0.0, f32::abs);
        match (self.trigger, correlation) {
            (TriggerState::Armed, Some(correlation)) if magnitude >= self.threshold => {
                self.trigger = TriggerState::Triggered;
                self.fire(index + 1 - len as u64, correlation);
            }
            (TriggerState::Triggered, _) if magnitude < self.threshold - self.hysteresis => {
                tracing::trace!(index, magnitude, "stamp matcher re-armed");
                self.trigger = TriggerState::Armed;
            }
            _ => {}
        }
    }

    fn process(&mut self, x: f32, index: u64) -> f32 {
        match self.function {
            StampFunction::Stamp => self.stamp(x, index),
            StampFunction::Convolve => {
                self.convolve(x, index);
                x
            }
        }
    }
}

impl Default for RealtimeStamp {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RealtimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeStamp")
            .field("pattern_len", &self.pattern.len())
            .field("threshold", &self.threshold)
            .field("hysteresis", &self.hysteresis)
            .field("function", &self.function)
            .field("enabled", &self.enabled)
            .field("trigger", &self.trigger)
            .field("last_stamped", &self.last_stamped)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl WindowOp for RealtimeStamp {
    fn name(&self) -> &'static str {
        "realtime_stamp"
    }

    fn window_op(&mut self, frame: &mut WindowFrame<'_>) {
        let start = frame.start;
        for (i, s) in frame.emitted_mut().iter_mut().enumerate() {
            *s = self.process(*s, start + i as u64);
        }
    }

    fn shift_op(&mut self, frame: &mut ShiftFrame<'_>) {
        let start = frame.start;
        for (i, (out, &x)) in frame.output.iter_mut().zip(frame.input).enumerate() {
            *out = self.process(x, start + i as u64);
        }
    }

    fn reset(&mut self) {
        self.ring.fill(0.0);
        self.ring_pos = 0;
        self.filled = 0;
        self.stamp_pos = 0;
        self.last_stamped = None;
        if self.trigger == TriggerState::Triggered {
            self.trigger = TriggerState::Armed;
        }
    }
}
