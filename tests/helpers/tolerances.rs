//! Tolerance constants for signal tests.
//!
//! Different operations require different precision levels.

/// Floating point rounding errors (passthrough, copy-through).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// DSP processing tolerance (FFT round trips, overlap-add).
pub const DSP_EPSILON: f32 = 1e-4;

/// Perceptual tolerance (~-60dB, inaudible differences).
pub const PERCEPTUAL_EPSILON: f32 = 0.001;

/// Silence threshold (~-80dB).
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// Pitch estimates: one FFT bin at 48 kHz / 2048.
pub const PITCH_TOLERANCE_HZ: f32 = 48000.0 / 2048.0;
