//! Sliding-window analysis operators for slidewin.
//!
//! - [`PitchDetect`]: FFT peak picking with harmonic linking, band limits,
//!   jump smoothing and multi-band results
//! - [`RealtimeStamp`]: one-shot pattern stamping and thresholded pattern
//!   matching with a callback
//!
//! Both pass audio through untouched unless stamping is enabled.
//!
//! ```
//! use slidewin_analysis::PitchDetect;
//! use slidewin_core::SlidingWindow;
//!
//! let detect = PitchDetect::builder()
//!     .size(1024)
//!     .sample_rate(8000.0)
//!     .band(80.0, 1000.0)
//!     .build()
//!     .unwrap();
//! let mut window = SlidingWindow::new(1024, 512, detect);
//!
//! let input: Vec<f32> = (0..4096)
//!     .map(|i| (2.0 * std::f32::consts::PI * 250.0 * i as f32 / 8000.0).sin())
//!     .collect();
//! let mut output = vec![0.0; input.len()];
//! window.filter_samples(&input, &mut output);
//!
//! let pitch = window.op().pitch_result();
//! assert!(pitch.is_voiced());
//! assert!((pitch.frequency - 250.0).abs() < 5.0);
//! ```

mod error;
pub use error::{Error, Result};

pub mod pitch;
pub use pitch::{
    freq_to_midi, midi_to_freq, PitchDetect, PitchDetectBuilder, PitchNode, PitchResult,
};

mod stamp;
pub use stamp::{RealtimeStamp, StampCallback, StampEvent, StampFunction, TriggerState};
