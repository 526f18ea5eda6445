//! Sliding-window DSP operators: FFT filter, pitch shift, despike and
//! multi-tap reverb. Each one implements [`slidewin_core::WindowOp`] and is
//! driven by a [`slidewin_core::SlidingWindow`].
//!
//! ```
//! use slidewin_core::SlidingWindow;
//! use slidewin_dsp::{EchoTap, Reverb};
//!
//! let mut reverb = Reverb::new(4800);
//! reverb.set_reverb_filter(&[EchoTap::new(2400, 0.4)]);
//! let mut window = SlidingWindow::new(512, 256, reverb);
//!
//! let input = vec![0.0f32; 2048];
//! let mut output = vec![0.0f32; 2048];
//! window.filter_samples(&input, &mut output);
//! ```

mod error;
pub use error::{Error, Result};

mod despike;
pub use despike::Despike;

mod filter;
pub use filter::Filter;

pub mod pitch_shift;
pub use pitch_shift::PitchShift;

mod reverb;
pub use reverb::{EchoTap, Reverb};
