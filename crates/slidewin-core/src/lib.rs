//! # slidewin-core
//!
//! Streaming execution model shared by every slidewin operator.
//!
//! A [`SlidingWindow`] owns the sample history of one channel and drives a
//! [`WindowOp`] through one of two paths:
//!
//! - **window path** ([`SlidingWindow::filter_samples`]): overlapping
//!   windows of `window_size` samples, advancing by `window_size - overlap`.
//!   Suited to spectral transforms.
//! - **shift path** ([`SlidingWindow::shift_samples`]): blocks of new samples
//!   plus the history preceding them. Suited to per-sample transforms.
//!
//! Before the stream starts, history comes from a mirror of the first real
//! samples so look-back transforms see no discontinuity at time zero.
//!
//! Also here: the owned [`Fft`] wrapper, band [`kernel`] design shared by the
//! spectral operators, [`WindowConfig`], and versioned [`state`] records.
//!
//! ```
//! use slidewin_core::{Passthrough, SlidingWindow};
//!
//! let mut window = SlidingWindow::new(256, 128, Passthrough);
//! let input = vec![0.25f32; 1024];
//! let mut output = vec![0.0f32; 1024];
//! let written = window.filter_samples(&input, &mut output);
//! assert_eq!(written, 1024);
//! assert_eq!(output[window.latency()], 0.25);
//! ```

mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{WindowConfig, MAX_WINDOW_SIZE};

pub mod fft;
pub use fft::{Complex32, Fft};

pub mod kernel;
pub use kernel::{bin_frequency, design_band_kernel, resample_kernel, BandDesign};

pub mod mirror;

mod op;
pub use op::{Passthrough, ShiftFrame, WindowFrame, WindowOp};

pub mod state;
pub use state::{read_record, write_record, StateVersion, WindowState};

mod window;
pub use window::SlidingWindow;
