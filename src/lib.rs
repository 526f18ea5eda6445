//! # slidewin - Streaming Sliding-Window Signal Processing
//!
//! A driver that turns an unbounded stream of samples into overlapping
//! windows (or shifted blocks) for a per-algorithm operator, plus the
//! operators themselves.
//!
//! ## Architecture
//!
//! slidewin is an umbrella crate that coordinates:
//! - **slidewin-core** - `SlidingWindow` driver, `WindowOp` hooks, state I/O, FFT, band kernels
//! - **slidewin-dsp** - Filter, PitchShift, Despike, Reverb
//! - **slidewin-analysis** - PitchDetect, RealtimeStamp
//!
//! ## Quick Start
//!
//! ```
//! use slidewin::prelude::*;
//!
//! let config = WindowConfig::new(512, 256).with_sample_rate(48000.0);
//! let mut window = Processor::sliding_window(&ProcessorKind::Passthrough, &config)?;
//!
//! let input = vec![0.25f32; 2048];
//! let mut output = vec![0.0f32; 2048];
//! window.filter_samples(&input, &mut output);
//!
//! // Constant latency of one window minus a sample
//! assert_eq!(window.latency(), 511);
//! assert_eq!(output[511], 0.25);
//! # Ok::<(), slidewin::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Everything (`full`)
//! - `dsp` - Filter, pitch shift, despike, reverb
//! - `analysis` - Pitch detection, stamping
//! - `serialization` - serde on analysis results

mod error;
pub mod processor;

pub use error::{Error, Result};
pub use processor::{Processor, ProcessorKind};

/// Re-export of slidewin-core for direct access
pub use slidewin_core as core;

pub use slidewin_core::{
    BandDesign, Passthrough, ShiftFrame, SlidingWindow, StateVersion, WindowConfig, WindowFrame,
    WindowOp, WindowState, MAX_WINDOW_SIZE,
};

/// DSP operators (requires "dsp" feature)
#[cfg(feature = "dsp")]
pub use slidewin_dsp as dsp;

/// Analysis operators (requires "analysis" feature)
#[cfg(feature = "analysis")]
pub use slidewin_analysis as analysis;

/// Convenience prelude for common imports
pub mod prelude {
    // Driver
    pub use crate::{
        Passthrough, Processor, ProcessorKind, ShiftFrame, SlidingWindow, StateVersion,
        WindowConfig, WindowFrame, WindowOp,
    };

    // DSP
    #[cfg(feature = "dsp")]
    pub use crate::dsp::{Despike, EchoTap, Filter, PitchShift, Reverb};
    #[cfg(feature = "dsp")]
    pub use crate::BandDesign;

    // Analysis
    #[cfg(feature = "analysis")]
    pub use crate::analysis::{
        PitchDetect, PitchResult, RealtimeStamp, StampEvent, StampFunction,
    };
}
