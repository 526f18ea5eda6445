//! Centralized error type for the slidewin umbrella crate.
//!
//! Wraps all operator-crate errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] slidewin_core::Error),

    #[cfg(feature = "dsp")]
    #[error("DSP: {0}")]
    Dsp(#[from] slidewin_dsp::Error),

    #[cfg(feature = "analysis")]
    #[error("Analysis: {0}")]
    Analysis(#[from] slidewin_analysis::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
