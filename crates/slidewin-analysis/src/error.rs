//! Error types for slidewin-analysis

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid band: {low} Hz - {high} Hz")]
    InvalidBand { low: f32, high: f32 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Core(#[from] slidewin_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
