//! Error types for slidewin-dsp

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Core(#[from] slidewin_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
