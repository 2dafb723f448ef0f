use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatecalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::errors::Error),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("Missing header keyword: {0}")]
    MissingKeyword(&'static str),

    #[error("Unsupported image shape: NAXIS={0}")]
    UnsupportedShape(i64),

    #[error("Cannot load master frame {path}: {reason}")]
    FrameLoad { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Solver error: {0}")]
    Solver(String),
}

pub type Result<T> = std::result::Result<T, PlatecalError>;
