use std::path::PathBuf;

use thiserror::Error;

use crate::error::PlatecalError;

/// Why a single light frame could not be calibrated.
/// None of these abort a run; the frame is routed as solved but uncalibrated.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Cannot open {path}: {source}")]
    FrameOpenFailure {
        path: PathBuf,
        source: PlatecalError,
    },

    #[error("Light frame has no {0} keyword")]
    MissingMetadata(&'static str),

    #[error("Binning mismatch: light is {light}x, dark is {dark}x")]
    BinningMismatch { light: u32, dark: u32 },

    #[error("No flat matching filter '{filter}' at binning {binning}x")]
    NoMatchingFlat { filter: String, binning: u32 },

    #[error("Cannot load flats from {path}: {reason}")]
    FlatLoadFailure { path: PathBuf, reason: String },

    #[error("Calibration arithmetic failed: {0}")]
    MathFailure(String),

    #[error("Cannot write calibrated frame {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        source: PlatecalError,
    },
}
