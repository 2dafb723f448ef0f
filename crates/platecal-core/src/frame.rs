use crate::error::{PlatecalError, Result};
use crate::io::fits::FitsHeader;

/// Kind of exposure, from the IMAGETYP keyword.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageKind {
    Light,
    Dark,
    Flat,
    Bias,
    Other(String),
}

impl ImageKind {
    /// Classify an IMAGETYP value. Matching is by case-insensitive prefix,
    /// so "Light Frame" and "FLAT FIELD" are recognized.
    pub fn from_keyword(value: &str) -> Self {
        let upper = value.trim().to_uppercase();
        if upper.starts_with("LIGHT") {
            Self::Light
        } else if upper.starts_with("DARK") {
            Self::Dark
        } else if upper.starts_with("FLAT") {
            Self::Flat
        } else if upper.starts_with("BIAS") {
            Self::Bias
        } else {
            Self::Other(upper)
        }
    }

    pub fn is_light(&self) -> bool {
        matches!(self, Self::Light)
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Light => write!(f, "LIGHT"),
            Self::Dark => write!(f, "DARK"),
            Self::Flat => write!(f, "FLAT"),
            Self::Bias => write!(f, "BIAS"),
            Self::Other(s) if s.is_empty() => write!(f, "UNKNOWN"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Header fields the pipeline acts on.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameInfo {
    pub kind: ImageKind,
    pub filter: Option<String>,
    /// XBINNING; 1 when absent.
    pub binning: u32,
    /// EXPTIME (or EXPOSURE) in seconds.
    pub exposure_secs: Option<f32>,
    /// SWCREATE, the software that wrote the file.
    pub creator: Option<String>,
    pub calibration_status: Option<String>,
}

impl FrameInfo {
    pub fn from_header(header: &mut FitsHeader) -> Self {
        let kind = header
            .get_str("IMAGETYP")
            .as_deref()
            .map(ImageKind::from_keyword)
            .unwrap_or_else(|| ImageKind::Other(String::new()));
        let binning = header
            .get_i64("XBINNING")
            .filter(|b| *b > 0)
            .map(|b| b as u32)
            .unwrap_or(1);
        let exposure_secs = header
            .get_f64("EXPTIME")
            .or_else(|| header.get_f64("EXPOSURE"))
            .map(|e| e as f32);

        Self {
            kind,
            filter: header.get_str("FILTER").map(|s| s.trim().to_string()),
            binning,
            exposure_secs,
            creator: header.get_str("SWCREATE").map(|s| s.trim().to_string()),
            calibration_status: header.get_str("CALSTAT").map(|s| s.trim().to_string()),
        }
    }

    /// Exposure in seconds, or an error naming the missing keyword.
    pub fn require_exposure(&self) -> Result<f32> {
        self.exposure_secs
            .ok_or(PlatecalError::MissingKeyword("EXPTIME"))
    }

    /// Whether the file was written by the software identified by `tag`.
    pub fn created_by(&self, tag: &str) -> bool {
        self.creator
            .as_deref()
            .is_some_and(|creator| creator.starts_with(tag))
    }
}
