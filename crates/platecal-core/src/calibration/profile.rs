use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_EXPOSURE_TOLERANCE_SECS, DEFAULT_HOT_PIXEL_ADU, FULL_SCALE,
    LEGACY_EXPOSURE_TOLERANCE_SECS, LEGACY_HOT_PIXEL_ADU, LEGACY_LINEAR_GAIN_PER_SEC,
};

/// How the dark's thermal signal is rescaled to a different exposure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum DarkScaling {
    /// factor = light exposure / dark exposure.
    #[default]
    ExposureRatio,
    /// factor = 1 + gain_per_sec * (light exposure - dark exposure).
    Linear { gain_per_sec: f32 },
}

impl DarkScaling {
    /// Scale factor for the given exposures, `None` when it is not a finite
    /// positive number (e.g. a zero-length dark under `ExposureRatio`).
    pub fn factor(&self, light_secs: f32, dark_secs: f32) -> Option<f32> {
        let factor = match self {
            Self::ExposureRatio => light_secs / dark_secs,
            Self::Linear { gain_per_sec } => 1.0 + gain_per_sec * (light_secs - dark_secs),
        };
        (factor.is_finite() && factor > 0.0).then_some(factor)
    }
}

impl std::fmt::Display for DarkScaling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExposureRatio => write!(f, "Exposure Ratio"),
            Self::Linear { gain_per_sec } => write!(f, "Linear ({gain_per_sec}/s)"),
        }
    }
}

/// Replacement for non-positive pixels of the dark-subtracted image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipFill {
    /// A quarter of the difference image's median.
    #[default]
    QuarterMedian,
    Zero,
}

impl std::fmt::Display for ClipFill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuarterMedian => write!(f, "Quarter Median"),
            Self::Zero => write!(f, "Zero"),
        }
    }
}

/// Constants of the correction formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Exposure difference (seconds) above which the dark is rescaled.
    #[serde(default = "default_exposure_tolerance")]
    pub exposure_tolerance_secs: f32,
    /// Dark pixels (bias removed) at or above this ADU level are hot pixels
    /// and keep their value when the dark is rescaled.
    #[serde(default = "default_hot_pixel_adu")]
    pub hot_pixel_adu: f32,
    #[serde(default)]
    pub scaling: DarkScaling,
    #[serde(default)]
    pub clip_fill: ClipFill,
    /// Constant bias level in ADU, used instead of a master bias file.
    #[serde(default)]
    pub synthetic_bias_adu: Option<f32>,
}

fn default_exposure_tolerance() -> f32 {
    DEFAULT_EXPOSURE_TOLERANCE_SECS
}
fn default_hot_pixel_adu() -> f32 {
    DEFAULT_HOT_PIXEL_ADU
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::standard()
    }
}

impl CalibrationProfile {
    /// 20 s tolerance, 2024 ADU hot pixels, ratio scaling, quarter-median fill.
    pub fn standard() -> Self {
        Self {
            exposure_tolerance_secs: DEFAULT_EXPOSURE_TOLERANCE_SECS,
            hot_pixel_adu: DEFAULT_HOT_PIXEL_ADU,
            scaling: DarkScaling::ExposureRatio,
            clip_fill: ClipFill::QuarterMedian,
            synthetic_bias_adu: None,
        }
    }

    /// 40 s tolerance, 1024 ADU hot pixels, linear scaling, zero fill.
    pub fn legacy() -> Self {
        Self {
            exposure_tolerance_secs: LEGACY_EXPOSURE_TOLERANCE_SECS,
            hot_pixel_adu: LEGACY_HOT_PIXEL_ADU,
            scaling: DarkScaling::Linear {
                gain_per_sec: LEGACY_LINEAR_GAIN_PER_SEC,
            },
            clip_fill: ClipFill::Zero,
            synthetic_bias_adu: None,
        }
    }

    /// Hot-pixel threshold in normalized units.
    pub fn hot_pixel_threshold(&self) -> f32 {
        self.hot_pixel_adu / FULL_SCALE
    }

    /// Whether the exposures differ enough for the dark to be rescaled.
    pub fn needs_dark_scaling(&self, light_secs: f32, dark_secs: f32) -> bool {
        (light_secs - dark_secs).abs() > self.exposure_tolerance_secs
    }
}

/// Named profiles selectable from the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfilePreset {
    #[default]
    Standard,
    Legacy,
}

impl ProfilePreset {
    pub fn profile(self) -> CalibrationProfile {
        match self {
            Self::Standard => CalibrationProfile::standard(),
            Self::Legacy => CalibrationProfile::legacy(),
        }
    }
}

impl std::fmt::Display for ProfilePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "Standard"),
            Self::Legacy => write!(f, "Legacy"),
        }
    }
}
