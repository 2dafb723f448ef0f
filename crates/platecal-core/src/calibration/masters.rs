use std::borrow::Cow;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Zip};
use tracing::{debug, info};

use crate::consts::{FULL_SCALE, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{PlatecalError, Result};
use crate::io::fits::FitsImage;

use super::error::CalibrationError;
use super::profile::CalibrationProfile;

/// Where the bias level comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum BiasSource {
    /// A master bias FITS file.
    Master(PathBuf),
    /// A constant level in ADU.
    Synthetic(f32),
}

/// Master dark and bias for one run, normalized by the 16-bit full scale.
///
/// The buffers are never modified after loading: exposure scaling returns a
/// new buffer, so every light frame is corrected against the same baseline.
#[derive(Clone, Debug)]
pub struct CalibrationFrameSet {
    dark: Array2<f32>,
    bias: Array2<f32>,
    dark_exposure_secs: f32,
    dark_binning: u32,
}

impl CalibrationFrameSet {
    /// Load the master dark and the bias. Any failure is a `FrameLoad` error.
    pub fn load(dark_path: &Path, bias: &BiasSource) -> Result<Self> {
        let dark_image = FitsImage::open(dark_path).map_err(|e| frame_load(dark_path, e))?;
        let dark_info = dark_image.info();
        let dark_exposure_secs = dark_info
            .require_exposure()
            .map_err(|e| frame_load(dark_path, e))?;
        let dark = dark_image.normalized();

        let bias = match bias {
            BiasSource::Master(bias_path) => {
                let image = FitsImage::open(bias_path).map_err(|e| frame_load(bias_path, e))?;
                let data = image.normalized();
                if data.dim() != dark.dim() {
                    return Err(frame_load(
                        bias_path,
                        PlatecalError::InvalidFits(format!(
                            "bias is {:?}, dark is {:?}",
                            data.dim(),
                            dark.dim()
                        )),
                    ));
                }
                data
            }
            BiasSource::Synthetic(adu) => Array2::from_elem(dark.dim(), adu / FULL_SCALE),
        };

        info!(
            path = %dark_path.display(),
            exposure = dark_exposure_secs,
            binning = dark_info.binning,
            width = dark.ncols(),
            height = dark.nrows(),
            "Loaded master dark"
        );

        Ok(Self {
            dark,
            bias,
            dark_exposure_secs,
            dark_binning: dark_info.binning,
        })
    }

    /// Build a frame set from already normalized buffers.
    pub fn from_buffers(
        dark: Array2<f32>,
        bias: Array2<f32>,
        dark_exposure_secs: f32,
        dark_binning: u32,
    ) -> Result<Self> {
        if dark.dim() != bias.dim() {
            return Err(PlatecalError::Configuration(format!(
                "Dark {:?} and bias {:?} differ in shape",
                dark.dim(),
                bias.dim()
            )));
        }
        Ok(Self {
            dark,
            bias,
            dark_exposure_secs,
            dark_binning,
        })
    }

    pub fn dark(&self) -> &Array2<f32> {
        &self.dark
    }

    pub fn bias(&self) -> &Array2<f32> {
        &self.bias
    }

    pub fn dark_exposure_secs(&self) -> f32 {
        self.dark_exposure_secs
    }

    pub fn dark_binning(&self) -> u32 {
        self.dark_binning
    }

    /// The dark to subtract from a light of `light_secs` exposure.
    ///
    /// Within the profile's tolerance the master is returned as is. Otherwise
    /// the bias-free dark signal is multiplied by the profile's factor for every
    /// pixel below the hot-pixel threshold; hot pixels keep their master value.
    pub fn dark_for_exposure(
        &self,
        light_secs: f32,
        profile: &CalibrationProfile,
    ) -> std::result::Result<Cow<'_, Array2<f32>>, CalibrationError> {
        if !profile.needs_dark_scaling(light_secs, self.dark_exposure_secs) {
            return Ok(Cow::Borrowed(&self.dark));
        }

        let factor = profile
            .scaling
            .factor(light_secs, self.dark_exposure_secs)
            .ok_or_else(|| {
                CalibrationError::MathFailure(format!(
                    "No usable dark scale factor for {light_secs}s light and {}s dark",
                    self.dark_exposure_secs
                ))
            })?;
        let threshold = profile.hot_pixel_threshold();
        debug!(factor, light_secs, dark_secs = self.dark_exposure_secs, "Scaling dark");

        let mut scaled = self.dark.clone();
        let scale = |d: &mut f32, &b: &f32| {
            let signal = *d - b;
            if signal < threshold {
                *d = signal * factor + b;
            }
        };
        let parallel = scaled.len() >= PARALLEL_PIXEL_THRESHOLD;
        let zip = Zip::from(&mut scaled).and(&self.bias);
        if parallel {
            zip.par_for_each(scale);
        } else {
            zip.for_each(scale);
        }
        Ok(Cow::Owned(scaled))
    }
}

fn frame_load(path: &Path, err: PlatecalError) -> PlatecalError {
    PlatecalError::FrameLoad {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
