use std::borrow::Cow;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Zip};
use tracing::{debug, info};

use crate::consts::{CALSTAT_BDF, CLIP_MEDIAN_FRACTION, EPSILON, PARALLEL_PIXEL_THRESHOLD};
use crate::io::fits::{write_calibrated, FitsImage, HeaderValue};

use super::error::CalibrationError;
use super::flat::FlatMatcher;
use super::masters::CalibrationFrameSet;
use super::profile::{CalibrationProfile, ClipFill};

type CalResult<T> = std::result::Result<T, CalibrationError>;

/// What happened while calibrating one frame.
#[derive(Clone, Debug)]
pub struct CalibrationReport {
    pub flat: PathBuf,
    /// Dark scale factor, when the exposure difference required one.
    pub dark_scale: Option<f32>,
    /// Value written into non-positive pixels of the difference image.
    pub clip_fill: f32,
    pub clipped_pixels: usize,
}

/// Applies dark, bias and flat correction to light frames in place.
pub struct ImageCalibrator<'a> {
    frames: &'a CalibrationFrameSet,
    flats: &'a FlatMatcher,
    profile: &'a CalibrationProfile,
}

impl<'a> ImageCalibrator<'a> {
    pub fn new(
        frames: &'a CalibrationFrameSet,
        flats: &'a FlatMatcher,
        profile: &'a CalibrationProfile,
    ) -> Self {
        Self {
            frames,
            flats,
            profile,
        }
    }

    /// Calibrate the light frame at `path`, rewriting it with 16-bit offset
    /// data and CALSTAT = 'BDF'.
    ///
    /// The file is only written after every step has succeeded; on error its
    /// contents are untouched.
    pub fn calibrate(&self, path: &Path) -> CalResult<CalibrationReport> {
        let image = FitsImage::open(path).map_err(|source| {
            CalibrationError::FrameOpenFailure {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let info = image.info();
        let exposure = info
            .exposure_secs
            .ok_or(CalibrationError::MissingMetadata("EXPTIME"))?;
        let filter = info
            .filter
            .clone()
            .ok_or(CalibrationError::MissingMetadata("FILTER"))?;

        if info.binning != self.frames.dark_binning() {
            return Err(CalibrationError::BinningMismatch {
                light: info.binning,
                dark: self.frames.dark_binning(),
            });
        }

        let light = image.normalized();
        let dark = self.frames.dark_for_exposure(exposure, self.profile)?;
        let dark_scale = match &dark {
            Cow::Owned(_) => self
                .profile
                .scaling
                .factor(exposure, self.frames.dark_exposure_secs()),
            Cow::Borrowed(_) => None,
        };

        let (diff, clip_fill, clipped_pixels) =
            difference_image(&light, &dark, self.profile.clip_fill)?;
        debug!(clip_fill, clipped_pixels, "Difference image clipped");

        let flat = self
            .flats
            .find(&filter, info.binning)?
            .ok_or_else(|| CalibrationError::NoMatchingFlat {
                filter: filter.clone(),
                binning: info.binning,
            })?;
        let flat_norm = normalize_flat(&flat.data, self.frames.bias())?;
        let calibrated = divide_by_flat(&diff, &flat_norm)?;

        write_calibrated(
            path,
            path,
            &calibrated,
            &[("CALSTAT", HeaderValue::Text(CALSTAT_BDF.to_string()))],
        )
        .map_err(|source| CalibrationError::WriteFailure {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            path = %path.display(),
            flat = %flat.path.display(),
            dark_scale = ?dark_scale,
            "Calibrated"
        );
        Ok(CalibrationReport {
            flat: flat.path,
            dark_scale,
            clip_fill,
            clipped_pixels,
        })
    }
}

/// `light - dark`, with every value at or below zero replaced according to
/// `fill`. Returns the image, the fill value and how many pixels were replaced.
pub fn difference_image(
    light: &Array2<f32>,
    dark: &Array2<f32>,
    fill: ClipFill,
) -> CalResult<(Array2<f32>, f32, usize)> {
    check_shape("dark", light, dark)?;
    let mut diff = light - dark;

    let fill_value = match fill {
        ClipFill::QuarterMedian => median(&diff) * CLIP_MEDIAN_FRACTION,
        ClipFill::Zero => 0.0,
    };

    let mut clipped = 0usize;
    for v in diff.iter_mut() {
        if *v <= 0.0 {
            *v = fill_value;
            clipped += 1;
        }
    }
    Ok((diff, fill_value, clipped))
}

/// `(flat - bias) / max(flat - bias)`.
pub fn normalize_flat(flat: &Array2<f32>, bias: &Array2<f32>) -> CalResult<Array2<f32>> {
    check_shape("bias", flat, bias)?;
    let mut norm = flat - bias;
    let max = norm.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() || max <= EPSILON {
        return Err(CalibrationError::MathFailure(format!(
            "Flat maximum after bias removal is {max}"
        )));
    }
    norm.mapv_inplace(|v| v / max);
    Ok(norm)
}

/// Element-wise `diff / flat`. Pixels where the flat is not positive, or the
/// quotient is not finite, become zero.
pub fn divide_by_flat(diff: &Array2<f32>, flat: &Array2<f32>) -> CalResult<Array2<f32>> {
    check_shape("flat", diff, flat)?;
    let mut out = Array2::<f32>::zeros(diff.dim());
    let divide = |o: &mut f32, &d: &f32, &f: &f32| {
        let q = if f > EPSILON { d / f } else { 0.0 };
        *o = if q.is_finite() { q } else { 0.0 };
    };
    let parallel = out.len() >= PARALLEL_PIXEL_THRESHOLD;
    let zip = Zip::from(&mut out).and(diff).and(flat);
    if parallel {
        zip.par_for_each(divide);
    } else {
        zip.for_each(divide);
    }
    Ok(out)
}

fn check_shape(name: &str, a: &Array2<f32>, b: &Array2<f32>) -> CalResult<()> {
    if a.dim() != b.dim() {
        return Err(CalibrationError::MathFailure(format!(
            "Light is {:?} but {name} is {:?}",
            a.dim(),
            b.dim()
        )));
    }
    Ok(())
}

/// Median of all pixels; mean of the two middle values for even counts.
fn median(data: &Array2<f32>) -> f32 {
    let mut values: Vec<f32> = data.iter().copied().collect();
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mid = n / 2;
    let upper = *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1;
    if n % 2 == 1 {
        upper
    } else {
        let lower = values[..mid]
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        (lower + upper) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        let odd = Array2::from_shape_vec((1, 3), vec![3.0, 1.0, 2.0]).unwrap();
        assert_eq!(median(&odd), 2.0);
        let even = Array2::from_shape_vec((2, 2), vec![4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(median(&even), 2.5);
    }

    #[test]
    fn test_median_with_negatives() {
        let data = Array2::from_shape_vec((1, 4), vec![-0.2, 0.4, 0.1, 0.2]).unwrap();
        assert!((median(&data) - 0.15).abs() < 1e-6);
    }
}
