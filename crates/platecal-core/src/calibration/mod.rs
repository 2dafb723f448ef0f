//! Dark, bias and flat correction of light frames.
//!
//! The master dark and bias are loaded once per run into a
//! [`CalibrationFrameSet`]; flats are resolved per light frame by the
//! [`FlatMatcher`]; [`ImageCalibrator`] combines them:
//!
//! ```text
//! calibrated = clip(light - dark') / ((flat - bias) / max(flat - bias))
//! ```
//!
//! where `dark'` is the master dark rescaled for the light's exposure when
//! the two exposures differ by more than the profile's tolerance.

mod calibrate;
mod error;
mod flat;
mod masters;
pub mod profile;

pub use calibrate::{
    difference_image, divide_by_flat, normalize_flat, CalibrationReport, ImageCalibrator,
};
pub use error::CalibrationError;
pub use flat::{FlatFrame, FlatMatcher};
pub use masters::{BiasSource, CalibrationFrameSet};
pub use profile::{CalibrationProfile, ClipFill, DarkScaling, ProfilePreset};
