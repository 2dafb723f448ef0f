use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calibration::{BiasSource, CalibrationProfile};
use crate::consts::{DEFAULT_INSTRUMENT_TAG, DEFAULT_SOLVER_PATH};
use crate::error::{PlatecalError, Result};
use crate::solver::{ExternalSolver, FILE_PLACEHOLDER};

/// Full pipeline configuration. Every field has a default, so an empty
/// TOML document is a valid configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub calibration: CalibrationProfile,
}

impl PipelineConfig {
    /// Reject settings that would make routing or renaming ambiguous.
    pub fn validate(&self) -> Result<()> {
        let naming = &self.naming;
        if naming.input_prefix.is_empty() {
            return Err(config_error("naming.input_prefix must not be empty"));
        }
        if naming.calibrated_prefix == naming.input_prefix {
            return Err(config_error(
                "naming.calibrated_prefix must differ from naming.input_prefix",
            ));
        }
        if naming.extension.trim_start_matches('.').is_empty() {
            return Err(config_error("naming.extension must not be empty"));
        }
        if self.layout.success_dir == self.layout.failure_dir {
            return Err(config_error(
                "layout.success_dir and layout.failure_dir must differ",
            ));
        }
        if !self.solver.args.iter().any(|a| a == FILE_PLACEHOLDER) {
            return Err(config_error(&format!(
                "solver.args must contain {FILE_PLACEHOLDER}"
            )));
        }
        let profile = &self.calibration;
        if profile.exposure_tolerance_secs.is_nan() || profile.exposure_tolerance_secs < 0.0 {
            return Err(config_error(
                "calibration.exposure_tolerance_secs must be >= 0",
            ));
        }
        if profile.hot_pixel_adu.is_nan() || profile.hot_pixel_adu <= 0.0 {
            return Err(config_error("calibration.hot_pixel_adu must be > 0"));
        }
        Ok(())
    }

    pub fn bias_source(&self, input: &Path) -> BiasSource {
        match self.calibration.synthetic_bias_adu {
            Some(adu) => BiasSource::Synthetic(adu),
            None => BiasSource::Master(self.layout.bias_path(input)),
        }
    }
}

fn config_error(msg: &str) -> PlatecalError {
    PlatecalError::Configuration(msg.to_string())
}

/// Directory layout, relative to the input directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub dark_dir: PathBuf,
    pub master_dark: String,
    pub bias_dir: PathBuf,
    pub master_bias: String,
    pub flats_dir: PathBuf,
    pub sequence_file: PathBuf,
    /// Solved (and calibrated) files.
    pub success_dir: PathBuf,
    /// Unsolved and non-light files.
    pub failure_dir: PathBuf,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            dark_dir: PathBuf::from("DARK"),
            master_dark: "Dark_Master-c.fits".into(),
            bias_dir: PathBuf::from("BIAS"),
            master_bias: "Bias_Master-c.fits".into(),
            flats_dir: PathBuf::from("FLATS"),
            sequence_file: PathBuf::from("SEQ_NBR").join("nina_seqNbr.txt"),
            success_dir: PathBuf::from("WCS"),
            failure_dir: PathBuf::from("ERR"),
        }
    }
}

impl LayoutConfig {
    pub fn dark_path(&self, input: &Path) -> PathBuf {
        input.join(&self.dark_dir).join(&self.master_dark)
    }

    pub fn bias_path(&self, input: &Path) -> PathBuf {
        input.join(&self.bias_dir).join(&self.master_bias)
    }

    pub fn flats_dir(&self, input: &Path) -> PathBuf {
        input.join(&self.flats_dir)
    }

    pub fn sequence_path(&self, input: &Path) -> PathBuf {
        input.join(&self.sequence_file)
    }

    pub fn success_dir(&self, input: &Path) -> PathBuf {
        input.join(&self.success_dir)
    }

    pub fn failure_dir(&self, input: &Path) -> PathBuf {
        input.join(&self.failure_dir)
    }
}

/// File naming conventions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Prefix of files this pipeline processes.
    pub input_prefix: String,
    /// Replaces `input_prefix` in the name of calibrated copies.
    pub calibrated_prefix: String,
    /// Image file extension, without the dot.
    pub extension: String,
    /// SWCREATE prefix of files that get a sequence number.
    pub instrument_tag: String,
    /// Name prefix of flat candidates.
    pub flat_prefix: String,
    /// Remove files in the input directory that do not match the input
    /// naming convention.
    pub delete_unmatched: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            input_prefix: "MN ".into(),
            calibrated_prefix: "MNc ".into(),
            extension: "fits".into(),
            instrument_tag: DEFAULT_INSTRUMENT_TAG.into(),
            flat_prefix: "F".into(),
            delete_unmatched: true,
        }
    }
}

/// External plate solver invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub executable: PathBuf,
    /// Arguments; `{file}` is replaced by the image path.
    pub args: Vec<String>,
    /// Extensions of result files the solver writes next to the image.
    pub sidecar_extensions: Vec<String>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_SOLVER_PATH),
            args: vec!["-f".into(), FILE_PLACEHOLDER.into(), "-update".into()],
            sidecar_extensions: vec!["ini".into(), "wcs".into()],
        }
    }
}

impl SolverConfig {
    pub fn build(&self) -> ExternalSolver {
        ExternalSolver::new(&self.executable, self.args.clone())
    }
}
