use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use platecal_core::calibration::ProfilePreset;
use platecal_core::pipeline::config::PipelineConfig;
use platecal_core::pipeline::{run_pipeline_reported, FileRecord, ProgressReporter};
use tracing::debug;

use crate::summary::{print_run_config, print_run_summary};

#[derive(Clone, Copy, ValueEnum)]
pub enum ProfileArg {
    Standard,
    Legacy,
}

impl From<ProfileArg> for ProfilePreset {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Standard => ProfilePreset::Standard,
            ProfileArg::Legacy => ProfilePreset::Legacy,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Directory holding the captured exposures
    pub dir: PathBuf,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Plate solver executable
    #[arg(long)]
    pub solver: Option<PathBuf>,

    /// Calibration profile, replacing the one from the config file
    #[arg(long, value_enum)]
    pub profile: Option<ProfileArg>,

    /// Keep files that do not match the input naming convention
    #[arg(long)]
    pub keep_unmatched: bool,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config: PipelineConfig = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        debug!(path = %config_path.display(), "Loading pipeline config");
        toml::from_str(&contents).context("Invalid pipeline config")?
    } else {
        PipelineConfig::default()
    };
    if let Some(ref solver) = args.solver {
        config.solver.executable = solver.clone();
    }
    if let Some(profile) = args.profile {
        let synthetic_bias = config.calibration.synthetic_bias_adu;
        config.calibration = ProfilePreset::from(profile).profile();
        config.calibration.synthetic_bias_adu = synthetic_bias;
    }
    if args.keep_unmatched {
        config.naming.delete_unmatched = false;
    }

    print_run_config(&args.dir, &config);

    let reporter = Arc::new(BarReporter::new()?);
    let solver = Arc::new(config.solver.build());
    let summary = run_pipeline_reported(&args.dir, &config, solver, reporter.clone())
        .with_context(|| format!("Run over {} aborted", args.dir.display()))?;
    reporter.bar.finish_with_message("Done");

    print_run_summary(&summary);
    Ok(())
}

/// Drives a progress bar from pipeline events.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:30} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressReporter for BarReporter {
    fn begin_run(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
    }

    fn file_started(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn file_finished(&self, _record: &FileRecord) {
        self.bar.inc(1);
    }
}
