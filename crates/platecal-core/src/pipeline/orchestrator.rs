use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::calibration::{CalibrationFrameSet, FlatMatcher, ImageCalibrator};
use crate::error::{PlatecalError, Result};
use crate::frame::FrameInfo;
use crate::io::fits::FitsHeader;
use crate::sequence::SequenceRegistry;
use crate::solver::{PlateSolver, SolveOutcome};

use super::config::PipelineConfig;
use super::naming::{
    calibrated_name, has_sequence_token, matches_input, sequenced_name, sidecar_paths,
};
use super::routing::{list_files, move_into, remove_if_exists};
use super::types::{Destination, FileRecord, FileState, NoOpReporter, ProgressReporter, RunSummary};

/// Process every file in `input` with a progress reporter.
///
/// The sequence registry is persisted before returning, on success and on
/// error alike. Per-file failures never produce an `Err`; they are recorded
/// in the returned summary.
pub fn run_pipeline_reported(
    input: &Path,
    config: &PipelineConfig,
    solver: Arc<dyn PlateSolver>,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    config.validate()?;
    if !input.is_dir() {
        return Err(PlatecalError::Configuration(format!(
            "{} is not a directory",
            input.display()
        )));
    }

    let mut registry = SequenceRegistry::load(&config.layout.sequence_path(input));
    let initial_sequence = registry.current();
    info!(
        input = %input.display(),
        solver = solver.name(),
        sequence = initial_sequence,
        "Starting run"
    );

    let result = process_directory(input, config, solver.as_ref(), reporter.as_ref(), &mut registry);

    if let Err(e) = registry.persist() {
        error!(path = %registry.path().display(), error = %e, "Cannot save sequence number");
    }

    let records = result?;
    info!(final_sequence = registry.current(), files = records.len(), "Run complete");
    Ok(RunSummary {
        initial_sequence,
        final_sequence: registry.current(),
        records,
    })
}

/// Process every file in `input`.
pub fn run_pipeline(
    input: &Path,
    config: &PipelineConfig,
    solver: Arc<dyn PlateSolver>,
) -> Result<RunSummary> {
    run_pipeline_reported(input, config, solver, Arc::new(NoOpReporter))
}

fn process_directory(
    input: &Path,
    config: &PipelineConfig,
    solver: &dyn PlateSolver,
    reporter: &dyn ProgressReporter,
    registry: &mut SequenceRegistry,
) -> Result<Vec<FileRecord>> {
    let layout = &config.layout;
    let frames = CalibrationFrameSet::load(&layout.dark_path(input), &config.bias_source(input))?;
    let flats = FlatMatcher::new(
        layout.flats_dir(input),
        &config.naming.flat_prefix,
        &config.naming.extension,
    );

    let success_dir = layout.success_dir(input);
    let failure_dir = layout.failure_dir(input);
    fs::create_dir_all(&success_dir)?;
    fs::create_dir_all(&failure_dir)?;

    // Snapshot the listing so renamed files and calibrated copies created
    // during the run are never picked up again.
    let files = list_files(input, &[registry.path().to_path_buf()])?;
    reporter.begin_run(files.len());

    let mut run = FileRun {
        config,
        solver,
        calibrator: ImageCalibrator::new(&frames, &flats, &config.calibration),
        registry,
        success_dir,
        failure_dir,
    };

    let mut records = Vec::with_capacity(files.len());
    for path in files {
        let record = run.process(&path, reporter);
        reporter.file_finished(&record);
        records.push(record);
    }
    reporter.finish_run();
    Ok(records)
}

/// Per-run context driving single files through the state machine.
struct FileRun<'a> {
    config: &'a PipelineConfig,
    solver: &'a dyn PlateSolver,
    calibrator: ImageCalibrator<'a>,
    registry: &'a mut SequenceRegistry,
    success_dir: PathBuf,
    failure_dir: PathBuf,
}

impl FileRun<'_> {
    fn process(&mut self, path: &Path, reporter: &dyn ProgressReporter) -> FileRecord {
        let mut record = FileRecord::discovered(path);
        reporter.file_started(&record.original_name);

        if !matches_input(&record.original_name, &self.config.naming) {
            self.discard_unmatched(&mut record);
            return record;
        }

        if let Err(e) = self.advance(&mut record) {
            error!(file = %record.file_name(), error = %e, "Processing failed");
            record.error = Some(e.to_string());
            self.route_failure(&mut record);
        }
        record
    }

    fn advance(&mut self, record: &mut FileRecord) -> Result<()> {
        let info = FrameInfo::from_header(&mut FitsHeader::read(&record.path)?);
        record.kind = Some(info.kind.clone());

        self.renumber(record, &info);

        if !info.kind.is_light() {
            return self.route_non_light(record);
        }

        record.transition(FileState::PlateSolveAttempted);
        let outcome = match self.solver.solve(&record.path) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(file = %record.file_name(), error = %e, "Solver invocation failed");
                record.error = Some(e.to_string());
                SolveOutcome::Failed { code: None }
            }
        };

        if !outcome.is_solved() {
            record.transition(FileState::PlateSolveFailed);
            warn!(file = %record.file_name(), outcome = ?outcome, "Plate solve failed");
            return self.route_unsolved(record);
        }

        record.transition(FileState::PlateSolved);
        info!(file = %record.file_name(), "Plate solve succeeded");
        self.calibrate_copy(record);
        self.route_solved(record)
    }

    /// Give files from the capture software the next sequence number.
    /// Failures leave the file under its current name.
    fn renumber(&mut self, record: &mut FileRecord, info: &FrameInfo) {
        if !info.created_by(&self.config.naming.instrument_tag) {
            return;
        }
        let name = record.file_name();
        if has_sequence_token(&name) {
            info!(file = %name, "Already sequenced");
            return;
        }

        let seq = self.registry.peek_next();
        let Some(new_name) = sequenced_name(&name, seq) else {
            warn!(file = %name, "Cannot derive a sequenced name");
            return;
        };
        let new_path = record.path.with_file_name(&new_name);
        if new_path.exists() {
            warn!(file = %name, target = %new_name, "Rename target exists, keeping old name");
            record.error = Some(format!("rename target {new_name} exists"));
            return;
        }

        match fs::rename(&record.path, &new_path) {
            Ok(()) => {
                self.registry.next();
                info!(file = %name, renamed = %new_name, seq, "Renamed");
                record.path = new_path;
                record.sequence = Some(seq);
                record.transition(FileState::Renamed);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Rename failed, keeping old name");
                record.error = Some(format!("rename failed: {e}"));
            }
        }
    }

    /// Calibrate a copy of the solved file. Never fails the file.
    fn calibrate_copy(&mut self, record: &mut FileRecord) {
        record.transition(FileState::CalibrateAttempted);

        let name = record.file_name();
        let Some(copy_name) = calibrated_name(&name, &self.config.naming) else {
            warn!(file = %name, "Cannot derive calibrated name");
            record.transition(FileState::CalibrationFailed);
            return;
        };
        let copy_path = record.path.with_file_name(copy_name);
        if let Err(e) = fs::copy(&record.path, &copy_path) {
            error!(file = %name, error = %e, "Cannot copy for calibration");
            record.error = Some(format!("copy failed: {e}"));
            record.transition(FileState::CalibrationFailed);
            return;
        }

        match self.calibrator.calibrate(&copy_path) {
            Ok(report) => {
                record.calibrated_copy = Some(copy_path);
                record.calibration = Some(report);
                record.transition(FileState::Calibrated);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Calibration failed");
                record.error = Some(e.to_string());
                if let Err(e) = remove_if_exists(&copy_path) {
                    error!(file = %copy_path.display(), error = %e, "Cannot remove calibration copy");
                }
                record.transition(FileState::CalibrationFailed);
            }
        }
    }

    /// The solved original moves first; its calibrated copy only follows
    /// once the original is in place, so the pair is never split.
    fn route_solved(&mut self, record: &mut FileRecord) -> Result<()> {
        let source = record.path.clone();
        record.path = move_into(&source, &self.success_dir)?;
        for sidecar in sidecar_paths(&source, &self.config.solver.sidecar_extensions) {
            match remove_if_exists(&sidecar) {
                Ok(true) => info!(file = %sidecar.display(), "Removed solver result file"),
                Ok(false) => {}
                Err(e) => warn!(file = %sidecar.display(), error = %e, "Cannot remove solver result file"),
            }
        }

        if let Some(copy) = record.calibrated_copy.take() {
            match move_into(&copy, &self.success_dir) {
                Ok(dest) => record.calibrated_copy = Some(dest),
                Err(e) => {
                    error!(file = %copy.display(), error = %e, "Cannot route calibrated copy, removing");
                    record.error = Some(format!("calibrated copy not routed: {e}"));
                    if let Err(e) = remove_if_exists(&copy) {
                        error!(file = %copy.display(), error = %e, "Cannot remove calibration copy");
                    }
                }
            }
        }
        record.transition(FileState::Routed(Destination::Success));
        Ok(())
    }

    fn route_unsolved(&mut self, record: &mut FileRecord) -> Result<()> {
        let source = record.path.clone();
        record.path = move_into(&source, &self.failure_dir)?;
        for sidecar in sidecar_paths(&source, &self.config.solver.sidecar_extensions) {
            if !sidecar.exists() {
                continue;
            }
            if let Err(e) = move_into(&sidecar, &self.failure_dir) {
                warn!(file = %sidecar.display(), error = %e, "Cannot move solver result file, removing");
                let _ = remove_if_exists(&sidecar);
            }
        }
        record.transition(FileState::Routed(Destination::Failure));
        Ok(())
    }

    /// Non-light frames go to the failure destination untouched. A file
    /// already there under the same name is a stale duplicate.
    fn route_non_light(&mut self, record: &mut FileRecord) -> Result<()> {
        match move_into(&record.path, &self.failure_dir) {
            Ok(dest) => {
                info!(file = %record.file_name(), kind = ?record.kind, "Not a light frame");
                record.path = dest;
                record.transition(FileState::Routed(Destination::Failure));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                info!(file = %record.file_name(), "Already in failure destination, removing");
                fs::remove_file(&record.path)?;
                record.transition(FileState::Deleted);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Last resort for a file whose processing errored. Leaves the file in
    /// place if even this move fails.
    fn route_failure(&mut self, record: &mut FileRecord) {
        if let Some(copy) = record.calibrated_copy.take() {
            if let Err(e) = remove_if_exists(&copy) {
                error!(file = %copy.display(), error = %e, "Cannot remove calibration copy");
            }
        }
        if record.state.is_terminal() {
            return;
        }
        match move_into(&record.path, &self.failure_dir) {
            Ok(dest) => {
                record.path = dest;
                record.transition(FileState::Routed(Destination::Failure));
            }
            Err(e) => {
                error!(file = %record.file_name(), error = %e, "Cannot move to failure destination");
                let prior = record.error.take().map(|p| format!("{p}; ")).unwrap_or_default();
                record.error = Some(format!("{prior}cannot route: {e}"));
            }
        }
    }

    fn discard_unmatched(&self, record: &mut FileRecord) {
        if !self.config.naming.delete_unmatched {
            record.transition(FileState::Skipped);
            return;
        }
        match fs::remove_file(&record.path) {
            Ok(()) => {
                info!(file = %record.original_name, "Removed file not matching input convention");
                record.transition(FileState::Deleted);
            }
            Err(e) => {
                warn!(file = %record.original_name, error = %e, "Cannot remove unmatched file");
                record.error = Some(e.to_string());
                record.transition(FileState::Skipped);
            }
        }
    }
}
