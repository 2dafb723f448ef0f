use std::path::{Path, PathBuf};

use tracing::debug;

use crate::calibration::CalibrationReport;
use crate::frame::ImageKind;

/// Terminal destination of a routed file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Success,
    Failure,
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Where a file is in the per-file state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileState {
    Discovered,
    Renamed,
    PlateSolveAttempted,
    PlateSolved,
    PlateSolveFailed,
    CalibrateAttempted,
    Calibrated,
    CalibrationFailed,
    Routed(Destination),
    Deleted,
    /// Did not match the input convention and was left in place.
    Skipped,
}

impl FileState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Routed(_) | Self::Deleted | Self::Skipped)
    }

    /// Whether `next` is a legal successor. Any live state may fall through
    /// to the failure destination.
    pub fn can_transition_to(&self, next: FileState) -> bool {
        use FileState::*;
        if self.is_terminal() {
            return false;
        }
        if next == Routed(Destination::Failure) {
            return true;
        }
        match self {
            Discovered => matches!(
                next,
                Renamed | PlateSolveAttempted | Deleted | Skipped
            ),
            Renamed => matches!(next, PlateSolveAttempted | Deleted),
            PlateSolveAttempted => matches!(next, PlateSolved | PlateSolveFailed),
            PlateSolved => matches!(next, CalibrateAttempted | Routed(Destination::Success)),
            PlateSolveFailed => false,
            CalibrateAttempted => matches!(next, Calibrated | CalibrationFailed),
            Calibrated | CalibrationFailed => next == Routed(Destination::Success),
            Routed(_) | Deleted | Skipped => false,
        }
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovered => write!(f, "Discovered"),
            Self::Renamed => write!(f, "Renamed"),
            Self::PlateSolveAttempted => write!(f, "Plate solve attempted"),
            Self::PlateSolved => write!(f, "Plate solved"),
            Self::PlateSolveFailed => write!(f, "Plate solve failed"),
            Self::CalibrateAttempted => write!(f, "Calibration attempted"),
            Self::Calibrated => write!(f, "Calibrated"),
            Self::CalibrationFailed => write!(f, "Calibration failed"),
            Self::Routed(dest) => write!(f, "Routed to {dest}"),
            Self::Deleted => write!(f, "Deleted"),
            Self::Skipped => write!(f, "Skipped"),
        }
    }
}

/// Everything the run learned about one file.
#[derive(Clone, Debug)]
pub struct FileRecord {
    pub original_name: String,
    /// Current location of the file.
    pub path: PathBuf,
    pub kind: Option<ImageKind>,
    pub sequence: Option<u64>,
    pub state: FileState,
    /// States left behind, oldest first.
    pub history: Vec<FileState>,
    /// Location of the calibrated copy, once it exists.
    pub calibrated_copy: Option<PathBuf>,
    pub calibration: Option<CalibrationReport>,
    /// Last error that affected this file, fatal or not.
    pub error: Option<String>,
}

impl FileRecord {
    pub fn discovered(path: &Path) -> Self {
        Self {
            original_name: file_name(path),
            path: path.to_path_buf(),
            kind: None,
            sequence: None,
            state: FileState::Discovered,
            history: Vec::new(),
            calibrated_copy: None,
            calibration: None,
            error: None,
        }
    }

    pub fn file_name(&self) -> String {
        file_name(&self.path)
    }

    pub fn transition(&mut self, next: FileState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(file = %self.original_name, from = %self.state, to = %next, "State change");
        self.history.push(self.state);
        self.state = next;
    }

    /// Whether the file is, or has been, in `state`.
    pub fn reached(&self, state: FileState) -> bool {
        self.state == state || self.history.contains(&state)
    }

    pub fn destination(&self) -> Option<Destination> {
        match self.state {
            FileState::Routed(dest) => Some(dest),
            _ => None,
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Outcome of one run over an input directory.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub initial_sequence: u64,
    pub final_sequence: u64,
    pub records: Vec<FileRecord>,
}

impl RunSummary {
    pub fn renamed(&self) -> usize {
        self.count(|r| r.sequence.is_some())
    }

    pub fn solved(&self) -> usize {
        self.count(|r| r.reached(FileState::PlateSolved))
    }

    pub fn calibrated(&self) -> usize {
        self.count(|r| r.reached(FileState::Calibrated))
    }

    pub fn routed_to(&self, dest: Destination) -> usize {
        self.count(|r| r.destination() == Some(dest))
    }

    pub fn deleted(&self) -> usize {
        self.count(|r| r.state == FileState::Deleted)
    }

    /// Files that hit an error at any step.
    pub fn with_errors(&self) -> usize {
        self.count(|r| r.error.is_some())
    }

    fn count(&self, pred: impl Fn(&FileRecord) -> bool) -> usize {
        self.records.iter().filter(|r| pred(r)).count()
    }
}

/// Progress reporting for a run.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// The directory listing is complete; `total_files` will be processed.
    fn begin_run(&self, _total_files: usize) {}

    /// Processing of one file is starting.
    fn file_started(&self, _name: &str) {}

    /// One file reached its final state.
    fn file_finished(&self, _record: &FileRecord) {}

    /// All files are processed.
    fn finish_run(&self) {}
}

/// No-op progress reporter, used when `run_pipeline` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            FileState::Discovered,
            FileState::Renamed,
            FileState::PlateSolveAttempted,
            FileState::PlateSolved,
            FileState::CalibrateAttempted,
            FileState::Calibrated,
            FileState::Routed(Destination::Success),
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failure_destination_reachable_from_live_states() {
        for state in [
            FileState::Discovered,
            FileState::Renamed,
            FileState::PlateSolveFailed,
            FileState::CalibrationFailed,
        ] {
            assert!(state.can_transition_to(FileState::Routed(Destination::Failure)));
        }
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!FileState::PlateSolveFailed.can_transition_to(FileState::CalibrateAttempted));
        assert!(!FileState::PlateSolveFailed
            .can_transition_to(FileState::Routed(Destination::Success)));
        assert!(!FileState::Discovered.can_transition_to(FileState::Calibrated));
        assert!(!FileState::Deleted.can_transition_to(FileState::Routed(Destination::Failure)));
        assert!(!FileState::Routed(Destination::Success).can_transition_to(FileState::Deleted));
    }

    #[test]
    fn test_record_history() {
        let mut record = FileRecord::discovered(Path::new("/in/MN a 0001.fits"));
        assert_eq!(record.original_name, "MN a 0001.fits");
        record.transition(FileState::PlateSolveAttempted);
        record.transition(FileState::PlateSolveFailed);
        record.transition(FileState::Routed(Destination::Failure));
        assert!(record.reached(FileState::PlateSolveFailed));
        assert!(!record.reached(FileState::PlateSolved));
        assert_eq!(record.destination(), Some(Destination::Failure));
        assert_eq!(record.history.len(), 3);
    }
}
