use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{PlatecalError, Result};

/// Placeholder in solver arguments replaced by the image path.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Result of one plate-solve attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved,
    /// The solver ran but reported failure. `code` is `None` when the
    /// process was terminated by a signal.
    Failed { code: Option<i32> },
}

impl SolveOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved)
    }
}

/// Annotates an image file in place with a WCS solution.
///
/// `Err` means the solver could not be run at all; the pipeline treats it
/// like a failed solve.
pub trait PlateSolver: Send + Sync {
    fn name(&self) -> &str;
    fn solve(&self, path: &Path) -> Result<SolveOutcome>;
}

/// Runs an external solver executable and reads its exit status.
#[derive(Clone, Debug)]
pub struct ExternalSolver {
    executable: PathBuf,
    args: Vec<String>,
}

impl ExternalSolver {
    /// `args` may contain [`FILE_PLACEHOLDER`]; each occurrence becomes the
    /// image path, passed as a single argument so embedded spaces are safe.
    pub fn new(executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            args,
        }
    }

    pub fn command(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        for arg in &self.args {
            if arg == FILE_PLACEHOLDER {
                cmd.arg(path);
            } else {
                cmd.arg(arg);
            }
        }
        cmd
    }
}

impl PlateSolver for ExternalSolver {
    fn name(&self) -> &str {
        self.executable
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("solver")
    }

    fn solve(&self, path: &Path) -> Result<SolveOutcome> {
        let mut cmd = self.command(path);
        debug!(command = ?cmd, "Running plate solver");
        let status = cmd.status().map_err(|e| {
            PlatecalError::Solver(format!(
                "cannot run {}: {e}",
                self.executable.display()
            ))
        })?;
        info!(path = %path.display(), status = ?status.code(), "Plate solver finished");
        if status.success() {
            Ok(SolveOutcome::Solved)
        } else {
            Ok(SolveOutcome::Failed {
                code: status.code(),
            })
        }
    }
}
