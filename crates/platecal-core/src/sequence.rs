use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;

/// Monotonic sequence counter persisted as a one-line text file.
///
/// Read once at the start of a run, advanced in memory for every renamed
/// file, written back once at the end.
#[derive(Debug)]
pub struct SequenceRegistry {
    path: PathBuf,
    value: u64,
}

impl SequenceRegistry {
    /// Read the counter. A missing or unparsable file counts as 0.
    pub fn load(path: &Path) -> Self {
        let value = match fs::read_to_string(path) {
            Ok(contents) => match contents.lines().next().unwrap_or("").trim().parse::<u64>() {
                Ok(v) => v,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable sequence number, starting at 0");
                    0
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read sequence file, starting at 0");
                0
            }
        };
        info!(path = %path.display(), value, "Sequence number loaded");
        Self {
            path: path.to_path_buf(),
            value,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> u64 {
        self.value
    }

    /// The number `next` would return, without consuming it.
    pub fn peek_next(&self) -> u64 {
        self.value + 1
    }

    /// Advance the counter and return the new value. Not persisted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        self.value += 1;
        self.value
    }

    /// Write the current value, creating the parent directory if needed.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, self.value.to_string())?;
        info!(path = %self.path.display(), value = self.value, "Sequence number saved");
        Ok(())
    }
}
