use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::{debug, info};

use crate::frame::{FrameInfo, ImageKind};
use crate::io::fits::{FitsHeader, FitsImage};

use super::error::CalibrationError;

/// A flat resolved for one light frame.
#[derive(Clone, Debug)]
pub struct FlatFrame {
    pub path: PathBuf,
    pub filter: String,
    pub binning: u32,
    /// Normalized by the 16-bit full scale.
    pub data: Array2<f32>,
}

/// Selects a flat by filter and binning from a directory of candidates.
#[derive(Clone, Debug)]
pub struct FlatMatcher {
    dir: PathBuf,
    name_prefix: String,
    extension: String,
}

impl FlatMatcher {
    /// `name_prefix` and `extension` restrict which files are opened at all.
    pub fn new(dir: impl Into<PathBuf>, name_prefix: &str, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            name_prefix: name_prefix.to_string(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First candidate, in file-name order, whose IMAGETYP starts with FLAT,
    /// whose FILTER starts with `filter` and whose binning equals `binning`.
    ///
    /// `Ok(None)` means no candidate matched. Any I/O or format error while
    /// scanning is a `FlatLoadFailure`.
    pub fn find(
        &self,
        filter: &str,
        binning: u32,
    ) -> std::result::Result<Option<FlatFrame>, CalibrationError> {
        for path in self.candidates()? {
            let info = FitsHeader::read(&path)
                .map(|mut header| FrameInfo::from_header(&mut header))
                .map_err(|e| self.load_failure(&path, e))?;
            let Some(flat_filter) = info.filter.as_deref() else {
                debug!(path = %path.display(), "Flat has no FILTER, skipping");
                continue;
            };
            if info.kind != ImageKind::Flat
                || !flat_filter.starts_with(filter)
                || info.binning != binning
            {
                continue;
            }

            let image = FitsImage::open(&path).map_err(|e| self.load_failure(&path, e))?;
            info!(path = %path.display(), filter = flat_filter, binning, "Flat found");
            return Ok(Some(FlatFrame {
                filter: flat_filter.to_string(),
                binning,
                data: image.normalized(),
                path,
            }));
        }
        Ok(None)
    }

    fn candidates(&self) -> std::result::Result<Vec<PathBuf>, CalibrationError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| self.load_failure(&self.dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.load_failure(&self.dir, e))?;
            let path = entry.path();
            if path.is_file() && self.is_candidate_name(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn is_candidate_name(&self, path: &Path) -> bool {
        let name_ok = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&self.name_prefix));
        let ext_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        name_ok && ext_ok
    }

    fn load_failure(&self, path: &Path, err: impl std::fmt::Display) -> CalibrationError {
        CalibrationError::FlatLoadFailure {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}
