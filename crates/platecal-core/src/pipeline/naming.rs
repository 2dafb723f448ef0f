use std::path::{Path, PathBuf};

use crate::consts::SEQUENCE_DIGITS;

use super::config::NamingConfig;

/// Whether `name` follows the input convention: prefix plus image extension.
pub fn matches_input(name: &str, naming: &NamingConfig) -> bool {
    let ext = naming.extension.trim_start_matches('.');
    name.starts_with(&naming.input_prefix)
        && Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Replace the trailing space-separated token of the stem with `seq`,
/// zero-padded to eight digits. A stem without spaces gets the token appended.
///
/// `"MN M31 0003.fits"` with seq 42 becomes `"MN M31 00000042.fits"`.
pub fn sequenced_name(name: &str, seq: u64) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let base = stem.rsplit_once(' ').map_or(stem, |(base, _)| base);
    Some(format!("{base} {seq:0width$}.{ext}", width = SEQUENCE_DIGITS))
}

/// Whether the stem already ends in an eight-digit sequence token.
pub fn has_sequence_token(name: &str) -> bool {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    stem.rsplit_once(' ').is_some_and(|(_, token)| {
        token.len() == SEQUENCE_DIGITS && token.bytes().all(|b| b.is_ascii_digit())
    })
}

/// Name of the calibrated copy: the input prefix swapped for the calibrated one.
pub fn calibrated_name(name: &str, naming: &NamingConfig) -> Option<String> {
    name.strip_prefix(&naming.input_prefix)
        .map(|rest| format!("{}{rest}", naming.calibrated_prefix))
}

/// Result files a solver may have written next to `path`.
pub fn sidecar_paths(path: &Path, extensions: &[String]) -> Vec<PathBuf> {
    extensions
        .iter()
        .map(|ext| path.with_extension(ext.trim_start_matches('.')))
        .filter(|p| p != path)
        .collect()
}
