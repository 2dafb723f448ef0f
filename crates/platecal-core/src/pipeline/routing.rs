use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Move `path` into `dir`, keeping its file name. Never overwrites: an
/// existing target is an `AlreadyExists` error.
pub fn move_into(path: &Path, dir: &Path) -> io::Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let dest = dir.join(name);
    if dest.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        ));
    }
    if fs::rename(path, &dest).is_err() {
        // Rename fails across file systems; fall back to copy and delete.
        fs::copy(path, &dest)?;
        if let Err(e) = fs::remove_file(path) {
            let _ = fs::remove_file(&dest);
            return Err(e);
        }
    }
    Ok(dest)
}

/// Remove `path` if it exists. Returns whether a file was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Regular files directly inside `dir`, sorted by name, excluding `skip`.
pub fn list_files(dir: &Path, skip: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && !skip.iter().any(|s| s == &path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
