//! `get-mtime` / `does-file-exist` / `does-dir-exist` /
//! `get-directory-contents` collaborators, plus the `begin-update` mtime
//! resolution reading.
//!
//! These are thin wrappers over `std::fs` rather than a watcher: this
//! crate polls on demand instead of subscribing to filesystem events.

use std::fs;
use std::io;
use std::path::Path;

use crate::model::{Mtime, Timestamp};

/// Follows symlinks; never raises (mirrors the `does-file-exist` /
/// `does-dir-exist` collaborator contract in full).
pub fn does_file_exist(path: &Path) -> bool {
    path.is_file()
}

pub fn does_dir_exist(path: &Path) -> bool {
    path.is_dir()
}

pub fn get_mtime(path: &Path) -> io::Result<Mtime> {
    let metadata = fs::metadata(path)?;
    Ok(Mtime::from_system_time(metadata.modified()?))
}

/// Lists a directory's basenames, excluding `.`/`..` (which `read_dir`
/// never yields in the first place). A directory that does not exist
/// yields an empty listing rather than an error — the builder and probe
/// both treat "not there yet" as "nothing matched", not as a hard failure.
pub fn get_directory_contents(path: &Path) -> io::Result<Vec<String>> {
    if !path.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Reads the current wall-clock mtime resolution from the filesystem clock
/// by touching a throwaway temp file inside `probe_dir` and reading back
/// its mtime. This is deliberately a real filesystem stat rather than
/// `SystemTime::now()`: `changed-during-update` only works if `start-time`
/// lives in the same clock as the mtimes it is compared against, and on
/// some platforms (notably networked filesystems) that clock can drift
/// from the system clock.
pub fn begin_update_timestamp(probe_dir: &Path) -> io::Result<Timestamp> {
    fs::create_dir_all(probe_dir)?;
    let tmp = tempfile::NamedTempFile::new_in(probe_dir)?;
    get_mtime(tmp.path())
}
