//! `write-file-atomic` collaborator: durably replace a file's contents.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Writes via a temp file in the same directory, then renames it into
/// place — a plain `fs::write` can leave a torn file behind if the
/// process is killed mid-write.
pub fn write_file_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
