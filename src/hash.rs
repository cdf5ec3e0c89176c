//! `read-file-hash` collaborator and the hash cache used to skip
//! re-hashing files whose mtime has not changed.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use xxhash_rust::xxh3::xxh3_64;

use crate::model::{GlobState, Mtime, Snapshot};
use crate::path_root;

pub type ContentHash = u64;

pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
    let contents = fs::read(path)?;
    Ok(xxh3_64(&contents))
}

/// Auxiliary mapping from absolute path to `(mtime, hash)`, extracted from
/// a previous snapshot so the builder can skip re-hashing files whose
/// mtime has not moved.
#[derive(Debug, Default)]
pub struct FileHashCache {
    entries: HashMap<PathBuf, (Mtime, ContentHash)>,
}

impl FileHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached hash only if it was recorded at exactly `mtime`.
    pub fn get_if_fresh(&self, path: &Path, mtime: Mtime) -> Option<ContentHash> {
        self.entries
            .get(path)
            .filter(|(cached_mtime, _)| *cached_mtime == mtime)
            .map(|(_, hash)| *hash)
    }

    pub fn insert(&mut self, path: PathBuf, mtime: Mtime, hash: ContentHash) {
        self.entries.insert(path, (mtime, hash));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Walks a previous snapshot and extracts every `FileHashed` entry into a
/// fresh [`FileHashCache`], keyed by absolute path. Used by
/// [`crate::monitor::Monitor::update`]'s first step; any failure upstream
/// (missing or corrupt cache file) means this is simply never called and
/// an empty cache is used instead.
pub fn harvest(previous: &Snapshot, root: &Path) -> FileHashCache {
    use crate::model::FileStatus;

    let mut cache = FileHashCache::new();

    for file in &previous.files {
        if let FileStatus::FileHashed(mtime, hash) = file.status {
            cache.insert(root.join(&file.path), mtime, hash);
        }
    }

    for glob in &previous.globs {
        let Ok(abs_root) = path_root::resolve(&glob.root.root, root) else {
            continue;
        };
        harvest_glob_state(&glob.glob_state, &abs_root, &mut cache);
    }

    cache
}

fn harvest_glob_state(state: &GlobState, dir: &Path, cache: &mut FileHashCache) {
    use crate::model::FileStatus;

    match state {
        GlobState::Dirs { children, .. } => {
            for (name, child) in children {
                harvest_glob_state(child, &dir.join(name), cache);
            }
        }
        GlobState::Files { entries, .. } => {
            for (name, status) in entries {
                if let FileStatus::FileHashed(mtime, hash) = status {
                    cache.insert(dir.join(name), *mtime, *hash);
                }
            }
        }
        GlobState::DirTrailing => {}
    }
}
