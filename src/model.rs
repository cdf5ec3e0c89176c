//! The data model of the monitor: declared paths, globs, and snapshots.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    NotExists,
    Exists,
    ModTime,
    Hashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirKind {
    NotExists,
    Exists,
    ModTime,
}

/// Nanoseconds since the Unix epoch, stored as a plain integer rather than
/// wrapping `SystemTime` directly (whose `Serialize` impl is
/// platform-dependent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Mtime(u128);

impl Mtime {
    pub const EPOCH: Mtime = Mtime(0);

    pub fn from_system_time(time: SystemTime) -> Self {
        let nanos = time.duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
        Mtime(nanos)
    }
}

pub type Timestamp = Mtime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilePathRoot {
    Relative,
    Absolute(PathBuf),
    Home(PathBuf),
    Drive(char, PathBuf),
}

/// Recursive (`**`) globs are represented so they can be rejected with a
/// clear error rather than silently mismatching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Glob {
    Dir { pieces: String, subglob: Box<Glob> },
    File { pieces: String },
    DirTrailing,
    DirRecursive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootedGlob {
    pub root: FilePathRoot,
    pub glob: Glob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorPath {
    SinglePath {
        file_kind: FileKind,
        dir_kind: DirKind,
        path: PathBuf,
    },
    GlobPath {
        file_kind: FileKind,
        dir_kind: DirKind,
        rooted_glob: RootedGlob,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    FileExists,
    FileModTime(Mtime),
    FileHashed(Mtime, u64),
    DirExists,
    DirModTime(Mtime),
    NonExistent,
    /// Forces the next probe to report a change regardless of filesystem
    /// state, e.g. after a concurrent write or an I/O error made the
    /// current state untrustworthy.
    AlreadyChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStateFile {
    pub file_kind: FileKind,
    pub dir_kind: DirKind,
    pub path: PathBuf,
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStateGlob {
    pub file_kind: FileKind,
    pub dir_kind: DirKind,
    pub root: RootedGlob,
    pub glob_state: GlobState,
}

/// `children`/`entries` are always kept sorted ascending by basename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlobState {
    Dirs {
        pieces: String,
        subglob: Box<Glob>,
        dir_mtime: Mtime,
        children: Vec<(String, GlobState)>,
    },
    Files {
        pieces: String,
        dir_mtime: Mtime,
        entries: Vec<(String, FileStatus)>,
    },
    DirTrailing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub files: Vec<MonitorStateFile>,
    pub globs: Vec<MonitorStateGlob>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstructs the declared `MonitorPath` list the snapshot was built
    /// from.
    pub fn declared_paths(&self) -> Vec<MonitorPath> {
        let mut out = Vec::with_capacity(self.files.len() + self.globs.len());
        for file in &self.files {
            out.push(MonitorPath::SinglePath {
                file_kind: file.file_kind,
                dir_kind: file.dir_kind,
                path: file.path.clone(),
            });
        }
        for glob in &self.globs {
            out.push(MonitorPath::GlobPath {
                file_kind: glob.file_kind,
                dir_kind: glob.dir_kind,
                rooted_glob: glob.root.clone(),
            });
        }
        out
    }
}

/// Best-effort human-readable path for a rooted glob, used only to label an
/// error when the root itself cannot be resolved (e.g. no home directory).
pub(crate) fn rooted_glob_display(root: &RootedGlob) -> PathBuf {
    match &root.root {
        FilePathRoot::Relative => PathBuf::from("."),
        FilePathRoot::Absolute(p) => p.clone(),
        FilePathRoot::Home(p) => Path::new("~").join(p),
        FilePathRoot::Drive(letter, p) => PathBuf::from(format!("{letter}:")).join(p),
    }
}
