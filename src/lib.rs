//! A file-monitor cache for incremental build and command systems.
//!
//! A caller declares the paths and globs an action depends on, asks the
//! monitor whether the cached result for a given key is still valid, and
//! if not, runs the action and records a fresh snapshot. All probing is
//! synchronous, blocking, single-threaded `stat`-based polling — there is
//! no background watcher thread and no wire protocol, only a library the
//! caller drives directly.

mod atomic;
mod builder;
mod clock;
mod codec;
mod error;
mod glob_match;
mod hash;
mod merge;
mod model;
mod monitor;
mod path_root;
mod probe;

pub use codec::FORMAT_VERSION;
pub use error::{BuildError, CacheError, UpdateError};
pub use hash::{ContentHash, FileHashCache};
pub use model::{
    DirKind, FileKind, FilePathRoot, FileStatus, Glob, GlobState, Mtime, MonitorPath,
    MonitorStateFile, MonitorStateGlob, RootedGlob, Snapshot, Timestamp,
};
pub use monitor::{CheckResult, ChangeReason, Monitor};
pub use path_root::PathRootError;
