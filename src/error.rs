//! Error types for the snapshot builder and cache codec.
//!
//! The probe engine deliberately has no error type of its own: per the
//! error-handling policy, I/O failures encountered while probing are
//! swallowed and treated as "unchanged" (the next action run will surface
//! the real error), so probing only ever fails with the offending path.

use std::path::PathBuf;

/// Failures that can occur while building a fresh [`crate::model::Snapshot`].
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// A [`crate::model::Glob::DirRecursive`] pattern was encountered.
    #[error("recursive glob patterns ('**') are not supported")]
    UnsupportedRecursiveGlob,

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("no home directory available to resolve path root {0:?}")]
    NoHomeDirectory(PathBuf),

    #[error("I/O error building snapshot: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reading or writing the cache file.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("I/O error accessing cache file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache codec error: {0}")]
    Codec(#[from] postcard::Error),

    /// The file is shorter than the framing requires, or its structural tag
    /// does not match this build's [`crate::codec::FORMAT_VERSION`].
    #[error("cache file is structurally invalid")]
    Corrupt,
}

/// Failures from [`crate::monitor::Monitor::update`].
#[derive(thiserror::Error, Debug)]
pub enum UpdateError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
