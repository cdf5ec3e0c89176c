//! `get-file-path-root-directory` collaborator: resolves a
//! [`FilePathRoot`] against a contextual root into an absolute directory.

use std::path::{Path, PathBuf};

use crate::model::FilePathRoot;

#[derive(thiserror::Error, Debug)]
pub enum PathRootError {
    #[error("no home directory available to resolve path root")]
    NoHomeDirectory,
}

/// Resolves `root` to an absolute directory. `contextual_root` is the root
/// passed to the enclosing monitor call, used for [`FilePathRoot::Relative`].
pub fn resolve(root: &FilePathRoot, contextual_root: &Path) -> Result<PathBuf, PathRootError> {
    match root {
        FilePathRoot::Relative => Ok(contextual_root.to_path_buf()),
        FilePathRoot::Absolute(path) => Ok(path.clone()),
        FilePathRoot::Home(suffix) => dirs::home_dir()
            .map(|home| home.join(suffix))
            .ok_or(PathRootError::NoHomeDirectory),
        FilePathRoot::Drive(letter, suffix) => {
            Ok(PathBuf::from(format!("{letter}:\\")).join(suffix))
        }
    }
}
