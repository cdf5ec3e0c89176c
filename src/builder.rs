//! Snapshot builder: given declared monitor paths, a start timestamp, and
//! an optional prior hash cache, inspects the filesystem and produces a
//! fresh [`Snapshot`].

use std::path::Path;

use crate::error::BuildError;
use crate::glob_match;
use crate::hash::{self, FileHashCache};
use crate::model::{
    DirKind, FileKind, FileStatus, Glob, MonitorPath, MonitorStateFile, MonitorStateGlob, Mtime,
    Snapshot, Timestamp,
};
use crate::path_root;

/// Builds a fresh snapshot for every declared path under `root`.
///
/// `start` should be the [`Timestamp`] returned by `begin-update`, read
/// before the action whose inputs are being monitored started running;
/// `None` is used when there is no action to race against (e.g. a
/// probe-time rebuild of a freshly-discovered glob subtree).
pub fn build_snapshot(
    start: Option<Timestamp>,
    hash_cache: &mut FileHashCache,
    root: &Path,
    declared: &[MonitorPath],
) -> Result<Snapshot, BuildError> {
    let mut snapshot = Snapshot::new();

    for path in declared {
        match path {
            MonitorPath::SinglePath {
                file_kind,
                dir_kind,
                path,
            } => {
                let status = build_single_state(start, hash_cache, root, path, *file_kind, *dir_kind)?;
                snapshot.files.push(MonitorStateFile {
                    file_kind: *file_kind,
                    dir_kind: *dir_kind,
                    path: path.clone(),
                    status,
                });
            }
            MonitorPath::GlobPath {
                file_kind,
                dir_kind,
                rooted_glob,
            } => {
                let abs_root = path_root::resolve(&rooted_glob.root, root)
                    .map_err(|_| BuildError::NoHomeDirectory(crate::model::rooted_glob_display(rooted_glob)))?;
                let glob_state =
                    build_glob_rel(start, hash_cache, &abs_root, &rooted_glob.glob, *file_kind, *dir_kind)?;
                snapshot.globs.push(MonitorStateGlob {
                    file_kind: *file_kind,
                    dir_kind: *dir_kind,
                    root: rooted_glob.clone(),
                    glob_state,
                });
            }
        }
    }

    Ok(snapshot)
}

/// `changed-during-update`: a file/dir whose mtime is at or after the
/// action's start time must conservatively be assumed to have been
/// modified concurrently with the action that is about to be cached.
fn changed_during_update(start: Option<Timestamp>, mtime: Mtime) -> bool {
    start.is_some_and(|start| mtime > start)
}

/// Builds the [`FileStatus`] for a single declared (or glob-matched) path.
pub(crate) fn build_single_state(
    start: Option<Timestamp>,
    hash_cache: &mut FileHashCache,
    root: &Path,
    relative_path: &Path,
    file_kind: FileKind,
    dir_kind: DirKind,
) -> Result<FileStatus, BuildError> {
    let absolute = root.join(relative_path);
    let is_file = crate::clock::does_file_exist(&absolute);
    let is_dir = crate::clock::does_dir_exist(&absolute);

    if is_file {
        return Ok(build_file_status(
            start,
            hash_cache,
            &absolute,
            file_kind,
        ));
    }

    if is_dir {
        return Ok(build_dir_status(start, &absolute, dir_kind));
    }

    if file_kind == FileKind::NotExists && dir_kind == DirKind::NotExists {
        Ok(FileStatus::NonExistent)
    } else {
        Ok(FileStatus::AlreadyChanged)
    }
}

fn build_file_status(
    start: Option<Timestamp>,
    hash_cache: &mut FileHashCache,
    absolute: &Path,
    file_kind: FileKind,
) -> FileStatus {
    match file_kind {
        FileKind::NotExists => FileStatus::AlreadyChanged,
        FileKind::Exists => FileStatus::FileExists,
        FileKind::ModTime => match crate::clock::get_mtime(absolute) {
            Ok(mtime) if changed_during_update(start, mtime) => FileStatus::AlreadyChanged,
            Ok(mtime) => FileStatus::FileModTime(mtime),
            Err(_) => FileStatus::AlreadyChanged,
        },
        FileKind::Hashed => match crate::clock::get_mtime(absolute) {
            Ok(mtime) if changed_during_update(start, mtime) => FileStatus::AlreadyChanged,
            Ok(mtime) => {
                let hash = match hash_cache.get_if_fresh(absolute, mtime) {
                    Some(hash) => {
                        tracing::debug!(path = %absolute.display(), "hash cache hit");
                        Some(hash)
                    }
                    None => hash::hash_file(absolute).ok().map(|computed| {
                        tracing::debug!(path = %absolute.display(), "hash cache miss, rehashing");
                        hash_cache.insert(absolute.to_path_buf(), mtime, computed);
                        computed
                    }),
                };
                match hash {
                    Some(hash) => FileStatus::FileHashed(mtime, hash),
                    None => FileStatus::AlreadyChanged,
                }
            }
            Err(_) => FileStatus::AlreadyChanged,
        },
    }
}

fn build_dir_status(start: Option<Timestamp>, absolute: &Path, dir_kind: DirKind) -> FileStatus {
    match dir_kind {
        DirKind::NotExists => FileStatus::AlreadyChanged,
        DirKind::Exists => FileStatus::DirExists,
        DirKind::ModTime => match crate::clock::get_mtime(absolute) {
            Ok(mtime) if changed_during_update(start, mtime) => FileStatus::AlreadyChanged,
            Ok(mtime) => FileStatus::DirModTime(mtime),
            Err(_) => FileStatus::AlreadyChanged,
        },
    }
}

/// Lists `dir`'s basenames and mtime; a directory that does not (yet)
/// exist is treated as an empty directory rather than an error, since a
/// monitored glob root legitimately may not exist until the action that
/// is about to be cached creates it.
fn stat_dir(dir: &Path) -> Result<(Mtime, Vec<String>), BuildError> {
    if !crate::clock::does_dir_exist(dir) {
        return Ok((Mtime::EPOCH, Vec::new()));
    }
    let mtime = crate::clock::get_mtime(dir)?;
    let entries = crate::clock::get_directory_contents(dir)?;
    Ok((mtime, entries))
}

/// `Build-glob-rel`: recursively builds a [`crate::model::GlobState`] tree
/// rooted at `dir`.
pub(crate) fn build_glob_rel(
    start: Option<Timestamp>,
    hash_cache: &mut FileHashCache,
    dir: &Path,
    glob: &Glob,
    file_kind: FileKind,
    dir_kind: DirKind,
) -> Result<crate::model::GlobState, BuildError> {
    use crate::model::GlobState;

    match glob {
        Glob::DirRecursive => Err(BuildError::UnsupportedRecursiveGlob),

        Glob::DirTrailing => Ok(GlobState::DirTrailing),

        Glob::Dir { pieces, subglob } => {
            let (dir_mtime, entries) = stat_dir(dir)?;

            let mut matched: Vec<String> = entries
                .into_iter()
                .filter(|name| {
                    glob_match::matches(pieces, name).unwrap_or(false)
                        && crate::clock::does_dir_exist(&dir.join(name))
                })
                .collect();
            matched.sort();

            let mut children = Vec::with_capacity(matched.len());
            for name in matched {
                let child_dir = dir.join(&name);
                let state =
                    build_glob_rel(start, hash_cache, &child_dir, subglob, file_kind, dir_kind)?;
                children.push((name, state));
            }

            Ok(GlobState::Dirs {
                pieces: pieces.clone(),
                subglob: subglob.clone(),
                dir_mtime,
                children,
            })
        }

        Glob::File { pieces } => {
            let (dir_mtime, entries) = stat_dir(dir)?;

            // Deliberately no filetype check here — preserved as specified;
            // a glob-file pattern matches any entry whose name matches,
            // not only entries that are actually files (mirrored by the
            // probe engine's equivalent pass).
            let mut matched: Vec<String> = entries
                .into_iter()
                .filter(|name| glob_match::matches(pieces, name).unwrap_or(false))
                .collect();
            matched.sort();

            let mut out_entries = Vec::with_capacity(matched.len());
            for name in matched {
                let status = build_single_state(
                    start,
                    hash_cache,
                    dir,
                    Path::new(&name),
                    file_kind,
                    dir_kind,
                )?;
                out_entries.push((name, status));
            }

            Ok(GlobState::Files {
                pieces: pieces.clone(),
                dir_mtime,
                entries: out_entries,
            })
        }
    }
}

/// Convenience used by the probe engine when a glob subtree needs to be
/// freshly scanned from scratch (a newly-appeared directory); there is no
/// start timestamp or prior hash cache to consult in that situation.
pub(crate) fn build_glob_rel_fresh(
    dir: &Path,
    glob: &Glob,
    file_kind: FileKind,
    dir_kind: DirKind,
) -> Result<crate::model::GlobState, BuildError> {
    let mut empty = FileHashCache::new();
    build_glob_rel(None, &mut empty, dir, glob, file_kind, dir_kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn single_nonexistent_path_is_nonexistent_when_kinds_permit_absence() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FileHashCache::new();
        let status = build_single_state(
            None,
            &mut cache,
            dir.path(),
            Path::new("missing"),
            FileKind::NotExists,
            DirKind::NotExists,
        )
        .unwrap();
        assert_eq!(status, FileStatus::NonExistent);
    }

    #[test]
    fn single_nonexistent_path_is_already_changed_when_presence_required() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FileHashCache::new();
        let status = build_single_state(
            None,
            &mut cache,
            dir.path(),
            Path::new("missing"),
            FileKind::Exists,
            DirKind::NotExists,
        )
        .unwrap();
        assert_eq!(status, FileStatus::AlreadyChanged);
    }

    #[test]
    fn fresh_cache_entry_is_reused_without_rehashing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a");
        fs::write(&file, b"hello").unwrap();
        let mtime = crate::clock::get_mtime(&file).unwrap();

        let mut cache = FileHashCache::new();
        assert!(cache.is_empty());
        // A sentinel that could never be the real hash of "hello": if the
        // builder rehashed the file instead of trusting the cache, the
        // returned status would carry the real hash, not this one.
        let sentinel = 0xDEAD_BEEFu64;
        cache.insert(file.clone(), mtime, sentinel);
        assert_eq!(cache.len(), 1);

        let status = build_single_state(
            None,
            &mut cache,
            dir.path(),
            Path::new("a"),
            FileKind::Hashed,
            DirKind::NotExists,
        )
        .unwrap();

        assert_eq!(status, FileStatus::FileHashed(mtime, sentinel));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn hashed_file_is_recorded_with_mtime_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"hello").unwrap();
        let mut cache = FileHashCache::new();

        let status = build_single_state(
            None,
            &mut cache,
            dir.path(),
            Path::new("a"),
            FileKind::Hashed,
            DirKind::NotExists,
        )
        .unwrap();

        match status {
            FileStatus::FileHashed(_, hash) => {
                assert_eq!(hash, hash::hash_file(&dir.path().join("a")).unwrap())
            }
            other => panic!("expected FileHashed, got {other:?}"),
        }
    }

    #[test]
    fn concurrent_write_during_action_is_already_changed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a");
        fs::write(&file, b"before").unwrap();

        let start = Mtime::EPOCH;
        let real_mtime = crate::clock::get_mtime(&file).unwrap();
        assert!(real_mtime > start);

        let mut cache = FileHashCache::new();
        let status = build_single_state(
            Some(start),
            &mut cache,
            dir.path(),
            Path::new("a"),
            FileKind::ModTime,
            DirKind::NotExists,
        )
        .unwrap();
        assert_eq!(status, FileStatus::AlreadyChanged);
    }

    #[test]
    fn recursive_glob_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FileHashCache::new();
        let err = build_glob_rel(
            None,
            &mut cache,
            dir.path(),
            &Glob::DirRecursive,
            FileKind::Exists,
            DirKind::NotExists,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedRecursiveGlob));
    }

    #[test]
    fn glob_file_lists_sorted_matches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), b"").unwrap();
        fs::write(dir.path().join("a.txt"), b"").unwrap();
        fs::write(dir.path().join("a.rs"), b"").unwrap();
        let mut cache = FileHashCache::new();

        let state = build_glob_rel(
            None,
            &mut cache,
            dir.path(),
            &Glob::File {
                pieces: "*.txt".to_string(),
            },
            FileKind::ModTime,
            DirKind::NotExists,
        )
        .unwrap();

        match state {
            crate::model::GlobState::Files { entries, .. } => {
                let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["a.txt", "b.txt"]);
            }
            other => panic!("expected Files, got {other:?}"),
        }
    }
}
