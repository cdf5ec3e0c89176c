//! Probe engine: compares a [`Snapshot`] against current filesystem state.
//!
//! Short-circuits on the first detected change, reporting the offending
//! path; otherwise returns a (possibly structurally updated) snapshot plus
//! a flag indicating whether the cache header is worth rewriting even
//! though nothing monitored actually changed. Modeled as an explicit
//! `Result<T, PathBuf>` threaded through the recursion rather than a
//! mutable global — Rust's `?` operator gives this for free.

use std::path::{Path, PathBuf};

use crate::builder;
use crate::clock;
use crate::glob_match;
use crate::merge::{self, MergeItem};
use crate::model::{FileStatus, GlobState, MonitorStateFile, MonitorStateGlob, Snapshot};
use crate::path_root;

/// Whether the cache header should be rewritten even though no monitored
/// file changed.
pub type CacheChanged = bool;

/// Probes an entire snapshot against the real filesystem rooted at `root`.
///
/// `Ok` carries the (possibly updated) snapshot plus the cache-changed
/// flag; `Err` carries the first offending path.
pub fn probe(snapshot: &Snapshot, root: &Path) -> Result<(Snapshot, CacheChanged), PathBuf> {
    for file in &snapshot.files {
        probe_file(file, root)?;
    }

    let mut cache_changed = false;
    let mut new_globs = Vec::with_capacity(snapshot.globs.len());

    for glob in &snapshot.globs {
        let abs_root = path_root::resolve(&glob.root.root, root)
            .map_err(|_| crate::model::rooted_glob_display(&glob.root))?;

        let (new_state, changed) = probe_glob(
            &glob.glob_state,
            &abs_root,
            Path::new(""),
            glob.file_kind,
            glob.dir_kind,
        )?;
        cache_changed |= changed;

        new_globs.push(MonitorStateGlob {
            file_kind: glob.file_kind,
            dir_kind: glob.dir_kind,
            root: glob.root.clone(),
            glob_state: new_state,
        });
    }

    Ok((
        Snapshot {
            files: snapshot.files.clone(),
            globs: new_globs,
        },
        cache_changed,
    ))
}

fn probe_file(file: &MonitorStateFile, root: &Path) -> Result<(), PathBuf> {
    let absolute = root.join(&file.path);
    probe_status(&file.status, &absolute, || file.path.clone())
}

/// Probes a single [`FileStatus`] against the filesystem. `report_path` is
/// evaluated lazily since most statuses never need it.
fn probe_status(
    status: &FileStatus,
    absolute: &Path,
    report_path: impl FnOnce() -> PathBuf,
) -> Result<(), PathBuf> {
    match status {
        FileStatus::FileExists => {
            if clock::does_file_exist(absolute) {
                Ok(())
            } else {
                Err(report_path())
            }
        }
        FileStatus::FileModTime(expected) => match clock::get_mtime(absolute) {
            Ok(current) if current == *expected => Ok(()),
            Ok(_) => Err(report_path()),
            // I/O error: treat as unchanged, deliberately — the next
            // action run will surface the real error.
            Err(_) => Ok(()),
        },
        FileStatus::FileHashed(expected_mtime, expected_hash) => match clock::get_mtime(absolute) {
            Ok(current) if current == *expected_mtime => Ok(()),
            Ok(_) => match crate::hash::hash_file(absolute) {
                Ok(hash) if hash == *expected_hash => Ok(()),
                Ok(_) => Err(report_path()),
                Err(_) => Ok(()),
            },
            Err(_) => Ok(()),
        },
        FileStatus::DirExists => {
            if clock::does_dir_exist(absolute) {
                Ok(())
            } else {
                Err(report_path())
            }
        }
        FileStatus::DirModTime(expected) => match clock::get_mtime(absolute) {
            Ok(current) if current == *expected => Ok(()),
            Ok(_) => Err(report_path()),
            Err(_) => Ok(()),
        },
        FileStatus::NonExistent => {
            if clock::does_file_exist(absolute) || clock::does_dir_exist(absolute) {
                Err(report_path())
            } else {
                Ok(())
            }
        }
        FileStatus::AlreadyChanged => Err(report_path()),
    }
}

/// Recursively probes a glob-tree node. `dir` is the absolute directory
/// this node describes; `declared_rel` is the path (relative to the
/// monitored glob's root) that should be reported if this node itself is
/// the offending change.
fn probe_glob(
    state: &GlobState,
    dir: &Path,
    declared_rel: &Path,
    file_kind: crate::model::FileKind,
    dir_kind: crate::model::DirKind,
) -> Result<(GlobState, CacheChanged), PathBuf> {
    match state {
        GlobState::DirTrailing => Ok((GlobState::DirTrailing, false)),

        GlobState::Files {
            pieces,
            dir_mtime,
            entries,
        } => probe_glob_files(pieces, *dir_mtime, entries, dir, declared_rel),

        GlobState::Dirs {
            pieces,
            subglob,
            dir_mtime,
            children,
        } => probe_glob_dirs(
            pieces,
            subglob,
            *dir_mtime,
            children,
            dir,
            declared_rel,
            file_kind,
            dir_kind,
        ),
    }
}

fn probe_glob_files(
    pieces: &str,
    dir_mtime: crate::model::Mtime,
    entries: &[(String, FileStatus)],
    dir: &Path,
    declared_rel: &Path,
) -> Result<(GlobState, CacheChanged), PathBuf> {
    let current_mtime = clock::get_mtime(dir).unwrap_or(dir_mtime);

    let mut live_entries: Vec<(String, FileStatus)> = entries.to_vec();

    if current_mtime != dir_mtime {
        let mut names = clock::get_directory_contents(dir).unwrap_or_default();
        names.retain(|name| glob_match::matches(pieces, name).unwrap_or(false));
        names.sort();

        let left: Vec<(String, FileStatus)> = entries.to_vec();
        let right: Vec<(String, ())> = names.into_iter().map(|name| (name, ())).collect();

        let mut rebuilt = Vec::with_capacity(right.len());
        for item in merge::merge_sorted(left, right) {
            match item {
                MergeItem::InBoth((name, status), _) => rebuilt.push((name, status)),
                // Entries that are no longer listed, or that newly appeared,
                // are both changes here: unlike the directory-level merge
                // in `probe_glob_dirs`, there is no "cheap to re-scan
                // later" argument for individual files.
                MergeItem::OnlyInLeft((name, _)) => return Err(declared_rel.join(&name)),
                MergeItem::OnlyInRight((name, _)) => return Err(declared_rel.join(&name)),
            }
        }
        live_entries = rebuilt;
    }

    // Whether or not the directory's mtime changed, still probe each
    // entry's own status to catch content changes of still-present files.
    for (name, status) in &live_entries {
        let absolute = dir.join(name);
        let rel = declared_rel.join(name);
        probe_status(status, &absolute, || rel.clone())?;
    }

    Ok((
        GlobState::Files {
            pieces: pieces.to_string(),
            dir_mtime: current_mtime,
            entries: live_entries,
        },
        false,
    ))
}

#[allow(clippy::too_many_arguments)]
fn probe_glob_dirs(
    pieces: &str,
    subglob: &crate::model::Glob,
    dir_mtime: crate::model::Mtime,
    children: &[(String, GlobState)],
    dir: &Path,
    declared_rel: &Path,
    file_kind: crate::model::FileKind,
    dir_kind: crate::model::DirKind,
) -> Result<(GlobState, CacheChanged), PathBuf> {
    let current_mtime = clock::get_mtime(dir).unwrap_or(dir_mtime);

    if current_mtime == dir_mtime {
        let mut new_children = Vec::with_capacity(children.len());
        let mut cache_changed = false;
        for (name, child) in children {
            let (new_state, changed) = probe_glob(
                child,
                &dir.join(name),
                &declared_rel.join(name),
                file_kind,
                dir_kind,
            )?;
            cache_changed |= changed;
            new_children.push((name.clone(), new_state));
        }
        return Ok((
            GlobState::Dirs {
                pieces: pieces.to_string(),
                subglob: Box::new(subglob.clone()),
                dir_mtime: current_mtime,
                children: new_children,
            },
            cache_changed,
        ));
    }

    let mut names = clock::get_directory_contents(dir).unwrap_or_default();
    names.retain(|name| {
        glob_match::matches(pieces, name).unwrap_or(false) && clock::does_dir_exist(&dir.join(name))
    });
    names.sort();

    let left: Vec<(String, GlobState)> = children.to_vec();
    let right: Vec<(String, ())> = names.into_iter().map(|name| (name, ())).collect();

    let mut new_children = Vec::new();
    let mut cache_changed = false;

    for item in merge::merge_sorted(left, right) {
        match item {
            MergeItem::InBoth((name, child), _) => {
                let (new_state, changed) = probe_glob(
                    &child,
                    &dir.join(&name),
                    &declared_rel.join(&name),
                    file_kind,
                    dir_kind,
                )?;
                cache_changed |= changed;
                new_children.push((name, new_state));
            }
            MergeItem::OnlyInLeft((name, child)) => {
                // The directory disappeared. If it still contained any
                // matching files, that is a real change; otherwise keep
                // the stale entry rather than force a rewrite — re-scanning
                // an absent directory next time is cheap.
                let rel = declared_rel.join(&name);
                if let Some(path) = first_matching_file(&child, &rel) {
                    return Err(path);
                }
                new_children.push((name, child));
            }
            MergeItem::OnlyInRight((name, _)) => {
                // A new directory appeared. Build it fresh; if it already
                // contains matching files that is a real change (the
                // action could not have seen them), otherwise it is worth
                // persisting so the next probe does not re-walk it from
                // nothing.
                let child_dir = dir.join(&name);
                let rel = declared_rel.join(&name);
                tracing::debug!(dir = %child_dir.display(), "new glob subdirectory, rebuilding state");
                let fresh = builder::build_glob_rel_fresh(&child_dir, subglob, file_kind, dir_kind)
                    .map_err(|_| rel.clone())?;
                if let Some(path) = first_matching_file(&fresh, &rel) {
                    return Err(path);
                }
                cache_changed = true;
                new_children.push((name, fresh));
            }
        }
    }

    Ok((
        GlobState::Dirs {
            pieces: pieces.to_string(),
            subglob: Box::new(subglob.clone()),
            dir_mtime: current_mtime,
            children: new_children,
        },
        cache_changed,
    ))
}

/// Finds the first recorded file entry anywhere in a glob subtree, for
/// reporting as the offending path when a directory has disappeared or
/// newly appeared.
fn first_matching_file(state: &GlobState, rel_prefix: &Path) -> Option<PathBuf> {
    match state {
        GlobState::Files { entries, .. } => entries.first().map(|(name, _)| rel_prefix.join(name)),
        GlobState::Dirs { children, .. } => children
            .iter()
            .find_map(|(name, child)| first_matching_file(child, &rel_prefix.join(name))),
        GlobState::DirTrailing => None,
    }
}
