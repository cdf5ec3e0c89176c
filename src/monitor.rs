//! Monitor façade: `check`, `update`, and the `begin-update` timestamp
//! primitive, mediating between callers, the codec, the probe engine, and
//! the snapshot builder.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::builder;
use crate::clock;
use crate::codec;
use crate::error::UpdateError;
use crate::hash::FileHashCache;
use crate::model::{MonitorPath, Timestamp};
use crate::probe;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult<K, V> {
    Unchanged(V, Vec<MonitorPath>),
    Changed(ChangeReason<K>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason<K> {
    FirstRun,
    CorruptCache,
    KeyChanged(K),
    FileChanged(PathBuf),
}

/// A monitor descriptor bound to a single cache file.
///
/// Not designed to be used concurrently with itself: the caller must
/// serialize `check`/`update` calls against the same cache path. Distinct
/// `Monitor`s (different cache files) need no coordination between them.
pub struct Monitor<K, V> {
    cache_path: PathBuf,
    key_equal: Box<dyn Fn(&K, &K) -> bool>,
    check_only_value_change: bool,
    _result: std::marker::PhantomData<V>,
}

impl<K, V> Monitor<K, V>
where
    K: PartialEq + 'static,
{
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            key_equal: Box::new(|a: &K, b: &K| a == b),
            check_only_value_change: false,
            _result: std::marker::PhantomData,
        }
    }
}

impl<K, V> Monitor<K, V> {
    /// `key_equal` must be reflexive, but need not be `PartialEq::eq` — a
    /// subset relation is a valid choice too.
    pub fn with_key_equal(mut self, key_equal: impl Fn(&K, &K) -> bool + 'static) -> Self {
        self.key_equal = Box::new(key_equal);
        self
    }

    /// When `true`, `check` probes files before comparing keys, so a
    /// `KeyChanged` result implies no monitored file changed either.
    pub fn with_check_only_value_change(mut self, value: bool) -> Self {
        self.check_only_value_change = value;
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Must be called before the action whose inputs are being monitored
    /// starts running.
    pub fn begin_update(&self) -> io::Result<Timestamp> {
        let dir = self.cache_path.parent().unwrap_or_else(|| Path::new("."));
        clock::begin_update_timestamp(dir)
    }
}

impl<K, V> Monitor<K, V>
where
    K: Serialize + DeserializeOwned,
    V: DeserializeOwned,
{
    pub fn check(&self, root: &Path, current_key: &K) -> CheckResult<K, V> {
        let bytes = match fs::read(&self.cache_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return CheckResult::Changed(ChangeReason::FirstRun);
            }
            Err(e) => {
                warn!(path = %self.cache_path.display(), error = %e, "cache file unreadable, treating as corrupt");
                return CheckResult::Changed(ChangeReason::CorruptCache);
            }
        };

        let header = match codec::decode_header::<K>(&bytes) {
            Ok(header) => header,
            Err(e) => {
                debug!(path = %self.cache_path.display(), error = %e, "cache header undecodable");
                return CheckResult::Changed(ChangeReason::CorruptCache);
            }
        };

        let value_checked_first = !self.check_only_value_change;

        if value_checked_first && !(self.key_equal)(&header.key, current_key) {
            return CheckResult::Changed(ChangeReason::KeyChanged(header.key));
        }

        let (new_snapshot, cache_changed) = match probe::probe(&header.snapshot, root) {
            Err(changed_path) => {
                debug!(path = %changed_path.display(), "monitored path changed");
                return CheckResult::Changed(ChangeReason::FileChanged(changed_path));
            }
            Ok(outcome) => outcome,
        };

        if !value_checked_first && !(self.key_equal)(&header.key, current_key) {
            return CheckResult::Changed(ChangeReason::KeyChanged(header.key));
        }

        let value: V = match header.decode_result() {
            Ok(value) => value,
            Err(e) => {
                debug!(path = %self.cache_path.display(), error = %e, "cached result undecodable");
                return CheckResult::Changed(ChangeReason::CorruptCache);
            }
        };

        if cache_changed {
            let rewrite =
                codec::write_raw(&self.cache_path, &new_snapshot, &header.key, header.result_bytes());
            if let Err(e) = rewrite {
                error!(path = %self.cache_path.display(), error = %e, "failed to persist opportunistic snapshot update");
            } else {
                debug!(path = %self.cache_path.display(), "rewrote cache header without a monitored change");
            }
        }

        CheckResult::Unchanged(value, new_snapshot.declared_paths())
    }
}

impl<K, V> Monitor<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize,
{
    pub fn update(
        &self,
        root: &Path,
        start: Option<Timestamp>,
        declared: &[MonitorPath],
        key: &K,
        result: &V,
    ) -> Result<(), UpdateError> {
        let mut hash_cache = self.load_hash_cache(root);

        let snapshot = builder::build_snapshot(start, &mut hash_cache, root, declared)?;
        codec::write_full(&self.cache_path, &snapshot, key, result)?;

        debug!(
            path = %self.cache_path.display(),
            files = snapshot.files.len(),
            globs = snapshot.globs.len(),
            "wrote updated cache snapshot"
        );
        Ok(())
    }

    fn load_hash_cache(&self, root: &Path) -> FileHashCache {
        match fs::read(&self.cache_path) {
            Ok(bytes) => match codec::decode_header::<K>(&bytes) {
                Ok(header) => crate::hash::harvest(&header.snapshot, root),
                Err(_) => FileHashCache::new(),
            },
            Err(_) => FileHashCache::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DirKind, FileKind};

    fn single(file_kind: FileKind, dir_kind: DirKind, path: &str) -> MonitorPath {
        MonitorPath::SinglePath {
            file_kind,
            dir_kind,
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn first_run_when_cache_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let monitor: Monitor<u32, String> = Monitor::new(dir.path().join("cache.bin"));

        let result = monitor.check(dir.path(), &1);
        assert!(matches!(
            result,
            CheckResult::Changed(ChangeReason::FirstRun)
        ));
    }

    #[test]
    fn round_trip_after_update_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"hello").unwrap();

        let monitor: Monitor<u32, String> = Monitor::new(dir.path().join("cache.bin"));
        let declared = vec![single(FileKind::Exists, DirKind::NotExists, "a")];

        monitor
            .update(dir.path(), None, &declared, &1u32, &"v1".to_string())
            .unwrap();

        match monitor.check(dir.path(), &1u32) {
            CheckResult::Unchanged(value, paths) => {
                assert_eq!(value, "v1");
                assert_eq!(paths, declared);
            }
            other => panic!("expected Unchanged, got {other:?}"),
        }
    }

    #[test]
    fn key_change_without_file_change_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"hello").unwrap();

        let monitor: Monitor<u32, String> = Monitor::new(dir.path().join("cache.bin"));
        let declared = vec![single(FileKind::Exists, DirKind::NotExists, "a")];

        monitor
            .update(dir.path(), None, &declared, &1u32, &"v1".to_string())
            .unwrap();

        match monitor.check(dir.path(), &2u32) {
            CheckResult::Changed(ChangeReason::KeyChanged(old)) => assert_eq!(old, 1),
            other => panic!("expected KeyChanged, got {other:?}"),
        }
    }

    #[test]
    fn file_deletion_is_reported_as_file_changed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a");
        std::fs::write(&file, b"hello").unwrap();

        let monitor: Monitor<u32, String> = Monitor::new(dir.path().join("cache.bin"));
        let declared = vec![single(FileKind::Exists, DirKind::NotExists, "a")];

        monitor
            .update(dir.path(), None, &declared, &1u32, &"v1".to_string())
            .unwrap();

        std::fs::remove_file(&file).unwrap();

        match monitor.check(dir.path(), &1u32) {
            CheckResult::Changed(ChangeReason::FileChanged(path)) => {
                assert_eq!(path, PathBuf::from("a"))
            }
            other => panic!("expected FileChanged, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_cache_file_is_benign() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cache.bin");
        std::fs::write(&cache_path, b"not a valid cache file at all").unwrap();

        let monitor: Monitor<u32, String> = Monitor::new(&cache_path);
        assert!(matches!(
            monitor.check(dir.path(), &1u32),
            CheckResult::Changed(ChangeReason::CorruptCache)
        ));

        let declared = vec![single(FileKind::Exists, DirKind::NotExists, "missing")];
        monitor
            .update(dir.path(), None, &declared, &1u32, &"v1".to_string())
            .unwrap();
    }

    #[test]
    fn during_action_write_is_detected_via_begin_update() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a");
        std::fs::write(&file, b"before").unwrap();

        let monitor: Monitor<u32, String> = Monitor::new(dir.path().join("cache.bin"));
        let start = monitor.begin_update().unwrap();

        // Simulate the action writing the file it declared as an input.
        std::fs::write(&file, b"after").unwrap();

        let declared = vec![single(FileKind::ModTime, DirKind::NotExists, "a")];
        monitor
            .update(dir.path(), Some(start), &declared, &1u32, &"v1".to_string())
            .unwrap();

        match monitor.check(dir.path(), &1u32) {
            CheckResult::Changed(ChangeReason::FileChanged(path)) => {
                assert_eq!(path, PathBuf::from("a"))
            }
            other => panic!("expected FileChanged, got {other:?}"),
        }
    }

    #[test]
    fn check_only_value_change_guarantees_no_file_changed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"hello").unwrap();

        let monitor: Monitor<u32, String> =
            Monitor::new(dir.path().join("cache.bin")).with_check_only_value_change(true);
        let declared = vec![single(FileKind::Exists, DirKind::NotExists, "a")];

        monitor
            .update(dir.path(), None, &declared, &1u32, &"v1".to_string())
            .unwrap();

        match monitor.check(dir.path(), &2u32) {
            CheckResult::Changed(ChangeReason::KeyChanged(old)) => assert_eq!(old, 1),
            other => panic!("expected KeyChanged, got {other:?}"),
        }
    }
}
