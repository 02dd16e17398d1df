// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of ApkDepot.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Release policy store with snapshot persistence

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::policy::ReleasePolicy;

/// All release policies, keyed by package name.
///
/// Reads hand out copies. The only way to change a record is
/// [`PolicyStore::update_or_create`], which runs under a store-wide write lock,
/// so readers never observe a half-applied mutation.
#[derive(Debug)]
pub struct PolicyStore {
    policies: RwLock<BTreeMap<String, ReleasePolicy>>,
    path: Option<PathBuf>,
    // Serializes flushes so an older snapshot never lands after a newer one
    flush_lock: Mutex<()>,
}

impl PolicyStore {
    /// A store with no backing file; [`PolicyStore::flush`] is a no-op.
    pub fn in_memory() -> Self {
        Self {
            policies: RwLock::new(BTreeMap::new()),
            path: None,
            flush_lock: Mutex::new(()),
        }
    }

    /// Open a file-backed store.
    ///
    /// Never fails: a missing snapshot starts an empty store, and an
    /// unreadable or corrupt one is logged and also starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = Self {
            policies: RwLock::new(BTreeMap::new()),
            path: Some(path.clone()),
            flush_lock: Mutex::new(()),
        };

        match std::fs::read(&path) {
            Ok(bytes) => match store.load_snapshot(&bytes) {
                Ok(()) => {
                    info!(path = %path.display(), packages = store.len(), "Policy snapshot loaded");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Policy snapshot is corrupt, starting empty");
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Policy snapshot not found, starting empty");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read policy snapshot, starting empty");
            }
        }

        store
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, package_name: &str) -> Option<ReleasePolicy> {
        self.policies.read().get(package_name).cloned()
    }

    /// Apply `mutate` to the policy of `package_name`, inserting a fresh
    /// gated-off policy first if none exists.
    ///
    /// The mutator works on a copy that is written back only once it returns,
    /// and the package name always stays equal to the key.
    pub fn update_or_create<R>(
        &self,
        package_name: &str,
        mutate: impl FnOnce(&mut ReleasePolicy) -> R,
    ) -> R {
        let mut policies = self.policies.write();
        let mut policy = policies
            .get(package_name)
            .cloned()
            .unwrap_or_else(|| ReleasePolicy::new(package_name));

        let result = mutate(&mut policy);
        package_name.clone_into(&mut policy.package_name);
        policies.insert(package_name.to_owned(), policy);
        result
    }

    /// Copy of every policy, ordered by package name.
    pub fn snapshot(&self) -> Vec<ReleasePolicy> {
        self.policies.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }

    /// Replace the whole map with the snapshot in `bytes`.
    pub fn load_snapshot(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let mut loaded: BTreeMap<String, ReleasePolicy> =
            serde_json::from_slice(bytes).map_err(StoreError::Deserialize)?;
        for (package_name, policy) in &mut loaded {
            policy.package_name.clone_from(package_name);
        }
        *self.policies.write() = loaded;
        Ok(())
    }

    /// Serialize the whole map. Keys come out sorted so snapshots diff cleanly.
    pub fn persist_snapshot(&self) -> Result<Vec<u8>, StoreError> {
        let policies = self.policies.write();
        serde_json::to_vec_pretty(&*policies).map_err(StoreError::Serialize)
    }

    /// Write the snapshot to the backing file.
    ///
    /// The map is locked exclusively only while it is serialized; the file
    /// write happens after the lock is released, so readers never wait on the
    /// disk. Flushes run one at a time, each serializing after the previous
    /// one finished, so the file on disk always ends up at the newest state.
    pub fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let _flushing = self.flush_lock.lock();
        let (content, packages) = {
            let policies = self.policies.write();
            let content = serde_json::to_vec_pretty(&*policies).map_err(StoreError::Serialize)?;
            (content, policies.len())
        };
        write_atomic(path, &content)?;
        debug!(path = %path.display(), packages, "Policy snapshot flushed");
        Ok(())
    }
}

/// `metadata.json` -> `metadata.json.tmp`, next to the target.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    let mut file = std::fs::File::create(&temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn configured(store: &PolicyStore, package: &str, code: u32, rate: i32) {
        store.update_or_create(package, |p| {
            p.latest_version_code = code;
            p.latest_version_name = format!("1.0.{code}");
            p.latest_file_name = format!("{package}_{code}.apk");
            p.min_force_version_code = code.saturating_sub(1);
            p.rollout_rate = rate;
        });
    }

    #[test]
    fn test_get_absent() {
        let store = PolicyStore::in_memory();
        assert!(store.get("com.example.app").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_or_create_starts_from_default() {
        let store = PolicyStore::in_memory();
        let seen = store.update_or_create("com.example.app", |p| p.clone());

        assert_eq!(seen, ReleasePolicy::new("com.example.app"));
        assert_eq!(store.get("com.example.app"), Some(seen));
    }

    #[test]
    fn test_update_or_create_returns_mutator_result() {
        let store = PolicyStore::in_memory();
        configured(&store, "com.example.app", 7, 100);

        let previous = store.update_or_create("com.example.app", |p| {
            let old = p.rollout_rate;
            p.rollout_rate = 200;
            old
        });

        assert_eq!(previous, 100);
        assert_eq!(store.get("com.example.app").unwrap().rollout_rate, 200);
        assert_eq!(store.get("com.example.app").unwrap().latest_version_code, 7);
    }

    #[test]
    fn test_mutator_cannot_rename_record() {
        let store = PolicyStore::in_memory();
        store.update_or_create("com.example.app", |p| {
            p.package_name = "com.other".to_owned();
        });

        assert!(store.get("com.other").is_none());
        assert_eq!(
            store.get("com.example.app").unwrap().package_name,
            "com.example.app"
        );
    }

    #[test]
    fn test_get_returns_copy() {
        let store = PolicyStore::in_memory();
        configured(&store, "com.example.app", 3, 10);

        let mut copy = store.get("com.example.app").unwrap();
        copy.rollout_rate = 9999;

        assert_eq!(store.get("com.example.app").unwrap().rollout_rate, 10);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let store = PolicyStore::in_memory();
        configured(&store, "com.example.a", 10, 10_000);
        configured(&store, "com.example.b", 3, 250);
        configured(&store, "org.sample", 1, 0);

        let bytes = store.persist_snapshot().unwrap();
        let reloaded = PolicyStore::in_memory();
        reloaded.load_snapshot(&bytes).unwrap();

        assert_eq!(reloaded.len(), store.len());
        for policy in store.snapshot() {
            assert_eq!(reloaded.get(&policy.package_name), Some(policy));
        }
    }

    #[test]
    fn test_snapshot_keys_are_sorted() {
        let store = PolicyStore::in_memory();
        configured(&store, "org.zeta", 1, 0);
        configured(&store, "com.alpha", 1, 0);

        let text = String::from_utf8(store.persist_snapshot().unwrap()).unwrap();
        let alpha = text.find("\"com.alpha\"").unwrap();
        let zeta = text.find("\"org.zeta\"").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_load_snapshot_rejects_garbage() {
        let store = PolicyStore::in_memory();
        configured(&store, "com.example.app", 1, 0);

        let result = store.load_snapshot(b"{not json");
        assert!(matches!(result, Err(StoreError::Deserialize(_))));
        // Failed load leaves the current map alone
        assert!(store.get("com.example.app").is_some());
    }

    #[test]
    fn test_load_snapshot_fills_package_name_from_key() {
        let store = PolicyStore::in_memory();
        store
            .load_snapshot(br#"{"com.example.app":{"latestVersionCode":4,"rolloutRate":10000}}"#)
            .unwrap();

        let policy = store.get("com.example.app").unwrap();
        assert_eq!(policy.package_name, "com.example.app");
        assert_eq!(policy.latest_version_code, 4);
        assert_eq!(policy.rollout_rate, 10_000);
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = PolicyStore::open(dir.path().join("metadata.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_open_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        std::fs::write(&path, "]]]").unwrap();

        let store = PolicyStore::open(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_flush_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("metadata.json");

        let store = PolicyStore::open(&path);
        configured(&store, "com.example.app", 12, 5000);
        store.flush().unwrap();

        assert!(path.exists());
        assert!(!temp_path_for(&path).exists());

        let reopened = PolicyStore::open(&path);
        assert_eq!(
            reopened.get("com.example.app"),
            store.get("com.example.app")
        );
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(
            temp_path_for(Path::new("/data/metadata.json")),
            PathBuf::from("/data/metadata.json.tmp")
        );
        assert_eq!(
            temp_path_for(Path::new("/data/state.tmp")),
            PathBuf::from("/data/state.tmp.tmp")
        );
    }

    #[test]
    fn test_flush_snapshot_named_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.tmp");

        let store = PolicyStore::open(&path);
        configured(&store, "com.example.app", 4, 100);
        store.flush().unwrap();

        assert!(!dir.path().join("state.tmp.tmp").exists());
        let reopened = PolicyStore::open(&path);
        assert_eq!(reopened.get("com.example.app").unwrap().latest_version_code, 4);
    }

    #[test]
    fn test_concurrent_flushes_leave_newest_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        let store = Arc::new(PolicyStore::open(&path));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..50 {
                        store.update_or_create("com.example.app", |p| {
                            p.min_force_version_code += 1;
                        });
                        store.flush().unwrap();
                    }
                });
            }
            // Reads keep working while flushes are in flight
            for _ in 0..50 {
                let _ = store.get("com.example.app");
            }
        });

        let reopened = PolicyStore::open(&path);
        assert_eq!(
            reopened.get("com.example.app").unwrap().min_force_version_code,
            200
        );
    }

    #[test]
    fn test_flush_without_path_is_noop() {
        let store = PolicyStore::in_memory();
        configured(&store, "com.example.app", 1, 1);
        assert!(store.flush().is_ok());
        assert!(store.path().is_none());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let store = Arc::new(PolicyStore::in_memory());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..250 {
                        store.update_or_create("com.example.app", |p| {
                            p.min_force_version_code += 1;
                        });
                        let _ = store.get("com.example.app");
                    }
                });
            }
        });

        assert_eq!(
            store.get("com.example.app").unwrap().min_force_version_code,
            2000
        );
    }
}
