use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// The entity kinds that each own exactly one cache artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    SelfProfile,
    Households,
    Units,
    MemberList,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 4] = [
        SnapshotKind::SelfProfile,
        SnapshotKind::Households,
        SnapshotKind::Units,
        SnapshotKind::MemberList,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            SnapshotKind::SelfProfile => "self.json",
            SnapshotKind::Households => "households.json",
            SnapshotKind::Units => "units.json",
            SnapshotKind::MemberList => "member_list.json",
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotKind::SelfProfile => write!(f, "self profile"),
            SnapshotKind::Households => write!(f, "household directory"),
            SnapshotKind::Units => write!(f, "unit list"),
            SnapshotKind::MemberList => write!(f, "member list"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    /// A cache artifact exists but is not valid JSON. Corrupt snapshots are
    /// reported, never silently refetched.
    #[error("Cached {kind} at {} is not valid JSON: {source}", .path.display())]
    Corrupt {
        kind: SnapshotKind,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A payload read from (or just written to) the cache.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub kind: SnapshotKind,
    pub payload: Value,
    pub modified: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn age_minutes(&self) -> Option<i64> {
        self.modified.map(|m| (Utc::now() - m).num_minutes())
    }

    pub fn age_display(&self) -> String {
        let Some(minutes) = self.age_minutes() else {
            return "unknown age".to_string();
        };
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

pub struct SnapshotStore {
    cache_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", cache_dir.display())
        })?;
        Ok(Self { cache_dir })
    }

    pub fn path(&self, kind: SnapshotKind) -> PathBuf {
        self.cache_dir.join(kind.file_name())
    }

    /// Read the snapshot for `kind`, or `None` if it has never been cached.
    pub fn load(&self, kind: SnapshotKind) -> Result<Option<Snapshot>> {
        let path = self.path(kind);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", path.display()))?;

        let payload: Value = serde_json::from_str(&contents).map_err(|source| CacheError::Corrupt {
            kind,
            path: path.clone(),
            source,
        })?;

        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(Some(Snapshot {
            kind,
            payload,
            modified,
        }))
    }

    /// Persist `payload` pretty-printed. The document is fully serialized
    /// first and then swapped into place with a rename, so readers never see
    /// a partial file.
    pub fn save(&self, kind: SnapshotKind, payload: &Value) -> Result<()> {
        let path = self.path(kind);
        let tmp_path = self.cache_dir.join(format!(".{}.tmp", kind.file_name()));
        let contents = serde_json::to_string_pretty(payload)?;

        std::fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write cache file: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to move cache file into place: {}", path.display()))?;

        debug!(kind = %kind, path = %path.display(), "Saved snapshot");
        Ok(())
    }

    /// Delete the snapshot for `kind`. Missing files are not an error.
    pub fn clear(&self, kind: SnapshotKind) -> Result<()> {
        let path = self.path(kind);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove cache file: {}", path.display()))?;
            info!(kind = %kind, "Cleared snapshot");
        }
        Ok(())
    }

    /// Return the cached payload for `kind`, invoking `fetch` only when no
    /// snapshot exists yet.
    pub async fn get_or_fetch<F, Fut>(&self, kind: SnapshotKind, fetch: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(snapshot) = self.load(kind)? {
            info!(kind = %kind, age = %snapshot.age_display(), "Using cached snapshot");
            return Ok(snapshot.payload);
        }

        info!(kind = %kind, "No cached snapshot, fetching");
        let payload = fetch()
            .await
            .with_context(|| format!("Failed to fetch {}", kind))?;
        self.save(kind, &payload)?;
        Ok(payload)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("cache")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_each_kind_has_its_own_file() {
        let (_dir, store) = store();
        let mut paths: Vec<PathBuf> = SnapshotKind::ALL.iter().map(|k| store.path(*k)).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), SnapshotKind::ALL.len());
    }

    #[test]
    fn test_load_missing_is_none() {
        let (_dir, store) = store();
        assert!(store.load(SnapshotKind::Units).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetches_and_persists_on_miss() {
        let (_dir, store) = store();
        let payload = store
            .get_or_fetch(SnapshotKind::Households, || async { Ok(json!([{"uuid": "h"}])) })
            .await
            .unwrap();

        assert_eq!(payload, json!([{"uuid": "h"}]));
        let on_disk = std::fs::read_to_string(store.path(SnapshotKind::Households)).unwrap();
        assert!(on_disk.contains('\n'), "snapshot should be pretty-printed");
        assert_eq!(serde_json::from_str::<Value>(&on_disk).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_snapshot_keeps_upstream_key_order() {
        let (_dir, store) = store();
        let upstream = r#"{"zeta": 1, "alpha": {"y": true, "b": false}, "middle": 3}"#;
        store
            .get_or_fetch(SnapshotKind::SelfProfile, || async {
                Ok(serde_json::from_str::<Value>(upstream)?)
            })
            .await
            .unwrap();

        let on_disk = std::fs::read_to_string(store.path(SnapshotKind::SelfProfile)).unwrap();
        let keys: Vec<usize> = ["\"zeta\"", "\"alpha\"", "\"y\"", "\"b\"", "\"middle\""]
            .iter()
            .map(|k| on_disk.find(k).unwrap())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]), "key order changed: {}", on_disk);

        let reloaded = store.load(SnapshotKind::SelfProfile).unwrap().unwrap();
        let order: Vec<&String> = reloaded.payload.as_object().unwrap().keys().collect();
        assert_eq!(order, vec!["zeta", "alpha", "middle"]);
    }

    #[tokio::test]
    async fn test_cached_snapshot_short_circuits_fetch() {
        let (_dir, store) = store();
        store.save(SnapshotKind::Units, &json!({"name": "cached"})).unwrap();

        let calls = Cell::new(0);
        let payload = store
            .get_or_fetch(SnapshotKind::Units, || {
                calls.set(calls.get() + 1);
                async { Ok(json!({"name": "live"})) }
            })
            .await
            .unwrap();

        assert_eq!(payload, json!({"name": "cached"}));
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_fatal() {
        let (_dir, store) = store();
        std::fs::write(store.path(SnapshotKind::SelfProfile), "{not json").unwrap();

        let calls = Cell::new(0);
        let err = store
            .get_or_fetch(SnapshotKind::SelfProfile, || {
                calls.set(calls.get() + 1);
                async { Ok(json!({})) }
            })
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<CacheError>().is_some());
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_writes_nothing() {
        let (_dir, store) = store();
        let result = store
            .get_or_fetch(SnapshotKind::MemberList, || async {
                Err(anyhow::anyhow!("network down"))
            })
            .await;

        assert!(result.is_err());
        assert!(!store.path(SnapshotKind::MemberList).exists());
    }

    #[test]
    fn test_clear_removes_only_that_kind() {
        let (_dir, store) = store();
        store.save(SnapshotKind::Units, &json!([])).unwrap();
        store.save(SnapshotKind::Households, &json!([])).unwrap();

        store.clear(SnapshotKind::Units).unwrap();
        store.clear(SnapshotKind::Units).unwrap();

        assert!(!store.path(SnapshotKind::Units).exists());
        assert!(store.path(SnapshotKind::Households).exists());
    }

    #[test]
    fn test_fresh_snapshot_age_display() {
        let (_dir, store) = store();
        store.save(SnapshotKind::Units, &json!([])).unwrap();
        let snapshot = store.load(SnapshotKind::Units).unwrap().unwrap();
        assert_eq!(snapshot.age_display(), "just now");
    }
}
