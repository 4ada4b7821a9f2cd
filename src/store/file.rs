use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument, warn};

use super::{DayMutator, DayStore, StoreHealth, StoredDay};
use crate::{config::FileReadPolicy, error::AppError};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DayRecord {
    data: Vec<Value>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

/// Files written before timestamps were tracked hold bare arrays per day.
/// `Legacy` must stay first: serde also accepts a sequence for a struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FileEntry {
    Legacy(Vec<Value>),
    Record(DayRecord),
}

impl From<StoredDay> for DayRecord {
    fn from(s: StoredDay) -> Self {
        Self {
            data: s.data,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

type DayMap = BTreeMap<String, DayRecord>;

/// Result of reading the store file, keeping "never written" apart from
/// "present but broken".
#[derive(Debug)]
pub enum FileSnapshot {
    Missing,
    Loaded(BTreeMap<String, StoredDay>),
    Unreadable(String),
}

/// Whole-mapping JSON file store, used when no database is configured.
pub struct FileDayStore {
    path: PathBuf,
    policy: FileReadPolicy,
    // Serializes every write and read-modify-write in this process.
    write_lock: Mutex<()>,
}

impl FileDayStore {
    pub fn new(path: impl Into<PathBuf>, policy: FileReadPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the file without applying the read policy.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn snapshot(&self) -> FileSnapshot {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return FileSnapshot::Missing,
            Err(e) => return FileSnapshot::Unreadable(e.to_string()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return FileSnapshot::Missing;
        }
        match serde_json::from_slice::<BTreeMap<String, FileEntry>>(&raw) {
            Ok(entries) => FileSnapshot::Loaded(upgrade(entries)),
            Err(e) => FileSnapshot::Unreadable(e.to_string()),
        }
    }

    /// Loads the mapping under the configured policy. The flag is set when
    /// the lenient policy replaced an unreadable file with an empty mapping.
    async fn load(&self) -> Result<(DayMap, bool), AppError> {
        match self.snapshot().await {
            FileSnapshot::Missing => Ok((DayMap::new(), false)),
            FileSnapshot::Loaded(days) => Ok((
                days.into_iter().map(|(day, s)| (day, DayRecord::from(s))).collect(),
                false,
            )),
            FileSnapshot::Unreadable(reason) => self.unreadable(reason),
        }
    }

    fn unreadable(&self, reason: String) -> Result<(DayMap, bool), AppError> {
        match self.policy {
            FileReadPolicy::Lenient => {
                warn!(path = %self.path.display(), %reason, "store file unreadable; using empty mapping");
                Ok((DayMap::new(), true))
            }
            FileReadPolicy::Strict => Err(AppError::StoreUnreadable {
                path: self.path.display().to_string(),
                reason,
            }),
        }
    }

    async fn persist(&self, map: &DayMap, was_unreadable: bool) -> Result<(), AppError> {
        if was_unreadable {
            let aside = sibling(&self.path, "corrupt");
            if let Err(e) = tokio::fs::copy(&self.path, &aside).await {
                error!(error = %e, "could not preserve unreadable store file");
            } else {
                warn!(path = %aside.display(), "unreadable store file preserved before overwrite");
            }
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let body = serde_json::to_vec(map)?;
        let tmp = sibling(&self.path, "tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn write_into(map: &mut DayMap, day: &str, meals: Vec<Value>) -> StoredDay {
        let now = OffsetDateTime::now_utc();
        let record = match map.remove(day) {
            Some(prev) => DayRecord {
                data: meals,
                created_at: prev.created_at,
                updated_at: next_update(prev.updated_at, now),
            },
            None => DayRecord {
                data: meals,
                created_at: now,
                updated_at: now,
            },
        };
        let stored = StoredDay {
            day: day.to_string(),
            data: record.data.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        };
        map.insert(day.to_string(), record);
        stored
    }
}

#[async_trait]
impl DayStore for FileDayStore {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn health(&self) -> StoreHealth {
        match self.snapshot().await {
            FileSnapshot::Unreadable(reason) => {
                warn!(path = %self.path.display(), %reason, "health check found unreadable store file");
                StoreHealth::Unreadable
            }
            FileSnapshot::Missing | FileSnapshot::Loaded(_) => StoreHealth::Ready,
        }
    }

    #[instrument(skip(self))]
    async fn get_all_days(&self) -> Result<BTreeMap<String, Vec<Value>>, AppError> {
        let (map, _) = self.load().await?;
        Ok(map.into_iter().map(|(day, rec)| (day, rec.data)).collect())
    }

    #[instrument(skip(self))]
    async fn get_day(&self, day: &str) -> Result<Option<Vec<Value>>, AppError> {
        let (mut map, _) = self.load().await?;
        Ok(map.remove(day).map(|rec| rec.data))
    }

    #[instrument(skip(self, meals), fields(len = meals.len()))]
    async fn upsert_day(&self, day: &str, meals: Vec<Value>) -> Result<StoredDay, AppError> {
        let _guard = self.write_lock.lock().await;
        let (mut map, was_unreadable) = self.load().await?;
        let stored = Self::write_into(&mut map, day, meals);
        self.persist(&map, was_unreadable).await?;
        debug!(%day, "day written to store file");
        Ok(stored)
    }

    #[instrument(skip(self, mutate))]
    async fn modify_day(&self, day: &str, mutate: DayMutator) -> Result<StoredDay, AppError> {
        let _guard = self.write_lock.lock().await;
        let (mut map, was_unreadable) = self.load().await?;
        let current = map.get(day).map(|rec| rec.data.clone()).unwrap_or_default();
        let next = mutate(current)?;
        let stored = Self::write_into(&mut map, day, next);
        self.persist(&map, was_unreadable).await?;
        debug!(%day, "day modified in store file");
        Ok(stored)
    }
}

fn upgrade(entries: BTreeMap<String, FileEntry>) -> BTreeMap<String, StoredDay> {
    let now = OffsetDateTime::now_utc();
    entries
        .into_iter()
        .map(|(day, entry)| {
            let rec = match entry {
                FileEntry::Record(rec) => rec,
                FileEntry::Legacy(data) => DayRecord {
                    data,
                    created_at: now,
                    updated_at: now,
                },
            };
            let stored = StoredDay {
                day: day.clone(),
                data: rec.data,
                created_at: rec.created_at,
                updated_at: rec.updated_at,
            };
            (day, stored)
        })
        .collect()
}

/// `updated_at` must move forward even when the clock has not.
fn next_update(prev: OffsetDateTime, now: OffsetDateTime) -> OffsetDateTime {
    if now > prev {
        now
    } else {
        prev + time::Duration::microseconds(1)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup(policy: FileReadPolicy) -> (FileDayStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileDayStore::new(dir.path().join("meals.json"), policy);
        (store, dir)
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let (store, _dir) = setup(FileReadPolicy::Strict);
        assert!(store.get_all_days().await.unwrap().is_empty());
        assert_eq!(store.get_day("Segunda").await.unwrap(), None);
        assert!(matches!(store.snapshot().await, FileSnapshot::Missing));
    }

    #[tokio::test]
    async fn upsert_then_get_returns_same_array() {
        let (store, _dir) = setup(FileReadPolicy::Lenient);
        let meals = vec![json!({"food_name": "Banana", "quantity": "1"})];
        let stored = store.upsert_day("Segunda", meals.clone()).await.unwrap();
        assert_eq!(stored.day, "Segunda");
        assert_eq!(stored.data, meals);
        assert_eq!(store.get_day("Segunda").await.unwrap(), Some(meals.clone()));

        let all = store.get_all_days().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["Segunda"], meals);
    }

    #[tokio::test]
    async fn repeated_upsert_keeps_created_at_and_advances_updated_at() {
        let (store, _dir) = setup(FileReadPolicy::Lenient);
        let meals = vec![json!({"name": "Jantar", "foods": []})];
        let first = store.upsert_day("Quarta", meals.clone()).await.unwrap();
        let second = store.upsert_day("Quarta", meals.clone()).await.unwrap();
        assert_eq!(first.data, second.data);
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn reads_legacy_bare_array_files() {
        let (store, _dir) = setup(FileReadPolicy::Strict);
        tokio::fs::write(store.path(), r#"{"Segunda":[{"name":"Almoço"}],"Terça":[]}"#)
            .await
            .unwrap();
        let all = store.get_all_days().await.unwrap();
        assert_eq!(all["Segunda"], vec![json!({"name": "Almoço"})]);
        assert!(all["Terça"].is_empty());

        // Rewriting upgrades the file to timestamped records.
        store.upsert_day("Terça", vec![json!({"name": "Lanche"})]).await.unwrap();
        let raw: Value =
            serde_json::from_slice(&tokio::fs::read(store.path()).await.unwrap()).unwrap();
        assert!(raw["Segunda"]["created_at"].is_string());
        assert_eq!(raw["Terça"]["data"], json!([{"name": "Lanche"}]));
    }

    #[tokio::test]
    async fn lenient_policy_treats_garbage_as_empty_and_keeps_a_copy() {
        let (store, _dir) = setup(FileReadPolicy::Lenient);
        tokio::fs::write(store.path(), "{not json").await.unwrap();

        assert!(matches!(store.snapshot().await, FileSnapshot::Unreadable(_)));
        assert!(store.get_all_days().await.unwrap().is_empty());

        store.upsert_day("Sexta", vec![json!({})]).await.unwrap();
        let aside = sibling(store.path(), "corrupt");
        assert_eq!(tokio::fs::read_to_string(aside).await.unwrap(), "{not json");
        assert_eq!(store.get_day("Sexta").await.unwrap(), Some(vec![json!({})]));
    }

    #[tokio::test]
    async fn snapshot_carries_timestamps_and_health_tracks_file_state() {
        let (store, _dir) = setup(FileReadPolicy::Lenient);
        assert_eq!(store.health().await, StoreHealth::Ready);

        let written = store.upsert_day("Quinta", vec![json!({"n": 1})]).await.unwrap();
        match store.snapshot().await {
            FileSnapshot::Loaded(days) => assert_eq!(days["Quinta"], written),
            other => panic!("expected Loaded, got {other:?}"),
        }

        tokio::fs::write(store.path(), "{not json").await.unwrap();
        assert_eq!(store.health().await, StoreHealth::Unreadable);
    }

    #[tokio::test]
    async fn strict_policy_surfaces_unreadable_file() {
        let (store, _dir) = setup(FileReadPolicy::Strict);
        tokio::fs::write(store.path(), "[1, 2, 3]").await.unwrap();

        let err = store.get_all_days().await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnreadable { .. }));
        let err = store.upsert_day("Sexta", vec![]).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnreadable { .. }));
        assert_eq!(tokio::fs::read_to_string(store.path()).await.unwrap(), "[1, 2, 3]");
    }

    #[tokio::test]
    async fn modify_day_failure_leaves_file_untouched() {
        let (store, _dir) = setup(FileReadPolicy::Lenient);
        let meals = vec![json!({"name": "a"}), json!({"name": "b"})];
        store.upsert_day("Sábado", meals.clone()).await.unwrap();

        let err = store
            .modify_day(
                "Sábado",
                Box::new(|_: Vec<Value>| Err::<Vec<Value>, _>(AppError::InvalidPayload("nope".into()))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)));
        assert_eq!(store.get_day("Sábado").await.unwrap(), Some(meals));
    }

    #[tokio::test]
    async fn concurrent_modifications_do_not_lose_updates() {
        let (store, _dir) = setup(FileReadPolicy::Lenient);
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .modify_day(
                        "Domingo",
                        Box::new(move |mut meals: Vec<Value>| {
                            meals.push(json!(i));
                            Ok(meals)
                        }),
                    )
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.get_day("Domingo").await.unwrap().unwrap().len(), 16);
    }

    #[test]
    fn sibling_appends_suffix() {
        assert_eq!(
            sibling(Path::new("/tmp/meals.json"), "tmp"),
            PathBuf::from("/tmp/meals.json.tmp")
        );
    }
}
