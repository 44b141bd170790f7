//! Punishment stores
//!
//! Two independent collections back the lifecycle: the append-only registry
//! of every punishment ever issued, and the working set of active timed
//! punishments. Both are dumb repositories; all business rules live in the
//! coordinator.
//!
//! [`DocumentCollection`] keeps documents in a concurrent map and, when given
//! a path, snapshots the whole collection to a YAML file after every write so
//! the working set survives restarts.

use crate::punishment::{
    ActiveEntry, PunishmentError, PunishmentKind, PunishmentResult, RegistryEntry, RegistryId,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// File name of the registry collection
pub const REGISTRY_FILE: &str = "punishment_registry.yaml";
/// File name of the active collection
pub const ACTIVE_FILE: &str = "active_punishments.yaml";

/// Filter over registry entries; `None` fields match everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryFilter {
    pub kind: Option<PunishmentKind>,
    pub target_id: Option<u64>,
}

impl RegistryFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn kind(mut self, kind: PunishmentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub const fn target(mut self, target_id: u64) -> Self {
        self.target_id = Some(target_id);
        self
    }

    #[must_use]
    pub fn matches(&self, entry: &RegistryEntry) -> bool {
        self.kind.is_none_or(|kind| entry.record.kind() == kind)
            && self
                .target_id
                .is_none_or(|target_id| entry.record.target_id() == target_id)
    }
}

/// Filter over active entries; `None` fields match everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveFilter {
    pub kind: Option<PunishmentKind>,
    pub target_id: Option<u64>,
    /// Only entries with `expires_at <= expired_at`
    pub expired_at: Option<DateTime<Utc>>,
}

impl ActiveFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn kind(mut self, kind: PunishmentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub const fn target(mut self, target_id: u64) -> Self {
        self.target_id = Some(target_id);
        self
    }

    #[must_use]
    pub const fn expired_at(mut self, now: DateTime<Utc>) -> Self {
        self.expired_at = Some(now);
        self
    }

    #[must_use]
    pub fn matches(&self, entry: &ActiveEntry) -> bool {
        self.kind.is_none_or(|kind| entry.kind == kind)
            && self.target_id.is_none_or(|target_id| entry.target_id == target_id)
            && self.expired_at.is_none_or(|now| entry.is_expired(now))
    }
}

/// Append-only log of every issued punishment
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RegistryStore: Send + Sync {
    /// Insert a new entry; an existing id is an error
    async fn insert(&self, entry: RegistryEntry) -> PunishmentResult<()>;

    async fn get(&self, id: RegistryId) -> PunishmentResult<Option<RegistryEntry>>;

    async fn find(&self, filter: &RegistryFilter) -> PunishmentResult<Vec<RegistryEntry>>;

    async fn count(&self, filter: &RegistryFilter) -> PunishmentResult<u64>;
}

/// Working set of timed punishments currently in effect
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ActiveStore: Send + Sync {
    async fn insert(&self, entry: ActiveEntry) -> PunishmentResult<()>;

    async fn find(&self, filter: &ActiveFilter) -> PunishmentResult<Vec<ActiveEntry>>;

    async fn count(&self, filter: &ActiveFilter) -> PunishmentResult<u64>;

    /// Conditional delete: `true` for exactly one caller per entry
    async fn remove(&self, registry_id: RegistryId) -> PunishmentResult<bool>;
}

pub type DynRegistryStore = Arc<dyn RegistryStore>;
pub type DynActiveStore = Arc<dyn ActiveStore>;

/// Document stored in a [`DocumentCollection`]
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn key(&self) -> RegistryId;
}

impl Document for RegistryEntry {
    fn key(&self) -> RegistryId {
        self.id
    }
}

impl Document for ActiveEntry {
    fn key(&self) -> RegistryId {
        self.registry_id
    }
}

/// Concurrent document collection with optional YAML persistence
pub struct DocumentCollection<T> {
    name: &'static str,
    documents: DashMap<RegistryId, T>,
    path: Option<PathBuf>,
    /// Serialises snapshot writes so the newest snapshot lands last
    write_lock: Mutex<()>,
}

impl<T: Document> DocumentCollection<T> {
    /// Collection that lives only in memory
    #[must_use]
    pub fn in_memory(name: &'static str) -> Self {
        Self {
            name,
            documents: DashMap::new(),
            path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a collection persisted at `path`, loading existing documents
    ///
    /// # Errors
    /// Returns a store error when the file exists but cannot be read or parsed.
    pub async fn open(name: &'static str, path: impl Into<PathBuf>) -> PunishmentResult<Self> {
        let path = path.into();
        let documents = DashMap::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => {}
            Ok(content) => {
                for document in serde_yaml::from_str::<Vec<T>>(&content)? {
                    documents.insert(document.key(), document);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No {name} file at {}, starting empty", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        info!("Loaded {} document(s) into {name}", documents.len());

        Ok(Self {
            name,
            documents,
            path: Some(path),
            write_lock: Mutex::new(()),
        })
    }

    /// Open a collection stored as `file` under `dir`
    ///
    /// # Errors
    /// See [`DocumentCollection::open`].
    pub async fn open_in(name: &'static str, dir: &Path, file: &str) -> PunishmentResult<Self> {
        Self::open(name, dir.join(file)).await
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn get(&self, key: RegistryId) -> Option<T> {
        self.documents.get(&key).map(|entry| entry.value().clone())
    }

    fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.documents
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn count_matching(&self, predicate: impl Fn(&T) -> bool) -> u64 {
        self.documents.iter().filter(|entry| predicate(entry.value())).count() as u64
    }

    /// Insert a document whose key must not exist yet
    async fn insert_new(&self, document: T) -> PunishmentResult<()> {
        let key = document.key();
        match self.documents.entry(key) {
            Entry::Occupied(_) => {
                return Err(PunishmentError::Store(format!(
                    "Duplicate id {key} in {}",
                    self.name
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(document);
            }
        }

        if let Err(e) = self.persist().await {
            self.documents.remove(&key);
            return Err(e);
        }
        Ok(())
    }

    /// Remove a document; `true` only for the caller that removed it
    async fn remove_once(&self, key: RegistryId) -> PunishmentResult<bool> {
        let Some((_, removed)) = self.documents.remove(&key) else {
            return Ok(false);
        };

        if let Err(e) = self.persist().await {
            self.documents.insert(key, removed);
            return Err(e);
        }
        Ok(true)
    }

    /// Write the current snapshot to disk, replacing the previous file
    ///
    /// The whole collection is rewritten on every change, so a write costs
    /// time proportional to the collection size. That is fine for the active
    /// set; the registry only grows, and a guild with a long history would
    /// want an append-only log file for it instead.
    async fn persist(&self) -> PunishmentResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        let snapshot: Vec<T> = self.documents.iter().map(|e| e.value().clone()).collect();
        let yaml = serde_yaml::to_string(&snapshot)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!("Saved {} document(s) from {}", snapshot.len(), self.name);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RegistryStore for DocumentCollection<RegistryEntry> {
    async fn insert(&self, entry: RegistryEntry) -> PunishmentResult<()> {
        self.insert_new(entry).await
    }

    async fn get(&self, id: RegistryId) -> PunishmentResult<Option<RegistryEntry>> {
        Ok(DocumentCollection::get(self, id))
    }

    async fn find(&self, filter: &RegistryFilter) -> PunishmentResult<Vec<RegistryEntry>> {
        Ok(self.filter(|entry| filter.matches(entry)))
    }

    async fn count(&self, filter: &RegistryFilter) -> PunishmentResult<u64> {
        Ok(self.count_matching(|entry| filter.matches(entry)))
    }
}

#[async_trait::async_trait]
impl ActiveStore for DocumentCollection<ActiveEntry> {
    async fn insert(&self, entry: ActiveEntry) -> PunishmentResult<()> {
        self.insert_new(entry).await
    }

    async fn find(&self, filter: &ActiveFilter) -> PunishmentResult<Vec<ActiveEntry>> {
        Ok(self.filter(|entry| filter.matches(entry)))
    }

    async fn count(&self, filter: &ActiveFilter) -> PunishmentResult<u64> {
        Ok(self.count_matching(|entry| filter.matches(entry)))
    }

    async fn remove(&self, registry_id: RegistryId) -> PunishmentResult<bool> {
        self.remove_once(registry_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::punishment::PunishmentRecord;
    use chrono::Duration;

    fn entry(target_id: u64, kind: PunishmentKind) -> RegistryEntry {
        RegistryEntry::new(
            PunishmentRecord::from_arguments(target_id, 1, kind, None, Utc::now()).unwrap(),
        )
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("gavel-store-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_registry_insert_and_get() {
        let registry = DocumentCollection::<RegistryEntry>::in_memory("registry");
        let mute = entry(12345, PunishmentKind::Mute);
        let id = mute.id;

        registry.insert(mute.clone()).await.unwrap();

        let retrieved = RegistryStore::get(&registry, id).await.unwrap();
        assert_eq!(retrieved, Some(mute));
        assert_eq!(RegistryStore::get(&registry, RegistryId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_registry_rejects_duplicate_ids() {
        let registry = DocumentCollection::<RegistryEntry>::in_memory("registry");
        let warn = entry(1, PunishmentKind::Warn);

        registry.insert(warn.clone()).await.unwrap();
        let result = registry.insert(warn).await;
        assert!(matches!(result, Err(PunishmentError::Store(_))));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_registry_counts_by_filter() {
        let registry = DocumentCollection::<RegistryEntry>::in_memory("registry");
        registry.insert(entry(1, PunishmentKind::Warn)).await.unwrap();
        registry.insert(entry(1, PunishmentKind::Warn)).await.unwrap();
        registry.insert(entry(1, PunishmentKind::Ban)).await.unwrap();
        registry.insert(entry(2, PunishmentKind::Warn)).await.unwrap();

        let count = |filter: RegistryFilter| {
            let registry = &registry;
            async move { registry.count(&filter).await.unwrap() }
        };

        assert_eq!(count(RegistryFilter::all()).await, 4);
        assert_eq!(count(RegistryFilter::all().kind(PunishmentKind::Warn)).await, 3);
        assert_eq!(count(RegistryFilter::all().target(1)).await, 3);
        assert_eq!(count(RegistryFilter::all().target(1).kind(PunishmentKind::Ban)).await, 1);
        assert_eq!(count(RegistryFilter::all().target(3)).await, 0);

        let found = registry.find(&RegistryFilter::all().target(2)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record.target_id(), 2);
    }

    #[tokio::test]
    async fn test_active_expiry_filter() {
        let active = DocumentCollection::<ActiveEntry>::in_memory("active");
        let now = Utc::now();

        let mut expired = entry(1, PunishmentKind::Mute).active_entry().unwrap();
        expired.expires_at = now - Duration::minutes(1);
        let mut due_now = entry(2, PunishmentKind::Ban).active_entry().unwrap();
        due_now.expires_at = now;
        let mut future = entry(3, PunishmentKind::Mute).active_entry().unwrap();
        future.expires_at = now + Duration::minutes(1);

        for e in [&expired, &due_now, &future] {
            active.insert(e.clone()).await.unwrap();
        }

        let due = active.find(&ActiveFilter::all().expired_at(now)).await.unwrap();
        assert_eq!(due.len(), 2);
        assert!(due.iter().all(|e| e.target_id != 3));

        assert_eq!(active.count(&ActiveFilter::all()).await.unwrap(), 3);
        assert_eq!(active.count(&ActiveFilter::all().kind(PunishmentKind::Mute)).await.unwrap(), 2);
        assert_eq!(
            active
                .count(&ActiveFilter::all().kind(PunishmentKind::Mute).target(3))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_active_remove_succeeds_once() {
        let active = DocumentCollection::<ActiveEntry>::in_memory("active");
        let mute = entry(1, PunishmentKind::Mute).active_entry().unwrap();
        let id = mute.registry_id;
        active.insert(mute).await.unwrap();

        assert!(active.remove(id).await.unwrap());
        assert!(!active.remove(id).await.unwrap());
        assert!(active.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_remove_has_one_winner() {
        let active = Arc::new(DocumentCollection::<ActiveEntry>::in_memory("active"));
        let mute = entry(1, PunishmentKind::Mute).active_entry().unwrap();
        let id = mute.registry_id;
        active.insert(mute).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let active = Arc::clone(&active);
                tokio::spawn(async move { active.remove(id).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_collections_survive_restart() {
        let dir = temp_dir();
        let mute = entry(77, PunishmentKind::Mute);
        let active_mute = mute.active_entry().unwrap();
        let kick = entry(78, PunishmentKind::Kick);

        {
            let registry =
                DocumentCollection::<RegistryEntry>::open_in("registry", &dir, REGISTRY_FILE)
                    .await
                    .unwrap();
            let active = DocumentCollection::<ActiveEntry>::open_in("active", &dir, ACTIVE_FILE)
                .await
                .unwrap();
            assert!(registry.is_empty());

            registry.insert(mute.clone()).await.unwrap();
            registry.insert(kick.clone()).await.unwrap();
            active.insert(active_mute.clone()).await.unwrap();
        }

        let registry = DocumentCollection::<RegistryEntry>::open_in("registry", &dir, REGISTRY_FILE)
            .await
            .unwrap();
        let active = DocumentCollection::<ActiveEntry>::open_in("active", &dir, ACTIVE_FILE)
            .await
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(RegistryStore::get(&registry, mute.id).await.unwrap(), Some(mute));
        assert_eq!(RegistryStore::get(&registry, kick.id).await.unwrap(), Some(kick));
        assert_eq!(active.find(&ActiveFilter::all()).await.unwrap(), vec![active_mute.clone()]);

        // Removal is persisted too
        assert!(active.remove(active_mute.registry_id).await.unwrap());
        let reopened = DocumentCollection::<ActiveEntry>::open_in("active", &dir, ACTIVE_FILE)
            .await
            .unwrap();
        assert!(reopened.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_open_rejects_corrupt_file() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(ACTIVE_FILE), "this: [is not a list").unwrap();

        let result = DocumentCollection::<ActiveEntry>::open_in("active", &dir, ACTIVE_FILE).await;
        assert!(matches!(result, Err(PunishmentError::Store(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
