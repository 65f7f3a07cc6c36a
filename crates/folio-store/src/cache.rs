//! Versioned record cache with SQLite mirroring.
//!
//! Keyed by `table:id:userId`. Writes follow a last-writer-wins-by-version
//! policy with a role-change override; concurrent edits at the same version
//! are not merged.
//!
//! # Concurrency Model
//!
//! - DashMap for per-key atomic replace
//! - Persistence happens while the key's shard is held, so rows land in the
//!   same order as cache writes
//! - Change events are broadcast after the shard is released

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use folio_types::{CacheKey, Pointer, RecordWithRole, Role, UserId};

use crate::db::RecordDb;
use crate::error::Result;

/// Thread-safe database handle.
type DbHandle = Arc<Mutex<RecordDb>>;

/// Events broadcast when cache entries change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheEvent {
    /// A write to `key` was accepted (tombstones included).
    Changed { key: CacheKey },
}

/// A cached record together with the pointer it was stored under.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub pointer: Pointer,
    pub record: RecordWithRole,
}

/// Process-wide record cache.
pub struct RecordCacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
    db: Option<DbHandle>,
    workspace: String,
    event_tx: broadcast::Sender<CacheEvent>,
}

impl RecordCacheStore {
    /// Create an in-memory cache.
    pub fn new(workspace: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            entries: DashMap::new(),
            db: None,
            workspace: workspace.into(),
            event_tx,
        }
    }

    /// Create a cache mirrored to SQLite.
    pub fn with_db(db: RecordDb, workspace: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            entries: DashMap::new(),
            db: Some(Arc::new(Mutex::new(db))),
            workspace: workspace.into(),
            event_tx,
        }
    }

    /// Get the event receiver for subscribing to changes.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.event_tx.subscribe()
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_record(&self, user_id: &UserId, pointer: &Pointer) -> Option<RecordWithRole> {
        self.entries
            .get(&CacheKey::new(pointer, user_id))
            .map(|e| e.record.clone())
    }

    /// The entry including its (possibly enriched) pointer.
    pub fn get_entry(&self, user_id: &UserId, pointer: &Pointer) -> Option<CacheEntry> {
        self.entries
            .get(&CacheKey::new(pointer, user_id))
            .map(|e| e.clone())
    }

    /// Cached version, 0 when absent.
    pub fn get_version(&self, user_id: &UserId, pointer: &Pointer) -> u64 {
        self.entries
            .get(&CacheKey::new(pointer, user_id))
            .map(|e| e.record.version())
            .unwrap_or(0)
    }

    /// Cached role, `Role::None` when absent.
    pub fn get_role(&self, user_id: &UserId, pointer: &Pointer) -> Role {
        self.entries
            .get(&CacheKey::new(pointer, user_id))
            .map(|e| e.record.role)
            .unwrap_or_default()
    }

    /// Visit every entry of `user_id` whose role is not `None`.
    pub fn for_each_record(&self, user_id: &UserId, mut f: impl FnMut(&Pointer, &RecordWithRole)) {
        for entry in self.entries.iter() {
            if entry.record.role == Role::None || !key_belongs_to(entry.key(), user_id) {
                continue;
            }
            f(&entry.pointer, &entry.record);
        }
    }

    /// Sorted cache keys held for `user_id`.
    pub fn keys_for_user(&self, user_id: &UserId) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|e| key_belongs_to(e.key(), user_id))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Offer a record for `(user_id, pointer)`. `None` is a tombstone.
    ///
    /// The write is accepted iff `force` is set, nothing is cached yet, the
    /// offer is a tombstone, its version is strictly higher, or its role
    /// differs. An accepted write keeps a previously known `spaceId` when the
    /// offer lacks one. Returns whether the write was accepted.
    pub fn set_record(
        &self,
        user_id: &UserId,
        pointer: &Pointer,
        value: Option<RecordWithRole>,
        force: bool,
    ) -> bool {
        let key = CacheKey::new(pointer, user_id);

        let accepted = match (self.entries.entry(key.clone()), value) {
            (Entry::Occupied(occupied), None) => {
                occupied.remove();
                tracing::debug!(%key, "tombstone");
                self.unpersist(&key);
                true
            }
            (Entry::Vacant(_), None) => {
                tracing::debug!(%key, "tombstone for uncached record");
                self.unpersist(&key);
                true
            }
            (Entry::Occupied(mut occupied), Some(mut record)) => {
                let cached = occupied.get();
                let accept = force
                    || record.version() > cached.record.version()
                    || record.role != cached.record.role;
                if !accept {
                    tracing::trace!(
                        %key,
                        cached = cached.record.version(),
                        offered = record.version(),
                        "stale write rejected"
                    );
                    return false;
                }
                let space_id = pointer
                    .space_id
                    .clone()
                    .or_else(|| cached.pointer.space_id.clone())
                    .or_else(|| cached.record.value.space_id.clone());
                let entry = enrich(pointer, &mut record, space_id);
                let version = entry.record.version();
                self.persist(&key, &entry.record);
                occupied.insert(entry);
                tracing::trace!(%key, version, "write accepted");
                true
            }
            (Entry::Vacant(vacant), Some(mut record)) => {
                let space_id = pointer.space_id.clone();
                let entry = enrich(pointer, &mut record, space_id);
                self.persist(&key, &entry.record);
                tracing::trace!(%key, version = entry.record.version(), "write accepted");
                vacant.insert(entry);
                true
            }
        };

        if accepted {
            self.fire(key);
        }
        accepted
    }

    /// Tombstone `(user_id, pointer)`.
    pub fn delete_record(&self, user_id: &UserId, pointer: &Pointer) {
        self.set_record(user_id, pointer, None, true);
    }

    /// Tombstone every entry of `user_id`. Returns the number removed.
    pub fn delete_user_records(&self, user_id: &UserId) -> usize {
        let keys = self.keys_for_user(user_id);
        for key in &keys {
            self.entries.remove(key);
            self.unpersist(key);
            self.fire(key.clone());
        }
        tracing::debug!(user = %user_id, removed = keys.len(), "user records deleted");
        keys.len()
    }

    /// Announce a change to `key`.
    pub fn fire(&self, key: CacheKey) {
        let _ = self.event_tx.send(CacheEvent::Changed { key });
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Load this workspace's persisted entries into memory.
    ///
    /// Loaded entries are neither re-persisted nor announced. Rows that fail
    /// to parse are skipped with a warning.
    pub fn hydrate(&self) -> Result<usize> {
        let Some(db) = &self.db else {
            return Ok(0);
        };
        let rows = db.lock().load_workspace(&self.workspace)?;

        let mut loaded = 0;
        for (key, json) in rows {
            let Some((table, id, owner)) = CacheKey::parse(&key) else {
                tracing::warn!(%key, "skipping malformed cache key");
                continue;
            };
            let record: RecordWithRole = match serde_json::from_str(&json) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(%key, error = %e, "skipping unreadable cache row");
                    continue;
                }
            };
            let mut pointer = Pointer::new(table, id);
            pointer.space_id = record.value.space_id.clone();
            self.entries
                .insert(CacheKey::new(&pointer, &owner), CacheEntry { pointer, record });
            loaded += 1;
        }
        tracing::info!(workspace = %self.workspace, loaded, "cache hydrated");
        Ok(loaded)
    }

    fn persist(&self, key: &CacheKey, record: &RecordWithRole) {
        let Some(db) = &self.db else { return };
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(%key, error = %e, "failed to serialize record");
                return;
            }
        };
        if let Err(e) = db.lock().put(&self.workspace, key.as_str(), &json) {
            tracing::warn!(%key, error = %e, "failed to persist record");
        }
    }

    fn unpersist(&self, key: &CacheKey) {
        let Some(db) = &self.db else { return };
        if let Err(e) = db.lock().remove(&self.workspace, key.as_str()) {
            tracing::warn!(%key, error = %e, "failed to remove persisted record");
        }
    }
}

/// Apply sticky `spaceId` enrichment and build the entry to store.
fn enrich(pointer: &Pointer, record: &mut RecordWithRole, space_id: Option<String>) -> CacheEntry {
    if record.value.space_id.is_none() {
        record.value.space_id = space_id.clone();
    }
    let mut pointer = pointer.clone();
    pointer.space_id = space_id.or_else(|| record.value.space_id.clone());
    CacheEntry {
        pointer,
        record: record.clone(),
    }
}

fn key_belongs_to(key: &CacheKey, user_id: &UserId) -> bool {
    CacheKey::parse(key.as_str()).is_some_and(|(_, _, owner)| owner == *user_id)
}

/// Thread-safe handle to a RecordCacheStore.
pub type SharedRecordCache = Arc<RecordCacheStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{RecordValue, Table};

    fn record(id: &str, version: u64, role: Role) -> RecordWithRole {
        RecordWithRole::new(role, RecordValue::new(Table::Block, id).with_version(version))
    }

    fn user() -> UserId {
        UserId::new("u1")
    }

    #[test]
    fn test_version_monotonicity() {
        let cache = RecordCacheStore::new("ws");
        let p = Pointer::block("b1");

        for version in [3, 1, 7, 5, 7, 2] {
            cache.set_record(&user(), &p, Some(record("b1", version, Role::Editor)), false);
        }
        assert_eq!(cache.get_version(&user(), &p), 7);

        cache.delete_record(&user(), &p);
        assert!(cache.get_record(&user(), &p).is_none());
        assert_eq!(cache.get_version(&user(), &p), 0);

        cache.set_record(&user(), &p, Some(record("b1", 2, Role::Editor)), false);
        assert_eq!(cache.get_version(&user(), &p), 2);
    }

    #[test]
    fn test_update_policy() {
        let cache = RecordCacheStore::new("ws");
        let p = Pointer::block("b1");

        assert!(cache.set_record(&user(), &p, Some(record("b1", 5, Role::Reader)), false));
        // Same version, same role: dropped.
        assert!(!cache.set_record(&user(), &p, Some(record("b1", 5, Role::Reader)), false));
        // Role change wins even at a lower version.
        assert!(cache.set_record(&user(), &p, Some(record("b1", 4, Role::Editor)), false));
        assert_eq!(cache.get_role(&user(), &p), Role::Editor);
        assert_eq!(cache.get_version(&user(), &p), 4);
        // Force overrides everything.
        assert!(cache.set_record(&user(), &p, Some(record("b1", 1, Role::Editor)), true));
        assert_eq!(cache.get_version(&user(), &p), 1);
    }

    #[test]
    fn test_space_id_is_sticky() {
        let cache = RecordCacheStore::new("ws");
        let enriched = Pointer::block("b1").with_space("s1");
        cache.set_record(&user(), &enriched, Some(record("b1", 1, Role::Editor)), false);

        let newer = record("b1", 2, Role::Editor);
        cache.set_record(&user(), &Pointer::block("b1"), Some(newer), false);
        let entry = cache.get_entry(&user(), &Pointer::block("b1")).unwrap();
        assert_eq!(entry.pointer.space_id.as_deref(), Some("s1"));
        assert_eq!(entry.record.value.space_id.as_deref(), Some("s1"));
        assert_eq!(entry.record.version(), 2);
    }

    #[test]
    fn test_users_are_isolated() {
        let cache = RecordCacheStore::new("ws");
        let p = Pointer::block("b1");
        let other = UserId::new("u2");
        cache.set_record(&user(), &p, Some(record("b1", 1, Role::Editor)), false);

        assert!(cache.get_record(&other, &p).is_none());
        assert_eq!(cache.get_role(&other, &p), Role::None);
        assert_eq!(cache.keys_for_user(&user()).len(), 1);
        assert!(cache.keys_for_user(&other).is_empty());
    }

    #[test]
    fn test_for_each_skips_role_none() {
        let cache = RecordCacheStore::new("ws");
        cache.set_record(&user(), &Pointer::block("a"), Some(record("a", 1, Role::Editor)), false);
        cache.set_record(&user(), &Pointer::block("b"), Some(record("b", 1, Role::None)), false);

        let mut seen = Vec::new();
        cache.for_each_record(&user(), |p, _| seen.push(p.id.clone()));
        assert_eq!(seen, vec!["a".to_string()]);
    }

    #[test]
    fn test_key_belongs_to_is_exact() {
        let key = CacheKey::new(&Pointer::block("b1"), &UserId::new("xu1"));
        assert!(!key_belongs_to(&key, &UserId::new("u1")));
        assert!(key_belongs_to(&key, &UserId::new("xu1")));
    }

    #[tokio::test]
    async fn test_fires_once_per_accepted_write() {
        let cache = RecordCacheStore::new("ws");
        let mut rx = cache.subscribe();
        let p = Pointer::block("b1");
        let key = CacheKey::new(&p, &user());

        cache.set_record(&user(), &p, Some(record("b1", 1, Role::Editor)), false);
        cache.set_record(&user(), &p, Some(record("b1", 1, Role::Editor)), false);
        cache.delete_record(&user(), &p);

        assert_eq!(rx.try_recv().unwrap(), CacheEvent::Changed { key: key.clone() });
        assert_eq!(rx.try_recv().unwrap(), CacheEvent::Changed { key });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_persist_and_hydrate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let p = Pointer::block("b1").with_space("s1");
        {
            let cache = RecordCacheStore::with_db(RecordDb::open(&path).unwrap(), "ws");
            cache.set_record(&user(), &p, Some(record("b1", 3, Role::Editor)), false);
            let gone = record("gone", 1, Role::Editor);
            cache.set_record(&user(), &Pointer::block("gone"), Some(gone), false);
            cache.delete_record(&user(), &Pointer::block("gone"));
        }

        let cache = RecordCacheStore::with_db(RecordDb::open(&path).unwrap(), "ws");
        let mut rx = cache.subscribe();
        assert_eq!(cache.hydrate().unwrap(), 1);
        assert_eq!(cache.get_version(&user(), &Pointer::block("b1")), 3);
        let entry = cache.get_entry(&user(), &Pointer::block("b1")).unwrap();
        assert_eq!(entry.pointer.space_id.as_deref(), Some("s1"));
        assert!(rx.try_recv().is_err());

        let other = RecordCacheStore::with_db(RecordDb::open(&path).unwrap(), "other");
        assert_eq!(other.hydrate().unwrap(), 0);
    }

    #[test]
    fn test_delete_user_records() {
        let cache = RecordCacheStore::with_db(RecordDb::in_memory().unwrap(), "ws");
        let other = UserId::new("u2");
        cache.set_record(&user(), &Pointer::block("a"), Some(record("a", 1, Role::Editor)), false);
        cache.set_record(&user(), &Pointer::block("b"), Some(record("b", 1, Role::Editor)), false);
        cache.set_record(&other, &Pointer::block("a"), Some(record("a", 1, Role::Editor)), false);

        assert_eq!(cache.delete_user_records(&user()), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_record(&other, &Pointer::block("a")).is_some());
    }
}
