//! The explicit session context: cache, transaction queue, and store arena.
//!
//! Everything that needs shared state takes a `StoreContext` instead of
//! reaching for a global. Cloning is cheap and every clone sees the same
//! cache, queue, and arena.

use std::sync::Arc;

use parking_lot::RwLock;

use folio_types::{Pointer, TransactionId, UserId};

use crate::cache::RecordCacheStore;
use crate::error::Result;
use crate::store::{BlockStore, RecordStore, SpaceRootStore, SpaceStore, StoreArena};
use crate::transaction::{Transaction, TransactionQueue};

#[derive(Clone)]
pub struct StoreContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    cache: Arc<RecordCacheStore>,
    queue: Arc<TransactionQueue>,
    arena: RwLock<StoreArena>,
}

impl StoreContext {
    pub fn new(cache: Arc<RecordCacheStore>) -> Self {
        Self::with_queue(cache, Arc::new(TransactionQueue::new()))
    }

    pub fn with_queue(cache: Arc<RecordCacheStore>, queue: Arc<TransactionQueue>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                cache,
                queue,
                arena: RwLock::new(StoreArena::default()),
            }),
        }
    }

    /// Context over a fresh unpersisted cache.
    pub fn in_memory(workspace: impl Into<String>) -> Self {
        Self::new(Arc::new(RecordCacheStore::new(workspace)))
    }

    pub fn cache(&self) -> &Arc<RecordCacheStore> {
        &self.inner.cache
    }

    pub fn queue(&self) -> &Arc<TransactionQueue> {
        &self.inner.queue
    }

    pub(crate) fn arena(&self) -> &RwLock<StoreArena> {
        &self.inner.arena
    }

    pub fn same_context(&self, other: &StoreContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Apply `txn` to the cache and queue it for remote commit.
    ///
    /// A transaction that fails locally is not queued.
    pub fn commit(&self, mut txn: Transaction) -> Result<TransactionId> {
        txn.apply(&self.inner.cache)?;
        let id = txn.id;
        self.inner.queue.push(txn);
        Ok(id)
    }

    // =========================================================================
    // Root stores
    // =========================================================================

    /// Root store for `(user_id, pointer)`, memoized per user.
    pub fn record_store(&self, user_id: &UserId, pointer: &Pointer) -> RecordStore {
        let handle = self.inner.arena.write().root(user_id, pointer, &[]);
        RecordStore::from_handle(self.clone(), handle)
    }

    pub fn block_store(&self, user_id: &UserId, id: &str) -> BlockStore {
        BlockStore::new(self.record_store(user_id, &Pointer::block(id)))
    }

    pub fn page_store(&self, user_id: &UserId, id: &str) -> BlockStore {
        BlockStore::new(self.record_store(user_id, &Pointer::page(id)))
    }

    pub fn space_root_store(&self, user_id: &UserId) -> SpaceRootStore {
        SpaceRootStore::new(self.record_store(user_id, &Pointer::space_root(user_id)))
    }

    pub fn space_store(&self, user_id: &UserId, id: &str) -> SpaceStore {
        SpaceStore::new(self.record_store(user_id, &Pointer::space(id)))
    }

    /// Number of store nodes materialized so far.
    pub fn store_count(&self) -> usize {
        self.inner.arena.read().len()
    }
}

impl std::fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreContext")
            .field("workspace", &self.inner.cache.workspace())
            .field("records", &self.inner.cache.len())
            .field("queued", &self.inner.queue.len())
            .finish()
    }
}
