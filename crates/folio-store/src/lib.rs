//! Record cache, transactions, and the store hierarchy.
//!
//! # Layers
//!
//! ```text
//! StoreContext ── RecordCacheStore ── RecordDb (SQLite, per workspace)
//!      │                 ▲
//!      │                 │ force write, version + 1
//!      ├── Transaction ──┘ (Operation* applied all-or-nothing)
//!      │        └──> TransactionQueue (FIFO, drained by the committer)
//!      └── StoreArena
//!             └── RecordStore / BlockStore / SpaceRootStore / SpaceStore
//! ```
//!
//! The cache is the only owner of record values. Stores are memoized lenses
//! and transactions are the only way local edits reach the cache.

pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod export;
pub mod ops;
pub mod store;
pub mod transaction;

pub use cache::{CacheEntry, CacheEvent, RecordCacheStore, SharedRecordCache};
pub use config::{CommitConfig, ConfigError, RequestQueueConfig, StoreConfig, default_db_path};
pub use context::StoreContext;
pub use db::RecordDb;
pub use error::{BugIndicatingError, Result, StoreError};
pub use export::export_markdown;
pub use ops::{Command, Operation};
pub use store::{
    BlockStore, RecordStore, SpaceRootStore, SpaceStore, StoreArena, StoreHandle, StoreSubscription,
};
pub use transaction::{Transaction, TransactionQueue, TransactionState, apply_operations, settle};
