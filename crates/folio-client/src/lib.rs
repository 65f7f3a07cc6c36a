//! Client side of folio: talking to the record authority.
//!
//! ```text
//!                 ┌──────────── RecordSync ◀── sync_record(user, pointer)
//!                 │                 │
//!  RemoteService ◀┤           RequestQueue (batch, dedup, timeout)
//!  (LocalRemote)  │
//!                 └── Session ◀── TransactionCommitter ◀── TransactionQueue
//! ```
//!
//! Reads flow in through [`RecordSync`], which reconciles canonical records
//! into the shared cache. Writes flow out through the [`TransactionCommitter`],
//! which submits what local edits queued.

pub mod committer;
pub mod constants;
pub mod error;
pub mod local;
pub mod remote;
pub mod request_queue;
pub mod session;
pub mod sync;

pub use committer::{CommitEvent, TransactionCommitter};
pub use error::{QueueError, RemoteError};
pub use local::LocalRemote;
pub use remote::{AuthToken, Credentials, LoginResponse, RemoteService, SyncRequest, UserInfo};
pub use request_queue::{DuplicateFn, PerformFn, RequestQueue, RequestQueueOptions};
pub use session::Session;
pub use sync::{RecordSync, SyncOutcome};
