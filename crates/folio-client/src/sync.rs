//! Pulling canonical records into the local cache.
//!
//! Every `sync_record` call becomes one [`SyncRequest`] carrying the version
//! the cache holds. Requests go through a [`RequestQueue`], so concurrent
//! syncs of the same record at the same version share one remote round trip.
//! Answers are offered to the cache without force: a response older than what
//! the cache already holds is dropped there.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;

use folio_store::SharedRecordCache;
use folio_types::{Pointer, RecordWithRole, UserId};

use crate::error::QueueError;
use crate::remote::{RemoteService, SyncRequest};
use crate::request_queue::{DuplicateFn, PerformFn, RequestQueue, RequestQueueOptions};

/// What a sync did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The remote value was newer (or carried a new role) and replaced ours.
    Updated,
    /// The remote value was not newer; the cache kept its entry.
    Unchanged,
    /// The remote has no record for this viewer; our entry was removed.
    Removed,
}

/// Record sync through a batching queue.
#[derive(Clone)]
pub struct RecordSync {
    cache: SharedRecordCache,
    queue: RequestQueue<SyncRequest, Option<RecordWithRole>>,
}

impl RecordSync {
    pub fn new(
        cache: SharedRecordCache,
        remote: Arc<dyn RemoteService>,
        options: RequestQueueOptions,
    ) -> Self {
        let is_duplicate: DuplicateFn<SyncRequest> =
            Arc::new(|a: &SyncRequest, b: &SyncRequest| a.same_request(b));
        let perform: PerformFn<SyncRequest, Option<RecordWithRole>> =
            Arc::new(move |batch: Vec<SyncRequest>| {
                let remote = remote.clone();
                async move {
                    tracing::debug!(requests = batch.len(), "syncing record batch");
                    remote.sync_record_values(batch).await
                }
                .boxed()
            });
        Self {
            cache,
            queue: RequestQueue::new(options, is_duplicate, perform),
        }
    }

    pub fn cache(&self) -> &SharedRecordCache {
        &self.cache
    }

    /// Fetch `pointer` for `user_id` and reconcile it into the cache.
    pub async fn sync_record(
        &self,
        user_id: &UserId,
        pointer: &Pointer,
    ) -> Result<SyncOutcome, QueueError> {
        let request = SyncRequest {
            user_id: user_id.clone(),
            pointer: pointer.clone(),
            version: self.cache.get_version(user_id, pointer),
        };
        let response = self.queue.enqueue(request).await?;

        let outcome = match response {
            None => {
                self.cache.set_record(user_id, pointer, None, false);
                SyncOutcome::Removed
            }
            Some(record) => {
                if self.cache.set_record(user_id, pointer, Some(record), false) {
                    SyncOutcome::Updated
                } else {
                    SyncOutcome::Unchanged
                }
            }
        };
        tracing::trace!(user = %user_id, %pointer, ?outcome, "record synced");
        Ok(outcome)
    }

    /// Sync several records concurrently. Results are in input order.
    pub async fn sync_records(
        &self,
        user_id: &UserId,
        pointers: &[Pointer],
    ) -> Vec<Result<SyncOutcome, QueueError>> {
        join_all(pointers.iter().map(|pointer| self.sync_record(user_id, pointer))).await
    }
}
