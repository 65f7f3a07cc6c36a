//! Background commit of queued transactions.
//!
//! Local edits are applied to the cache immediately and queued. The committer
//! drains the queue on a fixed interval and submits each batch through the
//! session. A rejected batch is reported on the event channel and dropped:
//! there is no retry, and the optimistic local state stays until the next
//! sync overwrites it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use folio_store::{CommitConfig, Transaction, TransactionQueue, settle};
use folio_types::TransactionId;

use crate::constants::COMMIT_EVENT_CAPACITY;
use crate::error::RemoteError;
use crate::session::Session;

/// Outcome of one submitted batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitEvent {
    Committed { ids: Vec<TransactionId> },
    Failed { ids: Vec<TransactionId>, error: RemoteError },
}

pub struct TransactionCommitter {
    queue: Arc<TransactionQueue>,
    session: Arc<Session>,
    config: CommitConfig,
    event_tx: broadcast::Sender<CommitEvent>,
}

impl TransactionCommitter {
    pub fn new(queue: Arc<TransactionQueue>, session: Arc<Session>, config: CommitConfig) -> Self {
        let (event_tx, _) = broadcast::channel(COMMIT_EVENT_CAPACITY);
        Self {
            queue,
            session,
            config,
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommitEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    /// Submit up to `max_per_tick` queued transactions as one batch.
    ///
    /// Returns the drained transactions, settled as committed or failed.
    /// An empty queue makes no remote call.
    pub async fn tick(&self) -> Vec<Transaction> {
        let mut batch = self.queue.drain(self.config.max_per_tick.max(1));
        if batch.is_empty() {
            return batch;
        }
        let ids: Vec<TransactionId> = batch.iter().map(|txn| txn.id).collect();

        let result = self.session.apply_transactions(batch.clone()).await;
        let committed = result.is_ok();
        for txn in &mut batch {
            settle(txn, committed);
        }

        let event = match result {
            Ok(()) => {
                tracing::info!(count = ids.len(), "transactions committed");
                CommitEvent::Committed { ids }
            }
            Err(error) => {
                tracing::error!(count = ids.len(), %error, "transaction commit failed");
                CommitEvent::Failed { ids, error }
            }
        };
        let _ = self.event_tx.send(event);
        batch
    }

    /// Run [`tick`](Self::tick) every `interval_ms` until the handle is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_millis(self.config.interval_ms.max(1));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }
}
