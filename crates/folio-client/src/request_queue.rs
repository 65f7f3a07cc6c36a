//! Batching request queue.
//!
//! Callers `enqueue` single requests and await their own response. Requests
//! accumulate until a drain fires `request_delay` later; the drain takes up to
//! `batch_size` requests, collapses duplicates, and hands the unique ones to
//! the perform function in one call.
//!
//! ```text
//!   enqueue ──▶ pending ──(delay)──▶ drain ──▶ dedup ──▶ perform(batch)
//!      ▲                               │                      │
//!      └──────── oneshot reply ◀───────┴──── remap ◀──────────┘
//! ```
//!
//! - At most `max_workers` drains run at once.
//! - When a drain leaves `batch_size` or more requests behind, the next drain
//!   is scheduled immediately instead of after the delay.
//! - The timeout is a race, not a cancellation: a perform call that outlives
//!   it keeps running, its result is simply discarded.
//! - A failed batch fails every caller in it, duplicates included.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, oneshot};

use folio_store::RequestQueueConfig;

use crate::error::{QueueError, RemoteError};

/// Batching policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestQueueOptions {
    pub request_delay: Duration,
    pub batch_size: usize,
    pub request_timeout: Duration,
    pub max_workers: usize,
}

impl Default for RequestQueueOptions {
    fn default() -> Self {
        Self::from(&RequestQueueConfig::default())
    }
}

impl From<&RequestQueueConfig> for RequestQueueOptions {
    fn from(config: &RequestQueueConfig) -> Self {
        Self {
            request_delay: Duration::from_millis(config.request_delay_ms),
            batch_size: config.batch_size.max(1),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            max_workers: config.max_workers.max(1),
        }
    }
}

/// Performs one deduplicated batch. Must return one response per request,
/// in order.
pub type PerformFn<Req, Resp> =
    Arc<dyn Fn(Vec<Req>) -> BoxFuture<'static, Result<Vec<Resp>, RemoteError>> + Send + Sync>;

/// Whether two requests are interchangeable.
pub type DuplicateFn<Req> = Arc<dyn Fn(&Req, &Req) -> bool + Send + Sync>;

struct Pending<Req, Resp> {
    request: Req,
    reply: oneshot::Sender<Result<Resp, QueueError>>,
}

struct Shared<Req, Resp> {
    options: RequestQueueOptions,
    pending: Mutex<VecDeque<Pending<Req, Resp>>>,
    workers: Arc<Semaphore>,
    drain_scheduled: AtomicBool,
    is_duplicate: DuplicateFn<Req>,
    perform: PerformFn<Req, Resp>,
}

/// Generic request batcher. Cloning shares the queue.
pub struct RequestQueue<Req, Resp> {
    shared: Arc<Shared<Req, Resp>>,
}

impl<Req, Resp> Clone for RequestQueue<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<Req, Resp> RequestQueue<Req, Resp>
where
    Req: Send + 'static,
    Resp: Clone + Send + 'static,
{
    pub fn new(
        options: RequestQueueOptions,
        is_duplicate: DuplicateFn<Req>,
        perform: PerformFn<Req, Resp>,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(options.max_workers.max(1)));
        Self {
            shared: Arc::new(Shared {
                options,
                pending: Mutex::new(VecDeque::new()),
                workers,
                drain_scheduled: AtomicBool::new(false),
                is_duplicate,
                perform,
            }),
        }
    }

    pub fn options(&self) -> &RequestQueueOptions {
        &self.shared.options
    }

    /// Requests waiting for a drain.
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Queue `request` and wait for its response.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn enqueue(&self, request: Req) -> Result<Resp, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.shared.pending.lock().push_back(Pending { request, reply });
        schedule(&self.shared, self.shared.options.request_delay);
        rx.await.map_err(|_| QueueError::Dropped)?
    }
}

/// Arrange for a drain after `delay`, unless one is already scheduled.
fn schedule<Req, Resp>(shared: &Arc<Shared<Req, Resp>>, delay: Duration)
where
    Req: Send + 'static,
    Resp: Clone + Send + 'static,
{
    if shared.drain_scheduled.swap(true, Ordering::AcqRel) {
        return;
    }
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        shared.drain_scheduled.store(false, Ordering::Release);
        drain(shared).await;
    });
}

async fn drain<Req, Resp>(shared: Arc<Shared<Req, Resp>>)
where
    Req: Send + 'static,
    Resp: Clone + Send + 'static,
{
    // Saturated: the next worker to finish reschedules.
    let Ok(permit) = Arc::clone(&shared.workers).try_acquire_owned() else {
        tracing::trace!("request queue workers saturated");
        return;
    };

    let (batch, remaining) = {
        let mut pending = shared.pending.lock();
        let n = shared.options.batch_size.min(pending.len());
        let batch: Vec<_> = pending.drain(..n).collect();
        (batch, pending.len())
    };
    if batch.is_empty() {
        return;
    }
    if remaining >= shared.options.batch_size {
        schedule(&shared, Duration::ZERO);
    } else if remaining > 0 {
        schedule(&shared, shared.options.request_delay);
    }

    run_batch(&shared, batch).await;
    drop(permit);

    if !shared.pending.lock().is_empty() {
        schedule(&shared, shared.options.request_delay);
    }
}

async fn run_batch<Req, Resp>(shared: &Shared<Req, Resp>, batch: Vec<Pending<Req, Resp>>)
where
    Req: Send + 'static,
    Resp: Clone + Send + 'static,
{
    // slots[i] is the index into `unique` that answers batch[i].
    let mut unique: Vec<Req> = Vec::with_capacity(batch.len());
    let mut slots = Vec::with_capacity(batch.len());
    let mut replies = Vec::with_capacity(batch.len());
    for Pending { request, reply } in batch {
        let slot = match unique.iter().position(|u| (shared.is_duplicate)(u, &request)) {
            Some(slot) => slot,
            None => {
                unique.push(request);
                unique.len() - 1
            }
        };
        slots.push(slot);
        replies.push(reply);
    }
    let expected = unique.len();
    tracing::debug!(requests = replies.len(), unique = expected, "performing request batch");

    let call = tokio::spawn((shared.perform)(unique));
    let outcome = match tokio::time::timeout(shared.options.request_timeout, call).await {
        Ok(Ok(Ok(responses))) if responses.len() == expected => Ok(responses),
        Ok(Ok(Ok(responses))) => Err(QueueError::ResponseMismatch {
            expected,
            got: responses.len(),
        }),
        Ok(Ok(Err(e))) => Err(QueueError::Rejected(e)),
        Ok(Err(join_error)) => Err(QueueError::Rejected(RemoteError::Transport(
            join_error.to_string(),
        ))),
        Err(_) => {
            tracing::warn!(
                timeout_ms = shared.options.request_timeout.as_millis() as u64,
                requests = replies.len(),
                "request batch timed out"
            );
            Err(QueueError::Timeout)
        }
    };

    match outcome {
        Ok(responses) => {
            for (reply, slot) in replies.into_iter().zip(slots) {
                let _ = reply.send(Ok(responses[slot].clone()));
            }
        }
        Err(e) => {
            for reply in replies {
                let _ = reply.send(Err(e.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    fn options(batch_size: usize, max_workers: usize) -> RequestQueueOptions {
        RequestQueueOptions {
            request_delay: Duration::from_millis(5),
            batch_size,
            request_timeout: Duration::from_millis(500),
            max_workers,
        }
    }

    fn same() -> DuplicateFn<u32> {
        Arc::new(|a: &u32, b: &u32| a == b)
    }

    /// Doubles every request and records each batch.
    fn doubling(batches: Arc<Mutex<Vec<Vec<u32>>>>) -> PerformFn<u32, u32> {
        Arc::new(move |batch: Vec<u32>| {
            let batches = Arc::clone(&batches);
            async move {
                batches.lock().push(batch.clone());
                Ok::<_, RemoteError>(batch.into_iter().map(|n| n * 2).collect())
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_duplicates_share_one_call() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let queue = RequestQueue::new(options(10, 1), same(), doubling(Arc::clone(&batches)));

        let (a, b, c) = tokio::join!(queue.enqueue(7), queue.enqueue(7), queue.enqueue(3));
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (14, 14, 6));
        assert_eq!(*batches.lock(), vec![vec![7, 3]]);
    }

    #[tokio::test]
    async fn test_full_batches_drain_back_to_back() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let queue = RequestQueue::new(options(2, 1), same(), doubling(Arc::clone(&batches)));

        let results = futures::future::join_all((0..5).map(|n| queue.enqueue(n))).await;
        let results: Vec<u32> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(results, vec![0, 2, 4, 6, 8]);

        let sizes: Vec<usize> = batches.lock().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_worker_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let perform: PerformFn<u32, u32> = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            Arc::new(move |batch: Vec<u32>| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, RemoteError>(batch)
                }
                .boxed()
            })
        };
        let queue = RequestQueue::new(options(1, 2), same(), perform);

        let results = futures::future::join_all((0..6).map(|n| queue.enqueue(n))).await;
        assert!(results.iter().all(Result::is_ok));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_timeout_fails_whole_batch() {
        let perform: PerformFn<u32, u32> = Arc::new(|batch: Vec<u32>| {
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, RemoteError>(batch)
            }
            .boxed()
        });
        let mut opts = options(10, 1);
        opts.request_timeout = Duration::from_millis(20);
        let queue = RequestQueue::new(opts, same(), perform);

        let (a, b) = tokio::join!(queue.enqueue(1), queue.enqueue(1));
        assert_eq!(a, Err(QueueError::Timeout));
        assert_eq!(b, Err(QueueError::Timeout));
    }

    #[tokio::test]
    async fn test_rejection_reaches_every_caller() {
        let perform: PerformFn<u32, u32> = Arc::new(|_: Vec<u32>| {
            async { Err::<Vec<u32>, _>(RemoteError::Transport("offline".into())) }.boxed()
        });
        let queue = RequestQueue::new(options(10, 1), same(), perform);

        let (a, b) = tokio::join!(queue.enqueue(1), queue.enqueue(2));
        let expected = Err(QueueError::Rejected(RemoteError::Transport("offline".into())));
        assert_eq!(a, expected);
        assert_eq!(b, expected);
    }

    #[tokio::test]
    async fn test_short_response_is_a_mismatch() {
        let perform: PerformFn<u32, u32> =
            Arc::new(|_: Vec<u32>| async { Ok::<_, RemoteError>(vec![1]) }.boxed());
        let queue = RequestQueue::new(options(10, 1), same(), perform);

        let (a, _) = tokio::join!(queue.enqueue(1), queue.enqueue(2));
        assert_eq!(a, Err(QueueError::ResponseMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn test_options_from_config() {
        let opts = RequestQueueOptions::from(&RequestQueueConfig {
            request_delay_ms: 7,
            batch_size: 0,
            request_timeout_ms: 1500,
            max_workers: 3,
        });
        assert_eq!(opts.request_delay, Duration::from_millis(7));
        assert_eq!(opts.batch_size, 1);
        assert_eq!(opts.request_timeout, Duration::from_millis(1500));
        assert_eq!(opts.max_workers, 3);
    }
}
