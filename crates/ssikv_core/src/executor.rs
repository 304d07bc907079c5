//! Commit applier.
//!
//! Committed batches are applied to the store by a single worker thread in
//! the order they are submitted. The oracle submits under its commit
//! sequencing lock, so submission order is commit-timestamp order and a
//! batch with a lower commit timestamp is always visible before one with a
//! higher timestamp.

use crate::error::{CoreError, CoreResult};
use crate::transaction::TimestampedBatch;
use crate::types::Timestamp;
use crate::watermark::TimestampMark;
use parking_lot::{Condvar, Mutex};
use ssikv_mvcc::{Value, VersionedKey, VersionedStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

const COMPONENT: &str = "transaction executor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitState {
    Pending,
    Applied,
    Dropped,
}

#[derive(Debug)]
struct CommitSignal {
    state: Mutex<CommitState>,
    done: Condvar,
}

impl CommitSignal {
    fn resolve(&self, outcome: CommitState) {
        let mut state = self.state.lock();
        if *state == CommitState::Pending {
            *state = outcome;
        }
        self.done.notify_all();
    }
}

/// Worker-side end of a [`CommitHandle`].
///
/// Dropping it without calling `complete` resolves the handle as dropped,
/// which covers batches still queued when the executor stops.
struct Completion(Arc<CommitSignal>);

impl Completion {
    fn complete(self) {
        self.0.resolve(CommitState::Applied);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.resolve(CommitState::Dropped);
    }
}

/// Completion signal for one submitted batch.
///
/// Cloning is cheap; every clone observes the same outcome.
#[derive(Debug, Clone)]
pub struct CommitHandle {
    commit_timestamp: Timestamp,
    signal: Arc<CommitSignal>,
}

impl CommitHandle {
    fn new(commit_timestamp: Timestamp) -> (Self, Completion) {
        let signal = Arc::new(CommitSignal {
            state: Mutex::new(CommitState::Pending),
            done: Condvar::new(),
        });
        let completion = Completion(Arc::clone(&signal));
        (
            Self {
                commit_timestamp,
                signal,
            },
            completion,
        )
    }

    /// Returns the commit timestamp of the batch.
    #[must_use]
    pub fn commit_timestamp(&self) -> Timestamp {
        self.commit_timestamp
    }

    /// Returns true once the batch is visible in the store.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        *self.signal.state.lock() == CommitState::Applied
    }

    /// Blocks until the batch has been applied.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Shutdown`] if the executor stopped before
    /// applying the batch.
    pub fn wait(&self) -> CoreResult<()> {
        let mut state = self.signal.state.lock();
        while *state == CommitState::Pending {
            self.signal.done.wait(&mut state);
        }
        Self::outcome(*state)
    }

    /// Blocks for at most `timeout`.
    ///
    /// Returns `Ok(true)` if the batch was applied and `Ok(false)` if it is
    /// still pending.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Shutdown`] if the executor stopped before
    /// applying the batch.
    pub fn wait_timeout(&self, timeout: Duration) -> CoreResult<bool> {
        let deadline = Instant::now() + timeout;
        let mut state = self.signal.state.lock();
        while *state == CommitState::Pending {
            if self.signal.done.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        match *state {
            CommitState::Pending => Ok(false),
            outcome => Self::outcome(outcome).map(|()| true),
        }
    }

    fn outcome(state: CommitState) -> CoreResult<()> {
        match state {
            CommitState::Applied => Ok(()),
            CommitState::Pending | CommitState::Dropped => Err(CoreError::shutdown(COMPONENT)),
        }
    }
}

enum ExecutorMessage {
    Apply {
        batch: TimestampedBatch,
        completion: Completion,
    },
    Stop,
}

/// Single-writer applier for committed batches.
///
/// After writing every key of a batch at its commit timestamp the worker
/// finishes that timestamp on the commit mark, then resolves the batch's
/// [`CommitHandle`].
pub struct TransactionExecutor {
    sender: Mutex<Option<SyncSender<ExecutorMessage>>>,
    stopped: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionExecutor {
    /// Starts the worker thread.
    ///
    /// `queue_capacity` bounds the number of submitted but unapplied batches;
    /// `submit` blocks while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn spawn(
        store: Arc<dyn VersionedStore>,
        commit_mark: Arc<TimestampMark>,
        queue_capacity: usize,
    ) -> CoreResult<Self> {
        let (sender, receiver) = mpsc::sync_channel(queue_capacity);
        let stopped = Arc::new(AtomicBool::new(false));
        let worker_stopped = Arc::clone(&stopped);

        let worker = thread::Builder::new()
            .name("ssikv-executor".to_string())
            .spawn(move || run_worker(&*store, &commit_mark, &worker_stopped, receiver))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            stopped,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queues a batch for application.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Shutdown`] if the executor has stopped.
    pub fn submit(&self, batch: TimestampedBatch) -> CoreResult<CommitHandle> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| CoreError::shutdown(COMPONENT))?;

        let (handle, completion) = CommitHandle::new(batch.commit_timestamp());
        trace!(
            commit_timestamp = batch.commit_timestamp().as_u64(),
            keys = batch.len(),
            "batch submitted"
        );
        sender
            .send(ExecutorMessage::Apply { batch, completion })
            .map_err(|_| CoreError::shutdown(COMPONENT))?;
        Ok(handle)
    }

    /// Returns true once [`Self::stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stops the worker.
    ///
    /// The batch being applied completes; batches still queued are dropped
    /// and their handles resolve to [`CoreError::Shutdown`].
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(sender) = self.sender.lock().take() {
            // A full queue already holds a message that wakes the worker.
            if let Err(TrySendError::Disconnected(_)) = sender.try_send(ExecutorMessage::Stop) {
                debug!("transaction executor already stopped");
            }
        }
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

impl Drop for TransactionExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TransactionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionExecutor")
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

fn run_worker(
    store: &dyn VersionedStore,
    commit_mark: &TimestampMark,
    stopped: &AtomicBool,
    receiver: Receiver<ExecutorMessage>,
) {
    info!("transaction executor started");
    let mut applied: u64 = 0;

    while let Ok(message) = receiver.recv() {
        if stopped.load(Ordering::Acquire) {
            break;
        }
        match message {
            ExecutorMessage::Apply { batch, completion } => {
                apply(store, commit_mark, batch, completion);
                applied += 1;
            }
            ExecutorMessage::Stop => break,
        }
    }

    // Dropping the receiver drops any queued batches, resolving their handles.
    drop(receiver);
    info!(applied, "transaction executor stopped");
}

fn apply(
    store: &dyn VersionedStore,
    commit_mark: &TimestampMark,
    batch: TimestampedBatch,
    completion: Completion,
) {
    let commit_timestamp = batch.commit_timestamp();
    let keys = batch.len();
    for (key, value) in batch.into_pairs() {
        if !store.put(
            VersionedKey::new(key, commit_timestamp.as_u64()),
            Value::new(value),
        ) {
            debug!(
                commit_timestamp = commit_timestamp.as_u64(),
                "versioned key already present, skipped"
            );
        }
    }
    commit_mark.finish(commit_timestamp);
    completion.complete();
    trace!(
        commit_timestamp = commit_timestamp.as_u64(),
        keys,
        "batch applied"
    );
}
