//! Timestamp watermarks.
//!
//! A [`TimestampMark`] tracks the highest timestamp `T` such that every
//! timestamp `<= T` that was begun has also finished. Begins and finishes
//! arrive out of order and from many threads; the mark serializes them
//! through a channel into one background thread that owns all bookkeeping.
//!
//! Consider two transactions with commit timestamps 4 and 6. If 6 finishes
//! first the mark cannot report 6 as done, because 4 is still running. The
//! loop keeps a min-heap of outstanding timestamps with a pending count per
//! timestamp and only advances `done_till` by popping minimums whose count
//! has dropped to zero, so `done_till` moves 4 then 6, never 6 alone.
//!
//! The oracle keeps two marks: one over begin timestamps (to know when
//! committed-transaction records can be discarded) and one over commit
//! timestamps (to let new transactions wait until earlier commits are
//! applied).

use crate::error::{CoreError, CoreResult};
use crate::types::Timestamp;
use parking_lot::{Condvar, Mutex};
use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

enum MarkMessage {
    Begin(u64),
    Finish(u64),
    Wait { timestamp: u64, ticket: Ticket },
    CancelWait { timestamp: u64, waiter: Arc<Waiter> },
    Flush(Ticket),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitState {
    Pending,
    Reached,
    Closed,
}

/// A parked caller of [`TimestampMark::wait_for`].
struct Waiter {
    state: Mutex<WaitState>,
    ready: Condvar,
}

impl Waiter {
    fn new() -> Self {
        Self {
            state: Mutex::new(WaitState::Pending),
            ready: Condvar::new(),
        }
    }

    fn release(&self, outcome: WaitState) {
        let mut state = self.state.lock();
        if *state == WaitState::Pending {
            *state = outcome;
        }
        self.ready.notify_all();
    }

    /// Parks until released or until `deadline` passes.
    fn park(&self, deadline: Option<Instant>) -> WaitState {
        let mut state = self.state.lock();
        while *state == WaitState::Pending {
            match deadline {
                None => self.ready.wait(&mut state),
                Some(deadline) => {
                    if self.ready.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        *state
    }
}

/// A waiter as held by the processing thread.
///
/// Dropping a ticket that was never released closes its waiter, so a caller
/// whose message is discarded after the loop stopped does not park forever.
struct Ticket(Arc<Waiter>);

impl Drop for Ticket {
    fn drop(&mut self) {
        self.0.release(WaitState::Closed);
    }
}

/// State owned by the mark's processing thread.
struct MarkLoop {
    name: &'static str,
    done_till: Arc<AtomicU64>,
    outstanding: BinaryHeap<Reverse<u64>>,
    pending_by_timestamp: HashMap<u64, i64>,
    waiters_by_timestamp: BTreeMap<u64, Vec<Ticket>>,
}

impl MarkLoop {
    fn run(mut self, receiver: Receiver<MarkMessage>) {
        debug!(mark = self.name, "timestamp mark started");
        while let Ok(message) = receiver.recv() {
            match message {
                MarkMessage::Begin(timestamp) => self.process(timestamp, 1),
                MarkMessage::Finish(timestamp) => self.process(timestamp, -1),
                MarkMessage::Wait { timestamp, ticket } => self.add_waiter(timestamp, ticket),
                MarkMessage::CancelWait { timestamp, waiter } => {
                    self.cancel_waiter(timestamp, &waiter);
                }
                MarkMessage::Flush(ticket) => ticket.0.release(WaitState::Reached),
                MarkMessage::Stop => break,
            }
        }
        self.close();
    }

    fn process(&mut self, timestamp: u64, delta: i64) {
        match self.pending_by_timestamp.entry(timestamp) {
            Entry::Vacant(entry) => {
                self.outstanding.push(Reverse(timestamp));
                entry.insert(delta);
            }
            Entry::Occupied(mut entry) => *entry.get_mut() += delta,
        }

        let previous = self.done_till.load(Ordering::Acquire);
        let mut done_till = previous;
        while let Some(&Reverse(minimum)) = self.outstanding.peek() {
            let pending = self
                .pending_by_timestamp
                .get(&minimum)
                .copied()
                .unwrap_or(0);
            if pending > 0 {
                break;
            }
            self.outstanding.pop();
            self.pending_by_timestamp.remove(&minimum);
            done_till = done_till.max(minimum);
        }

        if done_till != previous {
            self.done_till.store(done_till, Ordering::Release);
            trace!(mark = self.name, done_till, "watermark advanced");
            self.release_waiters(done_till);
        }
    }

    fn add_waiter(&mut self, timestamp: u64, ticket: Ticket) {
        if self.done_till.load(Ordering::Acquire) >= timestamp {
            ticket.0.release(WaitState::Reached);
            return;
        }
        self.waiters_by_timestamp
            .entry(timestamp)
            .or_default()
            .push(ticket);
    }

    fn cancel_waiter(&mut self, timestamp: u64, waiter: &Arc<Waiter>) {
        if let Some(waiters) = self.waiters_by_timestamp.get_mut(&timestamp) {
            waiters.retain(|parked| !Arc::ptr_eq(&parked.0, waiter));
            if waiters.is_empty() {
                self.waiters_by_timestamp.remove(&timestamp);
            }
        }
    }

    fn release_waiters(&mut self, done_till: u64) {
        let later = match done_till.checked_add(1) {
            Some(bound) => self.waiters_by_timestamp.split_off(&bound),
            None => BTreeMap::new(),
        };
        let ready = std::mem::replace(&mut self.waiters_by_timestamp, later);
        for ticket in ready.into_values().flatten() {
            ticket.0.release(WaitState::Reached);
        }
    }

    fn close(&mut self) {
        self.waiters_by_timestamp.clear();
        debug!(
            mark = self.name,
            done_till = self.done_till.load(Ordering::Acquire),
            outstanding = self.outstanding.len(),
            "timestamp mark stopped"
        );
    }
}

/// Tracks which timestamps are fully processed.
///
/// `begin` and `finish` never block; they enqueue a mark for the background
/// thread. `done_till` is a lock-free read of the last published watermark.
pub struct TimestampMark {
    name: &'static str,
    done_till: Arc<AtomicU64>,
    sender: Sender<MarkMessage>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimestampMark {
    /// Starts a mark whose watermark begins at `initial`.
    ///
    /// # Errors
    ///
    /// Returns an error if the background thread cannot be spawned.
    pub fn spawn(name: &'static str, initial: Timestamp) -> CoreResult<Self> {
        let done_till = Arc::new(AtomicU64::new(initial.as_u64()));
        let (sender, receiver) = mpsc::channel();
        let mark_loop = MarkLoop {
            name,
            done_till: Arc::clone(&done_till),
            outstanding: BinaryHeap::new(),
            pending_by_timestamp: HashMap::new(),
            waiters_by_timestamp: BTreeMap::new(),
        };
        let worker = thread::Builder::new()
            .name(format!("ssikv-{name}"))
            .spawn(move || mark_loop.run(receiver))?;

        Ok(Self {
            name,
            done_till,
            sender,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Records that work at `timestamp` has started.
    pub fn begin(&self, timestamp: Timestamp) {
        self.send(MarkMessage::Begin(timestamp.as_u64()));
    }

    /// Records that work at `timestamp` has finished.
    pub fn finish(&self, timestamp: Timestamp) {
        self.send(MarkMessage::Finish(timestamp.as_u64()));
    }

    /// Returns the highest timestamp up to which everything has finished.
    #[must_use]
    pub fn done_till(&self) -> Timestamp {
        Timestamp::new(self.done_till.load(Ordering::Acquire))
    }

    /// Blocks until `done_till() >= timestamp`.
    ///
    /// Returns immediately if the watermark is already there.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Shutdown`] if the mark stops first.
    pub fn wait_for(&self, timestamp: Timestamp) -> CoreResult<()> {
        self.wait(timestamp, None)
    }

    /// Like [`Self::wait_for`] but gives up after `timeout`.
    ///
    /// Giving up removes only this caller's waiter; pending counts and other
    /// waiters on the same timestamp are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WaitCancelled`] on timeout and
    /// [`CoreError::Shutdown`] if the mark stops first.
    pub fn wait_for_timeout(&self, timestamp: Timestamp, timeout: Duration) -> CoreResult<()> {
        self.wait(timestamp, Some(Instant::now() + timeout))
    }

    /// Blocks until every mark sent before this call has been processed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Shutdown`] if the mark has stopped.
    pub fn flush(&self) -> CoreResult<()> {
        let waiter = Arc::new(Waiter::new());
        self.sender
            .send(MarkMessage::Flush(Ticket(Arc::clone(&waiter))))
            .map_err(|_| CoreError::shutdown(self.name))?;
        match waiter.park(None) {
            WaitState::Reached => Ok(()),
            WaitState::Pending | WaitState::Closed => Err(CoreError::shutdown(self.name)),
        }
    }

    /// Stops the background thread and releases all waiters.
    ///
    /// Marks sent after this call are ignored. Calling it twice is harmless.
    pub fn stop(&self) {
        let _ = self.sender.send(MarkMessage::Stop);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }

    fn wait(&self, timestamp: Timestamp, deadline: Option<Instant>) -> CoreResult<()> {
        if self.done_till() >= timestamp {
            return Ok(());
        }

        let timestamp = timestamp.as_u64();
        let waiter = Arc::new(Waiter::new());
        self.sender
            .send(MarkMessage::Wait {
                timestamp,
                ticket: Ticket(Arc::clone(&waiter)),
            })
            .map_err(|_| CoreError::shutdown(self.name))?;

        match waiter.park(deadline) {
            WaitState::Reached => Ok(()),
            WaitState::Closed => Err(CoreError::shutdown(self.name)),
            WaitState::Pending => {
                let _ = self.sender.send(MarkMessage::CancelWait { timestamp, waiter });
                if self.done_till.load(Ordering::Acquire) >= timestamp {
                    return Ok(());
                }
                debug!(mark = self.name, timestamp, "watermark wait cancelled");
                Err(CoreError::WaitCancelled { timestamp })
            }
        }
    }

    fn send(&self, message: MarkMessage) {
        if self.sender.send(message).is_err() {
            trace!(mark = self.name, "mark dropped, timestamp mark stopped");
        }
    }
}

impl Drop for TimestampMark {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TimestampMark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampMark")
            .field("name", &self.name)
            .field("done_till", &self.done_till())
            .finish_non_exhaustive()
    }
}
