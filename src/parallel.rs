//! Bounded worker pool for independent comparison tasks.
//!
//! Both search algorithms split their work into independent units (one bucket,
//! or one outer document of the exhaustive loop). Units never wait on each
//! other, so the only coordination is a completion count and a deadline:
//!
//! ```text
//! submitter ── spawn ──▶ [ rayon pool (N threads) ] ── done ──▶ channel
//!     └──────────── await_completion(timeout) ◀────────────────────┘
//! ```
//!
//! On timeout the group's [`CancelToken`] is tripped: queued tasks are
//! skipped and running tasks stop at their next cancellation check. Results
//! already produced are kept (best effort).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::{error, warn};

use crate::error::{HashError, Result};

/// Shared comparison/progress counters.
///
/// Cloning is cheap and every clone observes the same counts, so one
/// `Counters` can be handed to every worker of a search call.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    inner: Arc<CounterState>,
}

#[derive(Debug, Default)]
struct CounterState {
    comparisons: AtomicU64,
    documents: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_comparisons(&self, n: u64) {
        self.inner.comparisons.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_documents(&self, n: u64) {
        self.inner.documents.fetch_add(n, Ordering::Relaxed);
    }

    /// Pairwise metric evaluations performed so far.
    pub fn comparisons(&self) -> u64 {
        self.inner.comparisons.load(Ordering::Relaxed)
    }

    /// Documents (or buckets) fully processed so far.
    pub fn documents(&self) -> u64 {
        self.inner.documents.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.inner.comparisons.store(0, Ordering::Relaxed);
        self.inner.documents.store(0, Ordering::Relaxed);
    }
}

/// `1 - approx / exact`: the fraction of exhaustive comparisons avoided.
///
/// Returns 0.0 when the exhaustive count is zero.
pub fn efficiency(approx_comparisons: u64, exact_comparisons: u64) -> f64 {
    if exact_comparisons == 0 {
        return 0.0;
    }
    1.0 - approx_comparisons as f64 / exact_comparisons as f64
}

/// Cooperative cancellation flag shared by one task group.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Outcome of [`TaskGroup::await_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub submitted: usize,
    pub finished: usize,
    pub timed_out: bool,
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        !self.timed_out && self.finished == self.submitted
    }

    /// Convert a timed-out completion into [`HashError::Timeout`].
    pub fn into_result(self) -> Result<Self> {
        if self.timed_out {
            return Err(HashError::Timeout {
                finished: self.finished,
                submitted: self.submitted,
            });
        }
        Ok(self)
    }
}

/// Fixed-size worker pool with a wall-clock bound per task group.
pub struct ParallelComparator {
    pool: rayon::ThreadPool,
    threads: usize,
    timeout: Duration,
}

impl ParallelComparator {
    /// Create a pool of `threads` workers; every group waits at most `timeout`.
    pub fn new(threads: usize, timeout: Duration) -> Result<Self> {
        if threads == 0 {
            return Err(HashError::config("worker pool needs at least one thread"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("hierhash-worker-{i}"))
            .panic_handler(|_| error!("comparison task panicked"))
            .build()
            .map_err(|e| HashError::config(format!("failed to build worker pool: {e}")))?;
        Ok(Self {
            pool,
            threads,
            timeout,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a new group of tasks on this pool.
    pub fn group(&self) -> TaskGroup<'_> {
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        TaskGroup {
            pool: &self.pool,
            timeout: self.timeout,
            submitted: 0,
            done_tx,
            done_rx,
            cancel: CancelToken::default(),
        }
    }
}

impl std::fmt::Debug for ParallelComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelComparator")
            .field("threads", &self.threads)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Signals completion when dropped, so a panicking task still counts as done.
struct DoneGuard(Sender<()>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// A set of independent tasks joined by [`TaskGroup::await_completion`].
pub struct TaskGroup<'p> {
    pool: &'p rayon::ThreadPool,
    timeout: Duration,
    submitted: usize,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
    cancel: CancelToken,
}

impl TaskGroup<'_> {
    /// Submit a task. Tasks should poll the token inside long loops.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: FnOnce(&CancelToken) + Send + 'static,
    {
        self.submitted += 1;
        let guard = DoneGuard(self.done_tx.clone());
        let cancel = self.cancel.clone();
        self.pool.spawn(move || {
            let _guard = guard;
            if !cancel.is_cancelled() {
                task(&cancel);
            }
        });
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Block until every task finished or the pool timeout elapsed.
    pub fn await_completion(self) -> Completion {
        let timeout = self.timeout;
        self.await_completion_within(timeout)
    }

    /// Like [`TaskGroup::await_completion`] with an explicit bound.
    pub fn await_completion_within(self, timeout: Duration) -> Completion {
        let deadline = Instant::now() + timeout;
        let mut finished = 0;
        while finished < self.submitted {
            match self.done_rx.recv_deadline(deadline) {
                Ok(()) => finished += 1,
                Err(_) => {
                    self.cancel.cancel();
                    warn!(
                        finished,
                        submitted = self.submitted,
                        "worker pool deadline exceeded, abandoning remaining tasks"
                    );
                    return Completion {
                        submitted: self.submitted,
                        finished,
                        timed_out: true,
                    };
                }
            }
        }
        Completion {
            submitted: self.submitted,
            finished,
            timed_out: false,
        }
    }
}
