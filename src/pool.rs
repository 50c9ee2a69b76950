//! Bounded worker pool with deterministic shutdown.
//!
//! The cost model fans feature extraction and tree fitting out over a
//! fixed-size [`rayon`] pool. Dropping a rayon pool only *signals* its
//! threads to terminate; [`WorkerPool::close`] additionally waits until
//! every worker thread has actually exited, so tuning code can release OS
//! resources at a known point instead of at some later drop.
//!
//! After `close`, [`WorkerPool::install`] returns [`Error::PoolClosed`].

use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

/// Default time `close` waits for worker threads to exit.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of live worker threads, signalled on every thread exit.
type LiveThreads = Arc<(Mutex<usize>, Condvar)>;

/// A fixed-size pool of worker threads with an explicit `close`.
pub struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
    live: LiveThreads,
    num_threads: usize,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Spawns a pool of `num_threads` workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidThreadCount`] if `num_threads` is zero and
    /// [`Error::PoolBuild`] if the threads cannot be spawned.
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(Error::InvalidThreadCount);
        }

        // Counted up front so `close` cannot observe zero before a worker
        // has started.
        let live: LiveThreads = Arc::new((Mutex::new(num_threads), Condvar::new()));
        let on_exit = Arc::clone(&live);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("autotuner-worker-{i}"))
            .exit_handler(move |_| {
                let (count, cvar) = &*on_exit;
                let mut n = count.lock();
                *n = n.saturating_sub(1);
                cvar.notify_all();
            })
            .build()
            .map_err(|e| Error::PoolBuild(e.to_string()))?;

        trace_debug!(num_threads, "worker pool started");

        Ok(Self {
            pool: Some(pool),
            live,
            num_threads,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        })
    }

    /// Sets how long [`close`](Self::close) waits for workers to exit.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Number of worker threads the pool was created with.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Number of worker threads that have not exited yet.
    #[must_use]
    pub fn live_threads(&self) -> usize {
        *self.live.0.lock()
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pool.is_none()
    }

    /// Runs `op` inside the pool, so rayon parallel iterators in `op` use
    /// this pool's workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] if the pool has been closed.
    pub fn install<OP, R>(&self, op: OP) -> Result<R>
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool
            .as_ref()
            .map(|pool| pool.install(op))
            .ok_or(Error::PoolClosed)
    }

    /// Releases the pool and waits for every worker thread to exit.
    ///
    /// Calling `close` more than once is allowed; later calls return
    /// `Ok(())` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolShutdownTimeout`] if some workers are still alive
    /// after the shutdown timeout. The pool counts as closed either way.
    pub fn close(&mut self) -> Result<()> {
        let Some(pool) = self.pool.take() else {
            return Ok(());
        };
        drop(pool);

        let deadline = Instant::now() + self.shutdown_timeout;
        let (count, cvar) = &*self.live;
        let mut remaining = count.lock();
        while *remaining > 0 {
            if cvar.wait_until(&mut remaining, deadline).timed_out() {
                break;
            }
        }

        if *remaining > 0 {
            return Err(Error::PoolShutdownTimeout {
                remaining: *remaining,
            });
        }

        trace_debug!(num_threads = self.num_threads, "worker pool closed");
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(_e) = self.close() {
            trace_warn!(error = %_e, "worker pool did not shut down cleanly");
        }
    }
}

impl core::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .field("closed", &self.is_closed())
            .field("live_threads", &self.live_threads())
            .finish_non_exhaustive()
    }
}

/// Resolve an optional thread count to a concrete one.
///
/// `None` means "use the available hardware parallelism".
pub(crate) fn resolve_num_threads(requested: Option<usize>) -> Result<usize> {
    match requested {
        Some(0) => Err(Error::InvalidThreadCount),
        Some(n) => Ok(n),
        None => Ok(std::thread::available_parallelism().map_or(1, core::num::NonZeroUsize::get)),
    }
}
