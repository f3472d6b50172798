//! Cooperative turns. Every continuation runs on a later turn of an
//! [`EventLoop`], never inside the call that scheduled it.
//!
//! The loop is a single-threaded [`LocalPool`]; each scheduled job becomes a
//! ready local task, and tasks spawned in order are polled in order.
//!
use futures::executor::LocalPool;
use futures::task::{LocalSpawn, LocalSpawnExt};
use std::future::Future;

/// Drives scheduled turns. The host owns the loop and decides when to run it.
///
/// # Examples
///
/// ```
/// use deferred_value::{Deferred, Error, EventLoop};
/// let mut event_loop = EventLoop::new();
/// let handle = event_loop.handle();
/// let doubled = Deferred::<i32, Error>::resolved(&handle, 21)
///     .and_then(|v| deferred_value::fulfilled(v * 2));
/// assert_eq!(event_loop.block_on(doubled), Ok(42));
/// ```
pub struct EventLoop {
    pool: LocalPool,
}

/// A clonable reference to an [`EventLoop`] used to schedule turns on it.
#[derive(Clone)]
pub struct Handle {
    spawner: futures::executor::LocalSpawner,
}

impl EventLoop {
    pub fn new() -> Self {
        Self {
            pool: LocalPool::new(),
        }
    }

    pub fn handle(&self) -> Handle {
        Handle {
            spawner: self.pool.spawner(),
        }
    }

    /// Runs every turn that is ready, including turns scheduled by the turns
    /// it runs, until nothing is left to do.
    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled()
    }

    /// Runs at most one turn. Returns `false` if no turn was ready.
    pub fn run_one(&mut self) -> bool {
        self.pool.try_run_one()
    }

    /// Drives turns until `future` completes.
    ///
    /// Awaiting a deferred value that is never settled never returns.
    pub fn block_on<F: Future>(&mut self, future: F) -> F::Output {
        self.pool.run_until(future)
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("open", &self.spawner.status_local().is_ok())
            .finish()
    }
}

impl Handle {
    /// Schedules `job` on the next cooperative turn.
    ///
    /// If the loop has already been dropped the job is discarded.
    pub fn defer(&self, job: impl FnOnce() + 'static) {
        if let Err(err) = self.spawner.spawn_local(async move { job() }) {
            tracing::warn!(error = %err, "event loop is gone, dropping scheduled turn");
        }
    }
}
