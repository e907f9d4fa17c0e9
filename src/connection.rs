//! Connection management for ghproxy.
//!
//! - Connection admission bounded by a semaphore
//! - Tracking of connection tasks for graceful shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;

/// Tracks spawned connection tasks so shutdown can wait for them.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    tasks: TaskTracker,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self {
            tasks: TaskTracker::new(),
        }
    }

    /// Spawns a connection task and tracks it until it completes.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Number of connection tasks still running.
    pub fn count(&self) -> usize {
        self.tasks.len()
    }

    /// Stops accepting new tasks and waits for running ones, up to `timeout`.
    ///
    /// Returns `true` if all connections finished, `false` if the timeout
    /// was reached first.
    pub async fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        self.tasks.close();
        tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok()
    }
}

/// Outcome of asking the limiter for a connection slot.
#[derive(Debug)]
pub enum Admission {
    /// No limit configured.
    Unlimited,
    /// Slot granted; released when the permit is dropped.
    Admitted(OwnedSemaphorePermit),
    /// All slots in use.
    AtCapacity,
}

impl Admission {
    /// Returns `true` unless the connection must be refused.
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::AtCapacity)
    }
}

/// Bounds the number of concurrently served connections.
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    semaphore: Option<Arc<Semaphore>>,
    max_connections: usize,
}

impl ConnectionLimiter {
    /// Create a new connection limiter.
    /// If max_connections is 0, no limit is enforced.
    pub fn new(max_connections: usize) -> Self {
        let semaphore = (max_connections > 0).then(|| Arc::new(Semaphore::new(max_connections)));
        Self {
            semaphore,
            max_connections,
        }
    }

    /// Check if connection limiting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.semaphore.is_some()
    }

    /// Get the maximum number of connections (0 means unlimited).
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Tries to take a connection slot without waiting.
    pub fn admit(&self) -> Admission {
        match &self.semaphore {
            None => Admission::Unlimited,
            Some(sem) => match sem.clone().try_acquire_owned() {
                Ok(permit) => Admission::Admitted(permit),
                Err(_) => Admission::AtCapacity,
            },
        }
    }
}
