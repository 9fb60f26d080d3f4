//! Bounded admission pool for incoming connections.
//!
//! At most `workers` connections are served at once. Up to `queue` more may
//! be admitted and wait for a worker slot; anything beyond that is rejected
//! before a single byte is read from it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::trace;

/// Process-wide connection admission pool.
#[derive(Debug)]
pub struct AdmissionPool {
    /// Worker slots. Never closed.
    workers: Arc<Semaphore>,
    worker_count: usize,
    /// Admitted connections, running or waiting for a slot.
    outstanding: AtomicUsize,
    /// `worker_count + queue`.
    limit: usize,
}

impl AdmissionPool {
    /// Create a pool with `workers` concurrent slots and `queue` waiting slots.
    ///
    /// `workers` is clamped to at least 1.
    pub fn new(workers: usize, queue: usize) -> Arc<Self> {
        let workers = workers.max(1);
        Arc::new(Self {
            workers: Arc::new(Semaphore::new(workers)),
            worker_count: workers,
            outstanding: AtomicUsize::new(0),
            limit: workers.saturating_add(queue),
        })
    }

    /// Try to admit one more connection.
    ///
    /// Returns `None` when running plus waiting connections already reach
    /// `workers + queue`.
    pub fn try_admit(self: &Arc<Self>) -> Option<Admission> {
        let admitted = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok();
        admitted.then(|| Admission { pool: self.clone() })
    }

    /// Admitted connections, running or waiting.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Connections currently holding a worker slot.
    pub fn running(&self) -> usize {
        self.worker_count - self.workers.available_permits()
    }

    /// Maximum number of admitted connections.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// A reserved place in the pool. Dropping it releases the place.
#[derive(Debug)]
pub struct Admission {
    pool: Arc<AdmissionPool>,
}

impl Admission {
    /// Spawn `work` once a worker slot is free.
    ///
    /// The admission is held until `work` completes.
    pub fn spawn<F>(self, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let Ok(_permit) = self.pool.workers.clone().acquire_owned().await else {
                return;
            };
            trace!(running = self.pool.running(), "worker slot acquired");
            work.await;
            drop(self);
        })
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}
