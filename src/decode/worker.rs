//! Decode worker pool and scoped worker handles.
//!
//! A [`Worker`] is acquired before a decode starts and must be released when
//! the caller is done with the result. Release happens through
//! [`Worker::terminate`] on the happy path and through `Drop` on every other
//! path (early `?` returns, errors converted by the caller, panics).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::DecodeError;

/// Default number of concurrent decode workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Bounded pool of decode workers.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    live: Arc<AtomicUsize>,
    next_id: Arc<AtomicUsize>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            live: Arc::new(AtomicUsize::new(0)),
            next_id: Arc::new(AtomicUsize::new(0)),
            size,
        }
    }

    /// Wait for a free slot and start a worker.
    pub async fn acquire(&self) -> Result<Worker, DecodeError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| DecodeError::Worker(e.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        debug!(worker = id, "worker started");
        Ok(Worker {
            id,
            permit: Some(permit),
            live: self.live.clone(),
        })
    }

    /// Number of workers acquired and not yet released.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

/// Handle to a running decode worker.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    permit: Option<OwnedSemaphorePermit>,
    live: Arc<AtomicUsize>,
}

impl Worker {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_live(&self) -> bool {
        self.permit.is_some()
    }

    /// Release the worker.
    pub fn terminate(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(permit) = self.permit.take() {
            drop(permit);
            self.live.fetch_sub(1, Ordering::SeqCst);
            debug!(worker = self.id, "worker terminated");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.release();
    }
}

/// A decode result together with the worker that produced it.
#[derive(Debug)]
pub struct Decoded<T> {
    pub data: T,
    pub worker: Worker,
}

impl<T> Decoded<T> {
    /// Terminate the worker and keep the data.
    pub fn into_data(self) -> T {
        let Decoded { data, worker } = self;
        worker.terminate();
        data
    }
}
