//! Fixed-size pool of blocking workers.
//!
//! Items are split into contiguous batches, one per worker. Each worker runs
//! on its own blocking thread, builds its per-worker state once (e.g. a
//! loaded classifier) and walks its batch sequentially. Results come back in
//! input order, one per item, whatever happened to the worker.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::future::join_all;

use crate::error::WorkError;

/// Runs batches of items across a fixed number of blocking workers.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// A pool of `workers` threads; zero is treated as one.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Items per worker for a run of `total` items.
    pub fn batch_len(&self, total: usize) -> usize {
        total.div_ceil(self.workers).max(1)
    }

    /// Process `items` and return one result per item, in input order.
    ///
    /// `make_worker` is called once per batch on the worker's thread, so the
    /// worker it returns does not need to be `Send`. A panic while
    /// processing an item becomes that item's error and the worker moves on.
    /// If a worker dies outright, every item of its batch reports
    /// [`WorkError::WorkerLost`].
    pub async fn run<I, O, W, F>(&self, items: Vec<I>, make_worker: Arc<F>) -> Vec<Result<O, WorkError>>
    where
        I: Send + 'static,
        O: Send + 'static,
        W: FnMut(&I) -> Result<O, WorkError>,
        F: Fn() -> W + Send + Sync + 'static,
    {
        if items.is_empty() {
            return Vec::new();
        }

        let batch_len = self.batch_len(items.len());
        let mut batches: Vec<Vec<I>> = Vec::with_capacity(self.workers);
        let mut rest = items.into_iter().peekable();
        while rest.peek().is_some() {
            batches.push(rest.by_ref().take(batch_len).collect());
        }

        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        tracing::debug!(
            "Dispatching {} item(s) to {} worker(s)",
            sizes.iter().sum::<usize>(),
            batches.len()
        );

        let handles = batches.into_iter().map(|batch| {
            let make_worker = Arc::clone(&make_worker);
            tokio::task::spawn_blocking(move || {
                let mut worker = make_worker();
                batch
                    .iter()
                    .map(|item| {
                        panic::catch_unwind(AssertUnwindSafe(|| worker(item)))
                            .unwrap_or_else(|payload| {
                                Err(WorkError::Panicked(panic_message(payload.as_ref())))
                            })
                    })
                    .collect::<Vec<_>>()
            })
        });

        let mut results = Vec::with_capacity(sizes.iter().sum());
        for (joined, size) in join_all(handles).await.into_iter().zip(sizes) {
            match joined {
                Ok(batch) => results.extend(batch),
                Err(e) => {
                    tracing::error!("Worker lost with {size} item(s) in flight: {e}");
                    let reason = e.to_string();
                    results.extend((0..size).map(|_| Err(WorkError::WorkerLost(reason.clone()))));
                }
            }
        }
        results
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
