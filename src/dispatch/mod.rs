//! Deferred dispatcher
//!
//! Every storage instance owns a dispatcher: a FIFO job queue drained by a single
//! tokio task. Completions and observer notifications are pushed onto it, so they
//! never run inside the call that scheduled them.

mod completion;

pub use completion::Completion;

use crate::error::{StorageError, StorageResult};
use std::panic::{self, AssertUnwindSafe};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// A unit of deferred work
type Job = Box<dyn FnOnce() + Send + 'static>;

/// Deferred job queue
///
/// Jobs run in the order they were scheduled. Dropping the dispatcher closes the
/// queue; jobs already queued still run before the task exits.
pub struct Dispatcher {
    /// Owner name, for log records
    name: String,

    /// Channel to the dispatch task
    job_tx: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    /// Start a dispatch task on the current tokio runtime
    pub fn spawn(name: &str) -> StorageResult<Self> {
        let handle = Handle::try_current().map_err(|_| StorageError::NoRuntime)?;
        let (job_tx, job_rx) = mpsc::unbounded_channel();

        handle.spawn(Self::run_dispatch_loop(name.to_string(), job_rx));
        debug!(storage = name, "Dispatcher started");

        Ok(Dispatcher {
            name: name.to_string(),
            job_tx,
        })
    }

    /// Queue a job to run on a later turn
    pub fn defer<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.job_tx.send(Box::new(job)).is_err() {
            warn!(storage = %self.name, "Dispatch task is gone, deferred job dropped");
        }
    }

    /// Queue a completion turn and return the future that waits for it
    pub fn complete<T>(&self, value: T) -> Completion<T> {
        let (turn_tx, turn_rx) = oneshot::channel();
        self.defer(move || {
            // The caller may have dropped the completion; nothing to deliver then.
            let _ = turn_tx.send(());
        });
        Completion::new(value, turn_rx)
    }

    /// The loop that drains the job queue
    async fn run_dispatch_loop(name: String, mut job_rx: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = job_rx.recv().await {
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!(storage = %name, "Deferred job panicked, continuing with the next one");
            }
        }

        debug!(storage = %name, "Dispatcher shutting down");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_jobs_run_in_order() {
        let dispatcher = Dispatcher::spawn("test").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let log = log.clone();
            dispatcher.defer(move || log.lock().unwrap().push(i));
        }

        dispatcher.complete(()).await;
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_job_does_not_run_inline() {
        let dispatcher = Dispatcher::spawn("test").unwrap();
        let ran = Arc::new(Mutex::new(false));

        let flag = ran.clone();
        dispatcher.defer(move || *flag.lock().unwrap() = true);
        assert!(!*ran.lock().unwrap());

        dispatcher.complete(()).await;
        assert!(*ran.lock().unwrap());
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_queue() {
        let dispatcher = Dispatcher::spawn("test").unwrap();

        dispatcher.defer(|| panic!("observer failure"));
        let value = dispatcher.complete(42).await;

        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_queued_jobs_survive_drop() {
        let dispatcher = Dispatcher::spawn("test").unwrap();
        let (tx, rx) = oneshot::channel();

        dispatcher.defer(move || {
            let _ = tx.send("delivered");
        });
        drop(dispatcher);

        assert_eq!(rx.await.unwrap(), "delivered");
    }

    #[test]
    fn test_spawn_without_runtime() {
        let result = Dispatcher::spawn("test");
        assert!(matches!(result, Err(StorageError::NoRuntime)));
    }
}
