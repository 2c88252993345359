//! Background task pool for replication work.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use crate::error::Result;

/// A multi-threaded Tokio runtime that runs fan-out and recovery tasks.
///
/// Submitters never wait for the tasks they spawn. Once [`shutdown`] has run,
/// further submissions are refused; tasks already running are abandoned
/// rather than joined, so shutting down can never block on replication work.
///
/// [`shutdown`]: ReplicationPool::shutdown
pub struct ReplicationPool {
    runtime: Mutex<Option<Runtime>>,
}

impl ReplicationPool {
    pub fn new(workers: usize) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name("replication-worker")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
        })
    }

    /// Spawns `task` in the background. Returns `false` after shutdown.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        match runtime.as_ref() {
            Some(runtime) => {
                runtime.spawn(task);
                true
            }
            None => {
                debug!("replication pool is shut down, dropping task");
                false
            }
        }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stops accepting tasks and releases the worker threads. Idempotent.
    pub fn shutdown(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
            info!("replication pool shut down");
        }
    }
}

impl Drop for ReplicationPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn runs_tasks_until_shutdown() {
        let pool = ReplicationPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();
        assert!(pool.spawn(async move {
            let _ = tx.send(42);
        }));
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(42));

        pool.shutdown();
        pool.shutdown();
        assert!(!pool.is_running());
        assert!(!pool.spawn(async {}));
    }
}
