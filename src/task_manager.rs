//! Manages the lifecycle of the application's long-running tasks.
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Tracks spawned servers so shutdown can wait for them.
///
/// Every task receives the same shutdown signal through
/// [`TaskManager::get_shutdown_rx`] and is expected to return once it fires.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    /// Spawns a named task and keeps its handle.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        match self.handles.lock() {
            Ok(mut handles) => handles.push((name, handle)),
            Err(poisoned) => poisoned.into_inner().push((name, handle)),
        }
    }

    pub fn get_shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Waits up to `grace` for every task to finish, then aborts the rest.
    pub async fn shutdown(self, grace: Duration) {
        let handles: Vec<_> = match self.handles.lock() {
            Ok(mut handles) => handles.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        info!(
            "TaskManager shutting down. Waiting for {} tasks to complete...",
            handles.len()
        );

        let task_names: Vec<&'static str> = handles.iter().map(|(name, _)| *name).collect();
        let aborts: Vec<_> = handles.iter().map(|(_, handle)| handle.abort_handle()).collect();

        let joined = tokio::time::timeout(
            grace,
            join_all(handles.into_iter().map(|(_, handle)| handle)),
        )
        .await;

        let results = match joined {
            Ok(results) => results,
            Err(_) => {
                warn!(tasks = ?task_names, "Tasks did not stop within {:?}; aborting.", grace);
                for abort in aborts {
                    abort.abort();
                }
                return;
            }
        };

        let mut panicked = Vec::new();
        for (task_name, result) in task_names.into_iter().zip(results) {
            match result {
                Ok(()) => debug!(task_name, "Task shut down gracefully."),
                Err(e) if e.is_panic() => {
                    error!(task_name, "Task panicked during shutdown.");
                    panicked.push(task_name);
                }
                Err(_) => debug!(task_name, "Task was cancelled."),
            }
        }

        if panicked.is_empty() {
            info!("All tasks shut down gracefully.");
        } else {
            error!("{} tasks panicked during shutdown: {:?}", panicked.len(), panicked);
        }
    }
}
