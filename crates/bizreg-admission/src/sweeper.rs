//! Background idle-entry eviction.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::AdmissionRegistry;

/// Handle to the sweeper task. Dropping it signals the task to stop.
#[derive(Debug)]
pub struct Sweeper {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn a task calling `registry.sweep()` every `interval`.
    pub fn spawn(registry: Arc<AdmissionRegistry>, interval: Duration) -> Self {
        let (stop, mut stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    // Resolves on an explicit stop and when the handle is dropped.
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let evicted = registry.sweep();
                        if evicted > 0 {
                            tracing::debug!(evicted, remaining = registry.len(), "evicted idle clients");
                        }
                    }
                }
            }
            tracing::info!("admission sweeper stopped");
        });
        Self {
            stop: Some(stop),
            task: Some(task),
        }
    }

    /// Signal the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "admission sweeper ended abnormally");
            }
        }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
