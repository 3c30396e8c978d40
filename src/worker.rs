// src/worker.rs - Periodic background tasks with cooperative shutdown
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A tokio task calling `step` once per interval until stopped.
///
/// Missed ticks are skipped rather than bunched up, so a slow cycle only
/// delays the next one.
pub struct PeriodicWorker {
    name: &'static str,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl PeriodicWorker {
    /// Spawn onto the current tokio runtime.
    pub fn spawn<F>(name: &'static str, period: Duration, mut step: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!("{} loop started ({:?} period)", name, period);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::info!("{} loop shutting down", name);
                        break;
                    }
                    _ = interval.tick() => step(),
                }
            }
        });
        Self {
            name,
            shutdown_tx,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the task and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            tracing::error!("{} loop terminated abnormally: {}", self.name, e);
        }
    }
}
