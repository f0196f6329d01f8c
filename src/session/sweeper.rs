//! # Background Session Sweeper
//!
//! Drives `SessionRegistry::sweep` on a fixed interval from a tokio task. The task is
//! owned by a `SessionSweeper` handle. Dropping the handle ends the task at its next
//! wakeup; `stop()` also waits for an in-flight cycle to finish (main calls it during
//! graceful shutdown).
//!
//! The sweep itself walks the filesystem, so each cycle runs on the blocking pool.

use crate::session::registry::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to the running periodic sweep.
pub struct SessionSweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SessionSweeper {
    /// Spawn the periodic sweep. The first cycle runs one `interval` after start.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(registry: Arc<SessionRegistry>, interval: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs_f64(),
                max_age_secs = registry.max_age().as_secs_f64(),
                "Session sweeper started"
            );

            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let registry = Arc::clone(&registry);
                        if let Err(e) = tokio::task::spawn_blocking(move || registry.sweep()).await {
                            warn!(error = %e, "Session sweep task failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        // A closed channel means the handle is gone; treat it as a stop
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Session sweeper loop exited");
        });

        Self { shutdown, handle }
    }

    /// Signal the task to stop and wait for it to finish its current cycle.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Session sweeper did not shut down cleanly");
        }
        info!("Session sweeper stopped");
    }

    /// Whether the background task is still running.
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}
