//! Background expiry sweep
//!
//! Periodically purges expired entries from a `CacheManager` on a tokio task,
//! independent of any read or write path.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::CacheManager;

/// Handle for controlling the background sweep task
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheManager {
    /// Spawns a task that purges expired entries every `interval`
    ///
    /// Must be called from within a tokio runtime. The task runs until
    /// `SweeperHandle::shutdown` is called or the handle is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let cache = self.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the first tick (immediate)
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            log::debug!("Cache sweep removed {purged} expired entries");
                        }
                    }
                    // Fires on an explicit shutdown or when the handle is dropped
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx, task }
    }
}

impl SweeperHandle {
    /// Stops the sweep task and waits for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}
