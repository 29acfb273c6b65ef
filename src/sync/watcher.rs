/// Cross-tab change detection
///
/// Every tab holds its own connection to the shared local store. The
/// watcher polls that connection's `data_version`, which only moves when
/// a *different* connection commits, and turns each move into a
/// `StorageChanged` event on this tab's broadcaster. Changes made by this
/// tab never echo back to it.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::broadcast::{SyncBroadcaster, SyncEvent};
use crate::state::LocalStore;

pub struct StorageWatcher {
    store: Arc<LocalStore>,
    events: SyncBroadcaster,
    interval: Duration,
}

impl StorageWatcher {
    pub fn new(store: Arc<LocalStore>, events: SyncBroadcaster, interval: Duration) -> Self {
        Self { store, events, interval }
    }

    /// Spawn the polling loop; abort the handle to stop it
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut last_seen = match self.store.data_version() {
            Ok(version) => version,
            Err(e) => {
                warn!("Storage watcher disabled: {}", e);
                return;
            }
        };

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;

            match self.store.data_version() {
                Ok(version) if version != last_seen => {
                    debug!(version, "Shared store changed in another tab");
                    last_seen = version;
                    self.events.publish(SyncEvent::StorageChanged { timestamp: Utc::now() });
                }
                Ok(_) => {}
                Err(e) => warn!("Storage watcher poll failed: {}", e),
            }
        }
    }
}
