use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::trace;

use crate::state::Scope;

/// State of one scope's cache relative to the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// No cache and no successful remote read yet
    Empty,
    /// Serving a possibly stale snapshot because the last remote call failed
    Cached,
    /// Cache mirrors the last successful remote read
    Fresh,
}

/// What caused a collection change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    /// A read settled, leaving the scope in this state
    Read(ScopeState),
    /// The remote store acknowledged a new tree
    Write,
    /// The remote store deleted a tree
    Delete,
    /// A tree was removed from the local cache only
    LocalDelete,
}

/// Events delivered to dependent views
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    CollectionChanged {
        scope: Scope,
        cause: ChangeCause,
        timestamp: DateTime<Utc>,
    },
    /// Another tab committed to the shared store
    StorageChanged { timestamp: DateTime<Utc> },
    /// This tab came back to the foreground
    FocusRegained { timestamp: DateTime<Utc> },
}

impl SyncEvent {
    /// Whether views should re-read in response.
    ///
    /// Plain read completions don't qualify: views react by reading, so
    /// refreshing on reads would feed back into itself.
    pub fn requires_refresh(&self) -> bool {
        !matches!(
            self,
            SyncEvent::CollectionChanged { cause: ChangeCause::Read(_), .. }
        )
    }
}

/// Publish/subscribe channel for collection changes
///
/// Backed by `tokio::sync::broadcast`: publishing never blocks, slow
/// subscribers observe `Lagged` instead of stalling the engine, and
/// publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct SyncBroadcaster {
    tx: broadcast::Sender<SyncEvent>,
}

impl SyncBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SyncEvent) {
        trace!(?event, "Publishing sync event");
        let _ = self.tx.send(event);
    }

    pub fn collection_changed(&self, scope: Scope, cause: ChangeCause) {
        self.publish(SyncEvent::CollectionChanged {
            scope,
            cause,
            timestamp: Utc::now(),
        });
    }

    /// Trigger for a tab regaining focus, so it catches up on changes
    /// made elsewhere while it was in the background
    pub fn focus_regained(&self) {
        self.publish(SyncEvent::FocusRegained { timestamp: Utc::now() });
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
