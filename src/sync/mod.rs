/// Synchronization module
///
/// Keeps the local cache consistent with the remote store and tells
/// dependent views when to re-read:
/// - Reconciliation of reads, writes and deletes (engine.rs)
/// - In-tab publish/subscribe of changes (broadcast.rs)
/// - Detection of changes made by other tabs (watcher.rs)

pub mod engine;
pub mod broadcast;
pub mod watcher;

pub use broadcast::{ChangeCause, ScopeState, SyncBroadcaster, SyncEvent};
pub use engine::{DeleteOutcome, ReconciliationEngine, WriteOutcome};
pub use watcher::StorageWatcher;
