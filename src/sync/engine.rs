//! Reconciliation engine
//!
//! Orchestrates reads, writes and deletes across the local cache and the
//! remote store. Reads never fail: a remote failure degrades to the last
//! cached snapshot. Writes are optimistic. Deletes are ownership-gated
//! locally before the server is contacted, and fall back to a local-only
//! removal when the server is unreachable.
//!
//! There is no outbox. A write the server never acknowledged lives only in
//! the local cache, keeps its tentative id, and disappears on the next
//! successful read of its scope.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::broadcast::{ChangeCause, ScopeState, SyncBroadcaster};
use crate::error::{CacheError, DeleteError, RemoteError};
use crate::ownership::is_owner;
use crate::remote::RemoteTreeStore;
use crate::state::{CacheManager, NewTree, Scope, Session, Tree, TreeId};

/// Result of an optimistic write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The server stored the tree; caches were resynchronized
    Confirmed(Tree),
    /// The server call failed; the tentative record is cached locally only
    Deferred { record: Tree, cause: RemoteError },
}

/// Result of an authorized delete
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The server deleted the tree; caches were resynchronized
    Deleted,
    /// Removed from the local cache only. `cause` is the remote failure,
    /// or None for a tentative record the server never had.
    LocallyRemoved { cause: Option<RemoteError> },
}

pub struct ReconciliationEngine {
    remote: Arc<dyn RemoteTreeStore>,
    cache: CacheManager,
    session: Session,
    events: SyncBroadcaster,
    states: Mutex<HashMap<Scope, ScopeState>>,
}

impl ReconciliationEngine {
    pub fn new(
        remote: Arc<dyn RemoteTreeStore>,
        cache: CacheManager,
        session: Session,
        events: SyncBroadcaster,
    ) -> Self {
        Self {
            remote,
            cache,
            session,
            events,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn events(&self) -> &SyncBroadcaster {
        &self.events
    }

    /// Current reconciliation state of a scope
    pub fn state(&self, scope: Scope) -> ScopeState {
        self.states
            .lock()
            .map(|states| states.get(&scope).copied())
            .unwrap_or_else(|poisoned| poisoned.into_inner().get(&scope).copied())
            .unwrap_or(ScopeState::Empty)
    }

    fn set_state(&self, scope: Scope, state: ScopeState) {
        match self.states.lock() {
            Ok(mut states) => states.insert(scope, state),
            Err(poisoned) => poisoned.into_inner().insert(scope, state),
        };
    }

    /// Read a scope, degrading to the cached snapshot on remote failure
    pub async fn read(&self, scope: Scope) -> Vec<Tree> {
        let (trees, state) = match self.remote.list(scope).await {
            Ok(trees) => match self.cache.replace(scope, &trees) {
                Ok(()) => (trees, ScopeState::Fresh),
                Err(e) => {
                    warn!(scope = %scope, "Could not cache remote trees: {}", e);
                    (trees, self.state(scope))
                }
            },
            Err(remote_err) => {
                warn!(scope = %scope, "Remote read failed, serving cache: {}", remote_err);
                match self.cache.get(scope) {
                    Ok(Some(snapshot)) => (snapshot, ScopeState::Cached),
                    Ok(None) => (Vec::new(), ScopeState::Empty),
                    Err(e) => {
                        warn!(scope = %scope, "Cache unreadable: {}", e);
                        (Vec::new(), ScopeState::Empty)
                    }
                }
            }
        };

        self.set_state(scope, state);
        debug!(scope = %scope, count = trees.len(), ?state, "Read settled");
        self.events.collection_changed(scope, ChangeCause::Read(state));
        trees
    }

    /// Optimistic write of a verified tree
    ///
    /// The tentative record is appended to every scope before the server
    /// is asked, so it is visible while the create is in flight. On
    /// success every scope is re-read so the canonical record replaces the
    /// tentative one. A failed append only matters when the server call
    /// also failed: then the local copy is all there is.
    pub async fn write(&self, tree: NewTree) -> Result<WriteOutcome, CacheError> {
        let local = self.local_record(&tree);
        let appended = Scope::EVERY
            .into_iter()
            .try_for_each(|scope| self.append_tentative(scope, local.clone()));

        match self.remote.create(&tree).await {
            Ok(canonical) => {
                info!(id = %canonical.id, "🌳 Tree stored remotely");
                if let Err(e) = appended {
                    warn!(id = %canonical.id, "Local append failed, resyncing from server: {}", e);
                }
                for scope in Scope::EVERY {
                    self.read(scope).await;
                }
                for scope in Scope::EVERY {
                    self.events.collection_changed(scope, ChangeCause::Write);
                }
                Ok(WriteOutcome::Confirmed(canonical))
            }
            Err(cause) => {
                appended?;
                warn!(id = %local.id, "Remote create failed, kept locally only: {}", cause);
                Ok(WriteOutcome::Deferred { record: local, cause })
            }
        }
    }

    /// Ownership-gated delete
    pub async fn delete(&self, id: &TreeId) -> Result<DeleteOutcome, DeleteError> {
        let cached = self.find_cached(id)?;

        // Fast-path guard: a known record the session doesn't own never
        // reaches the server
        if let Some(record) = &cached {
            if !is_owner(record, &self.session.identity()) {
                info!(id = %id, "Delete rejected: not the uploader");
                return Err(DeleteError::Unauthorized);
            }
        }

        let remote_result = if id.is_tentative() {
            None
        } else {
            Some(self.remote.delete(id).await)
        };

        match remote_result {
            Some(Ok(())) => {
                info!(id = %id, "🗑️  Tree deleted remotely");
                for scope in Scope::EVERY {
                    self.read(scope).await;
                }
                for scope in Scope::EVERY {
                    self.events.collection_changed(scope, ChangeCause::Delete);
                }
                Ok(DeleteOutcome::Deleted)
            }
            Some(Err(cause)) => {
                warn!(id = %id, "Remote delete failed: {}", cause);
                self.delete_locally(id, cached.as_ref(), Some(cause))
            }
            None => self.delete_locally(id, cached.as_ref(), None),
        }
    }

    /// Remove a record from the cache only, re-checking ownership against
    /// the cached fields and the identity as it is now
    fn delete_locally(
        &self,
        id: &TreeId,
        cached: Option<&Tree>,
        cause: Option<RemoteError>,
    ) -> Result<DeleteOutcome, DeleteError> {
        let Some(record) = cached else {
            return Err(DeleteError::Remote(cause.unwrap_or(RemoteError::NotFound)));
        };

        if !is_owner(record, &self.session.identity()) {
            return Err(DeleteError::Unauthorized);
        }

        for scope in Scope::EVERY {
            if let Some(records) = self.cache.get(scope)? {
                if records.iter().any(|t| &t.id == id) {
                    let kept: Vec<Tree> = records.into_iter().filter(|t| &t.id != id).collect();
                    self.cache.replace(scope, &kept)?;
                    self.events.collection_changed(scope, ChangeCause::LocalDelete);
                }
            }
        }

        info!(id = %id, "Tree deleted locally only");
        Ok(DeleteOutcome::LocallyRemoved { cause })
    }

    /// Find a record in any cached scope
    fn find_cached(&self, id: &TreeId) -> Result<Option<Tree>, CacheError> {
        for scope in Scope::EVERY {
            if let Some(records) = self.cache.get(scope)? {
                if let Some(found) = records.into_iter().find(|t| &t.id == id) {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    /// Append a tentative record, keeping at most one unacknowledged write
    /// per scope
    fn append_tentative(&self, scope: Scope, record: Tree) -> Result<(), CacheError> {
        if let Some(records) = self.cache.get(scope)? {
            if records.iter().any(|t| t.id.is_tentative()) {
                warn!(scope = %scope, "Dropping previous unacknowledged write");
                let acknowledged: Vec<Tree> =
                    records.into_iter().filter(|t| !t.id.is_tentative()).collect();
                self.cache.replace(scope, &acknowledged)?;
            }
        }
        self.cache.append(scope, record)
    }

    /// The record as this session will display it before the server answers
    fn local_record(&self, tree: &NewTree) -> Tree {
        let identity = self.session.identity();

        Tree {
            id: TreeId::tentative(),
            species: tree.species.clone(),
            photo_ref: tree.photo_ref.clone(),
            latitude: Some(tree.latitude),
            longitude: Some(tree.longitude),
            description: tree.description.clone(),
            confidence: tree.confidence,
            verified: tree.verified,
            planted_at: Utc::now(),
            uploaded_by: Some(
                identity
                    .display_name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            planter_name: tree.planter_name.clone(),
            location: tree.location.clone(),
            user_id: identity.user_id.filter(|id| !id.is_empty()),
        }
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("cache", &self.cache)
            .finish()
    }
}
