/// Session identity: who is logged in, and with which token.
///
/// A `Session` is a cheap cloneable handle. Every clone observes the same
/// identity, so login/logout is immediately visible to the remote client,
/// the ownership checks and the views.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use super::store::LocalStore;
use crate::error::CacheError;

const SESSION_KEY: &str = "session";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub token: Option<String>,
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        self.user_id.as_deref().unwrap_or("").is_empty()
            && self.display_name.as_deref().unwrap_or("").is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    identity: Arc<RwLock<Identity>>,
    store: Option<Arc<LocalStore>>,
}

impl Session {
    /// Session that lives only in memory
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Arc::new(RwLock::new(identity)),
            store: None,
        }
    }

    /// Session backed by the local store, restoring any saved identity
    pub fn restore(store: Arc<LocalStore>) -> Result<Self, CacheError> {
        let identity = match store.get(SESSION_KEY)? {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!("Discarding unreadable saved session: {}", e);
                Identity::default()
            }),
            None => Identity::default(),
        };

        Ok(Self {
            identity: Arc::new(RwLock::new(identity)),
            store: Some(store),
        })
    }

    /// Snapshot of the live identity
    pub fn identity(&self) -> Identity {
        self.identity
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn token(&self) -> Option<String> {
        self.identity().token.filter(|t| !t.is_empty())
    }

    pub fn login(&self, identity: Identity) -> Result<(), CacheError> {
        if let Some(store) = &self.store {
            store.set(SESSION_KEY, &serde_json::to_string(&identity)?)?;
        }
        info!(
            user = identity.display_name.as_deref().unwrap_or("?"),
            "🔑 Logged in"
        );
        self.replace(identity);
        Ok(())
    }

    pub fn logout(&self) -> Result<(), CacheError> {
        if let Some(store) = &self.store {
            store.remove(SESSION_KEY)?;
        }
        info!("Logged out");
        self.replace(Identity::default());
        Ok(())
    }

    fn replace(&self, identity: Identity) {
        match self.identity.write() {
            Ok(mut guard) => *guard = identity,
            Err(poisoned) => *poisoned.into_inner() = identity,
        }
    }
}
