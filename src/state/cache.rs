/// Cache Manager
///
/// Holds the last-known collection per scope. Pure storage: no network
/// access, and every operation is a whole-collection replace or append.

use std::sync::Arc;
use tracing::debug;

use super::data::{Scope, Tree};
use super::store::LocalStore;
use crate::error::CacheError;

#[derive(Debug, Clone)]
pub struct CacheManager {
    store: Arc<LocalStore>,
}

impl CacheManager {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Last stored snapshot for a scope, or None if nothing was ever stored
    pub fn get(&self, scope: Scope) -> Result<Option<Vec<Tree>>, CacheError> {
        match self.store.get(scope.cache_key())? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Replace the whole collection for a scope
    ///
    /// Writing an identical collection is skipped so that no change
    /// notification reaches other tabs.
    pub fn replace(&self, scope: Scope, records: &[Tree]) -> Result<(), CacheError> {
        let json = serde_json::to_string(records)?;
        if self.store.get(scope.cache_key())?.as_deref() == Some(json.as_str()) {
            debug!(scope = %scope, "Cache unchanged, skipping write");
            return Ok(());
        }

        self.store.set(scope.cache_key(), &json)?;
        debug!(scope = %scope, count = records.len(), "Cache replaced");
        Ok(())
    }

    /// Append one record to the end of a scope's collection
    pub fn append(&self, scope: Scope, record: Tree) -> Result<(), CacheError> {
        let mut records = self.get(scope)?.unwrap_or_default();
        records.push(record);
        self.store.set(scope.cache_key(), &serde_json::to_string(&records)?)?;
        debug!(scope = %scope, count = records.len(), "Cache appended");
        Ok(())
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }
}
