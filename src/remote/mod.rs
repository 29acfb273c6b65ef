/// Remote tree store
///
/// The authoritative server is reached through the `RemoteTreeStore`
/// trait so the reconciliation engine never depends on a transport:
/// - `http.rs` - JSON over HTTP with bearer auth
/// - `wire.rs` - normalization of server payloads into `Tree`

pub mod http;
pub mod wire;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::state::{NewTree, Scope, Tree, TreeId};

pub use http::HttpTreeStore;

/// CRUD access to the authoritative store
///
/// The server is the sole arbiter of delete authorization.
#[async_trait]
pub trait RemoteTreeStore: Send + Sync {
    async fn list(&self, scope: Scope) -> Result<Vec<Tree>, RemoteError>;

    /// Create a tree; the returned record carries the canonical id
    async fn create(&self, tree: &NewTree) -> Result<Tree, RemoteError>;

    async fn delete(&self, id: &TreeId) -> Result<(), RemoteError>;
}
