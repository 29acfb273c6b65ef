/// State management module
///
/// This module handles all local application state:
/// - The resilient key/value store (store.rs)
/// - Cached tree collections per scope (cache.rs)
/// - Session identity (session.rs)
/// - Shared data structures (data.rs)

pub mod store;
pub mod cache;
pub mod session;
pub mod data;

pub use cache::CacheManager;
pub use data::{NewTree, Scope, Tree, TreeId};
pub use session::{Identity, Session};
pub use store::LocalStore;
