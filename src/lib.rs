//! Canopy: tree-photo verification and sync engine
//!
//! A submitted photo is verified by the classifier gateway, written
//! optimistically through the reconciliation engine to the remote store
//! and the local cache, and every view re-reads through the engine when
//! the sync broadcaster says something changed.

pub mod classify;
pub mod config;
pub mod error;
pub mod ownership;
pub mod remote;
pub mod state;
pub mod submission;
pub mod sync;
pub mod views;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use classify::ClassifierGateway;
use config::AppConfig;
use error::InitError;
use remote::{HttpTreeStore, RemoteTreeStore};
use state::{CacheManager, LocalStore, Session};
use submission::{LocationCatalog, Submission};
use sync::{ReconciliationEngine, StorageWatcher, SyncBroadcaster};
use views::ViewSet;

/// Everything one tab needs, built once at startup
pub struct App {
    pub config: AppConfig,
    pub store: Arc<LocalStore>,
    pub session: Session,
    pub gateway: ClassifierGateway,
    pub engine: Arc<ReconciliationEngine>,
    pub views: ViewSet,
    pub locations: LocationCatalog,
}

impl App {
    /// Open the local store, restore the session and connect to the
    /// configured remote store
    pub fn init(config: AppConfig) -> Result<Self, InitError> {
        let store = Arc::new(LocalStore::open(&config.database_path()?)?);
        let session = Session::restore(Arc::clone(&store))?;
        let remote = Arc::new(HttpTreeStore::new(&config.api_base, session.clone())?);
        info!("🌍 Remote tree store: {}", config.api_base);

        Ok(Self::assemble(config, store, session, remote))
    }

    /// Wire the components around an already-built store and remote
    pub fn assemble(
        config: AppConfig,
        store: Arc<LocalStore>,
        session: Session,
        remote: Arc<dyn RemoteTreeStore>,
    ) -> Self {
        let gateway = ClassifierGateway::init(config.model_path.as_deref());
        let locations = LocationCatalog::load(config.locations_path.as_deref());
        let events = SyncBroadcaster::new(config.event_capacity);
        let engine = Arc::new(ReconciliationEngine::new(
            remote,
            CacheManager::new(Arc::clone(&store)),
            session.clone(),
            events,
        ));
        let views = ViewSet::new(Arc::clone(&engine), config.co2_per_tree_kg);

        Self {
            config,
            store,
            session,
            gateway,
            engine,
            views,
            locations,
        }
    }

    /// A fresh submission workflow
    pub fn submission(&self) -> Submission<'_> {
        Submission::new(&self.gateway, &self.engine, &self.locations)
    }

    /// Start watching for changes made by other tabs
    pub fn watch_storage(&self) -> JoinHandle<()> {
        StorageWatcher::new(
            Arc::clone(&self.store),
            self.engine.events().clone(),
            Duration::from_millis(self.config.storage_poll_ms),
        )
        .spawn()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("store", &self.store)
            .field("classifier", &self.gateway.variant())
            .finish()
    }
}
