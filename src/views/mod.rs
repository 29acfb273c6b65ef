/// Dependent views
///
/// Everything a user looks at is derived from `ReconciliationEngine::read`,
/// never from the cache directly:
/// - Dashboard statistics (dashboard.rs)
/// - Map markers and bounds (map.rs)
/// - Gallery of the session's own trees (gallery.rs)
/// - Planter leaderboard (leaderboard.rs)

pub mod dashboard;
pub mod map;
pub mod gallery;
pub mod leaderboard;

use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::state::Scope;
use crate::sync::ReconciliationEngine;
pub use dashboard::DashboardStats;
pub use gallery::GalleryCard;
pub use leaderboard::LeaderboardEntry;
pub use map::{MapView, MarkerStatus};

/// All views, derived from one read per scope
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub dashboard: DashboardStats,
    pub map: MapView,
    pub my_map: MapView,
    pub gallery: Vec<GalleryCard>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone)]
pub struct ViewSet {
    engine: Arc<ReconciliationEngine>,
    co2_per_tree_kg: f64,
}

impl ViewSet {
    pub fn new(engine: Arc<ReconciliationEngine>, co2_per_tree_kg: f64) -> Self {
        Self { engine, co2_per_tree_kg }
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    pub async fn dashboard(&self) -> DashboardStats {
        let trees = self.engine.read(Scope::All).await;
        DashboardStats::from_trees(&trees, self.co2_per_tree_kg)
    }

    pub async fn map(&self, scope: Scope) -> MapView {
        let trees = self.engine.read(scope).await;
        MapView::from_trees(scope, &trees)
    }

    pub async fn gallery(&self) -> Vec<GalleryCard> {
        let trees = self.engine.read(Scope::Mine).await;
        gallery::cards(&trees, &self.engine.session().identity())
    }

    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let trees = self.engine.read(Scope::All).await;
        leaderboard::rank(&trees)
    }

    /// Every view at once. Views over the same scope share one read, so
    /// their counts always agree.
    pub async fn snapshot(&self) -> ViewSnapshot {
        let all = self.engine.read(Scope::All).await;
        let mine = self.engine.read(Scope::Mine).await;
        let identity = self.engine.session().identity();

        ViewSnapshot {
            dashboard: DashboardStats::from_trees(&all, self.co2_per_tree_kg),
            map: MapView::from_trees(Scope::All, &all),
            my_map: MapView::from_trees(Scope::Mine, &mine),
            gallery: gallery::cards(&mine, &identity),
            leaderboard: leaderboard::rank(&all),
        }
    }
}

/// Re-derives the views whenever the collection changes in this tab,
/// another tab, or the tab regains focus
pub struct ViewRefresher;

impl ViewRefresher {
    /// Spawn the refresh loop; abort the handle to stop it
    pub fn spawn<F>(views: ViewSet, mut on_refresh: F) -> JoinHandle<()>
    where
        F: FnMut(ViewSnapshot) + Send + 'static,
    {
        let mut rx = views.engine().events().subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.requires_refresh() => {
                        debug!(?event, "Refreshing views");
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "View refresher lagged, refreshing");
                    }
                    Err(RecvError::Closed) => break,
                }

                // One refresh covers everything already queued
                loop {
                    match rx.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Closed) => return,
                    }
                }

                on_refresh(views.snapshot().await);
            }
        })
    }
}
