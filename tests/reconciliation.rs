mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use canopy::config::AppConfig;
use canopy::error::{DeleteError, RemoteError};
use canopy::remote::RemoteTreeStore;
use canopy::state::{CacheManager, LocalStore, NewTree, Scope, Session, Tree, TreeId};
use canopy::submission::{SubmissionForm, SubmissionOutcome};
use canopy::sync::{ChangeCause, DeleteOutcome, ScopeState, SyncEvent, WriteOutcome};
use canopy::App;
use common::{green_photo, identity, tree, Harness};

fn form(harness: &Harness) -> SubmissionForm {
    SubmissionForm {
        image_path: green_photo(harness.dir.path()),
        species: "Croton".to_string(),
        planter_name: "Alice".to_string(),
        coordinates: Some((-1.30, 36.80)),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_read_is_idempotent_and_fresh() {
    let h = Harness::logged_in("alice");
    h.remote.seed(tree("t1", "alice"));
    h.remote.seed(tree("t2", "bob"));

    let first = h.app.engine.read(Scope::All).await;
    let second = h.app.engine.read(Scope::All).await;

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(h.app.engine.state(Scope::All), ScopeState::Fresh);
    assert_eq!(h.cached(Scope::All), first);
}

#[tokio::test]
async fn test_read_degrades_to_exact_cached_snapshot() {
    let h = Harness::logged_in("alice");
    h.remote.seed(tree("t1", "alice"));
    let fresh = h.app.engine.read(Scope::All).await;
    let persisted = h.persisted(Scope::All);

    h.remote.seed(tree("t2", "bob"));
    h.remote.set_offline(true);

    let degraded = h.app.engine.read(Scope::All).await;
    assert_eq!(degraded, fresh);
    assert_eq!(h.persisted(Scope::All), persisted);
    assert_eq!(h.app.engine.state(Scope::All), ScopeState::Cached);
}

#[tokio::test]
async fn test_read_without_cache_is_empty() {
    let h = Harness::logged_in("alice");
    h.remote.set_offline(true);

    assert!(h.app.engine.read(Scope::Mine).await.is_empty());
    assert_eq!(h.app.engine.state(Scope::Mine), ScopeState::Empty);
    assert!(h.persisted(Scope::Mine).is_none());
}

#[tokio::test]
async fn test_offline_submission_stays_local() {
    let h = Harness::logged_in("alice");
    h.remote.set_offline(true);

    let mut submission = h.app.submission();
    let outcome = submission.run(form(&h)).await.unwrap();
    assert!(matches!(
        outcome,
        SubmissionOutcome::Stored { write: WriteOutcome::Deferred { .. }, .. }
    ));

    let mine = h.cached(Scope::Mine);
    assert_eq!(mine.len(), 1);
    assert!(mine[0].verified);
    assert!(mine[0].id.is_tentative());
    assert_eq!(mine[0].uploaded_by.as_deref(), Some("alice"));
    assert!(h.remote.trees().is_empty());

    // Connectivity returns: the server never heard of it and nothing is invented
    h.remote.set_offline(false);
    assert!(h.app.engine.read(Scope::Mine).await.is_empty());
    assert!(h.remote.trees().is_empty());
}

#[tokio::test]
async fn test_single_pending_write_per_scope() {
    let h = Harness::logged_in("alice");
    h.remote.set_offline(true);

    for _ in 0..2 {
        h.app.submission().run(form(&h)).await.unwrap();
    }

    for scope in Scope::EVERY {
        let tentative = h.cached(scope).iter().filter(|t| t.id.is_tentative()).count();
        assert_eq!(tentative, 1);
    }
}

#[tokio::test]
async fn test_confirmed_write_replaces_tentative_record() {
    let h = Harness::logged_in("alice");
    let mut rx = h.app.engine.events().subscribe();

    let mut submission = h.app.submission();
    let outcome = submission.run(form(&h)).await.unwrap();
    let SubmissionOutcome::Stored { write: WriteOutcome::Confirmed(canonical), .. } = outcome else {
        panic!("expected confirmed write, got {:?}", outcome);
    };

    let mine = h.cached(Scope::Mine);
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, canonical.id);
    assert_eq!(h.app.engine.state(Scope::Mine), ScopeState::Fresh);

    let mut writes = 0;
    while let Ok(event) = rx.try_recv() {
        if let SyncEvent::CollectionChanged { cause: ChangeCause::Write, .. } = event {
            writes += 1;
        }
    }
    assert_eq!(writes, 2);
}

#[tokio::test]
async fn test_non_owner_delete_is_rejected_before_the_server() {
    let h = Harness::logged_in("alice");
    h.remote.seed(tree("t1", "bob"));
    h.app.engine.read(Scope::All).await;
    let persisted = h.persisted(Scope::All);

    let err = h.app.engine.delete(&TreeId::parse("t1")).await.unwrap_err();

    assert!(matches!(err, DeleteError::Unauthorized));
    assert_eq!(h.remote.delete_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.remote.trees().len(), 1);
    assert_eq!(h.persisted(Scope::All), persisted);
}

#[tokio::test]
async fn test_owner_delete_resynchronizes() {
    let h = Harness::logged_in("alice");
    h.remote.seed(tree("t1", "alice"));
    h.remote.seed(tree("t2", "bob"));
    h.app.engine.read(Scope::All).await;

    let outcome = h.app.engine.delete(&TreeId::parse("t1")).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(h.remote.trees().len(), 1);
    assert_eq!(h.cached(Scope::All).len(), 1);
    assert_eq!(h.app.engine.state(Scope::All), ScopeState::Fresh);
}

#[tokio::test]
async fn test_offline_delete_falls_back_to_local_removal() {
    let h = Harness::logged_in("alice");
    h.remote.seed(tree("t1", "alice"));
    h.remote.seed(tree("t2", "bob"));
    h.app.engine.read(Scope::All).await;
    h.app.engine.read(Scope::Mine).await;
    h.remote.set_offline(true);

    let outcome = h.app.engine.delete(&TreeId::parse("t1")).await.unwrap();

    assert!(matches!(
        outcome,
        DeleteOutcome::LocallyRemoved { cause: Some(RemoteError::Network(_)) }
    ));
    assert_eq!(h.cached(Scope::All).len(), 1);
    assert!(h.cached(Scope::Mine).is_empty());

    // The server never deleted it, so it comes back
    h.remote.set_offline(false);
    assert_eq!(h.app.engine.read(Scope::All).await.len(), 2);
}

#[tokio::test]
async fn test_tentative_delete_never_contacts_the_server() {
    let h = Harness::logged_in("alice");
    h.remote.set_offline(true);
    h.app.submission().run(form(&h)).await.unwrap();
    let id = h.cached(Scope::Mine)[0].id.clone();

    let outcome = h.app.engine.delete(&id).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::LocallyRemoved { cause: None });
    assert_eq!(h.remote.delete_calls.load(Ordering::SeqCst), 0);
    assert!(h.cached(Scope::Mine).is_empty());
    assert!(h.cached(Scope::All).is_empty());
}

#[tokio::test]
async fn test_logout_revokes_delete() {
    let h = Harness::logged_in("alice");
    h.remote.seed(tree("t1", "alice"));
    h.app.engine.read(Scope::All).await;

    h.app.session.logout().unwrap();

    let err = h.app.engine.delete(&TreeId::parse("t1")).await.unwrap_err();
    assert!(matches!(err, DeleteError::Unauthorized));
    assert_eq!(h.remote.trees().len(), 1);
}

#[tokio::test]
async fn test_unknown_record_is_left_to_the_server() {
    let h = Harness::logged_in("alice");

    let err = h.app.engine.delete(&TreeId::parse("ghost")).await.unwrap_err();

    assert!(matches!(err, DeleteError::Remote(RemoteError::NotFound)));
    assert_eq!(h.remote.delete_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_views_agree_after_write() {
    let h = Harness::logged_in("alice");
    h.remote.seed(tree("t1", "bob"));
    h.app.submission().run(form(&h)).await.unwrap();

    let snapshot = h.app.views.snapshot().await;
    let ranked: usize = snapshot.leaderboard.iter().map(|e| e.trees).sum();

    assert_eq!(snapshot.dashboard.total, 2);
    assert_eq!(snapshot.map.markers.len(), 2);
    assert_eq!(ranked, 2);
    assert_eq!(snapshot.gallery.len(), 1);
    assert!(snapshot.gallery[0].can_delete);
}

#[tokio::test]
async fn test_broken_cache_does_not_hide_a_stored_tree() {
    let h = Harness::logged_in("alice");
    rusqlite::Connection::open(h.dir.path().join("canopy.db"))
        .unwrap()
        .execute("DROP TABLE entries", [])
        .unwrap();

    let outcome = h.app.submission().run(form(&h)).await.unwrap();

    assert!(matches!(
        outcome,
        SubmissionOutcome::Stored { write: WriteOutcome::Confirmed(_), .. }
    ));
    assert_eq!(h.remote.trees().len(), 1);
    assert_eq!(h.remote.create_calls.load(Ordering::SeqCst), 1);
}

/// Remote that records what the local cache held when create was called
struct WatchingRemote {
    cache: CacheManager,
    seen_tentative: AtomicUsize,
}

#[async_trait]
impl RemoteTreeStore for WatchingRemote {
    async fn list(&self, _scope: Scope) -> Result<Vec<Tree>, RemoteError> {
        Err(RemoteError::Network("unreachable".to_string()))
    }

    async fn create(&self, _tree: &NewTree) -> Result<Tree, RemoteError> {
        let tentative = self
            .cache
            .get(Scope::Mine)
            .unwrap()
            .unwrap_or_default()
            .iter()
            .filter(|t| t.id.is_tentative())
            .count();
        self.seen_tentative.store(tentative, Ordering::SeqCst);
        Err(RemoteError::Network("unreachable".to_string()))
    }

    async fn delete(&self, _id: &TreeId) -> Result<(), RemoteError> {
        Err(RemoteError::Network("unreachable".to_string()))
    }
}

#[tokio::test]
async fn test_tentative_record_is_visible_while_create_is_pending() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalStore::open(&dir.path().join("canopy.db")).unwrap());
    let remote = Arc::new(WatchingRemote {
        cache: CacheManager::new(Arc::clone(&store)),
        seen_tentative: AtomicUsize::new(0),
    });
    let app = App::assemble(
        AppConfig::default(),
        store,
        Session::new(identity("alice")),
        remote.clone(),
    );

    let write = app
        .engine
        .write(NewTree {
            species: "Croton".to_string(),
            photo_ref: "data:image/png;base64,AAAA".to_string(),
            latitude: -1.3,
            longitude: 36.8,
            description: String::new(),
            confidence: 0.9,
            verified: true,
            planter_name: None,
            location: None,
        })
        .await
        .unwrap();

    assert!(matches!(write, WriteOutcome::Deferred { .. }));
    assert_eq!(remote.seen_tentative.load(Ordering::SeqCst), 1);
}
