mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use canopy::config::AppConfig;
use canopy::error::{ClassifyError, SubmitError};
use canopy::state::{LocalStore, Scope, Session};
use canopy::submission::{SubmissionForm, SubmissionOutcome, SubmissionStage};
use canopy::views::ViewRefresher;
use canopy::App;
use common::{green_photo, identity, solid_png, FakeRemote, Harness};

#[tokio::test]
async fn test_verified_photo_walks_every_stage() {
    let h = Harness::logged_in("alice");
    let mut submission = h.app.submission();

    let outcome = submission
        .run(SubmissionForm {
            image_path: green_photo(h.dir.path()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(matches!(outcome, SubmissionOutcome::Stored { .. }));
    assert_eq!(
        submission.history(),
        &[
            SubmissionStage::Input,
            SubmissionStage::ReadingImage,
            SubmissionStage::Classifying,
            SubmissionStage::Verified,
            SubmissionStage::Persisting,
            SubmissionStage::Done,
        ]
    );

    let stored = &h.remote.trees()[0];
    assert_eq!(stored.species, "Unknown");
    assert!(stored.photo_ref.starts_with("data:image/png;base64,"));
    assert!((-1.29..=-1.09).contains(&stored.latitude.unwrap()));
    assert!((36.82..=37.02).contains(&stored.longitude.unwrap()));
}

#[tokio::test]
async fn test_rejected_photo_creates_nothing() {
    let h = Harness::logged_in("alice");
    let path = h.photo("red.png", &solid_png(100, 100, [200, 30, 30]));
    let mut submission = h.app.submission();

    let outcome = submission
        .run(SubmissionForm { image_path: path, ..Default::default() })
        .await
        .unwrap();

    let SubmissionOutcome::Rejected(result) = outcome else {
        panic!("expected rejection, got {:?}", outcome);
    };
    assert!(!result.verified);
    assert_eq!(result.message, "Low confidence (0.0%)");
    assert_eq!(
        &submission.history()[3..],
        &[SubmissionStage::Rejected, SubmissionStage::Done]
    );
    assert_eq!(h.remote.create_calls.load(Ordering::SeqCst), 0);
    assert!(h.persisted(Scope::Mine).is_none());
}

#[tokio::test]
async fn test_undecodable_photo_aborts() {
    let h = Harness::logged_in("alice");
    let path = h.photo("notes.png", b"definitely not an image");
    let mut submission = h.app.submission();

    let err = submission
        .run(SubmissionForm { image_path: path, ..Default::default() })
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Classify(ClassifyError::Decode(_))));
    assert_eq!(submission.stage(), SubmissionStage::Classifying);
    assert_eq!(h.remote.create_calls.load(Ordering::SeqCst), 0);
    assert!(h.persisted(Scope::All).is_none());
}

#[tokio::test]
async fn test_missing_photo_aborts() {
    let h = Harness::logged_in("alice");
    let err = h
        .app
        .submission()
        .run(SubmissionForm {
            image_path: h.dir.path().join("missing.jpg"),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Read(_)));
}

#[tokio::test]
async fn test_named_location_supplies_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("locations.json");
    std::fs::write(&catalog, r#"[{"name": "Karura Forest", "lat": -1.2386, "lng": 36.8342}]"#).unwrap();

    let store = Arc::new(LocalStore::open(&dir.path().join("canopy.db")).unwrap());
    let session = Session::new(identity("alice"));
    let remote = Arc::new(FakeRemote::new(session.clone()));
    let config = AppConfig {
        locations_path: Some(catalog),
        ..Default::default()
    };
    let app = App::assemble(config, store, session, remote.clone());

    app.submission()
        .run(SubmissionForm {
            image_path: green_photo(dir.path()),
            species: "Mugumo".to_string(),
            location: Some("Karura Forest".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let stored = &remote.trees()[0];
    assert_eq!(stored.species, "Mugumo");
    assert_eq!(stored.latitude, Some(-1.2386));
    assert_eq!(stored.longitude, Some(36.8342));
    assert_eq!(stored.location.as_deref(), Some("Karura Forest"));
}

#[tokio::test]
async fn test_refresher_follows_writes() {
    let h = Harness::logged_in("alice");
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let refresher = ViewRefresher::spawn(h.app.views.clone(), move |snapshot| {
        let _ = tx.send(snapshot);
    });

    // Plain reads don't trigger a refresh
    h.app.engine.read(Scope::All).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    h.app
        .submission()
        .run(SubmissionForm {
            image_path: green_photo(h.dir.path()),
            ..Default::default()
        })
        .await
        .unwrap();

    let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.dashboard.total, 1);
    assert_eq!(snapshot.gallery.len(), 1);

    refresher.abort();
}

#[tokio::test]
async fn test_focus_triggers_refresh() {
    let h = Harness::logged_in("alice");
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let refresher = ViewRefresher::spawn(h.app.views.clone(), move |snapshot| {
        let _ = tx.send(snapshot);
    });

    h.app.engine.events().focus_regained();

    let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.dashboard.total, 0);

    refresher.abort();
}
