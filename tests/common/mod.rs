//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use canopy::config::AppConfig;
use canopy::error::RemoteError;
use canopy::ownership::is_owner;
use canopy::remote::RemoteTreeStore;
use canopy::state::{Identity, LocalStore, NewTree, Scope, Session, Tree, TreeId};
use canopy::App;

/// In-memory stand-in for the remote tree store
#[derive(Default)]
pub struct FakeRemote {
    trees: Mutex<Vec<Tree>>,
    session: Session,
    offline: AtomicBool,
    next_id: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn new(session: Session) -> Self {
        Self { session, ..Default::default() }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn seed(&self, tree: Tree) {
        self.trees.lock().unwrap().push(tree);
    }

    pub fn trees(&self) -> Vec<Tree> {
        self.trees.lock().unwrap().clone()
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RemoteError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteTreeStore for FakeRemote {
    async fn list(&self, scope: Scope) -> Result<Vec<Tree>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let identity = self.session.identity();
        Ok(self
            .trees()
            .into_iter()
            .filter(|t| scope == Scope::All || is_owner(t, &identity))
            .collect())
    }

    async fn create(&self, tree: &NewTree) -> Result<Tree, RemoteError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let identity = self.session.identity();
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = Tree {
            id: TreeId::Canonical(format!("srv-{}", n)),
            species: tree.species.clone(),
            photo_ref: tree.photo_ref.clone(),
            latitude: Some(tree.latitude),
            longitude: Some(tree.longitude),
            description: tree.description.clone(),
            confidence: tree.confidence,
            verified: tree.verified,
            planted_at: Utc::now(),
            uploaded_by: identity.display_name,
            planter_name: tree.planter_name.clone(),
            location: tree.location.clone(),
            user_id: identity.user_id,
        };
        self.seed(stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: &TreeId) -> Result<(), RemoteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let mut trees = self.trees.lock().unwrap();
        let index = trees.iter().position(|t| &t.id == id).ok_or(RemoteError::NotFound)?;
        if !is_owner(&trees[index], &self.session.identity()) {
            return Err(RemoteError::Unauthorized);
        }
        trees.remove(index);
        Ok(())
    }
}

pub struct Harness {
    pub app: App,
    pub remote: Arc<FakeRemote>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    /// App logged in as `name`, backed by a temp store and a fake remote
    pub fn logged_in(name: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::open(&dir.path().join("canopy.db")).unwrap());
        let session = Session::new(identity(name));
        let remote = Arc::new(FakeRemote::new(session.clone()));

        let app = App::assemble(AppConfig::default(), store, session, remote.clone());
        Self { app, remote, dir }
    }

    /// Raw JSON persisted for a scope
    pub fn persisted(&self, scope: Scope) -> Option<String> {
        self.app.store.get(scope.cache_key()).unwrap()
    }

    pub fn cached(&self, scope: Scope) -> Vec<Tree> {
        self.persisted(scope)
            .map(|json| serde_json::from_str(&json).unwrap())
            .unwrap_or_default()
    }

    /// Write a photo into the temp dir
    pub fn photo(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }
}

pub fn identity(name: &str) -> Identity {
    Identity {
        user_id: Some(format!("user-{}", name)),
        display_name: Some(name.to_string()),
        token: Some(format!("token-{}", name)),
    }
}

pub fn tree(id: &str, uploaded_by: &str) -> Tree {
    Tree {
        id: TreeId::Canonical(id.to_string()),
        species: "Grevillea".to_string(),
        photo_ref: "https://example.org/tree.jpg".to_string(),
        latitude: Some(-1.28),
        longitude: Some(36.82),
        description: String::new(),
        confidence: 0.9,
        verified: true,
        planted_at: Utc::now(),
        uploaded_by: Some(uploaded_by.to_string()),
        planter_name: None,
        location: None,
        user_id: None,
    }
}

/// Uniform PNG of one colour
pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(color));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

pub fn green_photo(dir: &Path) -> PathBuf {
    let path = dir.join("green.png");
    std::fs::write(&path, solid_png(64, 64, [20, 160, 30])).unwrap();
    path
}
