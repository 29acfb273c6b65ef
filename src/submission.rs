//! Tree submission workflow
//!
//! `Input -> ReadingImage -> Classifying -> Verified -> Persisting -> Done`
//! or `... -> Classifying -> Rejected -> Done`.
//!
//! Every step awaits the previous one. A rejected or undecodable photo
//! never creates a record. A failed remote create does not turn into a
//! rejection: the tentative record stays cached with `verified = true`.

use base64::Engine as _;
use rand::Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::classify::{Classification, ClassifierGateway};
use crate::error::SubmitError;
use crate::state::NewTree;
use crate::sync::{ReconciliationEngine, WriteOutcome};

/// Centre of the fallback box for submissions without a known location
const FALLBACK_ORIGIN: (f64, f64) = (-1.29, 36.82);
const FALLBACK_SPREAD: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Input,
    ReadingImage,
    Classifying,
    Verified,
    Rejected,
    Persisting,
    Done,
}

impl SubmissionStage {
    /// Progress shown while the stage is active
    pub fn progress_percent(&self) -> u8 {
        match self {
            SubmissionStage::Input => 0,
            SubmissionStage::ReadingImage => 30,
            SubmissionStage::Classifying => 60,
            SubmissionStage::Verified | SubmissionStage::Rejected => 80,
            SubmissionStage::Persisting => 90,
            SubmissionStage::Done => 100,
        }
    }
}

/// What the user filled in
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    pub image_path: PathBuf,
    pub species: String,
    pub planter_name: String,
    pub location: Option<String>,
    pub description: String,
    /// Explicit coordinates win over the location catalog
    pub coordinates: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Rejected(Classification),
    Stored {
        classification: Classification,
        write: WriteOutcome,
    },
}

/// A named place with coordinates
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

/// Named locations a submission can refer to
#[derive(Debug, Clone, Default)]
pub struct LocationCatalog {
    locations: Vec<Location>,
}

impl LocationCatalog {
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }

    /// Load the catalog; an unreadable file yields an empty catalog
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()));

        match parsed {
            Ok(locations) => Self::new(locations),
            Err(e) => {
                warn!("Location catalog {} not loaded: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.locations.iter().map(|l| l.name.as_str())
    }
}

/// One run through the submission workflow
pub struct Submission<'a> {
    gateway: &'a ClassifierGateway,
    engine: &'a ReconciliationEngine,
    locations: &'a LocationCatalog,
    history: Vec<SubmissionStage>,
}

impl<'a> Submission<'a> {
    pub fn new(
        gateway: &'a ClassifierGateway,
        engine: &'a ReconciliationEngine,
        locations: &'a LocationCatalog,
    ) -> Self {
        Self {
            gateway,
            engine,
            locations,
            history: vec![SubmissionStage::Input],
        }
    }

    pub fn stage(&self) -> SubmissionStage {
        self.history.last().copied().unwrap_or(SubmissionStage::Input)
    }

    /// Every stage visited so far, in order
    pub fn history(&self) -> &[SubmissionStage] {
        &self.history
    }

    fn enter(&mut self, stage: SubmissionStage) {
        info!(progress = stage.progress_percent(), "Submission stage: {:?}", stage);
        self.history.push(stage);
    }

    pub async fn run(&mut self, form: SubmissionForm) -> Result<SubmissionOutcome, SubmitError> {
        self.enter(SubmissionStage::ReadingImage);
        let bytes = tokio::fs::read(&form.image_path).await?;
        let photo_ref = data_url(&bytes);

        self.enter(SubmissionStage::Classifying);
        let classification = self.gateway.classify(bytes).await?;

        if !classification.verified {
            self.enter(SubmissionStage::Rejected);
            self.enter(SubmissionStage::Done);
            return Ok(SubmissionOutcome::Rejected(classification));
        }

        self.enter(SubmissionStage::Verified);
        let tree = self.build_tree(&form, photo_ref, &classification);

        self.enter(SubmissionStage::Persisting);
        let write = self.engine.write(tree).await?;

        self.enter(SubmissionStage::Done);
        Ok(SubmissionOutcome::Stored { classification, write })
    }

    fn build_tree(&self, form: &SubmissionForm, photo_ref: String, result: &Classification) -> NewTree {
        let species = [form.species.trim(), form.planter_name.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or("Unknown")
            .to_string();

        let (latitude, longitude) = form
            .coordinates
            .or_else(|| {
                form.location
                    .as_deref()
                    .and_then(|name| self.locations.find(name))
                    .map(|l| (l.lat, l.lng))
            })
            .unwrap_or_else(random_fallback_point);

        NewTree {
            species,
            photo_ref,
            latitude,
            longitude,
            description: form.description.trim().to_string(),
            confidence: result.confidence,
            verified: result.verified,
            planter_name: Some(form.planter_name.trim().to_string()).filter(|n| !n.is_empty()),
            location: form.location.clone(),
        }
    }
}

fn random_fallback_point() -> (f64, f64) {
    let mut rng = rand::thread_rng();
    (
        FALLBACK_ORIGIN.0 + rng.gen::<f64>() * FALLBACK_SPREAD,
        FALLBACK_ORIGIN.1 + rng.gen::<f64>() * FALLBACK_SPREAD,
    )
}

/// Inline `data:` URL for the photo
fn data_url(bytes: &[u8]) -> String {
    let mime = image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
