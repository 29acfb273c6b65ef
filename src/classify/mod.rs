/// Tree verification
///
/// This module decides whether a submitted photo counts as a tree:
/// - Model-based classification over a 224x224x3 tensor (model.rs)
/// - Green-pixel heuristic fallback (heuristic.rs)
///
/// The variant is resolved once when the gateway is built and never
/// re-checked per call.

pub mod heuristic;
pub mod model;

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ClassifyError;
pub use heuristic::HeuristicClassifier;
pub use model::{InferenceBackend, LinearProbe, ModelClassifier};

/// Which strategy produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierVariant {
    Model,
    Heuristic,
}

/// Outcome of classifying one image
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub verified: bool,
    /// Always within [0, 1]
    pub confidence: f64,
    pub message: String,
    pub variant: ClassifierVariant,
}

impl Classification {
    /// Apply a variant's threshold to a raw confidence
    pub(crate) fn decide(variant: ClassifierVariant, raw_confidence: f64, threshold: f64) -> Self {
        let confidence = if raw_confidence.is_finite() {
            raw_confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let verified = confidence > threshold;
        let percent = confidence * 100.0;

        let message = match (variant, verified) {
            (ClassifierVariant::Model, true) => format!("Tree detected ({:.1}%)", percent),
            (ClassifierVariant::Model, false) => format!("No tree detected ({:.1}%)", percent),
            (ClassifierVariant::Heuristic, true) => {
                format!("Tree-like features detected ({:.1}%)", percent)
            }
            (ClassifierVariant::Heuristic, false) => format!("Low confidence ({:.1}%)", percent),
        };

        Self { verified, confidence, message, variant }
    }
}

/// A verification strategy
pub trait Classifier: Send + Sync {
    /// Classify raw image bytes. CPU-bound; call from a blocking context.
    fn classify(&self, image_bytes: &[u8]) -> Result<Classification, ClassifyError>;

    fn variant(&self) -> ClassifierVariant;

    /// `verified` is exactly `confidence > threshold()`
    fn threshold(&self) -> f64;
}

/// The single resolved classifier for this process
#[derive(Clone)]
pub struct ClassifierGateway {
    classifier: Arc<dyn Classifier>,
}

impl ClassifierGateway {
    /// Pick the classifier for the process lifetime.
    ///
    /// One load attempt only: if there is no model path or loading fails,
    /// the heuristic is used from then on.
    pub fn init(model_path: Option<&Path>) -> Self {
        let Some(path) = model_path else {
            info!("No model configured, using heuristic verification");
            return Self::heuristic();
        };

        match LinearProbe::load(path) {
            Ok(probe) => {
                info!("🌳 Model loaded from {}", path.display());
                Self::with_classifier(Arc::new(ModelClassifier::new(Arc::new(probe))))
            }
            Err(e) => {
                warn!("Model load failed ({}), falling back to heuristic verification", e);
                Self::heuristic()
            }
        }
    }

    pub fn heuristic() -> Self {
        Self::with_classifier(Arc::new(HeuristicClassifier))
    }

    pub fn with_classifier(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn variant(&self) -> ClassifierVariant {
        self.classifier.variant()
    }

    /// Classify on the blocking pool so decoding never stalls the runtime
    pub async fn classify(&self, image_bytes: Vec<u8>) -> Result<Classification, ClassifyError> {
        let classifier = Arc::clone(&self.classifier);
        tokio::task::spawn_blocking(move || classifier.classify(&image_bytes))
            .await
            .map_err(|e| ClassifyError::Worker(e.to_string()))?
    }
}

impl std::fmt::Debug for ClassifierGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierGateway")
            .field("variant", &self.classifier.variant())
            .finish()
    }
}
