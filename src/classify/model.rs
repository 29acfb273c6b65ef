/// Model-based classification
///
/// Images are decoded, resized to a fixed 224x224 RGB grid with bilinear
/// filtering and normalized to [0, 1] floats (HWC layout, batch of one).
/// The inference runtime sits behind `InferenceBackend`; the bundled
/// `LinearProbe` is a small JSON-described linear head over channel means.

use image::imageops::FilterType;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use super::{Classification, Classifier, ClassifierVariant};
use crate::error::{ClassifyError, DecodeError, ModelLoadError};

/// Model input edge length
pub const INPUT_SIZE: u32 = 224;
/// Model input channels
pub const INPUT_CHANNELS: usize = 3;

const THRESHOLD: f64 = 0.6;

/// Normalized input tensor, shape [1, 224, 224, 3]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Vec<f32>,
}

impl ImageTensor {
    pub const SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];

    /// Decode and preprocess image bytes
    pub fn from_bytes(image_bytes: &[u8]) -> Result<Self, DecodeError> {
        let img = image::load_from_memory(image_bytes)?;
        let resized = img
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
            .to_rgb8();

        let data = resized
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 255.0)
            .collect();

        Ok(Self { data })
    }

    /// Mean of each channel across all pixels
    pub fn channel_means(&self) -> [f32; INPUT_CHANNELS] {
        let mut sums = [0f64; INPUT_CHANNELS];
        for pixel in self.data.chunks_exact(INPUT_CHANNELS) {
            for (sum, &v) in sums.iter_mut().zip(pixel) {
                *sum += v as f64;
            }
        }

        let count = (self.data.len() / INPUT_CHANNELS).max(1) as f64;
        sums.map(|s| (s / count) as f32)
    }
}

/// Runs a loaded model over one tensor and returns class probabilities
pub trait InferenceBackend: Send + Sync {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, String>;
}

/// Linear head over per-channel means, softmax over classes
#[derive(Debug, Clone, Deserialize)]
pub struct LinearProbe {
    pub labels: Vec<String>,
    pub weights: Vec<[f32; INPUT_CHANNELS]>,
    pub bias: Vec<f32>,
}

impl LinearProbe {
    /// Load a probe from its JSON description
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let json = std::fs::read_to_string(path)?;
        let probe: LinearProbe = serde_json::from_str(&json)?;
        probe.validate()?;
        Ok(probe)
    }

    fn validate(&self) -> Result<(), ModelLoadError> {
        if self.labels.is_empty() {
            return Err(ModelLoadError::Invalid("model has no output classes".to_string()));
        }
        if self.weights.len() != self.labels.len() || self.bias.len() != self.labels.len() {
            return Err(ModelLoadError::Invalid(format!(
                "{} labels but {} weight rows and {} biases",
                self.labels.len(),
                self.weights.len(),
                self.bias.len()
            )));
        }
        Ok(())
    }
}

impl InferenceBackend for LinearProbe {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, String> {
        let features = input.channel_means();

        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(&features).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect();

        // Numerically stable softmax
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f32 = exps.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err("softmax diverged".to_string());
        }
        Ok(exps.into_iter().map(|e| e / total).collect())
    }
}

/// Classifier backed by a loaded model
pub struct ModelClassifier {
    backend: Arc<dyn InferenceBackend>,
}

impl ModelClassifier {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }
}

impl Classifier for ModelClassifier {
    fn classify(&self, image_bytes: &[u8]) -> Result<Classification, ClassifyError> {
        let tensor = ImageTensor::from_bytes(image_bytes)?;
        let probabilities = self.backend.predict(&tensor).map_err(ClassifyError::Inference)?;

        let confidence = probabilities
            .iter()
            .copied()
            .fold(None, |best: Option<f32>, p| Some(best.map_or(p, |b| b.max(p))))
            .ok_or_else(|| ClassifyError::Inference("model returned no classes".to_string()))?;

        Ok(Classification::decide(ClassifierVariant::Model, confidence as f64, THRESHOLD))
    }

    fn variant(&self) -> ClassifierVariant {
        ClassifierVariant::Model
    }

    fn threshold(&self) -> f64 {
        THRESHOLD
    }
}
