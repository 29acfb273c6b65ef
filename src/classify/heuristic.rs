/// Green-pixel heuristic
///
/// Counts pixels whose green channel dominates both red and blue by more
/// than 20 and is brighter than 60, then scales the green ratio so that
/// 30% green coverage maps to full confidence, capped at 0.95.

use super::{Classification, Classifier, ClassifierVariant};
use crate::error::{ClassifyError, DecodeError};

const GREEN_MARGIN: i32 = 20;
const GREEN_FLOOR: i32 = 60;
const FULL_COVERAGE_RATIO: f64 = 0.3;
const MAX_CONFIDENCE: f64 = 0.95;
const THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    /// Confidence for already-decoded RGB pixels
    pub fn score(pixels: &image::RgbImage) -> f64 {
        let total = pixels.width() as u64 * pixels.height() as u64;
        if total == 0 {
            return 0.0;
        }

        let green = pixels
            .pixels()
            .filter(|p| {
                let [r, g, b] = p.0.map(i32::from);
                g > r + GREEN_MARGIN && g > b + GREEN_MARGIN && g > GREEN_FLOOR
            })
            .count() as f64;

        ((green / total as f64) / FULL_COVERAGE_RATIO).min(MAX_CONFIDENCE)
    }
}

impl Classifier for HeuristicClassifier {
    fn classify(&self, image_bytes: &[u8]) -> Result<Classification, ClassifyError> {
        let img = image::load_from_memory(image_bytes).map_err(DecodeError::from)?;
        let confidence = Self::score(&img.to_rgb8());
        Ok(Classification::decide(ClassifierVariant::Heuristic, confidence, THRESHOLD))
    }

    fn variant(&self) -> ClassifierVariant {
        ClassifierVariant::Heuristic
    }

    fn threshold(&self) -> f64 {
        THRESHOLD
    }
}
