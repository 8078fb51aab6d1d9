//! Defect detection. Trait-based so the heuristic can be swapped for a real model
//! without touching the pipeline or handlers.
//!
//! Default: `EdgeDensityDetector`, a placeholder that classifies by Canny edge density.

use image::DynamicImage;
use imageproc::edges::canny;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use super::classify::classify_density;
use crate::config::DetectorConfig;
use crate::errors::AppError;
use crate::models::analysis::DefectType;

pub const MODEL_NAME: &str = "SimpleDetector";
pub const MODEL_VERSION: &str = "1.0";

const CONFIDENCE_MIN: f64 = 0.70;
const CONFIDENCE_MAX: f64 = 0.95;

/// Raw detector output, before condition and suggestion are derived.
#[derive(Debug, Clone)]
pub struct Detection {
    pub defect_type: DefectType,
    pub severity_score: f64,
    pub confidence: f64,
    pub metadata: Value,
}

/// Carried in `AppState` behind an `Arc`. Implementations must be stateless
/// across calls; `detect` runs on the blocking pool.
pub trait DefectDetector: Send + Sync {
    fn model_name(&self) -> &str;

    fn model_version(&self) -> &str;

    fn detect(&self, image: &DynamicImage) -> Result<Detection, AppError>;
}

/// How the placeholder confidence score is produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfidenceSource {
    /// Uniform draw from a fresh RNG on every call.
    Random,
    /// Uniform draw from an RNG seeded by (seed, edge density): same pixels, same score.
    Seeded(u64),
}

impl ConfidenceSource {
    fn draw(&self, edge_density: f64) -> f64 {
        match *self {
            ConfidenceSource::Random => {
                rand::thread_rng().gen_range(CONFIDENCE_MIN..=CONFIDENCE_MAX)
            }
            ConfidenceSource::Seeded(seed) => {
                let mut rng = StdRng::seed_from_u64(seed ^ edge_density.to_bits());
                rng.gen_range(CONFIDENCE_MIN..=CONFIDENCE_MAX)
            }
        }
    }
}

pub struct EdgeDensityDetector {
    low_threshold: f32,
    high_threshold: f32,
    confidence: ConfidenceSource,
}

impl EdgeDensityDetector {
    pub fn new(low_threshold: f32, high_threshold: f32, confidence: ConfidenceSource) -> Self {
        Self {
            low_threshold,
            high_threshold,
            confidence,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        let confidence = match config.seed {
            Some(seed) => ConfidenceSource::Seeded(seed),
            None => ConfidenceSource::Random,
        };
        Self::new(config.canny_low, config.canny_high, confidence)
    }

    /// Fraction of pixels Canny marks as edges.
    pub fn edge_density(&self, image: &DynamicImage) -> Result<f64, AppError> {
        let gray = image.to_luma8();
        let total = u64::from(gray.width()) * u64::from(gray.height());
        if total == 0 {
            return Err(AppError::Analysis("Image has no pixels".to_string()));
        }

        let edges = canny(&gray, self.low_threshold, self.high_threshold);
        let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count() as u64;

        Ok(edge_pixels as f64 / total as f64)
    }
}

impl DefectDetector for EdgeDensityDetector {
    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn model_version(&self) -> &str {
        MODEL_VERSION
    }

    fn detect(&self, image: &DynamicImage) -> Result<Detection, AppError> {
        let density = self.edge_density(image)?;
        let (defect_type, severity_score) = classify_density(density);

        Ok(Detection {
            defect_type,
            severity_score,
            confidence: self.confidence.draw(density),
            metadata: json!({
                "edge_density": density,
                "processing_method": "canny_edge_detection",
                "canny_low": self.low_threshold,
                "canny_high": self.high_threshold,
            }),
        })
    }
}
