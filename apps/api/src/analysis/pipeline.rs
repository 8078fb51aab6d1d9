use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use image::DynamicImage;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::annotate::{annotation_label, Annotator};
use super::detector::{DefectDetector, Detection};
use super::suggestions::resolve_suggestion;
use crate::blob::{self, BlobStore};
use crate::errors::AppError;
use crate::models::analysis::{AnalysisResult, ConditionLabel, NewAnalysis};
use crate::models::image::ImageRecord;
use crate::notify::{compose_critical_alert, Notifier};
use crate::repo::{ProcessingClaim, RecordRepository};

/// A `processing` claim untouched this long is treated as abandoned.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10 * 60);

/// Runs one image through detection and records the outcome.
///
/// Flow: claim (`processing`) → fetch blob → decode → detect → derive condition and
/// suggestion → annotate → store annotated blob → save result (`analyzed`) → alert if
/// critical. Any failure before the save leaves the image `failed` and no result row.
///
/// Everything after the claim runs on its own task, so a caller that goes away
/// (client disconnect, request timeout) cannot strand the record in `processing`.
#[derive(Clone)]
pub struct AnalysisPipeline {
    repo: Arc<dyn RecordRepository>,
    blobs: Arc<dyn BlobStore>,
    detector: Arc<dyn DefectDetector>,
    annotator: Arc<Annotator>,
    notifier: Arc<dyn Notifier>,
    stale_after: Duration,
}

struct Rendered {
    detection: Detection,
    condition: ConditionLabel,
    annotated_jpeg: Vec<u8>,
}

impl AnalysisPipeline {
    pub fn new(
        repo: Arc<dyn RecordRepository>,
        blobs: Arc<dyn BlobStore>,
        detector: Arc<dyn DefectDetector>,
        annotator: Arc<Annotator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            blobs,
            detector,
            annotator,
            notifier,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub async fn run(&self, image_id: Uuid) -> Result<AnalysisResult, AppError> {
        let record = match self.repo.begin_processing(image_id, self.stale_after).await? {
            ProcessingClaim::Claimed(record) => record,
            ProcessingClaim::AlreadyProcessing => {
                return Err(AppError::Conflict(format!(
                    "Image {image_id} is already being analysed"
                )))
            }
            ProcessingClaim::NotFound => {
                return Err(AppError::NotFound(format!("Image {image_id} not found")))
            }
        };

        info!("Starting analysis for image {image_id}");

        let pipeline = self.clone();
        let task = tokio::spawn(async move { pipeline.settle(record).await });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Analysis task for image {image_id} aborted: {e}");
                self.mark_failed(image_id).await;
                Err(AppError::Analysis(format!("Analysis task aborted: {e}")))
            }
        }
    }

    /// Takes a claimed record to `analyzed` or `failed`.
    async fn settle(&self, record: ImageRecord) -> Result<AnalysisResult, AppError> {
        let image_id = record.id;
        let saved = match self.analyse_and_save(&record).await {
            Ok(saved) => saved,
            Err(e) => {
                error!("Error analysing image {image_id}: {e}");
                self.mark_failed(image_id).await;
                return Err(e);
            }
        };

        info!(
            "Analysis complete for image {image_id}: {} - {}",
            saved.defect_type.as_str(),
            saved.condition_label.as_str()
        );

        if saved.condition_label == ConditionLabel::Critical {
            self.send_critical_alert(&record, &saved).await;
        }

        Ok(saved)
    }

    async fn mark_failed(&self, image_id: Uuid) {
        if let Err(e) = self.repo.mark_failed(image_id).await {
            error!("Could not mark image {image_id} as failed: {e}");
        }
    }

    async fn analyse_and_save(&self, record: &ImageRecord) -> Result<AnalysisResult, AppError> {
        let bytes = match self.blobs.get(&record.image_key).await {
            Ok(bytes) => bytes,
            // The record exists, so a missing original is a storage fault.
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Storage(format!(
                    "Original image {} is missing from storage",
                    record.image_key
                )))
            }
            Err(e) => return Err(e),
        };

        let previous_key = self
            .repo
            .get_analysis(record.id)
            .await?
            .and_then(|a| a.annotated_image_key);

        let detector = Arc::clone(&self.detector);
        let annotator = Arc::clone(&self.annotator);
        let rendered = tokio::task::spawn_blocking(move || render(&bytes, &*detector, &annotator))
            .await
            .map_err(|e| AppError::Analysis(format!("Detector task aborted: {e}")))??;

        let annotated_key = blob::annotated_image_key(record.id, Uuid::new_v4(), Utc::now());
        self.blobs
            .put(&annotated_key, rendered.annotated_jpeg, "image/jpeg")
            .await?;

        let label = annotation_label(&rendered.detection);
        let mut metadata = match rendered.detection.metadata {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        metadata.insert("annotation_label".to_string(), Value::String(label));

        let new_analysis = NewAnalysis {
            defect_type: rendered.detection.defect_type,
            severity_score: rendered.detection.severity_score,
            condition_label: rendered.condition,
            ai_confidence: rendered.detection.confidence,
            annotated_image_key: Some(annotated_key.clone()),
            model_name: self.detector.model_name().to_string(),
            model_version: self.detector.model_version().to_string(),
            analysis_metadata: Value::Object(metadata),
            maintenance_suggestion: resolve_suggestion(
                None,
                rendered.detection.defect_type,
                rendered.condition,
            ),
        };

        match self.repo.save_analysis(record.id, &new_analysis).await {
            Ok(saved) => {
                if let Some(old) = previous_key {
                    blob::delete_quietly(self.blobs.as_ref(), &old).await;
                }
                Ok(saved)
            }
            Err(e) => {
                // The previous result, if any, still points at its own copy.
                blob::delete_quietly(self.blobs.as_ref(), &annotated_key).await;
                Err(e)
            }
        }
    }

    async fn send_critical_alert(&self, record: &ImageRecord, analysis: &AnalysisResult) {
        let owner = match self.repo.get_user(record.user_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                warn!("Owner {} of image {} not found; alert skipped", record.user_id, record.id);
                return;
            }
            Err(e) => {
                error!("Error loading owner for critical alert on image {}: {e}", record.id);
                return;
            }
        };
        let admins = self.repo.admin_emails().await.unwrap_or_else(|e| {
            error!("Error loading admin recipients: {e}");
            vec![]
        });

        let alert = compose_critical_alert(record, analysis, &owner, &admins);
        match self.notifier.send(&alert).await {
            Ok(()) => info!("Critical alert sent for image {}", record.id),
            Err(e) => error!("Error sending critical alert for image {}: {e}", record.id),
        }
    }
}

/// CPU-bound part of the pipeline; runs on the blocking pool.
fn render(
    bytes: &[u8],
    detector: &dyn DefectDetector,
    annotator: &Annotator,
) -> Result<Rendered, AppError> {
    let image: DynamicImage = image::load_from_memory(bytes)
        .map_err(|e| AppError::Decode(format!("Could not read image: {e}")))?;

    let detection = detector.detect(&image)?;
    let condition = ConditionLabel::from_severity(detection.severity_score);
    let annotated_jpeg = annotator.annotate(&image, &detection, condition)?;

    Ok(Rendered {
        detection,
        condition,
        annotated_jpeg,
    })
}
