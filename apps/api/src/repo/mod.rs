//! Record repository: the single seam between the service and its relational store.
//!
//! `PgRepository` is the production backend. Tests run against `MemoryRepository`,
//! which enforces the same status rules.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::{AnalysisResult, AnalysisRow, ConditionLabel, DefectType, NewAnalysis};
use crate::models::image::{ImageDetailsUpdate, ImageRecord, ImageStatus, NewImageRecord};
use crate::models::user::User;

/// Filter for image listings. `owner = None` means every record is visible.
#[derive(Debug, Clone, Default)]
pub struct ImageFilter {
    pub owner: Option<Uuid>,
    pub status: Option<ImageStatus>,
    /// Case-insensitive substring match over title, description and location name.
    pub search: Option<String>,
    pub geotagged_only: bool,
    pub limit: Option<i64>,
}

/// Filter for analysis listings. `owner = None` means every record is visible.
#[derive(Debug, Clone, Default)]
pub struct AnalysisFilter {
    pub owner: Option<Uuid>,
    pub condition: Option<ConditionLabel>,
    pub defect_type: Option<DefectType>,
}

/// Result of trying to move a record into `processing`.
#[derive(Debug, Clone)]
pub enum ProcessingClaim {
    Claimed(ImageRecord),
    AlreadyProcessing,
    NotFound,
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn update_user_full_name(
        &self,
        id: Uuid,
        full_name: &str,
    ) -> Result<Option<User>, AppError>;

    /// Email addresses of every admin-role user.
    async fn admin_emails(&self) -> Result<Vec<String>, AppError>;

    async fn insert_image(&self, image: &NewImageRecord) -> Result<ImageRecord, AppError>;

    async fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>, AppError>;

    /// Newest first.
    async fn list_images(&self, filter: &ImageFilter) -> Result<Vec<ImageRecord>, AppError>;

    async fn update_image_details(
        &self,
        id: Uuid,
        update: &ImageDetailsUpdate,
    ) -> Result<Option<ImageRecord>, AppError>;

    /// Deletes the record and, by cascade, its analysis. Returns the deleted row.
    async fn delete_image(&self, id: Uuid) -> Result<Option<ImageRecord>, AppError>;

    /// Compare-and-swap into `processing` from any other state, or from a
    /// `processing` claim untouched for at least `stale_after`.
    async fn begin_processing(
        &self,
        id: Uuid,
        stale_after: Duration,
    ) -> Result<ProcessingClaim, AppError>;

    /// Moves a `processing` record to `failed`. No-op for any other state.
    async fn mark_failed(&self, id: Uuid) -> Result<(), AppError>;

    /// Upserts the single result for `image_id` and marks the image `analyzed`,
    /// atomically.
    async fn save_analysis(
        &self,
        image_id: Uuid,
        analysis: &NewAnalysis,
    ) -> Result<AnalysisResult, AppError>;

    async fn get_analysis(&self, image_id: Uuid) -> Result<Option<AnalysisResult>, AppError>;

    /// Analyses for the given image ids, in no particular order.
    async fn analyses_for_images(&self, image_ids: &[Uuid])
        -> Result<Vec<AnalysisResult>, AppError>;

    /// Newest analysis first.
    async fn list_analyses(&self, filter: &AnalysisFilter) -> Result<Vec<AnalysisRow>, AppError>;
}
