use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{AnalysisFilter, ImageFilter, ProcessingClaim, RecordRepository};
use crate::errors::AppError;
use crate::models::analysis::{AnalysisResult, AnalysisRow, NewAnalysis};
use crate::models::image::{ImageDetailsUpdate, ImageRecord, ImageStatus, NewImageRecord};
use crate::models::user::{Role, User};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    images: HashMap<Uuid, ImageRecord>,
    analyses: HashMap<Uuid, AnalysisResult>,
    status_log: Vec<(Uuid, ImageStatus)>,
}

/// In-process repository for tests. Applies the same status rules as the
/// PostgreSQL queries and records every status an image passes through.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, email: &str, role: Role) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: String::new(),
            role,
            created_at: Utc::now(),
        };
        self.tables
            .lock()
            .unwrap()
            .users
            .insert(user.id, user.clone());
        user
    }

    /// Every status the image has held, in order.
    pub fn status_history(&self, image_id: Uuid) -> Vec<ImageStatus> {
        self.tables
            .lock()
            .unwrap()
            .status_log
            .iter()
            .filter(|(id, _)| *id == image_id)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn analysis_count(&self, image_id: Uuid) -> usize {
        self.tables
            .lock()
            .unwrap()
            .analyses
            .values()
            .filter(|a| a.image_id == image_id)
            .count()
    }

    /// Moves the record's `updated_date` into the past.
    pub fn backdate(&self, image_id: Uuid, by: chrono::Duration) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(img) = tables.images.get_mut(&image_id) {
            img.updated_date = img.updated_date - by;
        }
    }

    /// Forces a status without going through the state machine.
    pub fn force_status(&self, image_id: Uuid, status: ImageStatus) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(img) = tables.images.get_mut(&image_id) {
            img.status = status;
            img.updated_date = Utc::now();
        }
        tables.status_log.push((image_id, status));
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn matches_search(image: &ImageRecord, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    [&image.title, &image.description, &image.location_name]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

#[async_trait]
impl RecordRepository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.lock().unwrap().users.get(&id).cloned())
    }

    async fn update_user_full_name(
        &self,
        id: Uuid,
        full_name: &str,
    ) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.users.get_mut(&id).map(|user| {
            user.full_name = full_name.to_string();
            user.clone()
        }))
    }

    async fn admin_emails(&self) -> Result<Vec<String>, AppError> {
        let tables = self.tables.lock().unwrap();
        let mut emails: Vec<String> = tables
            .users
            .values()
            .filter(|u| u.role.is_admin())
            .map(|u| u.email.clone())
            .collect();
        emails.sort();
        Ok(emails)
    }

    async fn insert_image(&self, image: &NewImageRecord) -> Result<ImageRecord, AppError> {
        let now = Utc::now();
        let record = ImageRecord {
            id: image.id,
            user_id: image.user_id,
            image_key: image.image_key.clone(),
            original_filename: image.original_filename.clone(),
            content_type: image.content_type.clone(),
            title: image.title.clone(),
            description: image.description.clone(),
            status: ImageStatus::Pending,
            latitude: image.latitude,
            longitude: image.longitude,
            location_name: image.location_name.clone(),
            file_size: image.file_size,
            image_width: image.image_width,
            image_height: image.image_height,
            upload_date: now,
            updated_date: now,
        };
        let mut tables = self.tables.lock().unwrap();
        tables.images.insert(record.id, record.clone());
        tables.status_log.push((record.id, ImageStatus::Pending));
        Ok(record)
    }

    async fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>, AppError> {
        Ok(self.tables.lock().unwrap().images.get(&id).cloned())
    }

    async fn list_images(&self, filter: &ImageFilter) -> Result<Vec<ImageRecord>, AppError> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<ImageRecord> = tables
            .images
            .values()
            .filter(|img| filter.owner.map_or(true, |owner| img.user_id == owner))
            .filter(|img| filter.status.map_or(true, |s| img.status == s))
            .filter(|img| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |needle| matches_search(img, needle))
            })
            .filter(|img| !filter.geotagged_only || img.has_location())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        if let Some(limit) = filter.limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }

    async fn update_image_details(
        &self,
        id: Uuid,
        update: &ImageDetailsUpdate,
    ) -> Result<Option<ImageRecord>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(img) = tables.images.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &update.title {
            img.title = non_empty(title);
        }
        if let Some(description) = &update.description {
            img.description = non_empty(description);
        }
        if let Some(lat) = update.latitude {
            img.latitude = Some(lat);
        }
        if let Some(lng) = update.longitude {
            img.longitude = Some(lng);
        }
        if let Some(location) = &update.location_name {
            img.location_name = non_empty(location);
        }
        img.updated_date = Utc::now();
        Ok(Some(img.clone()))
    }

    async fn delete_image(&self, id: Uuid) -> Result<Option<ImageRecord>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let removed = tables.images.remove(&id);
        if removed.is_some() {
            tables.analyses.retain(|_, a| a.image_id != id);
        }
        Ok(removed)
    }

    async fn begin_processing(
        &self,
        id: Uuid,
        stale_after: Duration,
    ) -> Result<ProcessingClaim, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(img) = tables.images.get_mut(&id) else {
            return Ok(ProcessingClaim::NotFound);
        };
        if !img.is_claimable(stale_after, Utc::now()) {
            return Ok(ProcessingClaim::AlreadyProcessing);
        }
        img.status = ImageStatus::Processing;
        img.updated_date = Utc::now();
        let claimed = img.clone();
        tables.status_log.push((id, ImageStatus::Processing));
        Ok(ProcessingClaim::Claimed(claimed))
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(img) = tables.images.get_mut(&id) {
            if img.status == ImageStatus::Processing {
                img.status = ImageStatus::Failed;
                img.updated_date = Utc::now();
                tables.status_log.push((id, ImageStatus::Failed));
            }
        }
        Ok(())
    }

    async fn save_analysis(
        &self,
        image_id: Uuid,
        analysis: &NewAnalysis,
    ) -> Result<AnalysisResult, AppError> {
        let mut tables = self.tables.lock().unwrap();
        match tables.images.get_mut(&image_id) {
            Some(img) if img.status == ImageStatus::Processing => {
                img.status = ImageStatus::Analyzed;
                img.updated_date = Utc::now();
            }
            _ => {
                return Err(AppError::Conflict(format!(
                    "Image {image_id} left processing before its analysis was saved"
                )))
            }
        }

        let now = Utc::now();
        let id = tables
            .analyses
            .values()
            .find(|a| a.image_id == image_id)
            .map(|a| a.id)
            .unwrap_or_else(Uuid::new_v4);
        let saved = AnalysisResult {
            id,
            image_id,
            defect_type: analysis.defect_type,
            severity_score: analysis.severity_score,
            condition_label: analysis.condition_label,
            ai_confidence: analysis.ai_confidence,
            annotated_image_key: analysis.annotated_image_key.clone(),
            model_name: analysis.model_name.clone(),
            model_version: analysis.model_version.clone(),
            analysis_metadata: analysis.analysis_metadata.clone(),
            maintenance_suggestion: analysis.maintenance_suggestion.clone(),
            analyzed_at: now,
            updated_at: now,
        };
        tables.analyses.insert(id, saved.clone());
        tables.status_log.push((image_id, ImageStatus::Analyzed));
        Ok(saved)
    }

    async fn get_analysis(&self, image_id: Uuid) -> Result<Option<AnalysisResult>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .analyses
            .values()
            .find(|a| a.image_id == image_id)
            .cloned())
    }

    async fn analyses_for_images(
        &self,
        image_ids: &[Uuid],
    ) -> Result<Vec<AnalysisResult>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .analyses
            .values()
            .filter(|a| image_ids.contains(&a.image_id))
            .cloned()
            .collect())
    }

    async fn list_analyses(&self, filter: &AnalysisFilter) -> Result<Vec<AnalysisRow>, AppError> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<AnalysisRow> = tables
            .analyses
            .values()
            .filter(|a| filter.condition.map_or(true, |c| a.condition_label == c))
            .filter(|a| filter.defect_type.map_or(true, |d| a.defect_type == d))
            .filter_map(|a| {
                let image = tables.images.get(&a.image_id)?;
                if filter.owner.map_or(false, |owner| image.user_id != owner) {
                    return None;
                }
                let user_email = tables
                    .users
                    .get(&image.user_id)
                    .map(|u| u.email.clone())
                    .unwrap_or_default();
                Some(AnalysisRow {
                    analysis: a.clone(),
                    image: image.clone(),
                    user_email,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.analysis.analyzed_at.cmp(&a.analysis.analyzed_at));
        Ok(rows)
    }
}
