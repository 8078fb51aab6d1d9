use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{AnalysisFilter, ImageFilter, ProcessingClaim, RecordRepository};
use crate::errors::AppError;
use crate::models::analysis::{AnalysisResult, AnalysisRow, NewAnalysis};
use crate::models::image::{ImageDetailsUpdate, ImageRecord, NewImageRecord};
use crate::models::user::User;

/// PostgreSQL-backed repository. Schema: `migrations/0001_roadhealth.sql`.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Wraps user input in `%…%` for ILIKE, escaping the LIKE metacharacters.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl RecordRepository for PgRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, email, full_name, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_user_full_name(
        &self,
        id: Uuid,
        full_name: &str,
    ) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET full_name = $2
            WHERE id = $1
            RETURNING id, email, full_name, role, created_at
            "#,
        )
        .bind(id)
        .bind(full_name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn admin_emails(&self) -> Result<Vec<String>, AppError> {
        Ok(
            sqlx::query_scalar("SELECT email FROM users WHERE role = 'admin' ORDER BY email")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn insert_image(&self, image: &NewImageRecord) -> Result<ImageRecord, AppError> {
        let row = sqlx::query_as::<_, ImageRecord>(
            r#"
            INSERT INTO image_records
                (id, user_id, image_key, original_filename, content_type, title, description,
                 status, latitude, longitude, location_name, file_size, image_width, image_height)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(image.id)
        .bind(image.user_id)
        .bind(&image.image_key)
        .bind(&image.original_filename)
        .bind(&image.content_type)
        .bind(&image.title)
        .bind(&image.description)
        .bind(image.latitude)
        .bind(image.longitude)
        .bind(&image.location_name)
        .bind(image.file_size)
        .bind(image.image_width)
        .bind(image.image_height)
        .fetch_one(&self.pool)
        .await?;

        info!("Inserted image record {} for user {}", row.id, row.user_id);
        Ok(row)
    }

    async fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>, AppError> {
        Ok(
            sqlx::query_as::<_, ImageRecord>("SELECT * FROM image_records WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_images(&self, filter: &ImageFilter) -> Result<Vec<ImageRecord>, AppError> {
        let search = filter.search.as_deref().map(like_pattern);
        Ok(sqlx::query_as::<_, ImageRecord>(
            r#"
            SELECT *
            FROM image_records
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL
                   OR title ILIKE $3
                   OR description ILIKE $3
                   OR location_name ILIKE $3)
              AND (NOT $4 OR (latitude IS NOT NULL AND longitude IS NOT NULL))
            ORDER BY upload_date DESC
            LIMIT $5
            "#,
        )
        .bind(filter.owner)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(search)
        .bind(filter.geotagged_only)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_image_details(
        &self,
        id: Uuid,
        update: &ImageDetailsUpdate,
    ) -> Result<Option<ImageRecord>, AppError> {
        Ok(sqlx::query_as::<_, ImageRecord>(
            r#"
            UPDATE image_records
            SET title = CASE WHEN $2::text IS NULL THEN title ELSE NULLIF($2, '') END,
                description = CASE WHEN $3::text IS NULL THEN description ELSE NULLIF($3, '') END,
                latitude = COALESCE($4, latitude),
                longitude = COALESCE($5, longitude),
                location_name = CASE WHEN $6::text IS NULL THEN location_name ELSE NULLIF($6, '') END,
                updated_date = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(&update.location_name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_image(&self, id: Uuid) -> Result<Option<ImageRecord>, AppError> {
        // analysis_results.image_id is ON DELETE CASCADE
        let deleted = sqlx::query_as::<_, ImageRecord>(
            "DELETE FROM image_records WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if deleted.is_some() {
            info!("Deleted image record {id}");
        }
        Ok(deleted)
    }

    async fn begin_processing(
        &self,
        id: Uuid,
        stale_after: Duration,
    ) -> Result<ProcessingClaim, AppError> {
        let claimed = sqlx::query_as::<_, ImageRecord>(
            r#"
            UPDATE image_records
            SET status = 'processing', updated_date = NOW()
            WHERE id = $1
              AND (status <> 'processing'
                   OR updated_date <= NOW() - make_interval(secs => $2))
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(stale_after.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = claimed {
            return Ok(ProcessingClaim::Claimed(record));
        }

        let exists: Option<String> =
            sqlx::query_scalar("SELECT status FROM image_records WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match exists {
            Some(_) => ProcessingClaim::AlreadyProcessing,
            None => ProcessingClaim::NotFound,
        })
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE image_records
            SET status = 'failed', updated_date = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_analysis(
        &self,
        image_id: Uuid,
        analysis: &NewAnalysis,
    ) -> Result<AnalysisResult, AppError> {
        let mut tx = self.pool.begin().await?;

        let saved = sqlx::query_as::<_, AnalysisResult>(
            r#"
            INSERT INTO analysis_results
                (id, image_id, defect_type, severity_score, condition_label, ai_confidence,
                 annotated_image_key, model_name, model_version, analysis_metadata,
                 maintenance_suggestion)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (image_id) DO UPDATE
            SET defect_type = EXCLUDED.defect_type,
                severity_score = EXCLUDED.severity_score,
                condition_label = EXCLUDED.condition_label,
                ai_confidence = EXCLUDED.ai_confidence,
                annotated_image_key = EXCLUDED.annotated_image_key,
                model_name = EXCLUDED.model_name,
                model_version = EXCLUDED.model_version,
                analysis_metadata = EXCLUDED.analysis_metadata,
                maintenance_suggestion = EXCLUDED.maintenance_suggestion,
                analyzed_at = NOW(),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(image_id)
        .bind(analysis.defect_type.as_str())
        .bind(analysis.severity_score)
        .bind(analysis.condition_label.as_str())
        .bind(analysis.ai_confidence)
        .bind(&analysis.annotated_image_key)
        .bind(&analysis.model_name)
        .bind(&analysis.model_version)
        .bind(&analysis.analysis_metadata)
        .bind(&analysis.maintenance_suggestion)
        .fetch_one(&mut *tx)
        .await?;

        let settled = sqlx::query(
            r#"
            UPDATE image_records
            SET status = 'analyzed', updated_date = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(image_id)
        .execute(&mut *tx)
        .await?;

        if settled.rows_affected() == 0 {
            // Dropping the transaction rolls back the upsert.
            return Err(AppError::Conflict(format!(
                "Image {image_id} left processing before its analysis was saved"
            )));
        }

        tx.commit().await?;
        Ok(saved)
    }

    async fn get_analysis(&self, image_id: Uuid) -> Result<Option<AnalysisResult>, AppError> {
        Ok(sqlx::query_as::<_, AnalysisResult>(
            "SELECT * FROM analysis_results WHERE image_id = $1",
        )
        .bind(image_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn analyses_for_images(
        &self,
        image_ids: &[Uuid],
    ) -> Result<Vec<AnalysisResult>, AppError> {
        if image_ids.is_empty() {
            return Ok(vec![]);
        }
        Ok(sqlx::query_as::<_, AnalysisResult>(
            "SELECT * FROM analysis_results WHERE image_id = ANY($1)",
        )
        .bind(image_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_analyses(&self, filter: &AnalysisFilter) -> Result<Vec<AnalysisRow>, AppError> {
        let analyses = sqlx::query_as::<_, AnalysisResult>(
            r#"
            SELECT a.*
            FROM analysis_results a
            JOIN image_records i ON i.id = a.image_id
            WHERE ($1::uuid IS NULL OR i.user_id = $1)
              AND ($2::text IS NULL OR a.condition_label = $2)
              AND ($3::text IS NULL OR a.defect_type = $3)
            ORDER BY a.analyzed_at DESC
            "#,
        )
        .bind(filter.owner)
        .bind(filter.condition.map(|c| c.as_str()))
        .bind(filter.defect_type.map(|d| d.as_str()))
        .fetch_all(&self.pool)
        .await?;

        if analyses.is_empty() {
            return Ok(vec![]);
        }

        let image_ids: Vec<Uuid> = analyses.iter().map(|a| a.image_id).collect();
        let images: HashMap<Uuid, ImageRecord> = sqlx::query_as::<_, ImageRecord>(
            "SELECT * FROM image_records WHERE id = ANY($1)",
        )
        .bind(&image_ids)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|img| (img.id, img))
        .collect();

        let user_ids: Vec<Uuid> = images.values().map(|img| img.user_id).collect();
        let emails: HashMap<Uuid, String> =
            sqlx::query_as::<_, (Uuid, String)>("SELECT id, email FROM users WHERE id = ANY($1)")
                .bind(&user_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .collect();

        Ok(analyses
            .into_iter()
            .filter_map(|analysis| {
                let image = images.get(&analysis.image_id)?.clone();
                let user_email = emails.get(&image.user_id).cloned().unwrap_or_default();
                Some(AnalysisRow {
                    analysis,
                    image,
                    user_email,
                })
            })
            .collect())
    }
}
