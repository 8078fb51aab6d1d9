use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::service::{ingest_upload, UploadForm};
use super::validation::{normalize_text, validate_details};
use crate::auth::Actor;
use crate::blob;
use crate::errors::AppError;
use crate::jobs::Dispatch;
use crate::models::analysis::{AnalysisResult, ImageWithAnalysis};
use crate::models::image::{ImageDetailsUpdate, ImageRecord, ImageStatus};
use crate::repo::{ImageFilter, RecordRepository};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl From<&AppError> for ErrorDetail {
    fn from(e: &AppError) -> Self {
        Self {
            code: e.code(),
            message: e.public_message(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub image: ImageRecord,
    pub analysis: Option<AnalysisResult>,
    pub queued: bool,
    /// Set when the inline analysis failed; the upload itself still succeeded.
    pub analysis_error: Option<ErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ReanalyzeResponse {
    pub message: String,
    pub status: ImageStatus,
    pub analysis: Option<AnalysisResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

impl ImageListQuery {
    pub fn into_filter(self, owner: Option<Uuid>) -> Result<ImageFilter, AppError> {
        let status = normalize_text(self.status)
            .map(|s| s.parse::<ImageStatus>())
            .transpose()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        Ok(ImageFilter {
            owner,
            status,
            search: normalize_text(self.search),
            ..ImageFilter::default()
        })
    }
}

/// Loads a record the caller may see: 404 if missing, 403 if someone else's.
pub async fn load_visible_image(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
) -> Result<ImageRecord, AppError> {
    let image = state
        .repo
        .get_image(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {id} not found")))?;
    actor.ensure_can_access(&image)?;
    Ok(image)
}

/// Pairs each record with its analysis, preserving record order.
pub async fn attach_analyses(
    repo: &dyn RecordRepository,
    images: Vec<ImageRecord>,
) -> Result<Vec<ImageWithAnalysis>, AppError> {
    let ids: Vec<Uuid> = images.iter().map(|i| i.id).collect();
    let mut by_image: HashMap<Uuid, AnalysisResult> = repo
        .analyses_for_images(&ids)
        .await?
        .into_iter()
        .map(|a| (a.image_id, a))
        .collect();
    Ok(images
        .into_iter()
        .map(|image| {
            let analysis = by_image.remove(&image.id);
            ImageWithAnalysis { image, analysis }
        })
        .collect())
}

fn parse_coordinate(name: &str, raw: String) -> Result<Option<f64>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| AppError::Validation(format!("{name} must be a number")))
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    let mut saw_image = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                form.filename = field.file_name().unwrap_or_default().to_string();
                form.content_type = field.content_type().unwrap_or_default().to_string();
                form.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read image: {e}")))?
                    .to_vec();
                saw_image = true;
            }
            "title" | "description" | "location_name" | "latitude" | "longitude" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))?;
                match name.as_str() {
                    "title" => form.title = Some(value),
                    "description" => form.description = Some(value),
                    "location_name" => form.location_name = Some(value),
                    "latitude" => form.latitude = parse_coordinate("Latitude", value)?,
                    _ => form.longitude = parse_coordinate("Longitude", value)?,
                }
            }
            _ => {}
        }
    }

    if !saw_image {
        return Err(AppError::Validation(
            "Multipart field 'image' is required".to_string(),
        ));
    }
    Ok(form)
}

/// POST /api/v1/images
pub async fn handle_upload(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let form = read_upload_form(multipart).await?;
    let record = ingest_upload(
        state.repo.as_ref(),
        state.blobs.as_ref(),
        actor.user().id,
        form,
        state.config.max_upload_bytes,
    )
    .await?;

    let (analysis, queued, analysis_error) =
        match state.queue.dispatch(&state.pipeline, record.id).await? {
            Dispatch::Completed(result) => (Some(result), false, None),
            Dispatch::Queued => (None, true, None),
            Dispatch::Failed(e) => {
                warn!("Upload {} stored but analysis failed: {e}", record.id);
                (None, false, Some(ErrorDetail::from(&e)))
            }
        };

    let image = state.repo.get_image(record.id).await?.unwrap_or(record);
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            image,
            analysis,
            queued,
            analysis_error,
        }),
    ))
}

/// GET /api/v1/images
pub async fn handle_list_images(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<ImageListQuery>,
) -> Result<Json<Vec<ImageWithAnalysis>>, AppError> {
    let filter = params.into_filter(actor.visible_owner())?;
    let images = state.repo.list_images(&filter).await?;
    Ok(Json(attach_analyses(state.repo.as_ref(), images).await?))
}

/// GET /api/v1/images/:id
pub async fn handle_get_image(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageWithAnalysis>, AppError> {
    let image = load_visible_image(&state, &actor, id).await?;
    let analysis = state.repo.get_analysis(id).await?;
    Ok(Json(ImageWithAnalysis { image, analysis }))
}

/// PATCH /api/v1/images/:id
pub async fn handle_update_image(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(update): Json<ImageDetailsUpdate>,
) -> Result<Json<ImageRecord>, AppError> {
    let update = ImageDetailsUpdate {
        title: update.title.map(|t| t.trim().to_string()),
        description: update.description.map(|d| d.trim().to_string()),
        location_name: update.location_name.map(|l| l.trim().to_string()),
        ..update
    };
    validate_details(&update)?;
    load_visible_image(&state, &actor, id).await?;

    let updated = state
        .repo
        .update_image_details(id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {id} not found")))?;
    Ok(Json(updated))
}

/// DELETE /api/v1/images/:id
pub async fn handle_delete_image(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let image = load_visible_image(&state, &actor, id).await?;
    let annotated_key = state
        .repo
        .get_analysis(id)
        .await?
        .and_then(|a| a.annotated_image_key);

    if state.repo.delete_image(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Image {id} not found")));
    }

    blob::delete_quietly(state.blobs.as_ref(), &image.image_key).await;
    if let Some(key) = annotated_key {
        blob::delete_quietly(state.blobs.as_ref(), &key).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/images/:id/file
pub async fn handle_image_file(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let image = load_visible_image(&state, &actor, id).await?;
    let bytes = state.blobs.get(&image.image_key).await?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], bytes).into_response())
}

/// GET /api/v1/images/:id/annotated
pub async fn handle_annotated_file(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    load_visible_image(&state, &actor, id).await?;
    let key = state
        .repo
        .get_analysis(id)
        .await?
        .and_then(|a| a.annotated_image_key)
        .ok_or_else(|| AppError::NotFound(format!("Image {id} has no annotated copy")))?;
    let bytes = state.blobs.get(&key).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

/// POST /api/v1/images/:id/reanalyze
pub async fn handle_reanalyze(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ReanalyzeResponse>), AppError> {
    let image = load_visible_image(&state, &actor, id).await?;
    if !image.is_claimable(state.pipeline.stale_after(), Utc::now()) {
        return Err(AppError::Conflict(format!(
            "Image {id} is already being analysed"
        )));
    }

    match state.queue.dispatch(&state.pipeline, id).await? {
        Dispatch::Completed(result) => Ok((
            StatusCode::OK,
            Json(ReanalyzeResponse {
                message: "Image re-analysed".to_string(),
                status: ImageStatus::Analyzed,
                analysis: Some(result),
            }),
        )),
        Dispatch::Queued => Ok((
            StatusCode::ACCEPTED,
            Json(ReanalyzeResponse {
                message: "Image queued for re-analysis".to_string(),
                status: image.status,
                analysis: None,
            }),
        )),
        Dispatch::Failed(e) => Err(e),
    }
}
