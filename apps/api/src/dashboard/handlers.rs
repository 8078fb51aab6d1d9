use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::map::{map_markers, MapMarker};
use super::stats::{compute_statistics, user_stats, ImageStatistics, UserStats};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::ingest::handlers::{attach_analyses, ImageListQuery};
use crate::models::analysis::ImageWithAnalysis;
use crate::models::image::ImageRecord;
use crate::models::user::User;
use crate::repo::ImageFilter;
use crate::state::AppState;

const RECENT_LIMIT: usize = 10;
const MAX_FULL_NAME_CHARS: usize = 150;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub statistics: ImageStatistics,
    pub recent_images: Vec<ImageWithAnalysis>,
}

/// Statistics over the filtered set, plus the set itself (newest first).
async fn statistics_for(
    state: &AppState,
    filter: &ImageFilter,
) -> Result<(ImageStatistics, Vec<ImageRecord>), AppError> {
    let images = state.repo.list_images(filter).await?;
    let ids: Vec<Uuid> = images.iter().map(|i| i.id).collect();
    let analyses = state.repo.analyses_for_images(&ids).await?;
    Ok((compute_statistics(&images, &analyses), images))
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: String,
}

/// GET /api/v1/me
pub async fn handle_me(actor: Actor) -> Json<User> {
    Json(actor.0)
}

/// PATCH /api/v1/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    actor: Actor,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    let full_name = update.full_name.trim();
    if full_name.chars().count() > MAX_FULL_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "Full name must be at most {MAX_FULL_NAME_CHARS} characters"
        )));
    }

    let id = actor.user().id;
    let user = state
        .repo
        .update_user_full_name(id, full_name)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(user))
}

/// GET /api/v1/me/stats
pub async fn handle_my_stats(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<UserStats>, AppError> {
    let own = state
        .repo
        .list_images(&ImageFilter {
            owner: Some(actor.user().id),
            ..ImageFilter::default()
        })
        .await?;
    Ok(Json(user_stats(actor.user(), &own)))
}

/// GET /api/v1/images/statistics
pub async fn handle_statistics(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<ImageStatistics>, AppError> {
    let filter = ImageFilter {
        owner: actor.visible_owner(),
        ..ImageFilter::default()
    };
    let (statistics, _) = statistics_for(&state, &filter).await?;
    Ok(Json(statistics))
}

/// GET /api/v1/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<ImageListQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    let filter = params.into_filter(actor.visible_owner())?;

    let (statistics, mut images) = statistics_for(&state, &filter).await?;
    images.truncate(RECENT_LIMIT);
    let recent_images = attach_analyses(state.repo.as_ref(), images).await?;

    Ok(Json(DashboardResponse {
        statistics,
        recent_images,
    }))
}

/// GET /api/v1/map
pub async fn handle_map(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<MapMarker>>, AppError> {
    let images = state
        .repo
        .list_images(&ImageFilter {
            owner: actor.visible_owner(),
            geotagged_only: true,
            ..ImageFilter::default()
        })
        .await?;
    let rows = attach_analyses(state.repo.as_ref(), images).await?;
    Ok(Json(map_markers(&rows)))
}
