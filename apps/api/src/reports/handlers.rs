use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::export::{export_csv, export_xlsx};
use super::markdown::{image_report, summary_report};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::ingest::handlers::load_visible_image;
use crate::ingest::validation::normalize_text;
use crate::models::analysis::{AnalysisRow, ConditionLabel};
use crate::repo::AnalysisFilter;
use crate::state::AppState;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub condition: Option<String>,
}

async fn visible_rows(
    state: &AppState,
    actor: &Actor,
    query: ExportQuery,
) -> Result<Vec<AnalysisRow>, AppError> {
    let condition = normalize_text(query.condition)
        .map(|c| c.parse::<ConditionLabel>())
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    state
        .repo
        .list_analyses(&AnalysisFilter {
            owner: actor.visible_owner(),
            condition,
            ..AnalysisFilter::default()
        })
        .await
}

fn attachment(content_type: &str, filename: String, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /api/v1/reports/export.csv
pub async fn handle_export_csv(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let rows = visible_rows(&state, &actor, query).await?;
    let body = export_csv(&rows)?;
    let filename = format!(
        "road_analysis_export_{}.csv",
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    Ok(attachment("text/csv", filename, body))
}

/// GET /api/v1/reports/export.xlsx
pub async fn handle_export_xlsx(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let rows = visible_rows(&state, &actor, query).await?;
    let body = tokio::task::spawn_blocking(move || export_xlsx(&rows))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    let filename = format!(
        "road_analysis_export_{}.xlsx",
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    Ok(attachment(XLSX_CONTENT_TYPE, filename, body))
}

/// GET /api/v1/reports/summary
pub async fn handle_summary_report(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Response, AppError> {
    let rows = visible_rows(&state, &actor, ExportQuery::default()).await?;
    let report = summary_report(&rows, Utc::now());
    Ok(([(header::CONTENT_TYPE, MARKDOWN_CONTENT_TYPE)], report).into_response())
}

/// GET /api/v1/reports/images/:id
pub async fn handle_image_report(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let image = load_visible_image(&state, &actor, id).await?;
    let analysis = state
        .repo
        .get_analysis(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Analysis not found for this image".to_string()))?;

    let uploaded_by = match state.repo.get_user(image.user_id).await? {
        Some(owner) => owner.display_name().to_string(),
        None => "Unknown".to_string(),
    };
    let report = image_report(&image, &analysis, &uploaded_by, Utc::now());
    Ok(([(header::CONTENT_TYPE, MARKDOWN_CONTENT_TYPE)], report).into_response())
}
