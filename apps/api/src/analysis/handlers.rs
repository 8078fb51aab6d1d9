use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::auth::Actor;
use crate::errors::AppError;
use crate::ingest::validation::normalize_text;
use crate::models::analysis::{AnalysisRow, ConditionLabel, DefectType};
use crate::repo::AnalysisFilter;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DefectTypeQuery {
    #[serde(rename = "type")]
    pub defect_type: Option<String>,
}

/// GET /api/v1/analyses
pub async fn handle_list_analyses(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<AnalysisRow>>, AppError> {
    let rows = state
        .repo
        .list_analyses(&AnalysisFilter {
            owner: actor.visible_owner(),
            ..AnalysisFilter::default()
        })
        .await?;
    Ok(Json(rows))
}

/// GET /api/v1/analyses/critical
pub async fn handle_critical_analyses(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<AnalysisRow>>, AppError> {
    let rows = state
        .repo
        .list_analyses(&AnalysisFilter {
            owner: actor.visible_owner(),
            condition: Some(ConditionLabel::Critical),
            ..AnalysisFilter::default()
        })
        .await?;
    Ok(Json(rows))
}

/// GET /api/v1/analyses/by-defect-type?type=
pub async fn handle_analyses_by_defect_type(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<DefectTypeQuery>,
) -> Result<Json<Vec<AnalysisRow>>, AppError> {
    let raw = normalize_text(params.defect_type)
        .ok_or_else(|| AppError::Validation("type parameter is required".to_string()))?;
    let defect_type = raw
        .parse::<DefectType>()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let rows = state
        .repo
        .list_analyses(&AnalysisFilter {
            owner: actor.visible_owner(),
            defect_type: Some(defect_type),
            ..AnalysisFilter::default()
        })
        .await?;
    Ok(Json(rows))
}
