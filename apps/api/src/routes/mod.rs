pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analyses;
use crate::dashboard::handlers as dashboard;
use crate::ingest::handlers as images;
use crate::reports::handlers as reports;
use crate::state::AppState;

/// Multipart framing and text fields on top of the image itself. Oversized images
/// still reach the upload validator and get a 400 rather than a bare 413.
fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.saturating_mul(2)
}

pub fn build_router(state: AppState) -> Router {
    let limit = body_limit(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Account
        .route(
            "/api/v1/me",
            get(dashboard::handle_me).patch(dashboard::handle_update_me),
        )
        .route("/api/v1/me/stats", get(dashboard::handle_my_stats))
        // Images
        .route(
            "/api/v1/images",
            post(images::handle_upload).get(images::handle_list_images),
        )
        .route("/api/v1/images/statistics", get(dashboard::handle_statistics))
        .route(
            "/api/v1/images/:id",
            get(images::handle_get_image)
                .patch(images::handle_update_image)
                .delete(images::handle_delete_image),
        )
        .route("/api/v1/images/:id/file", get(images::handle_image_file))
        .route(
            "/api/v1/images/:id/annotated",
            get(images::handle_annotated_file),
        )
        .route(
            "/api/v1/images/:id/reanalyze",
            post(images::handle_reanalyze),
        )
        // Dashboard
        .route("/api/v1/dashboard", get(dashboard::handle_dashboard))
        .route("/api/v1/map", get(dashboard::handle_map))
        // Analyses
        .route("/api/v1/analyses", get(analyses::handle_list_analyses))
        .route(
            "/api/v1/analyses/critical",
            get(analyses::handle_critical_analyses),
        )
        .route(
            "/api/v1/analyses/by-defect-type",
            get(analyses::handle_analyses_by_defect_type),
        )
        // Reports
        .route("/api/v1/reports/export.csv", get(reports::handle_export_csv))
        .route(
            "/api/v1/reports/export.xlsx",
            get(reports::handle_export_xlsx),
        )
        .route("/api/v1/reports/summary", get(reports::handle_summary_report))
        .route(
            "/api/v1/reports/images/:id",
            get(reports::handle_image_report),
        )
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}
