use std::sync::Arc;

use crate::analysis::AnalysisPipeline;
use crate::blob::BlobStore;
use crate::config::Config;
use crate::jobs::AnalysisQueue;
use crate::repo::RecordRepository;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn RecordRepository>,
    /// Original uploads and annotated copies. Local filesystem or S3, chosen at startup.
    pub blobs: Arc<dyn BlobStore>,
    pub pipeline: AnalysisPipeline,
    /// Inline unless `REDIS_URL` is set.
    pub queue: AnalysisQueue,
    pub config: Config,
}
