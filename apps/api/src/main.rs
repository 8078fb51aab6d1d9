mod analysis;
mod auth;
mod blob;
mod config;
mod dashboard;
mod db;
mod errors;
mod ingest;
mod jobs;
mod models;
mod notify;
mod reports;
mod repo;
mod routes;
mod state;

#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::annotate::Annotator;
use crate::analysis::detector::{DefectDetector, EdgeDensityDetector};
use crate::analysis::AnalysisPipeline;
use crate::blob::{BlobStore, LocalBlobStore, S3BlobStore};
use crate::config::{Config, StorageConfig};
use crate::db::create_pool;
use crate::jobs::AnalysisQueue;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::repo::postgres::PgRepository;
use crate::repo::RecordRepository;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RoadHealth API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.db_max_connections).await?;
    let repo: Arc<dyn RecordRepository> = Arc::new(PgRepository::new(db));

    // Initialize blob storage
    let blobs: Arc<dyn BlobStore> = match &config.storage {
        StorageConfig::Local { media_root } => {
            info!("Local blob store at {}", media_root.display());
            Arc::new(LocalBlobStore::new(media_root.clone()))
        }
        StorageConfig::S3 {
            bucket,
            endpoint,
            access_key_id,
            secret_access_key,
        } => Arc::new(
            S3BlobStore::connect(endpoint, bucket, access_key_id, secret_access_key).await,
        ),
    };

    // Initialize notifications
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            info!("Critical alerts relayed to webhook");
            Arc::new(WebhookNotifier::new(url.clone())?)
        }
        None => {
            warn!("NOTIFY_WEBHOOK_URL not set; critical alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    // Initialize detector and annotator
    let detector: Arc<dyn DefectDetector> =
        Arc::new(EdgeDensityDetector::from_config(&config.detector));
    let annotator = Annotator::load(config.detector.annotation_font_path.as_deref())?;
    if !annotator.draws_text() {
        info!("ANNOTATION_FONT_PATH not set; annotated images carry the severity bar only");
    }
    info!(
        "Detector: {} v{} (canny {}/{})",
        detector.model_name(),
        detector.model_version(),
        config.detector.canny_low,
        config.detector.canny_high
    );

    let pipeline = AnalysisPipeline::new(
        repo.clone(),
        blobs.clone(),
        detector,
        Arc::new(annotator),
        notifier,
    )
    .with_stale_after(config.analysis_stale_after);

    // Initialize analysis queue (inline unless REDIS_URL is set)
    let queue = AnalysisQueue::from_url(config.redis_url.as_deref())?;
    if let AnalysisQueue::Redis(client) = &queue {
        tokio::spawn(jobs::worker::run(client.clone(), pipeline.clone()));
    }

    // Build app state
    let state = AppState {
        repo,
        blobs,
        pipeline,
        queue,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
