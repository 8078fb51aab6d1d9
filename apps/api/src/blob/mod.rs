//! Durable blob storage for original and annotated images.
//!
//! `AppState` holds an `Arc<dyn BlobStore>`; the backend is chosen at startup from
//! `STORAGE_BACKEND`.

pub mod local;
pub mod s3;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;

pub use local::LocalBlobStore;
pub use s3::S3BlobStore;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// `road_images/YYYY/MM/DD/<id>.<ext>`
pub fn original_image_key(id: Uuid, extension: &str, at: DateTime<Utc>) -> String {
    format!("road_images/{}/{}.{}", at.format("%Y/%m/%d"), id, extension)
}

/// `annotated_images/YYYY/MM/DD/<id>_<run>_annotated.jpg`
///
/// Each analysis run writes its own key, so a run never overwrites the copy the
/// stored result still points at.
pub fn annotated_image_key(id: Uuid, run: Uuid, at: DateTime<Utc>) -> String {
    format!(
        "annotated_images/{}/{}_{}_annotated.jpg",
        at.format("%Y/%m/%d"),
        id,
        run.simple()
    )
}

/// Best-effort removal used on cleanup paths; failures are only logged.
pub async fn delete_quietly(store: &dyn BlobStore, key: &str) {
    if let Err(e) = store.delete(key).await {
        tracing::warn!("Failed to remove blob {key}: {e}");
    }
}
