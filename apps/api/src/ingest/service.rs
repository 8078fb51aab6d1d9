use std::io::Cursor;

use chrono::Utc;
use image::ImageReader;
use tracing::{info, warn};
use uuid::Uuid;

use super::validation::{normalize_text, storage_extension, validate_details, validate_payload};
use crate::blob::{self, BlobStore};
use crate::errors::AppError;
use crate::models::image::{ImageDetailsUpdate, ImageRecord, NewImageRecord};
use crate::repo::RecordRepository;

/// A parsed upload, before validation.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
}

/// Reads width and height from the image header. `None` if the header is unreadable.
pub fn read_dimensions(bytes: &[u8]) -> Option<(i32, i32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some((i32::try_from(width).ok()?, i32::try_from(height).ok()?))
}

/// Validates and stores an upload, creating one `pending` record.
///
/// The blob is written before the row; if the insert fails the blob is removed.
pub async fn ingest_upload(
    repo: &dyn RecordRepository,
    blobs: &dyn BlobStore,
    owner: Uuid,
    form: UploadForm,
    max_bytes: usize,
) -> Result<ImageRecord, AppError> {
    validate_payload(&form.filename, &form.content_type, form.bytes.len(), max_bytes)?;

    let details = ImageDetailsUpdate {
        title: normalize_text(form.title),
        description: normalize_text(form.description),
        latitude: form.latitude,
        longitude: form.longitude,
        location_name: normalize_text(form.location_name),
    };
    validate_details(&details)?;

    let dimensions = read_dimensions(&form.bytes);
    if dimensions.is_none() {
        warn!("Could not read dimensions of upload '{}'", form.filename);
    }

    let id = Uuid::new_v4();
    let content_type = form.content_type.trim().to_ascii_lowercase();
    let key = blob::original_image_key(
        id,
        &storage_extension(&form.filename, &content_type),
        Utc::now(),
    );
    let file_size = form.bytes.len() as i64;

    blobs.put(&key, form.bytes, &content_type).await?;

    let new_record = NewImageRecord {
        id,
        user_id: owner,
        image_key: key.clone(),
        original_filename: form.filename,
        content_type,
        title: details.title,
        description: details.description,
        latitude: details.latitude,
        longitude: details.longitude,
        location_name: details.location_name,
        file_size,
        image_width: dimensions.map(|(w, _)| w),
        image_height: dimensions.map(|(_, h)| h),
    };

    match repo.insert_image(&new_record).await {
        Ok(record) => {
            info!("Stored upload {} ({} bytes) for user {owner}", record.id, file_size);
            Ok(record)
        }
        Err(e) => {
            blob::delete_quietly(blobs, &key).await;
            Err(e)
        }
    }
}
