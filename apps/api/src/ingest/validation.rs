use std::path::Path;

use crate::errors::AppError;
use crate::models::image::ImageDetailsUpdate;

pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_LOCATION_CHARS: usize = 255;

/// Checks the payload itself: non-empty, within the size cap, JPEG or PNG.
pub fn validate_payload(
    filename: &str,
    content_type: &str,
    size: usize,
    max_bytes: usize,
) -> Result<(), AppError> {
    if size == 0 {
        return Err(AppError::Validation("Uploaded image is empty".to_string()));
    }
    if size > max_bytes {
        return Err(AppError::Validation(format!(
            "Image file size should not exceed {}MB",
            max_bytes / (1024 * 1024)
        )));
    }

    let content_type = content_type.trim().to_ascii_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::Validation(
            "Only JPEG and PNG images are allowed".to_string(),
        ));
    }

    if let Some(ext) = filename_extension(filename) {
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AppError::Validation(format!(
                "File extension '.{ext}' is not allowed; use .jpg, .jpeg or .png"
            )));
        }
    }
    Ok(())
}

/// Checks the descriptive fields shared by upload and edit.
pub fn validate_details(details: &ImageDetailsUpdate) -> Result<(), AppError> {
    if let Some(title) = &details.title {
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::Validation(format!(
                "Title must be at most {MAX_TITLE_CHARS} characters"
            )));
        }
    }
    if let Some(location) = &details.location_name {
        if location.chars().count() > MAX_LOCATION_CHARS {
            return Err(AppError::Validation(format!(
                "Location name must be at most {MAX_LOCATION_CHARS} characters"
            )));
        }
    }
    if let Some(lat) = details.latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::Validation(
                "Latitude must be between -90 and 90".to_string(),
            ));
        }
    }
    if let Some(lng) = details.longitude {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::Validation(
                "Longitude must be between -180 and 180".to_string(),
            ));
        }
    }
    Ok(())
}

/// Lower-cased extension of a client filename, if it has one.
pub fn filename_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Extension used for the stored blob: the client's if present, else one
/// implied by the content type.
pub fn storage_extension(filename: &str, content_type: &str) -> String {
    filename_extension(filename).unwrap_or_else(|| {
        if content_type.eq_ignore_ascii_case("image/png") {
            "png".to_string()
        } else {
            "jpg".to_string()
        }
    })
}

/// Trims free text; blank becomes `None`.
pub fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
