use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UnknownVariant;

/// Lifecycle of an uploaded image.
///
/// `Analyzed` is the only success state. A record in `Processing` cannot be
/// claimed again until the running analysis settles it or the claim goes stale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    Processing,
    Analyzed,
    Failed,
}

impl ImageStatus {
    pub const ALL: [ImageStatus; 4] = [
        ImageStatus::Pending,
        ImageStatus::Processing,
        ImageStatus::Analyzed,
        ImageStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Processing => "processing",
            ImageStatus::Analyzed => "analyzed",
            ImageStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: ImageStatus) -> bool {
        match (self, next) {
            (ImageStatus::Processing, ImageStatus::Analyzed | ImageStatus::Failed) => true,
            (ImageStatus::Processing, ImageStatus::Processing) => false,
            (_, ImageStatus::Processing) => true,
            _ => false,
        }
    }
}

impl FromStr for ImageStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImageStatus::Pending),
            "processing" => Ok(ImageStatus::Processing),
            "analyzed" => Ok(ImageStatus::Analyzed),
            "failed" => Ok(ImageStatus::Failed),
            other => Err(UnknownVariant::new("image status", other)),
        }
    }
}

impl TryFrom<String> for ImageStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ImageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_key: String,
    pub original_filename: String,
    pub content_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ImageStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    pub file_size: i64,
    pub image_width: Option<i32>,
    pub image_height: Option<i32>,
    pub upload_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

impl ImageRecord {
    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// A `processing` claim untouched for `stale_after` belongs to a run that died
    /// (cancelled request, crashed worker) and may be taken over.
    pub fn has_stale_claim(&self, stale_after: Duration, now: DateTime<Utc>) -> bool {
        if self.status != ImageStatus::Processing {
            return false;
        }
        match chrono::Duration::from_std(stale_after) {
            Ok(limit) => now - self.updated_date >= limit,
            Err(_) => false,
        }
    }

    /// Whether a new analysis may claim this record now.
    pub fn is_claimable(&self, stale_after: Duration, now: DateTime<Utc>) -> bool {
        self.status.can_transition_to(ImageStatus::Processing)
            || self.has_stale_claim(stale_after, now)
    }
}

/// Everything the repository needs to insert a freshly uploaded image.
/// Status always starts at `pending`.
#[derive(Debug, Clone)]
pub struct NewImageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_key: String,
    pub original_filename: String,
    pub content_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    pub file_size: i64,
    pub image_width: Option<i32>,
    pub image_height: Option<i32>,
}

/// Editable descriptive fields. `None` leaves a field untouched; an empty string
/// clears a text field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageDetailsUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
}
