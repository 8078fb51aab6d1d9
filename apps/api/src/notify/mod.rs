//! Critical-condition alerts.
//!
//! Delivery is fire-and-forget from the pipeline's point of view: a failed send is
//! logged and never undoes a saved analysis.

pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::models::analysis::AnalysisResult;
use crate::models::image::ImageRecord;
use crate::models::user::User;

pub use webhook::WebhookNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("No recipients")]
    NoRecipients,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Used when no channel is configured: records that an alert would have gone out.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        warn!(
            "Notification channel not configured; alert not sent: '{}' to {} recipient(s)",
            notification.subject,
            notification.recipients.len()
        );
        Ok(())
    }
}

/// Builds the alert for a critical result. Recipients are the uploader followed by
/// every admin, without duplicates.
pub fn compose_critical_alert(
    image: &ImageRecord,
    analysis: &AnalysisResult,
    owner: &User,
    admin_emails: &[String],
) -> Notification {
    let location = image
        .location_name
        .as_deref()
        .filter(|s| !s.trim().is_empty());
    let subject = format!(
        "CRITICAL: Road Condition Alert - {}",
        location.unwrap_or("Unknown Location")
    );

    let coordinates = match (image.latitude, image.longitude) {
        (Some(lat), Some(lng)) => format!("{lat:.6}, {lng:.6}"),
        _ => "Not specified".to_string(),
    };

    let body = format!(
        "CRITICAL ROAD CONDITION DETECTED\n\
         \n\
         Location: {location}\n\
         Coordinates: {coordinates}\n\
         Uploaded by: {uploader}\n\
         Upload Date: {uploaded}\n\
         \n\
         ANALYSIS RESULTS:\n\
         -----------------\n\
         Defect Type: {defect}\n\
         Severity Score: {severity:.2}/100\n\
         Condition: {condition}\n\
         AI Confidence: {confidence:.1}%\n\
         \n\
         RECOMMENDATION:\n\
         {suggestion}\n\
         \n\
         Please review and take immediate action.\n\
         \n\
         ---\n\
         RoadHealth AI System\n",
        location = location.unwrap_or("Not specified"),
        uploader = owner.display_name(),
        uploaded = image.upload_date.format("%Y-%m-%d %H:%M"),
        defect = analysis.defect_type.display_name(),
        severity = analysis.severity_score,
        condition = analysis.condition_label.display_name(),
        confidence = analysis.ai_confidence * 100.0,
        suggestion = analysis.maintenance_suggestion,
    );

    let mut recipients = vec![owner.email.clone()];
    for email in admin_emails {
        if !recipients.contains(email) {
            recipients.push(email.clone());
        }
    }

    Notification {
        subject,
        body,
        recipients,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::{ConditionLabel, DefectType};
    use crate::models::image::ImageStatus;
    use crate::models::user::Role;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn owner() -> User {
        User {
            id: Uuid::new_v4(),
            email: "field@example.org".to_string(),
            full_name: "Sam Field".to_string(),
            role: Role::Engineer,
            created_at: Utc::now(),
        }
    }

    fn image(owner: &User, location: Option<&str>) -> ImageRecord {
        ImageRecord {
            id: Uuid::new_v4(),
            user_id: owner.id,
            image_key: "road_images/x.jpg".to_string(),
            original_filename: "x.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            title: None,
            description: None,
            status: ImageStatus::Analyzed,
            latitude: Some(12.5),
            longitude: Some(-3.25),
            location_name: location.map(String::from),
            file_size: 10,
            image_width: None,
            image_height: None,
            upload_date: Utc::now(),
            updated_date: Utc::now(),
        }
    }

    fn analysis(image: &ImageRecord) -> AnalysisResult {
        AnalysisResult {
            id: Uuid::new_v4(),
            image_id: image.id,
            defect_type: DefectType::Crack,
            severity_score: 88.0,
            condition_label: ConditionLabel::Critical,
            ai_confidence: 0.9,
            annotated_image_key: None,
            model_name: "SimpleDetector".to_string(),
            model_version: "1.0".to_string(),
            analysis_metadata: json!({}),
            maintenance_suggestion: "Urgent repair needed. Full depth patching recommended."
                .to_string(),
            analyzed_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_subject_names_location() {
        let owner = owner();
        let img = image(&owner, Some("Main St & 5th"));
        let alert = compose_critical_alert(&img, &analysis(&img), &owner, &[]);
        assert_eq!(alert.subject, "CRITICAL: Road Condition Alert - Main St & 5th");
    }

    #[test]
    fn test_subject_without_location() {
        let owner = owner();
        let img = image(&owner, None);
        let alert = compose_critical_alert(&img, &analysis(&img), &owner, &[]);
        assert_eq!(alert.subject, "CRITICAL: Road Condition Alert - Unknown Location");
    }

    #[test]
    fn test_recipients_are_owner_then_admins_deduplicated() {
        let owner = owner();
        let img = image(&owner, None);
        let admins = vec![
            "ops@example.org".to_string(),
            "field@example.org".to_string(),
        ];
        let alert = compose_critical_alert(&img, &analysis(&img), &owner, &admins);
        assert_eq!(alert.recipients, vec!["field@example.org", "ops@example.org"]);
    }

    #[test]
    fn test_body_carries_results() {
        let owner = owner();
        let img = image(&owner, Some("Bridge Rd"));
        let alert = compose_critical_alert(&img, &analysis(&img), &owner, &[]);
        assert!(alert.body.contains("Defect Type: Crack"));
        assert!(alert.body.contains("Severity Score: 88.00/100"));
        assert!(alert.body.contains("AI Confidence: 90.0%"));
        assert!(alert.body.contains("Uploaded by: Sam Field"));
        assert!(alert.body.contains("Coordinates: 12.500000, -3.250000"));
    }
}
