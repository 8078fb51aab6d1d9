use serde::Serialize;

use crate::models::analysis::{AnalysisResult, ConditionLabel, DefectType};
use crate::models::image::{ImageRecord, ImageStatus};
use crate::models::user::{Role, User};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectCount {
    pub defect_type: DefectType,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionCount {
    pub condition_label: ConditionLabel,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageStatistics {
    pub total_images: usize,
    pub pending_images: usize,
    pub processing_images: usize,
    pub analyzed_images: usize,
    pub failed_images: usize,
    /// Every defect type, zero counts included.
    pub defect_stats: Vec<DefectCount>,
    /// Every condition label, zero counts included.
    pub severity_stats: Vec<ConditionCount>,
    /// Mean severity of the analyses, 2 dp; 0 when there are none.
    pub avg_severity: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `analyses` must belong to `images`; callers fetch them for exactly that set.
pub fn compute_statistics(images: &[ImageRecord], analyses: &[AnalysisResult]) -> ImageStatistics {
    let count_status = |status: ImageStatus| images.iter().filter(|i| i.status == status).count();

    let defect_stats = DefectType::ALL
        .into_iter()
        .map(|defect_type| DefectCount {
            defect_type,
            count: analyses.iter().filter(|a| a.defect_type == defect_type).count(),
        })
        .collect();

    let severity_stats = ConditionLabel::ALL
        .into_iter()
        .map(|condition_label| ConditionCount {
            condition_label,
            count: analyses
                .iter()
                .filter(|a| a.condition_label == condition_label)
                .count(),
        })
        .collect();

    let avg_severity = if analyses.is_empty() {
        0.0
    } else {
        let total: f64 = analyses.iter().map(|a| a.severity_score).sum();
        round2(total / analyses.len() as f64)
    };

    ImageStatistics {
        total_images: images.len(),
        pending_images: count_status(ImageStatus::Pending),
        processing_images: count_status(ImageStatus::Processing),
        analyzed_images: count_status(ImageStatus::Analyzed),
        failed_images: count_status(ImageStatus::Failed),
        defect_stats,
        severity_stats,
        avg_severity,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub total_uploads: usize,
    pub analyzed_images: usize,
    pub pending_images: usize,
    pub user_role: Role,
    pub full_name: String,
}

/// Counts over the user's own uploads, regardless of role.
pub fn user_stats(user: &User, own_images: &[ImageRecord]) -> UserStats {
    UserStats {
        total_uploads: own_images.len(),
        analyzed_images: own_images
            .iter()
            .filter(|i| i.status == ImageStatus::Analyzed)
            .count(),
        pending_images: own_images
            .iter()
            .filter(|i| i.status == ImageStatus::Pending)
            .count(),
        user_role: user.role,
        full_name: user.display_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn image(status: ImageStatus) -> ImageRecord {
        ImageRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            image_key: "k".to_string(),
            original_filename: "a.png".to_string(),
            content_type: "image/png".to_string(),
            title: None,
            description: None,
            status,
            latitude: None,
            longitude: None,
            location_name: None,
            file_size: 1,
            image_width: None,
            image_height: None,
            upload_date: Utc::now(),
            updated_date: Utc::now(),
        }
    }

    fn analysis(image: &ImageRecord, defect_type: DefectType, severity: f64) -> AnalysisResult {
        AnalysisResult {
            id: Uuid::new_v4(),
            image_id: image.id,
            defect_type,
            severity_score: severity,
            condition_label: ConditionLabel::from_severity(severity),
            ai_confidence: 0.8,
            annotated_image_key: None,
            model_name: "SimpleDetector".to_string(),
            model_version: "1.0".to_string(),
            analysis_metadata: json!({}),
            maintenance_suggestion: String::new(),
            analyzed_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_set() {
        let stats = compute_statistics(&[], &[]);
        assert_eq!(stats.total_images, 0);
        assert_eq!(stats.avg_severity, 0.0);
        assert_eq!(stats.defect_stats.len(), 7);
        assert!(stats.severity_stats.iter().all(|c| c.count == 0));
    }

    #[test]
    fn test_counts_and_average() {
        let images = vec![
            image(ImageStatus::Analyzed),
            image(ImageStatus::Analyzed),
            image(ImageStatus::Pending),
            image(ImageStatus::Failed),
        ];
        let analyses = vec![
            analysis(&images[0], DefectType::Crack, 60.0),
            analysis(&images[1], DefectType::EdgeCrack, 13.34),
        ];

        let stats = compute_statistics(&images, &analyses);

        assert_eq!(stats.total_images, 4);
        assert_eq!(stats.analyzed_images, 2);
        assert_eq!(stats.pending_images, 1);
        assert_eq!(stats.processing_images, 0);
        assert_eq!(stats.failed_images, 1);
        assert_eq!(stats.avg_severity, 36.67);

        let crack = stats
            .defect_stats
            .iter()
            .find(|d| d.defect_type == DefectType::Crack)
            .unwrap();
        assert_eq!(crack.count, 1);
        let poor = stats
            .severity_stats
            .iter()
            .find(|c| c.condition_label == ConditionLabel::Poor)
            .unwrap();
        assert_eq!(poor.count, 1);
    }

    #[test]
    fn test_user_stats_uses_display_name() {
        let user = User {
            id: Uuid::nil(),
            email: "x@example.org".to_string(),
            full_name: String::new(),
            role: Role::Viewer,
            created_at: Utc::now(),
        };
        let stats = user_stats(
            &user,
            &[image(ImageStatus::Pending), image(ImageStatus::Analyzed)],
        );
        assert_eq!(stats.total_uploads, 2);
        assert_eq!(stats.analyzed_images, 1);
        assert_eq!(stats.pending_images, 1);
        assert_eq!(stats.full_name, "x@example.org");
    }
}
