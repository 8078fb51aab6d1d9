use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use super::image::ImageRecord;
use super::UnknownVariant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DefectType {
    Crack,
    Pothole,
    RoughSurface,
    AlligatorCrack,
    EdgeCrack,
    JointCrack,
    NoDefect,
}

impl DefectType {
    pub const ALL: [DefectType; 7] = [
        DefectType::Crack,
        DefectType::Pothole,
        DefectType::RoughSurface,
        DefectType::AlligatorCrack,
        DefectType::EdgeCrack,
        DefectType::JointCrack,
        DefectType::NoDefect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DefectType::Crack => "crack",
            DefectType::Pothole => "pothole",
            DefectType::RoughSurface => "rough_surface",
            DefectType::AlligatorCrack => "alligator_crack",
            DefectType::EdgeCrack => "edge_crack",
            DefectType::JointCrack => "joint_crack",
            DefectType::NoDefect => "no_defect",
        }
    }

    /// Human-readable label used in exports and alerts.
    pub fn display_name(&self) -> &'static str {
        match self {
            DefectType::Crack => "Crack",
            DefectType::Pothole => "Pothole",
            DefectType::RoughSurface => "Rough Surface",
            DefectType::AlligatorCrack => "Alligator Crack",
            DefectType::EdgeCrack => "Edge Crack",
            DefectType::JointCrack => "Joint Crack",
            DefectType::NoDefect => "No Defect",
        }
    }
}

impl FromStr for DefectType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DefectType::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("defect type", s))
    }
}

impl TryFrom<String> for DefectType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Coarse severity bucket. Always derived from the severity score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLabel {
    Good,
    Moderate,
    Poor,
    Critical,
}

impl ConditionLabel {
    pub const ALL: [ConditionLabel; 4] = [
        ConditionLabel::Good,
        ConditionLabel::Moderate,
        ConditionLabel::Poor,
        ConditionLabel::Critical,
    ];

    /// `<25` good, `<50` moderate, `<75` poor, otherwise critical.
    pub fn from_severity(severity: f64) -> Self {
        if severity < 25.0 {
            ConditionLabel::Good
        } else if severity < 50.0 {
            ConditionLabel::Moderate
        } else if severity < 75.0 {
            ConditionLabel::Poor
        } else {
            ConditionLabel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionLabel::Good => "good",
            ConditionLabel::Moderate => "moderate",
            ConditionLabel::Poor => "poor",
            ConditionLabel::Critical => "critical",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ConditionLabel::Good => "Good",
            ConditionLabel::Moderate => "Moderate",
            ConditionLabel::Poor => "Poor",
            ConditionLabel::Critical => "Critical",
        }
    }
}

impl FromStr for ConditionLabel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConditionLabel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("condition label", s))
    }
}

impl TryFrom<String> for ConditionLabel {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub image_id: Uuid,
    #[sqlx(try_from = "String")]
    pub defect_type: DefectType,
    pub severity_score: f64,
    #[sqlx(try_from = "String")]
    pub condition_label: ConditionLabel,
    pub ai_confidence: f64,
    pub annotated_image_key: Option<String>,
    pub model_name: String,
    pub model_version: String,
    pub analysis_metadata: Value,
    pub maintenance_suggestion: String,
    pub analyzed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome ready to be written. Saving it replaces any previous result for the image.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub defect_type: DefectType,
    pub severity_score: f64,
    pub condition_label: ConditionLabel,
    pub ai_confidence: f64,
    pub annotated_image_key: Option<String>,
    pub model_name: String,
    pub model_version: String,
    pub analysis_metadata: Value,
    pub maintenance_suggestion: String,
}

/// An image together with its (optional) analysis, as shown in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ImageWithAnalysis {
    #[serde(flatten)]
    pub image: ImageRecord,
    pub analysis: Option<AnalysisResult>,
}

/// An analysis joined with the image it belongs to and the owner's email,
/// which is what the exporters consume.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRow {
    pub analysis: AnalysisResult,
    pub image: ImageRecord,
    pub user_email: String,
}
