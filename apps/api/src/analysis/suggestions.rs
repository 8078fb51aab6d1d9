use crate::models::analysis::{ConditionLabel, DefectType};

pub const FALLBACK_SUGGESTION: &str = "Consult with a road engineer for proper assessment.";

use ConditionLabel::{Critical, Good, Moderate, Poor};
use DefectType::{
    AlligatorCrack, Crack, EdgeCrack, JointCrack, NoDefect, Pothole, RoughSurface,
};

const SUGGESTIONS: &[(DefectType, ConditionLabel, &str)] = &[
    (Crack, Good, "Monitor regularly. Minor crack sealing recommended."),
    (Crack, Moderate, "Apply crack sealing treatment within 3 months."),
    (Crack, Poor, "Immediate crack repair required. Consider surface overlay."),
    (Crack, Critical, "Urgent repair needed. Full depth patching recommended."),
    (Pothole, Good, "Fill small potholes with cold-mix asphalt."),
    (Pothole, Moderate, "Clean and fill potholes using hot-mix asphalt."),
    (Pothole, Poor, "Extensive pothole repair required. Consider area patching."),
    (Pothole, Critical, "Emergency repair needed. Road closure may be necessary."),
    (RoughSurface, Good, "Schedule routine maintenance and surface leveling."),
    (RoughSurface, Moderate, "Surface milling and overlay recommended."),
    (RoughSurface, Poor, "Major resurfacing required within 6 months."),
    (RoughSurface, Critical, "Complete road reconstruction needed."),
    (AlligatorCrack, Good, "Monitor and seal cracks to prevent water infiltration."),
    (AlligatorCrack, Moderate, "Remove and replace affected pavement section."),
    (AlligatorCrack, Poor, "Full depth reconstruction required."),
    (
        AlligatorCrack,
        Critical,
        "Immediate structural repair needed. Subbase may be compromised.",
    ),
    (EdgeCrack, Good, "Seal cracks and improve edge drainage."),
    (EdgeCrack, Moderate, "Edge repair with shoulder reconstruction."),
    (EdgeCrack, Poor, "Edge wedge joint repair and shoulder stabilization."),
    (
        EdgeCrack,
        Critical,
        "Complete edge reconstruction with drainage improvement.",
    ),
    (JointCrack, Good, "Seal joints to prevent water intrusion."),
    (JointCrack, Moderate, "Clean and reseal joints with appropriate materials."),
    (JointCrack, Poor, "Joint replacement and repair required."),
    (JointCrack, Critical, "Urgent joint repair with load transfer restoration."),
    (NoDefect, Good, "Road in excellent condition. Continue regular inspections."),
    (NoDefect, Moderate, "No immediate action required."),
    (NoDefect, Poor, "No immediate action required."),
    (NoDefect, Critical, "No immediate action required."),
];

/// Recommended maintenance for a (defect, condition) pair.
pub fn maintenance_suggestion(defect: DefectType, condition: ConditionLabel) -> &'static str {
    SUGGESTIONS
        .iter()
        .find(|(d, c, _)| *d == defect && *c == condition)
        .map(|(_, _, text)| *text)
        .unwrap_or(FALLBACK_SUGGESTION)
}

/// Keeps an explicitly supplied suggestion, otherwise derives one.
pub fn resolve_suggestion(
    supplied: Option<&str>,
    defect: DefectType,
    condition: ConditionLabel,
) -> String {
    match supplied.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => text.to_string(),
        None => maintenance_suggestion(defect, condition).to_string(),
    }
}
