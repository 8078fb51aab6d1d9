use serde::Serialize;
use uuid::Uuid;

use crate::models::analysis::{ConditionLabel, DefectType, ImageWithAnalysis};
use crate::models::image::ImageStatus;

const DEFAULT_MARKER_TITLE: &str = "Road Image";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    pub status: ImageStatus,
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<ConditionLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defect_type: Option<DefectType>,
}

/// One marker per geotagged record; records without both coordinates are skipped.
pub fn map_markers(rows: &[ImageWithAnalysis]) -> Vec<MapMarker> {
    rows.iter()
        .filter_map(|row| {
            let image = &row.image;
            let (lat, lng) = (image.latitude?, image.longitude?);
            Some(MapMarker {
                id: image.id,
                lat,
                lng,
                title: image
                    .title
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| DEFAULT_MARKER_TITLE.to_string()),
                status: image.status,
                location: image.location_name.clone(),
                severity: row.analysis.as_ref().map(|a| a.condition_label),
                defect_type: row.analysis.as_ref().map(|a| a.defect_type),
            })
        })
        .collect()
}
