use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::errors::AppError;
use crate::models::analysis::AnalysisRow;

pub const EXPORT_HEADERS: [&str; 15] = [
    "ID",
    "Image ID",
    "User Email",
    "Upload Date",
    "Location",
    "Latitude",
    "Longitude",
    "Defect Type",
    "Severity Score",
    "Condition",
    "AI Confidence",
    "Model Name",
    "Model Version",
    "Maintenance Suggestion",
    "Analysis Date",
];

const SHEET_NAME: &str = "Analysis Results";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MAX_COLUMN_WIDTH: usize = 50;

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One export line, as text, in `EXPORT_HEADERS` order.
pub fn export_fields(row: &AnalysisRow) -> [String; 15] {
    let (analysis, image) = (&row.analysis, &row.image);
    [
        analysis.id.to_string(),
        image.id.to_string(),
        row.user_email.clone(),
        image.upload_date.format(DATE_FORMAT).to_string(),
        image
            .location_name
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "N/A".to_string()),
        optional_number(image.latitude),
        optional_number(image.longitude),
        analysis.defect_type.display_name().to_string(),
        format!("{:.2}", analysis.severity_score),
        analysis.condition_label.display_name().to_string(),
        format!("{:.4}", analysis.ai_confidence),
        analysis.model_name.clone(),
        analysis.model_version.clone(),
        analysis.maintenance_suggestion.clone(),
        analysis.analyzed_at.format(DATE_FORMAT).to_string(),
    ]
}

pub fn export_csv(rows: &[AnalysisRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(EXPORT_HEADERS)
        .map_err(|e| AppError::Internal(e.into()))?;
    for row in rows {
        writer
            .write_record(export_fields(row))
            .map_err(|e| AppError::Internal(e.into()))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to finish CSV export: {e}")))
}

fn xlsx_error(e: XlsxError) -> AppError {
    AppError::Internal(anyhow::anyhow!("Failed to build XLSX export: {e}"))
}

/// Same columns as the CSV; latitude, longitude, severity and confidence are
/// written as numbers.
pub fn export_xlsx(rows: &[AnalysisRow]) -> Result<Vec<u8>, AppError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME).map_err(xlsx_error)?;

    let mut widths: Vec<usize> = EXPORT_HEADERS.iter().map(|h| h.len()).collect();
    for (col, header) in EXPORT_HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, &header_format)
            .map_err(xlsx_error)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        let fields = export_fields(row);
        for (col, text) in fields.iter().enumerate() {
            let number = match col {
                5 => row.image.latitude,
                6 => row.image.longitude,
                8 => Some(row.analysis.severity_score),
                10 => Some(row.analysis.ai_confidence),
                _ => None,
            };
            match number {
                Some(value) => worksheet.write_number(r, col as u16, value),
                None => worksheet.write_string(r, col as u16, text),
            }
            .map_err(xlsx_error)?;
            widths[col] = widths[col].max(text.chars().count());
        }
    }

    for (col, width) in widths.into_iter().enumerate() {
        worksheet
            .set_column_width(col as u16, (width + 2).min(MAX_COLUMN_WIDTH) as f64)
            .map_err(xlsx_error)?;
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::{AnalysisResult, ConditionLabel, DefectType};
    use crate::models::image::{ImageRecord, ImageStatus};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn row(location: Option<&str>, lat: Option<f64>) -> AnalysisRow {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let image = ImageRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            image_key: "k".to_string(),
            original_filename: "a.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            title: None,
            description: None,
            status: ImageStatus::Analyzed,
            latitude: lat,
            longitude: lat.map(|_| 77.25),
            location_name: location.map(String::from),
            file_size: 1,
            image_width: None,
            image_height: None,
            upload_date: at,
            updated_date: at,
        };
        AnalysisRow {
            analysis: AnalysisResult {
                id: Uuid::new_v4(),
                image_id: image.id,
                defect_type: DefectType::RoughSurface,
                severity_score: 27.456,
                condition_label: ConditionLabel::Moderate,
                ai_confidence: 0.812345,
                annotated_image_key: None,
                model_name: "SimpleDetector".to_string(),
                model_version: "1.0".to_string(),
                analysis_metadata: json!({}),
                maintenance_suggestion: "Surface treatment, recommended, soon".to_string(),
                analyzed_at: at,
                updated_at: at,
            },
            image,
            user_email: "eng@example.org".to_string(),
        }
    }

    #[test]
    fn test_fields_are_formatted() {
        let fields = export_fields(&row(None, None));
        assert_eq!(fields[3], "2024-05-01 08:30:00");
        assert_eq!(fields[4], "N/A");
        assert_eq!(fields[5], "");
        assert_eq!(fields[7], "Rough Surface");
        assert_eq!(fields[8], "27.46");
        assert_eq!(fields[9], "Moderate");
        assert_eq!(fields[10], "0.8123");
    }

    #[test]
    fn test_csv_has_header_and_quoted_rows() {
        let bytes = export_csv(&[row(Some("Ring Rd"), Some(12.5))]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), EXPORT_HEADERS.join(","));
        let line = lines.next().unwrap();
        assert!(line.contains(",Ring Rd,12.5,77.25,Rough Surface,27.46,"));
        assert!(line.contains("\"Surface treatment, recommended, soon\""));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_of_nothing_is_just_the_header() {
        let bytes = export_csv(&[]).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_xlsx_is_a_zip_container() {
        let bytes = export_xlsx(&[row(Some("Ring Rd"), Some(12.5)), row(None, None)]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
