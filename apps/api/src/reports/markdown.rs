use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::analysis::{AnalysisResult, AnalysisRow, ConditionLabel};
use crate::models::image::ImageRecord;

/// Rows listed in the summary's detail table.
pub const SUMMARY_RECORD_LIMIT: usize = 50;

const LONG_DATE: &str = "%B %d, %Y %I:%M %p";

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("N/A")
}

/// Keeps table cells on one line.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Single-image report. `uploaded_by` is the owner's display name.
pub fn image_report(
    image: &ImageRecord,
    analysis: &AnalysisResult,
    uploaded_by: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# RoadHealth AI");
    let _ = writeln!(out, "## Road Condition Analysis Report\n");
    let _ = writeln!(out, "Generated on {}\n", generated_at.format(LONG_DATE));

    let _ = writeln!(out, "### Image Information\n");
    let _ = writeln!(out, "| Field | Value |\n|---|---|");
    let _ = writeln!(out, "| Uploaded By | {} |", cell(uploaded_by));
    let _ = writeln!(out, "| Upload Date | {} |", image.upload_date.format(LONG_DATE));
    let _ = writeln!(out, "| Title | {} |", cell(or_na(image.title.as_deref())));
    let _ = writeln!(
        out,
        "| Description | {} |",
        cell(or_na(image.description.as_deref()))
    );
    if image.has_location() {
        let (lat, lng) = (
            image.latitude.unwrap_or_default(),
            image.longitude.unwrap_or_default(),
        );
        let location = image
            .location_name
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or("Not specified");
        let _ = writeln!(out, "| Location | {} |", cell(location));
        let _ = writeln!(out, "| Coordinates | {lat}, {lng} |");
    }

    let _ = writeln!(out, "\n### Analysis Results\n");
    let _ = writeln!(out, "| Field | Value |\n|---|---|");
    let _ = writeln!(out, "| Defect Type | {} |", analysis.defect_type.display_name());
    let _ = writeln!(out, "| Severity Score | {:.2} / 100 |", analysis.severity_score);
    let _ = writeln!(
        out,
        "| Condition | **{}** |",
        analysis.condition_label.display_name().to_uppercase()
    );
    let _ = writeln!(out, "| AI Confidence | {:.1}% |", analysis.ai_confidence * 100.0);
    let _ = writeln!(
        out,
        "| Model Used | {} v{} |",
        analysis.model_name, analysis.model_version
    );
    let _ = writeln!(out, "| Analysis Date | {} |", analysis.analyzed_at.format(LONG_DATE));

    let _ = writeln!(out, "\n### Maintenance Recommendation\n");
    let _ = writeln!(out, "{}\n", analysis.maintenance_suggestion);
    let _ = writeln!(out, "---\n");
    let _ = writeln!(
        out,
        "_RoadHealth AI - Automated Pavement Condition Assessment. This report is generated \
         automatically and should be reviewed by qualified engineers._"
    );
    out
}

fn percentage(count: usize, total: usize) -> String {
    if total == 0 {
        "0%".to_string()
    } else {
        format!("{:.1}%", count as f64 / total as f64 * 100.0)
    }
}

/// Condition breakdown plus the first [`SUMMARY_RECORD_LIMIT`] results.
pub fn summary_report(rows: &[AnalysisRow], generated_at: DateTime<Utc>) -> String {
    let total = rows.len();
    let mut out = String::new();
    let _ = writeln!(out, "# RoadHealth AI Summary Report\n");
    let _ = writeln!(out, "Generated on {}\n", generated_at.format("%B %d, %Y"));

    let _ = writeln!(out, "| Condition | Count | Percentage |\n|---|---|---|");
    for condition in [
        ConditionLabel::Critical,
        ConditionLabel::Poor,
        ConditionLabel::Moderate,
        ConditionLabel::Good,
    ] {
        let count = rows
            .iter()
            .filter(|r| r.analysis.condition_label == condition)
            .count();
        let _ = writeln!(
            out,
            "| {} | {count} | {} |",
            condition.display_name(),
            percentage(count, total)
        );
    }
    let _ = writeln!(out, "| Total | {total} | 100% |");

    let _ = writeln!(out, "\n## Detailed Records\n");
    let _ = writeln!(
        out,
        "| ID | Location | Defect | Condition | Severity |\n|---|---|---|---|---|"
    );
    for row in rows.iter().take(SUMMARY_RECORD_LIMIT) {
        let location = truncate(or_na(row.image.location_name.as_deref()), 20);
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {:.1} |",
            row.image.id,
            cell(&location),
            truncate(row.analysis.defect_type.display_name(), 15),
            row.analysis.condition_label.display_name(),
            row.analysis.severity_score
        );
    }
    if total > SUMMARY_RECORD_LIMIT {
        let _ = writeln!(
            out,
            "\n_{} more result(s) not shown._",
            total - SUMMARY_RECORD_LIMIT
        );
    }
    out
}
