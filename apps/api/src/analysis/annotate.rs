use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::Context;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::info;

use super::detector::Detection;
use crate::errors::AppError;
use crate::models::analysis::ConditionLabel;

const BANNER_HEIGHT: u32 = 44;
const BAR_HEIGHT: u32 = 6;
const TEXT_SCALE: f32 = 24.0;
const TEXT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BANNER_COLOR: Rgb<u8> = Rgb([20, 20, 20]);

/// Overlay text summarising a detection, e.g. `CRACK: 60.0% (Conf: 0.83)`.
pub fn annotation_label(detection: &Detection) -> String {
    format!(
        "{}: {:.1}% (Conf: {:.2})",
        detection.defect_type.as_str().to_uppercase(),
        detection.severity_score,
        detection.confidence
    )
}

fn condition_color(condition: ConditionLabel) -> Rgb<u8> {
    match condition {
        ConditionLabel::Good => Rgb([46, 204, 113]),
        ConditionLabel::Moderate => Rgb([241, 196, 15]),
        ConditionLabel::Poor => Rgb([230, 126, 34]),
        ConditionLabel::Critical => Rgb([231, 76, 60]),
    }
}

/// Renders the annotated copy of an analysed image.
///
/// The banner and severity bar are always drawn. The label text needs a TrueType font;
/// without one the banner carries only the bar.
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn without_font() -> Self {
        Self { font: None }
    }

    pub fn load(font_path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = font_path else {
            return Ok(Self::without_font());
        };
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read annotation font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| anyhow::anyhow!("{} is not a valid TrueType font", path.display()))?;
        info!("Annotation font loaded from {}", path.display());
        Ok(Self { font: Some(font) })
    }

    pub fn draws_text(&self) -> bool {
        self.font.is_some()
    }

    /// Returns the annotated image encoded as JPEG.
    pub fn annotate(
        &self,
        image: &DynamicImage,
        detection: &Detection,
        condition: ConditionLabel,
    ) -> Result<Vec<u8>, AppError> {
        let mut canvas: RgbImage = image.to_rgb8();
        let (width, height) = canvas.dimensions();

        if width > 0 && height > 0 {
            let banner_h = BANNER_HEIGHT.min(height);
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(0, 0).of_size(width, banner_h),
                BANNER_COLOR,
            );

            let bar_w = ((detection.severity_score / 100.0) * width as f64)
                .round()
                .clamp(1.0, width as f64) as u32;
            let bar_h = BAR_HEIGHT.min(banner_h);
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(0, (banner_h - bar_h) as i32).of_size(bar_w, bar_h),
                condition_color(condition),
            );

            if let Some(font) = &self.font {
                draw_text_mut(
                    &mut canvas,
                    TEXT_COLOR,
                    10,
                    8,
                    PxScale::from(TEXT_SCALE),
                    font,
                    &annotation_label(detection),
                );
            }
        }

        let mut encoded = Vec::new();
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)
            .map_err(|e| AppError::Analysis(format!("Failed to encode annotated image: {e}")))?;
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::DefectType;
    use serde_json::json;

    fn detection(severity: f64) -> Detection {
        Detection {
            defect_type: DefectType::RoughSurface,
            severity_score: severity,
            confidence: 0.8312,
            metadata: json!({}),
        }
    }

    #[test]
    fn test_label_format() {
        assert_eq!(
            annotation_label(&detection(27.456)),
            "ROUGH_SURFACE: 27.5% (Conf: 0.83)"
        );
    }

    #[test]
    fn test_annotated_output_is_jpeg_with_same_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 80, Rgb([200, 200, 200])));
        let bytes = Annotator::without_font()
            .annotate(&img, &detection(60.0), ConditionLabel::Poor)
            .unwrap();

        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
    }

    #[test]
    fn test_tiny_images_are_annotated_without_panicking() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([0, 0, 0])));
        let bytes = Annotator::without_font()
            .annotate(&img, &detection(0.0), ConditionLabel::Good)
            .unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn test_banner_is_drawn() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([255, 255, 255])));
        let bytes = Annotator::without_font()
            .annotate(&img, &detection(50.0), ConditionLabel::Poor)
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        // Top-left sits inside the dark banner, bottom-right is untouched background.
        assert!(decoded.get_pixel(40, 2).0[0] < 100);
        assert!(decoded.get_pixel(63, 63).0[0] > 200);
    }

    #[test]
    fn test_missing_font_path_is_an_error() {
        assert!(Annotator::load(Some(Path::new("/nonexistent/font.ttf"))).is_err());
        assert!(!Annotator::load(None).unwrap().draws_text());
    }
}
