//! Shared fixtures for unit and router tests.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};

use crate::analysis::annotate::Annotator;
use crate::analysis::detector::{ConfidenceSource, EdgeDensityDetector};
use crate::analysis::AnalysisPipeline;
use crate::blob::LocalBlobStore;
use crate::config::{Config, DetectorConfig, StorageConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::jobs::AnalysisQueue;
use crate::notify::testing::RecordingNotifier;
use crate::repo::memory::MemoryRepository;
use crate::state::AppState;

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128])
    })
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(gradient(width, height), ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(gradient(width, height), ImageFormat::Jpeg)
}

/// 25x12 grayscale PNG whose Canny edge density (thresholds 50/150) is exactly 0.20.
///
/// Vertical stripes with an 8-pixel period: four black columns, one mid-grey column,
/// three white. Rows are identical, so every edge is a full interior column: six
/// edge columns over ten interior rows gives 60 edge pixels out of 300.
pub fn crack_stripes_png() -> Vec<u8> {
    let img = GrayImage::from_fn(25, 12, |x, _| match x % 8 {
        0..=3 => Luma([0]),
        4 => Luma([128]),
        _ => Luma([255]),
    });
    let mut out = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), format)
        .unwrap();
    out
}

pub fn test_config(media_root: &std::path::Path) -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        db_max_connections: 1,
        redis_url: None,
        storage: StorageConfig::Local {
            media_root: media_root.to_path_buf(),
        },
        notify_webhook_url: None,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        detector: DetectorConfig {
            seed: Some(1),
            ..DetectorConfig::default()
        },
        analysis_stale_after: std::time::Duration::from_secs(600),
        port: 0,
        rust_log: "debug".to_string(),
    }
}

/// In-memory application wired with the real detector and an inline queue.
pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<MemoryRepository>,
    pub blobs: Arc<LocalBlobStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub _media: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        let config = test_config(media.path());
        let repo = Arc::new(MemoryRepository::new());
        let blobs = Arc::new(LocalBlobStore::new(media.path()));
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = AnalysisPipeline::new(
            repo.clone(),
            blobs.clone(),
            Arc::new(EdgeDensityDetector::new(
                config.detector.canny_low,
                config.detector.canny_high,
                ConfidenceSource::Seeded(1),
            )),
            Arc::new(Annotator::without_font()),
            notifier.clone(),
        )
        .with_stale_after(config.analysis_stale_after);
        let state = AppState {
            repo: repo.clone(),
            blobs: blobs.clone(),
            pipeline,
            queue: AnalysisQueue::Inline,
            config,
        };
        Self {
            state,
            repo,
            blobs,
            notifier,
            _media: media,
        }
    }
}
