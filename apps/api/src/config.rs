use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// 10 MB upload ceiling.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Where original and annotated images are kept.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local {
        media_root: PathBuf,
    },
    S3 {
        bucket: String,
        endpoint: String,
        access_key_id: String,
        secret_access_key: String,
    },
}

/// Tuning knobs for the edge-density detector.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    /// When set, confidence is derived from this seed instead of a fresh RNG.
    pub seed: Option<u64>,
    pub annotation_font_path: Option<PathBuf>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            seed: None,
            annotation_font_path: None,
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub redis_url: Option<String>,
    pub storage: StorageConfig,
    pub notify_webhook_url: Option<String>,
    pub max_upload_bytes: usize,
    pub detector: DetectorConfig,
    /// How long a `processing` claim may sit untouched before another run may take it.
    pub analysis_stale_after: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage = match optional_env("STORAGE_BACKEND").as_deref() {
            None | Some("local") => StorageConfig::Local {
                media_root: optional_env("MEDIA_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./media")),
            },
            Some("s3") => StorageConfig::S3 {
                bucket: require_env("S3_BUCKET")?,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            },
            Some(other) => bail!("STORAGE_BACKEND must be 'local' or 's3', got '{other}'"),
        };

        let detector = DetectorConfig {
            canny_low: parse_env("CANNY_LOW", 50.0)?,
            canny_high: parse_env("CANNY_HIGH", 150.0)?,
            seed: optional_env("DETECTOR_SEED")
                .map(|s| s.parse::<u64>())
                .transpose()
                .context("DETECTOR_SEED must be an unsigned integer")?,
            annotation_font_path: optional_env("ANNOTATION_FONT_PATH").map(PathBuf::from),
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            db_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: optional_env("REDIS_URL"),
            storage,
            notify_webhook_url: optional_env("NOTIFY_WEBHOOK_URL"),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            detector,
            analysis_stale_after: Duration::from_secs(parse_env("ANALYSIS_STALE_SECS", 600)?),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and empty are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}
