use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_MODELS: &str = "gemini-2.5-flash,gemini-2.0-flash,gemini-1.5-flash";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    /// Ordered model identifiers for the analysis fallback engine.
    pub models: Vec<String>,
    pub llm_timeout: Duration,
    pub analysis_deadline: Duration,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub s3: Option<S3Config>,
    pub max_upload_bytes: usize,
    /// `None` disables the background cache sweep.
    pub cache_sweep_interval: Option<Duration>,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3 = match optional_env("S3_BUCKET") {
            Some(bucket) => Some(S3Config {
                bucket,
                endpoint: optional_env("S3_ENDPOINT"),
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            None => None,
        };

        let sweep_secs: u64 = parse_env("CACHE_SWEEP_INTERVAL_SECS", 3600)?;

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_base_url: optional_env("GEMINI_BASE_URL")
                .unwrap_or_else(|| crate::llm_client::DEFAULT_BASE_URL.to_string()),
            models: parse_models(
                &optional_env("GEMINI_MODELS").unwrap_or_else(|| DEFAULT_MODELS.to_string()),
            ),
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 120)?),
            analysis_deadline: Duration::from_secs(parse_env("ANALYSIS_DEADLINE_SECS", 600)?),
            data_dir: PathBuf::from(optional_env("DATA_DIR").unwrap_or_else(|| "./data".to_string())),
            database_url: optional_env("DATABASE_URL"),
            s3,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 25 * 1024 * 1024)?,
            cache_sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Defaults for everything except where data lives. No API key.
    #[cfg(test)]
    pub fn for_data_dir(data_dir: &std::path::Path) -> Self {
        Config {
            gemini_api_key: String::new(),
            gemini_base_url: crate::llm_client::DEFAULT_BASE_URL.to_string(),
            models: parse_models(DEFAULT_MODELS),
            llm_timeout: Duration::from_secs(5),
            analysis_deadline: Duration::from_secs(30),
            data_dir: data_dir.to_path_buf(),
            database_url: None,
            s3: None,
            max_upload_bytes: 1024 * 1024,
            cache_sweep_interval: None,
            port: 0,
            rust_log: "info".to_string(),
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join("records").join("proposals")
    }
}

/// Comma-separated, order preserved, blanks and duplicates dropped.
pub fn parse_models(raw: &str) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    for model in raw.split(',').map(str::trim).filter(|m| !m.is_empty()) {
        if !models.iter().any(|m| m == model) {
            models.push(model.to_string());
        }
    }
    models
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
