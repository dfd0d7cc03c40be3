//! Configuration management
//!
//! Loads the enumerated tunables from a TOML file (default `config.toml`),
//! with `SCENEPIPE_*` environment variable overrides layered on top, and
//! falls back field-by-field to the defaults below when a key is absent.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Video-note emission mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoMode {
    /// Only the first segment's scenes carry a video.
    Basic,
    /// Every scene carries a video.
    Full,
}

impl Default for VideoMode {
    fn default() -> Self {
        VideoMode::Basic
    }
}

/// Duplicate-prompt detection comparison mode (spec open question,
/// resolved as a tunable rather than a guessed constant).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMode {
    Exact,
    Normalized,
}

impl Default for DuplicateMode {
    fn default() -> Self {
        DuplicateMode::Exact
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateDetectionConfig {
    pub mode: DuplicateMode,
    pub threshold: f64,
}

impl Default for DuplicateDetectionConfig {
    fn default() -> Self {
        Self {
            mode: DuplicateMode::default(),
            threshold: 0.8,
        }
    }
}

/// Top-level pipeline configuration. See spec.md §6 "Configuration".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_parallel_api: usize,
    pub stage6_batch_size: usize,
    pub stage7_batch_size: usize,
    pub llm_retry_max: u32,
    pub llm_retry_base_seconds: u64,
    pub llm_request_timeout_seconds: u64,
    pub video_mode: VideoMode,
    pub scan_interval_seconds: u64,
    pub inbox_dir: String,
    pub projects_dir: String,
    pub llm_endpoint: String,
    pub llm_model: String,
    pub llm_api_keys: Vec<String>,
    pub duplicate_detection: DuplicateDetectionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_parallel_api: 10,
            stage6_batch_size: 15,
            stage7_batch_size: 10,
            llm_retry_max: 15,
            llm_retry_base_seconds: 3,
            llm_request_timeout_seconds: 120,
            video_mode: VideoMode::Basic,
            scan_interval_seconds: 60,
            inbox_dir: "INBOX".to_string(),
            projects_dir: "PROJECTS".to_string(),
            llm_endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            llm_model: "gpt-4".to_string(),
            llm_api_keys: Vec::new(),
            duplicate_detection: DuplicateDetectionConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `path` (if it exists), layering
    /// `SCENEPIPE_*` environment variables on top, and defaulting any
    /// field neither source sets.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&PipelineConfig::default())?);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        }

        let builder = builder.add_source(
            config::Environment::with_prefix("SCENEPIPE")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }

    /// The next API key to use, rotating by call count so 429s advance
    /// through the configured pool.
    pub fn api_key_for_attempt(&self, attempt: u32) -> Option<&str> {
        if self.llm_api_keys.is_empty() {
            return None;
        }
        let idx = (attempt as usize) % self.llm_api_keys.len();
        Some(self.llm_api_keys[idx].as_str())
    }
}
