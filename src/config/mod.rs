use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use crate::core::error::IngestError;
use crate::core::source::{AlertSource, SourceKind};

/// Runtime configuration. The thresholds here were hard-coded constants
/// in earlier revisions of the pipeline; they are deliberately exposed
/// as configuration with the same defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Total attempts for resilient source kinds, first try included.
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Hard ceiling on one source's fetch-and-process step.
    #[serde(default = "default_source_deadline_secs")]
    pub source_deadline_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_staleness_minutes")]
    pub staleness_minutes: i64,
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,
    #[serde(default = "default_correlation_window_hours")]
    pub correlation_window_hours: i64,
    #[serde(default = "default_weather_grace_hours")]
    pub weather_grace_hours: i64,
    #[serde(default = "default_grace_hours")]
    pub default_grace_hours: i64,
    /// Per-stream cap on the read path's persisted queries.
    #[serde(default = "default_read_limit")]
    pub read_limit: usize,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub source_type: String,
    pub api_endpoint: String,
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub api_key: Option<String>,
}

impl SourceConfig {
    pub fn into_source(self) -> AlertSource {
        let mut configuration = HashMap::new();
        if let Some(key) = self.api_key {
            configuration.insert("api_key".to_string(), key);
        }
        AlertSource {
            kind: SourceKind::from_source_type(&self.source_type),
            id: self.id,
            name: self.name,
            source_type: self.source_type,
            api_endpoint: self.api_endpoint,
            is_active: self.is_active,
            polling_interval_secs: self.polling_interval_secs,
            last_poll_at: None,
            health_status: "unknown".to_string(),
            configuration,
        }
    }
}

pub fn load_config(path: Option<&str>) -> Result<AppConfig, IngestError> {
    let default_path = Path::new("config/alertwatch.toml");
    let path = path.map(Path::new).unwrap_or(default_path);

    if !path.exists() {
        return Ok(default_config());
    }

    let content = fs::read_to_string(path).map_err(|e| IngestError::Config(e.to_string()))?;
    let cfg: AppConfig =
        toml::from_str(&content).map_err(|e| IngestError::Config(e.to_string()))?;
    Ok(cfg)
}

pub fn default_config() -> AppConfig {
    AppConfig {
        db_path: default_db_path(),
        user_agent: default_user_agent(),
        timeout_ms: default_timeout_ms(),
        retry_max_attempts: default_retry_attempts(),
        retry_base_delay_ms: default_retry_base_delay_ms(),
        source_deadline_secs: default_source_deadline_secs(),
        cache_ttl_secs: default_cache_ttl_secs(),
        staleness_minutes: default_staleness_minutes(),
        correlation_threshold: default_correlation_threshold(),
        correlation_window_hours: default_correlation_window_hours(),
        weather_grace_hours: default_weather_grace_hours(),
        default_grace_hours: default_grace_hours(),
        read_limit: default_read_limit(),
        sources: Vec::new(),
    }
}

fn default_db_path() -> String {
    "data/alertwatch.db".to_string()
}
fn default_user_agent() -> String {
    "alertwatch/1.0 (public-safety alert aggregator)".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_retry_attempts() -> u32 {
    4
}
fn default_retry_base_delay_ms() -> u64 {
    1_000
}
fn default_source_deadline_secs() -> u64 {
    60
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_staleness_minutes() -> i64 {
    30
}
fn default_correlation_threshold() -> f64 {
    0.7
}
fn default_correlation_window_hours() -> i64 {
    24
}
fn default_weather_grace_hours() -> i64 {
    2
}
fn default_grace_hours() -> i64 {
    24
}
fn default_read_limit() -> usize {
    50
}
fn default_polling_interval() -> i64 {
    300
}
fn default_true() -> bool {
    true
}
