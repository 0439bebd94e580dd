use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed dispatch variant for a feed, resolved once from the raw
/// `source_type` string when the source is registered. Parser choice,
/// Accept headers and retry policy all key off this, not the raw string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    WeatherGeocmet,
    SecurityRss,
    Policy,
    EmergencyJson,
    Generic,
}

impl SourceKind {
    pub fn from_source_type(raw: &str) -> Self {
        let t = raw.to_lowercase();
        if t.contains("geocmet") || t.contains("weather") {
            SourceKind::WeatherGeocmet
        } else if t.contains("security-rss") || t.contains("rss") {
            SourceKind::SecurityRss
        } else if t.contains("policy") {
            SourceKind::Policy
        } else if t.contains("emergency") || t.contains("broadcast") {
            SourceKind::EmergencyJson
        } else {
            SourceKind::Generic
        }
    }

    /// Kinds whose upstreams are flaky enough to warrant the retry loop.
    pub fn is_resilient(&self) -> bool {
        matches!(self, SourceKind::WeatherGeocmet | SourceKind::SecurityRss)
    }

    pub fn accept_header(&self) -> &'static str {
        match self {
            SourceKind::WeatherGeocmet => "application/geo+json, application/json, application/xml",
            SourceKind::SecurityRss | SourceKind::Policy => {
                "application/rss+xml, application/xml, text/xml"
            }
            SourceKind::EmergencyJson | SourceKind::Generic => {
                "application/json, application/xml"
            }
        }
    }
}

/// Configuration and poll state for one upstream feed. Created by the
/// admin surface (out of scope); mutated here after each poll attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSource {
    pub id: String,
    pub name: String,
    pub source_type: String,
    pub kind: SourceKind,
    pub api_endpoint: String,
    pub is_active: bool,
    pub polling_interval_secs: i64,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub health_status: String,
    #[serde(default)]
    pub configuration: HashMap<String, String>,
}

impl AlertSource {
    pub fn api_key(&self) -> Option<&str> {
        self.configuration.get("api_key").map(String::as_str)
    }
}

/// Append-only record of one terminal fetch outcome. Never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetric {
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub response_time_ms: i64,
    pub records_processed: i64,
    pub error_message: Option<String>,
    pub http_status_code: Option<u16>,
}

/// Semantic link between two incidents, keyed on the ordered id pair so
/// repeated correlation passes upsert instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrelationEdge {
    pub primary_incident_id: String,
    pub related_incident_id: String,
    pub correlation_type: String,
    pub confidence_score: f64,
}

impl CorrelationEdge {
    /// Build an edge with the two ids in lexicographic order.
    pub fn semantic(a: &str, b: &str, confidence: f64) -> Self {
        let (primary, related) = if a <= b { (a, b) } else { (b, a) };
        Self {
            primary_incident_id: primary.to_string(),
            related_incident_id: related.to_string(),
            correlation_type: "semantic".to_string(),
            confidence_score: confidence,
        }
    }
}
