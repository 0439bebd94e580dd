use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CAP-style severity, closed set. Out-of-set wire values fail at the
/// serde boundary rather than leaking into the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Extreme,
    Severe,
    Moderate,
    Minor,
    Info,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Urgency {
    Immediate,
    Expected,
    Future,
    Past,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Status {
    Actual,
    Exercise,
    System,
    Test,
    Draft,
    Unknown,
}

/// Upstream feed operator, derived from the configured source type string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FeedSource {
    #[serde(rename = "Alert Ready")]
    AlertReady,
    #[serde(rename = "BC Emergency")]
    BcEmergency,
    Everbridge,
    Other,
}

impl FeedSource {
    pub fn label(&self) -> &'static str {
        match self {
            FeedSource::AlertReady => "Alert Ready",
            FeedSource::BcEmergency => "BC Emergency",
            FeedSource::Everbridge => "Everbridge",
            FeedSource::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn in_bounds(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Canonical normalized alert record. Every upstream item, whatever its
/// wire format, is mapped into this shape before persistence.
///
/// `id` is the natural key (source guid, else link, else a generated
/// hash); re-ingesting the same upstream item upserts, never duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UniversalAlert {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub urgency: Urgency,
    pub category: String,
    pub status: Status,
    pub area: String,
    pub published: DateTime<Utc>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub source: FeedSource,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

/// Semantic category a classified alert falls into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Weather,
    Security,
    Immigration,
    Travel,
    General,
}

impl AlertKind {
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::Weather => "weather",
            AlertKind::Security => "security",
            AlertKind::Immigration => "immigration",
            AlertKind::Travel => "travel",
            AlertKind::General => "general",
        }
    }

    /// Storage stream the alert is routed into. Travel advisories share
    /// the general stream.
    pub fn stream(&self) -> &'static str {
        match self {
            AlertKind::Weather => "weather",
            AlertKind::Security => "security",
            AlertKind::Immigration => "immigration",
            AlertKind::Travel | AlertKind::General => "general",
        }
    }
}

/// Derived classification, attached at read time. Not persisted as truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertClassification {
    pub kind: AlertKind,
    pub subtype: String,
    pub icon: String,
    pub urgency_score: f64,
    pub relevance_score: f64,
    pub is_routine: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedAlert {
    #[serde(flatten)]
    pub alert: UniversalAlert,
    pub classification: AlertClassification,
}
