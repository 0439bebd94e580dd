use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::core::alert::{Coordinates, FeedSource, Severity, Status, UniversalAlert, Urgency};
use crate::core::hash::generated_alert_id;
use crate::core::source::SourceKind;
use crate::core::time::{now_utc, parse_datetime};
use crate::parsers::RawItem;

const TITLE_TRUNCATE: usize = 80;

/// Map one raw feed item into the canonical alert shape. Every field has
/// an ordered fallback chain ending in a safe default; missing fields can
/// never fail normalization.
pub fn normalize(item: &RawItem, kind: SourceKind, source_type: &str) -> Result<UniversalAlert> {
    let now = now_utc();

    let title = item
        .first_str(&["title", "headline", "name", "subject"])
        .or_else(|| item.str_of("summary").map(|s| truncate(&s)))
        .or_else(|| item.str_of("description").map(|s| truncate(&s)))
        .unwrap_or_else(|| format!("Alert from {}", source_type));

    let description = item
        .first_str(&["description", "summary", "content", "details", "title"])
        .unwrap_or_else(|| "No description provided".to_string());

    let published =
        parse_date_chain(item, &["pubDate", "published", "onset", "date"]).unwrap_or(now);

    let id = item
        .first_str(&["guid", "id", "link"])
        .unwrap_or_else(|| generated_alert_id(source_type, &title, &published.to_rfc3339()));

    let coordinates = match (item.f64_of("latitude"), item.f64_of("longitude")) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    };

    Ok(UniversalAlert {
        id,
        title,
        description,
        severity: coerce_severity(item.str_of("severity").as_deref(), kind),
        urgency: coerce_urgency(item.str_of("urgency").as_deref()),
        category: item
            .first_str(&["category", "event"])
            .unwrap_or_else(|| default_category(kind).to_string()),
        status: coerce_status(item.str_of("status").as_deref()),
        area: item
            .first_str(&["area", "areaDesc", "location", "region"])
            .unwrap_or_else(|| "Location not specified".to_string()),
        published,
        updated: parse_date_chain(item, &["updated", "modified"]),
        expires: parse_date_chain(item, &["expires", "expiry"]),
        effective: parse_date_chain(item, &["effective", "onset"]),
        url: item.first_str(&["link", "url", "web"]),
        instructions: item.first_str(&["instruction", "instructions"]),
        author: item.first_str(&["author", "creator"]),
        source: feed_source_for(source_type),
        coordinates,
    })
}

pub struct BatchOutcome {
    pub alerts: Vec<UniversalAlert>,
    pub errors: Vec<String>,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}

/// Normalize a batch, catching per-item failures. A failing item lands in
/// the error list and never stops its siblings.
pub fn normalize_batch(items: &[RawItem], kind: SourceKind, source_type: &str) -> BatchOutcome {
    let mut alerts = Vec::new();
    let mut errors = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        match normalize(item, kind, source_type) {
            Ok(alert) => alerts.push(alert),
            Err(err) => errors.push(format!("item {}: {}", idx + 1, err)),
        }
    }
    BatchOutcome { alerts, errors }
}

fn parse_date_chain(item: &RawItem, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|k| item.str_of(k))
        .and_then(|v| parse_datetime(&v))
}

fn default_category(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::WeatherGeocmet => "Weather",
        SourceKind::SecurityRss => "Security",
        SourceKind::Policy => "Policy",
        SourceKind::EmergencyJson => "Emergency",
        SourceKind::Generic => "General",
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= TITLE_TRUNCATE {
        return text.to_string();
    }
    let cut: String = text.chars().take(TITLE_TRUNCATE).collect();
    format!("{}...", cut.trim_end())
}

pub fn coerce_severity(raw: Option<&str>, kind: SourceKind) -> Severity {
    if let Some(value) = raw {
        match value.to_lowercase().as_str() {
            "extreme" | "critical" | "emergency" => return Severity::Extreme,
            "severe" | "major" | "high" => return Severity::Severe,
            "moderate" | "medium" => return Severity::Moderate,
            "minor" | "low" => return Severity::Minor,
            "info" | "information" | "informational" | "advisory" => return Severity::Info,
            _ => {}
        }
    }
    match kind {
        SourceKind::SecurityRss | SourceKind::Policy => Severity::Moderate,
        SourceKind::WeatherGeocmet => Severity::Minor,
        _ => Severity::Unknown,
    }
}

pub fn coerce_urgency(raw: Option<&str>) -> Urgency {
    match raw.map(|v| v.to_lowercase()).as_deref() {
        Some("immediate") | Some("now") | Some("urgent") => Urgency::Immediate,
        Some("expected") | Some("soon") => Urgency::Expected,
        Some("future") | Some("later") => Urgency::Future,
        Some("past") | Some("expired") => Urgency::Past,
        _ => Urgency::Unknown,
    }
}

/// Live feeds rarely carry a CAP status; an absent status is Actual,
/// an unrecognized one is Unknown.
pub fn coerce_status(raw: Option<&str>) -> Status {
    match raw.map(|v| v.to_lowercase()) {
        None => Status::Actual,
        Some(value) => match value.as_str() {
            "actual" => Status::Actual,
            "exercise" => Status::Exercise,
            "system" => Status::System,
            "test" => Status::Test,
            "draft" => Status::Draft,
            _ => Status::Unknown,
        },
    }
}

pub fn feed_source_for(source_type: &str) -> FeedSource {
    let t = source_type.to_lowercase();
    if t.contains("alert-ready") || t.contains("national") {
        FeedSource::AlertReady
    } else if t.contains("bc") || t.contains("british") {
        FeedSource::BcEmergency
    } else if t.contains("everbridge") {
        FeedSource::Everbridge
    } else {
        FeedSource::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_falls_back_along_the_chain() {
        let mut item = RawItem::new();
        item.set("headline", "Storm Warning");
        let alert = normalize(&item, SourceKind::WeatherGeocmet, "weather-geocmet").unwrap();
        assert_eq!(alert.title, "Storm Warning");

        let mut item = RawItem::new();
        item.set("summary", "a".repeat(120));
        let alert = normalize(&item, SourceKind::WeatherGeocmet, "weather-geocmet").unwrap();
        assert!(alert.title.ends_with("..."));
        assert!(alert.title.chars().count() <= TITLE_TRUNCATE + 3);

        let item = RawItem::new();
        let alert = normalize(&item, SourceKind::Generic, "municipal-feed").unwrap();
        assert_eq!(alert.title, "Alert from municipal-feed");
    }

    #[test]
    fn id_prefers_guid_then_link_then_hash() {
        let mut item = RawItem::new();
        item.set("guid", "guid-1");
        item.set("link", "https://example.org/1");
        let alert = normalize(&item, SourceKind::SecurityRss, "security-rss").unwrap();
        assert_eq!(alert.id, "guid-1");

        let mut item = RawItem::new();
        item.set("link", "https://example.org/1");
        let alert = normalize(&item, SourceKind::SecurityRss, "security-rss").unwrap();
        assert_eq!(alert.id, "https://example.org/1");

        let mut item = RawItem::new();
        item.set("title", "Stable");
        item.set("pubDate", "2025-07-01T00:00:00Z");
        let a = normalize(&item, SourceKind::SecurityRss, "security-rss").unwrap();
        let b = normalize(&item, SourceKind::SecurityRss, "security-rss").unwrap();
        assert!(a.id.starts_with("alert_"));
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn unparsable_dates_fall_back_to_now() {
        let mut item = RawItem::new();
        item.set("title", "T");
        item.set("pubDate", "whenever");
        let before = now_utc();
        let alert = normalize(&item, SourceKind::SecurityRss, "security-rss").unwrap();
        assert!(alert.published >= before);
        assert!(alert.expires.is_none());
    }

    #[test]
    fn severity_synonyms_and_kind_defaults() {
        assert_eq!(
            coerce_severity(Some("CRITICAL"), SourceKind::Generic),
            Severity::Extreme
        );
        assert_eq!(
            coerce_severity(Some("advisory"), SourceKind::Generic),
            Severity::Info
        );
        assert_eq!(
            coerce_severity(Some("weird"), SourceKind::SecurityRss),
            Severity::Moderate
        );
        assert_eq!(
            coerce_severity(None, SourceKind::WeatherGeocmet),
            Severity::Minor
        );
        assert_eq!(coerce_severity(None, SourceKind::Generic), Severity::Unknown);
    }

    #[test]
    fn urgency_and_status_coercion() {
        assert_eq!(coerce_urgency(Some("URGENT")), Urgency::Immediate);
        assert_eq!(coerce_urgency(Some("expired")), Urgency::Past);
        assert_eq!(coerce_urgency(None), Urgency::Unknown);
        assert_eq!(coerce_status(None), Status::Actual);
        assert_eq!(coerce_status(Some("Exercise")), Status::Exercise);
        assert_eq!(coerce_status(Some("???")), Status::Unknown);
    }

    #[test]
    fn feed_source_from_source_type_substrings() {
        assert_eq!(feed_source_for("alert-ready-cap"), FeedSource::AlertReady);
        assert_eq!(feed_source_for("national-feed"), FeedSource::AlertReady);
        assert_eq!(feed_source_for("bc-emergency"), FeedSource::BcEmergency);
        assert_eq!(feed_source_for("everbridge-json"), FeedSource::Everbridge);
        assert_eq!(feed_source_for("municipal"), FeedSource::Other);
    }

    #[test]
    fn batch_keeps_going_and_counts_nothing_on_clean_input() {
        let mut a = RawItem::new();
        a.set("title", "A");
        let mut b = RawItem::new();
        b.set("title", "B");
        let outcome = normalize_batch(&[a, b], SourceKind::SecurityRss, "security-rss");
        assert_eq!(outcome.alerts.len(), 2);
        assert_eq!(outcome.failed(), 0);
    }
}
