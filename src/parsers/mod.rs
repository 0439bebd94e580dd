use serde_json::{Map, Value};

use crate::core::error::IngestError;
use crate::core::source::SourceKind;

pub mod geojson;
pub mod rss;

/// One structured item extracted from a feed, before normalization.
/// A loose field bag: the normalizer walks ordered key lists over it, so
/// every upstream shape funnels through the same accessor surface.
#[derive(Debug, Clone, Default)]
pub struct RawItem(Map<String, Value>);

impl RawItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|m| Self(m.clone()))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn str_of(&self, key: &str) -> Option<String> {
        match self.0.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn f64_of(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// First non-empty value along an ordered key chain.
    pub fn first_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.str_of(k))
    }
}

/// Dispatch a raw payload to the parser matching the source kind.
/// Generic sources are not parsed here; the ingestor buffers their raw
/// payload on the queue instead.
pub fn parse_payload(kind: SourceKind, raw: &str) -> Result<Vec<RawItem>, IngestError> {
    match kind {
        SourceKind::WeatherGeocmet => Ok(geojson::extract_features(raw)),
        SourceKind::SecurityRss | SourceKind::Policy => Ok(rss::extract_items(raw)),
        SourceKind::EmergencyJson => extract_json_items(raw),
        SourceKind::Generic => Ok(Vec::new()),
    }
}

/// Emergency broadcast feeds are plain JSON: either a top-level array of
/// alert objects or an object wrapping one under `alerts`/`items`/`data`.
pub fn extract_json_items(raw: &str) -> Result<Vec<RawItem>, IngestError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| IngestError::Parse(format!("invalid json payload: {}", e)))?;
    let entries = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => ["alerts", "items", "data"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .map(|v| v.as_slice())
            .unwrap_or(&[]),
        _ => &[],
    };
    Ok(entries.iter().filter_map(RawItem::from_value).collect())
}
