use serde_json::Value;
use tracing::warn;

use crate::core::error::IngestError;
use crate::parsers::RawItem;

/// Extract weather-alert-shaped items from a GeoJSON feature collection.
/// A malformed feature is skipped and logged; it never aborts the batch.
/// Features with unusable properties still yield an item with the gaps
/// left for the normalizer's defaults.
pub fn extract_features(raw: &str) -> Vec<RawItem> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(err) => {
            warn!("geojson payload is not valid json: {}", err);
            return Vec::new();
        }
    };
    let features = match value.get("features").and_then(Value::as_array) {
        Some(features) => features,
        None => return Vec::new(),
    };

    let mut items = Vec::new();
    for (idx, feature) in features.iter().enumerate() {
        match feature_item(feature) {
            Ok(item) => items.push(item),
            Err(err) => warn!("skipping geojson feature {}: {}", idx, err),
        }
    }
    items
}

fn feature_item(feature: &Value) -> Result<RawItem, IngestError> {
    let obj = feature
        .as_object()
        .ok_or_else(|| IngestError::Parse("feature is not an object".to_string()))?;

    let mut item = RawItem::new();
    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        copy_str(&mut item, props, "eventType", "title");
        copy_str(&mut item, props, "headline", "headline");
        copy_str(&mut item, props, "severity", "severity");
        copy_str(&mut item, props, "urgency", "urgency");
        copy_str(&mut item, props, "onset", "onset");
        copy_str(&mut item, props, "expires", "expires");
        copy_str(&mut item, props, "description", "description");
        copy_str(&mut item, props, "areaDesc", "area");
        copy_str(&mut item, props, "id", "guid");
        copy_str(&mut item, props, "web", "link");
    }
    if item.str_of("guid").is_none() {
        if let Some(id) = obj.get("id").and_then(Value::as_str) {
            item.set("guid", id);
        }
    }

    if let Some(coords) = obj.get("geometry").and_then(|g| g.get("coordinates")) {
        // GeoJSON order is [longitude, latitude].
        if let Some((lon, lat)) = first_position(coords) {
            item.set("longitude", lon);
            item.set("latitude", lat);
        } else if !coords.is_null() {
            return Err(IngestError::Parse(
                "geometry coordinates carry no numeric position".to_string(),
            ));
        }
    }

    Ok(item)
}

fn copy_str(
    item: &mut RawItem,
    props: &serde_json::Map<String, Value>,
    from: &str,
    to: &str,
) {
    if let Some(text) = props.get(from).and_then(Value::as_str) {
        if !text.trim().is_empty() {
            item.set(to, text.trim());
        }
    }
}

/// First [lon, lat] pair in a coordinates value, whatever the geometry
/// nesting depth (Point, LineString, Polygon).
fn first_position(coords: &Value) -> Option<(f64, f64)> {
    match coords {
        Value::Array(items) => {
            if items.len() >= 2 {
                if let (Some(lon), Some(lat)) = (items[0].as_f64(), items[1].as_f64()) {
                    return Some((lon, lat));
                }
            }
            items.iter().find_map(first_position)
        }
        _ => None,
    }
}
