use regex::Regex;

use crate::parsers::RawItem;

/// Minimal hand-rolled scanner for the narrow RSS/CAP/Atom subset the
/// configured feeds actually emit. Deliberately not a full XML parser;
/// it sits behind `parse_payload` so it can be swapped for one without
/// touching the normalizer.
pub fn extract_items(raw: &str) -> Vec<RawItem> {
    let mut items = Vec::new();
    for tag in ["item", "alert", "entry"] {
        for block in blocks(raw, tag) {
            if let Some(item) = item_from_block(&block) {
                items.push(item);
            }
        }
    }
    items
}

fn blocks(raw: &str, tag: &str) -> Vec<String> {
    let pattern = format!(r"(?s)<{tag}[\s>].*?</{tag}>");
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };
    re.find_iter(raw).map(|m| m.as_str().to_string()).collect()
}

fn item_from_block(block: &str) -> Option<RawItem> {
    // Titleless items carry nothing a reader can act on.
    let title = tag_text(block, "title")?;

    let mut item = RawItem::new();
    item.set("title", title);
    if let Some(desc) = tag_text(block, "description").or_else(|| tag_text(block, "summary")) {
        item.set("description", desc);
    }
    if let Some(link) = link_text(block) {
        item.set("link", link);
    }
    if let Some(date) = tag_text(block, "pubDate").or_else(|| tag_text(block, "published")) {
        item.set("pubDate", date);
    }
    if let Some(updated) = tag_text(block, "updated") {
        item.set("updated", updated);
    }
    if let Some(guid) = tag_text(block, "guid").or_else(|| tag_text(block, "id")) {
        item.set("guid", guid);
    }
    // CAP-style feeds carry severity and area, often namespaced.
    if let Some(severity) = tag_text(block, "severity") {
        item.set("severity", severity);
    }
    if let Some(area) = tag_text(block, "area").or_else(|| tag_text(block, "areaDesc")) {
        item.set("area", area);
    }
    Some(item)
}

/// Inner text of the first `<tag>`, with an optional namespace prefix,
/// CDATA unwrapped and basic entities decoded.
fn tag_text(block: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?s)<(?:\w+:)?{tag}[^>]*>(.*?)</(?:\w+:)?{tag}>");
    let re = Regex::new(&pattern).ok()?;
    let inner = re.captures(block)?.get(1)?.as_str();
    let text = decode_entities(strip_cdata(inner).trim());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Atom links are self-closing with an href attribute; RSS links carry
/// the URL as inner text.
fn link_text(block: &str) -> Option<String> {
    if let Some(text) = tag_text(block, "link") {
        return Some(text);
    }
    let re = Regex::new(r#"<(?:\w+:)?link[^>]*href\s*=\s*"([^"]+)""#).ok()?;
    let href = re.captures(block)?.get(1)?.as_str().trim().to_string();
    if href.is_empty() {
        None
    } else {
        Some(href)
    }
}

fn strip_cdata(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .unwrap_or(trimmed)
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
