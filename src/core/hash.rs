use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Fallback alert id for items that carry neither a guid nor a link.
/// Deterministic over source type, title and published time so re-ingesting
/// the same item upserts instead of duplicating.
pub fn generated_alert_id(source_type: &str, title: &str, published: &str) -> String {
    let payload = format!("{}|{}|{}", source_type, title, published);
    format!("alert_{}", sha256_hex(payload.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_is_deterministic() {
        let a = generated_alert_id("security-rss", "Phishing campaign", "2025-06-01T00:00:00Z");
        let b = generated_alert_id("security-rss", "Phishing campaign", "2025-06-01T00:00:00Z");
        assert_eq!(a, b);
        let c = generated_alert_id("security-rss", "Phishing campaign", "2025-06-02T00:00:00Z");
        assert_ne!(a, c);
    }
}
