use std::collections::HashSet;

use crate::core::alert::UniversalAlert;
use crate::core::source::CorrelationEdge;

/// Find likely-related incidents by lexical overlap. Every unordered
/// pair is compared, which is O(n²) by design; the caller bounds the
/// incident window to keep n small.
pub fn correlate(incidents: &[UniversalAlert], threshold: f64) -> Vec<CorrelationEdge> {
    if incidents.len() < 2 {
        return Vec::new();
    }
    let vocab: Vec<HashSet<String>> = incidents.iter().map(word_set).collect();

    let mut edges = Vec::new();
    for i in 0..incidents.len() {
        for j in (i + 1)..incidents.len() {
            if incidents[i].id == incidents[j].id {
                continue;
            }
            let similarity = jaccard(&vocab[i], &vocab[j]);
            if similarity > threshold {
                edges.push(CorrelationEdge::semantic(
                    &incidents[i].id,
                    &incidents[j].id,
                    similarity,
                ));
            }
        }
    }
    edges
}

fn word_set(alert: &UniversalAlert) -> HashSet<String> {
    format!("{} {}", alert.title, alert.description)
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity over two word sets.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alert::{FeedSource, Severity, Status, Urgency};
    use crate::core::time::now_utc;

    fn incident(id: &str, title: &str, description: &str) -> UniversalAlert {
        UniversalAlert {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            severity: Severity::Moderate,
            urgency: Urgency::Expected,
            category: "General".to_string(),
            status: Status::Actual,
            area: "Location not specified".to_string(),
            published: now_utc(),
            updated: None,
            expires: None,
            effective: None,
            url: None,
            instructions: None,
            author: None,
            source: FeedSource::Other,
            coordinates: None,
        }
    }

    #[test]
    fn near_identical_incidents_correlate() {
        let a = incident("a", "Flooding closes highway 1 near Hope", "");
        let b = incident("b", "Flooding closes highway 1 near Hope tonight", "");
        let edges = correlate(&[a, b], 0.7);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].correlation_type, "semantic");
        assert_eq!(edges[0].primary_incident_id, "a");
        assert!(edges[0].confidence_score > 0.7);
    }

    #[test]
    fn unrelated_incidents_do_not_correlate() {
        let a = incident("a", "Flooding closes highway 1 near Hope", "");
        let b = incident("b", "Phishing campaign targets credit unions", "");
        assert!(correlate(&[a, b], 0.7).is_empty());
    }

    #[test]
    fn fewer_than_two_incidents_is_a_no_op() {
        assert!(correlate(&[], 0.7).is_empty());
        let only = incident("a", "Single incident", "");
        assert!(correlate(&[only], 0.7).is_empty());
    }

    #[test]
    fn repeated_runs_produce_identical_edges() {
        let a = incident("a", "Wildfire smoke advisory for the valley", "");
        let b = incident("b", "Wildfire smoke advisory for the valley region", "");
        let first = correlate(&[a.clone(), b.clone()], 0.7);
        let second = correlate(&[b, a], 0.7);
        assert_eq!(first, second);
    }
}
