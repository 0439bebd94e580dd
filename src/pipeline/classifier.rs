use crate::core::alert::{
    AlertClassification, AlertKind, ClassifiedAlert, Severity, UniversalAlert, Urgency,
};

const WEATHER_SOURCES: &[&str] = &["weather", "environment", "meteorological", "geocmet", "climate"];
const SECURITY_SOURCES: &[&str] = &["security", "csis", "rcmp", "police", "cyber", "cse"];
const IMMIGRATION_SOURCES: &[&str] = &["immigration", "ircc", "border services", "visa"];

const WEATHER_CONTENT: &[&str] = &[
    "storm", "rain", "snow", "wind", "weather", "flood", "heat", "blizzard", "thunder",
];
const SECURITY_CONTENT: &[&str] = &[
    "phishing", "malware", "breach", "security", "threat", "attack", "ransomware",
];
const IMMIGRATION_CONTENT: &[&str] = &["immigration", "visa", "permit", "border"];
const TRAVEL_CONTENT: &[&str] = &["travel advisory", "travel notice", "avoid travel"];

/// Derive the semantic classification for one alert. Pure function of the
/// source name and the lower-cased title + description; the source name
/// decides the coarse kind first, content keywords break ties.
pub fn classify(alert: &UniversalAlert, source_name: &str) -> AlertClassification {
    let content = format!("{} {}", alert.title, alert.description).to_lowercase();
    let kind = kind_for(&source_name.to_lowercase(), &content);
    let (subtype, icon) = subtype_for(kind, &content);
    AlertClassification {
        kind,
        subtype: subtype.to_string(),
        icon: icon.to_string(),
        urgency_score: urgency_score(alert.severity, alert.urgency),
        relevance_score: relevance_score(kind, alert.severity, alert.urgency),
        is_routine: is_routine(kind, alert.severity, alert.urgency, &content),
    }
}

/// Classification for persisted alerts read back without their source
/// registry entry; the category field stands in for the source name.
pub fn classify_stored(alert: &UniversalAlert) -> AlertClassification {
    let category = alert.category.clone();
    classify(alert, &category)
}

fn kind_for(source_name: &str, content: &str) -> AlertKind {
    if WEATHER_SOURCES.iter().any(|k| source_name.contains(k)) {
        return AlertKind::Weather;
    }
    if SECURITY_SOURCES.iter().any(|k| source_name.contains(k)) {
        return AlertKind::Security;
    }
    if IMMIGRATION_SOURCES.iter().any(|k| source_name.contains(k)) {
        return AlertKind::Immigration;
    }
    // Source name is ambiguous; fall back to content keywords.
    if TRAVEL_CONTENT.iter().any(|k| content.contains(k)) {
        return AlertKind::Travel;
    }
    if WEATHER_CONTENT.iter().any(|k| content.contains(k)) {
        return AlertKind::Weather;
    }
    if SECURITY_CONTENT.iter().any(|k| content.contains(k)) {
        return AlertKind::Security;
    }
    if IMMIGRATION_CONTENT.iter().any(|k| content.contains(k)) {
        return AlertKind::Immigration;
    }
    AlertKind::General
}

fn subtype_for(kind: AlertKind, content: &str) -> (&'static str, &'static str) {
    match kind {
        AlertKind::Weather => {
            if content.contains("storm") || content.contains("thunder") {
                ("storm warning", "storm")
            } else if content.contains("snow") || content.contains("blizzard") {
                ("winter weather", "snowflake")
            } else if content.contains("wind") || content.contains("gale") {
                ("wind advisory", "wind")
            } else if content.contains("heat") || content.contains("temperature") {
                ("temperature advisory", "thermometer")
            } else {
                ("general weather", "cloud")
            }
        }
        AlertKind::Security => {
            if content.contains("cyber")
                || content.contains("phishing")
                || content.contains("ransomware")
                || content.contains("breach")
            {
                ("cyber incident", "lock")
            } else if content.contains("threat") || content.contains("attack") {
                ("threat advisory", "shield")
            } else {
                ("general security", "shield")
            }
        }
        AlertKind::Immigration => {
            if content.contains("visa") || content.contains("permit") {
                ("visa notice", "passport")
            } else if content.contains("border") {
                ("border advisory", "passport")
            } else {
                ("immigration notice", "passport")
            }
        }
        AlertKind::Travel => ("travel advisory", "plane"),
        AlertKind::General => ("general notice", "bell"),
    }
}

/// Severity-weighted 0–0.6 plus urgency-weighted 0–0.4, clamped to [0,1].
pub fn urgency_score(severity: Severity, urgency: Urgency) -> f64 {
    let sev: f64 = match severity {
        Severity::Extreme => 0.6,
        Severity::Severe => 0.4,
        Severity::Moderate => 0.2,
        Severity::Minor => 0.1,
        Severity::Info | Severity::Unknown => 0.0,
    };
    let urg: f64 = match urgency {
        Urgency::Immediate => 0.4,
        Urgency::Expected => 0.2,
        Urgency::Future => 0.1,
        Urgency::Past | Urgency::Unknown => 0.0,
    };
    (sev + urg).clamp(0.0, 1.0)
}

pub fn relevance_score(kind: AlertKind, severity: Severity, urgency: Urgency) -> f64 {
    match kind {
        AlertKind::Weather => {
            let mut score: f64 = 0.5;
            if matches!(severity, Severity::Extreme | Severity::Severe) {
                score += 0.3;
            }
            if urgency == Urgency::Immediate {
                score += 0.2;
            }
            if urgency == Urgency::Past {
                score -= 0.3;
            }
            score.clamp(0.1, 1.0)
        }
        AlertKind::Security => 0.8,
        AlertKind::Immigration => 0.6,
        AlertKind::Travel | AlertKind::General => 0.5,
    }
}

fn is_routine(kind: AlertKind, severity: Severity, urgency: Urgency, content: &str) -> bool {
    match kind {
        AlertKind::Weather => severity == Severity::Minor && urgency != Urgency::Immediate,
        AlertKind::Security => severity == Severity::Minor,
        AlertKind::Immigration => {
            !content.contains("urgent") && !content.contains("immediate")
        }
        AlertKind::Travel | AlertKind::General => severity == Severity::Minor,
    }
}

/// Single banner title for a set of classified alerts, ordered by what
/// is actually demanding attention.
pub fn contextual_title(alerts: &[ClassifiedAlert]) -> String {
    if alerts.is_empty() {
        return "No Active Alerts".to_string();
    }
    let active: Vec<&ClassifiedAlert> = alerts
        .iter()
        .filter(|a| !a.classification.is_routine)
        .collect();
    if active.is_empty() {
        return "Routine Notices & Updates".to_string();
    }
    let has = |kind: AlertKind| active.iter().any(|a| a.classification.kind == kind);
    let weather = has(AlertKind::Weather);
    let security = has(AlertKind::Security);
    let immigration = has(AlertKind::Immigration);

    if weather && security {
        "Weather & Security Alerts".to_string()
    } else if weather && immigration {
        "Weather & Immigration Alerts".to_string()
    } else if weather {
        "Active Weather Alerts".to_string()
    } else if security {
        "Security Alerts".to_string()
    } else if immigration {
        "Immigration Notices".to_string()
    } else {
        "Active Alerts & Notices".to_string()
    }
}
