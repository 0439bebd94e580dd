use crate::core::alert::{Severity, UniversalAlert};

/// Outcome of validating one alert. Errors block nothing by themselves;
/// the caller decides what to do with an invalid record. Warnings are
/// advisory only.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Check a normalized alert against the canonical schema. The closed
/// enums are enforced at the serde boundary, so this covers what the
/// type system cannot: required text fields, date sanity, coordinate
/// bounds, and the advisory warnings.
pub fn validate(alert: &UniversalAlert) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    require(&mut errors, "id", &alert.id);
    require(&mut errors, "title", &alert.title);
    require(&mut errors, "description", &alert.description);
    require(&mut errors, "category", &alert.category);
    require(&mut errors, "area", &alert.area);

    if let Some(updated) = alert.updated {
        if updated < alert.published {
            warnings.push("updated precedes published".to_string());
        }
    }
    if let Some((expires, effective)) = alert.expires.zip(alert.effective) {
        if expires < effective {
            errors.push("expires precedes effective".to_string());
        }
    }

    if let Some(coords) = &alert.coordinates {
        if !coords.in_bounds() {
            errors.push(format!(
                "coordinates out of range: lat {}, lon {}",
                coords.latitude, coords.longitude
            ));
        }
    }

    if matches!(alert.severity, Severity::Extreme | Severity::Severe)
        && alert.instructions.is_none()
    {
        warnings.push("high-severity alert carries no instructions".to_string());
    }
    if alert.url.is_none() {
        warnings.push("missing url".to_string());
    }
    if alert.author.is_none() {
        warnings.push("missing author".to_string());
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[derive(Debug, Clone)]
pub struct BatchValidation {
    pub valid_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Aggregate per-alert validation. Messages carry 1-based alert indices
/// so a bad record in a feed dump can be found by eye.
pub fn validate_batch(alerts: &[UniversalAlert]) -> BatchValidation {
    let mut valid_count = 0;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for (idx, alert) in alerts.iter().enumerate() {
        let report = validate(alert);
        if report.is_valid {
            valid_count += 1;
        }
        errors.extend(
            report
                .errors
                .into_iter()
                .map(|e| format!("alert {}: {}", idx + 1, e)),
        );
        warnings.extend(
            report
                .warnings
                .into_iter()
                .map(|w| format!("alert {}: {}", idx + 1, w)),
        );
    }
    BatchValidation {
        valid_count,
        errors,
        warnings,
    }
}

fn require(errors: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(format!("missing required field: {}", field));
    }
}
