use chrono::{DateTime, Duration, Utc};

use crate::core::source::AlertSource;

/// Polling gate. A source is due when it has never been polled or when
/// its interval has fully elapsed. Pure decision; the caller owns all
/// side effects.
pub fn should_poll(source: &AlertSource, now: DateTime<Utc>) -> bool {
    match source.last_poll_at {
        None => true,
        Some(last) => now - last >= Duration::seconds(source.polling_interval_secs),
    }
}

pub fn due_sources(sources: &[AlertSource], now: DateTime<Utc>) -> Vec<AlertSource> {
    sources
        .iter()
        .filter(|s| s.is_active && should_poll(s, now))
        .cloned()
        .collect()
}
