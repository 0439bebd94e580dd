use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::core::alert::{AlertKind, ClassifiedAlert, UniversalAlert};
use crate::core::source::{HealthMetric, SourceKind};
use crate::core::store::Store;
use crate::core::time::now_utc;
use crate::parsers::parse_payload;
use crate::pipeline::classifier::{classify, classify_stored, contextual_title};
use crate::pipeline::ingestor::run_cycle;
use crate::pipeline::normalizer::normalize_batch;
use crate::sources::fetcher::Fetcher;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub weather: usize,
    pub security: usize,
    pub immigration: usize,
    pub travel: usize,
    pub general: usize,
    pub routine: usize,
    pub critical: usize,
}

/// One read-path result. `source` records where the data came from:
/// `database`, `mixed`, `external_api`, or `unavailable` for the
/// degraded empty response.
#[derive(Debug, Clone, Serialize)]
pub struct AlertsSnapshot {
    pub alerts: Vec<ClassifiedAlert>,
    pub contextual_title: String,
    pub source: String,
    pub freshness_minutes: Option<i64>,
    pub statistics: Statistics,
    pub fetched_at: DateTime<Utc>,
}

/// Read-path arbiter between persisted and live data. Holds a single
/// cached snapshot behind a copy-on-write slot: readers keep whatever
/// Arc they grabbed while a refresh swaps the slot atomically.
pub struct UnifiedProvider {
    store: Arc<Mutex<Store>>,
    fetcher: Fetcher,
    config: AppConfig,
    cache: StdMutex<Option<Arc<AlertsSnapshot>>>,
}

impl UnifiedProvider {
    pub fn new(store: Arc<Mutex<Store>>, fetcher: Fetcher, config: AppConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
            cache: StdMutex::new(None),
        }
    }

    /// Serve the current alert picture. Never fails toward the caller:
    /// unexpected errors degrade to the last good snapshot, or to an
    /// explicit empty one.
    pub async fn get_alerts(&self) -> Arc<AlertsSnapshot> {
        let now = now_utc();
        if let Some(cached) = self.cached(now) {
            return cached;
        }

        match self.refresh(now).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.cache.lock().expect("cache poisoned") = Some(snapshot.clone());
                snapshot
            }
            Err(err) => {
                error!("read path failed, degrading: {:#}", err);
                self.cache
                    .lock()
                    .expect("cache poisoned")
                    .clone()
                    .unwrap_or_else(|| Arc::new(empty_snapshot(now)))
            }
        }
    }

    fn cached(&self, now: DateTime<Utc>) -> Option<Arc<AlertsSnapshot>> {
        let ttl = ChronoDuration::seconds(self.config.cache_ttl_secs as i64);
        let cache = self.cache.lock().expect("cache poisoned");
        cache
            .as_ref()
            .filter(|snap| now - snap.fetched_at < ttl)
            .cloned()
    }

    async fn refresh(&self, now: DateTime<Utc>) -> Result<AlertsSnapshot> {
        let (persisted, freshness_minutes) = {
            let store = self.store.lock().await;
            let limit = self.config.read_limit;
            let mut persisted = store.recent_alerts("weather", limit)?;
            persisted.extend(store.recent_alerts("security", limit)?);
            persisted.extend(store.recent_alerts("immigration", limit)?);
            let freshness = store
                .latest_created_at("weather")?
                .map(|created| (now - created).num_minutes());
            (persisted, freshness)
        };

        let stale = match freshness_minutes {
            Some(minutes) => minutes > self.config.staleness_minutes,
            None => true,
        };

        let mut classified: Vec<ClassifiedAlert>;
        let source_label;
        if stale || persisted.is_empty() {
            let live = self.fetch_live().await;
            if !live.is_empty() {
                source_label = if persisted.is_empty() {
                    "external_api"
                } else {
                    "mixed"
                };
                classified = live
                    .into_iter()
                    .map(|(alert, source_name)| {
                        let classification = classify(&alert, &source_name);
                        ClassifiedAlert {
                            alert,
                            classification,
                        }
                    })
                    .collect();
                self.spawn_reingest();
            } else {
                // Live fetch came back empty; the possibly stale
                // persisted data is still the best answer we have.
                source_label = "database";
                classified = classify_persisted(persisted);
            }
        } else {
            source_label = "database";
            classified = classify_persisted(persisted);
        }

        classified.retain(|alert| !self.is_expired(alert, now));

        let statistics = compute_statistics(&classified);
        Ok(AlertsSnapshot {
            contextual_title: contextual_title(&classified),
            alerts: classified,
            source: source_label.to_string(),
            freshness_minutes,
            statistics,
            fetched_at: now,
        })
    }

    /// Live fetch across active, non-generic sources. Failures are
    /// logged per source; each terminal outcome still lands one health
    /// metric, same as the polling engine.
    async fn fetch_live(&self) -> Vec<(UniversalAlert, String)> {
        let sources = match self.store.lock().await.active_sources() {
            Ok(sources) => sources,
            Err(err) => {
                warn!("source registry read failed: {:#}", err);
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for source in sources
            .iter()
            .filter(|s| s.kind != SourceKind::Generic)
        {
            match self.fetcher.fetch(source).await {
                Ok(outcome) => {
                    let mut records = 0i64;
                    match parse_payload(source.kind, &outcome.payload) {
                        Ok(items) => {
                            let batch =
                                normalize_batch(&items, source.kind, &source.source_type);
                            records = batch.alerts.len() as i64;
                            out.extend(
                                batch
                                    .alerts
                                    .into_iter()
                                    .map(|a| (a, source.name.clone())),
                            );
                        }
                        Err(err) => warn!(source = %source.id, "live parse failed: {}", err),
                    }
                    let metric = HealthMetric {
                        source_id: source.id.clone(),
                        timestamp: now_utc(),
                        success: true,
                        response_time_ms: outcome.response_time_ms,
                        records_processed: records,
                        error_message: None,
                        http_status_code: Some(outcome.http_status),
                    };
                    if let Err(err) = self.store.lock().await.insert_health_metric(&metric) {
                        warn!("health metric insert failed: {:#}", err);
                    }
                }
                Err(failure) => {
                    let metric = HealthMetric {
                        source_id: source.id.clone(),
                        timestamp: now_utc(),
                        success: false,
                        response_time_ms: failure.response_time_ms,
                        records_processed: 0,
                        error_message: Some(failure.message()),
                        http_status_code: failure.http_status(),
                    };
                    if let Err(err) = self.store.lock().await.insert_health_metric(&metric) {
                        warn!("health metric insert failed: {:#}", err);
                    }
                    warn!(source = %source.id, "live fetch failed: {}", failure.message());
                }
            }
        }
        out
    }

    /// Fire-and-forget re-ingestion after serving live data. Failure is
    /// logged and dropped; nothing flows back to the read-path caller.
    fn spawn_reingest(&self) {
        let store = self.store.clone();
        let fetcher = self.fetcher.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if let Err(err) = run_cycle(&store, &fetcher, &config).await {
                warn!("background re-ingestion failed: {:#}", err);
            }
        });
    }

    fn is_expired(&self, alert: &ClassifiedAlert, now: DateTime<Utc>) -> bool {
        is_expired_at(
            alert,
            now,
            self.config.weather_grace_hours,
            self.config.default_grace_hours,
        )
    }
}

/// An alert with no expiry never expires. One with an expiry is dropped
/// once `now` passes `expires + grace`; weather moves fast and gets the
/// short grace, everything else lingers a day.
pub fn is_expired_at(
    alert: &ClassifiedAlert,
    now: DateTime<Utc>,
    weather_grace_hours: i64,
    default_grace_hours: i64,
) -> bool {
    let Some(expires) = alert.alert.expires else {
        return false;
    };
    let grace = if alert.classification.kind == AlertKind::Weather {
        ChronoDuration::hours(weather_grace_hours)
    } else {
        ChronoDuration::hours(default_grace_hours)
    };
    now > expires + grace
}

fn classify_persisted(alerts: Vec<UniversalAlert>) -> Vec<ClassifiedAlert> {
    alerts
        .into_iter()
        .map(|alert| {
            let classification = classify_stored(&alert);
            ClassifiedAlert {
                alert,
                classification,
            }
        })
        .collect()
}

pub fn compute_statistics(alerts: &[ClassifiedAlert]) -> Statistics {
    let mut stats = Statistics {
        total: alerts.len(),
        ..Default::default()
    };
    for alert in alerts {
        match alert.classification.kind {
            AlertKind::Weather => stats.weather += 1,
            AlertKind::Security => stats.security += 1,
            AlertKind::Immigration => stats.immigration += 1,
            AlertKind::Travel => stats.travel += 1,
            AlertKind::General => stats.general += 1,
        }
        if alert.classification.is_routine {
            stats.routine += 1;
        }
    }
    stats.critical = stats.total - stats.routine;
    stats
}

fn empty_snapshot(now: DateTime<Utc>) -> AlertsSnapshot {
    AlertsSnapshot {
        alerts: Vec::new(),
        contextual_title: "No Active Alerts".to_string(),
        source: "unavailable".to_string(),
        freshness_minutes: None,
        statistics: Statistics::default(),
        fetched_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alert::{
        AlertClassification, FeedSource, Severity, Status, Urgency,
    };

    fn classified(kind: AlertKind, expires: Option<DateTime<Utc>>) -> ClassifiedAlert {
        ClassifiedAlert {
            alert: UniversalAlert {
                id: "e1".to_string(),
                title: "T".to_string(),
                description: "D".to_string(),
                severity: Severity::Moderate,
                urgency: Urgency::Expected,
                category: "General".to_string(),
                status: Status::Actual,
                area: "Location not specified".to_string(),
                published: now_utc(),
                updated: None,
                expires,
                effective: None,
                url: None,
                instructions: None,
                author: None,
                source: FeedSource::Other,
                coordinates: None,
            },
            classification: AlertClassification {
                kind,
                subtype: "test".to_string(),
                icon: "bell".to_string(),
                urgency_score: 0.4,
                relevance_score: 0.5,
                is_routine: false,
            },
        }
    }

    #[test]
    fn expiry_grace_is_per_kind() {
        let now = now_utc();
        let three_hours_ago = Some(now - ChronoDuration::hours(3));
        let one_hour_ago = Some(now - ChronoDuration::hours(1));
        let twenty_hours_ago = Some(now - ChronoDuration::hours(20));

        assert!(is_expired_at(
            &classified(AlertKind::Weather, three_hours_ago),
            now,
            2,
            24
        ));
        assert!(!is_expired_at(
            &classified(AlertKind::Weather, one_hour_ago),
            now,
            2,
            24
        ));
        assert!(!is_expired_at(
            &classified(AlertKind::Security, twenty_hours_ago),
            now,
            2,
            24
        ));
        assert!(is_expired_at(
            &classified(AlertKind::Security, Some(now - ChronoDuration::hours(25))),
            now,
            2,
            24
        ));
        assert!(!is_expired_at(&classified(AlertKind::Weather, None), now, 2, 24));
    }

    #[tokio::test]
    async fn read_path_degrades_to_the_last_good_snapshot_on_query_failure() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .upsert_alerts("weather", &[classified(AlertKind::Weather, None).alert])
            .unwrap();
        let store = Arc::new(Mutex::new(store));
        let mut config = crate::config::default_config();
        // A zero TTL forces a refresh on every read.
        config.cache_ttl_secs = 0;
        let fetcher = Fetcher::new(&config).unwrap();
        let provider = UnifiedProvider::new(store.clone(), fetcher, config);

        let first = provider.get_alerts().await;
        assert_eq!(first.source, "database");
        assert_eq!(first.alerts.len(), 1);

        store.lock().await.execute_raw("DROP TABLE alerts").unwrap();
        let second = provider.get_alerts().await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn read_path_without_a_cache_degrades_to_the_empty_answer() {
        let store = Store::open_in_memory().unwrap();
        store.execute_raw("DROP TABLE alerts").unwrap();
        let store = Arc::new(Mutex::new(store));
        let config = crate::config::default_config();
        let fetcher = Fetcher::new(&config).unwrap();
        let provider = UnifiedProvider::new(store, fetcher, config);

        let snapshot = provider.get_alerts().await;
        assert_eq!(snapshot.source, "unavailable");
        assert!(snapshot.alerts.is_empty());
        assert_eq!(snapshot.contextual_title, "No Active Alerts");
        assert_eq!(snapshot.statistics.total, 0);
    }

    #[test]
    fn statistics_split_routine_and_critical() {
        let mut routine = classified(AlertKind::Weather, None);
        routine.classification.is_routine = true;
        let critical = classified(AlertKind::Security, None);
        let stats = compute_statistics(&[routine, critical]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.weather, 1);
        assert_eq!(stats.security, 1);
        assert_eq!(stats.routine, 1);
        assert_eq!(stats.critical, 1);
    }
}
