use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Duration as ChronoDuration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::core::alert::UniversalAlert;
use crate::core::error::IngestError;
use crate::core::source::{AlertSource, HealthMetric, SourceKind};
use crate::core::store::Store;
use crate::core::time::now_utc;
use crate::parsers::parse_payload;
use crate::pipeline::classifier::classify;
use crate::pipeline::correlator::correlate;
use crate::pipeline::normalizer::normalize_batch;
use crate::pipeline::validator::validate_batch;
use crate::sources::fetcher::{FetchFailure, Fetcher};
use crate::sources::poller::due_sources;

#[derive(Debug, Default)]
pub struct CycleReport {
    pub sources_polled: usize,
    pub sources_failed: usize,
    pub alerts_upserted: usize,
    pub payloads_queued: usize,
    pub correlation_edges: usize,
}

/// One ingestion cycle: poll every due source sequentially, then run the
/// correlation pass over the recent incident window. A failing source is
/// recorded and skipped; it never stops its siblings. Safe to invoke
/// repeatedly — persistence is upsert-by-natural-id throughout.
pub async fn run_cycle(
    store: &Arc<Mutex<Store>>,
    fetcher: &Fetcher,
    config: &AppConfig,
) -> Result<CycleReport> {
    let now = now_utc();
    let sources = store.lock().await.active_sources()?;
    let due = due_sources(&sources, now);
    info!(due = due.len(), total = sources.len(), "ingestion cycle starting");

    let mut report = CycleReport::default();
    for source in &due {
        report.sources_polled += 1;
        match poll_source(store, fetcher, config, source).await {
            Ok(SourceOutcome::Stored(count)) => report.alerts_upserted += count,
            Ok(SourceOutcome::Queued) => report.payloads_queued += 1,
            Err(err) => {
                report.sources_failed += 1;
                warn!(source = %source.id, "source failed: {:#}", err);
            }
        }
    }

    let cutoff = now - ChronoDuration::hours(config.correlation_window_hours);
    let incidents = store.lock().await.incidents_since(cutoff)?;
    let edges = correlate(&incidents, config.correlation_threshold);
    report.correlation_edges = edges.len();
    if !edges.is_empty() {
        store.lock().await.upsert_correlations(&edges)?;
    }

    info!(
        upserted = report.alerts_upserted,
        queued = report.payloads_queued,
        failed = report.sources_failed,
        edges = report.correlation_edges,
        "ingestion cycle finished"
    );
    Ok(report)
}

enum SourceOutcome {
    Stored(usize),
    Queued,
}

/// Fetch and process one source. Exactly one health metric is written per
/// terminal outcome; the fetch itself runs under the per-source deadline
/// so a hung upstream cannot stall the cycle.
async fn poll_source(
    store: &Arc<Mutex<Store>>,
    fetcher: &Fetcher,
    config: &AppConfig,
    source: &AlertSource,
) -> Result<SourceOutcome> {
    let deadline = Duration::from_secs(config.source_deadline_secs);
    let fetched = match tokio::time::timeout(deadline, fetcher.fetch(source)).await {
        Ok(result) => result,
        Err(_) => Err(FetchFailure {
            error: IngestError::Deadline,
            attempts: 1,
            response_time_ms: deadline.as_millis() as i64,
        }),
    };

    let outcome = match fetched {
        Err(failure) => {
            let message = failure.message();
            let mut store = store.lock().await;
            store.insert_health_metric(&HealthMetric {
                source_id: source.id.clone(),
                timestamp: now_utc(),
                success: false,
                response_time_ms: failure.response_time_ms,
                records_processed: 0,
                error_message: Some(message.clone()),
                http_status_code: failure.http_status(),
            })?;
            store.record_poll(&source.id, now_utc(), "down")?;
            anyhow::bail!(message);
        }
        Ok(outcome) => outcome,
    };

    match process_payload(store, source, &outcome.payload).await {
        Ok(stored) => {
            let records = match &stored {
                SourceOutcome::Stored(count) => *count as i64,
                SourceOutcome::Queued => 1,
            };
            let mut store = store.lock().await;
            store.insert_health_metric(&HealthMetric {
                source_id: source.id.clone(),
                timestamp: now_utc(),
                success: true,
                response_time_ms: outcome.response_time_ms,
                records_processed: records,
                error_message: None,
                http_status_code: Some(outcome.http_status),
            })?;
            store.record_poll(&source.id, now_utc(), "healthy")?;
            Ok(stored)
        }
        Err(err) => {
            let mut store = store.lock().await;
            store.insert_health_metric(&HealthMetric {
                source_id: source.id.clone(),
                timestamp: now_utc(),
                success: false,
                response_time_ms: outcome.response_time_ms,
                records_processed: 0,
                error_message: Some(format!("{:#}", err)),
                http_status_code: Some(outcome.http_status),
            })?;
            store.record_poll(&source.id, now_utc(), "down")?;
            Err(err)
        }
    }
}

async fn process_payload(
    store: &Arc<Mutex<Store>>,
    source: &AlertSource,
    payload: &str,
) -> Result<SourceOutcome> {
    if source.kind == SourceKind::Generic {
        // Generic payloads are buffered for asynchronous downstream
        // workers instead of being parsed inline.
        store.lock().await.enqueue_raw(&source.id, payload)?;
        return Ok(SourceOutcome::Queued);
    }

    let items = parse_payload(source.kind, payload)?;
    let batch = normalize_batch(&items, source.kind, &source.source_type);
    for error in &batch.errors {
        warn!(source = %source.id, "normalization error: {}", error);
    }
    let validation = validate_batch(&batch.alerts);
    for error in &validation.errors {
        warn!(source = %source.id, "validation error: {}", error);
    }
    for warning in &validation.warnings {
        tracing::debug!(source = %source.id, "validation warning: {}", warning);
    }

    Ok(SourceOutcome::Stored(
        store_alerts(store, source, &batch.alerts).await?,
    ))
}

/// Route each alert into its stream by classification and upsert per
/// stream. Returns total rows written.
async fn store_alerts(
    store: &Arc<Mutex<Store>>,
    source: &AlertSource,
    alerts: &[UniversalAlert],
) -> Result<usize> {
    let mut by_stream: BTreeMap<&'static str, Vec<UniversalAlert>> = BTreeMap::new();
    for alert in alerts {
        let classification = classify(alert, &source.name);
        by_stream
            .entry(classification.kind.stream())
            .or_default()
            .push(alert.clone());
    }

    let mut total = 0;
    let mut store = store.lock().await;
    for (stream, batch) in by_stream {
        total += store.upsert_alerts(stream, &batch)?;
    }
    Ok(total)
}
