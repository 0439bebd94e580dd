use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::alert::UniversalAlert;
use crate::core::source::{AlertSource, CorrelationEdge, HealthMetric, SourceKind};
use crate::core::time::now_utc;

/// Embedded row store. Alerts are upserted by natural id, health metrics
/// are append-only, correlation edges are upserted on the ordered pair.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sources (
              id TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              source_type TEXT NOT NULL,
              api_endpoint TEXT NOT NULL,
              is_active INTEGER NOT NULL,
              polling_interval_secs INTEGER NOT NULL,
              last_poll_at TEXT,
              health_status TEXT NOT NULL,
              configuration_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS alerts (
              id TEXT PRIMARY KEY,
              stream TEXT NOT NULL,
              published TEXT NOT NULL,
              created_at TEXT NOT NULL,
              archived INTEGER NOT NULL DEFAULT 0,
              data_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_stream ON alerts(stream, published);

            CREATE TABLE IF NOT EXISTS health_metrics (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              source_id TEXT NOT NULL,
              timestamp TEXT NOT NULL,
              success INTEGER NOT NULL,
              response_time_ms INTEGER NOT NULL,
              records_processed INTEGER NOT NULL,
              error_message TEXT,
              http_status_code INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_metrics_source ON health_metrics(source_id);

            CREATE TABLE IF NOT EXISTS correlations (
              primary_incident_id TEXT NOT NULL,
              related_incident_id TEXT NOT NULL,
              correlation_type TEXT NOT NULL,
              confidence_score REAL NOT NULL,
              updated_at TEXT NOT NULL,
              PRIMARY KEY (primary_incident_id, related_incident_id)
            );

            CREATE TABLE IF NOT EXISTS ingestion_queue (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              source_id TEXT NOT NULL,
              raw_payload TEXT NOT NULL,
              processing_status TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Register sources from configuration. Endpoint and interval changes
    /// take effect; poll state of an already known source is preserved.
    pub fn seed_sources(&mut self, sources: &[AlertSource]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for src in sources {
            let config_json = serde_json::to_string(&src.configuration)?;
            tx.execute(
                "INSERT INTO sources
                 (id, name, source_type, api_endpoint, is_active, polling_interval_secs, last_poll_at, health_status, configuration_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   source_type = excluded.source_type,
                   api_endpoint = excluded.api_endpoint,
                   is_active = excluded.is_active,
                   polling_interval_secs = excluded.polling_interval_secs,
                   configuration_json = excluded.configuration_json",
                params![
                    src.id,
                    src.name,
                    src.source_type,
                    src.api_endpoint,
                    src.is_active as i64,
                    src.polling_interval_secs,
                    src.health_status,
                    config_json
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn active_sources(&self) -> Result<Vec<AlertSource>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, source_type, api_endpoint, is_active, polling_interval_secs,
                    last_poll_at, health_status, configuration_json
             FROM sources WHERE is_active = 1 ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_source)?;
        collect_rows(rows)
    }

    pub fn all_sources(&self) -> Result<Vec<AlertSource>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, source_type, api_endpoint, is_active, polling_interval_secs,
                    last_poll_at, health_status, configuration_json
             FROM sources ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_source)?;
        collect_rows(rows)
    }

    pub fn record_poll(
        &mut self,
        source_id: &str,
        at: DateTime<Utc>,
        health_status: &str,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE sources SET last_poll_at = ?2, health_status = ?3 WHERE id = ?1",
            params![source_id, at, health_status],
        )?;
        Ok(())
    }

    /// Idempotent alert upsert. `created_at` is set on first insert and
    /// preserved on conflict so persisted-data freshness reflects the
    /// first time the row landed, not the latest re-ingest.
    pub fn upsert_alerts(&mut self, stream: &str, alerts: &[UniversalAlert]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let now = now_utc();
        let mut written = 0usize;
        for alert in alerts {
            let data_json = serde_json::to_string(alert)?;
            written += tx.execute(
                "INSERT INTO alerts (id, stream, published, created_at, archived, data_json)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                   stream = excluded.stream,
                   published = excluded.published,
                   data_json = excluded.data_json",
                params![alert.id, stream, alert.published, now, data_json],
            )?;
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn recent_alerts(&self, stream: &str, limit: usize) -> Result<Vec<UniversalAlert>> {
        let mut stmt = self.conn.prepare(
            "SELECT data_json FROM alerts
             WHERE stream = ?1 AND archived = 0
             ORDER BY published DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![stream, limit as i64], |row| {
            row.get::<_, String>(0)
        })?;
        let mut out = Vec::new();
        for row in rows {
            let alert: UniversalAlert = serde_json::from_str(&row?)?;
            out.push(alert);
        }
        Ok(out)
    }

    /// Creation time of the newest row in a stream; drives staleness.
    pub fn latest_created_at(&self, stream: &str) -> Result<Option<DateTime<Utc>>> {
        let ts: Option<DateTime<Utc>> = self
            .conn
            .query_row(
                "SELECT created_at FROM alerts WHERE stream = ?1 AND archived = 0
                 ORDER BY created_at DESC LIMIT 1",
                params![stream],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts)
    }

    pub fn alert_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))?)
    }

    pub fn insert_health_metric(&mut self, metric: &HealthMetric) -> Result<()> {
        self.conn.execute(
            "INSERT INTO health_metrics
             (source_id, timestamp, success, response_time_ms, records_processed, error_message, http_status_code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                metric.source_id,
                metric.timestamp,
                metric.success as i64,
                metric.response_time_ms,
                metric.records_processed,
                metric.error_message,
                metric.http_status_code.map(|c| c as i64),
            ],
        )?;
        Ok(())
    }

    pub fn health_metrics(&self, source_id: &str) -> Result<Vec<HealthMetric>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, timestamp, success, response_time_ms, records_processed,
                    error_message, http_status_code
             FROM health_metrics WHERE source_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![source_id], |row| {
            Ok(HealthMetric {
                source_id: row.get(0)?,
                timestamp: row.get(1)?,
                success: row.get::<_, i64>(2)? != 0,
                response_time_ms: row.get(3)?,
                records_processed: row.get(4)?,
                error_message: row.get(5)?,
                http_status_code: row.get::<_, Option<i64>>(6)?.map(|c| c as u16),
            })
        })?;
        collect_rows(rows)
    }

    /// Incidents across all streams published on or after the cutoff.
    /// Feeds the correlation pass; the cutoff bounds its O(n²) cost.
    pub fn incidents_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<UniversalAlert>> {
        let mut stmt = self.conn.prepare(
            "SELECT data_json FROM alerts WHERE archived = 0 AND published >= ?1",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            let alert: UniversalAlert = serde_json::from_str(&row?)?;
            out.push(alert);
        }
        Ok(out)
    }

    pub fn upsert_correlations(&mut self, edges: &[CorrelationEdge]) -> Result<()> {
        let tx = self.conn.transaction()?;
        let now = now_utc();
        for edge in edges {
            tx.execute(
                "INSERT INTO correlations
                 (primary_incident_id, related_incident_id, correlation_type, confidence_score, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(primary_incident_id, related_incident_id) DO UPDATE SET
                   correlation_type = excluded.correlation_type,
                   confidence_score = excluded.confidence_score,
                   updated_at = excluded.updated_at",
                params![
                    edge.primary_incident_id,
                    edge.related_incident_id,
                    edge.correlation_type,
                    edge.confidence_score,
                    now
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn correlations(&self) -> Result<Vec<CorrelationEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT primary_incident_id, related_incident_id, correlation_type, confidence_score
             FROM correlations ORDER BY primary_incident_id, related_incident_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CorrelationEdge {
                primary_incident_id: row.get(0)?,
                related_incident_id: row.get(1)?,
                correlation_type: row.get(2)?,
                confidence_score: row.get(3)?,
            })
        })?;
        collect_rows(rows)
    }

    /// Buffer a raw payload from a generic source for asynchronous
    /// downstream processing.
    pub fn enqueue_raw(&mut self, source_id: &str, raw_payload: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO ingestion_queue (source_id, raw_payload, processing_status, created_at)
             VALUES (?1, ?2, 'pending', ?3)",
            params![source_id, raw_payload, now_utc()],
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn pending_queue_count(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM ingestion_queue WHERE processing_status = 'pending'",
            [],
            |row| row.get(0),
        )?)
    }
}

fn row_to_source(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertSource> {
    let source_type: String = row.get(2)?;
    let config_json: String = row.get(8)?;
    let configuration: HashMap<String, String> =
        serde_json::from_str(&config_json).unwrap_or_default();
    Ok(AlertSource {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: SourceKind::from_source_type(&source_type),
        source_type,
        api_endpoint: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        polling_interval_secs: row.get(5)?,
        last_poll_at: row.get(6)?,
        health_status: row.get(7)?,
        configuration,
    })
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
