// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Analysis history storage
//!
//! The analysis core never writes history itself. Callers hand a
//! [`HistoryStore`] to the engine, or record entries directly.

use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::{
    AnalysisResult, ChiSquareResult, DistributionFit, DistributionKind, PerDistribution,
    SampleStatistics,
};
use crate::config::DatabaseConfig;

/// One recorded analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Batches supplied, before outlier filtering
    pub batch_count: usize,
    pub best_distribution: DistributionKind,
    pub hypothesis_accepted: bool,
    pub significance_level: f64,
    /// p-value of the selected distribution
    pub p_value: f64,
    pub summary: serde_json::Value,
}

#[derive(Serialize)]
struct Summary<'a> {
    statistics: &'a SampleStatistics,
    best_fit: &'a DistributionFit,
    chi_square: &'a PerDistribution<ChiSquareResult>,
}

impl HistoryEntry {
    pub fn from_result(result: &AnalysisResult) -> Result<Self> {
        let summary = serde_json::to_value(Summary {
            statistics: &result.statistics,
            best_fit: &result.best_fit,
            chi_square: &result.chi_square,
        })?;

        Ok(Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            batch_count: result.statistics.n + result.outliers.removed,
            best_distribution: result.best,
            hypothesis_accepted: result.hypothesis_accepted,
            significance_level: result.significance_level,
            p_value: result.best_test().p_value,
            summary,
        })
    }
}

/// Selection criteria for [`HistoryStore::query`]
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Only entries at or after this instant
    pub since: Option<DateTime<Utc>>,
    pub distribution: Option<DistributionKind>,
    pub accepted_only: bool,
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        self.since.map_or(true, |since| entry.timestamp >= since)
            && self.distribution.map_or(true, |kind| entry.best_distribution == kind)
            && (!self.accepted_only || entry.hypothesis_accepted)
    }
}

/// Sink for completed analyses
pub trait HistoryStore: Send + Sync {
    fn record(&self, entry: &HistoryEntry) -> Result<()>;

    /// Matching entries, newest first
    fn query(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>>;
}

/// In-process history, lost on exit
#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl HistoryStore for MemoryHistory {
    fn record(&self, entry: &HistoryEntry) -> Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    fn query(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
        let mut found: Vec<HistoryEntry> = self
            .entries
            .lock()
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = filter.limit {
            found.truncate(limit);
        }
        Ok(found)
    }
}

/// SQLite-backed history
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let db = Self::with_connection(conn)?;
        info!("Database opened at {:?}", config.path);
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                batch_count INTEGER NOT NULL,
                best_distribution TEXT NOT NULL,
                hypothesis_accepted INTEGER NOT NULL,
                significance_level REAL NOT NULL,
                p_value REAL NOT NULL,
                summary TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_analyses_timestamp ON analyses(timestamp);
            CREATE INDEX IF NOT EXISTS idx_analyses_distribution ON analyses(best_distribution);
        "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Delete entries older than `retention_days`
    pub fn cleanup(&self, retention_days: u32) -> Result<usize> {
        let conn = self.conn.lock();
        let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);

        let deleted = conn.execute(
            "DELETE FROM analyses WHERE timestamp < ?1",
            params![timestamp_key(&cutoff)],
        )?;
        conn.execute("VACUUM", [])?;

        info!("Cleaned up {} analyses older than {} days", deleted, retention_days);
        Ok(deleted)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM analyses", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Fixed-width UTC timestamps so text order matches time order
fn timestamp_key(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

struct StoredRow {
    id: String,
    timestamp: String,
    batch_count: i64,
    best_distribution: String,
    hypothesis_accepted: bool,
    significance_level: f64,
    p_value: f64,
    summary: String,
}

impl TryFrom<StoredRow> for HistoryEntry {
    type Error = anyhow::Error;

    fn try_from(row: StoredRow) -> Result<Self> {
        Ok(Self {
            id: Uuid::parse_str(&row.id)?,
            timestamp: DateTime::parse_from_rfc3339(&row.timestamp)?.with_timezone(&Utc),
            batch_count: row.batch_count as usize,
            best_distribution: DistributionKind::from_name(&row.best_distribution).ok_or_else(
                || anyhow!("unknown distribution {:?} in history", row.best_distribution),
            )?,
            hypothesis_accepted: row.hypothesis_accepted,
            significance_level: row.significance_level,
            p_value: row.p_value,
            summary: serde_json::from_str(&row.summary)?,
        })
    }
}

impl HistoryStore for Database {
    fn record(&self, entry: &HistoryEntry) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO analyses
               (id, timestamp, batch_count, best_distribution, hypothesis_accepted,
                significance_level, p_value, summary)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                entry.id.to_string(),
                timestamp_key(&entry.timestamp),
                entry.batch_count as i64,
                entry.best_distribution.name(),
                entry.hypothesis_accepted,
                entry.significance_level,
                entry.p_value,
                serde_json::to_string(&entry.summary)?,
            ],
        )?;
        debug!("Recorded analysis {}", entry.id);
        Ok(())
    }

    fn query(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"SELECT id, timestamp, batch_count, best_distribution, hypothesis_accepted,
                      significance_level, p_value, summary
               FROM analyses
               WHERE (?1 IS NULL OR timestamp >= ?1)
                 AND (?2 IS NULL OR best_distribution = ?2)
                 AND (?3 = 0 OR hypothesis_accepted = 1)
               ORDER BY timestamp DESC
               LIMIT ?4"#,
        )?;

        let rows = stmt.query_map(
            params![
                filter.since.as_ref().map(timestamp_key),
                filter.distribution.map(|kind| kind.name()),
                filter.accepted_only,
                filter.limit.map_or(-1, |limit| limit as i64),
            ],
            |row| {
                Ok(StoredRow {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    batch_count: row.get(2)?,
                    best_distribution: row.get(3)?,
                    hypothesis_accepted: row.get(4)?,
                    significance_level: row.get(5)?,
                    p_value: row.get(6)?,
                    summary: row.get(7)?,
                })
            },
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(HistoryEntry::try_from(row?)?);
        }
        Ok(results)
    }
}
