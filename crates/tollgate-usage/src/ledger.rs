// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only usage ledger persisted to SQLite.
//!
//! Every routed call produces exactly one row in `usage_ledger`. Rows carry
//! `day` (YYYY-MM-DD) and `month` (YYYY-MM) partition columns so the daily and
//! monthly aggregates are plain indexed lookups. Triggers reject UPDATE and
//! DELETE. All statements run on the single tokio-rusqlite background thread,
//! which serializes concurrent appends.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tollgate_core::{ProviderKind, Response, TollgateError};
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS usage_ledger (
    id TEXT PRIMARY KEY NOT NULL,
    created_at TEXT NOT NULL,
    day TEXT NOT NULL,
    month TEXT NOT NULL,
    model TEXT NOT NULL,
    provider TEXT NOT NULL,
    tier TEXT NOT NULL,
    prompt_tokens INTEGER NOT NULL DEFAULT 0,
    completion_tokens INTEGER NOT NULL DEFAULT 0,
    total_tokens INTEGER NOT NULL DEFAULT 0,
    cost_usd REAL NOT NULL DEFAULT 0.0,
    escalated_from TEXT,
    skill TEXT,
    latency_ms INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_usage_ledger_day ON usage_ledger(day);
CREATE INDEX IF NOT EXISTS idx_usage_ledger_month ON usage_ledger(month, provider);
CREATE INDEX IF NOT EXISTS idx_usage_ledger_model ON usage_ledger(model);
CREATE TRIGGER IF NOT EXISTS usage_ledger_no_update BEFORE UPDATE ON usage_ledger
BEGIN SELECT RAISE(ABORT, 'usage_ledger is append-only'); END;
CREATE TRIGGER IF NOT EXISTS usage_ledger_no_delete BEFORE DELETE ON usage_ledger
BEGIN SELECT RAISE(ABORT, 'usage_ledger is append-only'); END;
";

/// One persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    /// ISO 8601 UTC timestamp.
    pub created_at: String,
    pub day: String,
    pub month: String,
    pub model: String,
    pub provider: ProviderKind,
    pub tier: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: f64,
    pub escalated_from: Option<String>,
    pub skill: Option<String>,
    pub latency_ms: u64,
}

impl UsageRecord {
    /// Build a record for a response completed now.
    pub fn from_response(response: &Response, skill: Option<&str>) -> Self {
        Self::at(response, skill, Utc::now())
    }

    /// Build a record stamped with an explicit time.
    pub fn at(response: &Response, skill: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            day: now.format("%Y-%m-%d").to_string(),
            month: now.format("%Y-%m").to_string(),
            model: response.model.clone(),
            provider: response.provider,
            tier: response.tier.clone(),
            prompt_tokens: response.usage.prompt_tokens,
            completion_tokens: response.usage.completion_tokens,
            total_tokens: response.usage.total_tokens,
            cost_usd: response.cost_usd,
            escalated_from: response.escalated_from.clone(),
            skill: skill.map(str::to_string),
            latency_ms: response.latency_ms,
        }
    }
}

/// Aggregate over a day or month. All-zero when the window is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    /// The window: `YYYY-MM-DD` or `YYYY-MM`.
    pub period: String,
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    /// Call count per provider kind (`local`, `cloud`).
    pub calls_by_provider: BTreeMap<String, u64>,
}

/// Per-model statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStats {
    pub model: String,
    pub calls: u64,
    pub avg_latency_ms: f64,
    pub total_tokens: u64,
}

/// Monthly cloud spend against a limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub spent_usd: f64,
    pub limit_usd: f64,
    /// Negative when spend is over the limit.
    pub remaining_usd: f64,
    pub percent_used: f64,
}

impl BudgetStatus {
    pub fn new(spent_usd: f64, limit_usd: f64) -> Self {
        let percent_used = if spent_usd <= 0.0 {
            0.0
        } else if limit_usd > 0.0 {
            spent_usd / limit_usd * 100.0
        } else {
            100.0
        };
        Self {
            spent_usd,
            limit_usd,
            remaining_usd: limit_usd - spent_usd,
            percent_used,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.spent_usd >= self.limit_usd
    }
}

/// Window for [`UsageLedger::model_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Day,
    Month,
    All,
}

/// Convert a tokio-rusqlite error into TollgateError::Storage.
fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TollgateError {
    TollgateError::Storage {
        source: Box::new(e),
    }
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn this_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}

/// Persistent usage ledger backed by SQLite.
#[derive(Clone)]
pub struct UsageLedger {
    conn: tokio_rusqlite::Connection,
}

impl UsageLedger {
    /// Wrap an existing connection, creating the schema if needed.
    pub async fn new(conn: tokio_rusqlite::Connection) -> Result<Self, TollgateError> {
        conn.call(|conn| conn.execute_batch(SCHEMA))
            .await
            .map_err(map_tr_err)?;
        Ok(Self { conn })
    }

    /// Open (or create) a ledger file, enabling WAL mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TollgateError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TollgateError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| TollgateError::Storage {
                source: Box::new(e),
            })?;
        let journal_mode = conn
            .call(|conn| {
                conn.busy_timeout(Duration::from_secs(5))?;
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })
            })
            .await
            .map_err(map_tr_err)?;
        debug!(path = %path.display(), %journal_mode, "usage ledger opened");

        Self::new(conn).await
    }

    /// In-memory ledger for tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, TollgateError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| TollgateError::Storage {
                source: Box::new(e),
            })?;
        Self::new(conn).await
    }

    /// Append one entry for a completed response.
    pub async fn record(
        &self,
        response: &Response,
        skill: Option<&str>,
    ) -> Result<UsageRecord, TollgateError> {
        let record = UsageRecord::from_response(response, skill);
        self.record_entry(&record).await?;
        Ok(record)
    }

    /// Append a prepared entry.
    pub async fn record_entry(&self, record: &UsageRecord) -> Result<(), TollgateError> {
        let r = record.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO usage_ledger (id, created_at, day, month, model, provider, tier, \
                     prompt_tokens, completion_tokens, total_tokens, cost_usd, escalated_from, \
                     skill, latency_ms) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    rusqlite::params![
                        r.id,
                        r.created_at,
                        r.day,
                        r.month,
                        r.model,
                        r.provider.to_string(),
                        r.tier,
                        r.prompt_tokens,
                        r.completion_tokens,
                        r.total_tokens,
                        r.cost_usd,
                        r.escalated_from,
                        r.skill,
                        i64::try_from(r.latency_ms).unwrap_or(i64::MAX),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        info!(
            tier = %record.tier,
            model = %record.model,
            provider = %record.provider,
            total_tokens = record.total_tokens,
            cost_usd = record.cost_usd,
            escalated_from = record.escalated_from.as_deref().unwrap_or("-"),
            "usage recorded"
        );
        Ok(())
    }

    /// Aggregate for one UTC day (today when `None`).
    pub async fn daily_summary(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<UsageSummary, TollgateError> {
        let day = date.map_or_else(today, |d| d.format("%Y-%m-%d").to_string());
        self.summarize("day", day).await
    }

    /// Aggregate for the current UTC month.
    pub async fn monthly_summary(&self) -> Result<UsageSummary, TollgateError> {
        self.summarize("month", this_month()).await
    }

    /// Aggregate for an explicit `YYYY-MM` month.
    pub async fn summary_for_month(&self, month: &str) -> Result<UsageSummary, TollgateError> {
        self.summarize("month", month.to_string()).await
    }

    async fn summarize(
        &self,
        column: &'static str,
        key: String,
    ) -> Result<UsageSummary, TollgateError> {
        self.conn
            .call(move |conn| {
                let mut summary = conn.query_row(
                    &format!(
                        "SELECT COUNT(*), COALESCE(SUM(prompt_tokens), 0), \
                         COALESCE(SUM(completion_tokens), 0), COALESCE(SUM(total_tokens), 0), \
                         COALESCE(SUM(cost_usd), 0.0) FROM usage_ledger WHERE {column} = ?1"
                    ),
                    rusqlite::params![key],
                    |row| {
                        Ok(UsageSummary {
                            period: key.clone(),
                            calls: row.get::<_, i64>(0)? as u64,
                            prompt_tokens: row.get::<_, i64>(1)? as u64,
                            completion_tokens: row.get::<_, i64>(2)? as u64,
                            total_tokens: row.get::<_, i64>(3)? as u64,
                            cost_usd: row.get(4)?,
                            calls_by_provider: BTreeMap::new(),
                        })
                    },
                )?;

                let mut stmt = conn.prepare(&format!(
                    "SELECT provider, COUNT(*) FROM usage_ledger WHERE {column} = ?1 \
                     GROUP BY provider"
                ))?;
                let rows = stmt.query_map(rusqlite::params![key], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?;
                for row in rows {
                    let (provider, calls) = row?;
                    summary.calls_by_provider.insert(provider, calls);
                }
                Ok(summary)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Cloud spend for the current UTC month. Local entries are excluded.
    pub async fn monthly_cloud_spend_usd(&self) -> Result<f64, TollgateError> {
        self.cloud_spend_for_month(&this_month()).await
    }

    /// Cloud spend for an explicit `YYYY-MM` month.
    pub async fn cloud_spend_for_month(&self, month: &str) -> Result<f64, TollgateError> {
        let month = month.to_string();
        let cloud = ProviderKind::Cloud.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT COALESCE(SUM(cost_usd), 0.0) FROM usage_ledger \
                     WHERE month = ?1 AND provider = ?2",
                    rusqlite::params![month, cloud],
                    |row| row.get::<_, f64>(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Per-model call count, average latency, and token total.
    pub async fn model_stats(&self, period: StatsPeriod) -> Result<Vec<ModelStats>, TollgateError> {
        let (filter, key) = match period {
            StatsPeriod::Day => ("WHERE day = ?1", today()),
            StatsPeriod::Month => ("WHERE month = ?1", this_month()),
            StatsPeriod::All => ("WHERE ?1 IS NOT NULL", String::new()),
        };
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT model, COUNT(*), AVG(latency_ms), COALESCE(SUM(total_tokens), 0) \
                     FROM usage_ledger {filter} GROUP BY model ORDER BY COUNT(*) DESC, model"
                ))?;
                let rows = stmt.query_map(rusqlite::params![key], |row| {
                    Ok(ModelStats {
                        model: row.get(0)?,
                        calls: row.get::<_, i64>(1)? as u64,
                        avg_latency_ms: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                        total_tokens: row.get::<_, i64>(3)? as u64,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Current month's cloud spend against `monthly_limit_usd`.
    pub async fn budget_status(&self, monthly_limit_usd: f64) -> Result<BudgetStatus, TollgateError> {
        let spent = self.monthly_cloud_spend_usd().await?;
        Ok(BudgetStatus::new(spent, monthly_limit_usd))
    }

    /// Total number of entries.
    pub async fn count(&self) -> Result<u64, TollgateError> {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM usage_ledger", [], |row| {
                    row.get::<_, i64>(0)
                })
            })
            .await
            .map(|n| n as u64)
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::{FinishReason, TokenUsage};

    fn response(provider: ProviderKind, tier: &str, model: &str, cost: f64) -> Response {
        Response {
            content: Some("ok".into()),
            tool_calls: vec![],
            usage: TokenUsage::new(100, 50),
            provider,
            tier: tier.into(),
            model: model.into(),
            finish_reason: FinishReason::Stop,
            cost_usd: cost,
            escalated_from: None,
            latency_ms: 120,
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn empty_windows_are_zeroed() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        let daily = ledger.daily_summary(None).await.unwrap();
        assert_eq!(daily.calls, 0);
        assert_eq!(daily.cost_usd, 0.0);
        assert!(daily.calls_by_provider.is_empty());
        assert_eq!(ledger.monthly_cloud_spend_usd().await.unwrap(), 0.0);
        assert!(ledger.model_stats(StatsPeriod::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_and_summarize() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        ledger
            .record(&response(ProviderKind::Local, "coder", "qwen2.5-coder:14b", 0.0), Some("code_review"))
            .await
            .unwrap();
        let entry = ledger
            .record(&response(ProviderKind::Cloud, "cloud_standard", "claude-sonnet-4-20250514", 0.25), None)
            .await
            .unwrap();
        assert_eq!(entry.tier, "cloud_standard");

        let daily = ledger.daily_summary(None).await.unwrap();
        assert_eq!(daily.calls, 2);
        assert_eq!(daily.total_tokens, 300);
        assert!((daily.cost_usd - 0.25).abs() < 1e-9);
        assert_eq!(daily.calls_by_provider.get("local"), Some(&1));
        assert_eq!(daily.calls_by_provider.get("cloud"), Some(&1));

        let monthly = ledger.monthly_summary().await.unwrap();
        assert_eq!(monthly.calls, 2);
    }

    #[tokio::test]
    async fn cloud_spend_excludes_local_and_other_months() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        ledger
            .record(&response(ProviderKind::Cloud, "cloud_fast", "haiku", 1.5), None)
            .await
            .unwrap();
        // Local rows never carry cost, but force one to prove the filter.
        ledger
            .record(&response(ProviderKind::Local, "workhorse", "qwen2.5:14b", 9.0), None)
            .await
            .unwrap();
        let old = DateTime::parse_from_rfc3339("2020-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        ledger
            .record_entry(&UsageRecord::at(
                &response(ProviderKind::Cloud, "cloud_fast", "haiku", 100.0),
                None,
                old,
            ))
            .await
            .unwrap();

        assert!((ledger.monthly_cloud_spend_usd().await.unwrap() - 1.5).abs() < 1e-9);
        assert!((ledger.cloud_spend_for_month("2020-01").await.unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(ledger.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn model_stats_per_model() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        for _ in 0..3 {
            ledger
                .record(&response(ProviderKind::Local, "whisper", "qwen2.5:3b", 0.0), None)
                .await
                .unwrap();
        }
        ledger
            .record(&response(ProviderKind::Local, "thinker", "deepseek-r1:14b", 0.0), None)
            .await
            .unwrap();

        let stats = ledger.model_stats(StatsPeriod::Day).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].model, "qwen2.5:3b");
        assert_eq!(stats[0].calls, 3);
        assert_eq!(stats[0].total_tokens, 450);
        assert!((stats[0].avg_latency_ms - 120.0).abs() < 1e-9);
        assert_eq!(ledger.model_stats(StatsPeriod::All).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ledger_rejects_updates() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        ledger
            .record(&response(ProviderKind::Cloud, "cloud_fast", "haiku", 1.0), None)
            .await
            .unwrap();
        let result = ledger
            .conn
            .call(|conn| conn.execute("UPDATE usage_ledger SET cost_usd = 0", []))
            .await;
        assert!(result.is_err());
        let result = ledger
            .conn
            .call(|conn| conn.execute("DELETE FROM usage_ledger", []))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn budget_status_math() {
        let status = BudgetStatus::new(15.0, 30.0);
        assert_eq!(status.percent_used, 50.0);
        assert_eq!(status.remaining_usd, 15.0);
        assert!(!status.is_exhausted());

        let over = BudgetStatus::new(35.0, 30.0);
        assert_eq!(over.remaining_usd, -5.0);
        assert!(over.is_exhausted());

        assert_eq!(BudgetStatus::new(0.0, 30.0).percent_used, 0.0);
        assert_eq!(BudgetStatus::new(0.0, 0.0).percent_used, 0.0);
    }
}
