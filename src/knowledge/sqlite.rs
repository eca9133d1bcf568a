//! SQLite backend over an `sqlx` pool.
//!
//! Usage and confidence arithmetic happen inside single `UPDATE ... RETURNING`
//! statements, so concurrent writers never read-modify-write in Rust.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use tracing::{debug, info, warn};

use crate::payload::ResponsePayload;
use crate::storage::{embedding_from_le_bytes, embedding_to_le_bytes};

use super::backend::KnowledgeBackend;
use super::error::{StoreError, StoreResult};
use super::types::{Category, EntryId, EntrySummary, KnowledgeEntry, KnowledgeStats};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS knowledge_entries (
        id TEXT PRIMARY KEY NOT NULL,
        category TEXT NOT NULL,
        topic TEXT NOT NULL,
        query_text TEXT NOT NULL,
        response_payload TEXT NOT NULL,
        embedding BLOB NOT NULL,
        confidence REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
        usage_count INTEGER NOT NULL DEFAULT 0 CHECK (usage_count >= 0),
        created_at INTEGER NOT NULL,
        last_used_at INTEGER
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_knowledge_entries_candidates
        ON knowledge_entries (category, confidence DESC, usage_count DESC)
    "#,
];

const ENTRY_COLUMNS: &str = "id, category, topic, query_text, response_payload, embedding, \
     confidence, usage_count, created_at, last_used_at";

const SUMMARY_COLUMNS: &str =
    "id, category, topic, query_text, confidence, usage_count, created_at, last_used_at";

#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::storage("connect", e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(DEFAULT_BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::storage("connect", e))?;

        let backend = Self { pool };
        backend.ensure_schema().await?;

        info!(url = url, max_connections, "SQLite knowledge backend ready");
        Ok(backend)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::storage("ensure_schema", e))?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn decode_header(row: &SqliteRow) -> StoreResult<(EntryId, Category)> {
    let raw_id: String = row.try_get("id")?;
    let id = EntryId::from_str(&raw_id).map_err(|e| StoreError::corrupt(&raw_id, e))?;
    let raw_category: String = row.try_get("category")?;
    let category = Category::from_str(&raw_category).map_err(|e| StoreError::corrupt(id, e))?;
    Ok((id, category))
}

fn decode_timestamps(
    row: &SqliteRow,
    id: EntryId,
) -> StoreResult<(DateTime<Utc>, Option<DateTime<Utc>>)> {
    let created_at_ms: i64 = row.try_get("created_at")?;
    let last_used_at_ms: Option<i64> = row.try_get("last_used_at")?;
    let created_at = millis_to_utc(created_at_ms)
        .ok_or_else(|| StoreError::corrupt(id, "created_at out of range"))?;
    Ok((created_at, last_used_at_ms.and_then(millis_to_utc)))
}

fn entry_from_row(row: &SqliteRow) -> StoreResult<KnowledgeEntry> {
    let (id, category) = decode_header(row)?;
    let (created_at, last_used_at) = decode_timestamps(row, id)?;

    let payload_json: String = row.try_get("response_payload")?;
    let response = ResponsePayload::from_json_for(&payload_json, category)
        .map_err(|e| StoreError::corrupt(id, e))?;

    let embedding_bytes: Vec<u8> = row.try_get("embedding")?;
    let embedding =
        embedding_from_le_bytes(&embedding_bytes).map_err(|e| StoreError::corrupt(id, e))?;

    let usage_count: i64 = row.try_get("usage_count")?;

    Ok(KnowledgeEntry {
        id,
        category,
        topic: row.try_get("topic")?,
        query_text: row.try_get("query_text")?,
        response,
        embedding,
        confidence: row.try_get("confidence")?,
        usage_count: usage_count.max(0) as u64,
        created_at,
        last_used_at,
    })
}

fn summary_from_row(row: &SqliteRow) -> StoreResult<EntrySummary> {
    let (id, category) = decode_header(row)?;
    let (created_at, last_used_at) = decode_timestamps(row, id)?;
    let usage_count: i64 = row.try_get("usage_count")?;

    Ok(EntrySummary {
        id,
        category,
        topic: row.try_get("topic")?,
        query_text: row.try_get("query_text")?,
        confidence: row.try_get("confidence")?,
        usage_count: usage_count.max(0) as u64,
        created_at,
        last_used_at,
    })
}

impl KnowledgeBackend for SqliteBackend {
    async fn insert(&self, entry: KnowledgeEntry) -> StoreResult<()> {
        let payload_json = entry.response.to_json()?;
        let embedding = embedding_to_le_bytes(&entry.embedding);

        sqlx::query(
            r#"
            INSERT INTO knowledge_entries
                (id, category, topic, query_text, response_payload, embedding,
                 confidence, usage_count, created_at, last_used_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.category.as_str())
        .bind(&entry.topic)
        .bind(&entry.query_text)
        .bind(payload_json)
        .bind(embedding)
        .bind(entry.confidence)
        .bind(entry.usage_count as i64)
        .bind(entry.created_at.timestamp_millis())
        .bind(entry.last_used_at.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::storage("insert", e))?;

        debug!(entry_id = %entry.id, "Entry inserted");
        Ok(())
    }

    async fn candidates(&self, category: Category, window: usize) -> StoreResult<Vec<KnowledgeEntry>> {
        let sql = format!(
            "SELECT {} FROM knowledge_entries WHERE category = ? \
             ORDER BY confidence DESC, usage_count DESC LIMIT ?",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(category.as_str())
            .bind(window as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::storage("candidates", e))?;

        let entries = rows
            .iter()
            .filter_map(|row| match entry_from_row(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    let raw_id: String = row.try_get("id").unwrap_or_default();
                    warn!(entry_id = %raw_id, error = %e, "Skipping undecodable candidate row");
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    async fn get(&self, id: EntryId) -> StoreResult<Option<KnowledgeEntry>> {
        let sql = format!("SELECT {} FROM knowledge_entries WHERE id = ?", ENTRY_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::storage("get", e))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn increment_usage(&self, id: EntryId, at: DateTime<Utc>) -> StoreResult<Option<u64>> {
        let row = sqlx::query(
            "UPDATE knowledge_entries \
             SET usage_count = usage_count + 1, last_used_at = ? \
             WHERE id = ? RETURNING usage_count",
        )
        .bind(at.timestamp_millis())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::storage("increment_usage", e))?;

        match row {
            Some(row) => {
                let count: i64 = row.try_get("usage_count")?;
                Ok(Some(count.max(0) as u64))
            }
            None => Ok(None),
        }
    }

    async fn apply_feedback(&self, id: EntryId, score: f64, retention: f64) -> StoreResult<Option<f64>> {
        let row = sqlx::query(
            "UPDATE knowledge_entries \
             SET confidence = MIN(1.0, MAX(0.0, ?1 * confidence + (1.0 - ?1) * ?2)) \
             WHERE id = ?3 RETURNING confidence",
        )
        .bind(retention)
        .bind(score)
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::storage("apply_feedback", e))?;

        match row {
            Some(row) => Ok(Some(row.try_get("confidence")?)),
            None => Ok(None),
        }
    }

    async fn cleanup(&self, min_confidence: f64, unused_before: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM knowledge_entries \
             WHERE confidence < ? OR (usage_count = 0 AND created_at < ?)",
        )
        .bind(min_confidence)
        .bind(unused_before.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::storage("cleanup", e))?;

        Ok(result.rows_affected())
    }

    async fn stats(&self, top_n: usize) -> StoreResult<KnowledgeStats> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::storage("stats", e))?;

        let totals = sqlx::query(
            "SELECT COUNT(*) AS total, \
                    COALESCE(AVG(confidence), 0.0) AS avg_confidence, \
                    COALESCE(SUM(usage_count), 0) AS total_usage \
             FROM knowledge_entries",
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::storage("stats", e))?;

        let by_category = sqlx::query(
            "SELECT category, COUNT(*) AS n FROM knowledge_entries GROUP BY category",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StoreError::storage("stats", e))?;

        let sql = format!(
            "SELECT {} FROM knowledge_entries \
             ORDER BY usage_count DESC, confidence DESC LIMIT ?",
            SUMMARY_COLUMNS
        );
        let top = sqlx::query(&sql)
            .bind(top_n as i64)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| StoreError::storage("stats", e))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::storage("stats", e))?;

        let mut stats = KnowledgeStats::default();
        let total: i64 = totals.try_get("total")?;
        let total_usage: i64 = totals.try_get("total_usage")?;
        stats.total_entries = total.max(0) as u64;
        stats.total_usage = total_usage.max(0) as u64;
        stats.average_confidence = totals.try_get("avg_confidence")?;

        for row in &by_category {
            let raw: String = row.try_get("category")?;
            let category = Category::from_str(&raw).map_err(|e| StoreError::corrupt("-", e))?;
            let n: i64 = row.try_get("n")?;
            stats.by_category.insert(category, n.max(0) as u64);
        }

        stats.top_entries = top.iter().map(summary_from_row).collect::<StoreResult<_>>()?;
        Ok(stats)
    }

    async fn full_text_search(&self, terms: &[String], limit: usize) -> StoreResult<Vec<EntrySummary>> {
        let mut sql = format!("SELECT {} FROM knowledge_entries", SUMMARY_COLUMNS);
        for (i, _) in terms.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(
                "(LOWER(query_text) LIKE ? ESCAPE '\\' OR LOWER(topic) LIKE ? ESCAPE '\\')",
            );
        }
        sql.push_str(" ORDER BY usage_count DESC, confidence DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        for term in terms {
            let pattern = like_pattern(term);
            query = query.bind(pattern.clone()).bind(pattern);
        }
        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::storage("full_text_search", e))?;

        rows.iter().map(summary_from_row).collect()
    }

    async fn embedding_dim(&self) -> StoreResult<Option<usize>> {
        let row = sqlx::query("SELECT LENGTH(embedding) AS n FROM knowledge_entries LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::storage("embedding_dim", e))?;

        match row {
            Some(row) => {
                let bytes: i64 = row.try_get("n")?;
                Ok(Some(bytes.max(0) as usize / std::mem::size_of::<f32>()))
            }
            None => Ok(None),
        }
    }

    async fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
