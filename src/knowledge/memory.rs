//! In-process backend with optional rkyv snapshot durability.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::payload::ResponsePayload;
use crate::storage::{
    KnowledgeSnapshot, SnapshotFile, SnapshotRecord, embedding_from_le_bytes,
    embedding_to_le_bytes,
};

use super::backend::KnowledgeBackend;
use super::error::{StoreError, StoreResult};
use super::types::{Category, EntryId, EntrySummary, KnowledgeEntry, KnowledgeStats};

/// Orders by confidence desc, then usage desc.
pub(crate) fn candidate_order(a: &KnowledgeEntry, b: &KnowledgeEntry) -> CmpOrdering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.usage_count.cmp(&a.usage_count))
}

/// Orders by usage desc, then confidence desc.
pub(crate) fn popularity_order(a: &KnowledgeEntry, b: &KnowledgeEntry) -> CmpOrdering {
    b.usage_count
        .cmp(&a.usage_count)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
}

pub(crate) fn matches_all_terms(entry: &KnowledgeEntry, terms: &[String]) -> bool {
    let query = entry.query_text.to_ascii_lowercase();
    let topic = entry.topic.to_ascii_lowercase();
    terms
        .iter()
        .all(|t| query.contains(t.as_str()) || topic.contains(t.as_str()))
}

/// Backend holding every entry in a `HashMap` behind one `RwLock`.
///
/// Per-entry updates take the write guard, so they are linearizable. When a
/// [`SnapshotFile`] is attached, [`KnowledgeBackend::flush`] persists the map
/// if anything changed since the last flush.
pub struct MemoryBackend {
    entries: RwLock<HashMap<EntryId, KnowledgeEntry>>,
    snapshot: Option<SnapshotFile>,
    dirty: AtomicBool,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.len())
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Volatile backend.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            snapshot: None,
            dirty: AtomicBool::new(false),
        }
    }

    /// Backend persisted to `snapshot`, pre-loaded from it when the file exists.
    pub fn open(snapshot: SnapshotFile) -> StoreResult<Self> {
        let mut entries = HashMap::new();

        if let Some(loaded) = snapshot.load()? {
            for record in loaded.records {
                let entry = entry_from_record(record)?;
                entries.insert(entry.id, entry);
            }
            info!(
                path = %snapshot.path().display(),
                entries = entries.len(),
                "Knowledge snapshot restored"
            );
        }

        Ok(Self {
            entries: RwLock::new(entries),
            snapshot: Some(snapshot),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot_file(&self) -> Option<&SnapshotFile> {
        self.snapshot.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn to_snapshot(&self) -> StoreResult<KnowledgeSnapshot> {
        let entries = self.entries.read();
        let dim = entries
            .values()
            .next()
            .map(|e| e.embedding.len() as u32)
            .unwrap_or(0);
        let records = entries
            .values()
            .map(record_from_entry)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(KnowledgeSnapshot::new(dim, records))
    }
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn record_from_entry(entry: &KnowledgeEntry) -> StoreResult<SnapshotRecord> {
    Ok(SnapshotRecord {
        id: *entry.id.as_bytes(),
        category: entry.category.as_str().to_string(),
        topic: entry.topic.clone(),
        query_text: entry.query_text.clone(),
        payload_json: entry.response.to_json()?,
        embedding: embedding_to_le_bytes(&entry.embedding),
        confidence: entry.confidence,
        usage_count: entry.usage_count,
        created_at_ms: entry.created_at.timestamp_millis(),
        last_used_at_ms: entry.last_used_at.map(|t| t.timestamp_millis()),
    })
}

fn entry_from_record(record: SnapshotRecord) -> StoreResult<KnowledgeEntry> {
    let id = EntryId::from_bytes(record.id);
    let category: Category = record
        .category
        .parse()
        .map_err(|e| StoreError::corrupt(id, e))?;
    let response = ResponsePayload::from_json_for(&record.payload_json, category)
        .map_err(|e| StoreError::corrupt(id, e))?;
    let embedding =
        embedding_from_le_bytes(&record.embedding).map_err(|e| StoreError::corrupt(id, e))?;
    let created_at = millis_to_utc(record.created_at_ms)
        .ok_or_else(|| StoreError::corrupt(id, "created_at out of range"))?;

    Ok(KnowledgeEntry {
        id,
        category,
        topic: record.topic,
        query_text: record.query_text,
        response,
        embedding,
        confidence: record.confidence,
        usage_count: record.usage_count,
        created_at,
        last_used_at: record.last_used_at_ms.and_then(millis_to_utc),
    })
}

impl KnowledgeBackend for MemoryBackend {
    async fn insert(&self, entry: KnowledgeEntry) -> StoreResult<()> {
        self.entries.write().insert(entry.id, entry);
        self.mark_dirty();
        Ok(())
    }

    async fn candidates(&self, category: Category, window: usize) -> StoreResult<Vec<KnowledgeEntry>> {
        let entries = self.entries.read();
        let mut matching: Vec<&KnowledgeEntry> =
            entries.values().filter(|e| e.category == category).collect();
        matching.sort_by(|a, b| candidate_order(a, b));
        Ok(matching.into_iter().take(window).cloned().collect())
    }

    async fn get(&self, id: EntryId) -> StoreResult<Option<KnowledgeEntry>> {
        Ok(self.entries.read().get(&id).cloned())
    }

    async fn increment_usage(&self, id: EntryId, at: DateTime<Utc>) -> StoreResult<Option<u64>> {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&id) else {
            return Ok(None);
        };
        entry.usage_count = entry.usage_count.saturating_add(1);
        entry.last_used_at = Some(at);
        let count = entry.usage_count;
        drop(entries);

        self.mark_dirty();
        Ok(Some(count))
    }

    async fn apply_feedback(&self, id: EntryId, score: f64, retention: f64) -> StoreResult<Option<f64>> {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&id) else {
            return Ok(None);
        };
        entry.confidence =
            (retention * entry.confidence + (1.0 - retention) * score).clamp(0.0, 1.0);
        let confidence = entry.confidence;
        drop(entries);

        self.mark_dirty();
        Ok(Some(confidence))
    }

    async fn cleanup(&self, min_confidence: f64, unused_before: DateTime<Utc>) -> StoreResult<u64> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_stale(min_confidence, unused_before));
        let deleted = (before - entries.len()) as u64;
        drop(entries);

        if deleted > 0 {
            self.mark_dirty();
        }
        Ok(deleted)
    }

    async fn stats(&self, top_n: usize) -> StoreResult<KnowledgeStats> {
        let entries = self.entries.read();
        let mut stats = KnowledgeStats::default();

        for entry in entries.values() {
            stats.total_entries += 1;
            stats.total_usage = stats.total_usage.saturating_add(entry.usage_count);
            *stats.by_category.entry(entry.category).or_insert(0) += 1;
            stats.average_confidence += entry.confidence;
        }
        if stats.total_entries > 0 {
            stats.average_confidence /= stats.total_entries as f64;
        }

        let mut ranked: Vec<&KnowledgeEntry> = entries.values().collect();
        ranked.sort_by(|a, b| popularity_order(a, b));
        stats.top_entries = ranked.into_iter().take(top_n).map(|e| e.summary()).collect();

        Ok(stats)
    }

    async fn full_text_search(&self, terms: &[String], limit: usize) -> StoreResult<Vec<EntrySummary>> {
        let entries = self.entries.read();
        let mut hits: Vec<&KnowledgeEntry> = entries
            .values()
            .filter(|e| matches_all_terms(e, terms))
            .collect();
        hits.sort_by(|a, b| popularity_order(a, b));
        Ok(hits.into_iter().take(limit).map(|e| e.summary()).collect())
    }

    async fn embedding_dim(&self) -> StoreResult<Option<usize>> {
        Ok(self.entries.read().values().next().map(|e| e.embedding.len()))
    }

    async fn flush(&self) -> StoreResult<()> {
        let Some(file) = self.snapshot.clone() else {
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::AcqRel) {
            debug!("Snapshot clean, skipping flush");
            return Ok(());
        }

        let snapshot = match self.to_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.mark_dirty();
                return Err(e);
            }
        };
        let result = tokio::task::spawn_blocking(move || file.write(&snapshot))
            .await
            .map_err(|e| StoreError::storage("flush", e))?;

        if let Err(e) = result {
            self.mark_dirty();
            return Err(e.into());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
