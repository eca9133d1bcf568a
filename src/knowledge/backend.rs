use std::future::Future;

use chrono::{DateTime, Utc};

use super::error::StoreResult;
use super::types::{Category, EntryId, EntrySummary, KnowledgeEntry, KnowledgeStats};

/// Persistence for knowledge entries.
///
/// Every mutating method is atomic per entry: concurrent calls on the same id
/// never lose an update.
pub trait KnowledgeBackend: Send + Sync + 'static {
    /// Persists a fully built entry.
    fn insert(&self, entry: KnowledgeEntry) -> impl Future<Output = StoreResult<()>> + Send;

    /// Up to `window` entries of `category`, by confidence desc then usage desc.
    fn candidates(
        &self,
        category: Category,
        window: usize,
    ) -> impl Future<Output = StoreResult<Vec<KnowledgeEntry>>> + Send;

    fn get(&self, id: EntryId) -> impl Future<Output = StoreResult<Option<KnowledgeEntry>>> + Send;

    /// `usage_count += 1`, `last_used_at = at`. Returns the new count, or `None`
    /// when the entry no longer exists.
    fn increment_usage(
        &self,
        id: EntryId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<u64>>> + Send;

    /// `confidence = retention * confidence + (1 - retention) * score`, computed
    /// in place. Returns the new confidence, or `None` when the entry is gone.
    fn apply_feedback(
        &self,
        id: EntryId,
        score: f64,
        retention: f64,
    ) -> impl Future<Output = StoreResult<Option<f64>>> + Send;

    /// Deletes entries with `confidence < min_confidence`, or never used and
    /// created before `unused_before`. Returns the number deleted.
    fn cleanup(
        &self,
        min_confidence: f64,
        unused_before: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn stats(&self, top_n: usize) -> impl Future<Output = StoreResult<KnowledgeStats>> + Send;

    /// Entries whose query text or topic contains every term, by usage desc.
    ///
    /// `terms` arrive ASCII-lowercased; compare against ASCII-folded text.
    fn full_text_search(
        &self,
        terms: &[String],
        limit: usize,
    ) -> impl Future<Output = StoreResult<Vec<EntrySummary>>> + Send;

    /// Embedding length of any persisted entry, if one exists.
    fn embedding_dim(&self) -> impl Future<Output = StoreResult<Option<usize>>> + Send;

    /// Makes pending state durable. No-op for backends that write through.
    fn flush(&self) -> impl Future<Output = StoreResult<()>> + Send;

    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;
}
