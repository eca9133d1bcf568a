use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::ErrorKind;
use crate::knowledge::{Category, EntryId, KnowledgeStats, ScoredEntry};
use crate::payload::ResponsePayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
/// Where a response came from.
pub enum CacheSource {
    Cache,
    Upstream,
}

impl CacheSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheSource::Cache => "cache",
            CacheSource::Upstream => "upstream",
        }
    }
}

impl std::fmt::Display for CacheSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOutcome {
    pub entry_id: EntryId,
    pub category: Category,
    pub response: ResponsePayload,
    pub source: CacheSource,
    pub confidence: f64,
    pub similarity: f32,
    pub usage_count: u64,
    pub api_call_saved: bool,
}

#[derive(Debug, Clone, PartialEq)]
/// Result of the cache lookup step.
pub enum LookupOutcome {
    /// Best match at or above the threshold.
    Hit(ScoredEntry),
    Miss,
    /// Search failed; treated as a miss.
    Degraded(ErrorKind),
}

impl LookupOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, LookupOutcome::Hit(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, LookupOutcome::Degraded(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Per-request state, recorded on the request span.
pub enum RequestPhase {
    Received,
    Searching,
    CacheHit,
    CacheMiss,
    Generating,
    Persisting,
    Returning,
    Failed,
}

impl RequestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPhase::Received => "received",
            RequestPhase::Searching => "searching",
            RequestPhase::CacheHit => "cache_hit",
            RequestPhase::CacheMiss => "cache_miss",
            RequestPhase::Generating => "generating",
            RequestPhase::Persisting => "persisting",
            RequestPhase::Returning => "returning",
            RequestPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Lookup counters since process start.
pub struct SessionStats {
    pub hits: u64,
    pub misses: u64,
    pub degraded: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    degraded: AtomicU64,
}

impl SessionCounters {
    pub(crate) fn record(&self, outcome: &LookupOutcome) {
        let counter = match outcome {
            LookupOutcome::Hit(_) => &self.hits,
            LookupOutcome::Miss => &self.misses,
            LookupOutcome::Degraded(_) => &self.degraded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let degraded = self.degraded.load(Ordering::Relaxed);
        let total = hits + misses + degraded;
        SessionStats {
            hits,
            misses,
            degraded,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderStats {
    #[serde(flatten)]
    pub knowledge: KnowledgeStats,
    /// Each recorded hit is one avoided upstream call.
    pub api_calls_saved: u64,
    pub estimated_tokens_saved: u64,
    pub estimated_cost_saved: f64,
    pub session: SessionStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub deleted_entries: u64,
    pub remaining_entries: u64,
    pub average_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_error: Option<String>,
}

impl MaintenanceReport {
    pub fn is_clean(&self) -> bool {
        self.cleanup_error.is_none() && self.stats_error.is_none()
    }
}
