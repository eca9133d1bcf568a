use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::payload::{PayloadKind, ResponsePayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Closed set of knowledge categories.
pub enum Category {
    LabInterpretation,
    ImagingInterpretation,
    TeachingPearls,
    TeachingQuestions,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::LabInterpretation,
        Category::ImagingInterpretation,
        Category::TeachingPearls,
        Category::TeachingQuestions,
    ];

    /// Wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::LabInterpretation => "lab-interpretation",
            Category::ImagingInterpretation => "imaging-interpretation",
            Category::TeachingPearls => "teaching-pearls",
            Category::TeachingQuestions => "teaching-questions",
        }
    }

    /// The only payload shape entries of this category may carry.
    pub fn payload_kind(&self) -> PayloadKind {
        match self {
            Category::LabInterpretation | Category::ImagingInterpretation => {
                PayloadKind::Interpretation
            }
            Category::TeachingPearls => PayloadKind::ClinicalPearls,
            Category::TeachingQuestions => PayloadKind::TeachingQuestions,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Stable identifier of a knowledge entry (UUID v4).
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A persisted semantic entry.
///
/// Only `confidence`, `usage_count` and `last_used_at` ever change after creation.
pub struct KnowledgeEntry {
    pub id: EntryId,
    pub category: Category,
    /// Diagnostic label; never used for matching.
    pub topic: String,
    pub query_text: String,
    pub response: ResponsePayload,
    pub embedding: Vec<f32>,
    pub confidence: f64,
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl KnowledgeEntry {
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            id: self.id,
            category: self.category,
            topic: self.topic.clone(),
            query_text: self.query_text.clone(),
            confidence: self.confidence,
            usage_count: self.usage_count,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
        }
    }

    /// Whether `cleanup(min_confidence, unused_before)` would delete this entry.
    pub fn is_stale(&self, min_confidence: f64, unused_before: DateTime<Utc>) -> bool {
        self.confidence < min_confidence
            || (self.usage_count == 0 && self.created_at < unused_before)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: KnowledgeEntry,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Entry metadata without the embedding or payload.
pub struct EntrySummary {
    pub id: EntryId,
    pub category: Category,
    pub topic: String,
    pub query_text: String,
    pub confidence: f64,
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeStats {
    pub total_entries: u64,
    pub by_category: BTreeMap<Category, u64>,
    pub average_confidence: f64,
    pub total_usage: u64,
    pub top_entries: Vec<EntrySummary>,
}

impl Default for KnowledgeStats {
    fn default() -> Self {
        Self {
            total_entries: 0,
            by_category: Category::ALL.into_iter().map(|c| (c, 0)).collect(),
            average_confidence: 0.0,
            total_usage: 0,
            top_entries: Vec::new(),
        }
    }
}
