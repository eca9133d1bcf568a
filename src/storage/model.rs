//! Snapshot model types.

use rkyv::{Archive, Deserialize, Serialize};

/// Bumped whenever [`SnapshotRecord`] changes layout.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One knowledge entry as persisted in a snapshot.
///
/// Stored as `rkyv` bytes and read back through a memory map.
#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct SnapshotRecord {
    /// UUID bytes.
    pub id: [u8; 16],
    /// Category wire name (`lab-interpretation`, ...).
    pub category: String,
    pub topic: String,
    pub query_text: String,
    /// Response payload as JSON text.
    pub payload_json: String,
    /// Embedding as little-endian f32 bytes.
    pub embedding: Vec<u8>,
    pub confidence: f64,
    pub usage_count: u64,
    /// Unix millis.
    pub created_at_ms: i64,
    /// Unix millis; `None` until the first hit.
    pub last_used_at_ms: Option<i64>,
}

/// Whole-store snapshot.
#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct KnowledgeSnapshot {
    pub version: u32,
    /// Pinned embedding dimension, `0` when nothing has been stored yet.
    pub embedding_dim: u32,
    pub records: Vec<SnapshotRecord>,
}

impl KnowledgeSnapshot {
    pub fn new(embedding_dim: u32, records: Vec<SnapshotRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            embedding_dim,
            records,
        }
    }
}
