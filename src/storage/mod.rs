//! On-disk primitives: embedding codec, mmap access and rkyv snapshots.

/// Little-endian f32 embedding encoding.
pub mod codec;
mod error;
/// Read-only memory-mapped file access.
pub mod mmap;
mod model;
/// Atomic snapshot file (temp-file + rename).
pub mod snapshot;

pub use codec::{embedding_from_le_bytes, embedding_to_le_bytes};
pub use error::{StorageError, StorageResult};
pub use mmap::{MmapError, MmapFileHandle, MmapResult};
pub use model::{
    ArchivedKnowledgeSnapshot, ArchivedSnapshotRecord, KnowledgeSnapshot, SNAPSHOT_VERSION,
    SnapshotRecord,
};
pub use snapshot::{DEFAULT_SNAPSHOT_FILENAME, SnapshotFile};
