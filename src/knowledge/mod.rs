//! Knowledge store: persisted semantic entries and their lookup.

mod backend;
mod config;
mod error;
/// In-process backend with snapshot durability.
pub mod memory;
mod similarity;
/// SQLite backend.
pub mod sqlite;
mod store;
mod types;

#[cfg(test)]
mod tests;

pub use backend::KnowledgeBackend;
pub use config::{DEFAULT_EMBED_TIMEOUT, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use similarity::{SimilarityError, cosine_similarity, rank_candidates};
pub use sqlite::{DEFAULT_MAX_CONNECTIONS, SqliteBackend};
pub use store::KnowledgeStore;
pub use types::{
    Category, EntryId, EntrySummary, KnowledgeEntry, KnowledgeStats, ScoredEntry,
    UnknownCategory,
};
