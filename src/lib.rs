//! Lumen library crate (used by the server and integration tests).
//!
//! # Public API Surface
//!
//! ## Core
//! - [`SmartResponder`] - cache-first orchestration over the upstream generator
//! - [`KnowledgeStore`] with [`MemoryBackend`] or [`SqliteBackend`] - persisted entries
//! - [`Config`], [`ConfigError`] - server configuration
//!
//! ## Providers
//! - [`Embedder`]: [`HttpEmbedder`], [`StubEmbedder`], [`MemoEmbedder`]
//! - [`UpstreamProvider`]: [`GenaiUpstream`], [`MockUpstream`]
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod config;
pub mod constants;
pub mod embedding;
pub mod error;
pub mod gateway;
pub mod hashing;
pub mod knowledge;
pub mod lifecycle;
pub mod payload;
pub mod responder;
pub mod storage;
pub mod upstream;

pub use config::{BackendKind, Config, ConfigError};
pub use constants::{DimConfig, DimValidationError, validate_embedding_dim};
#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEmbedder;
pub use embedding::{
    Embedder, EmbeddingError, HttpEmbedder, HttpEmbedderConfig, MemoEmbedder, StubEmbedder,
};
pub use error::ErrorKind;
pub use gateway::{HandlerState, create_router_with_state, serve_until_shutdown};
pub use hashing::{hash_model_query, hash_query, hash_to_u64};
pub use knowledge::{
    Category, EntryId, EntrySummary, KnowledgeBackend, KnowledgeEntry, KnowledgeStats,
    KnowledgeStore, MemoryBackend, ScoredEntry, SqliteBackend, StoreConfig, StoreError,
    StoreResult, cosine_similarity,
};
pub use lifecycle::{LifecycleError, MaintenanceConfig, MaintenanceScheduler};
pub use payload::{
    ClinicalPearls, Interpretation, PayloadError, PayloadKind, ResponsePayload,
    TeachingQuestions,
};
pub use responder::{
    CacheSource, LookupOutcome, MaintenancePolicy, MaintenanceReport, RequestPhase,
    ResponderConfig, ResponderError, ResponderResult, ResponderStats, ResponseOutcome,
    SmartResponder,
};
pub use storage::{SnapshotFile, StorageError};
pub use upstream::{
    GenaiUpstream, MockUpstream, ReportType, RequestContext, UpstreamError, UpstreamProvider,
};
