//! Text embedding providers.
//!
//! - [`HttpEmbedder`] calls an OpenAI-compatible endpoint.
//! - [`StubEmbedder`] is deterministic and offline.
//! - [`MemoEmbedder`] memoizes any other embedder in process.

mod error;
/// OpenAI-compatible HTTP embedder.
pub mod http;
/// Memoizing wrapper.
pub mod memo;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod provider;
/// Deterministic offline embedder.
pub mod stub;


pub use error::EmbeddingError;
pub use http::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_TIMEOUT, DEFAULT_EMBEDDING_URL, HttpEmbedder,
    HttpEmbedderConfig,
};
pub use memo::{DEFAULT_MEMO_CAPACITY, MemoEmbedder};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbedder;
pub use provider::{Embedder, embed_with_timeout};
pub use stub::StubEmbedder;
