//! Upstream generation providers.

mod error;
/// `genai`-backed provider.
pub mod chat;
/// Offline provider.
pub mod mock;
/// Prompt builders and reply parsing helpers.
pub mod prompts;
mod provider;

pub use chat::{DEFAULT_UPSTREAM_MODEL, DEFAULT_UPSTREAM_TIMEOUT, GenaiUpstream, parse_reply};
pub use error::{UpstreamError, UpstreamResult};
pub use mock::MockUpstream;
pub use provider::{
    OP_INTERPRETATION, OP_PEARLS, OP_QUESTIONS, ReportType, RequestContext, UpstreamProvider,
};
