//! Cache orchestration: lookup, generate on miss, feedback, stats and maintenance.

mod config;
mod error;
mod smart;
/// Keyword topic labels.
pub mod topic;
mod types;


pub use config::{
    HELPFUL_DEFAULT_SCORE, MAX_RATING, MIN_RATING, MaintenancePolicy, ResponderConfig,
    UNHELPFUL_SCORE, feedback_score,
};
pub use error::{ResponderError, ResponderResult};
pub use smart::SmartResponder;
pub use topic::extract_topic;
pub use types::{
    CacheSource, LookupOutcome, MaintenanceReport, RequestPhase,
    ResponderStats, ResponseOutcome, SessionStats,
};
