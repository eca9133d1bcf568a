//! Offline provider returning canned payloads.
//!
//! Selected at runtime with `LUMEN_MOCK_PROVIDER`; tests also use its call
//! counter and failure toggle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::payload::{
    ClinicalPearls, Difficulty, Finding, FindingStatus, Interpretation, Pearl, Question,
    TeachingQuestions, Urgency,
};

use super::error::{UpstreamError, UpstreamResult};
use super::provider::{
    OP_INTERPRETATION, OP_PEARLS, OP_QUESTIONS, ReportType, RequestContext, UpstreamProvider,
};

#[derive(Debug, Default)]
pub struct MockUpstream {
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: RwLock<Option<Duration>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total generation calls across all operations.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    async fn enter(&self, operation: &'static str) -> UpstreamResult<()> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        debug!(operation, "Mock upstream call");

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::Acquire) {
            return Err(UpstreamError::RequestFailed {
                operation,
                reason: "mock upstream set to fail".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl UpstreamProvider for MockUpstream {
    async fn generate_interpretation(
        &self,
        query: &str,
        _context: &RequestContext,
    ) -> UpstreamResult<Interpretation> {
        self.enter(OP_INTERPRETATION).await?;
        Ok(Interpretation {
            summary: format!("Mock interpretation of: {}", query),
            findings: vec![Finding {
                name: "mock".to_string(),
                value: "n/a".to_string(),
                status: FindingStatus::Normal,
                explanation: "generated offline".to_string(),
            }],
            recommendations: vec!["Correlate clinically".to_string()],
            urgency: Urgency::Routine,
        })
    }

    async fn generate_pearls(
        &self,
        interpretation: &str,
        report_type: ReportType,
    ) -> UpstreamResult<ClinicalPearls> {
        self.enter(OP_PEARLS).await?;
        Ok(ClinicalPearls {
            pearls: vec![Pearl {
                title: format!("Mock {} pearl", report_type.as_str()),
                content: interpretation.to_string(),
                category: "general".to_string(),
            }],
        })
    }

    async fn generate_questions(
        &self,
        interpretation: &str,
        report_type: ReportType,
    ) -> UpstreamResult<TeachingQuestions> {
        self.enter(OP_QUESTIONS).await?;
        Ok(TeachingQuestions {
            questions: vec![Question {
                question: format!("What does this {} report show? {}", report_type.as_str(), interpretation),
                options: vec!["A".to_string(), "B".to_string()],
                answer: "A".to_string(),
                explanation: "generated offline".to_string(),
                difficulty: Difficulty::Easy,
            }],
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
