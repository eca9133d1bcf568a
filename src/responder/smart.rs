use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{Span, debug, error, info, instrument, warn};

use crate::error::ErrorKind;
use crate::knowledge::{
    Category, EntryId, EntrySummary, KnowledgeBackend, KnowledgeStore, ScoredEntry,
};
use crate::payload::ResponsePayload;
use crate::upstream::{RequestContext, UpstreamProvider};

use super::config::{MaintenancePolicy, ResponderConfig, feedback_score};
use super::error::{ResponderError, ResponderResult};
use super::topic::extract_topic;
use super::types::{
    CacheSource, LookupOutcome, MaintenanceReport, RequestPhase, ResponderStats,
    ResponseOutcome, SessionCounters, SessionStats,
};

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    fn exceeded(&self, phase: RequestPhase) -> ResponderError {
        ResponderError::DeadlineExceeded {
            phase,
            budget_ms: self.budget.as_millis() as u64,
        }
    }
}

fn enter_phase(phase: RequestPhase) {
    Span::current().record("phase", phase.as_str());
    debug!(phase = %phase, "Request phase");
}

/// Cache-first responder in front of the upstream generation service.
///
/// Holds only handles; clones share the store, provider and session counters.
pub struct SmartResponder<B: KnowledgeBackend> {
    store: KnowledgeStore<B>,
    upstream: Arc<dyn UpstreamProvider>,
    config: Arc<ResponderConfig>,
    counters: Arc<SessionCounters>,
}

impl<B: KnowledgeBackend> Clone for SmartResponder<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            upstream: Arc::clone(&self.upstream),
            config: Arc::clone(&self.config),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<B: KnowledgeBackend> std::fmt::Debug for SmartResponder<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartResponder")
            .field("store", &self.store)
            .field("upstream", &self.upstream.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: KnowledgeBackend> SmartResponder<B> {
    pub fn new(
        store: KnowledgeStore<B>,
        upstream: Arc<dyn UpstreamProvider>,
        config: ResponderConfig,
    ) -> ResponderResult<Self> {
        config.validate()?;
        info!(
            upstream = upstream.name(),
            threshold = config.similarity_threshold,
            limit = config.search_limit,
            "Smart responder ready"
        );
        Ok(Self {
            store,
            upstream,
            config: Arc::new(config),
            counters: Arc::new(SessionCounters::default()),
        })
    }

    pub fn knowledge(&self) -> &KnowledgeStore<B> {
        &self.store
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    pub fn upstream(&self) -> &Arc<dyn UpstreamProvider> {
        &self.upstream
    }

    pub fn session_stats(&self) -> SessionStats {
        self.counters.snapshot()
    }

    /// Searches `category` for `query`. Search failures come back as
    /// [`LookupOutcome::Degraded`], never as errors.
    #[instrument(skip(self, query), fields(category = %category, query_len = query.len()))]
    pub async fn lookup(&self, query: &str, category: Category) -> LookupOutcome {
        let threshold = self.config.similarity_threshold;
        match self
            .store
            .search(query, category, threshold, self.config.search_limit)
            .await
        {
            Ok(results) => match results.into_iter().next() {
                Some(best) if best.similarity >= threshold => LookupOutcome::Hit(best),
                _ => LookupOutcome::Miss,
            },
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "Knowledge search failed, treating as miss");
                LookupOutcome::Degraded(e.kind())
            }
        }
    }

    /// Answers from the cache when a close enough entry exists, otherwise
    /// generates upstream and stores the result.
    pub async fn get_response(
        &self,
        query: &str,
        category: Category,
        context: &RequestContext,
    ) -> ResponderResult<ResponseOutcome> {
        self.respond(query, category, context, None).await
    }

    /// [`Self::get_response`] bounded by `budget`.
    ///
    /// A search that overruns degrades to a miss; a generation that overruns
    /// fails with [`ResponderError::DeadlineExceeded`]. Persisting is not
    /// bounded once a payload exists.
    pub async fn get_response_within(
        &self,
        query: &str,
        category: Category,
        context: &RequestContext,
        budget: Duration,
    ) -> ResponderResult<ResponseOutcome> {
        let deadline = Deadline {
            at: Instant::now() + budget,
            budget,
        };
        self.respond(query, category, context, Some(deadline)).await
    }

    #[instrument(
        name = "get_response",
        skip(self, query, context, deadline),
        fields(
            category = %category,
            query_len = query.len(),
            phase = tracing::field::Empty,
            source = tracing::field::Empty,
        )
    )]
    async fn respond(
        &self,
        query: &str,
        category: Category,
        context: &RequestContext,
        deadline: Option<Deadline>,
    ) -> ResponderResult<ResponseOutcome> {
        enter_phase(RequestPhase::Received);
        if query.trim().is_empty() {
            enter_phase(RequestPhase::Failed);
            return Err(ResponderError::InvalidQuery {
                reason: "query must not be empty".to_string(),
            });
        }

        enter_phase(RequestPhase::Searching);
        let outcome = match deadline {
            Some(d) => match timeout_at(d.at, self.lookup(query, category)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        budget_ms = d.budget.as_millis() as u64,
                        "Search overran the request deadline, treating as miss"
                    );
                    LookupOutcome::Degraded(ErrorKind::DeadlineExceeded)
                }
            },
            None => self.lookup(query, category).await,
        };
        self.counters.record(&outcome);

        let result = match outcome {
            LookupOutcome::Hit(scored) => {
                enter_phase(RequestPhase::CacheHit);
                Ok(self.serve_hit(scored).await)
            }
            LookupOutcome::Miss | LookupOutcome::Degraded(_) => {
                enter_phase(RequestPhase::CacheMiss);
                self.serve_miss(query, category, context, deadline).await
            }
        };

        match &result {
            Ok(outcome) => {
                enter_phase(RequestPhase::Returning);
                Span::current().record("source", outcome.source.as_str());
            }
            Err(e) => {
                enter_phase(RequestPhase::Failed);
                debug!(error = %e, kind = %e.kind(), "Request failed");
            }
        }
        result
    }

    async fn serve_hit(&self, scored: ScoredEntry) -> ResponseOutcome {
        let ScoredEntry { entry, similarity } = scored;

        let usage_count = match self.store.increment_usage(entry.id).await {
            Ok(Some(count)) => count,
            Ok(None) => {
                warn!(entry_id = %entry.id, "Entry removed between search and hit, serving it anyway");
                entry.usage_count.saturating_add(1)
            }
            Err(e) => {
                warn!(entry_id = %entry.id, error = %e, "Usage increment failed, serving hit anyway");
                entry.usage_count.saturating_add(1)
            }
        };

        info!(
            entry_id = %entry.id,
            similarity,
            usage_count,
            "Cache hit"
        );

        ResponseOutcome {
            entry_id: entry.id,
            category: entry.category,
            response: entry.response,
            source: CacheSource::Cache,
            confidence: entry.confidence,
            similarity,
            usage_count,
            api_call_saved: true,
        }
    }

    async fn serve_miss(
        &self,
        query: &str,
        category: Category,
        context: &RequestContext,
        deadline: Option<Deadline>,
    ) -> ResponderResult<ResponseOutcome> {
        enter_phase(RequestPhase::Generating);
        let generation = self.generate(query, category, context);
        let response = match deadline {
            Some(d) => timeout_at(d.at, generation)
                .await
                .map_err(|_| d.exceeded(RequestPhase::Generating))??,
            None => generation.await?,
        };

        enter_phase(RequestPhase::Persisting);
        let topic = extract_topic(query, category);
        let confidence = self.config.initial_confidence;
        let entry_id = self
            .store
            .store(category, &topic, query, response.clone(), confidence)
            .await
            .map_err(ResponderError::store("store", Some(category)))?;

        info!(entry_id = %entry_id, topic = %topic, "Cache miss, generated and stored");

        Ok(ResponseOutcome {
            entry_id,
            category,
            response,
            source: CacheSource::Upstream,
            confidence,
            similarity: 1.0,
            usage_count: 0,
            api_call_saved: false,
        })
    }

    async fn generate(
        &self,
        query: &str,
        category: Category,
        context: &RequestContext,
    ) -> ResponderResult<ResponsePayload> {
        let report_type = context.report_type_for(category);
        let upstream = &self.upstream;

        let generated = match category {
            Category::LabInterpretation | Category::ImagingInterpretation => {
                let context = RequestContext {
                    report_type: Some(report_type),
                    ..context.clone()
                };
                upstream
                    .generate_interpretation(query, &context)
                    .await
                    .map(ResponsePayload::Interpretation)
            }
            Category::TeachingPearls => upstream
                .generate_pearls(query, report_type)
                .await
                .map(ResponsePayload::ClinicalPearls),
            Category::TeachingQuestions => upstream
                .generate_questions(query, report_type)
                .await
                .map(ResponsePayload::TeachingQuestions),
        };

        let payload = generated.map_err(|source| {
            error!(
                provider = upstream.name(),
                operation = source.operation(),
                error = %source,
                "Upstream generation failed"
            );
            ResponderError::Upstream { category, source }
        })?;

        payload
            .check_not_empty()
            .map_err(|e| ResponderError::InvalidUpstreamPayload {
                category,
                reason: e.to_string(),
            })?;
        Ok(payload)
    }

    /// Folds user feedback into the entry's confidence and returns the new value.
    #[instrument(skip(self), fields(entry_id = %entry_id))]
    pub async fn submit_feedback(
        &self,
        entry_id: EntryId,
        helpful: bool,
        rating: Option<u8>,
    ) -> ResponderResult<f64> {
        let score = feedback_score(helpful, rating)?;

        let confidence = self
            .store
            .update_confidence(entry_id, score)
            .await
            .map_err(ResponderError::store("update_confidence", None))?
            .ok_or(ResponderError::NotFound { entry_id })?;

        info!(score, confidence, "Feedback applied");
        Ok(confidence)
    }

    pub async fn get_stats(&self) -> ResponderResult<ResponderStats> {
        let knowledge = self
            .store
            .stats()
            .await
            .map_err(ResponderError::store("stats", None))?;

        let api_calls_saved = knowledge.total_usage;
        let estimated_tokens_saved = api_calls_saved.saturating_mul(self.config.avg_tokens_per_call);
        let estimated_cost_saved =
            estimated_tokens_saved as f64 / 1000.0 * self.config.cost_per_1k_tokens;

        Ok(ResponderStats {
            knowledge,
            api_calls_saved,
            estimated_tokens_saved,
            estimated_cost_saved,
            session: self.counters.snapshot(),
        })
    }

    /// Runs cleanup with the configured policy. Never fails; problems are
    /// reported in the returned [`MaintenanceReport`].
    pub async fn perform_maintenance(&self) -> MaintenanceReport {
        self.perform_maintenance_with(self.config.maintenance).await
    }

    #[instrument(skip(self), fields(min_confidence = policy.min_confidence, days_unused = policy.days_unused))]
    pub async fn perform_maintenance_with(&self, policy: MaintenancePolicy) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match self
            .store
            .cleanup(policy.min_confidence, policy.days_unused)
            .await
        {
            Ok(deleted) => report.deleted_entries = deleted,
            Err(e) => {
                error!(error = %e, "Maintenance cleanup failed");
                report.cleanup_error = Some(e.to_string());
            }
        }

        match self.store.stats().await {
            Ok(stats) => {
                report.remaining_entries = stats.total_entries;
                report.average_confidence = stats.average_confidence;
            }
            Err(e) => {
                error!(error = %e, "Maintenance stats failed");
                report.stats_error = Some(e.to_string());
            }
        }

        info!(
            deleted = report.deleted_entries,
            remaining = report.remaining_entries,
            average_confidence = report.average_confidence,
            "Maintenance complete"
        );
        report
    }

    /// Lexical search over stored queries and topics.
    pub async fn search_knowledge(&self, text: &str, limit: usize) -> ResponderResult<Vec<EntrySummary>> {
        self.store
            .full_text_search(text, limit)
            .await
            .map_err(ResponderError::store("full_text_search", None))
    }

    pub async fn flush(&self) -> ResponderResult<()> {
        self.store
            .flush()
            .await
            .map_err(ResponderError::store("flush", None))
    }
}
