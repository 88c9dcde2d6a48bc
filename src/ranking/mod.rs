//! Reasoning-service ranking of locations that passed the safety filter
//!
//! The ranking never fails: transport errors, exhausted retries and an
//! exhausted clarification budget all collapse into the conservative
//! fallback result.

pub mod client;
pub mod prompt;
pub mod protocol;
pub mod retry;

pub use client::{ChatMessage, ClientError, OpenAiClient, ReasoningClient, ReasoningRequest, Role};
pub use prompt::{PromptTemplates, PromptValues};
pub use protocol::{ClarificationExchange, ExchangeState, ParsedEvaluation, ResponseIssue, Step};
pub use retry::RetryPolicy;

use crate::enrichment::EnrichedLocation;
use crate::models::{EvaluationOrigin, EvaluationResult};
use crate::safety::SafetyVerdict;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{info, instrument, warn};

/// Immutable parameters of the ranking stage
#[derive(Debug, Clone, PartialEq)]
pub struct RankingOptions {
    pub model: String,
    pub temperature: f32,
    /// Requests per location, the initial one included
    pub max_rounds: u32,
    pub retry: RetryPolicy,
    pub templates: PromptTemplates,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_rounds: 3,
            retry: RetryPolicy::default(),
            templates: PromptTemplates::default(),
        }
    }
}

/// Ranks enriched locations through a [`ReasoningClient`]
#[derive(Clone)]
pub struct LlmRankingService {
    client: Arc<dyn ReasoningClient>,
    options: RankingOptions,
}

impl LlmRankingService {
    pub fn new(client: Arc<dyn ReasoningClient>, options: RankingOptions) -> Self {
        Self { client, options }
    }

    #[must_use]
    pub fn options(&self) -> &RankingOptions {
        &self.options
    }

    /// Rank a location whose safety verdict passed
    pub async fn rank(&self, location: &EnrichedLocation, verdict: &SafetyVerdict) -> EvaluationResult {
        self.rank_with_progress(location, verdict, &AtomicU32::new(0))
            .await
    }

    /// Like [`Self::rank`], publishing the number of answered rounds to
    /// `rounds` so a caller that abandons the future still knows them
    #[instrument(name = "rank", skip_all, fields(location = %location.name()))]
    pub async fn rank_with_progress(
        &self,
        location: &EnrichedLocation,
        verdict: &SafetyVerdict,
        rounds: &AtomicU32,
    ) -> EvaluationResult {
        debug_assert!(verdict.passed(), "ranking requires a passing verdict");
        if !verdict.passed() {
            return EvaluationResult::safety_rejection(
                location.name(),
                location.dates.clone(),
                verdict.clone(),
            );
        }

        let templates = &self.options.templates;
        let mut values = PromptValues::for_location(location);
        let mut exchange = ClarificationExchange::new(
            templates.render_system(&values),
            templates.render_initial(&values),
            self.options.max_rounds,
        );

        loop {
            let request = ReasoningRequest {
                model: self.options.model.clone(),
                temperature: self.options.temperature,
                messages: exchange.messages().to_vec(),
            };

            let client = &self.client;
            let request = &request;
            let content = match self
                .options
                .retry
                .run("reasoning request", move |_| client.complete(request))
                .await
            {
                Ok(content) => content,
                Err(err) => {
                    warn!("Reasoning service unavailable for {}: {}", location.name(), err);
                    return EvaluationResult::fallback(
                        location.name(),
                        location.dates.clone(),
                        Some(verdict.clone()),
                        &format!("reasoning service unavailable ({err})"),
                        exchange.rounds(),
                    );
                }
            };

            let step = exchange.receive(&content);
            rounds.store(exchange.rounds(), Ordering::Relaxed);
            match step {
                Step::Valid(parsed) => {
                    info!(
                        "Ranked {}: {} (rating {}, {} rounds)",
                        location.name(),
                        parsed.conditions,
                        parsed.rating,
                        exchange.rounds()
                    );
                    return ranked_result(location, verdict, parsed, exchange.rounds());
                }
                Step::Clarify { issue, round } => {
                    info!(
                        "Requesting clarification for {} (round {}/{}): {}",
                        location.name(),
                        round,
                        exchange.max_rounds(),
                        issue
                    );
                    values
                        .set("problem", issue.to_string())
                        .set("round", round.to_string())
                        .set("max_rounds", exchange.max_rounds().to_string());
                    exchange.ask(templates.render_clarification(&values));
                }
                Step::Exhausted { issue } => {
                    warn!(
                        "No valid answer for {} after {} rounds: {}",
                        location.name(),
                        exchange.rounds(),
                        issue
                    );
                    return EvaluationResult::fallback(
                        location.name(),
                        location.dates.clone(),
                        Some(verdict.clone()),
                        &format!("no valid answer after {} rounds ({issue})", exchange.rounds()),
                        exchange.rounds(),
                    );
                }
            }
        }
    }
}

fn ranked_result(
    location: &EnrichedLocation,
    verdict: &SafetyVerdict,
    parsed: ParsedEvaluation,
    rounds: u32,
) -> EvaluationResult {
    EvaluationResult {
        location: location.name().to_string(),
        dates: location.dates.clone(),
        flyable: parsed.flyable,
        rating: parsed.rating,
        confidence: parsed.confidence,
        conditions: parsed.conditions,
        summary: parsed.summary,
        details: parsed.details,
        recommendation: parsed.recommendation,
        hourly_evaluations: parsed.hourly_evaluations,
        safety_verdict: Some(verdict.clone()),
        origin: EvaluationOrigin::Ranked,
        clarification_rounds: rounds,
        generated_at: Utc::now(),
    }
}
