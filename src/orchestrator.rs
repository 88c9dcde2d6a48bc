//! Evaluation pipeline: enrich, filter, rank, veto
//!
//! Every location yields exactly one [`EvaluationResult`]. Failures stay
//! local to their location and never abort a batch.

use crate::config::FlyTickerConfig;
use crate::enrichment::{FlightWindow, WeatherEnrichmentService};
use crate::models::{EvaluationResult, ForecastSample, LocationCatalog, LocationProfile};
use crate::ranking::{LlmRankingService, ReasoningClient};
use crate::safety::{SafetyFilterService, SafetyLimits};
use crate::Result;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Hourly forecasts keyed by location name
pub type ForecastSet = HashMap<String, Vec<ForecastSample>>;

/// Read a forecast document `{ "<location>": [samples...] }`
pub fn load_forecasts(path: &Path) -> Result<ForecastSet> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Deadline for ranking one location
    pub evaluation_timeout: Duration,
    pub max_concurrency: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            evaluation_timeout: Duration::from_secs(120),
            max_concurrency: 4,
        }
    }
}

/// Drives locations through the pipeline
#[derive(Clone)]
pub struct EvaluationOrchestrator {
    enrichment: WeatherEnrichmentService,
    ranking: LlmRankingService,
    settings: OrchestratorSettings,
}

impl EvaluationOrchestrator {
    pub fn new(
        enrichment: WeatherEnrichmentService,
        ranking: LlmRankingService,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            enrichment,
            ranking,
            settings,
        }
    }

    /// Wire the pipeline from configuration around a reasoning client
    pub fn from_config(config: &FlyTickerConfig, client: Arc<dyn ReasoningClient>) -> Self {
        Self::new(
            WeatherEnrichmentService::new(config.enrichment),
            LlmRankingService::new(client, config.ranking_options()),
            OrchestratorSettings {
                evaluation_timeout: config.ranking.evaluation_timeout(),
                max_concurrency: config.ranking.max_concurrency,
            },
        )
    }

    /// Evaluate one location
    #[instrument(name = "evaluate_location", skip_all, fields(location = %profile.name))]
    pub async fn evaluate_location(
        &self,
        profile: &LocationProfile,
        samples: &[ForecastSample],
        limits: &SafetyLimits,
        window: &FlightWindow,
    ) -> EvaluationResult {
        let enriched = match self.enrichment.enrich(profile, samples, window) {
            Ok(enriched) => enriched,
            Err(err) => {
                warn!("Skipping ranking for {}: {}", profile.name, err);
                return EvaluationResult::insufficient_data(&profile.name, &err.to_string());
            }
        };

        let verdict = SafetyFilterService::evaluate(&enriched, limits);
        if verdict.rejected() {
            return EvaluationResult::safety_rejection(&profile.name, enriched.dates.clone(), verdict);
        }

        let deadline = self.settings.evaluation_timeout;
        let rounds = AtomicU32::new(0);
        let ranking = self.ranking.rank_with_progress(&enriched, &verdict, &rounds);
        let result = match tokio::time::timeout(deadline, ranking).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Ranking for {} exceeded {:.1}s, using fallback",
                    profile.name,
                    deadline.as_secs_f64()
                );
                EvaluationResult::fallback(
                    &profile.name,
                    enriched.dates.clone(),
                    Some(verdict),
                    &format!("evaluation timed out after {:.1}s", deadline.as_secs_f64()),
                    rounds.load(Ordering::Relaxed),
                )
            }
        };

        result.with_safety_veto()
    }

    /// Evaluate every catalog location, results in catalog order
    #[instrument(name = "evaluate_batch", skip_all, fields(locations = catalog.len()))]
    pub async fn evaluate_batch(
        &self,
        catalog: &LocationCatalog,
        forecasts: &ForecastSet,
        limits: &SafetyLimits,
        window: &FlightWindow,
    ) -> Vec<EvaluationResult> {
        let started = Instant::now();

        for name in forecasts.keys() {
            if catalog.get(name).is_none() {
                warn!("Ignoring forecast for unknown location '{}'", name);
            }
        }

        let results: Vec<EvaluationResult> = stream::iter(catalog.iter().map(|profile| {
            let samples: &[ForecastSample] = match forecasts.get(&profile.name) {
                Some(samples) => samples.as_slice(),
                None => {
                    warn!("No forecast for {}", profile.name);
                    &[]
                }
            };
            self.evaluate_location(profile, samples, limits, window)
        }))
        .buffered(self.settings.max_concurrency.max(1))
        .collect()
        .await;

        let flyable = results.iter().filter(|r| r.flyable).count();
        info!(
            "Evaluated {} locations in {:.3}s ({} flyable)",
            results.len(),
            started.elapsed().as_secs_f64(),
            flyable
        );
        results
    }
}
