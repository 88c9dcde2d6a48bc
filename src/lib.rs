//! `FlyTicker` - paragliding launch flyability evaluation
//!
//! This library turns hourly forecasts for a catalog of launch sites into
//! flyability evaluations: weather enrichment, a deterministic safety
//! filter with hard limits, and a reasoning-service ranking with a bounded
//! clarification loop.

pub mod config;
pub mod enrichment;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod ranking;
pub mod safety;

// Re-export core types for public API
pub use config::FlyTickerConfig;
pub use enrichment::{EnrichedLocation, FlightWindow, WeatherEnrichmentService};
pub use error::FlyTickerError;
pub use models::{
    ConditionClass, EvaluationResult, ForecastSample, LocationCatalog, LocationProfile, WindSector,
};
pub use orchestrator::{EvaluationOrchestrator, ForecastSet, OrchestratorSettings};
pub use ranking::{LlmRankingService, OpenAiClient, ReasoningClient, RetryPolicy};
pub use safety::{SafetyFilterService, SafetyLimits, SafetyVerdict};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, FlyTickerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
