//! Data models for the `FlyTicker` pipeline
//!
//! This module contains the core domain models organized by concern:
//! - Location: launch site profiles, wind sectors and the catalog
//! - Forecast: hourly forecast samples
//! - Evaluation: the final result handed to downstream collaborators

pub mod evaluation;
pub mod forecast;
pub mod location;

// Re-export all public types for convenient access
pub use evaluation::{
    ConditionClass, EvaluationDetails, EvaluationOrigin, EvaluationReport, EvaluationResult,
    HourlyEvaluation,
};
pub use forecast::{ForecastSample, PrecipitationType, PressureLevelWind};
pub use location::{Coordinates, LocationCatalog, LocationProfile, WindSector};
