//! Final evaluation record handed to downstream collaborators

use crate::safety::SafetyVerdict;
use crate::{FlyTickerError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest rating/confidence band
pub const LOWEST_BAND: u8 = 1;
/// Highest rating/confidence band
pub const HIGHEST_BAND: u8 = 10;

/// Qualitative condition class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionClass {
    Excellent,
    Good,
    Moderate,
    Poor,
    Dangerous,
}

impl FromStr for ConditionClass {
    type Err = FlyTickerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "EXCELLENT" => Ok(ConditionClass::Excellent),
            "GOOD" => Ok(ConditionClass::Good),
            "MODERATE" => Ok(ConditionClass::Moderate),
            "POOR" => Ok(ConditionClass::Poor),
            "DANGEROUS" => Ok(ConditionClass::Dangerous),
            other => Err(FlyTickerError::validation(format!(
                "unrecognized condition class '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ConditionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionClass::Excellent => write!(f, "EXCELLENT"),
            ConditionClass::Good => write!(f, "GOOD"),
            ConditionClass::Moderate => write!(f, "MODERATE"),
            ConditionClass::Poor => write!(f, "POOR"),
            ConditionClass::Dangerous => write!(f, "DANGEROUS"),
        }
    }
}

/// Wind, thermal and risk sub-reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationDetails {
    pub wind: String,
    #[serde(alias = "thermik")]
    pub thermal: String,
    pub risks: String,
}

impl EvaluationDetails {
    pub const NOT_AVAILABLE: &'static str = "Not available";

    fn not_available() -> Self {
        Self {
            wind: Self::NOT_AVAILABLE.to_string(),
            thermal: Self::NOT_AVAILABLE.to_string(),
            risks: Self::NOT_AVAILABLE.to_string(),
        }
    }
}

/// Per-hour assessment returned by the reasoning service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyEvaluation {
    pub hour: u8,
    pub timestamp: String,
    pub conditions: ConditionClass,
    pub flyable: bool,
    pub rating: u8,
    pub reason: String,
}

/// Which pipeline branch produced a result; the schema is the same for all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOrigin {
    Ranked,
    SafetyRejected,
    Fallback,
    InsufficientData,
}

/// Final flyability evaluation for one location and run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub location: String,
    pub dates: Vec<NaiveDate>,
    pub flyable: bool,
    /// Rating 1-10
    pub rating: u8,
    /// Confidence 1-10
    pub confidence: u8,
    pub conditions: ConditionClass,
    pub summary: String,
    pub details: EvaluationDetails,
    pub recommendation: String,
    #[serde(default)]
    pub hourly_evaluations: Vec<HourlyEvaluation>,
    /// Verdict that gated the result, absent only when no forecast reached the filter
    pub safety_verdict: Option<SafetyVerdict>,
    pub origin: EvaluationOrigin,
    /// Reasoning-service rounds spent on this result
    pub clarification_rounds: u32,
    pub generated_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Result synthesized straight from a rejecting safety verdict
    #[must_use]
    pub fn safety_rejection(location: &str, dates: Vec<NaiveDate>, verdict: SafetyVerdict) -> Self {
        let listed: Vec<String> = verdict.violations.iter().map(ToString::to_string).collect();
        let wind: Vec<String> = verdict
            .violations
            .iter()
            .filter(|v| v.limit.is_wind())
            .map(ToString::to_string)
            .collect();
        let limits: Vec<String> = verdict
            .violated_limits()
            .iter()
            .map(ToString::to_string)
            .collect();

        Self {
            location: location.to_string(),
            dates,
            flyable: false,
            rating: LOWEST_BAND,
            confidence: HIGHEST_BAND,
            conditions: ConditionClass::Dangerous,
            summary: format!(
                "Not flyable: hard safety limits exceeded ({}).",
                limits.join(", ")
            ),
            details: EvaluationDetails {
                wind: if wind.is_empty() {
                    "Within limits".to_string()
                } else {
                    wind.join("; ")
                },
                thermal: "Not evaluated, safety limits exceeded".to_string(),
                risks: listed.join("; "),
            },
            recommendation: "Do not fly. Conditions exceed the configured safety limits."
                .to_string(),
            hourly_evaluations: Vec::new(),
            safety_verdict: Some(verdict),
            origin: EvaluationOrigin::SafetyRejected,
            clarification_rounds: 0,
            generated_at: Utc::now(),
        }
    }

    /// Conservative result for a ranking that could not be completed
    #[must_use]
    pub fn fallback(
        location: &str,
        dates: Vec<NaiveDate>,
        verdict: Option<SafetyVerdict>,
        reason: &str,
        clarification_rounds: u32,
    ) -> Self {
        Self {
            location: location.to_string(),
            dates,
            flyable: false,
            rating: LOWEST_BAND,
            confidence: LOWEST_BAND,
            conditions: ConditionClass::Dangerous,
            summary: format!(
                "Evaluation could not be completed safely: {reason}. Treat as not flyable."
            ),
            details: EvaluationDetails {
                risks: format!("Automated assessment unavailable ({reason})"),
                ..EvaluationDetails::not_available()
            },
            recommendation: "Check conditions yourself before flying or try again later."
                .to_string(),
            hourly_evaluations: Vec::new(),
            safety_verdict: verdict,
            origin: EvaluationOrigin::Fallback,
            clarification_rounds,
            generated_at: Utc::now(),
        }
    }

    /// Degraded result for a location without usable forecast hours
    #[must_use]
    pub fn insufficient_data(location: &str, message: &str) -> Self {
        Self {
            location: location.to_string(),
            dates: Vec::new(),
            flyable: false,
            rating: LOWEST_BAND,
            confidence: LOWEST_BAND,
            conditions: ConditionClass::Poor,
            summary: format!("Not evaluated: {message}."),
            details: EvaluationDetails::not_available(),
            recommendation: "No forecast for the flight hours. Not flyable by default."
                .to_string(),
            hourly_evaluations: Vec::new(),
            safety_verdict: None,
            origin: EvaluationOrigin::InsufficientData,
            clarification_rounds: 0,
            generated_at: Utc::now(),
        }
    }

    /// Force `flyable = false` (overall and per hour) unless the verdict passed
    #[must_use]
    pub fn with_safety_veto(mut self) -> Self {
        let passed = self.safety_verdict.as_ref().is_some_and(SafetyVerdict::passed);
        if !passed {
            self.flyable = false;
            for hour in &mut self.hourly_evaluations {
                hour.flyable = false;
            }
        }
        self
    }
}

/// Evaluations of one run as written by the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub last_updated: DateTime<Utc>,
    pub evaluations: Vec<EvaluationResult>,
}

impl EvaluationReport {
    #[must_use]
    pub fn new(evaluations: Vec<EvaluationResult>) -> Self {
        Self {
            last_updated: Utc::now(),
            evaluations,
        }
    }

    pub fn flyable(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.evaluations.iter().filter(|e| e.flyable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("EXCELLENT", ConditionClass::Excellent)]
    #[case("good", ConditionClass::Good)]
    #[case(" Moderate ", ConditionClass::Moderate)]
    #[case("poor", ConditionClass::Poor)]
    #[case("DANGEROUS", ConditionClass::Dangerous)]
    fn test_condition_class_parsing(#[case] raw: &str, #[case] expected: ConditionClass) {
        assert_eq!(raw.parse::<ConditionClass>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_condition_class() {
        assert!("UNKNOWN".parse::<ConditionClass>().is_err());
    }

    #[test]
    fn test_fallback_is_conservative() {
        let result = EvaluationResult::fallback("Uetliberg", Vec::new(), None, "timeout", 3);
        assert!(!result.flyable);
        assert_eq!(result.confidence, LOWEST_BAND);
        assert_eq!(result.rating, LOWEST_BAND);
        assert_eq!(result.origin, EvaluationOrigin::Fallback);
        assert!(result.summary.contains("timeout"));
        assert_eq!(result.clarification_rounds, 3);
    }

    #[test]
    fn test_veto_without_verdict_clears_flyable() {
        let mut result = EvaluationResult::fallback("X", Vec::new(), None, "test", 0);
        result.flyable = true;
        result.hourly_evaluations.push(HourlyEvaluation {
            hour: 12,
            timestamp: "2026-05-02 12:00".to_string(),
            conditions: ConditionClass::Good,
            flyable: true,
            rating: 7,
            reason: "thermals".to_string(),
        });
        let vetoed = result.with_safety_veto();
        assert!(!vetoed.flyable);
        assert!(!vetoed.hourly_evaluations[0].flyable);
    }

    #[test]
    fn test_serialized_schema_uses_uppercase_conditions() {
        let result = EvaluationResult::insufficient_data("Balderen", "no samples");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["conditions"], "POOR");
        assert_eq!(json["origin"], "insufficient_data");
        assert_eq!(json["flyable"], false);
    }
}
