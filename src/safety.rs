//! Deterministic hard-limit filter applied before any ranking.
//!
//! Every hour of the flight window is checked against every configured limit.
//! One violation anywhere rejects the whole evaluation; there is no averaging
//! and no partial credit. Cloud cover is deliberately not a limit here, it
//! only feeds the ranking stage.

use crate::enrichment::EnrichedLocation;
use crate::models::ForecastSample;
use crate::{FlyTickerError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument};

/// Operator-supplied hard limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyLimits {
    /// Maximum sustained wind in km/h
    pub max_wind_speed_kmh: f64,
    /// Maximum gust in km/h
    pub max_gust_kmh: f64,
    /// Maximum precipitation probability (0-100%)
    pub max_precipitation_probability_pct: f64,
    /// Minimum cloud base height above launch in meters
    pub min_cloud_base_clearance_m: f64,
    /// Maximum hourly precipitation in mm
    #[serde(default)]
    pub max_precipitation_mm: Option<f64>,
    /// Maximum CAPE in J/kg (overdevelopment risk)
    #[serde(default)]
    pub max_cape_jkg: Option<f64>,
    /// Maximum difference between gust and sustained wind in km/h
    #[serde(default)]
    pub max_gust_spread_kmh: Option<f64>,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_wind_speed_kmh: 35.0,
            max_gust_kmh: 30.0,
            max_precipitation_probability_pct: 40.0,
            min_cloud_base_clearance_m: 150.0,
            max_precipitation_mm: None,
            max_cape_jkg: None,
            max_gust_spread_kmh: None,
        }
    }
}

impl SafetyLimits {
    /// Reject limits that cannot be applied meaningfully
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("max_wind_speed_kmh", self.max_wind_speed_kmh),
            ("max_gust_kmh", self.max_gust_kmh),
            (
                "max_precipitation_probability_pct",
                self.max_precipitation_probability_pct,
            ),
            ("min_cloud_base_clearance_m", self.min_cloud_base_clearance_m),
        ];
        let optional = [
            ("max_precipitation_mm", self.max_precipitation_mm),
            ("max_cape_jkg", self.max_cape_jkg),
            ("max_gust_spread_kmh", self.max_gust_spread_kmh),
        ];

        let all = required
            .into_iter()
            .chain(optional.into_iter().filter_map(|(n, v)| v.map(|v| (n, v))));
        for (name, value) in all {
            if !value.is_finite() || value < 0.0 {
                return Err(FlyTickerError::config(format!(
                    "Safety limit '{name}' must be a non-negative number, got {value}"
                )));
            }
        }

        if self.max_precipitation_probability_pct > 100.0 {
            return Err(FlyTickerError::config(
                "Safety limit 'max_precipitation_probability_pct' cannot exceed 100",
            ));
        }
        Ok(())
    }
}

/// The hard limit a sample violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    WindSpeed,
    WindGust,
    GustSpread,
    PrecipitationProbability,
    PrecipitationAmount,
    CloudBaseClearance,
    Cape,
}

impl LimitKind {
    fn unit(self) -> &'static str {
        match self {
            LimitKind::WindSpeed | LimitKind::WindGust | LimitKind::GustSpread => "km/h",
            LimitKind::PrecipitationProbability => "%",
            LimitKind::PrecipitationAmount => "mm",
            LimitKind::CloudBaseClearance => "m",
            LimitKind::Cape => "J/kg",
        }
    }

    /// Whether the limit is a floor (observed must stay above) rather than a ceiling
    #[must_use]
    pub fn is_floor(self) -> bool {
        matches!(self, LimitKind::CloudBaseClearance)
    }

    #[must_use]
    pub fn is_wind(self) -> bool {
        matches!(
            self,
            LimitKind::WindSpeed | LimitKind::WindGust | LimitKind::GustSpread
        )
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LimitKind::WindSpeed => "wind speed",
            LimitKind::WindGust => "wind gusts",
            LimitKind::GustSpread => "gust spread",
            LimitKind::PrecipitationProbability => "precipitation probability",
            LimitKind::PrecipitationAmount => "precipitation amount",
            LimitKind::CloudBaseClearance => "cloud base above launch",
            LimitKind::Cape => "CAPE",
        };
        f.write_str(text)
    }
}

/// One violated limit in one hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub limit: LimitKind,
    #[serde(with = "crate::models::forecast::local_timestamp")]
    pub timestamp: NaiveDateTime,
    pub observed: f64,
    pub threshold: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.limit.unit();
        let relation = if self.limit.is_floor() { "<" } else { ">" };
        write!(
            f,
            "{} {:.1} {unit} {relation} {:.1} {unit} at {}",
            self.limit,
            self.observed,
            self.threshold,
            self.timestamp.format("%Y-%m-%d %H:%M")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyOutcome {
    Pass,
    Reject,
}

/// Outcome of the safety filter for one enriched location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub outcome: SafetyOutcome,
    /// Violations ordered by hour, then by limit
    pub violations: Vec<Violation>,
}

impl SafetyVerdict {
    fn from_violations(violations: Vec<Violation>) -> Self {
        let outcome = if violations.is_empty() {
            SafetyOutcome::Pass
        } else {
            SafetyOutcome::Reject
        };
        Self {
            outcome,
            violations,
        }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == SafetyOutcome::Pass
    }

    #[must_use]
    pub fn rejected(&self) -> bool {
        self.outcome == SafetyOutcome::Reject
    }

    /// Distinct limits that were violated, in first-seen order
    #[must_use]
    pub fn violated_limits(&self) -> Vec<LimitKind> {
        let mut limits = Vec::new();
        for v in &self.violations {
            if !limits.contains(&v.limit) {
                limits.push(v.limit);
            }
        }
        limits
    }
}

/// Applies [`SafetyLimits`] to enriched locations
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyFilterService;

impl SafetyFilterService {
    /// Check every hour of the flight window against every limit
    #[instrument(name = "safety_filter", level = "debug", skip_all, fields(location = %location.profile.name))]
    #[must_use]
    pub fn evaluate(location: &EnrichedLocation, limits: &SafetyLimits) -> SafetyVerdict {
        let launch_elevation = location.profile.elevation_m;
        let violations: Vec<Violation> = location
            .samples
            .iter()
            .flat_map(|sample| check_sample(sample, launch_elevation, limits))
            .collect();

        let verdict = SafetyVerdict::from_violations(violations);
        if verdict.rejected() {
            info!(
                location = %location.profile.name,
                violations = verdict.violations.len(),
                limits = ?verdict.violated_limits(),
                "Safety filter rejected location"
            );
        } else {
            debug!(hours = location.samples.len(), "Safety filter passed");
        }
        verdict
    }
}

fn check_sample(
    sample: &ForecastSample,
    launch_elevation_m: f64,
    limits: &SafetyLimits,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut ceiling = |limit: LimitKind, observed: f64, threshold: Option<f64>| {
        if let Some(threshold) = threshold {
            // Unreadable values count as violations
            if !observed.is_finite() || observed > threshold {
                violations.push(Violation {
                    limit,
                    timestamp: sample.timestamp,
                    observed,
                    threshold,
                });
            }
        }
    };

    ceiling(
        LimitKind::WindSpeed,
        sample.wind_speed_kmh,
        Some(limits.max_wind_speed_kmh),
    );
    ceiling(
        LimitKind::WindGust,
        sample.wind_gust_kmh,
        Some(limits.max_gust_kmh),
    );
    ceiling(
        LimitKind::GustSpread,
        sample.wind_gust_kmh - sample.wind_speed_kmh,
        limits.max_gust_spread_kmh,
    );
    ceiling(
        LimitKind::PrecipitationProbability,
        f64::from(sample.precipitation_probability_pct),
        Some(limits.max_precipitation_probability_pct),
    );
    ceiling(
        LimitKind::PrecipitationAmount,
        sample.precipitation_mm,
        limits.max_precipitation_mm,
    );
    ceiling(LimitKind::Cape, sample.cape_jkg, limits.max_cape_jkg);

    // Cloud-free hours have no base and cannot violate the floor
    if let Some(cloud_base) = sample.cloud_base_m {
        let clearance = cloud_base - launch_elevation_m;
        if !clearance.is_finite() || clearance < limits.min_cloud_base_clearance_m {
            violations.push(Violation {
                limit: LimitKind::CloudBaseClearance,
                timestamp: sample.timestamp,
                observed: clearance,
                threshold: limits.min_cloud_base_clearance_m,
            });
        }
    }

    violations
}
