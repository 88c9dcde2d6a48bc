//! Weather enrichment
//!
//! Turns a raw hourly forecast for one launch into an [`EnrichedLocation`]:
//! samples restricted to the flight-hour window plus derived per-hour and
//! window-wide classifications (thermal strength, wind-direction match,
//! precipitation risk). Pure data transform, no clock reads, no I/O.

pub mod wind;

use crate::models::{ForecastSample, LocationProfile};
use crate::{FlyTickerError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

pub use wind::WindDirectionMatch;

/// Daily flight hours and the number of forecast days to consider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightWindow {
    /// First flight hour (inclusive, 0-23)
    pub start_hour: u32,
    /// Last flight hour (inclusive, 0-23)
    pub end_hour: u32,
    /// Consecutive days starting with the first forecast date
    pub horizon_days: u32,
}

impl Default for FlightWindow {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
            horizon_days: 2,
        }
    }
}

impl FlightWindow {
    pub fn validate(&self) -> Result<()> {
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(FlyTickerError::config(
                "Flight window hours must be between 0 and 23",
            ));
        }
        if self.start_hour > self.end_hour {
            return Err(FlyTickerError::config(format!(
                "Flight window start hour {} is after end hour {}",
                self.start_hour, self.end_hour
            )));
        }
        if self.horizon_days == 0 || self.horizon_days > 16 {
            return Err(FlyTickerError::config(
                "Forecast horizon must be between 1 and 16 days",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn contains_hour(&self, hour: u32) -> bool {
        (self.start_hour..=self.end_hour).contains(&hour)
    }
}

/// Thermal strength class derived from CAPE
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermalStrength {
    /// CAPE below 200 J/kg
    Weak,
    /// CAPE 200-500 J/kg
    Moderate,
    /// CAPE above 500 J/kg
    Strong,
}

impl ThermalStrength {
    #[must_use]
    pub fn from_cape(cape_jkg: f64) -> Self {
        match cape_jkg {
            c if c > 500.0 => ThermalStrength::Strong,
            c if c >= 200.0 => ThermalStrength::Moderate,
            _ => ThermalStrength::Weak,
        }
    }
}

impl fmt::Display for ThermalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThermalStrength::Weak => write!(f, "weak"),
            ThermalStrength::Moderate => write!(f, "moderate"),
            ThermalStrength::Strong => write!(f, "strong"),
        }
    }
}

/// Precipitation risk class from probability × amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationRisk {
    None,
    Low,
    Moderate,
    High,
}

impl PrecipitationRisk {
    /// Classify expected precipitation (probability fraction × mm)
    #[must_use]
    pub fn from_sample(sample: &ForecastSample) -> Self {
        let expected_mm =
            f64::from(sample.precipitation_probability_pct.min(100)) / 100.0 * sample.precipitation_mm.max(0.0);
        match expected_mm {
            e if e <= 0.0 => PrecipitationRisk::None,
            e if e < 0.2 => PrecipitationRisk::Low,
            e if e < 1.0 => PrecipitationRisk::Moderate,
            _ => PrecipitationRisk::High,
        }
    }
}

impl fmt::Display for PrecipitationRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrecipitationRisk::None => write!(f, "none"),
            PrecipitationRisk::Low => write!(f, "low"),
            PrecipitationRisk::Moderate => write!(f, "moderate"),
            PrecipitationRisk::High => write!(f, "high"),
        }
    }
}

/// Derived classifications for one flight hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyConditions {
    #[serde(with = "crate::models::forecast::local_timestamp")]
    pub timestamp: chrono::NaiveDateTime,
    pub thermal_strength: ThermalStrength,
    pub wind: WindDirectionMatch,
    pub precipitation_risk: PrecipitationRisk,
}

/// A launch profile with its flight-window forecast and derived metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedLocation {
    pub profile: LocationProfile,
    pub flight_window: FlightWindow,
    /// Flight-window samples, sorted by timestamp
    pub samples: Vec<ForecastSample>,
    /// Derived conditions, index-aligned with `samples`
    pub hourly: Vec<HourlyConditions>,
    /// Dates covered by the window samples
    pub dates: Vec<NaiveDate>,
    pub peak_cape_jkg: f64,
    /// Class of the strongest thermal hour
    pub thermal_strength: ThermalStrength,
    /// True when every flight hour's wind comes from a permitted sector
    pub wind_direction_match: bool,
    /// Worst hourly precipitation risk
    pub precipitation_risk: PrecipitationRisk,
}

impl EnrichedLocation {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// Number of hours whose wind direction matches a launch sector
    #[must_use]
    pub fn matching_hours(&self) -> usize {
        self.hourly.iter().filter(|h| h.wind.matches).count()
    }
}

/// Enrichment settings that are not part of the flight window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    /// Tolerance for sectors that do not specify their own
    pub default_sector_tolerance_deg: f64,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            default_sector_tolerance_deg: 22.5,
        }
    }
}

/// Builds [`EnrichedLocation`] records from raw forecasts
#[derive(Debug, Clone, Default)]
pub struct WeatherEnrichmentService {
    settings: EnrichmentSettings,
}

impl WeatherEnrichmentService {
    #[must_use]
    pub fn new(settings: EnrichmentSettings) -> Self {
        Self { settings }
    }

    /// Restrict samples to the flight window and derive metrics.
    ///
    /// # Errors
    /// Returns [`FlyTickerError::InsufficientData`] when no sample falls
    /// within the flight hours of the forecast horizon.
    #[instrument(name = "enrich", level = "debug", skip_all, fields(location = %profile.name, samples = samples.len()))]
    pub fn enrich(
        &self,
        profile: &LocationProfile,
        samples: &[ForecastSample],
        window: &FlightWindow,
    ) -> Result<EnrichedLocation> {
        let window_samples = filter_flight_window(samples, window);

        if window_samples.is_empty() {
            return Err(FlyTickerError::insufficient_data(
                &profile.name,
                format!(
                    "no forecast samples between {:02}:00 and {:02}:00 within {} day(s) ({} samples supplied)",
                    window.start_hour,
                    window.end_hour,
                    window.horizon_days,
                    samples.len()
                ),
            ));
        }

        let hourly: Vec<HourlyConditions> = window_samples
            .iter()
            .map(|sample| HourlyConditions {
                timestamp: sample.timestamp,
                thermal_strength: ThermalStrength::from_cape(sample.cape_jkg),
                wind: WindDirectionMatch::analyze(
                    sample.wind_direction_deg,
                    &profile.wind_sectors,
                    self.settings.default_sector_tolerance_deg,
                ),
                precipitation_risk: PrecipitationRisk::from_sample(sample),
            })
            .collect();

        let peak_cape_jkg = window_samples
            .iter()
            .map(|s| s.cape_jkg)
            .fold(0.0_f64, f64::max);
        let wind_direction_match = hourly.iter().all(|h| h.wind.matches);
        let precipitation_risk = hourly
            .iter()
            .map(|h| h.precipitation_risk)
            .max()
            .unwrap_or(PrecipitationRisk::None);

        let mut dates: Vec<NaiveDate> = window_samples.iter().map(ForecastSample::date).collect();
        dates.dedup();

        debug!(
            hours = window_samples.len(),
            days = dates.len(),
            peak_cape_jkg,
            wind_direction_match,
            "Enriched forecast"
        );

        Ok(EnrichedLocation {
            profile: profile.clone(),
            flight_window: *window,
            samples: window_samples,
            hourly,
            dates,
            peak_cape_jkg,
            thermal_strength: ThermalStrength::from_cape(peak_cape_jkg),
            wind_direction_match,
            precipitation_risk,
        })
    }
}

/// Sort, de-duplicate and keep the flight hours of the horizon days
fn filter_flight_window(samples: &[ForecastSample], window: &FlightWindow) -> Vec<ForecastSample> {
    let mut sorted: Vec<&ForecastSample> = samples.iter().collect();
    sorted.sort_by_key(|s| s.timestamp);
    sorted.dedup_by_key(|s| s.timestamp);

    let Some(first_date) = sorted.first().map(|s| s.date()) else {
        return Vec::new();
    };
    let last_date = first_date + Duration::days(i64::from(window.horizon_days) - 1);

    sorted
        .into_iter()
        .filter(|s| s.date() <= last_date && window.contains_hour(s.hour()))
        .cloned()
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the pipeline unit tests

    use super::*;
    use crate::models::{Coordinates, PrecipitationType, WindSector};
    use chrono::NaiveDateTime;

    pub(crate) fn launch_profile() -> LocationProfile {
        LocationProfile::new(
            "Uetliberg",
            Coordinates {
                latitude: 47.3497,
                longitude: 8.4914,
            },
            800.0,
        )
        .with_sectors(vec![WindSector::new(225.0, 315.0)])
        .with_remarks("Landing field small | Tree line at launch")
    }

    pub(crate) fn timestamp(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid test timestamp")
    }

    /// A flyable hour on 2026-05-02: light westerly, strong thermals, high base
    pub(crate) fn sample_at(hour: u32) -> ForecastSample {
        ForecastSample {
            timestamp: timestamp(2, hour),
            temperature_c: Some(18.0),
            wind_speed_kmh: 15.0,
            wind_direction_deg: 260.0,
            wind_gust_kmh: 20.0,
            cape_jkg: 650.0,
            cloud_cover_low_pct: 10,
            cloud_cover_mid_pct: 5,
            cloud_cover_high_pct: 0,
            cloud_cover_total_pct: None,
            precipitation_probability_pct: 10,
            precipitation_mm: 0.0,
            precipitation_type: PrecipitationType::None,
            cloud_base_m: Some(1200.0),
            sunshine_duration_s: 3600.0,
            pressure_levels: Vec::new(),
        }
    }

    pub(crate) fn day_of_samples() -> Vec<ForecastSample> {
        (0..24).map(sample_at).collect()
    }

    pub(crate) fn all_day_window() -> FlightWindow {
        FlightWindow {
            start_hour: 0,
            end_hour: 23,
            horizon_days: 1,
        }
    }

    pub(crate) fn enriched(samples: Vec<ForecastSample>) -> EnrichedLocation {
        WeatherEnrichmentService::default()
            .enrich(&launch_profile(), &samples, &all_day_window())
            .expect("test samples lie within the window")
    }
}
