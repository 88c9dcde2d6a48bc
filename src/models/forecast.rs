//! Hourly forecast sample as delivered by the weather collaborator

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of precipitation expected in an hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationType {
    #[default]
    None,
    Drizzle,
    Rain,
    Showers,
    Snow,
    Sleet,
    Hail,
    Thunderstorm,
}

impl fmt::Display for PrecipitationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PrecipitationType::None => "none",
            PrecipitationType::Drizzle => "drizzle",
            PrecipitationType::Rain => "rain",
            PrecipitationType::Showers => "showers",
            PrecipitationType::Snow => "snow",
            PrecipitationType::Sleet => "sleet",
            PrecipitationType::Hail => "hail",
            PrecipitationType::Thunderstorm => "thunderstorm",
        };
        f.write_str(text)
    }
}

/// Upper-air wind at one pressure level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureLevelWind {
    pub pressure_hpa: u16,
    /// Geopotential height in meters above sea level
    pub height_m: f64,
    pub wind_speed_kmh: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
}

/// One hour of forecast for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    /// Site-local wall-clock time of the forecast hour
    #[serde(with = "local_timestamp")]
    pub timestamp: NaiveDateTime,
    /// Temperature at 2 m in Celsius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    /// Sustained wind speed at 10 m in km/h
    pub wind_speed_kmh: f64,
    /// Wind direction in degrees (0/360 is North)
    pub wind_direction_deg: f64,
    /// Wind gust speed at 10 m in km/h
    pub wind_gust_kmh: f64,
    /// Convective available potential energy in J/kg
    #[serde(default)]
    pub cape_jkg: f64,
    #[serde(default)]
    pub cloud_cover_low_pct: u8,
    #[serde(default)]
    pub cloud_cover_mid_pct: u8,
    #[serde(default)]
    pub cloud_cover_high_pct: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_cover_total_pct: Option<u8>,
    /// Precipitation probability (0-100%)
    #[serde(default)]
    pub precipitation_probability_pct: u8,
    /// Precipitation amount in mm
    #[serde(default)]
    pub precipitation_mm: f64,
    #[serde(default)]
    pub precipitation_type: PrecipitationType,
    /// Cloud base in meters above sea level, `None` when cloud-free
    #[serde(default)]
    pub cloud_base_m: Option<f64>,
    /// Sunshine within the hour in seconds
    #[serde(default)]
    pub sunshine_duration_s: f64,
    /// Upper-air winds, empty when the weather source has none
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pressure_levels: Vec<PressureLevelWind>,
}

impl ForecastSample {
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    #[must_use]
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    /// Total cloud cover, falling back to the densest layer
    #[must_use]
    pub fn cloud_cover_pct(&self) -> u8 {
        self.cloud_cover_total_pct.unwrap_or_else(|| {
            self.cloud_cover_low_pct
                .max(self.cloud_cover_mid_pct)
                .max(self.cloud_cover_high_pct)
        })
    }

    /// Format timestamp the way prompts and reports show it
    #[must_use]
    pub fn format_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Serde helpers for site-local timestamps, with or without seconds
pub(crate) mod local_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

    pub fn serialize<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.format("%Y-%m-%dT%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid forecast timestamp '{raw}'"))
        })
    }

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let trimmed = raw.trim().trim_end_matches('Z');
        FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_deserializes_minimal_fields() {
        let json = r#"{
            "timestamp": "2026-05-02T11:00",
            "wind_speed_kmh": 12.5,
            "wind_direction_deg": 250,
            "wind_gust_kmh": 20
        }"#;
        let sample: ForecastSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.hour(), 11);
        assert_eq!(sample.precipitation_type, PrecipitationType::None);
        assert_eq!(sample.cloud_base_m, None);
        assert!(sample.pressure_levels.is_empty());
        assert_eq!(sample.format_timestamp(), "2026-05-02 11:00");
    }

    #[test]
    fn test_sample_with_pressure_levels() {
        let json = r#"{
            "timestamp": "2026-05-02T11:00",
            "wind_speed_kmh": 12, "wind_direction_deg": 250, "wind_gust_kmh": 18,
            "pressure_levels": [
                {"pressure_hpa": 850, "height_m": 1460, "wind_speed_kmh": 18.5, "wind_direction_deg": 260},
                {"pressure_hpa": 700, "height_m": 3010, "wind_speed_kmh": 31, "temperature_c": -2.5}
            ]
        }"#;
        let sample: ForecastSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.pressure_levels.len(), 2);
        assert_eq!(sample.pressure_levels[0].wind_direction_deg, Some(260.0));
        assert_eq!(sample.pressure_levels[1].temperature_c, Some(-2.5));
        assert_eq!(sample.pressure_levels[1].wind_direction_deg, None);
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(local_timestamp::parse("2026-05-02T11:00").is_some());
        assert!(local_timestamp::parse("2026-05-02T11:00:00").is_some());
        assert!(local_timestamp::parse("2026-05-02T11:00Z").is_some());
        assert!(local_timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn test_cloud_cover_fallback() {
        let json = r#"{
            "timestamp": "2026-05-02T11:00",
            "wind_speed_kmh": 0, "wind_direction_deg": 0, "wind_gust_kmh": 0,
            "cloud_cover_low_pct": 10, "cloud_cover_mid_pct": 70, "cloud_cover_high_pct": 30
        }"#;
        let mut sample: ForecastSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.cloud_cover_pct(), 70);
        sample.cloud_cover_total_pct = Some(85);
        assert_eq!(sample.cloud_cover_pct(), 85);
    }
}
