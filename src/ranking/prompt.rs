//! Prompt templates and their `{placeholder}` rendering

use crate::enrichment::EnrichedLocation;
use crate::models::ForecastSample;
use crate::{FlyTickerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Placeholders available to every template
pub const LOCATION_PLACEHOLDERS: [&str; 15] = [
    "name",
    "region",
    "site_type",
    "elevation_m",
    "wind_sectors",
    "remarks",
    "dates",
    "flight_hours_start",
    "flight_hours_end",
    "total_hours",
    "hourly_data",
    "altitude_wind_profile",
    "thermal_strength",
    "wind_direction_match",
    "precipitation_risk",
];

/// Placeholders only the clarification template may use
pub const CLARIFICATION_PLACEHOLDERS: [&str; 3] = ["problem", "round", "max_rounds"];

/// Hours of upper-air data included in the prompt
const ALTITUDE_PROFILE_HOURS: usize = 6;

const DEFAULT_SYSTEM: &str = "You are an experienced paragliding instructor assessing launch \
conditions from weather forecasts. Be conservative: when in doubt, a site is not flyable. \
Answer with a single JSON object and nothing else.";

const DEFAULT_INITIAL: &str = r#"Assess the paragliding launch {name} ({site_type}, {region}) at {elevation_m} m.
Permitted wind sectors: {wind_sectors}
Site remarks: {remarks}

Forecast for {dates}, flight hours {flight_hours_start}:00-{flight_hours_end}:00 ({total_hours} hours):
{hourly_data}

Upper-air wind profile (first hours), check for wind shear and inversions:
{altitude_wind_profile}

Derived indicators: thermal strength {thermal_strength}, wind direction {wind_direction_match}, precipitation risk {precipitation_risk}.
All hard safety limits were checked and passed.

Respond with JSON:
{"flyable": true|false, "rating": 1-10, "confidence": 1-10, "conditions": "EXCELLENT|GOOD|MODERATE|POOR|DANGEROUS",
 "summary": "...", "details": {"wind": "...", "thermal": "...", "risks": "..."}, "recommendation": "...",
 "hourly_evaluations": [{"hour": 9, "timestamp": "YYYY-MM-DD HH:MM", "conditions": "GOOD", "flyable": true, "rating": 7, "reason": "..."}]}
If the data is not sufficient for a decision, respond with {"needs_clarification": true, "question": "..."}."#;

const DEFAULT_CLARIFICATION: &str = "Your previous answer for {name} could not be used: {problem}. \
This is round {round} of {max_rounds}. Reply again with exactly one JSON object following the \
requested schema, using the forecast already provided.";

/// System, initial and clarification templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    pub system: String,
    pub initial: String,
    pub clarification: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM.to_string(),
            initial: DEFAULT_INITIAL.to_string(),
            clarification: DEFAULT_CLARIFICATION.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Reject empty templates and unknown placeholders
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the template and placeholder
    pub fn validate(&self) -> Result<()> {
        check_template("system", &self.system, &[])?;
        check_template("initial", &self.initial, &[])?;
        check_template("clarification", &self.clarification, &CLARIFICATION_PLACEHOLDERS)
    }

    #[must_use]
    pub fn render_system(&self, values: &PromptValues) -> String {
        render(&self.system, values)
    }

    #[must_use]
    pub fn render_initial(&self, values: &PromptValues) -> String {
        render(&self.initial, values)
    }

    #[must_use]
    pub fn render_clarification(&self, values: &PromptValues) -> String {
        render(&self.clarification, values)
    }
}

fn check_template(label: &str, template: &str, extra: &[&str]) -> Result<()> {
    if template.trim().is_empty() {
        return Err(FlyTickerError::config(format!(
            "prompts.{label} must not be empty"
        )));
    }
    for placeholder in placeholders(template) {
        if !LOCATION_PLACEHOLDERS.contains(&placeholder) && !extra.contains(&placeholder) {
            return Err(FlyTickerError::config(format!(
                "prompts.{label} uses unknown placeholder '{{{placeholder}}}'"
            )));
        }
    }
    Ok(())
}

/// Placeholder names in order of appearance
///
/// Only `{identifier}` spans count; braces around anything else (JSON
/// examples in a template, for instance) are literal text.
#[must_use]
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_identifier(&after[..close]) => {
                found.push(&after[..close]);
                rest = &after[close + 1..];
            }
            _ => rest = after,
        }
    }
    found
}

fn is_identifier(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Values substituted into templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptValues {
    values: BTreeMap<&'static str, String>,
}

impl PromptValues {
    /// Values describing an enriched location
    #[must_use]
    pub fn for_location(location: &EnrichedLocation) -> Self {
        let profile = &location.profile;
        let sectors = if profile.wind_sectors.is_empty() {
            "none".to_string()
        } else {
            profile
                .wind_sectors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let remarks = profile.remark_list();
        let dates: Vec<String> = location.dates.iter().map(ToString::to_string).collect();
        let matching = location.matching_hours();

        let mut values = Self::default();
        values
            .set("name", &profile.name)
            .set("region", profile.region.as_deref().unwrap_or("unknown region"))
            .set("site_type", profile.site_type.as_deref().unwrap_or("launch"))
            .set("elevation_m", format!("{:.0}", profile.elevation_m))
            .set("wind_sectors", sectors)
            .set(
                "remarks",
                if remarks.is_empty() {
                    "none".to_string()
                } else {
                    remarks.join("; ")
                },
            )
            .set("dates", dates.join(", "))
            .set("flight_hours_start", format!("{:02}", location.flight_window.start_hour))
            .set("flight_hours_end", format!("{:02}", location.flight_window.end_hour))
            .set("total_hours", location.samples.len().to_string())
            .set("hourly_data", format_hourly_data(location))
            .set("altitude_wind_profile", format_altitude_wind_profile(location))
            .set("thermal_strength", location.thermal_strength.to_string())
            .set(
                "wind_direction_match",
                format!(
                    "{} ({} of {} hours inside the permitted sectors)",
                    if location.wind_direction_match {
                        "matches"
                    } else {
                        "does not match"
                    },
                    matching,
                    location.samples.len()
                ),
            )
            .set("precipitation_risk", location.precipitation_risk.to_string());
        values
    }

    pub fn set(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        self.values.insert(key, value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Substitute known placeholders, leaving anything else untouched
#[must_use]
pub fn render(template: &str, values: &PromptValues) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_identifier(&after[..close]) => match values.get(&after[..close]) {
                Some(value) => {
                    output.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    output.push('{');
                    rest = after;
                }
            },
            _ => {
                output.push('{');
                rest = after;
            }
        }
    }
    output.push_str(rest);
    output
}

/// One line per flight hour with every field the ranking needs
#[must_use]
pub fn format_hourly_data(location: &EnrichedLocation) -> String {
    let mut out = String::new();
    for (sample, hour) in location.samples.iter().zip(&location.hourly) {
        let _ = writeln!(
            out,
            "{}: {} | Wind {:.0} km/h from {:.0}° {} ({}, gusts {:.0} km/h) | {} | Cloud cover {}% (low {}%, mid {}%, high {}%) | CAPE {:.0} J/kg ({}) | Precipitation {}% {:.1} mm {} (risk {}) | Sun {}",
            sample.format_timestamp(),
            format_temperature(sample),
            sample.wind_speed_kmh,
            hour.wind.direction_deg,
            hour.wind.cardinal,
            if hour.wind.matches { "in sector" } else { "outside sectors" },
            sample.wind_gust_kmh,
            format_cloud_base(sample, location.profile.elevation_m),
            sample.cloud_cover_pct(),
            sample.cloud_cover_low_pct,
            sample.cloud_cover_mid_pct,
            sample.cloud_cover_high_pct,
            sample.cape_jkg,
            hour.thermal_strength,
            sample.precipitation_probability_pct,
            sample.precipitation_mm,
            sample.precipitation_type,
            hour.precipitation_risk,
            format_sunshine(sample.sunshine_duration_s),
        );
    }
    out.trim_end().to_string()
}

/// Pressure-level winds for the first hours that carry any, lowest level first
#[must_use]
pub fn format_altitude_wind_profile(location: &EnrichedLocation) -> String {
    let mut out = String::new();
    let hours = location
        .samples
        .iter()
        .filter(|sample| !sample.pressure_levels.is_empty())
        .take(ALTITUDE_PROFILE_HOURS);

    for sample in hours {
        let mut levels: Vec<_> = sample
            .pressure_levels
            .iter()
            .filter(|level| level.height_m.is_finite() && level.wind_speed_kmh.is_finite())
            .collect();
        if levels.is_empty() {
            continue;
        }
        levels.sort_by(|a, b| a.height_m.total_cmp(&b.height_m));

        let _ = writeln!(out, "{}:", sample.format_timestamp());
        for level in levels {
            let _ = write!(
                out,
                "  {:.0} m MSL ({} hPa): Wind {:.1} km/h",
                level.height_m, level.pressure_hpa, level.wind_speed_kmh
            );
            if let Some(direction) = level.wind_direction_deg {
                let _ = write!(out, " from {direction:.0}°");
            }
            if let Some(temperature) = level.temperature_c {
                let _ = write!(out, ", Temp {temperature:.1}°C");
            }
            out.push('\n');
        }
    }

    if out.is_empty() {
        "no upper-air data available".to_string()
    } else {
        out.trim_end().to_string()
    }
}

fn format_temperature(sample: &ForecastSample) -> String {
    sample
        .temperature_c
        .map_or_else(|| "Temp n/a".to_string(), |t| format!("Temp {t:.1}°C"))
}

fn format_cloud_base(sample: &ForecastSample, elevation_m: f64) -> String {
    match sample.cloud_base_m {
        Some(base) => format!("Cloud base {:.0} m ({:+.0} m above launch)", base, base - elevation_m),
        None => "Cloud base clear".to_string(),
    }
}

fn format_sunshine(seconds: f64) -> String {
    if seconds > 0.0 {
        format!("{:.1}h", seconds / 3600.0)
    } else {
        "none".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::test_support::{day_of_samples, enriched};
    use crate::models::PressureLevelWind;

    #[test]
    fn test_placeholders_skip_json_braces() {
        let template = r#"Site {name}: reply {"flyable": true} within {total_hours}h {not valid}"#;
        assert_eq!(placeholders(template), vec!["name", "total_hours"]);
    }

    #[test]
    fn test_render_substitutes_known_values() {
        let mut values = PromptValues::default();
        values.set("name", "Uetliberg").set("total_hours", "9");
        let rendered = render(r#"{name} {"a": 1} {total_hours} {missing}"#, &values);
        assert_eq!(rendered, r#"Uetliberg {"a": 1} 9 {missing}"#);
    }

    #[test]
    fn test_default_templates_are_valid() {
        assert!(PromptTemplates::default().validate().is_ok());
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        let templates = PromptTemplates {
            initial: "Assess {name} using {windrichtung}".to_string(),
            ..PromptTemplates::default()
        };
        let err = templates.validate().unwrap_err();
        assert!(err.to_string().contains("windrichtung"));
    }

    #[test]
    fn test_clarification_only_placeholders() {
        let templates = PromptTemplates {
            initial: "Round {round}".to_string(),
            ..PromptTemplates::default()
        };
        assert!(templates.validate().is_err());
    }

    #[test]
    fn test_empty_template_is_rejected() {
        let templates = PromptTemplates {
            system: "  ".to_string(),
            ..PromptTemplates::default()
        };
        assert!(templates.validate().is_err());
    }

    #[test]
    fn test_location_values_and_initial_prompt() {
        let location = enriched(day_of_samples());
        let values = PromptValues::for_location(&location);
        assert_eq!(values.get("name"), Some("Uetliberg"));
        assert_eq!(values.get("total_hours"), Some("24"));
        assert_eq!(values.get("thermal_strength"), Some("strong"));

        let prompt = PromptTemplates::default().render_initial(&values);
        assert!(prompt.contains("Uetliberg"));
        assert!(prompt.contains("2026-05-02 11:00"));
        assert!(!prompt.contains("{hourly_data}"));
        assert!(prompt.contains(r#""flyable": true|false"#));
    }

    fn level(pressure_hpa: u16, height_m: f64, wind_speed_kmh: f64) -> PressureLevelWind {
        PressureLevelWind {
            pressure_hpa,
            height_m,
            wind_speed_kmh,
            wind_direction_deg: Some(250.0),
            temperature_c: Some(4.5),
        }
    }

    #[test]
    fn test_altitude_wind_profile_lists_levels_lowest_first() {
        let mut samples = day_of_samples();
        samples[10].pressure_levels = vec![level(700, 3010.0, 32.0), level(850, 1460.0, 18.0)];
        samples[10].pressure_levels[1].temperature_c = None;
        let location = enriched(samples);

        let profile = format_altitude_wind_profile(&location);
        let lines: Vec<&str> = profile.lines().collect();
        assert_eq!(
            lines,
            vec![
                "2026-05-02 10:00:",
                "  1460 m MSL (850 hPa): Wind 18.0 km/h from 250°",
                "  3010 m MSL (700 hPa): Wind 32.0 km/h from 250°, Temp 4.5°C",
            ]
        );

        let prompt = PromptTemplates::default().render_initial(&PromptValues::for_location(&location));
        assert!(prompt.contains("3010 m MSL (700 hPa)"));
        assert!(!prompt.contains("{altitude_wind_profile}"));
    }

    #[test]
    fn test_altitude_wind_profile_is_limited_to_first_hours() {
        let mut samples = day_of_samples();
        for sample in &mut samples {
            sample.pressure_levels = vec![level(850, 1460.0, 18.0)];
        }
        let location = enriched(samples);

        let profile = format_altitude_wind_profile(&location);
        assert_eq!(profile.lines().filter(|l| l.ends_with(':')).count(), 6);
    }

    #[test]
    fn test_altitude_wind_profile_without_data() {
        let location = enriched(day_of_samples());
        assert_eq!(
            format_altitude_wind_profile(&location),
            "no upper-air data available"
        );
    }

    #[test]
    fn test_hourly_data_has_one_line_per_hour() {
        let location = enriched(day_of_samples());
        let data = format_hourly_data(&location);
        assert_eq!(data.lines().count(), location.samples.len());
        assert!(data.contains("Temp 18.0°C"));
        assert!(data.contains("in sector"));
    }
}
