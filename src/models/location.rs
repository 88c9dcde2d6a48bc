//! Launch site profile, permitted wind sectors and the location catalog

use crate::{FlyTickerError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Location coordinates
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Coordinates {
    /// Format location as coordinates string
    #[must_use]
    pub fn format(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// A permitted launch wind sector, clockwise from `from_deg` to `to_deg`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindSector {
    pub from_deg: f64,
    pub to_deg: f64,
    /// Extra degrees accepted on either side; falls back to the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance_deg: Option<f64>,
}

impl WindSector {
    #[must_use]
    pub fn new(from_deg: f64, to_deg: f64) -> Self {
        Self {
            from_deg: from_deg.rem_euclid(360.0),
            to_deg: to_deg.rem_euclid(360.0),
            tolerance_deg: None,
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance_deg: f64) -> Self {
        self.tolerance_deg = Some(tolerance_deg);
        self
    }

    /// Angular width of the sector (0 for a single direction)
    #[must_use]
    pub fn width(&self) -> f64 {
        (self.to_deg - self.from_deg).rem_euclid(360.0)
    }

    /// Parse compass text like "SW-W", "N" or "O, W" into sectors.
    ///
    /// A dash joins two directions into one clockwise range, commas and
    /// whitespace separate independent sectors.
    pub fn parse_compass(text: &str) -> Result<Vec<WindSector>> {
        let mut sectors = Vec::new();

        for part in text.split([',', ' ', '/']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let sector = match part.split_once('-') {
                Some((from, to)) => {
                    WindSector::new(compass_to_degrees(from)?, compass_to_degrees(to)?)
                }
                None => {
                    let deg = compass_to_degrees(part)?;
                    WindSector::new(deg, deg)
                }
            };
            sectors.push(sector);
        }

        if sectors.is_empty() {
            return Err(FlyTickerError::validation(format!(
                "No wind directions found in '{text}'"
            )));
        }
        Ok(sectors)
    }
}

impl fmt::Display for WindSector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width() == 0.0 {
            write!(f, "{:.0}°", self.from_deg)
        } else {
            write!(f, "{:.0}°-{:.0}°", self.from_deg, self.to_deg)
        }
    }
}

/// Convert a compass point (English, plus German "O" for Ost) to degrees
fn compass_to_degrees(point: &str) -> Result<f64> {
    let deg = match point.trim().to_uppercase().as_str() {
        "N" => 0.0,
        "NNE" | "NNO" => 22.5,
        "NE" | "NO" => 45.0,
        "ENE" | "ONO" => 67.5,
        "E" | "O" => 90.0,
        "ESE" | "OSO" => 112.5,
        "SE" | "SO" => 135.0,
        "SSE" | "SSO" => 157.5,
        "S" => 180.0,
        "SSW" => 202.5,
        "SW" => 225.0,
        "WSW" => 247.5,
        "W" => 270.0,
        "WNW" => 292.5,
        "NW" => 315.0,
        "NNW" => 337.5,
        other => {
            return Err(FlyTickerError::validation(format!(
                "Unknown compass direction '{other}'"
            )));
        }
    };
    Ok(deg)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SectorRepr {
    Range(WindSector),
    Compass(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SectorsRepr {
    Compass(String),
    Many(Vec<SectorRepr>),
}

fn deserialize_sectors<'de, D>(deserializer: D) -> std::result::Result<Vec<WindSector>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match SectorsRepr::deserialize(deserializer)? {
        SectorsRepr::Compass(text) => vec![SectorRepr::Compass(text)],
        SectorsRepr::Many(raw) => raw,
    };
    let mut sectors = Vec::new();
    for repr in raw {
        match repr {
            SectorRepr::Range(sector) => sectors.push(WindSector {
                from_deg: sector.from_deg.rem_euclid(360.0),
                to_deg: sector.to_deg.rem_euclid(360.0),
                tolerance_deg: sector.tolerance_deg,
            }),
            SectorRepr::Compass(text) => {
                sectors.extend(WindSector::parse_compass(&text).map_err(serde::de::Error::custom)?);
            }
        }
    }
    Ok(sectors)
}

/// Static launch site metadata from the location catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationProfile {
    pub name: String,
    pub coordinates: Coordinates,
    /// Launch elevation in meters above sea level
    pub elevation_m: f64,
    #[serde(default, deserialize_with = "deserialize_sectors")]
    pub wind_sectors: Vec<WindSector>,
    /// Flying area the launch belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_type: Option<String>,
    /// Free-form remarks, entries separated by `|`
    #[serde(default)]
    pub remarks: String,
}

impl LocationProfile {
    #[must_use]
    pub fn new(name: impl Into<String>, coordinates: Coordinates, elevation_m: f64) -> Self {
        Self {
            name: name.into(),
            coordinates,
            elevation_m,
            wind_sectors: Vec::new(),
            region: None,
            site_type: None,
            remarks: String::new(),
        }
    }

    #[must_use]
    pub fn with_sectors(mut self, sectors: Vec<WindSector>) -> Self {
        self.wind_sectors = sectors;
        self
    }

    #[must_use]
    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = remarks.into();
        self
    }

    /// Remarks split on `|`, trimmed, empty entries dropped
    #[must_use]
    pub fn remark_list(&self) -> Vec<&str> {
        self.remarks
            .split('|')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FlyTickerError::config("Location name cannot be empty"));
        }
        if !self.elevation_m.is_finite() {
            return Err(FlyTickerError::config(format!(
                "Launch elevation of '{}' must be a finite number",
                self.name
            )));
        }
        if !(-90.0..=90.0).contains(&self.coordinates.latitude)
            || !(-180.0..=180.0).contains(&self.coordinates.longitude)
        {
            return Err(FlyTickerError::config(format!(
                "Coordinates of '{}' are out of range: {}",
                self.name,
                self.coordinates.format()
            )));
        }
        for sector in &self.wind_sectors {
            if let Some(tolerance) = sector.tolerance_deg
                && !(0.0..=180.0).contains(&tolerance)
            {
                return Err(FlyTickerError::config(format!(
                    "Wind sector tolerance of '{}' must be between 0 and 180 degrees, got {tolerance}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Ordered collection of launch sites keyed by unique name
#[derive(Debug, Clone, Default)]
pub struct LocationCatalog {
    locations: Vec<LocationProfile>,
}

impl LocationCatalog {
    /// Build a catalog, rejecting duplicate names and malformed profiles
    pub fn new(locations: Vec<LocationProfile>) -> Result<Self> {
        let mut seen = HashSet::new();
        for location in &locations {
            location.validate()?;
            if !seen.insert(location.name.as_str()) {
                return Err(FlyTickerError::config(format!(
                    "Duplicate location name in catalog: '{}'",
                    location.name
                )));
            }
        }
        Ok(Self { locations })
    }

    /// Read a JSON list of profiles and build the catalog
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let locations: Vec<LocationProfile> = serde_json::from_str(&raw)?;
        Self::new(locations)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LocationProfile> {
        self.locations.iter().find(|l| l.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocationProfile> {
        self.locations.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
