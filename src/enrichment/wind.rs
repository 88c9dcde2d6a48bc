//! Wind direction interpretation against a launch's permitted sectors

use crate::models::WindSector;
use serde::{Deserialize, Serialize};

/// How an hour's wind direction relates to the permitted launch sectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindDirectionMatch {
    /// Wind direction normalized to 0-359 degrees
    pub direction_deg: f64,
    /// Wind direction as cardinal direction (N, NE, etc.)
    pub cardinal: String,
    /// Whether the direction lies within a sector or its tolerance
    pub matches: bool,
    /// Sector the direction was matched against (widest containing one, else the closest)
    pub sector: Option<WindSector>,
    /// Degrees outside the matched sector's range, 0 when inside
    pub offset_deg: f64,
}

impl WindDirectionMatch {
    /// Analyze a wind direction against site sectors
    #[must_use]
    pub fn analyze(direction_deg: f64, sectors: &[WindSector], default_tolerance_deg: f64) -> Self {
        let direction_deg = normalize_direction(direction_deg);
        let cardinal = wind_direction_to_cardinal(direction_deg).to_string();

        let mut best_match: Option<(WindSector, f64)> = None;
        let mut closest: Option<(WindSector, f64)> = None;

        for sector in sectors {
            let offset = offset_from_sector(direction_deg, sector);
            let tolerance = sector.tolerance_deg.unwrap_or(default_tolerance_deg);

            if offset <= tolerance {
                let wider = best_match.is_none_or(|(best, _)| sector.width() > best.width());
                if wider {
                    best_match = Some((*sector, offset));
                }
            }
            if closest.is_none_or(|(_, best_offset)| offset < best_offset) {
                closest = Some((*sector, offset));
            }
        }

        let matches = best_match.is_some();
        let (sector, offset_deg) = match best_match.or(closest) {
            Some((sector, offset)) => (Some(sector), offset),
            None => (None, 180.0),
        };

        Self {
            direction_deg,
            cardinal,
            matches,
            sector,
            offset_deg,
        }
    }
}

/// Normalize any direction to [0, 360), folding 360 onto 0
#[must_use]
pub fn normalize_direction(direction_deg: f64) -> f64 {
    let normalized = direction_deg.rem_euclid(360.0);
    if normalized >= 359.5 { 0.0 } else { normalized.round() }
}

/// Calculate angular difference between two directions (0-180°)
#[must_use]
pub fn angular_difference(a_deg: f64, b_deg: f64) -> f64 {
    let diff = (a_deg - b_deg).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

/// Check if an angle is within a directional range, handling 360-degree wraparound
#[must_use]
pub fn is_angle_in_range(angle: f64, start: f64, stop: f64) -> bool {
    let normalize = |a: f64| a.rem_euclid(360.0);
    let angle = normalize(angle);
    let start = normalize(start);
    let stop = normalize(stop);

    if start <= stop {
        angle >= start && angle <= stop
    } else {
        // Range wraps around 360/0 degrees
        angle >= start || angle <= stop
    }
}

fn offset_from_sector(direction_deg: f64, sector: &WindSector) -> f64 {
    if is_angle_in_range(direction_deg, sector.from_deg, sector.to_deg) {
        0.0
    } else {
        angular_difference(direction_deg, sector.from_deg)
            .min(angular_difference(direction_deg, sector.to_deg))
    }
}

/// Convert wind direction from degrees to cardinal direction
#[must_use]
pub fn wind_direction_to_cardinal(degrees: f64) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let index = ((degrees.rem_euclid(360.0) / 22.5).round() as usize) % POINTS.len();
    POINTS[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn site_sectors() -> Vec<WindSector> {
        vec![
            WindSector::new(337.5, 22.5), // North range wrapping 0
            WindSector::new(157.5, 202.5),
        ]
    }

    #[test]
    fn test_angular_difference() {
        assert_eq!(angular_difference(0.0, 0.0), 0.0);
        assert_eq!(angular_difference(0.0, 90.0), 90.0);
        assert_eq!(angular_difference(0.0, 180.0), 180.0);
        assert_eq!(angular_difference(0.0, 270.0), 90.0);
        assert_eq!(angular_difference(0.0, 350.0), 10.0);
        assert_eq!(angular_difference(10.0, 350.0), 20.0);
    }

    #[rstest]
    #[case(360.0, 0.0)]
    #[case(-90.0, 270.0)]
    #[case(725.0, 5.0)]
    #[case(359.7, 0.0)]
    #[case(181.2, 181.0)]
    fn test_normalize_direction(#[case] raw: f64, #[case] expected: f64) {
        assert_eq!(normalize_direction(raw), expected);
    }

    #[rstest]
    #[case(0.0, "N")]
    #[case(90.0, "E")]
    #[case(180.0, "S")]
    #[case(270.0, "W")]
    #[case(45.0, "NE")]
    #[case(350.0, "N")]
    fn test_cardinal(#[case] deg: f64, #[case] expected: &str) {
        assert_eq!(wind_direction_to_cardinal(deg), expected);
    }

    #[test]
    fn test_direction_inside_wrapping_sector() {
        let analysis = WindDirectionMatch::analyze(360.0, &site_sectors(), 22.5);
        assert!(analysis.matches);
        assert_eq!(analysis.direction_deg, 0.0);
        assert_eq!(analysis.offset_deg, 0.0);
        assert_eq!(analysis.sector, Some(WindSector::new(337.5, 22.5)));
    }

    #[test]
    fn test_direction_within_default_tolerance() {
        // 40° is 17.5° past the north sector edge
        let analysis = WindDirectionMatch::analyze(40.0, &site_sectors(), 22.5);
        assert!(analysis.matches);
        assert_eq!(analysis.offset_deg, 17.5);
    }

    #[test]
    fn test_sector_tolerance_overrides_default() {
        let sectors = vec![WindSector::new(337.5, 22.5).with_tolerance(5.0)];
        let analysis = WindDirectionMatch::analyze(40.0, &sectors, 22.5);
        assert!(!analysis.matches);
        assert_eq!(analysis.sector, Some(sectors[0]));
    }

    #[test]
    fn test_widest_containing_sector_is_reported() {
        let narrow = WindSector::new(240.0, 260.0);
        let wide = WindSector::new(200.0, 300.0);
        let analysis = WindDirectionMatch::analyze(250.0, &[narrow, wide], 0.0);
        assert!(analysis.matches);
        assert_eq!(analysis.sector, Some(wide));
    }

    #[test]
    fn test_tailwind_does_not_match() {
        let analysis = WindDirectionMatch::analyze(90.0, &site_sectors(), 22.5);
        assert!(!analysis.matches);
        assert!(analysis.offset_deg > 22.5);
    }

    #[test]
    fn test_site_without_sectors_never_matches() {
        let analysis = WindDirectionMatch::analyze(180.0, &[], 22.5);
        assert!(!analysis.matches);
        assert_eq!(analysis.sector, None);
    }
}
