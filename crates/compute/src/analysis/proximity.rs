//! "Devices near me" statistics.

use foundation::distance_km;
use scene::{DevicePoint, UserLocation};
use serde::Serialize;

use super::statistics::Mean;

/// A derived value that may be unavailable for two distinct reasons.
///
/// `Unknown` means an input is missing (no user location), `NotApplicable`
/// means the inputs are there but nothing qualifies. Neither is ever
/// reported as zero.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Reading<T> {
    Unknown,
    NotApplicable,
    Known(T),
}

impl<T> Reading<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Reading::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Reading::Unknown)
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Reading<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reading::Unknown => write!(f, "unknown"),
            Reading::NotApplicable => write!(f, "n/a"),
            Reading::Known(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityParams {
    /// Devices at most this far from the user count as nearby.
    pub radius_km: f64,
}

impl Default for ProximityParams {
    fn default() -> Self {
        Self { radius_km: 1.0 }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityStats {
    pub nearby_active_count: Reading<usize>,
    pub nearby_average_rating: Reading<f64>,
}

impl ProximityStats {
    pub const UNKNOWN: ProximityStats = ProximityStats {
        nearby_active_count: Reading::Unknown,
        nearby_average_rating: Reading::Unknown,
    };
}

/// Counts active devices within `params.radius_km` of the user and averages
/// their ratings. Inactive devices never contribute.
pub fn present(
    devices: &[DevicePoint],
    user: Option<&UserLocation>,
    params: &ProximityParams,
) -> ProximityStats {
    let Some(user) = user else {
        return ProximityStats::UNKNOWN;
    };

    let ratings: Mean = devices
        .iter()
        .filter(|d| d.is_active() && distance_km(user.at, d.location) <= params.radius_km)
        .map(|d| d.average_rating)
        .collect();

    ProximityStats {
        nearby_active_count: Reading::Known(ratings.count()),
        nearby_average_rating: ratings
            .value()
            .map_or(Reading::NotApplicable, Reading::Known),
    }
}
