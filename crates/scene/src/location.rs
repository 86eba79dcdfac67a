use chrono::{DateTime, Utc};
use foundation::LatLng;
use serde::Serialize;

/// A position fix for the current user.
///
/// Only ever produced from a successful geolocation query; the absence of a
/// fix is modelled as `Option<UserLocation>` and never as a default position.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocation {
    pub at: LatLng,
    /// Reported accuracy radius in meters, when the host provides one.
    pub accuracy_m: Option<f64>,
    pub fixed_at: DateTime<Utc>,
}

impl UserLocation {
    pub fn new(at: LatLng, fixed_at: DateTime<Utc>) -> Self {
        Self {
            at,
            accuracy_m: None,
            fixed_at,
        }
    }
}

