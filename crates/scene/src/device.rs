use chrono::{DateTime, Utc};
use foundation::{DeviceId, LatLng};
use serde::{Deserialize, Serialize};

/// Rating shown for a device nobody has rated yet.
pub const DEFAULT_RATING: f64 = 5.0;
pub const DEFAULT_RATING_COUNT: u32 = 1;
pub const MAX_RATING: f64 = 5.0;
pub const DEFAULT_MAX_VALIDATIONS: u32 = 5;
pub const DEFAULT_QR_REFRESH_SECONDS: u32 = 60;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Inactive => "inactive",
        }
    }
}

/// Canonical, validated record of one location-verification device.
///
/// Treated as an immutable snapshot for one render cycle. `location` is a
/// [`LatLng`], so a `DevicePoint` can always enter the spatial index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePoint {
    pub id: DeviceId,
    pub display_name: String,
    pub status: DeviceStatus,
    pub location: LatLng,
    /// Mean of submitted stars, in `[0, 5]`.
    pub average_rating: f64,
    pub rating_count: u32,
    pub description: String,
    pub address: String,
    pub owner_name: Option<String>,
    pub image: Option<String>,
    pub max_validations: u32,
    pub qr_refresh_seconds: u32,
    pub last_validation: Option<DateTime<Utc>>,
    /// Newest first.
    pub recent_validations: Vec<DateTime<Utc>>,
}

impl DevicePoint {
    pub fn new(id: impl Into<DeviceId>, display_name: impl Into<String>, location: LatLng) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            status: DeviceStatus::Active,
            location,
            average_rating: DEFAULT_RATING,
            rating_count: DEFAULT_RATING_COUNT,
            description: String::new(),
            address: String::new(),
            owner_name: None,
            image: None,
            max_validations: DEFAULT_MAX_VALIDATIONS,
            qr_refresh_seconds: DEFAULT_QR_REFRESH_SECONDS,
            last_validation: None,
            recent_validations: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_rating(mut self, average: f64, count: u32) -> Self {
        self.average_rating = clamp_rating(average);
        self.rating_count = count;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == DeviceStatus::Active
    }
}

/// Clamps a rating into `[0, 5]`; non-finite values fall back to the default.
pub fn clamp_rating(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, MAX_RATING)
    } else {
        DEFAULT_RATING
    }
}

/// The device snapshot for one render cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSet {
    devices: Vec<DevicePoint>,
}

impl DeviceSet {
    pub fn new(devices: Vec<DevicePoint>) -> Self {
        Self { devices }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn as_slice(&self) -> &[DevicePoint] {
        &self.devices
    }

    pub fn iter(&self) -> impl Iterator<Item = &DevicePoint> {
        self.devices.iter()
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DevicePoint> {
        self.devices.iter().find(|d| &d.id == id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.get(id).is_some()
    }
}

impl From<Vec<DevicePoint>> for DeviceSet {
    fn from(devices: Vec<DevicePoint>) -> Self {
        Self::new(devices)
    }
}
