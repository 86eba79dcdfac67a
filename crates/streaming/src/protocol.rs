//! Wire types and paths of the device REST API.

use serde::{Deserialize, Serialize};

pub const DEVICES_PATH: &str = "/api/devices";

/// Last path segment of the rating endpoint, after the device id:
/// `{DEVICES_PATH}/{id}/rate`.
pub const RATE_SEGMENT: &str = "rate";

/// Body of a rating submission.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRequest {
    pub rating: u8,
}

/// Error body returned by the API; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiError {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ApiError {
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}
