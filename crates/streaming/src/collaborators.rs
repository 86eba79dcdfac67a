//! Boundaries to the services the map engine depends on but does not own.
//!
//! Every call is asynchronous. Callers are expected to turn each error into a
//! user-facing notice at the call site.

use foundation::DeviceId;
use formats::FeedBatch;
use futures_util::future::BoxFuture;
use scene::UserLocation;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    Network(String),
    Timeout,
    Status(u16),
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Network(e) => write!(f, "device list request failed: {e}"),
            FetchError::Timeout => write!(f, "device list request timed out"),
            FetchError::Status(s) => write!(f, "device list request returned HTTP {s}"),
            FetchError::Decode(e) => write!(f, "device list could not be read: {e}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitError {
    Network(String),
    Timeout,
    Status(u16),
    /// The service rejected the credential.
    Unauthorized,
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Network(e) => write!(f, "rating request failed: {e}"),
            SubmitError::Timeout => write!(f, "rating request timed out"),
            SubmitError::Status(s) => write!(f, "rating request returned HTTP {s}"),
            SubmitError::Unauthorized => write!(f, "rating was rejected: please log in again"),
        }
    }
}

impl std::error::Error for SubmitError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeolocationError {
    PermissionDenied,
    Timeout,
    PositionUnavailable,
}

impl std::fmt::Display for GeolocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeolocationError::PermissionDenied => write!(f, "location permission denied"),
            GeolocationError::Timeout => write!(f, "location request timed out"),
            GeolocationError::PositionUnavailable => write!(f, "location unavailable"),
        }
    }
}

impl std::error::Error for GeolocationError {}

/// Bearer token issued by the authentication service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// `None` for an empty or whitespace-only token.
    pub fn bearer(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return None;
        }
        Some(Self(token))
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Read side of the device list.
pub trait DeviceSource: Send + Sync {
    fn fetch_devices(&self) -> BoxFuture<'_, Result<FeedBatch, FetchError>>;
}

/// Write side for ratings.
pub trait RatingSink: Send + Sync {
    fn submit<'a>(
        &'a self,
        device: &'a DeviceId,
        stars: u8,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<(), SubmitError>>;
}

/// One-shot position query.
pub trait GeolocationSource: Send + Sync {
    fn locate(&self) -> BoxFuture<'_, Result<UserLocation, GeolocationError>>;
}

/// Current credential of the signed-in user, if any.
pub trait CredentialProvider {
    fn credential(&self) -> Option<Credential>;
}

impl CredentialProvider for Option<Credential> {
    fn credential(&self) -> Option<Credential> {
        self.clone()
    }
}
