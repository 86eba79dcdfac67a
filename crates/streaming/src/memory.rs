//! In-process collaborators backed by fixed data.

use formats::FeedBatch;
use futures_util::future::BoxFuture;
use scene::UserLocation;

use crate::collaborators::{DeviceSource, FetchError, GeolocationError, GeolocationSource};

/// Serves the same device batch on every fetch.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceSource {
    batch: FeedBatch,
}

impl StaticDeviceSource {
    pub fn new(batch: FeedBatch) -> Self {
        Self { batch }
    }
}

impl DeviceSource for StaticDeviceSource {
    fn fetch_devices(&self) -> BoxFuture<'_, Result<FeedBatch, FetchError>> {
        let batch = self.batch.clone();
        Box::pin(async move { Ok(batch) })
    }
}

/// Answers every position query with the same result.
#[derive(Debug, Clone)]
pub struct FixedGeolocation {
    answer: Result<UserLocation, GeolocationError>,
}

impl FixedGeolocation {
    pub fn at(location: UserLocation) -> Self {
        Self {
            answer: Ok(location),
        }
    }

    pub fn failing(error: GeolocationError) -> Self {
        Self { answer: Err(error) }
    }
}

impl GeolocationSource for FixedGeolocation {
    fn locate(&self) -> BoxFuture<'_, Result<UserLocation, GeolocationError>> {
        let answer = self.answer;
        Box::pin(async move { answer })
    }
}
