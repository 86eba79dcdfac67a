use std::time::Duration;

use foundation::DeviceId;
use formats::{FeedBatch, parse_feed};
use futures_util::future::BoxFuture;
use reqwest::{StatusCode, Url};

use crate::collaborators::{Credential, DeviceSource, FetchError, RatingSink, SubmitError};
use crate::protocol::{ApiError, DEVICES_PATH, RATE_SEGMENT, RatingRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpConfig {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Rating endpoint of `device`. The id is one percent-encoded path segment,
    /// so ids holding `/`, `?` or spaces cannot change the route.
    pub fn rate_url(&self, device: &DeviceId) -> Result<Url, String> {
        let mut url = Url::parse(&self.url(DEVICES_PATH)).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|()| format!("{} cannot be a base URL", self.base_url))?
            .push(device.as_str())
            .push(RATE_SEGMENT);
        Ok(url)
    }
}

/// Device API client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    async fn get_devices(&self) -> Result<FeedBatch, FetchError> {
        let url = self.config.url(DEVICES_PATH);
        tracing::debug!(%url, "fetching device list");
        let resp = self.http.get(&url).send().await.map_err(fetch_error)?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }
        let text = resp.text().await.map_err(fetch_error)?;
        parse_feed(&text).map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn post_rating(
        &self,
        device: &DeviceId,
        stars: u8,
        credential: &Credential,
    ) -> Result<(), SubmitError> {
        let url = self.config.rate_url(device).map_err(SubmitError::Network)?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(credential.token())
            .json(&RatingRequest { rating: stars })
            .send()
            .await
            .map_err(submit_error)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body: ApiError = resp.json().await.unwrap_or_default();
        tracing::warn!(
            device = %device,
            status = status.as_u16(),
            detail = body.text().unwrap_or(""),
            "rating rejected"
        );
        Err(submit_status(status))
    }
}

impl DeviceSource for HttpClient {
    fn fetch_devices(&self) -> BoxFuture<'_, Result<FeedBatch, FetchError>> {
        Box::pin(self.get_devices())
    }
}

impl RatingSink for HttpClient {
    fn submit<'a>(
        &'a self,
        device: &'a DeviceId,
        stars: u8,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<(), SubmitError>> {
        Box::pin(self.post_rating(device, stars, credential))
    }
}

fn fetch_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_decode() {
        FetchError::Decode(e.to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}

fn submit_error(e: reqwest::Error) -> SubmitError {
    if e.is_timeout() {
        SubmitError::Timeout
    } else {
        SubmitError::Network(e.to_string())
    }
}

fn submit_status(status: StatusCode) -> SubmitError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SubmitError::Unauthorized,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SubmitError::Timeout,
        s => SubmitError::Status(s.as_u16()),
    }
}
