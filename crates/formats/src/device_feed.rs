//! Normalization of device-list payloads into [`DevicePoint`] records.
//!
//! Payloads come from an external service and are trusted only after passing
//! through [`ingest`]. A record that cannot be placed on the map is discarded
//! with a [`DiscardReason`]; ingestion itself never fails.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use foundation::{CoordinateError, DeviceId, LatLng};
use scene::{
    DEFAULT_MAX_VALIDATIONS, DEFAULT_QR_REFRESH_SECONDS, DEFAULT_RATING, DEFAULT_RATING_COUNT,
    DevicePoint, DeviceStatus, clamp_rating,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DiscardReason {
    NotAnObject,
    MissingId,
    MissingLocation,
    MalformedLocation,
    InvalidCoordinates { detail: String },
    DuplicateId,
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscardReason::NotAnObject => write!(f, "record is not an object"),
            DiscardReason::MissingId => write!(f, "record has no id"),
            DiscardReason::MissingLocation => write!(f, "record has no location"),
            DiscardReason::MalformedLocation => {
                write!(f, "location is not a numeric coordinate pair")
            }
            DiscardReason::InvalidCoordinates { detail } => write!(f, "{detail}"),
            DiscardReason::DuplicateId => write!(f, "id already seen in this batch"),
        }
    }
}

impl std::error::Error for DiscardReason {}

impl From<CoordinateError> for DiscardReason {
    fn from(e: CoordinateError) -> Self {
        DiscardReason::InvalidCoordinates {
            detail: e.to_string(),
        }
    }
}

/// A dropped record and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discard {
    /// Position of the record in the input array.
    pub index: usize,
    pub id: Option<String>,
    #[serde(flatten)]
    pub reason: DiscardReason,
}

/// Outcome of normalizing one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    Valid(DevicePoint),
    Discarded {
        id: Option<String>,
        reason: DiscardReason,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedBatch {
    pub devices: Vec<DevicePoint>,
    pub discards: Vec<Discard>,
}

impl FeedBatch {
    pub fn discard_count(&self) -> usize {
        self.discards.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedError {
    Json(String),
    NotAList,
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Json(e) => write!(f, "device feed is not valid JSON: {e}"),
            FeedError::NotAList => write!(f, "device feed is not a list of records"),
        }
    }
}

impl std::error::Error for FeedError {}

/// Shape of a device record as the backend sends it. Every field is optional
/// and loosely typed; [`ingest_record`] decides what is usable.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawDevice {
    id: Option<Value>,
    #[serde(rename = "_id")]
    object_id: Option<Value>,
    display_name: Option<Value>,
    name: Option<Value>,
    status: Option<Value>,
    location: Option<Value>,
    latitude: Option<Value>,
    longitude: Option<Value>,
    average_rating: Option<Value>,
    rating_count: Option<Value>,
    description: Option<Value>,
    address: Option<Value>,
    owner_name: Option<Value>,
    owner: Option<Value>,
    image: Option<Value>,
    max_validations: Option<Value>,
    qr_refresh_time: Option<Value>,
    last_validation: Option<Value>,
    recent_validations: Option<Value>,
}

/// Parses a feed document: either a bare array or `{"devices": [...]}`.
pub fn parse_feed(text: &str) -> Result<FeedBatch, FeedError> {
    let doc: Value = serde_json::from_str(text).map_err(|e| FeedError::Json(e.to_string()))?;
    let records = match doc {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("devices") {
            Some(Value::Array(items)) => items,
            _ => return Err(FeedError::NotAList),
        },
        _ => return Err(FeedError::NotAList),
    };
    Ok(ingest(&records))
}

/// Normalizes a batch of raw records. The first record with a given id wins.
pub fn ingest(records: &[Value]) -> FeedBatch {
    let mut batch = FeedBatch::default();
    let mut seen: BTreeSet<DeviceId> = BTreeSet::new();

    for (index, record) in records.iter().enumerate() {
        let (id, reason) = match ingest_record(record) {
            Ingested::Valid(device) if seen.insert(device.id.clone()) => {
                batch.devices.push(device);
                continue;
            }
            Ingested::Valid(device) => (Some(device.id.to_string()), DiscardReason::DuplicateId),
            Ingested::Discarded { id, reason } => (id, reason),
        };
        tracing::warn!(index, id = ?id, %reason, "discarding device record");
        batch.discards.push(Discard { index, id, reason });
    }

    tracing::debug!(
        valid = batch.devices.len(),
        discarded = batch.discards.len(),
        "ingested device feed"
    );
    batch
}

pub fn ingest_record(record: &Value) -> Ingested {
    if !record.is_object() {
        return Ingested::Discarded {
            id: None,
            reason: DiscardReason::NotAnObject,
        };
    }
    let raw: RawDevice = match serde_json::from_value(record.clone()) {
        Ok(raw) => raw,
        Err(_) => {
            return Ingested::Discarded {
                id: None,
                reason: DiscardReason::NotAnObject,
            };
        }
    };

    let Some(id) = raw.id.as_ref().or(raw.object_id.as_ref()).and_then(id_text) else {
        return Ingested::Discarded {
            id: None,
            reason: DiscardReason::MissingId,
        };
    };

    let location = match location_of(&raw) {
        Ok(at) => at,
        Err(reason) => {
            return Ingested::Discarded {
                id: Some(id),
                reason,
            };
        }
    };

    let display_name = raw
        .display_name
        .as_ref()
        .or(raw.name.as_ref())
        .and_then(text)
        .unwrap_or_else(|| id.clone());

    let mut device = DevicePoint::new(id, display_name, location);
    device.status = match raw.status.as_ref().and_then(text) {
        Some(s) if s.eq_ignore_ascii_case("active") => DeviceStatus::Active,
        _ => DeviceStatus::Inactive,
    };
    device.average_rating = raw
        .average_rating
        .as_ref()
        .and_then(number)
        .map(clamp_rating)
        .unwrap_or(DEFAULT_RATING);
    device.rating_count = raw
        .rating_count
        .as_ref()
        .and_then(count)
        .unwrap_or(DEFAULT_RATING_COUNT);
    device.description = raw.description.as_ref().and_then(text).unwrap_or_default();
    device.address = raw.address.as_ref().and_then(text).unwrap_or_default();
    device.owner_name = raw.owner_name.as_ref().or(raw.owner.as_ref()).and_then(text);
    device.image = raw.image.as_ref().and_then(text);
    device.max_validations = raw
        .max_validations
        .as_ref()
        .and_then(count)
        .unwrap_or(DEFAULT_MAX_VALIDATIONS);
    device.qr_refresh_seconds = raw
        .qr_refresh_time
        .as_ref()
        .and_then(count)
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_QR_REFRESH_SECONDS);
    device.last_validation = raw.last_validation.as_ref().and_then(timestamp);
    device.recent_validations = raw
        .recent_validations
        .as_ref()
        .map(validation_times)
        .unwrap_or_default();

    Ingested::Valid(device)
}

fn location_of(raw: &RawDevice) -> Result<LatLng, DiscardReason> {
    match &raw.location {
        Some(Value::Null) => Err(DiscardReason::MissingLocation),
        Some(v) => parse_location(v, true),
        None => match (&raw.latitude, &raw.longitude) {
            (None, None) => Err(DiscardReason::MissingLocation),
            (Some(lat), Some(lng)) => pair(lat, lng),
            _ => Err(DiscardReason::MalformedLocation),
        },
    }
}

/// Accepts `[lat, lng]`, `{lat, lng}`, `{lat, lon}`, `{latitude, longitude}`,
/// or a string holding JSON of one of those (one level only).
fn parse_location(v: &Value, allow_string: bool) -> Result<LatLng, DiscardReason> {
    match v {
        Value::Array(items) => match items.as_slice() {
            [lat, lng] => pair(lat, lng),
            _ => Err(DiscardReason::MalformedLocation),
        },
        Value::Object(map) => {
            let lat = field(map, &["lat", "latitude"]);
            let lng = field(map, &["lng", "lon", "longitude"]);
            match (lat, lng) {
                (Some(lat), Some(lng)) => pair(lat, lng),
                _ => Err(DiscardReason::MalformedLocation),
            }
        }
        Value::String(s) if allow_string => match serde_json::from_str::<Value>(s) {
            Ok(inner) => parse_location(&inner, false),
            Err(_) => Err(DiscardReason::MalformedLocation),
        },
        _ => Err(DiscardReason::MalformedLocation),
    }
}

fn field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k))
}

// Coordinates must be JSON numbers; numeric strings are not accepted here.
fn pair(lat: &Value, lng: &Value) -> Result<LatLng, DiscardReason> {
    match (lat.as_f64(), lng.as_f64()) {
        (Some(lat), Some(lng)) => Ok(LatLng::new(lat, lng)?),
        _ => Err(DiscardReason::MalformedLocation),
    }
}

fn id_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn count(v: &Value) -> Option<u32> {
    let n = number(v)?;
    if n < 0.0 {
        return Some(0);
    }
    Some(n.round().min(u32::MAX as f64) as u32)
}

fn timestamp(v: &Value) -> Option<DateTime<Utc>> {
    let s = match v {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("timestamp")?.as_str()?,
        _ => return None,
    };
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Recent validations arrive as an array, or as a string holding a JSON array.
/// Unparsable entries are dropped; the result is newest first.
fn validation_times(v: &Value) -> Vec<DateTime<Utc>> {
    let decoded;
    let items = match v {
        Value::Array(items) => items,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => {
                decoded = items;
                &decoded
            }
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    let mut times: Vec<DateTime<Utc>> = items.iter().filter_map(timestamp).collect();
    times.sort_by(|a, b| b.cmp(a));
    times
}
