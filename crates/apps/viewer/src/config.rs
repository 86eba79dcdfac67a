use std::env;
use std::time::Duration;

use compute::ProximityParams;
use foundation::LatLng;
use layers::{StyleCatalog, StyleId};
use scene::ClusterParams;
use serde::Deserialize;
use streaming::HttpConfig;

use crate::viewport::ViewportOptions;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidCenter(String),
    InvalidClusterRadius(f64),
    InvalidNearbyRadius(f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidCenter(e) => write!(f, "invalid initial center: {e}"),
            ConfigError::InvalidClusterRadius(r) => {
                write!(f, "cluster radius must be positive, got {r}")
            }
            ConfigError::InvalidNearbyRadius(r) => {
                write!(f, "nearby radius must be non-negative, got {r}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Viewer settings. Unset fields take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: f64,
    pub locate_zoom: f64,
    pub cluster_radius_px: f64,
    pub cluster_extent_px: f64,
    pub cluster_max_zoom: u8,
    pub cluster_min_points: usize,
    pub nearby_radius_km: f64,
    pub light_style: String,
    pub dark_style: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let cluster = ClusterParams::default();
        let styles = StyleCatalog::default();
        Self {
            api_base_url: HttpConfig::default().base_url,
            request_timeout_ms: 10_000,
            center_lat: 48.1887,
            center_lng: 16.3767,
            zoom: 13.0,
            locate_zoom: 15.0,
            cluster_radius_px: cluster.radius_px,
            cluster_extent_px: cluster.extent_px,
            cluster_max_zoom: cluster.max_zoom,
            cluster_min_points: cluster.min_points,
            nearby_radius_km: ProximityParams::default().radius_km,
            light_style: styles.light.to_string(),
            dark_style: styles.dark.to_string(),
        }
    }
}

impl ViewerConfig {
    /// Defaults overridden by `GEOPROOF_*` environment variables. Unparsable
    /// values fall back to the default.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_base_url: env::var("GEOPROOF_API_URL").unwrap_or(d.api_base_url),
            request_timeout_ms: env_var_u64("GEOPROOF_TIMEOUT_MS", d.request_timeout_ms),
            center_lat: env_var_f64("GEOPROOF_CENTER_LAT", d.center_lat),
            center_lng: env_var_f64("GEOPROOF_CENTER_LNG", d.center_lng),
            zoom: env_var_f64("GEOPROOF_ZOOM", d.zoom),
            locate_zoom: env_var_f64("GEOPROOF_LOCATE_ZOOM", d.locate_zoom),
            cluster_radius_px: env_var_f64("GEOPROOF_CLUSTER_RADIUS_PX", d.cluster_radius_px),
            cluster_extent_px: env_var_f64("GEOPROOF_CLUSTER_EXTENT_PX", d.cluster_extent_px),
            cluster_max_zoom: env_var_u8("GEOPROOF_CLUSTER_MAX_ZOOM", d.cluster_max_zoom),
            cluster_min_points: env_var_usize("GEOPROOF_CLUSTER_MIN_POINTS", d.cluster_min_points),
            nearby_radius_km: env_var_f64("GEOPROOF_NEARBY_KM", d.nearby_radius_km),
            light_style: env::var("GEOPROOF_LIGHT_STYLE").unwrap_or(d.light_style),
            dark_style: env::var("GEOPROOF_DARK_STYLE").unwrap_or(d.dark_style),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.center()?;
        if !(self.cluster_radius_px.is_finite() && self.cluster_radius_px > 0.0) {
            return Err(ConfigError::InvalidClusterRadius(self.cluster_radius_px));
        }
        if !(self.nearby_radius_km.is_finite() && self.nearby_radius_km >= 0.0) {
            return Err(ConfigError::InvalidNearbyRadius(self.nearby_radius_km));
        }
        Ok(())
    }

    pub fn center(&self) -> Result<LatLng, ConfigError> {
        LatLng::new(self.center_lat, self.center_lng)
            .map_err(|e| ConfigError::InvalidCenter(e.to_string()))
    }

    pub fn cluster_params(&self) -> ClusterParams {
        ClusterParams {
            radius_px: self.cluster_radius_px,
            extent_px: self.cluster_extent_px,
            max_zoom: self.cluster_max_zoom,
            min_points: self.cluster_min_points,
        }
    }

    pub fn proximity_params(&self) -> ProximityParams {
        ProximityParams {
            radius_km: self.nearby_radius_km,
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            base_url: self.api_base_url.clone(),
            timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn styles(&self) -> StyleCatalog {
        StyleCatalog {
            light: StyleId::new(self.light_style.clone()),
            dark: StyleId::new(self.dark_style.clone()),
        }
    }

    pub fn viewport_options(&self) -> ViewportOptions {
        ViewportOptions {
            cluster: self.cluster_params(),
            styles: self.styles(),
            ..ViewportOptions::default()
        }
    }
}

fn env_var_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_u8(key: &str, default: u8) -> u8 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ViewerConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_the_clustering_and_proximity_defaults() {
        let c = ViewerConfig::default();
        assert_eq!(c.cluster_params(), scene::ClusterParams::default());
        assert_eq!(c.proximity_params().radius_km, 1.0);
        assert_eq!(c.zoom, 13.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c: ViewerConfig =
            serde_json::from_str(r#"{"apiBaseUrl": "https://api.example.test", "zoom": 11}"#)
                .unwrap();
        assert_eq!(c.api_base_url, "https://api.example.test");
        assert_eq!(c.zoom, 11.0);
        assert_eq!(c.locate_zoom, 15.0);
        assert_eq!(c.http_config().timeout.as_millis(), 10_000);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let c = ViewerConfig {
            center_lat: 123.0,
            ..ViewerConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::InvalidCenter(_))));

        let c = ViewerConfig {
            cluster_radius_px: 0.0,
            ..ViewerConfig::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::InvalidClusterRadius(0.0)));
    }
}
