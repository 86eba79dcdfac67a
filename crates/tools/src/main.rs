use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use compute::{ProximityStats, present};
use formats::{Discard, FeedBatch, parse_feed};
use foundation::LatLng;
use layers::ClusterSource;
use scene::{ClusterIndex, ClusterNode, Clusterer, UserLocation};
use serde::Serialize;
use streaming::{DeviceSource, HttpClient};
use tracing::info;
use tracing_subscriber::EnvFilter;
use viewer::ViewerConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect device feeds: clustering and proximity")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cluster a device feed at a zoom level
    Cluster {
        /// Map zoom level
        #[arg(long)]
        zoom: f64,

        /// User position as LAT,LNG; adds proximity stats to the output
        #[arg(long, value_parser = parse_lat_lng)]
        user: Option<LatLng>,

        /// Print the nodes as a GeoJSON FeatureCollection
        #[arg(long)]
        geojson: bool,

        /// Fetch devices from this API base URL instead of a file
        #[arg(long, conflicts_with = "file")]
        api: Option<String>,

        /// Device feed JSON file
        #[arg(required_unless_present = "api")]
        file: Option<PathBuf>,
    },

    /// Nearby device statistics for a user position
    Stats {
        /// User position as LAT,LNG
        #[arg(long, value_parser = parse_lat_lng)]
        user: LatLng,

        /// Device feed JSON file
        file: PathBuf,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterReport<'a> {
    zoom: f64,
    device_count: usize,
    discards: &'a [Discard],
    nodes: &'a [ClusterNode],
    #[serde(skip_serializing_if = "Option::is_none")]
    proximity: Option<ProximityStats>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsReport<'a> {
    user: LatLng,
    device_count: usize,
    discards: &'a [Discard],
    proximity: ProximityStats,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    let config = ViewerConfig::from_env();
    config.validate().map_err(|e| e.to_string())?;

    match args.command {
        Command::Cluster {
            zoom,
            user,
            geojson,
            api,
            file,
        } => {
            let batch = match (api, file) {
                (Some(base_url), _) => fetch_batch(&config, base_url).await?,
                (None, Some(path)) => read_batch(&path)?,
                (None, None) => return Err("either FILE or --api is required".to_string()),
            };
            cmd_cluster(&config, &batch, zoom, user, geojson)
        }
        Command::Stats { user, file } => {
            let batch = read_batch(&file)?;
            cmd_stats(&config, &batch, user)
        }
    }
}

fn cmd_cluster(
    config: &ViewerConfig,
    batch: &FeedBatch,
    zoom: f64,
    user: Option<LatLng>,
    geojson: bool,
) -> Result<(), String> {
    if !zoom.is_finite() || zoom < 0.0 {
        return Err(format!("zoom must be a non-negative number, got {zoom}"));
    }
    let params = config.cluster_params();
    let mut index = ClusterIndex::new(params);
    let nodes = index.build(&batch.devices, zoom);
    info!(
        zoom,
        devices = batch.devices.len(),
        nodes = nodes.len(),
        "clustered feed"
    );

    if geojson {
        let doc = ClusterSource::from_nodes(&nodes, params).to_geojson();
        return print_json(&doc);
    }

    let user = user.map(|at| UserLocation::new(at, Utc::now()));
    let report = ClusterReport {
        zoom,
        device_count: batch.devices.len(),
        discards: &batch.discards,
        nodes: &nodes,
        proximity: user
            .as_ref()
            .map(|u| present(&batch.devices, Some(u), &config.proximity_params())),
    };
    print_json(&report)
}

fn cmd_stats(config: &ViewerConfig, batch: &FeedBatch, user: LatLng) -> Result<(), String> {
    let location = UserLocation::new(user, Utc::now());
    let report = StatsReport {
        user,
        device_count: batch.devices.len(),
        discards: &batch.discards,
        proximity: present(&batch.devices, Some(&location), &config.proximity_params()),
    };
    print_json(&report)
}

fn read_batch(path: &PathBuf) -> Result<FeedBatch, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))?;
    parse_feed(&text).map_err(|e| format!("{path:?}: {e}"))
}

async fn fetch_batch(config: &ViewerConfig, base_url: String) -> Result<FeedBatch, String> {
    let mut http = config.http_config();
    http.base_url = base_url;
    let client = HttpClient::new(http).map_err(|e| e.to_string())?;
    client.fetch_devices().await.map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let payload = serde_json::to_string_pretty(value).map_err(|e| format!("json: {e}"))?;
    println!("{payload}");
    Ok(())
}

fn parse_lat_lng(s: &str) -> Result<LatLng, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got {s:?}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("latitude {lat:?}: {e}"))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|e| format!("longitude {lng:?}: {e}"))?;
    LatLng::new(lat, lng).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::{Args, Command, parse_lat_lng};
    use clap::Parser;

    #[test]
    fn parses_lat_lng_pairs() {
        let p = parse_lat_lng("48.1907, 16.3757").unwrap();
        assert_eq!((p.lat(), p.lng()), (48.1907, 16.3757));
        assert!(parse_lat_lng("48.1907").is_err());
        assert!(parse_lat_lng("91,0").is_err());
        assert!(parse_lat_lng("north,east").is_err());
    }

    #[test]
    fn cluster_needs_a_source() {
        assert!(Args::try_parse_from(["geoproof", "cluster", "--zoom", "12"]).is_err());
        let args =
            Args::try_parse_from(["geoproof", "cluster", "--zoom", "12", "devices.json"]).unwrap();
        assert!(matches!(args.command, Command::Cluster { zoom, .. } if zoom == 12.0));
        assert!(
            Args::try_parse_from([
                "geoproof",
                "cluster",
                "--zoom",
                "12",
                "--api",
                "http://localhost:3000",
                "devices.json"
            ])
            .is_err()
        );
    }

    #[test]
    fn stats_requires_user() {
        assert!(Args::try_parse_from(["geoproof", "stats", "devices.json"]).is_err());
        let args = Args::try_parse_from(["geoproof", "stats", "--user", "48.19,16.37", "d.json"])
            .unwrap();
        assert!(matches!(args.command, Command::Stats { .. }));
    }
}
