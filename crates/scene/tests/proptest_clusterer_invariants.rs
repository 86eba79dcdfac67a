//! Property tests for the clustering contract shared by every `Clusterer`.
//!
//! 1. **Exact partition**: every input device is in exactly one node.
//! 2. **Repeatable**: building twice with the same input gives equal output.
//! 3. **Order independent**: shuffling the input does not change the output.
//! 4. **Expansion zoom** (`ClusterIndex`): an aggregate is still one node one
//!    zoom below its expansion zoom and splits at it.
//!
//! Inputs are dense on purpose: points are drawn from a small pool of
//! coordinates around Vienna so duplicate positions are common, and zooms are
//! fractional.

use std::collections::BTreeSet;

use foundation::{DeviceId, LatLng};
use proptest::prelude::*;
use scene::{
    ClusterIndex, ClusterNode, ClusterParams, Clusterer, DevicePoint, NativeCluster,
    NativeClusterer, NativeClustering,
};

// ── Strategies ──────────────────────────────────────────────────────────

fn coordinate_pool() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((48.10f64..48.30, 16.25f64..16.50), 1..24)
}

/// Devices with unique ids whose positions repeat from a small pool.
fn devices_strategy() -> impl Strategy<Value = Vec<DevicePoint>> {
    coordinate_pool().prop_flat_map(|pool| {
        let len = pool.len();
        prop::collection::vec(0..len, 0..60).prop_map(move |picks| {
            picks
                .into_iter()
                .enumerate()
                .map(|(i, p)| {
                    let (lat, lng) = pool[p];
                    let id = format!("dev{i:03}");
                    DevicePoint::new(id.clone(), id, LatLng::new(lat, lng).unwrap())
                })
                .collect()
        })
    })
}

fn shuffled_devices() -> impl Strategy<Value = (Vec<DevicePoint>, Vec<DevicePoint>)> {
    devices_strategy()
        .prop_flat_map(|devices| (Just(devices.clone()), Just(devices).prop_shuffle()))
}

fn zoom_strategy() -> impl Strategy<Value = f64> {
    0.0f64..18.5
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn assert_partition(devices: &[DevicePoint], nodes: &[ClusterNode]) -> Result<(), TestCaseError> {
    let mut seen: Vec<&DeviceId> = nodes.iter().flat_map(|n| n.member_ids()).collect();
    let total = seen.len();
    seen.sort();
    seen.dedup();
    prop_assert_eq!(seen.len(), total, "a device appears in two nodes");

    let expected: Vec<&DeviceId> = devices
        .iter()
        .map(|d| &d.id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    prop_assert_eq!(seen, expected);

    for node in nodes {
        if let ClusterNode::Aggregate(a) = node {
            prop_assert!(a.count >= 2);
            prop_assert_eq!(a.count, a.members.len());
        }
    }
    Ok(())
}

/// Nodes of `nodes` that hold at least one of `members`.
fn nodes_holding(nodes: &[ClusterNode], members: &[DeviceId]) -> usize {
    nodes
        .iter()
        .filter(|n| members.iter().any(|m| n.contains(m)))
        .count()
}

/// Host double that buckets points into a zoom-dependent lat/lng grid.
///
/// It also misbehaves the way real hosts can: it reports an id it was never
/// given and claims one device in two clusters.
#[derive(Default)]
struct GridHost;

impl NativeClustering for GridHost {
    fn cluster(&mut self, points: &[(DeviceId, LatLng)], zoom: f64) -> Vec<NativeCluster> {
        let cell = 90.0 / 2f64.powf(zoom.max(0.0));
        let mut buckets: std::collections::BTreeMap<(i64, i64), Vec<(DeviceId, LatLng)>> =
            Default::default();
        for (id, at) in points {
            let key = ((at.lat() / cell).floor() as i64, (at.lng() / cell).floor() as i64);
            buckets.entry(key).or_default().push((id.clone(), *at));
        }

        let mut clusters: Vec<NativeCluster> = buckets
            .into_values()
            .filter(|b| b.len() >= 2)
            .enumerate()
            .map(|(i, b)| {
                let n = b.len() as f64;
                let lat = b.iter().map(|(_, p)| p.lat()).sum::<f64>() / n;
                let lng = b.iter().map(|(_, p)| p.lng()).sum::<f64>() / n;
                NativeCluster {
                    host_id: i as u64,
                    center: LatLng::new(lat, lng).unwrap(),
                    members: b.into_iter().map(|(id, _)| id).collect(),
                    expansion_zoom: zoom as u8,
                }
            })
            .collect();

        if let Some(first) = clusters.first_mut() {
            first.members.push(DeviceId::new("ghost"));
        }
        if clusters.len() >= 2 {
            let stolen = clusters[0].members[0].clone();
            if let Some(last) = clusters.last_mut() {
                last.members.push(stolen);
            }
        }
        clusters
    }
}

// ── ClusterIndex ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn index_output_is_an_exact_partition(
        devices in devices_strategy(),
        zoom in zoom_strategy(),
    ) {
        let mut index = ClusterIndex::new(ClusterParams::default());
        let nodes = index.build(&devices, zoom);
        assert_partition(&devices, &nodes)?;
    }

    #[test]
    fn index_build_is_repeatable(
        devices in devices_strategy(),
        zoom in zoom_strategy(),
    ) {
        let mut index = ClusterIndex::new(ClusterParams::default());
        let first = index.build(&devices, zoom);
        let second = index.build(&devices, zoom);
        prop_assert_eq!(&first, &second);

        let fresh = ClusterIndex::new(ClusterParams::default()).build(&devices, zoom);
        prop_assert_eq!(first, fresh);
    }

    #[test]
    fn index_ignores_input_order(
        (devices, shuffled) in shuffled_devices(),
        zoom in zoom_strategy(),
    ) {
        let a = ClusterIndex::new(ClusterParams::default()).build(&devices, zoom);
        let b = ClusterIndex::new(ClusterParams::default()).build(&shuffled, zoom);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn aggregates_split_exactly_at_expansion_zoom(
        devices in devices_strategy(),
        zoom in 0.0f64..16.0,
    ) {
        let params = ClusterParams::default();
        let mut index = ClusterIndex::new(params);
        let nodes = index.build(&devices, zoom);

        let aggregates: Vec<_> = nodes
            .iter()
            .filter_map(|n| match n {
                ClusterNode::Aggregate(a) => Some(a.clone()),
                ClusterNode::Leaf(_) => None,
            })
            .collect();
        for a in &aggregates {
            prop_assert_eq!(index.expansion_zoom(a.id), Some(a.expansion_zoom));
        }

        for a in aggregates {
            let e = a.expansion_zoom;
            prop_assert!(f64::from(e) > zoom.floor(), "expansion zoom {} at zoom {}", e, zoom);
            prop_assert!(e <= params.leaf_zoom());

            let before = index.build(&devices, f64::from(e - 1));
            prop_assert_eq!(nodes_holding(&before, &a.members), 1, "split before {}", e);

            let at = index.build(&devices, f64::from(e));
            prop_assert!(nodes_holding(&at, &a.members) >= 2, "no split at {}", e);
        }
    }
}

// ── NativeClusterer ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn native_output_is_an_exact_partition(
        devices in devices_strategy(),
        zoom in zoom_strategy(),
    ) {
        let mut clusterer = NativeClusterer::new(GridHost);
        let nodes = clusterer.build(&devices, zoom);
        assert_partition(&devices, &nodes)?;

        for node in &nodes {
            if let ClusterNode::Aggregate(a) = node {
                prop_assert!(f64::from(a.expansion_zoom) > zoom.floor());
                prop_assert_eq!(clusterer.expansion_zoom(a.id), Some(a.expansion_zoom));
            }
        }
    }

    #[test]
    fn native_build_is_repeatable(
        devices in devices_strategy(),
        zoom in zoom_strategy(),
    ) {
        let mut clusterer = NativeClusterer::new(GridHost);
        let first = clusterer.build(&devices, zoom);
        let second = clusterer.build(&devices, zoom);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn native_ignores_input_order(
        (devices, shuffled) in shuffled_devices(),
        zoom in zoom_strategy(),
    ) {
        let a = NativeClusterer::new(GridHost).build(&devices, zoom);
        let b = NativeClusterer::new(GridHost).build(&shuffled, zoom);
        prop_assert_eq!(a, b);
    }
}
