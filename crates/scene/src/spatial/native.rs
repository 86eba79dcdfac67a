use std::collections::{BTreeMap, BTreeSet};

use foundation::math::{Vec2, project, unproject};
use foundation::{DeviceId, LatLng};

use super::{Aggregate, ClusterId, ClusterNode, Clusterer};
use crate::device::DevicePoint;

/// One cluster as reported by the host's built-in clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeCluster {
    pub host_id: u64,
    pub center: LatLng,
    pub members: Vec<DeviceId>,
    pub expansion_zoom: u8,
}

/// Clustering provided by the rendering host.
///
/// Hosts are not trusted to return an exact partition; [`NativeClusterer`]
/// repairs whatever comes back.
pub trait NativeClustering {
    /// Clusters the given points at `zoom`. Singletons may be omitted.
    fn cluster(&mut self, points: &[(DeviceId, LatLng)], zoom: f64) -> Vec<NativeCluster>;
}

/// [`Clusterer`] that delegates to host-native clustering.
///
/// Repair rules applied to the host result:
/// - ids the host invented are dropped;
/// - a device claimed by several clusters stays in the first one (clusters are
///   visited in order of their smallest member id);
/// - devices the host left out become leaves;
/// - a cluster left with a single member becomes a leaf.
#[derive(Debug)]
pub struct NativeClusterer<H> {
    host: H,
    points: Vec<DevicePoint>,
    nodes: Vec<ClusterNode>,
}

impl<H: NativeClustering> NativeClusterer<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            points: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<H: NativeClustering> Clusterer for NativeClusterer<H> {
    fn build(&mut self, devices: &[DevicePoint], zoom: f64) -> Vec<ClusterNode> {
        let mut points = devices.to_vec();
        points.sort_by(|a, b| a.id.cmp(&b.id));
        points.dedup_by(|a, b| a.id == b.id);

        let input: Vec<(DeviceId, LatLng)> =
            points.iter().map(|p| (p.id.clone(), p.location)).collect();
        let mut clusters = self.host.cluster(&input, zoom);
        for c in &mut clusters {
            c.members.sort();
            c.members.dedup();
        }
        clusters.sort_by(|a, b| a.members.first().cmp(&b.members.first()));

        let by_id: BTreeMap<&DeviceId, &DevicePoint> = points.iter().map(|p| (&p.id, p)).collect();
        let mut assigned: BTreeSet<DeviceId> = BTreeSet::new();
        let min_expansion = if zoom.is_finite() && zoom > 0.0 {
            (zoom.floor() as u64 + 1).min(u8::MAX as u64) as u8
        } else {
            1
        };

        let mut nodes = Vec::new();
        for cluster in clusters {
            let reported = cluster.members.len();
            let members: Vec<DeviceId> = cluster
                .members
                .into_iter()
                .filter(|id| by_id.contains_key(id) && !assigned.contains(id))
                .collect();
            if members.len() != reported {
                tracing::warn!(
                    host_id = cluster.host_id,
                    reported,
                    kept = members.len(),
                    "repaired host cluster membership"
                );
            }
            assigned.extend(members.iter().cloned());

            match members.as_slice() {
                [] => {}
                [only] => nodes.push(ClusterNode::Leaf(by_id[only].clone())),
                _ => {
                    let centroid = if members.len() == reported {
                        cluster.center
                    } else {
                        centroid_of(members.iter().map(|id| by_id[id].location))
                    };
                    nodes.push(ClusterNode::Aggregate(Aggregate {
                        id: ClusterId::new(0, 0),
                        centroid,
                        count: members.len(),
                        expansion_zoom: cluster.expansion_zoom.max(min_expansion),
                        members,
                    }));
                }
            }
        }

        for p in &points {
            if !assigned.contains(&p.id) {
                nodes.push(ClusterNode::Leaf(p.clone()));
            }
        }

        // Ids are slots in the repaired output, so they are as deterministic
        // as the membership itself.
        let level = if zoom.is_finite() {
            zoom.clamp(0.0, 255.0) as u8
        } else {
            0
        };
        let mut slot = 0u32;
        for node in &mut nodes {
            if let ClusterNode::Aggregate(a) = node {
                a.id = ClusterId::new(level, slot);
                slot += 1;
            }
        }

        self.points = points;
        self.nodes = nodes.clone();
        nodes
    }

    fn expansion_zoom(&self, id: ClusterId) -> Option<u8> {
        self.nodes.iter().find_map(|n| match n {
            ClusterNode::Aggregate(a) if a.id == id => Some(a.expansion_zoom),
            _ => None,
        })
    }

    fn locate(&self, device: &DeviceId, at: LatLng) -> Option<ClusterNode> {
        let present = self
            .points
            .iter()
            .any(|p| &p.id == device && p.location == at);
        if !present {
            return None;
        }
        self.nodes.iter().find(|n| n.contains(device)).cloned()
    }
}

fn centroid_of(points: impl Iterator<Item = LatLng>) -> LatLng {
    let mut sum = Vec2::new(0.0, 0.0);
    let mut n = 0usize;
    for p in points {
        sum = sum + project(p);
        n += 1;
    }
    unproject(sum.scale(1.0 / n.max(1) as f64))
}
