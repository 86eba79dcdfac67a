//! Spatial partitioning of devices into cluster nodes.
//!
//! Two [`Clusterer`] implementations exist: the in-process [`ClusterIndex`]
//! and [`NativeClusterer`], an adapter over clustering done by the rendering
//! host. Both uphold the same contract:
//!
//! - For a fixed `(devices, zoom)` the output is an exact partition: every
//!   input point is in exactly one node.
//! - Building twice with the same inputs yields the same membership.

pub mod cluster_index;
pub mod native;

pub use cluster_index::*;
pub use native::*;

use foundation::{DeviceId, LatLng};
use serde::Serialize;

use crate::device::DevicePoint;

/// Deterministic id of an aggregate node: the hierarchy level it was built at
/// and its slot within that level.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClusterId {
    pub zoom: u8,
    pub slot: u32,
}

impl ClusterId {
    pub fn new(zoom: u8, slot: u32) -> Self {
        Self { zoom, slot }
    }

    /// Packs the id into a single integer for feature properties.
    pub fn to_u64(self) -> u64 {
        ((self.slot as u64) << 8) | self.zoom as u64
    }

    pub fn from_u64(v: u64) -> Option<Self> {
        let slot = u32::try_from(v >> 8).ok()?;
        Some(Self {
            zoom: (v & 0xff) as u8,
            slot,
        })
    }
}

/// Parameters of radius-based clustering in screen space.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterParams {
    /// Points closer than this many pixels at a zoom collapse into one node.
    pub radius_px: f64,
    /// Tile size in pixels.
    pub extent_px: f64,
    /// Highest zoom that still clusters; above it every point is a leaf.
    pub max_zoom: u8,
    /// Minimum member count for an aggregate.
    pub min_points: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            radius_px: 50.0,
            extent_px: 512.0,
            max_zoom: 16,
            min_points: 2,
        }
    }
}

impl ClusterParams {
    /// First zoom at which every point is its own node.
    pub fn leaf_zoom(&self) -> u8 {
        self.max_zoom.saturating_add(1)
    }
}

/// Several nearby devices collapsed into one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub id: ClusterId,
    pub centroid: LatLng,
    pub count: usize,
    /// Minimum zoom at which this node splits into two or more nodes.
    pub expansion_zoom: u8,
    /// Member ids in ascending order.
    pub members: Vec<DeviceId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterNode {
    Leaf(DevicePoint),
    Aggregate(Aggregate),
}

impl ClusterNode {
    pub fn position(&self) -> LatLng {
        match self {
            ClusterNode::Leaf(d) => d.location,
            ClusterNode::Aggregate(a) => a.centroid,
        }
    }

    pub fn member_count(&self) -> usize {
        match self {
            ClusterNode::Leaf(_) => 1,
            ClusterNode::Aggregate(a) => a.count,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, ClusterNode::Aggregate(_))
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        match self {
            ClusterNode::Leaf(d) => &d.id == id,
            ClusterNode::Aggregate(a) => a.members.binary_search(id).is_ok(),
        }
    }

    pub fn member_ids(&self) -> Vec<&DeviceId> {
        match self {
            ClusterNode::Leaf(d) => vec![&d.id],
            ClusterNode::Aggregate(a) => a.members.iter().collect(),
        }
    }
}

/// Capability to partition devices into cluster nodes at a zoom level.
pub trait Clusterer {
    /// Partitions `devices` for `zoom`. The result replaces any previous build.
    fn build(&mut self, devices: &[DevicePoint], zoom: f64) -> Vec<ClusterNode>;

    /// Minimum zoom at which the aggregate `id` of the last build splits.
    fn expansion_zoom(&self, id: ClusterId) -> Option<u8>;

    /// Node of the last build that holds `device` at coordinates `at`.
    ///
    /// `None` if no such point is part of the last build.
    fn locate(&self, device: &DeviceId, at: LatLng) -> Option<ClusterNode>;
}
