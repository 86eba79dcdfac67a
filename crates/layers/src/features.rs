//! Encoding of cluster nodes as point features for the rendering surface.

use foundation::{DeviceId, LatLng};
use scene::{ClusterNode, ClusterParams, DeviceStatus};
use serde::Serialize;
use serde_json::{Value, json};

use crate::symbology::{DensityTier, MarkerStyle};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureProperties {
    Device {
        device_id: DeviceId,
        name: String,
        status: DeviceStatus,
        average_rating: f64,
        rating_count: u32,
        style: MarkerStyle,
    },
    Cluster {
        cluster_id: u64,
        point_count: usize,
        expansion_zoom: u8,
        tier: DensityTier,
        style: MarkerStyle,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointFeature {
    pub position: LatLng,
    pub properties: FeatureProperties,
}

impl PointFeature {
    pub fn from_node(node: &ClusterNode) -> Self {
        let properties = match node {
            ClusterNode::Leaf(d) => FeatureProperties::Device {
                device_id: d.id.clone(),
                name: d.display_name.clone(),
                status: d.status,
                average_rating: d.average_rating,
                rating_count: d.rating_count,
                style: if d.is_active() {
                    MarkerStyle::ACTIVE_DEVICE
                } else {
                    MarkerStyle::INACTIVE_DEVICE
                },
            },
            ClusterNode::Aggregate(a) => {
                let tier = DensityTier::for_count(a.count);
                FeatureProperties::Cluster {
                    cluster_id: a.id.to_u64(),
                    point_count: a.count,
                    expansion_zoom: a.expansion_zoom,
                    tier,
                    style: tier.style(),
                }
            }
        };
        Self {
            position: node.position(),
            properties,
        }
    }
}

/// A point-feature source together with the clustering parameters it was
/// built with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSource {
    pub params: ClusterParams,
    pub features: Vec<PointFeature>,
}

impl ClusterSource {
    pub fn from_nodes(nodes: &[ClusterNode], params: ClusterParams) -> Self {
        Self {
            params,
            features: nodes.iter().map(PointFeature::from_node).collect(),
        }
    }

    pub fn point_count(&self) -> usize {
        self.features
            .iter()
            .map(|f| match &f.properties {
                FeatureProperties::Device { .. } => 1,
                FeatureProperties::Cluster { point_count, .. } => *point_count,
            })
            .sum()
    }

    /// GeoJSON `FeatureCollection`; coordinates are `[lng, lat]`.
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|f| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Point",
                        "coordinates": [f.position.lng(), f.position.lat()],
                    },
                    "properties": serde_json::to_value(&f.properties).unwrap_or(Value::Null),
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }
}

#[cfg(test)]
mod tests {
    use super::{ClusterSource, FeatureProperties};
    use crate::symbology::DensityTier;
    use foundation::{DeviceId, LatLng};
    use pretty_assertions::assert_eq;
    use scene::{Aggregate, ClusterId, ClusterNode, ClusterParams, DevicePoint};

    fn nodes() -> Vec<ClusterNode> {
        let at = LatLng::new(48.19, 16.37).unwrap();
        vec![
            ClusterNode::Leaf(DevicePoint::new("solo", "Solo", at)),
            ClusterNode::Aggregate(Aggregate {
                id: ClusterId::new(10, 3),
                centroid: at,
                count: 12,
                expansion_zoom: 11,
                members: (0..12).map(|i| DeviceId::new(format!("m{i:02}"))).collect(),
            }),
        ]
    }

    #[test]
    fn encodes_leaves_and_clusters() {
        let source = ClusterSource::from_nodes(&nodes(), ClusterParams::default());
        assert_eq!(source.point_count(), 13);
        match &source.features[1].properties {
            FeatureProperties::Cluster {
                cluster_id,
                tier,
                expansion_zoom,
                ..
            } => {
                assert_eq!(*cluster_id, ClusterId::new(10, 3).to_u64());
                assert_eq!(*tier, DensityTier::Medium);
                assert_eq!(*expansion_zoom, 11);
            }
            other => panic!("expected cluster, got {other:?}"),
        }
    }

    #[test]
    fn geojson_uses_lng_lat_order() {
        let source = ClusterSource::from_nodes(&nodes(), ClusterParams::default());
        let doc = source.to_geojson();
        assert_eq!(doc["features"][0]["geometry"]["coordinates"][0], 16.37);
        assert_eq!(doc["features"][0]["properties"]["kind"], "device");
        assert_eq!(doc["features"][1]["properties"]["tier"], "medium");
    }
}
