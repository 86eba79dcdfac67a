use foundation::LatLng;
use serde::Serialize;

use crate::features::ClusterSource;
use crate::symbology::MarkerStyle;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerId {
    Clusters,
    UserLocation,
    Overlay,
}

impl LayerId {
    /// Every data layer, in draw order.
    pub const ALL: [LayerId; 3] = [LayerId::Overlay, LayerId::Clusters, LayerId::UserLocation];
}

/// An ambient overlay drawn beneath the device markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub name: String,
    pub points: Vec<LatLng>,
}

/// Content of one realized data layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum LayerData {
    Clusters(ClusterSource),
    UserLocation { at: LatLng, style: MarkerStyle },
    Overlay(Overlay),
}

impl LayerData {
    /// The user's position, drawn with the user-location marker.
    pub fn user_location(at: LatLng) -> Self {
        LayerData::UserLocation {
            at,
            style: MarkerStyle::USER_LOCATION,
        }
    }

    pub fn id(&self) -> LayerId {
        match self {
            LayerData::Clusters(_) => LayerId::Clusters,
            LayerData::UserLocation { .. } => LayerId::UserLocation,
            LayerData::Overlay(_) => LayerId::Overlay,
        }
    }
}
