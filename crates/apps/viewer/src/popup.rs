//! The single device detail popup and its coherence with reclustering.

use chrono::{DateTime, Utc};
use foundation::{DeviceId, LatLng};
use scene::{ClusterNode, DevicePoint, DeviceSet, DeviceStatus};
use serde::Serialize;

/// What the popup shows, captured when it was opened or last refreshed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupContent {
    pub display_name: String,
    pub status: DeviceStatus,
    pub average_rating: f64,
    pub rating_count: u32,
    pub description: String,
    pub address: String,
    pub owner_name: Option<String>,
    pub image: Option<String>,
    pub last_validation: Option<DateTime<Utc>>,
}

impl PopupContent {
    pub fn of(device: &DevicePoint) -> Self {
        Self {
            display_name: device.display_name.clone(),
            status: device.status,
            average_rating: device.average_rating,
            rating_count: device.rating_count,
            description: device.description.clone(),
            address: device.address.clone(),
            owner_name: device.owner_name.clone(),
            image: device.image.clone(),
            last_validation: device.last_validation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenPopup {
    pub anchor: DeviceId,
    pub at: LatLng,
    pub content: PopupContent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PopupState {
    #[default]
    Closed,
    Open(OpenPopup),
}

/// Why an open popup was closed by the reconciler.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PopupClosed {
    /// The anchor became part of an aggregate.
    Merged,
    /// The anchor is no longer part of the device set.
    Gone,
}

#[derive(Debug, Default)]
pub struct PopupReconciler {
    state: PopupState,
}

impl PopupReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PopupState {
        &self.state
    }

    pub fn open_popup(&self) -> Option<&OpenPopup> {
        match &self.state {
            PopupState::Open(p) => Some(p),
            PopupState::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open_popup().is_some()
    }

    /// Opens a popup on `device`, replacing any popup already open.
    pub fn open(&mut self, device: &DevicePoint) {
        self.state = PopupState::Open(OpenPopup {
            anchor: device.id.clone(),
            at: device.location,
            content: PopupContent::of(device),
        });
    }

    pub fn close(&mut self) {
        self.state = PopupState::Closed;
    }

    /// Re-checks the anchor after the viewport settled.
    ///
    /// `locate` answers which node now contains the anchor's coordinates. The
    /// popup survives only if that node is the anchor's own leaf.
    pub fn on_settle(
        &mut self,
        locate: impl FnOnce(&DeviceId, LatLng) -> Option<ClusterNode>,
    ) -> Option<PopupClosed> {
        let PopupState::Open(popup) = &self.state else {
            return None;
        };
        let closed = match locate(&popup.anchor, popup.at) {
            Some(ClusterNode::Leaf(d)) if d.id == popup.anchor => return None,
            Some(_) => PopupClosed::Merged,
            None => PopupClosed::Gone,
        };
        tracing::debug!(anchor = %popup.anchor, reason = ?closed, "closing popup");
        self.state = PopupState::Closed;
        Some(closed)
    }

    /// Rebuilds the content snapshot from a new device set.
    pub fn refresh(&mut self, devices: &DeviceSet) -> Option<PopupClosed> {
        let PopupState::Open(popup) = &mut self.state else {
            return None;
        };
        match devices.get(&popup.anchor) {
            Some(device) => {
                popup.at = device.location;
                popup.content = PopupContent::of(device);
                None
            }
            None => {
                tracing::debug!(anchor = %popup.anchor, "popup anchor left the device set");
                self.state = PopupState::Closed;
                Some(PopupClosed::Gone)
            }
        }
    }

    /// Overrides the displayed rating of the anchor, if it is `device`.
    pub fn show_rating(&mut self, device: &DeviceId, average: f64, count: u32) {
        if let PopupState::Open(popup) = &mut self.state
            && &popup.anchor == device
        {
            popup.content.average_rating = average;
            popup.content.rating_count = count;
        }
    }
}
