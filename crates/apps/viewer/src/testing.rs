//! Test doubles shared by the viewer tests.

use std::collections::BTreeMap;

use foundation::LatLng;
use layers::{LayerData, LayerId, StyleId};

use crate::surface::{Camera, RenderSurface};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    SetLayer(LayerId),
    RemoveLayer(LayerId),
    EaseTo { center: LatLng, zoom: f64 },
    LoadStyle(StyleId),
}

/// Surface that records every call and keeps the current layer contents.
#[derive(Debug)]
pub struct RecordingSurface {
    pub camera: Camera,
    pub calls: Vec<SurfaceCall>,
    pub layers: BTreeMap<LayerId, LayerData>,
}

impl RecordingSurface {
    pub fn at(lat: f64, lng: f64, zoom: f64) -> Self {
        Self {
            camera: Camera {
                center: LatLng::new(lat, lng).unwrap(),
                zoom,
            },
            calls: Vec::new(),
            layers: BTreeMap::new(),
        }
    }

    /// What the host does once a style finishes loading: data layers are gone.
    pub fn swap_style(&mut self) {
        self.layers.clear();
    }

    /// Pans/zooms as a user gesture would, without going through the engine.
    pub fn move_camera(&mut self, zoom: f64) {
        self.camera.zoom = zoom;
    }

    pub fn style_loads(&self) -> Vec<&StyleId> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::LoadStyle(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn layer_sets(&self, id: LayerId) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == SurfaceCall::SetLayer(id))
            .count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl RenderSurface for RecordingSurface {
    fn camera(&self) -> Camera {
        self.camera
    }

    fn set_layer(&mut self, data: LayerData) {
        self.calls.push(SurfaceCall::SetLayer(data.id()));
        self.layers.insert(data.id(), data);
    }

    fn remove_layer(&mut self, id: LayerId) {
        self.calls.push(SurfaceCall::RemoveLayer(id));
        self.layers.remove(&id);
    }

    fn ease_to(&mut self, center: LatLng, zoom: f64) {
        self.calls.push(SurfaceCall::EaseTo { center, zoom });
        self.camera = Camera { center, zoom };
    }

    fn load_style(&mut self, style: &StyleId) {
        self.calls.push(SurfaceCall::LoadStyle(style.clone()));
    }
}
