use foundation::LatLng;
use layers::{LayerData, LayerId, StyleId};
use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Camera {
    pub center: LatLng,
    pub zoom: f64,
}

/// The map widget the engine draws into.
///
/// Calls are fire-and-forget. Completion of [`RenderSurface::load_style`] is
/// reported back as a style-loaded or style-failed event, and the end of a
/// camera move as a viewport-settled event.
pub trait RenderSurface {
    fn camera(&self) -> Camera;

    /// Adds the layer, or replaces the existing layer with the same id.
    fn set_layer(&mut self, data: LayerData);

    fn remove_layer(&mut self, id: LayerId);

    fn ease_to(&mut self, center: LatLng, zoom: f64);

    /// Starts loading a base style. The surface drops its data layers when
    /// the new style takes effect.
    fn load_style(&mut self, style: &StyleId);
}
