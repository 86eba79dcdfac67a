//! Ownership of the map surface: base style, data layers and clustering.
//!
//! The controller is driven by named transitions that mirror the host's
//! callbacks. Data layers are fully replaced on every rebuild.

use foundation::{DeviceId, LatLng};
use layers::{
    ClusterSource, ColorScheme, LayerData, LayerId, Overlay, StyleCatalog, StyleId, Theme,
};
use runtime::{Notice, NoticeKind};
use scene::{ClusterId, ClusterNode, ClusterParams, Clusterer, DeviceSet, UserLocation};

use crate::popup::{PopupClosed, PopupReconciler};
use crate::surface::RenderSurface;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewportOptions {
    pub cluster: ClusterParams,
    pub styles: StyleCatalog,
    pub theme: Theme,
    pub color_scheme: ColorScheme,
}

/// What the user clicked, as reported by the surface.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickTarget {
    Cluster(ClusterId),
    Device(DeviceId),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Expanded { center: LatLng, zoom: u8 },
    PopupOpened(DeviceId),
    Dismissed,
    Ignored,
}

pub struct MapViewportController<S, C> {
    surface: S,
    clusterer: C,
    options: ViewportOptions,
    ready: bool,
    loaded_style: Option<StyleId>,
    requested_style: Option<StyleId>,
    devices: DeviceSet,
    nodes: Vec<ClusterNode>,
    user: Option<UserLocation>,
    overlay: Option<Overlay>,
    popup: PopupReconciler,
}

impl<S: RenderSurface, C: Clusterer> MapViewportController<S, C> {
    pub fn new(surface: S, clusterer: C, options: ViewportOptions) -> Self {
        Self {
            surface,
            clusterer,
            options,
            ready: false,
            loaded_style: None,
            requested_style: None,
            devices: DeviceSet::default(),
            nodes: Vec::new(),
            user: None,
            overlay: None,
            popup: PopupReconciler::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    pub fn popup(&self) -> &PopupReconciler {
        &self.popup
    }

    pub fn popup_mut(&mut self) -> &mut PopupReconciler {
        &mut self.popup
    }

    pub fn user_location(&self) -> Option<&UserLocation> {
        self.user.as_ref()
    }

    pub fn loaded_style(&self) -> Option<&StyleId> {
        self.loaded_style.as_ref()
    }

    pub fn requested_style(&self) -> Option<&StyleId> {
        self.requested_style.as_ref()
    }

    pub fn theme(&self) -> Theme {
        self.options.theme
    }

    /// Style the current theme and OS preference resolve to.
    pub fn resolved_style(&self) -> &StyleId {
        self.options
            .styles
            .resolve(self.options.theme, self.options.color_scheme)
    }

    /// The surface finished booting with `style`.
    pub fn on_map_ready(&mut self, style: StyleId) {
        tracing::info!(%style, "map ready");
        self.ready = true;
        self.loaded_style = Some(style);
        self.apply_layers();
        self.sync_style();
    }

    /// Returns true if a style reload was requested.
    pub fn set_theme(&mut self, theme: Theme) -> bool {
        self.options.theme = theme;
        self.sync_style()
    }

    /// Returns true if a style reload was requested.
    pub fn set_color_scheme(&mut self, scheme: ColorScheme) -> bool {
        self.options.color_scheme = scheme;
        self.sync_style()
    }

    // Keyed on the style id: a theme change that resolves to the style already
    // shown (or already loading) never reloads.
    fn sync_style(&mut self) -> bool {
        if !self.ready {
            return false;
        }
        let target = self.resolved_style().clone();
        let current = self.requested_style.as_ref().or(self.loaded_style.as_ref());
        if current == Some(&target) {
            return false;
        }
        tracing::info!(style = %target, "loading map style");
        self.surface.load_style(&target);
        self.requested_style = Some(target);
        true
    }

    /// Completion of a style load. Returns true if data layers were re-applied.
    pub fn on_style_loaded(&mut self, style: StyleId) -> bool {
        if self.requested_style.as_ref() != Some(&style) {
            tracing::debug!(%style, "ignoring completion of superseded style");
            return false;
        }
        tracing::info!(%style, "map style loaded");
        self.requested_style = None;
        self.loaded_style = Some(style);
        self.apply_layers();
        true
    }

    /// A style load failed. The previous style and its layers stay as they are.
    pub fn on_style_failed(&mut self, style: StyleId, reason: &str) -> Option<Notice> {
        if self.requested_style.as_ref() != Some(&style) {
            return None;
        }
        self.requested_style = None;
        let kept = self
            .loaded_style
            .as_ref()
            .map_or_else(|| "none".to_string(), |s| s.to_string());
        Some(Notice::new(
            NoticeKind::StyleLoadFailure,
            format!("could not load map style {style}: {reason}; keeping {kept}"),
        ))
    }

    /// Replaces the device snapshot and rebuilds clusters.
    pub fn set_devices(&mut self, devices: DeviceSet) -> Option<PopupClosed> {
        self.devices = devices;
        let closed = self.popup.refresh(&self.devices);
        self.rebuild();
        closed
    }

    /// The camera stopped moving: recluster and re-check the popup anchor.
    pub fn on_viewport_settled(&mut self) -> Option<PopupClosed> {
        self.rebuild();
        let clusterer = &self.clusterer;
        self.popup.on_settle(|id, at| clusterer.locate(id, at))
    }

    pub fn on_click(&mut self, target: ClickTarget) -> ClickOutcome {
        match target {
            ClickTarget::Cluster(id) => {
                let Some((center, fallback)) = self.nodes.iter().find_map(|n| match n {
                    ClusterNode::Aggregate(a) if a.id == id => Some((a.centroid, a.expansion_zoom)),
                    _ => None,
                }) else {
                    tracing::debug!(?id, "click on a cluster that is no longer shown");
                    return ClickOutcome::Ignored;
                };
                let zoom = self.clusterer.expansion_zoom(id).unwrap_or(fallback);
                self.surface.ease_to(center, zoom as f64);
                ClickOutcome::Expanded { center, zoom }
            }
            // Popups anchor to leaves only; a device inside an aggregate has no
            // marker of its own to attach to.
            ClickTarget::Device(id) => {
                let leaf = self.nodes.iter().find_map(|n| match n {
                    ClusterNode::Leaf(d) if d.id == id => Some(d),
                    _ => None,
                });
                match leaf {
                    Some(device) => {
                        self.popup.open(device);
                        ClickOutcome::PopupOpened(id)
                    }
                    None => {
                        tracing::debug!(%id, "click on a device that is not shown as a leaf");
                        ClickOutcome::Ignored
                    }
                }
            }
            ClickTarget::Empty => {
                if self.popup.is_open() {
                    self.popup.close();
                    ClickOutcome::Dismissed
                } else {
                    ClickOutcome::Ignored
                }
            }
        }
    }

    pub fn ease_to(&mut self, center: LatLng, zoom: f64) {
        self.surface.ease_to(center, zoom);
    }

    pub fn set_user_location(&mut self, user: Option<UserLocation>) {
        self.user = user;
        if self.layers_live() {
            self.apply_user_location();
        }
    }

    pub fn set_overlay(&mut self, overlay: Option<Overlay>) {
        self.overlay = overlay;
        if self.layers_live() {
            self.apply_overlay();
        }
    }

    fn layers_live(&self) -> bool {
        self.ready && self.loaded_style.is_some()
    }

    fn apply_layers(&mut self) {
        self.apply_overlay();
        self.rebuild();
        self.apply_user_location();
    }

    fn rebuild(&mut self) {
        let zoom = self.surface.camera().zoom;
        self.nodes = self.clusterer.build(self.devices.as_slice(), zoom);
        tracing::debug!(
            zoom,
            devices = self.devices.len(),
            nodes = self.nodes.len(),
            "rebuilt clusters"
        );
        if self.layers_live() {
            let source = ClusterSource::from_nodes(&self.nodes, self.options.cluster);
            self.surface.set_layer(LayerData::Clusters(source));
        }
    }

    fn apply_user_location(&mut self) {
        match &self.user {
            Some(u) => self.surface.set_layer(LayerData::user_location(u.at)),
            None => self.surface.remove_layer(LayerId::UserLocation),
        }
    }

    fn apply_overlay(&mut self) {
        match &self.overlay {
            Some(o) => self.surface.set_layer(LayerData::Overlay(o.clone())),
            None => self.surface.remove_layer(LayerId::Overlay),
        }
    }
}
