//! One map view: controllers, async bookkeeping and the event dispatcher.
//!
//! The host delivers [`MapEvent`]s one at a time, so the session needs no
//! locking. Asynchronous work leaves the session as an [`Effect`]; the host
//! runs it (see [`perform`]) and posts the resulting event back.

use compute::{ProximityParams, ProximityStats, present};
use foundation::DeviceId;
use formats::FeedBatch;
use layers::{ColorScheme, StyleId, Theme};
use runtime::{EventBus, Lifetime, Notice, NoticeKind, Notices, Sequencer, Ticket};
use scene::{Clusterer, DeviceSet, UserLocation};
use streaming::{
    CredentialProvider, DeviceSource, FetchError, GeolocationError, GeolocationSource,
    RatingSink, SubmitError,
};

use crate::config::ViewerConfig;
use crate::locate::LocateController;
use crate::rating::{RatingController, RatingError, RatingResolution, RatingTicket};
use crate::surface::RenderSurface;
use crate::viewport::{ClickOutcome, ClickTarget, MapViewportController};

#[derive(Debug, Clone)]
pub enum MapEvent {
    MapReady(StyleId),
    StyleLoaded(StyleId),
    StyleFailed { style: StyleId, reason: String },
    ViewportSettled,
    Click(ClickTarget),
    ThemeChanged(Theme),
    ColorSchemeChanged(ColorScheme),
    DevicesFetched {
        ticket: Ticket,
        result: Result<FeedBatch, FetchError>,
    },
    LocationResolved {
        ticket: Ticket,
        result: Result<UserLocation, GeolocationError>,
    },
    RatingResolved {
        ticket: Ticket,
        result: Result<(), SubmitError>,
    },
}

/// Asynchronous work requested by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchDevices(Ticket),
    Locate(Ticket),
    SubmitRating(RatingTicket),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SessionOptions {
    pub proximity: ProximityParams,
    /// Zoom to ease to after a successful "locate me".
    pub locate_zoom: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            proximity: ProximityParams::default(),
            locate_zoom: 15.0,
        }
    }
}

pub struct MapSession<S, C> {
    viewport: MapViewportController<S, C>,
    ratings: RatingController,
    locate: LocateController,
    fetches: Sequencer,
    notices: Notices,
    lifetime: Lifetime,
    options: SessionOptions,
}

impl<S: RenderSurface, C: Clusterer> MapSession<S, C> {
    pub fn new(viewport: MapViewportController<S, C>, options: SessionOptions) -> Self {
        Self {
            viewport,
            ratings: RatingController::new(),
            locate: LocateController::new(),
            fetches: Sequencer::new(),
            notices: Notices::new(),
            lifetime: Lifetime::new(),
            options,
        }
    }

    pub fn from_config(surface: S, clusterer: C, config: &ViewerConfig) -> Self {
        let viewport = MapViewportController::new(surface, clusterer, config.viewport_options());
        Self::new(
            viewport,
            SessionOptions {
                proximity: config.proximity_params(),
                locate_zoom: config.locate_zoom,
            },
        )
    }

    pub fn viewport(&self) -> &MapViewportController<S, C> {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut MapViewportController<S, C> {
        &mut self.viewport
    }

    pub fn ratings(&self) -> &RatingController {
        &self.ratings
    }

    pub fn locate(&self) -> &LocateController {
        &self.locate
    }

    pub fn notices(&self) -> &[Notice] {
        self.notices.notices()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    /// Handle for async tasks to check whether the view still exists.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.lifetime.is_alive()
    }

    /// "Devices near me" for the current snapshot and user location.
    pub fn stats(&self) -> ProximityStats {
        present(
            self.viewport.devices().as_slice(),
            self.viewport.user_location(),
            &self.options.proximity,
        )
    }

    /// Rating to show for `device`, optimistic updates included.
    pub fn display_rating(&self, device: &DeviceId) -> Option<(f64, u32)> {
        self.viewport
            .devices()
            .get(device)
            .map(|d| self.ratings.display(d))
    }

    /// True while a device list newer than the one shown is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.fetches.has_outstanding()
    }

    pub fn refresh_devices(&mut self) -> Option<Effect> {
        if !self.is_alive() {
            return None;
        }
        Some(Effect::FetchDevices(self.fetches.issue()))
    }

    /// `None` while a query is already running or after teardown.
    pub fn locate_me(&mut self) -> Option<Effect> {
        if !self.is_alive() {
            return None;
        }
        self.locate.request().map(Effect::Locate)
    }

    /// Starts a rating. Without a credential this fails with
    /// [`RatingError::LoginRequired`] and no effect is produced.
    pub fn rate(
        &mut self,
        device: &DeviceId,
        stars: u8,
        credentials: &dyn CredentialProvider,
    ) -> Result<Effect, RatingError> {
        if !self.is_alive() {
            return Err(RatingError::Closed);
        }
        let Some(point) = self.viewport.devices().get(device) else {
            return Err(RatingError::UnknownDevice(device.clone()));
        };
        let ticket = match self.ratings.begin(point, stars, credentials.credential()) {
            Ok(ticket) => ticket,
            Err(e) => {
                if let Some(notice) = e.notice() {
                    self.notices.push(notice);
                }
                return Err(e);
            }
        };
        self.show_rating(device);
        Ok(Effect::SubmitRating(ticket))
    }

    pub fn teardown(&mut self) {
        if self.lifetime.dispose() {
            tracing::info!("map session torn down");
        }
    }

    /// Drains every queued event in post order.
    pub fn drain(&mut self, bus: &mut EventBus<MapEvent>) -> Vec<Effect> {
        bus.drain()
            .into_iter()
            .flat_map(|posted| self.dispatch(posted.event))
            .collect()
    }

    pub fn dispatch(&mut self, event: MapEvent) -> Vec<Effect> {
        if !self.is_alive() {
            tracing::debug!(?event, "ignoring event after teardown");
            return Vec::new();
        }

        let mut effects = Vec::new();
        match event {
            MapEvent::MapReady(style) => self.viewport.on_map_ready(style),
            MapEvent::StyleLoaded(style) => {
                self.viewport.on_style_loaded(style);
            }
            MapEvent::StyleFailed { style, reason } => {
                if let Some(notice) = self.viewport.on_style_failed(style, &reason) {
                    self.notices.push(notice);
                }
            }
            MapEvent::ViewportSettled => {
                self.viewport.on_viewport_settled();
            }
            MapEvent::Click(target) => {
                if let ClickOutcome::PopupOpened(id) = self.viewport.on_click(target) {
                    self.show_rating(&id);
                }
            }
            MapEvent::ThemeChanged(theme) => {
                self.viewport.set_theme(theme);
            }
            MapEvent::ColorSchemeChanged(scheme) => {
                self.viewport.set_color_scheme(scheme);
            }
            MapEvent::DevicesFetched { ticket, result } => self.on_devices_fetched(ticket, result),
            MapEvent::LocationResolved { ticket, result } => {
                match self.locate.resolve(ticket, result) {
                    Ok(Some(fix)) => {
                        self.viewport.set_user_location(Some(fix));
                        self.viewport.ease_to(fix.at, self.options.locate_zoom);
                    }
                    Ok(None) => {}
                    Err(notice) => self.notices.push(notice),
                }
            }
            MapEvent::RatingResolved { ticket, result } => {
                match self.ratings.resolve(ticket, result) {
                    Some(RatingResolution::Applied { device }) => {
                        let refresh = self.fetches.issue();
                        self.ratings.refresh_requested(&device, refresh);
                        effects.push(Effect::FetchDevices(refresh));
                    }
                    Some(RatingResolution::Failed { device, notice }) => {
                        self.notices.push(notice);
                        self.show_rating(&device);
                    }
                    None => {}
                }
            }
        }
        effects
    }

    fn on_devices_fetched(&mut self, ticket: Ticket, result: Result<FeedBatch, FetchError>) {
        if !self.fetches.admit(ticket) {
            tracing::debug!(ticket = ticket.0, "dropping stale device list");
            return;
        }
        match result {
            Ok(batch) => {
                if batch.discard_count() > 0 {
                    self.notices.push(Notice::new(
                        NoticeKind::ValidationDiscard,
                        format!("{} device records could not be shown", batch.discard_count()),
                    ));
                }
                self.ratings.on_devices_refreshed(ticket);
                self.viewport.set_devices(DeviceSet::new(batch.devices));
                if let Some(anchor) = self.viewport.popup().open_popup().map(|p| p.anchor.clone()) {
                    self.show_rating(&anchor);
                }
            }
            Err(e) => self
                .notices
                .push(Notice::new(NoticeKind::NetworkFailure, e.to_string())),
        }
    }

    fn show_rating(&mut self, device: &DeviceId) {
        if let Some((average, count)) = self.display_rating(device) {
            self.viewport.popup_mut().show_rating(device, average, count);
        }
    }
}

/// Runs one effect against the collaborators and returns the event to post.
pub async fn perform(
    effect: Effect,
    devices: &dyn DeviceSource,
    ratings: &dyn RatingSink,
    geolocation: &dyn GeolocationSource,
) -> MapEvent {
    match effect {
        Effect::FetchDevices(ticket) => MapEvent::DevicesFetched {
            ticket,
            result: devices.fetch_devices().await,
        },
        Effect::Locate(ticket) => MapEvent::LocationResolved {
            ticket,
            result: geolocation.locate().await,
        },
        Effect::SubmitRating(t) => MapEvent::RatingResolved {
            ticket: t.ticket,
            result: ratings.submit(&t.device, t.stars, &t.credential).await,
        },
    }
}
