//! "Locate me": at most one position query in flight.

use runtime::{Notice, NoticeKind, Sequencer, Ticket};
use scene::UserLocation;
use serde::Serialize;
use streaming::GeolocationError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum LocateState {
    #[default]
    Idle,
    Locating,
    Located(UserLocation),
    Failed(GeolocationError),
}

#[derive(Debug, Default)]
pub struct LocateController {
    state: LocateState,
    tickets: Sequencer,
    last_fix: Option<UserLocation>,
}

impl LocateController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LocateState {
        &self.state
    }

    /// Most recent successful fix. Kept across later failures.
    pub fn last_fix(&self) -> Option<&UserLocation> {
        self.last_fix.as_ref()
    }

    /// Starts a query. `None` while one is already running.
    pub fn request(&mut self) -> Option<Ticket> {
        if self.state == LocateState::Locating {
            tracing::debug!("locate already in progress");
            return None;
        }
        self.state = LocateState::Locating;
        Some(self.tickets.issue())
    }

    /// Applies a query result. Results for superseded tickets are dropped.
    pub fn resolve(
        &mut self,
        ticket: Ticket,
        result: Result<UserLocation, GeolocationError>,
    ) -> Result<Option<UserLocation>, Notice> {
        if !self.tickets.admit(ticket) {
            return Ok(None);
        }
        match result {
            Ok(fix) => {
                self.state = LocateState::Located(fix);
                self.last_fix = Some(fix);
                Ok(Some(fix))
            }
            Err(e) => {
                self.state = LocateState::Failed(e);
                Err(geolocation_notice(e))
            }
        }
    }
}

pub fn geolocation_notice(e: GeolocationError) -> Notice {
    let kind = match e {
        GeolocationError::PermissionDenied => NoticeKind::GeolocationDenied,
        GeolocationError::Timeout => NoticeKind::GeolocationTimeout,
        GeolocationError::PositionUnavailable => NoticeKind::GeolocationUnavailable,
    };
    Notice::new(kind, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::{LocateController, LocateState};
    use chrono::Utc;
    use foundation::LatLng;
    use runtime::NoticeKind;
    use scene::UserLocation;
    use streaming::GeolocationError;

    fn fix() -> UserLocation {
        UserLocation::new(LatLng::new(48.1907, 16.3757).unwrap(), Utc::now())
    }

    #[test]
    fn repeated_request_while_locating_is_coalesced() {
        let mut locate = LocateController::new();
        let ticket = locate.request().unwrap();
        assert_eq!(locate.request(), None);
        assert_eq!(locate.state(), &LocateState::Locating);

        let here = fix();
        assert_eq!(locate.resolve(ticket, Ok(here)), Ok(Some(here)));
        assert_eq!(locate.state(), &LocateState::Located(here));
        assert!(locate.request().is_some());
    }

    #[test]
    fn failures_are_surfaced_distinctly() {
        let cases = [
            (GeolocationError::PermissionDenied, NoticeKind::GeolocationDenied),
            (GeolocationError::Timeout, NoticeKind::GeolocationTimeout),
            (GeolocationError::PositionUnavailable, NoticeKind::GeolocationUnavailable),
        ];
        for (error, kind) in cases {
            let mut locate = LocateController::new();
            let ticket = locate.request().unwrap();
            let notice = locate.resolve(ticket, Err(error)).unwrap_err();
            assert_eq!(notice.kind, kind);
            assert_eq!(locate.state(), &LocateState::Failed(error));
            assert!(locate.last_fix().is_none());
        }
    }

    #[test]
    fn duplicate_result_is_ignored() {
        let mut locate = LocateController::new();
        let ticket = locate.request().unwrap();
        locate.resolve(ticket, Ok(fix())).unwrap();
        assert_eq!(locate.resolve(ticket, Err(GeolocationError::Timeout)), Ok(None));
        assert!(matches!(locate.state(), LocateState::Located(_)));
    }
}
