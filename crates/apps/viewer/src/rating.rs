//! Optimistic, authenticated rating submission.
//!
//! Each submission is pending until the sink answers, then ends as
//! [`RatingResolution::Applied`] or [`RatingResolution::Failed`]; retrying
//! after a failure is a new submission. At most one submission per device is
//! pending at a time.

use std::collections::BTreeMap;

use foundation::DeviceId;
use runtime::{Notice, NoticeKind, Sequencer, Ticket};
use scene::{DevicePoint, MAX_RATING};
use serde::Serialize;
use streaming::{Credential, CredentialProvider, RatingSink, SubmitError};

pub const MIN_STARS: u8 = 1;
pub const MAX_STARS: u8 = MAX_RATING as u8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatingError {
    /// No credential; the user has to sign in first.
    LoginRequired,
    InvalidStars(u8),
    AlreadyPending(DeviceId),
    UnknownDevice(DeviceId),
    /// The map view was torn down.
    Closed,
}

impl std::fmt::Display for RatingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RatingError::LoginRequired => write!(f, "please log in to rate devices"),
            RatingError::InvalidStars(s) => {
                write!(f, "rating must be between {MIN_STARS} and {MAX_STARS}, got {s}")
            }
            RatingError::AlreadyPending(id) => write!(f, "a rating for {id} is already in flight"),
            RatingError::UnknownDevice(id) => write!(f, "unknown device {id}"),
            RatingError::Closed => write!(f, "the map is closed"),
        }
    }
}

impl std::error::Error for RatingError {}

impl RatingError {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            RatingError::LoginRequired => {
                Some(Notice::new(NoticeKind::AuthRequired, self.to_string()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSubmission {
    pub device: DeviceId,
    pub stars: u8,
}

/// Handle of an in-flight submission, passed back with its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingTicket {
    pub ticket: Ticket,
    pub device: DeviceId,
    pub stars: u8,
    pub credential: Credential,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RatingResolution {
    /// Acknowledged; the device list should be refetched to replace the
    /// optimistic value with the authoritative one.
    Applied { device: DeviceId },
    /// Rolled back.
    Failed { device: DeviceId, notice: Notice },
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Optimistic {
    average: f64,
    count: u32,
    settle: Settle,
}

/// What replaces an optimistic value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Settle {
    /// Submission still in flight.
    Pending,
    /// Acknowledged; dropped by the refresh with this ticket or a newer one.
    /// `None` until the caller reports which refresh it issued, in which case
    /// any refresh drops it.
    Refresh(Option<Ticket>),
}

/// Only in-flight submissions are kept; a resolved one lives on as its
/// optimistic overlay until the authoritative refresh lands.
#[derive(Debug, Default)]
pub struct RatingController {
    tickets: Sequencer,
    submissions: BTreeMap<Ticket, RatingSubmission>,
    overlays: BTreeMap<DeviceId, Optimistic>,
}

impl RatingController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a submission and applies the optimistic update.
    ///
    /// Fails without side effects when there is no credential, so no network
    /// call can follow.
    pub fn begin(
        &mut self,
        device: &DevicePoint,
        stars: u8,
        credential: Option<Credential>,
    ) -> Result<RatingTicket, RatingError> {
        let Some(credential) = credential else {
            return Err(RatingError::LoginRequired);
        };
        if !(MIN_STARS..=MAX_STARS).contains(&stars) {
            return Err(RatingError::InvalidStars(stars));
        }
        if self.pending_for(&device.id).is_some() {
            return Err(RatingError::AlreadyPending(device.id.clone()));
        }

        let (average, count) = self.display(device);
        let next_count = count.saturating_add(1);
        let next_average = (average * count as f64 + stars as f64) / next_count as f64;
        self.overlays.insert(
            device.id.clone(),
            Optimistic {
                average: next_average,
                count: next_count,
                settle: Settle::Pending,
            },
        );

        let ticket = self.tickets.issue();
        self.submissions.insert(
            ticket,
            RatingSubmission {
                device: device.id.clone(),
                stars,
            },
        );
        tracing::debug!(device = %device.id, stars, "rating pending");
        Ok(RatingTicket {
            ticket,
            device: device.id.clone(),
            stars,
            credential,
        })
    }

    /// Applies the sink's answer. `None` for a ticket that is not pending.
    pub fn resolve(
        &mut self,
        ticket: Ticket,
        result: Result<(), SubmitError>,
    ) -> Option<RatingResolution> {
        let submission = self.submissions.remove(&ticket)?;
        let device = submission.device;
        match result {
            Ok(()) => {
                if let Some(o) = self.overlays.get_mut(&device) {
                    o.settle = Settle::Refresh(None);
                }
                tracing::info!(device = %device, "rating applied");
                Some(RatingResolution::Applied { device })
            }
            Err(e) => {
                self.overlays.remove(&device);
                let kind = match e {
                    SubmitError::Unauthorized => NoticeKind::AuthRequired,
                    _ => NoticeKind::NetworkFailure,
                };
                Some(RatingResolution::Failed {
                    device,
                    notice: Notice::new(kind, e.to_string()),
                })
            }
        }
    }

    /// Records the device-list request issued for an applied rating. Only a
    /// list fetched by that request or a later one replaces the optimistic
    /// value.
    pub fn refresh_requested(&mut self, device: &DeviceId, refresh: Ticket) {
        if let Some(o) = self.overlays.get_mut(device)
            && o.settle != Settle::Pending
        {
            o.settle = Settle::Refresh(Some(refresh));
        }
    }

    /// Average and count to show for `device`, including any optimistic
    /// update not yet confirmed by a refresh.
    pub fn display(&self, device: &DevicePoint) -> (f64, u32) {
        match self.overlays.get(&device.id) {
            Some(o) => (o.average, o.count),
            None => (device.average_rating, device.rating_count),
        }
    }

    /// A device list fetched by request `fetched` was applied. Drops the
    /// optimistic values it supersedes; pending submissions and lists that
    /// predate an acknowledgement keep theirs.
    pub fn on_devices_refreshed(&mut self, fetched: Ticket) {
        self.overlays.retain(|_, o| match o.settle {
            Settle::Pending => true,
            Settle::Refresh(Some(refresh)) => fetched < refresh,
            Settle::Refresh(None) => false,
        });
    }

    pub fn pending_for(&self, device: &DeviceId) -> Option<&RatingSubmission> {
        self.submissions.values().find(|s| &s.device == device)
    }

    /// In-flight submission for `ticket`.
    pub fn submission(&self, ticket: Ticket) -> Option<&RatingSubmission> {
        self.submissions.get(&ticket)
    }
}

/// Runs one submission end to end against `sink`.
pub async fn submit_rating<R: RatingSink + ?Sized>(
    controller: &mut RatingController,
    sink: &R,
    device: &DevicePoint,
    stars: u8,
    credentials: &dyn CredentialProvider,
) -> Result<RatingResolution, RatingError> {
    let ticket = controller.begin(device, stars, credentials.credential())?;
    let result = sink
        .submit(&ticket.device, ticket.stars, &ticket.credential)
        .await;
    controller
        .resolve(ticket.ticket, result)
        .ok_or(RatingError::UnknownDevice(ticket.device))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::{RatingController, RatingError, RatingResolution, submit_rating};
    use foundation::{DeviceId, LatLng};
    use futures_util::future::BoxFuture;
    use pretty_assertions::assert_eq;
    use runtime::{NoticeKind, Ticket};
    use scene::DevicePoint;
    use streaming::{Credential, RatingSink, SubmitError};

    #[derive(Default)]
    struct CountingSink {
        calls: Mutex<Vec<(String, u8)>>,
        fail_with: Option<SubmitError>,
    }

    impl RatingSink for CountingSink {
        fn submit<'a>(
            &'a self,
            device: &'a DeviceId,
            stars: u8,
            _credential: &'a Credential,
        ) -> BoxFuture<'a, Result<(), SubmitError>> {
            self.calls.lock().unwrap().push((device.to_string(), stars));
            let result = match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            };
            Box::pin(async move { result })
        }
    }

    fn device() -> DevicePoint {
        DevicePoint::new("dev1", "Front Door", LatLng::new(48.1857, 16.3717).unwrap())
            .with_rating(4.0, 3)
    }

    fn token() -> Option<Credential> {
        Credential::bearer("t0k3n")
    }

    #[tokio::test]
    async fn unauthenticated_submission_makes_no_network_call() {
        let sink = CountingSink::default();
        let mut ratings = RatingController::new();
        let signed_out: Option<Credential> = None;

        let outcome = submit_rating(&mut ratings, &sink, &device(), 5, &signed_out).await;

        assert_eq!(outcome, Err(RatingError::LoginRequired));
        assert!(sink.calls.lock().unwrap().is_empty());
        assert_eq!(
            RatingError::LoginRequired.notice().map(|n| n.kind),
            Some(NoticeKind::AuthRequired)
        );
        assert_eq!(ratings.display(&device()), (4.0, 3));
    }

    #[tokio::test]
    async fn acknowledged_submission_requests_refresh() {
        let sink = CountingSink::default();
        let mut ratings = RatingController::new();
        let outcome = submit_rating(&mut ratings, &sink, &device(), 5, &token()).await;

        assert_eq!(
            outcome,
            Ok(RatingResolution::Applied {
                device: DeviceId::new("dev1")
            })
        );
        assert_eq!(*sink.calls.lock().unwrap(), vec![("dev1".to_string(), 5)]);
        // Optimistic value stays until the refreshed list arrives.
        assert_eq!(ratings.display(&device()), (4.25, 4));
        ratings.on_devices_refreshed(Ticket(1));
        assert_eq!(ratings.display(&device()), (4.0, 3));
    }

    #[tokio::test]
    async fn failed_submission_rolls_back() {
        let sink = CountingSink {
            fail_with: Some(SubmitError::Timeout),
            ..CountingSink::default()
        };
        let mut ratings = RatingController::new();
        let outcome = submit_rating(&mut ratings, &sink, &device(), 1, &token()).await;

        let Ok(RatingResolution::Failed { notice, .. }) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(notice.kind, NoticeKind::NetworkFailure);
        assert_eq!(ratings.display(&device()), (4.0, 3));
        assert!(ratings.pending_for(&DeviceId::new("dev1")).is_none());
    }

    #[test]
    fn optimistic_update_and_single_pending_per_device() {
        let mut ratings = RatingController::new();
        let d = device();
        let ticket = ratings.begin(&d, 2, token()).unwrap();
        assert_eq!(ratings.display(&d), (3.5, 4));
        assert_eq!(
            ratings.begin(&d, 3, token()),
            Err(RatingError::AlreadyPending(DeviceId::new("dev1")))
        );

        assert_eq!(ratings.submission(ticket.ticket).map(|s| s.stars), Some(2));
        ratings.resolve(ticket.ticket, Ok(())).unwrap();
        assert!(ratings.submission(ticket.ticket).is_none());
        // Terminal: a second answer for the same ticket is ignored.
        assert_eq!(ratings.resolve(ticket.ticket, Err(SubmitError::Timeout)), None);
    }

    #[test]
    fn rejects_out_of_range_stars() {
        let mut ratings = RatingController::new();
        assert_eq!(ratings.begin(&device(), 0, token()), Err(RatingError::InvalidStars(0)));
        assert_eq!(ratings.begin(&device(), 6, token()), Err(RatingError::InvalidStars(6)));
    }

    #[test]
    fn list_fetched_before_the_acknowledgement_keeps_optimistic_value() {
        let mut ratings = RatingController::new();
        let d = device();
        let ticket = ratings.begin(&d, 2, token()).unwrap();

        // A list requested before the rating was sent lands while it is pending.
        ratings.on_devices_refreshed(Ticket(1));
        assert_eq!(ratings.display(&d), (3.5, 4));

        ratings.resolve(ticket.ticket, Ok(())).unwrap();
        ratings.refresh_requested(&d.id, Ticket(3));

        // Another list issued before the refresh still predates the rating.
        ratings.on_devices_refreshed(Ticket(2));
        assert_eq!(ratings.display(&d), (3.5, 4));

        ratings.on_devices_refreshed(Ticket(3));
        assert_eq!(ratings.display(&d), (4.0, 3));
    }

    #[test]
    fn resolved_submissions_are_not_retained() {
        let mut ratings = RatingController::new();
        let d = device();
        for round in 0..100u64 {
            let ticket = ratings.begin(&d, 4, token()).unwrap();
            let result = if round % 2 == 0 {
                Ok(())
            } else {
                Err(SubmitError::Status(500))
            };
            ratings.resolve(ticket.ticket, result).unwrap();
            ratings.refresh_requested(&d.id, Ticket(round + 1));
            ratings.on_devices_refreshed(Ticket(round + 1));
        }
        assert!(ratings.submissions.is_empty());
        assert!(ratings.overlays.is_empty());
    }
}
