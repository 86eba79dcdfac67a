/// Issuance-ordered handle for an asynchronous request.
///
/// Tickets are handed out in strictly increasing order when a request is
/// *issued*; a response carries its ticket back so the owner can tell whether
/// it is still the newest one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

/// Resolves races between overlapping requests by issuance order.
///
/// A response is admitted only if its ticket is newer than the last admitted
/// one. A slow response for an old request that lands after a newer response
/// has been applied is therefore dropped, whatever the completion order.
#[derive(Debug, Default, Clone)]
pub struct Sequencer {
    next: u64,
    admitted: Option<Ticket>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> Ticket {
        self.next += 1;
        Ticket(self.next)
    }

    /// Returns `true` if a response for `ticket` may be applied.
    ///
    /// Tickets that were never issued are refused.
    pub fn admit(&mut self, ticket: Ticket) -> bool {
        if ticket.0 == 0 || ticket.0 > self.next {
            return false;
        }
        if self.admitted.is_some_and(|a| ticket <= a) {
            tracing::debug!(ticket = ticket.0, "dropping superseded response");
            return false;
        }
        self.admitted = Some(ticket);
        true
    }

    /// True while a newer request than the last admitted one is in flight.
    pub fn has_outstanding(&self) -> bool {
        self.next > self.admitted.map_or(0, |a| a.0)
    }
}
