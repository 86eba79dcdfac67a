use serde::Serialize;

/// What a user-facing notice is about.
///
/// Every failure of an external call ends up as exactly one of these; none of
/// them is fatal to the host.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Malformed device records were dropped.
    ValidationDiscard,
    /// Device fetch or rating submission failed; prior state retained.
    NetworkFailure,
    /// A rating was attempted without a credential. A call to action, not an error.
    AuthRequired,
    GeolocationDenied,
    GeolocationUnavailable,
    GeolocationTimeout,
    /// Theme swap failed; the previous style stays visible.
    StyleLoadFailure,
}

impl NoticeKind {
    pub fn is_error(self) -> bool {
        !matches!(self, NoticeKind::AuthRequired | NoticeKind::ValidationDiscard)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Pending notices for the host UI, oldest first.
#[derive(Debug, Default)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice) {
        if notice.kind.is_error() {
            tracing::warn!(kind = ?notice.kind, "{}", notice.message);
        } else {
            tracing::info!(kind = ?notice.kind, "{}", notice.message);
        }
        self.items.push(notice);
    }

    pub fn notices(&self) -> &[Notice] {
        &self.items
    }

    pub fn last(&self) -> Option<&Notice> {
        self.items.last()
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.items)
    }
}
