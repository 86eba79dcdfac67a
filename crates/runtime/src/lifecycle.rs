use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Liveness flag shared between a view and the async work it spawned.
///
/// The owning view calls [`Lifetime::dispose`] on teardown; anything that
/// completes later checks [`Lifetime::is_alive`] and drops its result instead
/// of applying it to a disposed state.
#[derive(Debug, Clone)]
pub struct Lifetime {
    alive: Arc<AtomicBool>,
}

impl Default for Lifetime {
    fn default() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Lifetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Marks the view as gone. Returns `false` if it was already disposed.
    pub fn dispose(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }
}
