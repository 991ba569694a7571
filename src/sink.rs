//! Result sinks.
//!
//! A sink receives ranked recognitions for presentation. Pixels never reach a
//! sink. `publish` is fire-and-forget and must not block the frame path.

use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::classify::Recognition;

pub trait ResultSink: Send + Sync {
    fn publish(&self, results: &[Recognition]);
}

#[derive(Debug, Default)]
struct Slot {
    latest: Option<Vec<Recognition>>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Shared {
    // A panicking consumer leaves the slot holding a whole result set or none.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hands the most recent result set to a consumer thread.
///
/// Holds one result set. Publishing while the consumer has not yet taken the
/// previous set replaces it, so a consumer that falls behind always picks up
/// the newest results and never a backlog.
#[derive(Debug)]
pub struct LatestSink {
    shared: Arc<Shared>,
}

/// Consumer end of a [`LatestSink`].
#[derive(Debug)]
pub struct LatestResults {
    shared: Arc<Shared>,
}

impl LatestSink {
    pub fn new() -> (Self, LatestResults) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            LatestResults { shared },
        )
    }
}

impl ResultSink for LatestSink {
    fn publish(&self, results: &[Recognition]) {
        let mut slot = self.shared.lock();
        if let Some(stale) = slot.latest.replace(results.to_vec()) {
            log::debug!(
                "result consumer behind, replacing {} unread results",
                stale.len()
            );
        }
        drop(slot);
        self.shared.ready.notify_one();
    }
}

impl Drop for LatestSink {
    fn drop(&mut self) {
        self.shared.lock().closed = true;
        self.shared.ready.notify_all();
    }
}

impl LatestResults {
    /// Take the newest unread result set, if any.
    pub fn try_recv(&self) -> Option<Vec<Recognition>> {
        self.shared.lock().latest.take()
    }

    /// Wait up to `timeout` for a result set.
    ///
    /// Unread results are still returned after the sink has gone away;
    /// `Disconnected` is reported only once the slot is empty.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<Recognition>, RecvTimeoutError> {
        let slot = self.shared.lock();
        let (mut slot, _) = self
            .shared
            .ready
            .wait_timeout_while(slot, timeout, |slot| {
                slot.latest.is_none() && !slot.closed
            })
            .unwrap_or_else(PoisonError::into_inner);
        match slot.latest.take() {
            Some(results) => Ok(results),
            None if slot.closed => Err(RecvTimeoutError::Disconnected),
            None => Err(RecvTimeoutError::Timeout),
        }
    }
}
