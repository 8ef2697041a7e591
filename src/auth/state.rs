//! Per-session authentication requirement
//!
//! `needs_auth` starts out true and is published through a `watch` channel so
//! host UIs can observe transitions. The round slot holds at most one
//! [`PendingAuth`]; a new round is only created once the previous one settled.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info};

use super::pending::PendingAuth;

pub struct AuthState {
    needs_auth: watch::Sender<bool>,
    round: Mutex<Option<PendingAuth>>,
    next_round: AtomicU64,
}

impl AuthState {
    pub fn new() -> Self {
        let (needs_auth, _) = watch::channel(true);
        Self {
            needs_auth,
            round: Mutex::new(None),
            next_round: AtomicU64::new(0),
        }
    }

    pub fn needs_auth(&self) -> bool {
        *self.needs_auth.borrow()
    }

    /// Observe `needs_auth` transitions
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.needs_auth.subscribe()
    }

    pub(crate) fn set_needs_auth(&self, value: bool) {
        let changed = self.needs_auth.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
        if changed {
            debug!(needs_auth = value, "Auth requirement changed");
        }
    }

    /// The current round, if any, whether settled or not
    pub async fn current_round(&self) -> Option<PendingAuth> {
        self.round.lock().await.clone()
    }

    /// Lock the round slot. Held across the status query so concurrent
    /// callers either join the round it creates or query after it.
    pub(crate) async fn lock_round(&self) -> MutexGuard<'_, Option<PendingAuth>> {
        self.round.lock().await
    }

    /// Replace a settled (or absent) round with a fresh one.
    pub(crate) fn begin_round(&self, slot: &mut Option<PendingAuth>) -> PendingAuth {
        let round = self.next_round.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = PendingAuth::new(round);
        *slot = Some(pending.clone());
        info!(round = round, "Starting OTP authentication round");
        pending
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}
