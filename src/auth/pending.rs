//! Pending authentication round
//!
//! A settle-once outcome shared by every caller waiting on the same OTP
//! round. Backed by a `watch` channel so waiters that subscribe after the
//! round settled still observe the outcome.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{Result, SignerError};

type Outcome = Option<std::result::Result<(), SignerError>>;

/// Handle to one OTP round. Cheap to clone; all clones share the outcome.
#[derive(Clone, Debug)]
pub struct PendingAuth {
    round: u64,
    tx: Arc<watch::Sender<Outcome>>,
}

impl PendingAuth {
    pub fn new(round: u64) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            round,
            tx: Arc::new(tx),
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Settle successfully. Returns false if the round had already settled.
    pub fn resolve(&self) -> bool {
        self.settle(Ok(()))
    }

    /// Settle with an error. Returns false if the round had already settled.
    pub fn reject(&self, err: SignerError) -> bool {
        self.settle(Err(err))
    }

    fn settle(&self, outcome: std::result::Result<(), SignerError>) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        })
    }

    /// Wait for the round to settle and return its outcome.
    pub async fn wait(&self) -> Result<()> {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let settled = rx
            .wait_for(|outcome| outcome.is_some())
            .await
            .map_err(|_| SignerError::AuthRoundClosed(self.round))?;

        match &*settled {
            Some(outcome) => outcome.clone(),
            None => Err(SignerError::AuthRoundClosed(self.round)),
        }
    }
}
