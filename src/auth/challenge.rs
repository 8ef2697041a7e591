//! OTP challenge capability handed to the host UI
//!
//! One [`OtpChallenge`] is bound to one authentication round. It relays the
//! start/complete onboarding requests and settles the round's
//! [`PendingAuth`] according to the outcome.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::handler::AuthHandler;
use super::pending::PendingAuth;
use crate::error::{Result, SignerError};
use crate::protocol::dispatch;
use crate::protocol::Reply;
use crate::session::SignerSession;

const SEND_CHALLENGE_FAILED: &str = "Failed to initiate OTP process.";
const VERIFY_FAILED: &str = "Failed to validate encrypted OTP";

/// Result of asking the enclave to send a code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// A code is on its way; call `verify_response` with it
    CodeSent,
    /// The enclave re-validated the session silently; the round is resolved
    AlreadyReady,
    /// The enclave refused; the round is rejected with this message
    Failed(String),
}

#[derive(Clone)]
pub struct OtpChallenge {
    session: Arc<SignerSession>,
    pending: PendingAuth,
    handler: Arc<dyn AuthHandler>,
}

impl std::fmt::Debug for OtpChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpChallenge")
            .field("round", &self.pending.round())
            .field("settled", &self.pending.is_settled())
            .finish()
    }
}

impl OtpChallenge {
    pub(crate) fn new(
        session: Arc<SignerSession>,
        pending: PendingAuth,
        handler: Arc<dyn AuthHandler>,
    ) -> Self {
        Self {
            session,
            pending,
            handler,
        }
    }

    pub fn round(&self) -> u64 {
        self.pending.round()
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_settled()
    }

    pub fn needs_auth(&self) -> bool {
        self.session.auth().needs_auth()
    }

    pub fn subscribe_needs_auth(&self) -> watch::Receiver<bool> {
        self.session.auth().subscribe()
    }

    /// Ask the enclave to send a one-time code to the session's identity.
    ///
    /// A remote refusal rejects the round and is reported as
    /// [`ChallengeOutcome::Failed`]; transport failures reject the round and
    /// are also returned as errors.
    pub async fn send_challenge(&self) -> Result<ChallengeOutcome> {
        self.ensure_open()?;

        let identity = self.session.identity();
        info!(round = self.round(), kind = %identity.kind(), "Sending OTP challenge");

        let channel = self
            .session
            .channel()
            .await
            .map_err(|e| self.fail(SignerError::from_auth_transport(e)))?;

        let reply = dispatch::start_onboarding(
            channel.as_ref(),
            self.session.auth_data(),
            &identity.auth_id(),
            self.session.options(),
        )
        .await
        .map_err(|e| self.fail(SignerError::from_auth_transport(e)))?;

        match reply {
            Reply::Success(status) if status.is_ready() => {
                info!(round = self.round(), "Session re-validated without a code");
                self.session.auth().set_needs_auth(false);
                self.pending.resolve();
                Ok(ChallengeOutcome::AlreadyReady)
            }
            Reply::Success(_) => Ok(ChallengeOutcome::CodeSent),
            Reply::Error { error } => {
                let message = error.unwrap_or_else(|| SEND_CHALLENGE_FAILED.to_string());
                warn!(round = self.round(), "Failed to send OTP: {}", message);
                self.pending.reject(SignerError::AuthTransport(message.clone()));
                Ok(ChallengeOutcome::Failed(message))
            }
        }
    }

    /// Submit the code the user entered.
    ///
    /// On success the handler is notified with `needs_auth = false` before
    /// the round resolves. On failure `needs_auth` stays true and the round
    /// is rejected with the remote's message.
    pub async fn verify_response(&self, code: &str) -> Result<()> {
        self.ensure_open()?;

        info!(round = self.round(), "Verifying OTP response");

        let result = async {
            let channel = self.session.channel().await?;
            dispatch::complete_onboarding(
                channel.as_ref(),
                self.session.auth_data(),
                code,
                self.session.options(),
            )
            .await
        }
        .await;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                self.session.auth().set_needs_auth(true);
                return Err(self.fail(SignerError::from_auth_transport(e)));
            }
        };

        match reply {
            Reply::Success(_) => {
                self.session.auth().set_needs_auth(false);
                if let Err(e) = self.handler.on_auth_required(false, self.clone()).await {
                    warn!(round = self.round(), "Auth handler failed after verification: {}", e);
                }
                self.pending.resolve();
                info!(round = self.round(), "OTP round completed");
                Ok(())
            }
            Reply::Error { error } => {
                let message = error.unwrap_or_else(|| VERIFY_FAILED.to_string());
                warn!(round = self.round(), "Failed to validate OTP: {}", message);
                self.session.auth().set_needs_auth(true);
                Err(self.fail(SignerError::AuthTransport(message)))
            }
        }
    }

    /// Abandon the round. Every waiter fails with `AuthRejected`.
    ///
    /// Returns false if the round had already settled.
    pub fn cancel(&self) -> bool {
        let cancelled = self.pending.reject(SignerError::AuthRejected);
        if cancelled {
            info!(round = self.round(), "OTP round cancelled by host");
        }
        cancelled
    }

    fn ensure_open(&self) -> Result<()> {
        if self.pending.is_settled() {
            return Err(SignerError::AuthRoundClosed(self.round()));
        }
        Ok(())
    }

    /// Reject the round with `err` and hand it back for the caller.
    fn fail(&self, err: SignerError) -> SignerError {
        self.pending.reject(err.clone());
        err
    }
}
