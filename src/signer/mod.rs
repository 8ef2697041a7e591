//! Non-custodial signer
//!
//! Signs 32-byte digests with a key that never leaves the enclave. Every
//! signature is gated by [`NonCustodialSigner::ensure_authenticated`], which
//! runs at most one OTP round per session no matter how many callers wait.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::{AuthHandler, OtpChallenge};
use crate::digest::validate_digest;
use crate::error::{Result, SignerError};
use crate::protocol::{dispatch, Reply, SignPayload, SIGNER_KEY_TYPE};
use crate::public_key::{PublicKey, PublicKeyService};
use crate::session::SignerSession;

const STATUS_FAILED: &str = "Failed to get signer status";
const SIGN_FAILED: &str = "Failed to sign message";
const NO_SIGNATURE: &str = "no signature returned";

/// Signature exactly as produced by the enclave
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResponse {
    pub signature: String,
}

pub struct NonCustodialSigner {
    session: Arc<SignerSession>,
    handler: Arc<dyn AuthHandler>,
    public_keys: Arc<dyn PublicKeyService>,
}

impl NonCustodialSigner {
    pub fn new(
        session: Arc<SignerSession>,
        handler: Arc<dyn AuthHandler>,
        public_keys: Arc<dyn PublicKeyService>,
    ) -> Self {
        Self {
            session,
            handler,
            public_keys,
        }
    }

    pub fn session(&self) -> &Arc<SignerSession> {
        &self.session
    }

    pub fn needs_auth(&self) -> bool {
        self.session.auth().needs_auth()
    }

    /// Observe `needs_auth` transitions
    pub fn subscribe_needs_auth(&self) -> watch::Receiver<bool> {
        self.session.auth().subscribe()
    }

    /// Return once the enclave reports the session ready to sign.
    ///
    /// Callers arriving while a round is outstanding wait on that round
    /// instead of starting another.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        let auth = self.session.auth();
        let mut slot = auth.lock_round().await;

        let outstanding = slot.as_ref().filter(|p| !p.is_settled()).cloned();
        if let Some(pending) = outstanding {
            drop(slot);
            debug!(round = pending.round(), "Joining outstanding OTP round");
            return pending.wait().await;
        }

        let channel = self
            .session
            .channel()
            .await
            .map_err(SignerError::from_auth_transport)?;

        let reply = dispatch::get_status(
            channel.as_ref(),
            self.session.auth_data(),
            self.session.options(),
        )
        .await
        .map_err(SignerError::from_auth_transport)?;

        match reply {
            Reply::Success(status) if status.is_ready() => {
                auth.set_needs_auth(false);
                debug!(address = %self.session.address(), "Signer ready");
                return Ok(());
            }
            Reply::Success(status) => {
                debug!(status = ?status.signer_status, "Signer requires OTP");
            }
            Reply::Error { error } => {
                let message = error.unwrap_or_else(|| STATUS_FAILED.to_string());
                warn!("Signer status check failed: {}", message);
                return Err(SignerError::AuthTransport(message));
            }
        }

        auth.set_needs_auth(true);
        let pending = auth.begin_round(&mut slot);
        drop(slot);

        let challenge = OtpChallenge::new(
            Arc::clone(&self.session),
            pending.clone(),
            Arc::clone(&self.handler),
        );
        let handler = Arc::clone(&self.handler);
        let round = pending.clone();
        // Detached so a dropped caller cannot strand the other waiters
        tokio::spawn(async move {
            if let Err(e) = handler.on_auth_required(true, challenge).await {
                warn!(round = round.round(), "Auth handler failed: {}", e);
                round.reject(e);
            }
        });

        pending.wait().await
    }

    /// Sign a 32-byte digest given as 64 hex characters.
    pub async fn sign_raw(&self, hex_digest: &str) -> Result<SignatureResponse> {
        validate_digest(hex_digest)?;
        let auth_data = self.session.credentials().signing_auth_data()?;

        self.ensure_authenticated().await?;

        let channel = self
            .session
            .channel()
            .await
            .map_err(SignerError::from_sign_transport)?;

        let reply = dispatch::sign(
            channel.as_ref(),
            auth_data,
            hex_digest,
            self.session.options(),
        )
        .await
        .map_err(SignerError::from_sign_transport)?;

        match reply {
            Reply::Success(SignPayload {
                signature: Some(signature),
            }) => {
                info!(address = %self.session.address(), "Digest signed");
                Ok(SignatureResponse {
                    signature: signature.bytes,
                })
            }
            Reply::Success(_) => Err(SignerError::SigningFailed(NO_SIGNATURE.to_string())),
            Reply::Error { error } => {
                let message = error.unwrap_or_else(|| SIGN_FAILED.to_string());
                warn!("Signing failed: {}", message);
                Err(SignerError::SigningFailed(message))
            }
        }
    }

    pub async fn derive_public_key(&self) -> Result<PublicKey> {
        self.public_keys
            .derive_public_key(
                self.session.credentials(),
                &self.session.identity().auth_id(),
                SIGNER_KEY_TYPE,
            )
            .await
    }
}

impl std::fmt::Debug for NonCustodialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonCustodialSigner")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
