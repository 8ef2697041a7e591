//! Host UI hook for OTP rounds

use super::challenge::OtpChallenge;
use crate::error::Result;

/// Implemented by the host application to render OTP prompts.
///
/// Invoked with `needs_auth = true` when a round begins, and once more with
/// `needs_auth = false` right after the code was accepted. The `challenge`
/// exposes `send_challenge`, `verify_response` and `cancel` for the round.
/// Returning an error rejects the round with that error.
#[async_trait::async_trait]
pub trait AuthHandler: Send + Sync {
    async fn on_auth_required(&self, needs_auth: bool, challenge: OtpChallenge) -> Result<()>;
}
