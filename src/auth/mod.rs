//! OTP-gated authentication
//!
//! - [`AuthState`]: the `needs_auth` flag and the single in-flight round
//! - [`PendingAuth`]: settle-once outcome shared by all waiters of a round
//! - [`OtpChallenge`]: send / verify / cancel for one round
//! - [`AuthHandler`]: host UI hook

pub mod challenge;
pub mod handler;
pub mod pending;
pub mod state;

pub use challenge::{ChallengeOutcome, OtpChallenge};
pub use handler::AuthHandler;
pub use pending::PendingAuth;
pub use state::AuthState;
