//! Enclave Signer - non-custodial remote signing client
//!
//! Produces signatures over caller-supplied 32-byte digests without ever
//! holding the private key. The key lives inside a remote enclave; this crate
//! establishes a session with it, drives one-time-passcode re-authentication
//! when the enclave asks for it, and forwards signing requests once the
//! session is ready.
//!
//! # Flow
//!
//! ```text
//! SessionBootstrap::signer(wallet, credentials)
//!   -> NonCustodialSigner::sign_raw(digest)
//!        validate digest (no network)
//!        ensure_authenticated()
//!          get-status == ready ? done
//!          : one OTP round, shared by every concurrent caller
//!              AuthHandler::on_auth_required(true, challenge)
//!                challenge.send_challenge()       -> start-onboarding
//!                challenge.verify_response(code)  -> complete-onboarding
//!        sign
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use enclave_signer::{
//!     ApiKey, Credentials, EventOptions, HttpPublicKeyService, SessionBootstrap,
//!     WalletHandle, WebSocketConnector,
//! };
//!
//! let bootstrap = SessionBootstrap::new(
//!     Arc::new(WebSocketConnector::new("wss://signer.example.com")),
//!     Arc::new(MyOtpPrompt),
//!     Arc::new(HttpPublicKeyService::new("https://api.example.com")),
//!     EventOptions::default(),
//! );
//!
//! let wallet = WalletHandle::new("0x01cf0e2f2f715450", "flow-testnet", "email:alice@example.com");
//! let credentials = Credentials::new(ApiKey::parse("ck_staging_...")?, Some(jwt));
//! let signer = bootstrap.signer(&wallet, credentials)?;
//!
//! let digest = enclave_signer::hash_message(b"Hello Flow");
//! let signature = signer.sign_raw(&digest).await?.signature;
//! ```

// Error types
pub mod error;

// CLI configuration
pub mod config;

// Digest validation and message hashing
pub mod digest;

// Enclave request/response protocol
pub mod protocol;

// Channel traits and WebSocket transport
pub mod transport;

// OTP authentication rounds
pub mod auth;

// Sessions and bootstrap
pub mod session;

// Raw signing
pub mod signer;

// Public key derivation
pub mod public_key;

// Re-export main types
pub use auth::{AuthHandler, AuthState, ChallengeOutcome, OtpChallenge, PendingAuth};
pub use digest::{hash_message, validate_digest, DIGEST_HEX_LEN};
pub use error::{Result, SignerError, TransportError};
pub use protocol::{KeyType, RemoteRequest, RemoteResponse, Reply, RequestKind};
pub use public_key::{HttpPublicKeyService, PublicKey, PublicKeyService};
pub use session::{
    ApiKey, Credentials, IdentityKind, SessionBootstrap, SignerLocator, SignerSession,
    WalletHandle,
};
pub use signer::{NonCustodialSigner, SignatureResponse};
pub use transport::{Channel, ChannelConnector, EventOptions, WebSocketChannel, WebSocketConnector};
