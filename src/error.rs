//! Error types for the enclave signer

use std::time::Duration;

use thiserror::Error;

/// Result type for signer operations
pub type Result<T> = std::result::Result<T, SignerError>;

/// Signer error types
///
/// Payloads are plain strings so a single outcome can be cloned out to every
/// caller waiting on the same authentication round.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// Signer locator is not `email:<value>` or `phone:<value>`
    #[error("Invalid signer locator: {0}")]
    InvalidLocator(String),

    /// API key does not have the `<scope>_<environment>_<secret>` shape
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    /// Signing requires an identity token (JWT) and none was supplied
    #[error("JWT is required")]
    MissingIdentityToken,

    /// The host UI cancelled the OTP round
    #[error("Authentication was rejected by the user")]
    AuthRejected,

    /// A transport call exceeded its bound during an auth step
    #[error("Authentication timed out: {0}")]
    AuthTimeout(String),

    /// The remote boundary (or the channel) failed during status/OTP exchange
    #[error("{0}")]
    AuthTransport(String),

    /// The challenge handle belongs to a round that has already settled
    #[error("Authentication round {0} has already settled")]
    AuthRoundClosed(u64),

    /// Digest is not exactly 64 characters long
    #[error(
        "signRaw expects exactly 64 hex characters (32 bytes), got {0} characters. \
         Hash the message to 32 bytes before calling signRaw."
    )]
    InvalidDigestLength(usize),

    /// Digest contains characters outside `[0-9a-fA-F]`
    #[error("Digest must be hex-encoded without a 0x prefix")]
    InvalidDigestEncoding,

    /// The remote sign request failed or returned no signature
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The remote sign request exceeded its bound
    #[error("Signing timed out: {0}")]
    SigningTimeout(String),

    /// Public key derivation returned a non-success response
    #[error("Public key derivation failed: {0}")]
    PublicKeyDerivationFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SignerError {
    /// Map a transport failure that happened during status or OTP exchange.
    pub(crate) fn from_auth_transport(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { .. } => SignerError::AuthTimeout(err.to_string()),
            other => SignerError::AuthTransport(other.to_string()),
        }
    }

    /// Map a transport failure that happened while signing.
    pub(crate) fn from_sign_transport(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { .. } => SignerError::SigningTimeout(err.to_string()),
            other => SignerError::SigningFailed(other.to_string()),
        }
    }

    /// Whether the caller may retry by invoking the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SignerError::AuthTimeout(_)
                | SignerError::AuthTransport(_)
                | SignerError::AuthRoundClosed(_)
                | SignerError::SigningFailed(_)
                | SignerError::SigningTimeout(_)
        )
    }
}

/// Channel transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// No response arrived within the configured bound
    #[error("{event} timed out after {after:?}")]
    Timeout { event: String, after: Duration },

    /// Could not open the channel
    #[error("Connect failed: {0}")]
    Connect(String),

    /// The handshake with the remote boundary did not complete
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The channel closed while a call was outstanding
    #[error("Channel closed")]
    Closed,

    /// A response arrived under a different event name than expected
    #[error("Unexpected event: expected {expected}, got {actual}")]
    UnexpectedEvent { expected: String, actual: String },

    /// Payload could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
