//! Request and response shapes exchanged with the signing enclave
//!
//! Every request carries an `authData` envelope and, depending on the kind,
//! a `data` payload. Every response is tagged by `status`.

use serde::{Deserialize, Serialize};

/// Key scheme used by the remote key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Secp256k1,
    Ed25519,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Secp256k1 => "secp256k1",
            KeyType::Ed25519 => "ed25519",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The key scheme this signer always requests
pub const SIGNER_KEY_TYPE: KeyType = KeyType::Secp256k1;

/// Encoding of the digest bytes sent to the enclave
pub const DIGEST_ENCODING: &str = "hex";

// ============================================================================
// Request kinds
// ============================================================================

/// The closed set of operations the enclave understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    GetStatus,
    StartOnboarding,
    CompleteOnboarding,
    Sign,
}

impl RequestKind {
    /// Event name used on the wire for the request
    pub fn request_event(&self) -> &'static str {
        match self {
            RequestKind::GetStatus => "request:get-status",
            RequestKind::StartOnboarding => "request:start-onboarding",
            RequestKind::CompleteOnboarding => "request:complete-onboarding",
            RequestKind::Sign => "request:sign",
        }
    }

    /// Event name the enclave answers with
    pub fn response_event(&self) -> &'static str {
        match self {
            RequestKind::GetStatus => "response:get-status",
            RequestKind::StartOnboarding => "response:start-onboarding",
            RequestKind::CompleteOnboarding => "response:complete-onboarding",
            RequestKind::Sign => "response:sign",
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Credentials envelope attached to every request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub jwt: String,
    pub api_key: String,
}

impl std::fmt::Debug for AuthData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthData")
            .field("jwt", &"<redacted>")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStatusRequest {
    pub auth_data: AuthData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOnboardingRequest {
    pub auth_data: AuthData,
    pub data: StartOnboardingData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOnboardingData {
    /// `email:<value>` or `phone:<value>`
    pub auth_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOnboardingRequest {
    pub auth_data: AuthData,
    pub data: CompleteOnboardingData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOnboardingData {
    pub onboarding_authentication: OnboardingAuthentication,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingAuthentication {
    pub encrypted_otp: String,
}

impl std::fmt::Debug for OnboardingAuthentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnboardingAuthentication")
            .field("encrypted_otp", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    pub auth_data: AuthData,
    pub data: SignData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignData {
    pub key_type: KeyType,
    /// Hex digest, exactly 32 bytes
    pub bytes: String,
    pub encoding: String,
}

/// A request to the enclave
///
/// Serialized untagged: the wire payload is the inner struct, the event name
/// comes from [`RemoteRequest::kind`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RemoteRequest {
    GetStatus(GetStatusRequest),
    StartOnboarding(StartOnboardingRequest),
    CompleteOnboarding(CompleteOnboardingRequest),
    Sign(SignRequest),
}

impl RemoteRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            RemoteRequest::GetStatus(_) => RequestKind::GetStatus,
            RemoteRequest::StartOnboarding(_) => RequestKind::StartOnboarding,
            RemoteRequest::CompleteOnboarding(_) => RequestKind::CompleteOnboarding,
            RemoteRequest::Sign(_) => RequestKind::Sign,
        }
    }

    pub fn get_status(auth_data: AuthData) -> Self {
        RemoteRequest::GetStatus(GetStatusRequest { auth_data })
    }

    pub fn start_onboarding(auth_data: AuthData, auth_id: impl Into<String>) -> Self {
        RemoteRequest::StartOnboarding(StartOnboardingRequest {
            auth_data,
            data: StartOnboardingData {
                auth_id: auth_id.into(),
            },
        })
    }

    pub fn complete_onboarding(auth_data: AuthData, encrypted_otp: impl Into<String>) -> Self {
        RemoteRequest::CompleteOnboarding(CompleteOnboardingRequest {
            auth_data,
            data: CompleteOnboardingData {
                onboarding_authentication: OnboardingAuthentication {
                    encrypted_otp: encrypted_otp.into(),
                },
            },
        })
    }

    pub fn sign(auth_data: AuthData, hex_digest: impl Into<String>) -> Self {
        RemoteRequest::Sign(SignRequest {
            auth_data,
            data: SignData {
                key_type: SIGNER_KEY_TYPE,
                bytes: hex_digest.into(),
                encoding: DIGEST_ENCODING.to_string(),
            },
        })
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Terminal outcome of one request, tagged by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply<T> {
    Success(T),
    Error {
        #[serde(default)]
        error: Option<String>,
    },
}

/// Session state as reported by the enclave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignerStatus {
    Ready,
    NewDevice,
    #[serde(other)]
    Unknown,
}

/// Payload of `get-status`, `start-onboarding` and `complete-onboarding`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_status: Option<SignerStatus>,
}

impl StatusPayload {
    pub fn is_ready(&self) -> bool {
        self.signer_status == Some(SignerStatus::Ready)
    }
}

/// Payload of `sign`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureBytes>,
}

/// Signature exactly as the enclave produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBytes {
    pub bytes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// A decoded response, one variant per [`RequestKind`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteResponse {
    Status(Reply<StatusPayload>),
    StartOnboarding(Reply<StatusPayload>),
    CompleteOnboarding(Reply<StatusPayload>),
    Sign(Reply<SignPayload>),
}

impl RemoteResponse {
    pub fn kind(&self) -> RequestKind {
        match self {
            RemoteResponse::Status(_) => RequestKind::GetStatus,
            RemoteResponse::StartOnboarding(_) => RequestKind::StartOnboarding,
            RemoteResponse::CompleteOnboarding(_) => RequestKind::CompleteOnboarding,
            RemoteResponse::Sign(_) => RequestKind::Sign,
        }
    }
}
