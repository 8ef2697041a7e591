//! Public key derivation
//!
//! Read-only identity query: no OTP gate, no channel. The key is derived
//! server-side from the signer locator.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SignerError};
use crate::protocol::KeyType;
use crate::session::Credentials;

pub const DERIVE_PUBLIC_KEY_PATH: &str = "api/v1/signers/derive-public-key";

/// Public key as returned by the key service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub bytes: String,
    pub encoding: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivePublicKeyRequest {
    pub auth_id: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivePublicKeyResponse {
    pub public_key: PublicKey,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Key derivation backend (allows mocking in tests)
#[async_trait::async_trait]
pub trait PublicKeyService: Send + Sync {
    async fn derive_public_key(
        &self,
        credentials: &Credentials,
        auth_id: &str,
        key_type: KeyType,
    ) -> Result<PublicKey>;
}

/// HTTP client for the key derivation endpoint
pub struct HttpPublicKeyService {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpPublicKeyService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent("enclave-signer/0.1")
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into(),
            http_client,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            DERIVE_PUBLIC_KEY_PATH
        )
    }
}

#[async_trait::async_trait]
impl PublicKeyService for HttpPublicKeyService {
    async fn derive_public_key(
        &self,
        credentials: &Credentials,
        auth_id: &str,
        key_type: KeyType,
    ) -> Result<PublicKey> {
        let url = self.endpoint();
        debug!(url = %url, key_type = %key_type, "Deriving public key");

        let mut request = self
            .http_client
            .post(&url)
            .header("X-API-KEY", credentials.api_key().as_str())
            .json(&DerivePublicKeyRequest {
                auth_id: auth_id.to_string(),
                key_type,
            });
        if let Some(jwt) = credentials.jwt() {
            request = request.bearer_auth(jwt);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SignerError::PublicKeyDerivationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            warn!(status = %status, "Public key derivation failed: {}", message);
            return Err(SignerError::PublicKeyDerivationFailed(message));
        }

        let body: DerivePublicKeyResponse = response
            .json()
            .await
            .map_err(|e| SignerError::PublicKeyDerivationFailed(e.to_string()))?;

        Ok(body.public_key)
    }
}
