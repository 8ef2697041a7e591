//! Single dispatcher for enclave requests
//!
//! Encodes a [`RemoteRequest`], sends it over a [`Channel`] under a bounded
//! timeout, and decodes the reply into the [`RemoteResponse`] variant that
//! matches the request kind. The typed wrappers decode straight into the
//! reply type of their request.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::timeout;
use tracing::debug;

use crate::error::TransportError;
use crate::transport::{Channel, EventOptions};

use super::messages::{
    AuthData, RemoteRequest, RemoteResponse, Reply, RequestKind, SignPayload, StatusPayload,
};

/// Send one request and wait for its terminal response.
pub async fn dispatch(
    channel: &dyn Channel,
    request: RemoteRequest,
    options: &EventOptions,
) -> Result<RemoteResponse, TransportError> {
    let kind = request.kind();
    let raw = send(channel, request, options).await?;

    let response = match kind {
        RequestKind::GetStatus => RemoteResponse::Status(serde_json::from_value(raw)?),
        RequestKind::StartOnboarding => {
            RemoteResponse::StartOnboarding(serde_json::from_value(raw)?)
        }
        RequestKind::CompleteOnboarding => {
            RemoteResponse::CompleteOnboarding(serde_json::from_value(raw)?)
        }
        RequestKind::Sign => RemoteResponse::Sign(serde_json::from_value(raw)?),
    };
    Ok(response)
}

/// Encode, send under the bound, and return the raw reply payload.
async fn send(
    channel: &dyn Channel,
    request: RemoteRequest,
    options: &EventOptions,
) -> Result<Value, TransportError> {
    let kind = request.kind();
    let payload = serde_json::to_value(&request)?;

    debug!(event = kind.request_event(), "Dispatching enclave request");

    match timeout(options.timeout, channel.send_action(kind, payload, options)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            event: kind.request_event().to_string(),
            after: options.timeout,
        }),
    }
}

/// Send `request` and decode the reply as `T`.
async fn call<T: DeserializeOwned>(
    channel: &dyn Channel,
    request: RemoteRequest,
    options: &EventOptions,
) -> Result<T, TransportError> {
    let raw = send(channel, request, options).await?;
    Ok(serde_json::from_value(raw)?)
}

// ============================================================================
// Typed wrappers
// ============================================================================

pub async fn get_status(
    channel: &dyn Channel,
    auth_data: AuthData,
    options: &EventOptions,
) -> Result<Reply<StatusPayload>, TransportError> {
    call(channel, RemoteRequest::get_status(auth_data), options).await
}

pub async fn start_onboarding(
    channel: &dyn Channel,
    auth_data: AuthData,
    auth_id: &str,
    options: &EventOptions,
) -> Result<Reply<StatusPayload>, TransportError> {
    let request = RemoteRequest::start_onboarding(auth_data, auth_id);
    call(channel, request, options).await
}

pub async fn complete_onboarding(
    channel: &dyn Channel,
    auth_data: AuthData,
    encrypted_otp: &str,
    options: &EventOptions,
) -> Result<Reply<StatusPayload>, TransportError> {
    let request = RemoteRequest::complete_onboarding(auth_data, encrypted_otp);
    call(channel, request, options).await
}

pub async fn sign(
    channel: &dyn Channel,
    auth_data: AuthData,
    hex_digest: &str,
    options: &EventOptions,
) -> Result<Reply<SignPayload>, TransportError> {
    call(channel, RemoteRequest::sign(auth_data, hex_digest), options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Channel that answers every request with a fixed value and records the call
    struct FixedChannel {
        answer: Value,
        calls: Mutex<Vec<(RequestKind, Value)>>,
    }

    #[async_trait::async_trait]
    impl Channel for FixedChannel {
        async fn send_action(
            &self,
            kind: RequestKind,
            payload: Value,
            _options: &EventOptions,
        ) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push((kind, payload));
            Ok(self.answer.clone())
        }
    }

    struct SilentChannel;

    #[async_trait::async_trait]
    impl Channel for SilentChannel {
        async fn send_action(
            &self,
            _kind: RequestKind,
            _payload: Value,
            _options: &EventOptions,
        ) -> Result<Value, TransportError> {
            std::future::pending().await
        }
    }

    fn auth() -> AuthData {
        AuthData {
            jwt: "jwt".into(),
            api_key: "ck_development_key".into(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_decodes_matching_variant() {
        let channel = FixedChannel {
            answer: json!({ "status": "success", "signerStatus": "ready" }),
            calls: Mutex::new(Vec::new()),
        };

        let reply = get_status(&channel, auth(), &EventOptions::default())
            .await
            .unwrap();
        assert!(matches!(reply, Reply::Success(ref p) if p.is_ready()));

        let calls = channel.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, RequestKind::GetStatus);
        assert_eq!(calls[0].1["authData"]["jwt"], "jwt");
    }

    #[tokio::test]
    async fn test_dispatch_picks_variant_from_request_kind() {
        let channel = FixedChannel {
            answer: json!({ "status": "error", "error": "no code" }),
            calls: Mutex::new(Vec::new()),
        };

        let response = dispatch(
            &channel,
            RemoteRequest::complete_onboarding(auth(), "123456"),
            &EventOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(response.kind(), RequestKind::CompleteOnboarding);
        match response {
            RemoteResponse::CompleteOnboarding(Reply::Error { error }) => {
                assert_eq!(error.as_deref(), Some("no code"))
            }
            other => panic!("Expected CompleteOnboarding error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_times_out() {
        let options = EventOptions {
            timeout: Duration::from_millis(30),
            interval: Duration::from_millis(10),
        };

        let err = sign(&SilentChannel, auth(), &"00".repeat(32), &options)
            .await
            .unwrap_err();
        match err {
            TransportError::Timeout { event, after } => {
                assert_eq!(event, "request:sign");
                assert_eq!(after, Duration::from_millis(30));
            }
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_rejects_malformed_reply() {
        let channel = FixedChannel {
            answer: json!({ "unexpected": true }),
            calls: Mutex::new(Vec::new()),
        };
        let err = get_status(&channel, auth(), &EventOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Codec(_)));
    }
}
