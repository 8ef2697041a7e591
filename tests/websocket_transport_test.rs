//! WebSocket channel integration tests
//!
//! Runs a local tokio-tungstenite server that plays the enclave side of the
//! frame protocol.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use enclave_signer::protocol::dispatch;
use enclave_signer::protocol::AuthData;
use enclave_signer::{
    ApiKey, AuthHandler, ChannelConnector, Credentials, EventOptions, KeyType, OtpChallenge,
    PublicKey, PublicKeyService, Reply, SessionBootstrap, SignerError, TransportError,
    WalletHandle, WebSocketConnector,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};

// =============================================================================
// Test server
// =============================================================================

#[derive(Clone, Copy)]
enum Mode {
    /// Complete the handshake and answer every request
    Answer,
    /// Complete the handshake, then stay silent
    Ignore,
    /// Never complete the handshake
    SkipHandshake,
    /// Complete the handshake, then close on the first request
    CloseOnRequest,
    /// Answer the first request, then close the connection
    CloseAfterReply,
}

struct TestServer {
    url: String,
    received: Arc<Mutex<Vec<Value>>>,
    accepted: Arc<AtomicUsize>,
}

impl TestServer {
    fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    fn frames(&self, event: &str) -> Vec<Value> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f["event"] == event)
            .cloned()
            .collect()
    }
}

async fn spawn_server(mode: Mode) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let received = Arc::new(Mutex::new(Vec::new()));
    let accepted = Arc::new(AtomicUsize::new(0));
    let log = Arc::clone(&received);
    let count = Arc::clone(&accepted);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            count.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_connection(stream, mode, Arc::clone(&log)));
        }
    });

    TestServer {
        url,
        received,
        accepted,
    }
}

async fn serve_connection(stream: TcpStream, mode: Mode, log: Arc<Mutex<Vec<Value>>>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    while let Some(Ok(msg)) = ws.next().await {
        let Message::Text(text) = msg else { continue };
        let frame: Value = serde_json::from_str(&text).unwrap();
        log.lock().unwrap().push(frame.clone());

        let event = frame["event"].as_str().unwrap_or_default().to_string();
        let id = frame["id"].clone();

        let reply = match (event.as_str(), mode) {
            ("handshake:request", Mode::SkipHandshake) => None,
            ("handshake:request", _) => {
                Some(json!({ "event": "handshake:complete", "id": id, "data": null }))
            }
            (_, Mode::CloseOnRequest) => {
                let _ = ws.close(None).await;
                break;
            }
            (request, Mode::Answer | Mode::CloseAfterReply) => Some(answer(request, id)),
            _ => None,
        };

        if let Some(reply) = reply {
            if ws.send(Message::Text(reply.to_string())).await.is_err() {
                break;
            }
            if matches!(mode, Mode::CloseAfterReply) && event != "handshake:request" {
                let _ = ws.close(None).await;
                break;
            }
        }
    }
}

fn answer(request: &str, id: Value) -> Value {
    match request {
        "request:get-status" => json!({
            "event": "response:get-status",
            "id": id,
            "data": { "status": "success", "signerStatus": "ready" }
        }),
        "request:sign" => json!({
            "event": "response:sign",
            "id": id,
            "data": {
                "status": "success",
                "signature": { "bytes": "ws-signature", "encoding": "hex" }
            }
        }),
        other => json!({
            "event": other.replace("request:", "response:"),
            "id": id,
            "data": { "status": "error", "error": "unsupported" }
        }),
    }
}

fn auth() -> AuthData {
    AuthData {
        jwt: "jwt-token".into(),
        api_key: "ck_development_key".into(),
    }
}

// =============================================================================
// Channel behavior
// =============================================================================

#[tokio::test]
async fn test_handshake_then_request_response() {
    let server = spawn_server(Mode::Answer).await;
    let channel = WebSocketConnector::new(&server.url).connect().await.unwrap();

    let reply = dispatch::get_status(channel.as_ref(), auth(), &EventOptions::default())
        .await
        .unwrap();
    assert!(matches!(reply, Reply::Success(ref status) if status.is_ready()));

    assert_eq!(server.frames("handshake:request").len(), 1);
    let requests = server.frames("request:get-status");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["data"]["authData"]["jwt"], "jwt-token");
    assert!(requests[0]["id"].is_string());
}

#[tokio::test]
async fn test_unanswered_request_is_resent_then_times_out() {
    let server = spawn_server(Mode::Ignore).await;
    let channel = WebSocketConnector::new(&server.url).connect().await.unwrap();

    let options = EventOptions::from_millis(250, 60);
    let err = dispatch::get_status(channel.as_ref(), auth(), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout { .. }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let sent = server.frames("request:get-status");
    assert!(sent.len() >= 2, "expected re-sends, got {}", sent.len());
    // Re-sends reuse the frame id
    assert!(sent.iter().all(|f| f["id"] == sent[0]["id"]));
}

#[tokio::test]
async fn test_handshake_timeout() {
    let server = spawn_server(Mode::SkipHandshake).await;

    let result = WebSocketConnector::new(&server.url)
        .with_handshake_timeout(Duration::from_millis(100))
        .connect()
        .await;
    assert!(matches!(result, Err(TransportError::Handshake(_))));
}

#[tokio::test]
async fn test_remote_close_fails_outstanding_call() {
    let server = spawn_server(Mode::CloseOnRequest).await;
    let channel = WebSocketConnector::new(&server.url).connect().await.unwrap();

    let err = dispatch::get_status(channel.as_ref(), auth(), &EventOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Closed));
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = WebSocketConnector::new(url).connect().await;
    assert!(matches!(result, Err(TransportError::Connect(_))));
}

// =============================================================================
// End to end
// =============================================================================

struct NoPrompt;

#[async_trait::async_trait]
impl AuthHandler for NoPrompt {
    async fn on_auth_required(
        &self,
        _needs_auth: bool,
        challenge: OtpChallenge,
    ) -> enclave_signer::Result<()> {
        challenge.cancel();
        Ok(())
    }
}

struct NoKeys;

#[async_trait::async_trait]
impl PublicKeyService for NoKeys {
    async fn derive_public_key(
        &self,
        _credentials: &Credentials,
        _auth_id: &str,
        _key_type: KeyType,
    ) -> enclave_signer::Result<PublicKey> {
        Err(SignerError::PublicKeyDerivationFailed("not used".into()))
    }
}

#[tokio::test]
async fn test_sign_raw_over_websocket() {
    let server = spawn_server(Mode::Answer).await;
    let bootstrap = SessionBootstrap::new(
        Arc::new(WebSocketConnector::new(&server.url)),
        Arc::new(NoPrompt),
        Arc::new(NoKeys),
        EventOptions::default(),
    );
    let wallet = WalletHandle::new("0x01", "flow-testnet", "email:alice@example.com");
    let credentials = Credentials::new(
        ApiKey::parse("ck_development_key").unwrap(),
        Some("jwt-token".into()),
    );
    let signer = bootstrap.signer(&wallet, credentials).unwrap();

    let digest = enclave_signer::hash_message(b"Hello Flow");
    let response = signer.sign_raw(&digest).await.unwrap();
    assert_eq!(response.signature, "ws-signature");

    let signs = server.frames("request:sign");
    assert_eq!(signs.len(), 1);
    assert_eq!(signs[0]["data"]["data"]["bytes"], digest.as_str());
    assert_eq!(server.frames("handshake:request").len(), 1);
}

#[tokio::test]
async fn test_session_reconnects_after_remote_close() {
    let server = spawn_server(Mode::CloseAfterReply).await;
    let bootstrap = SessionBootstrap::new(
        Arc::new(WebSocketConnector::new(&server.url)),
        Arc::new(NoPrompt),
        Arc::new(NoKeys),
        EventOptions::default(),
    );
    let wallet = WalletHandle::new("0x01", "flow-testnet", "email:alice@example.com");
    let credentials = Credentials::new(
        ApiKey::parse("ck_development_key").unwrap(),
        Some("jwt-token".into()),
    );

    let signer = bootstrap.signer(&wallet, credentials.clone()).unwrap();
    signer.ensure_authenticated().await.unwrap();
    assert_eq!(server.connections(), 1);

    // Wait for the close to reach the connection task
    for _ in 0..100 {
        if !signer.session().is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!signer.session().is_connected());

    // Same memoized session, fresh channel
    let again = bootstrap.signer(&wallet, credentials).unwrap();
    assert!(Arc::ptr_eq(&signer, &again));
    again.ensure_authenticated().await.unwrap();
    assert_eq!(server.connections(), 2);
    assert!(again.session().is_connected());
    assert_eq!(server.frames("handshake:request").len(), 2);
    assert_eq!(server.frames("request:get-status").len(), 2);
}
