//! WebSocket channel to the signing enclave
//!
//! Frames are JSON text messages:
//!
//! ```text
//! -> { "event": "request:sign",  "id": "<uuid>", "data": { ... } }
//! <- { "event": "response:sign", "id": "<uuid>", "data": { "status": "success", ... } }
//! ```
//!
//! The connection is opened with a `handshake:request` / `handshake:complete`
//! exchange. Each call re-sends its frame every `interval` until the response
//! arrives, and gives up after `timeout`. Responses are routed back to callers
//! by id, so concurrent calls on one channel are fine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Channel, ChannelConnector, EventOptions};
use crate::error::TransportError;
use crate::protocol::RequestKind;

pub const HANDSHAKE_REQUEST: &str = "handshake:request";
pub const HANDSHAKE_COMPLETE: &str = "handshake:complete";

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Outstanding calls indexed by frame id
type PendingCalls = Arc<DashMap<String, oneshot::Sender<Frame>>>;

/// One text frame on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

// ============================================================================
// Connector
// ============================================================================

/// Opens [`WebSocketChannel`]s to a fixed URL
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    handshake_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn connect(&self) -> Result<Arc<dyn Channel>, TransportError> {
        let channel = WebSocketChannel::connect(&self.url, self.handshake_timeout).await?;
        Ok(Arc::new(channel))
    }
}

// ============================================================================
// Channel
// ============================================================================

/// An open, handshaken WebSocket channel
pub struct WebSocketChannel {
    /// Outbound text frames, drained by the connection task
    outbound: mpsc::Sender<String>,
    pending: PendingCalls,
    connected: Arc<AtomicBool>,
}

impl WebSocketChannel {
    /// Connect and complete the handshake
    pub async fn connect(url: &str, handshake_timeout: Duration) -> Result<Self, TransportError> {
        info!("Connecting to signer channel at {}", url);

        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (sink, stream) = ws.split();

        let (outbound, rx) = mpsc::channel::<String>(256);
        let pending: PendingCalls = Arc::new(DashMap::new());
        let connected = Arc::new(AtomicBool::new(true));

        let task_pending = Arc::clone(&pending);
        let task_connected = Arc::clone(&connected);
        tokio::spawn(async move {
            handle_messages(sink, stream, rx, Arc::clone(&task_pending)).await;
            task_connected.store(false, Ordering::SeqCst);
            // Dropping the senders fails every outstanding call with Closed
            task_pending.clear();
            info!("Signer channel closed");
        });

        let channel = Self {
            outbound,
            pending,
            connected,
        };
        channel.handshake(handshake_timeout).await?;
        Ok(channel)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn handshake(&self, bound: Duration) -> Result<(), TransportError> {
        // One attempt: the interval equals the bound, so there is no re-send
        self.exchange(HANDSHAKE_REQUEST, HANDSHAKE_COMPLETE, Value::Null, bound, bound)
            .await
            .map_err(|e| match e {
                TransportError::Codec(_) => e,
                other => TransportError::Handshake(other.to_string()),
            })?;

        info!("Signer channel handshake complete");
        Ok(())
    }

    /// Send `request_event` until `response_event` with the same id comes back.
    async fn exchange(
        &self,
        request_event: &str,
        response_event: &str,
        data: Value,
        bound: Duration,
        interval: Duration,
    ) -> Result<Value, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }

        let id = Uuid::new_v4().to_string();
        let text = serde_json::to_string(&Frame {
            event: request_event.to_string(),
            id: Some(id.clone()),
            data,
        })?;

        let (tx, mut rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let result = timeout(bound, self.send_until_answered(&text, interval, &mut rx)).await;
        self.pending.remove(&id);

        let frame = match result {
            Ok(frame) => frame?,
            Err(_) => {
                debug!(event = request_event, id = %id, "No response before deadline");
                return Err(TransportError::Timeout {
                    event: request_event.to_string(),
                    after: bound,
                });
            }
        };

        if frame.event != response_event {
            return Err(TransportError::UnexpectedEvent {
                expected: response_event.to_string(),
                actual: frame.event,
            });
        }

        Ok(frame.data)
    }

    async fn send_until_answered(
        &self,
        text: &str,
        interval: Duration,
        rx: &mut oneshot::Receiver<Frame>,
    ) -> Result<Frame, TransportError> {
        self.send_text(text).await?;

        if interval.is_zero() {
            return (&mut *rx).await.map_err(|_| TransportError::Closed);
        }

        let mut ticker = interval_at(Instant::now() + interval, interval);
        loop {
            tokio::select! {
                frame = &mut *rx => {
                    return frame.map_err(|_| TransportError::Closed);
                }
                _ = ticker.tick() => {
                    debug!("No response yet, re-sending frame");
                    self.send_text(text).await?;
                }
            }
        }
    }

    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.outbound
            .send(text.to_string())
            .await
            .map_err(|_| TransportError::Closed)
    }
}

#[async_trait::async_trait]
impl Channel for WebSocketChannel {
    async fn send_action(
        &self,
        kind: RequestKind,
        payload: Value,
        options: &EventOptions,
    ) -> Result<Value, TransportError> {
        self.exchange(
            kind.request_event(),
            kind.response_event(),
            payload,
            options.timeout,
            options.interval,
        )
        .await
    }

    fn is_connected(&self) -> bool {
        WebSocketChannel::is_connected(self)
    }
}

// ============================================================================
// Connection task
// ============================================================================

/// Pump outbound frames into the socket and route inbound frames by id.
async fn handle_messages(
    sink: WsSink,
    mut stream: WsStream,
    mut rx: mpsc::Receiver<String>,
    pending: PendingCalls,
) {
    let sink = Arc::new(Mutex::new(sink));
    let sink_for_requests = Arc::clone(&sink);

    let request_handler = async {
        while let Some(text) = rx.recv().await {
            let mut sink = sink_for_requests.lock().await;
            if let Err(e) = sink.send(Message::Text(text)).await {
                error!("Failed to send to signer channel: {}", e);
                break;
            }
        }
        // Channel handle dropped: close politely
        let _ = sink_for_requests.lock().await.close().await;
    };

    let response_handler = async {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => route_frame(&pending, &text),
                Ok(Message::Ping(data)) => {
                    let mut sink = sink.lock().await;
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Ok(Message::Close(frame)) => {
                    info!("Signer channel closed by remote: {:?}", frame);
                    break;
                }
                Err(e) => {
                    warn!("Signer channel error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = request_handler => {
            debug!("Request handler ended");
        }
        _ = response_handler => {
            debug!("Response handler ended");
        }
    }
}

fn route_frame(pending: &PendingCalls, text: &str) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Dropping malformed frame from signer channel: {}", e);
            return;
        }
    };

    let Some(id) = frame.id.clone() else {
        debug!(event = %frame.event, "Ignoring frame without id");
        return;
    };

    match pending.remove(&id) {
        Some((_, tx)) => {
            let _ = tx.send(frame);
        }
        // Late answer to a re-sent frame
        None => debug!(event = %frame.event, id = %id, "No caller waiting for frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_frame_delivers_by_id() {
        let pending: PendingCalls = Arc::new(DashMap::new());
        let (tx, mut rx) = oneshot::channel();
        pending.insert("abc".into(), tx);

        route_frame(
            &pending,
            r#"{"event":"response:get-status","id":"abc","data":{"status":"success"}}"#,
        );

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.event, "response:get-status");
        assert_eq!(frame.data, json!({ "status": "success" }));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_route_frame_ignores_unknown_and_malformed() {
        let pending: PendingCalls = Arc::new(DashMap::new());
        let (tx, mut rx) = oneshot::channel();
        pending.insert("abc".into(), tx);

        route_frame(&pending, "not json");
        route_frame(&pending, r#"{"event":"response:sign","id":"other"}"#);
        route_frame(&pending, r#"{"event":"response:sign"}"#);

        assert!(rx.try_recv().is_err());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_frame_omits_missing_id() {
        let frame = Frame {
            event: HANDSHAKE_COMPLETE.into(),
            id: None,
            data: Value::Null,
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, json!({ "event": "handshake:complete", "data": null }));
    }
}
