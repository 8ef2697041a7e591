//! Channel transport to the signing enclave
//!
//! A [`Channel`] sends a named event with a JSON payload and returns the
//! payload of the matching response event. A [`ChannelConnector`] opens one,
//! including whatever handshake the remote side requires.

pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::TransportError;
use crate::protocol::RequestKind;

pub use websocket::{WebSocketChannel, WebSocketConnector};

/// Per-request bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOptions {
    /// Overall bound on one request/response exchange
    pub timeout: Duration,
    /// Re-send cadence while no response has arrived
    pub interval: Duration,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            interval: Duration::from_secs(5),
        }
    }
}

impl EventOptions {
    pub fn from_millis(timeout_ms: u64, interval_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            interval: Duration::from_millis(interval_ms),
        }
    }
}

/// Request/response conduit to the enclave (allows mocking in tests)
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    /// Send `kind`'s request event and return the response event's payload
    async fn send_action(
        &self,
        kind: RequestKind,
        payload: Value,
        options: &EventOptions,
    ) -> Result<Value, TransportError>;

    /// False once the channel can no longer carry requests
    fn is_connected(&self) -> bool {
        true
    }
}

/// Opens a [`Channel`], performing the handshake
#[async_trait::async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Channel>, TransportError>;
}
