//! Signer sessions
//!
//! A [`SignerSession`] binds one wallet and one set of credentials to the
//! enclave. The channel is opened lazily on first use and reopened on the
//! next call after the remote side closes it.

pub mod api_key;
pub mod bootstrap;
pub mod locator;

use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::auth::AuthState;
use crate::error::{Result, SignerError, TransportError};
use crate::protocol::AuthData;
use crate::transport::{Channel, ChannelConnector, EventOptions};

pub use api_key::{ApiKey, Environment, KeyScope};
pub use bootstrap::SessionBootstrap;
pub use locator::{IdentityKind, SignerLocator};

/// Wallet as handed over by the wallet SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletHandle {
    address: String,
    chain: String,
    signer_locator: String,
}

impl WalletHandle {
    pub fn new(
        address: impl Into<String>,
        chain: impl Into<String>,
        signer_locator: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            chain: chain.into(),
            signer_locator: signer_locator.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn signer_locator(&self) -> &str {
        &self.signer_locator
    }
}

/// API key plus the identity token from the host's auth layer
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: ApiKey,
    jwt: Option<String>,
}

impl Credentials {
    pub fn new(api_key: ApiKey, jwt: Option<String>) -> Self {
        Self {
            api_key,
            jwt: jwt.filter(|t| !t.is_empty()),
        }
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub fn jwt(&self) -> Option<&str> {
        self.jwt.as_deref()
    }

    /// Envelope for status and onboarding requests (empty token if none)
    pub fn auth_data(&self) -> AuthData {
        AuthData {
            jwt: self.jwt.clone().unwrap_or_default(),
            api_key: self.api_key.as_str().to_string(),
        }
    }

    /// Envelope for signing, which requires a token
    pub fn signing_auth_data(&self) -> Result<AuthData> {
        let jwt = self.jwt.clone().ok_or(SignerError::MissingIdentityToken)?;
        Ok(AuthData {
            jwt,
            api_key: self.api_key.as_str().to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("has_jwt", &self.jwt.is_some())
            .finish()
    }
}

pub struct SignerSession {
    identity: SignerLocator,
    wallet: WalletHandle,
    credentials: Credentials,
    connector: Arc<dyn ChannelConnector>,
    /// Last channel that completed the handshake
    channel: RwLock<Option<Arc<dyn Channel>>>,
    auth: AuthState,
    options: EventOptions,
}

impl SignerSession {
    /// Parse the wallet's locator and create a session. Does not connect.
    pub fn new(
        wallet: WalletHandle,
        credentials: Credentials,
        connector: Arc<dyn ChannelConnector>,
        options: EventOptions,
    ) -> Result<Self> {
        let identity = SignerLocator::parse(wallet.signer_locator())?;
        Ok(Self {
            identity,
            wallet,
            credentials,
            connector,
            channel: RwLock::new(None),
            auth: AuthState::new(),
            options,
        })
    }

    pub fn identity(&self) -> &SignerLocator {
        &self.identity
    }

    pub fn wallet(&self) -> &WalletHandle {
        &self.wallet
    }

    pub fn address(&self) -> &str {
        self.wallet.address()
    }

    pub fn chain(&self) -> &str {
        self.wallet.chain()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn options(&self) -> &EventOptions {
        &self.options
    }

    pub fn auth_data(&self) -> AuthData {
        self.credentials.auth_data()
    }

    /// Whether a live channel is held. False while a connect is in flight.
    pub fn is_connected(&self) -> bool {
        self.channel
            .try_read()
            .map(|slot| slot.as_ref().is_some_and(|channel| channel.is_connected()))
            .unwrap_or(false)
    }

    /// The session's channel, connecting on first call.
    ///
    /// Concurrent callers share one connection attempt. A failed attempt
    /// leaves the slot empty so the next call tries again, and a channel the
    /// remote side closed is replaced by a fresh one.
    pub async fn channel(&self) -> std::result::Result<Arc<dyn Channel>, TransportError> {
        if let Some(channel) = live(self.channel.read().await.as_ref()) {
            return Ok(channel);
        }

        let mut slot = self.channel.write().await;
        // Another caller may have connected while we waited for the lock
        if let Some(channel) = live(slot.as_ref()) {
            return Ok(channel);
        }

        if slot.take().is_some() {
            warn!(address = %self.wallet.address(), "Signer channel closed, reconnecting");
        } else {
            info!(address = %self.wallet.address(), "Opening signer channel");
        }

        let channel = self.connector.connect().await?;
        *slot = Some(Arc::clone(&channel));
        Ok(channel)
    }
}

fn live(channel: Option<&Arc<dyn Channel>>) -> Option<Arc<dyn Channel>> {
    channel.filter(|c| c.is_connected()).map(Arc::clone)
}

impl fmt::Debug for SignerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerSession")
            .field("identity", &self.identity)
            .field("wallet", &self.wallet)
            .field("connected", &self.is_connected())
            .field("needs_auth", &self.auth.needs_auth())
            .finish()
    }
}
