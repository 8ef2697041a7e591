//! Session bootstrap
//!
//! Hands out one [`NonCustodialSigner`] per wallet address. The signer is
//! memoized until the wallet's locator or the credentials change, at which
//! point a fresh session (and, lazily, a fresh channel) replaces it.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use super::{Credentials, SignerSession, WalletHandle};
use crate::auth::AuthHandler;
use crate::error::Result;
use crate::public_key::PublicKeyService;
use crate::signer::NonCustodialSigner;
use crate::transport::{ChannelConnector, EventOptions};

/// What a cached signer was built from
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionKey {
    chain: String,
    signer_locator: String,
    api_key: String,
    jwt: Option<String>,
}

impl SessionKey {
    fn of(wallet: &WalletHandle, credentials: &Credentials) -> Self {
        Self {
            chain: wallet.chain().to_string(),
            signer_locator: wallet.signer_locator().to_string(),
            api_key: credentials.api_key().as_str().to_string(),
            jwt: credentials.jwt().map(String::from),
        }
    }
}

struct CachedSigner {
    key: SessionKey,
    signer: Arc<NonCustodialSigner>,
}

pub struct SessionBootstrap {
    connector: Arc<dyn ChannelConnector>,
    handler: Arc<dyn AuthHandler>,
    public_keys: Arc<dyn PublicKeyService>,
    options: EventOptions,
    signers: DashMap<String, CachedSigner>,
}

impl SessionBootstrap {
    pub fn new(
        connector: Arc<dyn ChannelConnector>,
        handler: Arc<dyn AuthHandler>,
        public_keys: Arc<dyn PublicKeyService>,
        options: EventOptions,
    ) -> Self {
        Self {
            connector,
            handler,
            public_keys,
            options,
            signers: DashMap::new(),
        }
    }

    /// Signer for `wallet`, reusing the existing session when nothing changed.
    pub fn signer(
        &self,
        wallet: &WalletHandle,
        credentials: Credentials,
    ) -> Result<Arc<NonCustodialSigner>> {
        let key = SessionKey::of(wallet, &credentials);

        match self.signers.entry(wallet.address().to_string()) {
            Entry::Occupied(entry) if entry.get().key == key => {
                Ok(Arc::clone(&entry.get().signer))
            }
            Entry::Occupied(mut entry) => {
                info!(address = %wallet.address(), "Wallet or credentials changed, replacing session");
                let signer = self.build(wallet, credentials)?;
                entry.insert(CachedSigner {
                    key,
                    signer: Arc::clone(&signer),
                });
                Ok(signer)
            }
            Entry::Vacant(entry) => {
                let signer = self.build(wallet, credentials)?;
                entry.insert(CachedSigner {
                    key,
                    signer: Arc::clone(&signer),
                });
                Ok(signer)
            }
        }
    }

    /// Drop the cached session for `address`. Returns whether one existed.
    pub fn forget(&self, address: &str) -> bool {
        self.signers.remove(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    fn build(
        &self,
        wallet: &WalletHandle,
        credentials: Credentials,
    ) -> Result<Arc<NonCustodialSigner>> {
        let session = SignerSession::new(
            wallet.clone(),
            credentials,
            Arc::clone(&self.connector),
            self.options,
        )?;
        info!(
            address = %wallet.address(),
            chain = %wallet.chain(),
            kind = %session.identity().kind(),
            "Created signer session"
        );

        Ok(Arc::new(NonCustodialSigner::new(
            Arc::new(session),
            Arc::clone(&self.handler),
            Arc::clone(&self.public_keys),
        )))
    }
}
