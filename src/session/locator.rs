//! Signer locator parsing
//!
//! A wallet's signer locator is `email:<address>` or `phone:<number>`. The
//! prefix selects the identity presented to the enclave.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SignerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    Email,
    Phone,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Email => "email",
            IdentityKind::Phone => "phone",
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignerLocator {
    kind: IdentityKind,
    value: String,
}

impl SignerLocator {
    /// Split on the first colon; the remainder may itself contain colons.
    pub fn parse(locator: &str) -> Result<Self> {
        let (prefix, value) = locator
            .split_once(':')
            .ok_or_else(|| SignerError::InvalidLocator(locator.to_string()))?;

        let kind = match prefix {
            "email" => IdentityKind::Email,
            "phone" => IdentityKind::Phone,
            _ => return Err(SignerError::InvalidLocator(locator.to_string())),
        };

        if value.is_empty() {
            return Err(SignerError::InvalidLocator(locator.to_string()));
        }

        Ok(Self {
            kind,
            value: value.to_string(),
        })
    }

    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Identity as sent to the enclave, `email:<value>` or `phone:<value>`
    pub fn auth_id(&self) -> String {
        format!("{}:{}", self.kind, self.value)
    }
}

impl fmt::Display for SignerLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

impl FromStr for SignerLocator {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
