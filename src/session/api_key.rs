//! API key validation
//!
//! Keys look like `<ck|sk>_<development|staging|production>_<secret>`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SignerError};

/// `ck` keys are for client-side use, `sk` keys for servers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    raw: String,
    scope: KeyScope,
    environment: Environment,
}

impl ApiKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, '_');
        let (Some(prefix), Some(env), Some(secret)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(SignerError::InvalidApiKey(
                "expected <scope>_<environment>_<secret>".into(),
            ));
        };

        let scope = match prefix {
            "ck" => KeyScope::Client,
            "sk" => KeyScope::Server,
            other => {
                return Err(SignerError::InvalidApiKey(format!(
                    "unknown key scope '{}'",
                    other
                )))
            }
        };

        let environment = match env {
            "development" => Environment::Development,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(SignerError::InvalidApiKey(format!(
                    "unknown environment '{}'",
                    other
                )))
            }
        };

        if secret.is_empty() {
            return Err(SignerError::InvalidApiKey("empty secret".into()));
        }

        Ok(Self {
            raw: raw.to_string(),
            scope,
            environment,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scope(&self) -> KeyScope {
        self.scope
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }
}

// Never print the secret
impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("scope", &self.scope)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl FromStr for ApiKey {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_keys() {
        let key = ApiKey::parse("ck_staging_abc123").unwrap();
        assert_eq!(key.scope(), KeyScope::Client);
        assert_eq!(key.environment(), Environment::Staging);
        assert_eq!(key.as_str(), "ck_staging_abc123");

        // Secret may contain underscores
        let key: ApiKey = "sk_production_a_b_c".parse().unwrap();
        assert_eq!(key.scope(), KeyScope::Server);
        assert_eq!(key.environment(), Environment::Production);
    }

    #[test]
    fn test_rejects_malformed_keys() {
        for bad in [
            "",
            "ck",
            "ck_staging",
            "ck_staging_",
            "pk_staging_abc",
            "ck_local_abc",
        ] {
            assert!(
                matches!(ApiKey::parse(bad), Err(SignerError::InvalidApiKey(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = ApiKey::parse("ck_development_supersecret").unwrap();
        assert!(!format!("{:?}", key).contains("supersecret"));
    }
}
