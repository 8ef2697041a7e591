//! Configuration for the enclave signer CLI
//!
//! CLI arguments and environment variable handling using clap.

use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::error::{Result, SignerError};
use crate::transport::EventOptions;

/// Enclave signer - sign digests with a key held in a remote enclave
#[derive(Parser, Debug, Clone)]
#[command(name = "enclave-signer")]
#[command(about = "Non-custodial signer client with OTP-gated authentication")]
pub struct Args {
    /// Signer channel WebSocket URL
    #[arg(long, env = "SIGNER_CHANNEL_URL", default_value = "ws://localhost:8787")]
    pub channel_url: String,

    /// Key service base URL (public key derivation)
    #[arg(long, env = "SIGNER_API_URL", default_value = "http://localhost:8788")]
    pub api_url: String,

    /// API key, `<ck|sk>_<environment>_<secret>`
    #[arg(long, env = "SIGNER_API_KEY")]
    pub api_key: String,

    /// Identity token (JWT) from the host's auth layer
    #[arg(long, env = "SIGNER_JWT")]
    pub jwt: Option<String>,

    /// Wallet signer locator, `email:<address>` or `phone:<number>`
    #[arg(long, env = "SIGNER_LOCATOR")]
    pub locator: String,

    /// Wallet address
    #[arg(long, env = "WALLET_ADDRESS")]
    pub wallet_address: String,

    /// Wallet chain
    #[arg(long, env = "WALLET_CHAIN", default_value = "flow-testnet")]
    pub chain: String,

    /// Bound on one enclave request in milliseconds
    #[arg(long, env = "EVENT_TIMEOUT_MS", default_value = "10000")]
    pub event_timeout_ms: u64,

    /// Re-send cadence for unanswered requests in milliseconds
    #[arg(long, env = "EVENT_INTERVAL_MS", default_value = "5000")]
    pub event_interval_ms: u64,

    /// Bound on the channel handshake in milliseconds
    #[arg(long, env = "HANDSHAKE_TIMEOUT_MS", default_value = "10000")]
    pub handshake_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Derive the wallet's public key
    PublicKey,

    /// SHA-256 a message and sign the digest
    Sign {
        #[arg(long)]
        message: String,
    },

    /// Sign a 32-byte hex digest as-is
    SignRaw {
        #[arg(long)]
        digest: String,
    },
}

impl Args {
    pub fn event_options(&self) -> EventOptions {
        EventOptions::from_millis(self.event_timeout_ms, self.event_interval_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.event_timeout_ms == 0 || self.handshake_timeout_ms == 0 {
            return Err(SignerError::Config(
                "Timeouts must be greater than zero".to_string(),
            ));
        }

        if self.event_interval_ms == 0 {
            return Err(SignerError::Config(
                "EVENT_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        if self.event_interval_ms > self.event_timeout_ms {
            return Err(SignerError::Config(
                "EVENT_INTERVAL_MS must be less than or equal to EVENT_TIMEOUT_MS".to_string(),
            ));
        }

        if !self.channel_url.starts_with("ws://") && !self.channel_url.starts_with("wss://") {
            return Err(SignerError::Config(
                "SIGNER_CHANNEL_URL must be a ws:// or wss:// URL".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "enclave-signer",
            "--api-key",
            "ck_development_key",
            "--locator",
            "email:a@b.c",
            "--wallet-address",
            "0x01",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["public-key"]);
        assert_eq!(args.command, Command::PublicKey);
        assert_eq!(args.event_options(), EventOptions::default());
        assert_eq!(args.handshake_timeout(), Duration::from_secs(10));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_sign_raw_subcommand() {
        let args = parse(&["sign-raw", "--digest", "abcd"]);
        assert_eq!(
            args.command,
            Command::SignRaw {
                digest: "abcd".into()
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_timing() {
        let args = parse(&["--event-interval-ms", "20000", "public-key"]);
        assert!(args.validate().is_err());

        let args = parse(&["--event-timeout-ms", "0", "public-key"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_http_channel() {
        let args = parse(&["--channel-url", "http://localhost:1", "public-key"]);
        assert_eq!(
            args.validate(),
            Err(SignerError::Config(
                "SIGNER_CHANNEL_URL must be a ws:// or wss:// URL".into()
            ))
        );
    }
}
