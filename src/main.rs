//! Enclave Signer CLI
//!
//! Derives the wallet's public key or signs a message/digest, prompting for
//! a one-time code on the terminal when the enclave asks for one.

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use enclave_signer::{
    config::{Args, Command},
    hash_message, ApiKey, AuthHandler, ChallengeOutcome, Credentials, HttpPublicKeyService,
    OtpChallenge, SessionBootstrap, WalletHandle, WebSocketConnector,
};

/// Prompts for the one-time code on stdin
struct TerminalAuthHandler;

#[async_trait::async_trait]
impl AuthHandler for TerminalAuthHandler {
    async fn on_auth_required(
        &self,
        needs_auth: bool,
        challenge: OtpChallenge,
    ) -> enclave_signer::Result<()> {
        if !needs_auth {
            info!("Authentication complete");
            return Ok(());
        }

        match challenge.send_challenge().await? {
            ChallengeOutcome::CodeSent => {}
            ChallengeOutcome::AlreadyReady => return Ok(()),
            // Round is already rejected with this message
            ChallengeOutcome::Failed(_) => return Ok(()),
        }

        eprint!("Enter the one-time code sent to you (empty to cancel): ");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let code = match lines.next_line().await {
            Ok(Some(line)) => line.trim().to_string(),
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Failed to read one-time code: {}", e);
                String::new()
            }
        };

        if code.is_empty() {
            challenge.cancel();
            return Ok(());
        }

        challenge.verify_response(&code).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Logs go to stderr; stdout carries the result
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("enclave_signer={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("Channel: {}", args.channel_url);
    info!("Key service: {}", args.api_url);
    info!("Wallet: {} ({})", args.wallet_address, args.chain);

    let api_key = ApiKey::parse(&args.api_key)?;
    info!("API key environment: {}", api_key.environment().as_str());
    let credentials = Credentials::new(api_key, args.jwt.clone());
    let wallet = WalletHandle::new(&args.wallet_address, &args.chain, &args.locator);

    let connector =
        WebSocketConnector::new(&args.channel_url).with_handshake_timeout(args.handshake_timeout());
    let bootstrap = SessionBootstrap::new(
        Arc::new(connector),
        Arc::new(TerminalAuthHandler),
        Arc::new(HttpPublicKeyService::new(&args.api_url)),
        args.event_options(),
    );
    let signer = bootstrap.signer(&wallet, credentials)?;

    match args.command {
        Command::PublicKey => {
            let key = signer.derive_public_key().await?;
            println!("{}", serde_json::to_string_pretty(&key)?);
        }
        Command::Sign { message } => {
            let digest = hash_message(message.as_bytes());
            info!("Message digest: {}", digest);
            let response = signer.sign_raw(&digest).await?;
            println!("{}", response.signature);
        }
        Command::SignRaw { digest } => {
            let response = signer.sign_raw(&digest).await?;
            println!("{}", response.signature);
        }
    }

    Ok(())
}
