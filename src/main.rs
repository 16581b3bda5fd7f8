//! Swap Submitter - submit one buy from the command line
//!
//! Usage: `swap-submitter <token-address> [recipient-address]`

use anyhow::{Context, Result};
use ethers::types::Address;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use swap_submitter::{metrics, RpcLedger, Settings, SubmissionEngine, WalletIdentity};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Swap Submitter v{}", env!("CARGO_PKG_VERSION"));

    let (token, recipient) = parse_args(std::env::args().skip(1))?;

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for chain {} ({} RPC endpoint(s))",
        settings.ledger.chain_id,
        settings.ledger.rpc_urls.len()
    );

    let ledger = Arc::new(RpcLedger::new(&settings.ledger)?);
    let wallet = Arc::new(WalletIdentity::from_env(
        &settings.wallet,
        settings.ledger.chain_id,
    )?);
    let engine = SubmissionEngine::new(&settings, ledger, wallet)?;

    // Ctrl-C aborts between attempts or during backoff
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            warn!("Shutdown signal received, cancelling submission");
            cancel.cancel();
        }
    });

    let result = engine.submit_with_cancel(token, recipient, &cancel).await;

    match metrics::encode() {
        Ok(text) => debug!("Metrics snapshot:\n{}", text),
        Err(e) => warn!("Failed to encode metrics: {}", e),
    }

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<(Address, Option<Address>)> {
    let token = args
        .next()
        .context("usage: swap-submitter <token-address> [recipient-address]")?;
    let token = token
        .parse()
        .with_context(|| format!("Invalid token address: {}", token))?;

    let recipient = match args.next() {
        Some(raw) => Some(
            raw.parse()
                .with_context(|| format!("Invalid recipient address: {}", raw))?,
        ),
        None => None,
    };

    Ok((token, recipient))
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swap_submitter=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_parse_args() {
        const TOKEN: &str = "0x5c952063c7fc8610FFDB798152D69F0B9550762b";
        const RECIPIENT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

        let (token, recipient) = parse_args(args(&[TOKEN])).unwrap();
        assert_eq!(token, TOKEN.parse::<Address>().unwrap());
        assert_eq!(recipient, None);

        let (_, recipient) = parse_args(args(&[TOKEN, RECIPIENT])).unwrap();
        assert_eq!(recipient, Some(RECIPIENT.parse::<Address>().unwrap()));

        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&[TOKEN, "nope"])).is_err());
    }
}
