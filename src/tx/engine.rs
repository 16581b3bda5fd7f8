//! Buy submission with nonce caching, gas selection and retry
//!
//! Each attempt runs Building (nonce, gas, calldata) → Signing →
//! Broadcasting. A failed attempt is classified as terminal or retryable;
//! retries back off linearly and start over with a fresh nonce and gas price.

use super::gas::GasResolver;
use super::nonce::NonceSequencer;
use crate::config::{Settings, SubmissionConfig, SubmissionOverrides};
use crate::contract::{build_buy_tx, max_cost, BuyCall, TxParams};
use crate::error::{AttemptError, Disposition, SubmitterError, SubmitterResult};
use crate::ledger::{with_timeout, Ledger};
use crate::metrics;
use crate::wallet::TxSigner;

use ethers::types::{Address, H256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reported when the attempt budget is spent without a recorded error
pub const MAX_RETRIES_EXCEEDED: &str = "Max retries exceeded";

/// Final outcome of one `submit` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResult {
    Success { tx_hash: H256, attempts: u32 },
    Failure { error: String, attempts: u32 },
    Cancelled { attempts: u32 },
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionResult::Success { .. })
    }

    /// Hex transaction hash on success
    pub fn transaction_id(&self) -> Option<String> {
        match self {
            SubmissionResult::Success { tx_hash, .. } => Some(format!("{:?}", tx_hash)),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SubmissionResult::Success { .. } => None,
            SubmissionResult::Failure { error, .. } => Some(error),
            SubmissionResult::Cancelled { .. } => Some("cancelled"),
        }
    }

    /// Attempts that reached the Building stage
    pub fn attempts(&self) -> u32 {
        match self {
            SubmissionResult::Success { attempts, .. }
            | SubmissionResult::Failure { attempts, .. }
            | SubmissionResult::Cancelled { attempts } => *attempts,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            SubmissionResult::Success { .. } => "success",
            SubmissionResult::Failure { .. } => "failure",
            SubmissionResult::Cancelled { .. } => "cancelled",
        }
    }
}

/// Submits buys against the trading contract for one wallet
pub struct SubmissionEngine {
    /// Wallet used for signing
    signer: Arc<dyn TxSigner>,
    ledger: Arc<dyn Ledger>,
    nonce_sequencer: NonceSequencer,
    gas_resolver: GasResolver,
    /// Trading contract
    contract: Address,
    chain_id: u64,
    /// Buy parameters; each submission works on a snapshot
    config: RwLock<SubmissionConfig>,
    /// Backoff unit between attempts
    retry_delay: Duration,
    request_timeout: Duration,
}

impl SubmissionEngine {
    /// Create a new submission engine
    pub fn new(
        settings: &Settings,
        ledger: Arc<dyn Ledger>,
        signer: Arc<dyn TxSigner>,
    ) -> SubmitterResult<Self> {
        let contract = settings
            .contract_address()
            .map_err(|e| SubmitterError::Config(format!("{:#}", e)))?;
        let request_timeout = settings.ledger.request_timeout();
        let wallet_address = signer.address();

        let nonce_sequencer = NonceSequencer::new(
            wallet_address,
            ledger.clone(),
            settings.nonce.cache_validity(),
            request_timeout,
        );
        let gas_resolver = GasResolver::new(ledger.clone(), &settings.gas, request_timeout);
        let config = settings.submission.clone();

        info!("Submission engine initialized");
        info!("   Wallet: {:?}", wallet_address);
        info!("   Buy amount: {} native", config.native_amount);
        info!("   Gas price: {} gwei", config.gas_price_hint);

        Ok(Self {
            signer,
            ledger,
            nonce_sequencer,
            gas_resolver,
            contract,
            chain_id: settings.ledger.chain_id,
            config: RwLock::new(config),
            retry_delay: settings.retry.base_delay(),
            request_timeout,
        })
    }

    /// Buy `token` for `recipient` (defaults to the wallet itself)
    pub async fn submit(&self, token: Address, recipient: Option<Address>) -> SubmissionResult {
        self.submit_with_cancel(token, recipient, &CancellationToken::new())
            .await
    }

    /// Same as [`submit`](Self::submit), aborting between attempts or during
    /// backoff once `cancel` fires
    pub async fn submit_with_cancel(
        &self,
        token: Address,
        recipient: Option<Address>,
        cancel: &CancellationToken,
    ) -> SubmissionResult {
        let started = Instant::now();
        let submission_id = Uuid::new_v4();
        let config = self.config().await;
        let recipient = recipient.unwrap_or_else(|| self.signer.address());

        info!(
            "Initiating buy {} for token {:?} (recipient {:?})",
            submission_id, token, recipient
        );

        let result = self
            .run(&config, token, recipient, cancel, submission_id)
            .await;
        let elapsed = started.elapsed();

        match &result {
            SubmissionResult::Success { tx_hash, attempts } => info!(
                "Buy {} sent: {:?} after {} attempt(s) in {}ms",
                submission_id,
                tx_hash,
                attempts,
                elapsed.as_millis()
            ),
            SubmissionResult::Failure { error, attempts } => warn!(
                "Buy {} failed after {} attempt(s) in {}ms: {}",
                submission_id,
                attempts,
                elapsed.as_millis(),
                error
            ),
            SubmissionResult::Cancelled { attempts } => info!(
                "Buy {} cancelled after {} attempt(s)",
                submission_id, attempts
            ),
        }
        metrics::record_submission(result.outcome(), elapsed.as_secs_f64());

        result
    }

    /// Retry loop
    async fn run(
        &self,
        config: &SubmissionConfig,
        token: Address,
        recipient: Address,
        cancel: &CancellationToken,
        submission_id: Uuid,
    ) -> SubmissionResult {
        let max_attempts = config.max_retries;
        let mut attempts = 0;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return SubmissionResult::Cancelled { attempts };
            }
            attempts = attempt;

            if attempt > 1 {
                info!(
                    "Retry attempt {}/{} for buy {}",
                    attempt, max_attempts, submission_id
                );
            }

            let (failure, nonce) = match self.nonce_sequencer.reserve_next().await {
                Ok(nonce) => match self.attempt(config, token, recipient, nonce).await {
                    Ok(tx_hash) => {
                        metrics::record_attempt("success");
                        return SubmissionResult::Success { tx_hash, attempts };
                    }
                    Err(e) => (e, Some(nonce)),
                },
                Err(e) => (AttemptError::Nonce(e), None),
            };

            warn!(
                "Buy attempt {} failed at {} stage: {}",
                attempt,
                failure.label(),
                failure
            );

            match failure.disposition(attempt) {
                Disposition::Terminal => {
                    metrics::record_attempt("terminal");
                    match nonce {
                        Some(nonce) if failure.leaves_nonce_unused() => {
                            self.nonce_sequencer.release(nonce).await
                        }
                        Some(_) => self.nonce_sequencer.invalidate().await,
                        None => {}
                    }
                    return SubmissionResult::Failure {
                        error: failure.to_string(),
                        attempts,
                    };
                }
                Disposition::InvalidateAndRetry => {
                    metrics::record_attempt("retryable");
                    self.nonce_sequencer.invalidate().await;
                }
                Disposition::Retry => metrics::record_attempt("retryable"),
            }
            last_error = Some(failure.to_string());

            if attempt == max_attempts {
                break;
            }

            let delay = self.retry_delay * attempt;
            debug!("Backing off {}ms before next attempt", delay.as_millis());
            tokio::select! {
                _ = cancel.cancelled() => return SubmissionResult::Cancelled { attempts },
                _ = tokio::time::sleep(delay) => {}
            }
        }

        SubmissionResult::Failure {
            error: last_error.unwrap_or_else(|| MAX_RETRIES_EXCEEDED.to_string()),
            attempts,
        }
    }

    /// Building → Signing → Broadcasting with an already reserved nonce
    async fn attempt(
        &self,
        config: &SubmissionConfig,
        token: Address,
        recipient: Address,
        nonce: u64,
    ) -> Result<H256, AttemptError> {
        let gas_price = self.gas_resolver.resolve(config).await;

        let call = BuyCall {
            token,
            recipient,
            funds: config.native_amount.wei(),
            min_amount: config.min_output_amount.value(),
        };
        let tx = build_buy_tx(
            &call,
            &TxParams {
                from: self.signer.address(),
                contract: self.contract,
                nonce,
                gas_limit: config.gas_limit,
                gas_price,
                chain_id: self.chain_id,
            },
        );
        debug!(
            "Built buy tx: nonce {}, gas price {} wei, max cost {} wei",
            nonce,
            gas_price,
            max_cost(&tx)
        );

        let signed = self.signer.sign(&tx).await.ok_or(AttemptError::Signing)?;

        with_timeout(
            "broadcast",
            self.request_timeout,
            self.ledger.send_raw(signed),
        )
        .await
        .map_err(AttemptError::Broadcast)
    }

    /// Merge `overrides` into the buy parameters used by later submissions
    pub async fn update_config(&self, overrides: SubmissionOverrides) {
        self.config.write().await.merge(overrides);
        info!("Buy configuration updated");
    }

    /// Snapshot of the current buy parameters
    pub async fn config(&self) -> SubmissionConfig {
        self.config.read().await.clone()
    }

    /// Get wallet address
    pub fn wallet_address(&self) -> Address {
        self.signer.address()
    }
}
