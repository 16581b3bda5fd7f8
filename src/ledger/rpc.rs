//! JSON-RPC ledger with multi-endpoint failover

use super::Ledger;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerErrorKind, LedgerResult, SubmitterError, SubmitterResult};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::{Address, BlockNumber, Bytes, H256, U256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Ledger backed by one or more HTTP JSON-RPC endpoints
pub struct RpcLedger {
    chain_id: u64,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl RpcLedger {
    pub fn new(config: &LedgerConfig) -> SubmitterResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(provider);
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(SubmitterError::Config(format!(
                "No valid RPC providers for chain {}",
                config.chain_id
            )));
        }

        Ok(Self {
            chain_id: config.chain_id,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    fn failover(&self) {
        if self.http_providers.len() < 2 {
            return;
        }
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.chain_id, next);
    }

    /// Map a provider error to a ledger error, failing over on transport faults
    fn convert(&self, err: ProviderError) -> LedgerError {
        match RpcError::as_error_response(&err) {
            // node answered: its message carries the rejection reason
            Some(response) => LedgerError::from_message(response.message.clone()),
            None => {
                self.failover();
                LedgerError::unavailable(err.to_string())
            }
        }
    }

    /// Read-only calls retry across every endpoint before giving up
    async fn read<T, F, Fut>(&self, operation: &str, call: F) -> LedgerResult<T>
    where
        F: Fn(Provider<Http>) -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;

        for _ in 0..self.http_providers.len() {
            match call(self.http().clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "Failed to get {} from chain {}: {}",
                        operation, self.chain_id, e
                    );
                    let err = self.convert(e);
                    if err.kind() != LedgerErrorKind::Unavailable {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LedgerError::unavailable("All providers failed")))
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn pending_nonce(&self, address: Address) -> LedgerResult<u64> {
        let count = self
            .read("pending nonce", |provider| async move {
                provider
                    .get_transaction_count(address, Some(BlockNumber::Pending.into()))
                    .await
            })
            .await?;

        Ok(count.as_u64())
    }

    async fn gas_price(&self) -> LedgerResult<U256> {
        self.read("gas price", |provider| async move { provider.get_gas_price().await })
            .await
    }

    async fn send_raw(&self, raw: Bytes) -> LedgerResult<H256> {
        // single shot: the retry loop owns resubmission
        match self.http().send_raw_transaction(raw).await {
            Ok(pending_tx) => Ok(pending_tx.tx_hash()),
            Err(e) => Err(self.convert(e)),
        }
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("chain_id", &self.chain_id)
            .field("providers", &self.http_providers.len())
            .finish()
    }
}
