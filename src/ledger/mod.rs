//! Remote ledger access
//!
//! The submission engine only needs three remote operations. They sit behind
//! the [`Ledger`] trait so the engine can run against a live node
//! ([`RpcLedger`]) or a test double.

mod rpc;

pub use rpc::RpcLedger;

use crate::error::{LedgerError, LedgerResult};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use std::future::Future;
use std::time::Duration;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Transaction count for `address` including pending transactions
    async fn pending_nonce(&self, address: Address) -> LedgerResult<u64>;

    /// Current network gas price in wei
    async fn gas_price(&self) -> LedgerResult<U256>;

    /// Broadcast a signed, RLP-encoded transaction
    async fn send_raw(&self, raw: Bytes) -> LedgerResult<H256>;
}

/// Bound a remote call. Expiry becomes a retryable
/// [`LedgerErrorKind::Timeout`](crate::error::LedgerErrorKind::Timeout).
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, call: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::timeout(operation, limit)),
    }
}
