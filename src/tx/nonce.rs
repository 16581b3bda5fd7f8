//! Nonce sequencing for back-to-back submissions
//!
//! Handles:
//! - Optimistic local sequencing inside a short validity window
//! - Remote refresh once the cache is stale or invalidated
//! - Serialized reservations for concurrent callers

use crate::error::LedgerResult;
use crate::ledger::{with_timeout, Ledger};

use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Cached view of the wallet's next nonce
#[derive(Debug, Default)]
struct NonceState {
    /// Next nonce to hand out
    cached: Option<u64>,
    /// When `cached` was last taken from the ledger
    refreshed_at: Option<Instant>,
    /// Bumped by every invalidation
    epoch: u64,
}

impl NonceState {
    fn fresh(&self, validity: Duration) -> Option<u64> {
        match (self.cached, self.refreshed_at) {
            (Some(next), Some(at)) if at.elapsed() < validity => Some(next),
            _ => None,
        }
    }

    fn take(&mut self, next: u64) -> u64 {
        self.cached = Some(next + 1);
        next
    }
}

/// Hands out nonces for a single wallet
pub struct NonceSequencer {
    /// Wallet address
    address: Address,
    ledger: Arc<dyn Ledger>,
    state: Mutex<NonceState>,
    validity: Duration,
    request_timeout: Duration,
}

impl NonceSequencer {
    pub fn new(
        address: Address,
        ledger: Arc<dyn Ledger>,
        validity: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            address,
            ledger,
            state: Mutex::new(NonceState::default()),
            validity,
            request_timeout,
        }
    }

    /// Reserve the next nonce.
    ///
    /// The state lock is never held while the ledger is queried. A refresh
    /// that raced with another refresh hands out past whatever the winner
    /// cached; one that raced with an invalidation is discarded and redone.
    pub async fn reserve_next(&self) -> LedgerResult<u64> {
        loop {
            let epoch = {
                let mut state = self.state.lock().await;
                if let Some(next) = state.fresh(self.validity) {
                    debug!("Allocated cached nonce {} for {:?}", next, self.address);
                    return Ok(state.take(next));
                }
                state.epoch
            };

            let on_chain = self.fetch_nonce().await?;

            let mut state = self.state.lock().await;
            if state.epoch != epoch {
                debug!("Nonce cache invalidated during refresh, querying again");
                continue;
            }

            let next = match state.fresh(self.validity) {
                Some(cached) => cached.max(on_chain),
                None => {
                    state.refreshed_at = Some(Instant::now());
                    on_chain
                }
            };

            debug!("Allocated nonce {} for {:?} (on-chain {})", next, self.address, on_chain);
            return Ok(state.take(next));
        }
    }

    /// Drop the cached value so the next reservation asks the ledger
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.cached = None;
        state.refreshed_at = None;
        state.epoch += 1;
        crate::metrics::record_nonce_invalidation();
        debug!("Nonce cache invalidated for {:?}", self.address);
    }

    /// Give back a nonce that was reserved but never reached the ledger.
    ///
    /// Only the most recent reservation can be returned; if another caller
    /// already took the following value the cache is left alone.
    pub async fn release(&self, nonce: u64) {
        let mut state = self.state.lock().await;
        if state.cached == Some(nonce + 1) {
            state.cached = Some(nonce);
            debug!("Released unused nonce {} for {:?}", nonce, self.address);
        }
    }

    /// Next nonce the cache would hand out, if any
    pub async fn cached(&self) -> Option<u64> {
        self.state.lock().await.cached
    }

    /// Fetch pending nonce from chain
    async fn fetch_nonce(&self) -> LedgerResult<u64> {
        let nonce = with_timeout(
            "pending nonce",
            self.request_timeout,
            self.ledger.pending_nonce(self.address),
        )
        .await?;

        crate::metrics::record_nonce_refresh();
        Ok(nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LedgerError, LedgerErrorKind};
    use crate::ledger::MockLedger;
    use crate::test_utils::FakeLedger;
    use futures::future::join_all;
    use std::collections::HashSet;

    const VALIDITY: Duration = Duration::from_secs(5);
    const TIMEOUT: Duration = Duration::from_secs(10);

    fn sequencer(ledger: Arc<dyn Ledger>) -> NonceSequencer {
        NonceSequencer::new(Address::repeat_byte(0xaa), ledger, VALIDITY, TIMEOUT)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_serves_consecutive_values() {
        let mut ledger = MockLedger::new();
        ledger.expect_pending_nonce().times(1).returning(|_| Ok(40));
        let nonces = sequencer(Arc::new(ledger));

        assert_eq!(nonces.reserve_next().await.unwrap(), 40);
        assert_eq!(nonces.reserve_next().await.unwrap(), 41);
        assert_eq!(nonces.reserve_next().await.unwrap(), 42);
        assert_eq!(nonces.cached().await, Some(43));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cache_requeries() {
        let mut ledger = MockLedger::new();
        let mut seq = mockall::Sequence::new();
        ledger
            .expect_pending_nonce()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(3));
        ledger
            .expect_pending_nonce()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(10));
        let nonces = sequencer(Arc::new(ledger));

        assert_eq!(nonces.reserve_next().await.unwrap(), 3);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(nonces.reserve_next().await.unwrap(), 10);
        assert_eq!(nonces.reserve_next().await.unwrap(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_remote_query() {
        let mut ledger = MockLedger::new();
        ledger.expect_pending_nonce().times(2).returning(|_| Ok(7));
        let nonces = sequencer(Arc::new(ledger));

        assert_eq!(nonces.reserve_next().await.unwrap(), 7);
        nonces.invalidate().await;
        assert_eq!(nonces.cached().await, None);
        // cache is well inside its window, but the ledger is asked anyway
        assert_eq!(nonces.reserve_next().await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_returns_only_latest_reservation() {
        let mut ledger = MockLedger::new();
        ledger.expect_pending_nonce().times(1).returning(|_| Ok(7));
        let nonces = sequencer(Arc::new(ledger));

        assert_eq!(nonces.reserve_next().await.unwrap(), 7);
        nonces.release(7).await;
        assert_eq!(nonces.reserve_next().await.unwrap(), 7);

        assert_eq!(nonces.reserve_next().await.unwrap(), 8);
        // 9 is already out, so 8 cannot be handed back
        assert_eq!(nonces.reserve_next().await.unwrap(), 9);
        nonces.release(8).await;
        assert_eq!(nonces.cached().await, Some(10));
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let mut ledger = MockLedger::new();
        ledger
            .expect_pending_nonce()
            .returning(|_| Err(LedgerError::unavailable("connection refused")));
        let nonces = sequencer(Arc::new(ledger));

        let err = nonces.reserve_next().await.unwrap_err();
        assert_eq!(err.kind(), LedgerErrorKind::Unavailable);
        assert_eq!(nonces.cached().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ledger_times_out() {
        let ledger = Arc::new(FakeLedger::new(0).with_latency(Duration::from_secs(60)));
        let nonces = sequencer(ledger);

        let err = nonces.reserve_next().await.unwrap_err();
        assert_eq!(err.kind(), LedgerErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_on_warm_cache() {
        let ledger = Arc::new(FakeLedger::new(100));
        let nonces = Arc::new(sequencer(ledger.clone()));
        assert_eq!(nonces.reserve_next().await.unwrap(), 100);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let nonces = nonces.clone();
                tokio::spawn(async move { nonces.reserve_next().await.unwrap() })
            })
            .collect();
        let mut values: Vec<u64> = join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        values.sort_unstable();

        assert_eq!(values, (101..117).collect::<Vec<_>>());
        assert_eq!(ledger.nonce_queries(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cold_refreshes_never_collide() {
        // every caller misses the cache and queries the ledger at once
        let ledger = Arc::new(FakeLedger::new(5).with_latency(Duration::from_millis(20)));
        let nonces = Arc::new(sequencer(ledger));

        let reservations = (0..8).map(|_| {
            let nonces = nonces.clone();
            async move { nonces.reserve_next().await.unwrap() }
        });
        let values = join_all(reservations).await;

        let unique: HashSet<_> = values.iter().copied().collect();
        assert_eq!(unique.len(), values.len());
        assert_eq!(unique, (5..13).collect::<HashSet<_>>());
    }
}
