//! Scripted ledger for tests that need latency or shared counters

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct FakeLedger {
    pending_nonce: u64,
    latency: Duration,
    send_latency: Duration,
    gas_price: Option<U256>,
    broadcasts: Mutex<VecDeque<LedgerResult<H256>>>,
    nonce_queries: AtomicUsize,
    gas_queries: AtomicUsize,
    sent: Mutex<Vec<Bytes>>,
}

impl FakeLedger {
    pub fn new(pending_nonce: u64) -> Self {
        Self {
            pending_nonce,
            latency: Duration::ZERO,
            send_latency: Duration::ZERO,
            gas_price: None,
            broadcasts: Mutex::new(VecDeque::new()),
            nonce_queries: AtomicUsize::new(0),
            gas_queries: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay only broadcasts by `latency`
    pub fn with_send_latency(mut self, latency: Duration) -> Self {
        self.send_latency = latency;
        self
    }

    pub fn with_gas_price(mut self, price: U256) -> Self {
        self.gas_price = Some(price);
        self
    }

    /// Queue broadcast outcomes; once drained every broadcast succeeds
    pub fn with_broadcasts(self, outcomes: Vec<LedgerResult<H256>>) -> Self {
        self.broadcasts.lock().unwrap().extend(outcomes);
        self
    }

    pub fn nonce_queries(&self) -> usize {
        self.nonce_queries.load(Ordering::SeqCst)
    }

    pub fn gas_queries(&self) -> usize {
        self.gas_queries.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn send_delay(&self) {
        self.delay().await;
        if !self.send_latency.is_zero() {
            tokio::time::sleep(self.send_latency).await;
        }
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn pending_nonce(&self, _address: Address) -> LedgerResult<u64> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        Ok(self.pending_nonce)
    }

    async fn gas_price(&self) -> LedgerResult<U256> {
        self.gas_queries.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.gas_price
            .ok_or_else(|| LedgerError::unavailable("eth_gasPrice not available"))
    }

    async fn send_raw(&self, raw: Bytes) -> LedgerResult<H256> {
        self.send_delay().await;
        let count = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(raw);
            sent.len() as u64
        };
        let scripted = self.broadcasts.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(H256::from_low_u64_be(count)))
    }
}
