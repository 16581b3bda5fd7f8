//! Swap Submitter - low-latency buy transactions for a single wallet
//!
//! Submits `buyTokenAMAP` calls against a fixed trading contract. The
//! [`SubmissionEngine`] reserves nonces from a short-lived local cache,
//! picks a gas price, signs, broadcasts, and retries transient failures
//! with linear backoff.

pub mod config;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod tx;
pub mod units;
pub mod wallet;

#[cfg(test)]
mod test_utils;

pub use config::{Settings, SubmissionConfig, SubmissionOverrides};
pub use error::{LedgerError, LedgerErrorKind, SubmitterError, SubmitterResult};
pub use ledger::{Ledger, RpcLedger};
pub use tx::{SubmissionEngine, SubmissionResult};
pub use wallet::{TxSigner, WalletIdentity};
