//! Wallet identity and transaction signing

use crate::config::WalletConfig;
use crate::error::{SubmitterError, SubmitterResult};

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes};
use std::fmt;
use tracing::error;

/// Signs transactions for a single wallet
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TxSigner: Send + Sync {
    fn address(&self) -> Address;

    /// RLP-encoded signed payload, or `None` when the credential cannot sign
    async fn sign(&self, tx: &TypedTransaction) -> Option<Bytes>;
}

/// Address plus private key for the buying wallet
pub struct WalletIdentity {
    wallet: LocalWallet,
}

impl WalletIdentity {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    /// Parse a hex private key (with or without `0x`)
    pub fn from_private_key(key: &str, chain_id: u64) -> SubmitterResult<Self> {
        let wallet = key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| SubmitterError::Wallet(format!("Invalid private key: {}", e)))?;

        Ok(Self::new(wallet.with_chain_id(chain_id)))
    }

    /// Load the key from the environment variable named in `config`
    pub fn from_env(config: &WalletConfig, chain_id: u64) -> SubmitterResult<Self> {
        let key = std::env::var(&config.private_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                SubmitterError::Config(format!(
                    "Missing PRIVATE_KEY: environment variable {} is not set",
                    config.private_key_env
                ))
            })?;

        let identity = Self::from_private_key(&key, chain_id)?;

        let expected = config
            .expected_address()
            .map_err(|e| SubmitterError::Config(format!("{:#}", e)))?;
        if let Some(expected) = expected {
            if expected != identity.address() {
                return Err(SubmitterError::Config(format!(
                    "Configured wallet address {:?} does not match private key address {:?}",
                    expected,
                    identity.address()
                )));
            }
        }

        Ok(identity)
    }
}

#[async_trait]
impl TxSigner for WalletIdentity {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn sign(&self, tx: &TypedTransaction) -> Option<Bytes> {
        match self.wallet.sign_transaction(tx).await {
            Ok(sig) => Some(tx.rlp_signed(&sig)),
            Err(e) => {
                error!("Failed to sign transaction: {}", e);
                None
            }
        }
    }
}

// never print key material
impl fmt::Debug for WalletIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletIdentity")
            .field("address", &self.wallet.address())
            .finish()
    }
}
