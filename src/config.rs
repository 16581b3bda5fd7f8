//! Configuration management for the swap submitter
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::units::{BaseUnits, Ether, Gwei};

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Public BSC endpoint used when no RPC URL is configured
pub const DEFAULT_RPC_URL: &str = "https://bsc-dataseed1.binance.org/";

/// Trading contract exposing `buyTokenAMAP`
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5c952063c7fc8610FFDB798152D69F0B9550762b";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ledger: LedgerConfig,
    pub wallet: WalletConfig,
    pub nonce: NonceConfig,
    pub gas: GasConfig,
    pub retry: RetryConfig,
    pub submission: SubmissionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    pub contract_address: String,
    /// Upper bound for every remote call
    pub request_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_urls: vec![DEFAULT_RPC_URL.to_string()],
            chain_id: 56,
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl LedgerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Name of the environment variable holding the hex private key
    pub private_key_env: String,
    /// Expected wallet address; checked against the key when set
    pub address: Option<String>,
}

impl WalletConfig {
    /// Parsed `address`, if one is configured
    pub fn expected_address(&self) -> Result<Option<Address>> {
        match self.address.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .with_context(|| format!("Invalid wallet address: {}", raw)),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: "PRIVATE_KEY".to_string(),
            address: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NonceConfig {
    pub cache_validity_ms: u64,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            cache_validity_ms: 5_000,
        }
    }
}

impl NonceConfig {
    pub fn cache_validity(&self) -> Duration {
        Duration::from_millis(self.cache_validity_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Percentage added on top of the live network price
    pub premium_percent: u64,
    /// Ceiling for dynamically resolved prices
    pub max_gas_price_gwei: Gwei,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            premium_percent: 10,
            max_gas_price_gwei: Gwei::from_wei(20_000_000_000u64.into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Backoff unit; attempt `n` waits `n * base_delay_ms`
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { base_delay_ms: 500 }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Per-call buy parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Native currency spent per buy
    pub native_amount: Ether,
    /// Slippage floor in token base units
    pub min_output_amount: BaseUnits,
    pub gas_limit: u64,
    pub gas_price_hint: Gwei,
    /// Total attempts, including the first
    pub max_retries: u32,
    pub use_dynamic_gas: bool,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            native_amount: Ether::from_wei(1_000_000_000_000_000u64.into()),
            min_output_amount: BaseUnits::new(0u64.into()),
            gas_limit: 500_000,
            gas_price_hint: Gwei::from_wei(3_000_000_000u64.into()),
            max_retries: 2,
            use_dynamic_gas: true,
        }
    }
}

/// Partial update for [`SubmissionConfig`]; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubmissionOverrides {
    pub native_amount: Option<Ether>,
    pub min_output_amount: Option<BaseUnits>,
    pub gas_limit: Option<u64>,
    pub gas_price_hint: Option<Gwei>,
    pub max_retries: Option<u32>,
    pub use_dynamic_gas: Option<bool>,
}

impl SubmissionConfig {
    /// Replace only the fields present in `overrides`
    pub fn merge(&mut self, overrides: SubmissionOverrides) {
        if let Some(v) = overrides.native_amount {
            self.native_amount = v;
        }
        if let Some(v) = overrides.min_output_amount {
            self.min_output_amount = v;
        }
        if let Some(v) = overrides.gas_limit {
            self.gas_limit = v;
        }
        if let Some(v) = overrides.gas_price_hint {
            self.gas_price_hint = v;
        }
        if let Some(v) = overrides.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = overrides.use_dynamic_gas {
            self.use_dynamic_gas = v;
        }
    }

    pub fn merged(&self, overrides: SubmissionOverrides) -> Self {
        let mut next = self.clone();
        next.merge(overrides);
        next
    }
}

impl Settings {
    /// Load settings from the file named by `SUBMITTER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("SUBMITTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse settings from TOML text, substituting `${VAR}` references
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config_str = substitute_env_vars(input);

        let mut settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.ledger.rpc_urls.retain(|url| !url.trim().is_empty());
        if settings.ledger.rpc_urls.is_empty() {
            tracing::warn!("No RPC URL configured, using {}", DEFAULT_RPC_URL);
            settings.ledger.rpc_urls.push(DEFAULT_RPC_URL.to_string());
        }

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.contract_address()?;

        if let Some(address) = self.wallet_address()? {
            tracing::debug!("Configured wallet address {:?}", address);
        }

        if self.wallet.private_key_env.is_empty() {
            anyhow::bail!("wallet.private_key_env must name an environment variable");
        }
        if self.ledger.request_timeout_ms == 0 {
            anyhow::bail!("ledger.request_timeout_ms must be positive");
        }
        if self.submission.gas_limit == 0 {
            anyhow::bail!("submission.gas_limit must be positive");
        }
        if self.submission.max_retries == 0 {
            tracing::warn!("submission.max_retries is 0 - no buy will be attempted");
        }

        Ok(())
    }

    /// Parsed trading contract address
    pub fn contract_address(&self) -> Result<Address> {
        self.ledger
            .contract_address
            .parse()
            .with_context(|| format!("Invalid contract address: {}", self.ledger.contract_address))
    }

    /// Parsed expected wallet address, if configured
    pub fn wallet_address(&self) -> Result<Option<Address>> {
        self.wallet.expected_address()
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
