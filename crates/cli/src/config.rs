use anyhow::{Context, Result};
use chain::TxOverrides;
use orchestrator::{AuctionConfig, DeployConfig};
use rns_core::{Address, RegistrationNames, U256};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "rns-deploy.toml";
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";
pub const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";

/// Contents of `rns-deploy.toml`. Every field is optional; command line
/// flags win over the file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub rpc_url: Option<String>,
    pub artifacts: Option<String>,
    pub names: RegistrationNames,
    pub transactions: TransactionSection,
    pub registration: RegistrationSection,
    pub auction: AuctionSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionSection {
    pub gas: Option<u64>,
    /// In wei.
    pub gas_price: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationSection {
    /// Years.
    pub duration: Option<u64>,
    pub commitment_age_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionSection {
    /// Tokens per bid, in the token's smallest unit.
    pub bid_amount: Option<u128>,
    pub bidding_window_secs: Option<u64>,
    pub reveal_window_secs: Option<u64>,
    pub transfer_to: Option<Address>,
}

impl FileConfig {
    /// Read `path`, or fall back to defaults when it does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn deploy_config(&self) -> DeployConfig {
        let mut overrides = TxOverrides::default();
        if let Some(gas) = self.transactions.gas {
            overrides = overrides.with_gas(gas);
        }
        if let Some(price) = self.transactions.gas_price {
            overrides = overrides.with_gas_price(U256::from(price));
        }

        let defaults = AuctionConfig::default();
        let mut auction = AuctionConfig::default().with_windows(
            self.auction
                .bidding_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.bidding_window),
            self.auction
                .reveal_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.reveal_window),
        );
        if let Some(amount) = self.auction.bid_amount {
            auction = auction.with_bid_amount(U256::from(amount));
        }
        if let Some(recipient) = self.auction.transfer_to {
            auction = auction.with_transfer_to(recipient);
        }

        let mut config = DeployConfig::default()
            .with_overrides(overrides)
            .with_auction(auction);
        if let Some(years) = self.registration.duration {
            config = config.with_registration_duration(years);
        }
        if let Some(age) = self.registration.commitment_age_secs {
            config = config.with_commitment_age(Duration::from_secs(age));
        }
        config
    }
}
