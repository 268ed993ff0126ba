use chain::TxOverrides;
use rns_core::{Address, U256};
use std::time::Duration;

const DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AuctionConfig {
    /// Tokens bid per label.
    pub bid_amount: U256,
    pub bidding_window: Duration,
    pub reveal_window: Duration,
    /// Recipient of the won names. `None` skips the transfer phase.
    pub transfer_to: Option<Address>,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            bid_amount: U256::from(1_000_000_000_000_000_000u128),
            bidding_window: Duration::from_secs(3 * DAY),
            reveal_window: Duration::from_secs(2 * DAY),
            transfer_to: None,
        }
    }
}

impl AuctionConfig {
    pub fn with_bid_amount(mut self, amount: U256) -> Self {
        self.bid_amount = amount;
        self
    }

    pub fn with_windows(mut self, bidding: Duration, reveal: Duration) -> Self {
        self.bidding_window = bidding;
        self.reveal_window = reveal;
        self
    }

    pub fn with_transfer_to(mut self, recipient: Address) -> Self {
        self.transfer_to = Some(recipient);
        self
    }
}

#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Applied to every transaction of the run.
    pub overrides: TxOverrides,
    /// Registration length passed to the FIFS registrars, in years.
    pub registration_duration: u64,
    /// Minimum age of a FIFS commitment before it can be revealed.
    pub commitment_age: Duration,
    pub auction: AuctionConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            overrides: TxOverrides::default(),
            registration_duration: 1,
            commitment_age: Duration::from_secs(60),
            auction: AuctionConfig::default(),
        }
    }
}

impl DeployConfig {
    pub fn with_overrides(mut self, overrides: TxOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_registration_duration(mut self, years: u64) -> Self {
        self.registration_duration = years;
        self
    }

    pub fn with_commitment_age(mut self, age: Duration) -> Self {
        self.commitment_age = age;
        self
    }

    pub fn with_auction(mut self, auction: AuctionConfig) -> Self {
        self.auction = auction;
        self
    }
}
