use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::hash::{labelhash, node_for_label};

use super::names::full_name;

/// Lifecycle of a label in the sealed-bid auction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Started,
    Committed,
    Revealed,
    Finalized,
    Transferred,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::Committed => "committed",
            Self::Revealed => "revealed",
            Self::Finalized => "finalized",
            Self::Transferred => "transferred",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "idle" => Ok(Self::Idle),
            "started" => Ok(Self::Started),
            "committed" => Ok(Self::Committed),
            "revealed" => Ok(Self::Revealed),
            "finalized" => Ok(Self::Finalized),
            "transferred" => Ok(Self::Transferred),
            other => Err(CoreError::UnknownPhase(other.to_string())),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-label auction state owned by the auction coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionLabel {
    pub label: String,
    pub hash: B256,
    pub phase: Phase,
    pub sealed_bid: Option<B256>,
    pub amount: U256,
    pub salt: B256,
    pub bidder: Address,
    pub owner: Option<Address>,
    pub last_error: Option<String>,
}

impl AuctionLabel {
    pub fn new(label: impl Into<String>, bidder: Address, amount: U256, salt: B256) -> Self {
        let label = label.into();
        Self {
            hash: labelhash(&label),
            label,
            phase: Phase::default(),
            sealed_bid: None,
            amount,
            salt,
            bidder,
            owner: None,
            last_error: None,
        }
    }

    /// Registry node of `label.rsk`.
    pub fn node(&self) -> B256 {
        node_for_label(self.hash)
    }

    pub fn full_name(&self) -> String {
        full_name(&self.label)
    }
}
