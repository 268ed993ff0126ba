use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hash::TLD;

/// How a name gets registered during a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationKind {
    /// First-come-first-served registrar.
    Direct,
    /// Legacy sealed-bid auction registrar.
    Auction,
    /// First-come-first-served registrar that also sets the resolved address.
    AddressBound,
}

impl RegistrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Auction => "auction",
            Self::AddressBound => "address_bound",
        }
    }
}

/// The three name lists a run accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationNames {
    #[serde(default)]
    pub direct: Vec<String>,
    #[serde(default)]
    pub auction: Vec<String>,
    #[serde(default)]
    pub address_bound: Vec<String>,
}

impl RegistrationNames {
    pub fn new(direct: Vec<String>, auction: Vec<String>, address_bound: Vec<String>) -> Self {
        Self {
            direct,
            auction,
            address_bound,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.auction.is_empty() && self.address_bound.is_empty()
    }

    /// Reject empty labels, labels containing dots and names used twice.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = std::collections::HashSet::new();
        for label in self
            .direct
            .iter()
            .chain(&self.auction)
            .chain(&self.address_bound)
        {
            if label.is_empty() || label.contains('.') {
                return Err(CoreError::InvalidName(label.clone()));
            }
            if !seen.insert(label.as_str()) {
                return Err(CoreError::InvalidName(format!("{} listed twice", label)));
            }
        }
        Ok(())
    }
}

pub fn full_name(label: &str) -> String {
    format!("{}.{}", label, TLD)
}
