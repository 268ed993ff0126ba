use rns_core::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A call or a module creation (`to == None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub to: Option<Address>,
    pub data: Bytes,
    #[serde(default)]
    pub value: U256,
}

impl CallRequest {
    pub fn create(data: impl Into<Bytes>) -> Self {
        Self {
            to: None,
            data: data.into(),
            value: U256::ZERO,
        }
    }

    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: data.into(),
            value: U256::ZERO,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn is_creation(&self) -> bool {
        self.to.is_none()
    }

    /// First four bytes of the calldata, absent for creations.
    pub fn selector(&self) -> Option<[u8; 4]> {
        if self.is_creation() || self.data.len() < 4 {
            return None;
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&self.data[..4]);
        Some(selector)
    }
}

/// Caller-supplied transaction parameters. Set fields win over estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOverrides {
    pub gas: Option<u64>,
    pub gas_price: Option<U256>,
}

impl TxOverrides {
    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// Merge the estimate and the allocated nonce under these overrides.
    pub fn apply(&self, estimated_gas: u64, nonce: u64) -> TxParams {
        TxParams {
            gas: self.gas.unwrap_or(estimated_gas),
            gas_price: self.gas_price,
            nonce,
        }
    }
}

/// Final parameters of a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxParams {
    pub gas: u64,
    pub gas_price: Option<U256>,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    /// `false` when execution reverted after inclusion.
    pub status: bool,
    pub contract_address: Option<Address>,
}
