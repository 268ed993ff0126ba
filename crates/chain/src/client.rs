use async_trait::async_trait;
use rns_core::{keccak256, Address, Bytes, B256};

use crate::error::Result;
use crate::submission::SubmissionReceiver;
use crate::types::{CallRequest, TxParams};

/// The remote chain as seen by the deployer.
///
/// All transactions originate from [`ChainClient::sender`]. Implementations
/// do not allocate nonces; callers pass one in [`TxParams`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn sender(&self) -> Address;

    /// Number of transactions the sender has sent, including pending ones.
    async fn pending_nonce(&self) -> Result<u64>;

    /// Simulate `call` and return its gas cost. A revert is an error.
    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64>;

    /// Broadcast `call`. `Ok` means the node accepted the transaction; the
    /// receiver then yields `Submitted` followed by exactly one terminal
    /// event. `Err` means it was rejected and the nonce was not used.
    async fn submit(&self, call: &CallRequest, params: TxParams) -> Result<SubmissionReceiver>;

    /// Execute a read-only call against the latest state.
    async fn call(&self, call: &CallRequest) -> Result<Bytes>;

    fn hash(&self, data: &[u8]) -> B256 {
        keccak256(data)
    }
}

/// Four-byte function selector of a canonical signature such as
/// `"setDefaultResolver(address)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_slice()[..4]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_matches_known_values() {
        // ERC20 transfer(address,uint256)
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        // ERC20 approve(address,uint256)
        assert_eq!(selector("approve(address,uint256)"), [0x09, 0x5e, 0xa7, 0xb3]);
    }
}
