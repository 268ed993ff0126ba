//! In-memory chain for tests.
//!
//! [`MockChain`] keeps one shared world state for every address: module
//! creation, the registry's ownership table, the auction registrar and the
//! FIFS registrars all read and write the same maps. Calls whose selector it
//! does not simulate succeed as no-ops on any address that has code.

use async_trait::async_trait;
use rns_core::{keccak256, node_for_label, Address, Bytes, B256, U256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::client::{selector, ChainClient};
use crate::clock::{Clock, ClockAdvance, ClockError};
use crate::error::{ChainError, Result};
use crate::submission::{SubmissionEvent, SubmissionReceiver};
use crate::types::{CallRequest, Receipt, TxParams};

pub const BIDDING_PERIOD: u64 = 3 * 24 * 60 * 60;
pub const REVEAL_PERIOD: u64 = 2 * 24 * 60 * 60;
pub const MIN_COMMITMENT_AGE: u64 = 60;
const GENESIS_TIMESTAMP: u64 = 1_600_000_000;

/// Where an injected failure strikes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// `estimate_gas` reverts.
    Estimate,
    /// `submit` is rejected by the node.
    Broadcast,
    /// The transaction is mined with a failed status.
    Receipt,
    /// The submission stream closes after `Submitted` without an outcome.
    Drop,
    /// `call` reverts.
    Read,
}

#[derive(Debug, Clone)]
pub struct FailureRule {
    pub stage: FailureStage,
    selector: Option<[u8; 4]>,
    word: Option<B256>,
    creation_prefix: Option<Vec<u8>>,
    pub message: String,
}

impl FailureRule {
    /// Match calls to `signature`, e.g. `"newBid(bytes32,uint256)"`.
    pub fn call(stage: FailureStage, signature: &str) -> Self {
        Self {
            stage,
            selector: Some(selector(signature)),
            word: None,
            creation_prefix: None,
            message: format!("injected failure in {}", signature),
        }
    }

    /// Match creations whose payload starts with `prefix`.
    pub fn creation(stage: FailureStage, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            stage,
            selector: None,
            word: None,
            creation_prefix: Some(prefix.into()),
            message: "injected failure in creation".to_string(),
        }
    }

    /// Only match calls carrying `word` as one of their 32-byte arguments.
    pub fn with_word(mut self, word: B256) -> Self {
        self.word = Some(word);
        self
    }

    fn matches(&self, stage: FailureStage, call: &CallRequest) -> bool {
        if self.stage != stage {
            return false;
        }
        if let Some(prefix) = &self.creation_prefix {
            return call.is_creation() && call.data.starts_with(prefix);
        }
        if call.selector() != self.selector {
            return false;
        }
        match self.word {
            Some(word) => call.data[4..].chunks(32).any(|chunk| chunk == word.as_slice()),
            None => true,
        }
    }
}

/// A transaction as the mock recorded it.
#[derive(Debug, Clone)]
pub struct RecordedTx {
    pub hash: B256,
    pub nonce: u64,
    pub to: Option<Address>,
    pub data: Bytes,
    pub status: bool,
    pub contract_address: Option<Address>,
}

impl RecordedTx {
    pub fn is_call_to(&self, signature: &str) -> bool {
        !self.data.is_empty()
            && self.to.is_some()
            && self.data.starts_with(&selector(signature))
    }
}

#[derive(Debug, Clone)]
struct MockState {
    sender: Address,
    nonce: u64,
    block: u64,
    timestamp: u64,
    code: HashMap<Address, Bytes>,
    transactions: Vec<RecordedTx>,
    auction_starts: HashMap<B256, u64>,
    sealed_bids: HashSet<B256>,
    winners: HashMap<B256, Address>,
    owners: HashMap<B256, Address>,
    addrs: HashMap<B256, Address>,
    default_resolver: Option<Address>,
    resolvers: HashMap<B256, Address>,
    commitments: HashMap<B256, u64>,
    failures: Vec<FailureRule>,
}

impl MockState {
    /// New nodes pick up the registry's default resolver.
    fn assign_default_resolver(&mut self, node: B256) {
        if let Some(resolver) = self.default_resolver {
            self.resolvers.entry(node).or_insert(resolver);
        }
    }

    fn failure(&self, stage: FailureStage, call: &CallRequest) -> Option<FailureRule> {
        self.failures
            .iter()
            .find(|rule| rule.matches(stage, call))
            .cloned()
    }
}

#[derive(Clone)]
pub struct MockChain {
    state: Arc<Mutex<MockState>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::with_sender(Address::repeat_byte(0x5e))
    }

    pub fn with_sender(sender: Address) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                sender,
                nonce: 0,
                block: 0,
                timestamp: GENESIS_TIMESTAMP,
                code: HashMap::new(),
                transactions: Vec::new(),
                auction_starts: HashMap::new(),
                sealed_bids: HashSet::new(),
                winners: HashMap::new(),
                owners: HashMap::new(),
                addrs: HashMap::new(),
                default_resolver: None,
                resolvers: HashMap::new(),
                commitments: HashMap::new(),
                failures: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail(&self, rule: FailureRule) -> &Self {
        self.state().failures.push(rule);
        self
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// A clock that moves this chain's timestamp.
    pub fn clock(&self) -> MockClock {
        MockClock {
            state: self.state.clone(),
            supported: true,
        }
    }

    /// A clock for a node that cannot simulate time.
    pub fn unsupported_clock(&self) -> MockClock {
        MockClock {
            state: self.state.clone(),
            supported: false,
        }
    }

    pub fn transactions(&self) -> Vec<RecordedTx> {
        self.state().transactions.clone()
    }

    pub fn calls_to(&self, signature: &str) -> usize {
        self.state()
            .transactions
            .iter()
            .filter(|tx| tx.is_call_to(signature))
            .count()
    }

    pub fn creations(&self) -> usize {
        self.state()
            .transactions
            .iter()
            .filter(|tx| tx.to.is_none())
            .count()
    }

    pub fn owner_of(&self, node: B256) -> Option<Address> {
        self.state().owners.get(&node).copied()
    }

    pub fn addr_of(&self, node: B256) -> Option<Address> {
        self.state().addrs.get(&node).copied()
    }

    pub fn resolver_of(&self, node: B256) -> Option<Address> {
        self.state().resolvers.get(&node).copied()
    }

    pub fn code_at(&self, address: Address) -> Option<Bytes> {
        self.state().code.get(&address).cloned()
    }

    pub fn timestamp(&self) -> u64 {
        self.state().timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.state().nonce
    }

    /// Consume `count` nonces as if another process sent from the same account.
    pub fn use_nonces(&self, count: u64) {
        self.state().nonce += count;
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn sender(&self) -> Address {
        self.state().sender
    }

    async fn pending_nonce(&self) -> Result<u64> {
        Ok(self.state().nonce)
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64> {
        let state = self.state();
        if let Some(rule) = state.failure(FailureStage::Estimate, call) {
            return Err(ChainError::Reverted(rule.message));
        }
        let mut scratch = state.clone();
        let sender = scratch.sender;
        apply(&mut scratch, sender, call).map_err(ChainError::Reverted)?;

        let base = if call.is_creation() { 53_000 } else { 21_000 };
        Ok(base + 16 * call.data.len() as u64)
    }

    async fn submit(&self, call: &CallRequest, params: TxParams) -> Result<SubmissionReceiver> {
        let mut state = self.state();
        if params.nonce != state.nonce {
            let relation = if params.nonce < state.nonce { "low" } else { "high" };
            return Err(ChainError::Rpc {
                code: -32000,
                message: format!(
                    "nonce too {}: expected {}, got {}",
                    relation, state.nonce, params.nonce
                ),
            });
        }
        if let Some(rule) = state.failure(FailureStage::Broadcast, call) {
            return Err(ChainError::Rpc {
                code: -32000,
                message: rule.message,
            });
        }

        let sender = state.sender;
        let mut hash_input = sender.to_vec();
        hash_input.extend_from_slice(&params.nonce.to_be_bytes());
        let hash = keccak256(&hash_input);

        let forced_failure = state.failure(FailureStage::Receipt, call).is_some();
        let dropped = state.failure(FailureStage::Drop, call).is_some();

        // Execute against a copy so a failed transaction leaves no trace.
        let mut next = state.clone();
        let outcome = if forced_failure {
            Err("forced receipt failure".to_string())
        } else {
            apply(&mut next, sender, call)
        };
        if outcome.is_ok() {
            *state = next;
        }

        state.nonce += 1;
        state.block += 1;
        let contract_address = outcome.as_ref().ok().copied().flatten();
        state.transactions.push(RecordedTx {
            hash,
            nonce: params.nonce,
            to: call.to,
            data: call.data.clone(),
            status: outcome.is_ok(),
            contract_address,
        });
        let receipt = Receipt {
            tx_hash: hash,
            block_number: state.block,
            gas_used: params.gas.min(21_000 + 16 * call.data.len() as u64),
            status: outcome.is_ok(),
            contract_address,
        };
        drop(state);

        let (events, receiver) = SubmissionReceiver::channel();
        let _ = events.try_send(SubmissionEvent::Submitted(hash));
        if !dropped {
            let _ = events.try_send(SubmissionEvent::Confirmed(receipt));
        }
        Ok(receiver)
    }

    async fn call(&self, call: &CallRequest) -> Result<Bytes> {
        let state = self.state();
        if let Some(rule) = state.failure(FailureStage::Read, call) {
            return Err(ChainError::Reverted(rule.message));
        }
        read(&state, call).map_err(ChainError::Reverted)
    }
}

/// Moves the mock chain's timestamp forward.
#[derive(Clone)]
pub struct MockClock {
    state: Arc<Mutex<MockState>>,
    supported: bool,
}

#[async_trait]
impl Clock for MockClock {
    async fn advance(&self, duration: Duration) -> std::result::Result<ClockAdvance, ClockError> {
        if !self.supported {
            return Err(ClockError::Unsupported("evm_increaseTime".to_string()));
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.timestamp += duration.as_secs();
        state.block += 1;
        Ok(ClockAdvance::Simulated)
    }
}

struct Args<'a>(&'a [u8]);

impl<'a> Args<'a> {
    fn of(call: &'a CallRequest) -> Self {
        Args(call.data.get(4..).unwrap_or_default())
    }

    fn word_at(&self, offset: usize) -> std::result::Result<B256, String> {
        self.0
            .get(offset..offset + 32)
            .map(B256::from_slice)
            .ok_or_else(|| "calldata too short".to_string())
    }

    fn word(&self, index: usize) -> std::result::Result<B256, String> {
        self.word_at(index * 32)
    }

    fn address(&self, index: usize) -> std::result::Result<Address, String> {
        Ok(Address::from_word(self.word(index)?))
    }

    fn uint(&self, index: usize) -> std::result::Result<U256, String> {
        Ok(U256::from_be_bytes(self.word(index)?.0))
    }

    fn usize_at(&self, offset: usize) -> std::result::Result<usize, String> {
        let value = U256::from_be_bytes(self.word_at(offset)?.0);
        usize::try_from(value).map_err(|_| "offset out of range".to_string())
    }

    fn bytes32_array(&self, index: usize) -> std::result::Result<Vec<B256>, String> {
        let offset = self.usize_at(index * 32)?;
        let len = self.usize_at(offset)?;
        (0..len)
            .map(|i| self.word_at(offset + 32 + i * 32))
            .collect()
    }

    fn string(&self, index: usize) -> std::result::Result<String, String> {
        let offset = self.usize_at(index * 32)?;
        let len = self.usize_at(offset)?;
        let bytes = self
            .0
            .get(offset + 32..offset + 32 + len)
            .ok_or_else(|| "string out of bounds".to_string())?;
        String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
    }
}

fn is(call: &CallRequest, signature: &str) -> bool {
    call.selector() == Some(selector(signature))
}

fn seal(label: B256, bidder: Address, value: U256, salt: B256) -> B256 {
    let mut input = Vec::with_capacity(116);
    input.extend_from_slice(label.as_slice());
    input.extend_from_slice(bidder.as_slice());
    input.extend_from_slice(&value.to_be_bytes::<32>());
    input.extend_from_slice(salt.as_slice());
    keccak256(&input)
}

fn commitment(label: B256, owner: Address, secret: B256) -> B256 {
    let mut input = Vec::with_capacity(84);
    input.extend_from_slice(label.as_slice());
    input.extend_from_slice(owner.as_slice());
    input.extend_from_slice(secret.as_slice());
    keccak256(&input)
}

fn ensure(condition: bool, message: &str) -> std::result::Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(format!("execution reverted: {}", message))
    }
}

/// Execute a state-changing call. Returns the created address for creations.
fn apply(
    state: &mut MockState,
    sender: Address,
    call: &CallRequest,
) -> std::result::Result<Option<Address>, String> {
    let Some(to) = call.to else {
        ensure(!call.data.is_empty(), "empty creation payload")?;
        let address = sender.create(state.nonce);
        state.code.insert(address, call.data.clone());
        return Ok(Some(address));
    };
    ensure(state.code.contains_key(&to), "call to non-contract")?;
    let args = Args::of(call);
    let now = state.timestamp;

    if is(call, "setSubnodeOwner(bytes32,bytes32,address)") {
        let node = args.word(0)?;
        let label = args.word(1)?;
        let mut input = node.to_vec();
        input.extend_from_slice(label.as_slice());
        let subnode = keccak256(&input);
        state.owners.insert(subnode, args.address(2)?);
        state.assign_default_resolver(subnode);
    } else if is(call, "setDefaultResolver(address)") {
        state.default_resolver = Some(args.address(0)?);
    } else if is(call, "setResolver(bytes32,address)") {
        state.resolvers.insert(args.word(0)?, args.address(1)?);
    } else if is(call, "startAuctions(bytes32[])") {
        let labels = args.bytes32_array(0)?;
        for label in &labels {
            ensure(
                !state.auction_starts.contains_key(label),
                "auction already started",
            )?;
        }
        for label in labels {
            state.auction_starts.insert(label, now);
        }
    } else if is(call, "newBid(bytes32,uint256)") {
        state.sealed_bids.insert(args.word(0)?);
    } else if is(call, "unsealBid(bytes32,uint256,bytes32)") {
        let label = args.word(0)?;
        let start = state
            .auction_starts
            .get(&label)
            .copied()
            .ok_or_else(|| "execution reverted: auction not started".to_string())?;
        ensure(now >= start + BIDDING_PERIOD, "bidding still open")?;
        ensure(now < start + BIDDING_PERIOD + REVEAL_PERIOD, "reveal closed")?;
        let sealed = seal(label, sender, args.uint(1)?, args.word(2)?);
        ensure(state.sealed_bids.remove(&sealed), "unknown bid")?;
        state.winners.insert(label, sender);
    } else if is(call, "finalizeAuction(bytes32)") {
        let label = args.word(0)?;
        let start = state
            .auction_starts
            .get(&label)
            .copied()
            .ok_or_else(|| "execution reverted: auction not started".to_string())?;
        ensure(now >= start + BIDDING_PERIOD + REVEAL_PERIOD, "auction not ended")?;
        let winner = state
            .winners
            .get(&label)
            .copied()
            .ok_or_else(|| "execution reverted: no revealed bid".to_string())?;
        let node = node_for_label(label);
        state.owners.insert(node, winner);
        state.assign_default_resolver(node);
    } else if is(call, "transfer(bytes32,address)") {
        let node = node_for_label(args.word(0)?);
        ensure(state.owners.get(&node) == Some(&sender), "not owner")?;
        state.owners.insert(node, args.address(1)?);
    } else if is(call, "commit(bytes32)") {
        let commitment = args.word(0)?;
        ensure(
            !state.commitments.contains_key(&commitment),
            "existent commitment",
        )?;
        state.commitments.insert(commitment, now);
    } else if is(call, "register(string,address,bytes32,uint256)")
        || is(call, "register(string,address,bytes32,uint256,address)")
    {
        let name = args.string(0)?;
        let owner = args.address(1)?;
        let label = keccak256(name.as_bytes());
        let key = commitment(label, owner, args.word(2)?);
        let committed = state
            .commitments
            .remove(&key)
            .ok_or_else(|| "execution reverted: no commitment found".to_string())?;
        ensure(now >= committed + MIN_COMMITMENT_AGE, "not enough time")?;
        let node = node_for_label(label);
        ensure(!state.owners.contains_key(&node), "not available")?;
        state.owners.insert(node, owner);
        state.assign_default_resolver(node);
        if is(call, "register(string,address,bytes32,uint256,address)") {
            state.addrs.insert(node, args.address(4)?);
        }
    }
    Ok(None)
}

/// Execute a read-only call.
fn read(state: &MockState, call: &CallRequest) -> std::result::Result<Bytes, String> {
    let to = call
        .to
        .ok_or_else(|| "execution reverted: read without target".to_string())?;
    ensure(state.code.contains_key(&to), "call to non-contract")?;
    let args = Args::of(call);

    let word = if is(call, "owner(bytes32)") {
        let owner = state.owners.get(&args.word(0)?).copied().unwrap_or_default();
        owner.into_word()
    } else if is(call, "resolver(bytes32)") {
        let resolver = state.resolvers.get(&args.word(0)?).copied().unwrap_or_default();
        resolver.into_word()
    } else if is(call, "addr(bytes32)") {
        let addr = state.addrs.get(&args.word(0)?).copied().unwrap_or_default();
        addr.into_word()
    } else if is(call, "shaBid(bytes32,address,uint256,bytes32)") {
        seal(args.word(0)?, args.address(1)?, args.uint(2)?, args.word(3)?)
    } else if is(call, "makeCommitment(bytes32,address,bytes32)") {
        commitment(args.word(0)?, args.address(1)?, args.word(2)?)
    } else if is(call, "price(string,uint256,uint256)") {
        let price = U256::from(2_000_000_000_000_000_000u128) * args.uint(2)?;
        B256::from(price.to_be_bytes::<32>())
    } else {
        B256::ZERO
    };
    Ok(Bytes::copy_from_slice(word.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_data(signature: &str, words: &[B256]) -> Vec<u8> {
        let mut data = selector(signature).to_vec();
        for word in words {
            data.extend_from_slice(word.as_slice());
        }
        data
    }

    async fn send(chain: &MockChain, call: CallRequest) -> Receipt {
        let nonce = chain.pending_nonce().await.unwrap();
        let params = TxParams {
            gas: 1_000_000,
            gas_price: None,
            nonce,
        };
        let mut rx = chain.submit(&call, params).await.unwrap();
        assert!(matches!(rx.next_event().await, Some(SubmissionEvent::Submitted(_))));
        match rx.next_event().await {
            Some(SubmissionEvent::Confirmed(receipt)) => receipt,
            other => panic!("Expected receipt, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_creation_addresses_follow_nonce() {
        let chain = MockChain::new();
        let receipt = send(&chain, CallRequest::create(vec![0x60, 0x80])).await;
        let expected = chain.sender().create(0);
        assert_eq!(receipt.contract_address, Some(expected));
        assert!(chain.code_at(expected).is_some());
        assert_eq!(chain.nonce(), 1);
    }

    #[tokio::test]
    async fn test_wrong_nonce_is_rejected() {
        let chain = MockChain::new();
        let params = TxParams {
            gas: 100_000,
            gas_price: None,
            nonce: 7,
        };
        let err = chain
            .submit(&CallRequest::create(vec![0x60]), params)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("nonce too high"));
        assert_eq!(chain.nonce(), 0);
    }

    #[tokio::test]
    async fn test_call_to_missing_code_reverts_on_estimate() {
        let chain = MockChain::new();
        let call = CallRequest::call(Address::repeat_byte(9), selector("run()").to_vec());
        let err = chain.estimate_gas(&call).await.unwrap_err();
        assert!(matches!(err, ChainError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_set_subnode_owner_updates_registry() {
        let chain = MockChain::new();
        let registry = send(&chain, CallRequest::create(vec![0x01]))
            .await
            .contract_address
            .unwrap();
        let label = keccak256("rsk".as_bytes());
        let owner = Address::repeat_byte(0x42);
        let data = call_data(
            "setSubnodeOwner(bytes32,bytes32,address)",
            &[B256::ZERO, label, owner.into_word()],
        );
        assert!(send(&chain, CallRequest::call(registry, data)).await.status);
        assert_eq!(chain.owner_of(rns_core::namehash("rsk")), Some(owner));
    }

    #[tokio::test]
    async fn test_injected_receipt_failure_consumes_nonce() {
        let chain = MockChain::new();
        chain.fail(FailureRule::creation(FailureStage::Receipt, vec![0xfe]));
        let receipt = send(&chain, CallRequest::create(vec![0xfe, 0x00])).await;
        assert!(!receipt.status);
        assert_eq!(chain.nonce(), 1);
        assert_eq!(chain.creations(), 1);
    }

    #[tokio::test]
    async fn test_unsealing_before_window_fails() {
        let chain = MockChain::new();
        let registrar = send(&chain, CallRequest::create(vec![0x02]))
            .await
            .contract_address
            .unwrap();
        let label = keccak256("alice".as_bytes());
        let salt = B256::repeat_byte(3);
        let value = U256::from(1u64);

        let mut start = selector("startAuctions(bytes32[])").to_vec();
        start.extend_from_slice(B256::from(U256::from(32u64).to_be_bytes::<32>()).as_slice());
        start.extend_from_slice(B256::from(U256::from(1u64).to_be_bytes::<32>()).as_slice());
        start.extend_from_slice(label.as_slice());
        assert!(send(&chain, CallRequest::call(registrar, start)).await.status);

        let sealed = seal(label, chain.sender(), value, salt);
        let bid = call_data(
            "newBid(bytes32,uint256)",
            &[sealed, B256::from(value.to_be_bytes::<32>())],
        );
        assert!(send(&chain, CallRequest::call(registrar, bid)).await.status);

        let unseal = CallRequest::call(
            registrar,
            call_data(
                "unsealBid(bytes32,uint256,bytes32)",
                &[label, B256::from(value.to_be_bytes::<32>()), salt],
            ),
        );
        assert!(chain.estimate_gas(&unseal).await.is_err());

        chain
            .clock()
            .advance(Duration::from_secs(BIDDING_PERIOD))
            .await
            .unwrap();
        assert!(chain.estimate_gas(&unseal).await.is_ok());
    }

    #[tokio::test]
    async fn test_unsupported_clock() {
        let chain = MockChain::new();
        let err = chain
            .unsupported_clock()
            .advance(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClockError::Unsupported(_)));
        assert_eq!(chain.timestamp(), GENESIS_TIMESTAMP);
    }
}
