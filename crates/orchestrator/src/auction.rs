//! Sealed-bid auction over a batch of labels.
//!
//! Phases run strictly in order for the whole batch; inside a phase every
//! label is submitted concurrently and every submission is awaited. Failures
//! after the batch start are contained per label and reported.

use chain::{CallRequest, Clock, TxOverrides};
use events::Event;
use futures::future::join_all;
use rns_core::{Address, Arg, AuctionLabel, DeploymentManifest, Phase, B256, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::abi;
use crate::config::AuctionConfig;
use crate::error::{OrchestratorError, Result};
use crate::executor::TransactionExecutor;
use crate::state_machine::PhaseStateMachine;
use crate::suite::{RIF_TOKEN, RNS, TOKEN_REGISTRAR};

const START_AUCTIONS: &str = "startAuctions(bytes32[])";
const SHA_BID: &str = "shaBid(bytes32,address,uint256,bytes32)";
const NEW_BID: &str = "newBid(bytes32,uint256)";
const UNSEAL_BID: &str = "unsealBid(bytes32,uint256,bytes32)";
const FINALIZE_AUCTION: &str = "finalizeAuction(bytes32)";
const TRANSFER: &str = "transfer(bytes32,address)";
const APPROVE: &str = "approve(address,uint256)";
const OWNER: &str = "owner(bytes32)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFailure {
    pub label: String,
    /// Phase the label was in when the attempt failed.
    pub phase: Phase,
    pub error: String,
}

/// Outcome of one batch phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// Phase the batch was moving to.
    pub phase: Phase,
    pub succeeded: Vec<String>,
    pub failed: Vec<LabelFailure>,
}

impl PhaseReport {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    NotAttempted,
    Succeeded,
    /// Attempted, with at least one label short of its final phase.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionReport {
    pub labels: Vec<AuctionLabel>,
    pub phases: Vec<PhaseReport>,
    /// Phase every label should reach.
    pub target: Phase,
    /// Batch-level error that stopped the auction, such as an unsupported clock.
    pub error: Option<String>,
}

impl AuctionReport {
    pub fn not_attempted() -> Self {
        Self {
            labels: Vec::new(),
            phases: Vec::new(),
            target: Phase::Finalized,
            error: None,
        }
    }

    pub fn status(&self) -> AuctionStatus {
        if self.labels.is_empty() {
            AuctionStatus::NotAttempted
        } else if self.error.is_none() && self.labels.iter().all(|l| l.phase == self.target) {
            AuctionStatus::Succeeded
        } else {
            AuctionStatus::Failed
        }
    }

    pub fn label(&self, name: &str) -> Option<&AuctionLabel> {
        self.labels.iter().find(|l| l.label == name)
    }
}

pub struct AuctionCoordinator {
    executor: TransactionExecutor,
    clock: Arc<dyn Clock>,
    config: AuctionConfig,
    manifest: DeploymentManifest,
    overrides: TxOverrides,
    labels: Vec<AuctionLabel>,
    bidding_window_elapsed: bool,
    reveal_window_elapsed: bool,
}

impl AuctionCoordinator {
    /// Prepare a batch. The registry, token and auction registrar must be in
    /// `manifest`. Every label gets a fresh random salt.
    pub fn new(
        executor: TransactionExecutor,
        clock: Arc<dyn Clock>,
        manifest: DeploymentManifest,
        config: AuctionConfig,
        labels: &[String],
    ) -> Result<Self> {
        for module in [RNS, RIF_TOKEN, TOKEN_REGISTRAR] {
            if !manifest.contains(module) {
                return Err(OrchestratorError::ModuleNotDeployed(module.to_string()));
            }
        }
        let bidder = executor.sender();
        let labels = labels
            .iter()
            .map(|label| AuctionLabel::new(label.clone(), bidder, config.bid_amount, B256::random()))
            .collect();
        Ok(Self {
            executor,
            clock,
            config,
            manifest,
            overrides: TxOverrides::default(),
            labels,
            bidding_window_elapsed: false,
            reveal_window_elapsed: false,
        })
    }

    pub fn with_overrides(mut self, overrides: TxOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn labels(&self) -> &[AuctionLabel] {
        &self.labels
    }

    pub fn label(&self, name: &str) -> Option<&AuctionLabel> {
        self.labels.iter().find(|l| l.label == name)
    }

    fn request(&self, module: &str, signature: &str, args: Vec<Arg>) -> Result<CallRequest> {
        let target = self
            .manifest
            .address(module)
            .ok_or_else(|| OrchestratorError::ModuleNotDeployed(module.to_string()))?;
        let data = abi::encode_call(signature, &args, &self.manifest, self.executor.sender())?;
        Ok(CallRequest::call(target, data))
    }

    async fn send(&self, description: String, request: Result<CallRequest>) -> Result<()> {
        self.executor
            .execute_and_wait(description, request?, self.overrides)
            .await
            .map(|_| ())
    }

    /// Indices of labels allowed to move to `to`. Labels in any other phase
    /// are reported, except those left behind by an earlier failure.
    fn select(&self, to: Phase, report: &mut PhaseReport) -> Vec<usize> {
        let from = PhaseStateMachine::previous_phase(to);
        let mut eligible = Vec::new();
        for (index, label) in self.labels.iter().enumerate() {
            match PhaseStateMachine::validate_transition(&label.label, label.phase, to) {
                Ok(()) => eligible.push(index),
                Err(_) if label.last_error.is_some() && Some(label.phase) < from => {}
                Err(e) => report.failed.push(LabelFailure {
                    label: label.label.clone(),
                    phase: label.phase,
                    error: e.to_string(),
                }),
            }
        }
        eligible
    }

    fn any_in(&self, phase: Phase) -> bool {
        self.labels.iter().any(|label| label.phase == phase)
    }

    fn settle<T>(
        &mut self,
        index: usize,
        to: Phase,
        result: Result<T>,
        report: &mut PhaseReport,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                let label = &mut self.labels[index];
                label.phase = to;
                label.last_error = None;
                report.succeeded.push(label.label.clone());
                Some(value)
            }
            Err(e) => {
                self.fail(index, e.to_string(), report);
                None
            }
        }
    }

    fn fail(&mut self, index: usize, error: String, report: &mut PhaseReport) {
        let label = &mut self.labels[index];
        warn!(label = %label.label, phase = %label.phase, error = %error, "Auction step failed");
        report.failed.push(LabelFailure {
            label: label.label.clone(),
            phase: label.phase,
            error: error.clone(),
        });
        label.last_error = Some(error);
    }

    fn finish(&self, report: PhaseReport) -> PhaseReport {
        info!(
            phase = %report.phase,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Auction phase completed"
        );
        self.executor.emit(Event::AuctionPhaseCompleted {
            phase: report.phase.to_string(),
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
        });
        report
    }

    /// Open bidding for every idle label with a single transaction.
    ///
    /// When the batch transaction cannot be estimated, for instance because
    /// one label is already under auction, each label is started on its own
    /// so the others are unaffected.
    pub async fn start_auctions(&mut self) -> PhaseReport {
        let mut report = PhaseReport::new(Phase::Started);
        let eligible = self.select(Phase::Started, &mut report);
        if eligible.is_empty() {
            return self.finish(report);
        }

        let hashes: Vec<B256> = eligible.iter().map(|&i| self.labels[i].hash).collect();
        let batch = self
            .send(
                format!("startAuctions ({} labels)", hashes.len()),
                self.request(TOKEN_REGISTRAR, START_AUCTIONS, vec![Arg::Bytes32Array(hashes)]),
            )
            .await;

        match batch {
            Ok(()) => {
                for index in eligible {
                    self.settle(index, Phase::Started, Ok(()), &mut report);
                }
            }
            Err(OrchestratorError::GasEstimation { .. }) if eligible.len() > 1 => {
                warn!("Batch start rejected, starting labels one by one");
                let this = &*self;
                let results = join_all(eligible.iter().map(|&i| {
                    let label = &this.labels[i];
                    this.send(
                        format!("startAuctions {}", label.full_name()),
                        this.request(
                            TOKEN_REGISTRAR,
                            START_AUCTIONS,
                            vec![Arg::Bytes32Array(vec![label.hash])],
                        ),
                    )
                }))
                .await;
                for (index, result) in eligible.into_iter().zip(results) {
                    self.settle(index, Phase::Started, result, &mut report);
                }
            }
            Err(e) => {
                let message = e.to_string();
                for index in eligible {
                    self.fail(index, message.clone(), &mut report);
                }
            }
        }
        self.finish(report)
    }

    /// Approve the batch's collateral once, then seal and submit every bid.
    pub async fn commit_bids(&mut self) -> PhaseReport {
        let mut report = PhaseReport::new(Phase::Committed);
        let eligible = self.select(Phase::Committed, &mut report);
        if eligible.is_empty() {
            return self.finish(report);
        }

        let total = eligible
            .iter()
            .fold(U256::ZERO, |sum, &i| sum + self.labels[i].amount);
        let approval = self
            .send(
                format!("approve {} for bids", total),
                self.request(
                    RIF_TOKEN,
                    APPROVE,
                    vec![Arg::module(TOKEN_REGISTRAR), Arg::Uint(total)],
                ),
            )
            .await;
        if let Err(e) = approval {
            let message = e.to_string();
            for index in eligible {
                self.fail(index, message.clone(), &mut report);
            }
            return self.finish(report);
        }

        let this = &*self;
        let results = join_all(eligible.iter().map(|&i| this.commit_label(&this.labels[i]))).await;
        for (index, result) in eligible.into_iter().zip(results) {
            if let Some(sealed) = self.settle(index, Phase::Committed, result, &mut report) {
                self.labels[index].sealed_bid = Some(sealed);
            }
        }
        self.finish(report)
    }

    async fn commit_label(&self, label: &AuctionLabel) -> Result<B256> {
        let seal_request = self.request(
            TOKEN_REGISTRAR,
            SHA_BID,
            vec![
                Arg::Bytes32(label.hash),
                Arg::Address(label.bidder),
                Arg::Uint(label.amount),
                Arg::Bytes32(label.salt),
            ],
        )?;
        let sealed = abi::decode_word(&self.executor.read(seal_request).await?)?;
        self.send(
            format!("newBid {}", label.full_name()),
            self.request(
                TOKEN_REGISTRAR,
                NEW_BID,
                vec![Arg::Bytes32(sealed), Arg::Uint(label.amount)],
            ),
        )
        .await?;
        Ok(sealed)
    }

    pub async fn advance_bidding_window(&mut self) -> Result<()> {
        self.executor
            .advance_clock(self.clock.as_ref(), self.config.bidding_window)
            .await?;
        self.bidding_window_elapsed = true;
        Ok(())
    }

    pub async fn advance_reveal_window(&mut self) -> Result<()> {
        self.executor
            .advance_clock(self.clock.as_ref(), self.config.reveal_window)
            .await?;
        self.reveal_window_elapsed = true;
        Ok(())
    }

    /// Reveal every committed bid with the values it was sealed with.
    ///
    /// Before the bidding window has been advanced past, every label fails
    /// with a phase order violation and stays committed.
    pub async fn reveal_bids(&mut self) -> PhaseReport {
        let mut report = PhaseReport::new(Phase::Revealed);
        let eligible = self.select(Phase::Revealed, &mut report);

        if !self.bidding_window_elapsed {
            for index in eligible {
                let label = &self.labels[index].label;
                let violation =
                    OrchestratorError::phase_order(label.clone(), Phase::Committed, Phase::Revealed);
                self.fail(index, violation.to_string(), &mut report);
            }
            return self.finish(report);
        }

        let this = &*self;
        let results = join_all(eligible.iter().map(|&i| {
            let label = &this.labels[i];
            this.unseal(label, label.amount, label.salt)
        }))
        .await;
        for (index, result) in eligible.into_iter().zip(results) {
            self.settle(index, Phase::Revealed, result, &mut report);
        }
        self.finish(report)
    }

    /// Reveal one label with explicit values.
    pub async fn reveal_label(&mut self, name: &str, amount: U256, salt: B256) -> Result<()> {
        let index = self
            .labels
            .iter()
            .position(|l| l.label == name)
            .ok_or_else(|| OrchestratorError::Plan(format!("label {} is not in the batch", name)))?;
        let phase = self.labels[index].phase;
        PhaseStateMachine::validate_transition(name, phase, Phase::Revealed)?;
        if !self.bidding_window_elapsed {
            return Err(OrchestratorError::phase_order(name, phase, Phase::Revealed));
        }

        let result = self.unseal(&self.labels[index], amount, salt).await;
        let label = &mut self.labels[index];
        match result {
            Ok(()) => {
                label.phase = Phase::Revealed;
                label.last_error = None;
                Ok(())
            }
            Err(e) => {
                label.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn unseal(&self, label: &AuctionLabel, amount: U256, salt: B256) -> Result<()> {
        self.send(
            format!("unsealBid {}", label.full_name()),
            self.request(
                TOKEN_REGISTRAR,
                UNSEAL_BID,
                vec![Arg::Bytes32(label.hash), Arg::Uint(amount), Arg::Bytes32(salt)],
            ),
        )
        .await
    }

    /// Close every revealed auction and read the resulting owner.
    pub async fn finalize(&mut self) -> PhaseReport {
        let mut report = PhaseReport::new(Phase::Finalized);
        let eligible = self.select(Phase::Finalized, &mut report);

        if !self.reveal_window_elapsed {
            for index in eligible {
                let label = &self.labels[index].label;
                let violation =
                    OrchestratorError::phase_order(label.clone(), Phase::Revealed, Phase::Finalized);
                self.fail(index, violation.to_string(), &mut report);
            }
            return self.finish(report);
        }

        let this = &*self;
        let results = join_all(eligible.iter().map(|&i| this.finalize_label(&this.labels[i]))).await;
        for (index, result) in eligible.into_iter().zip(results) {
            if let Some(owner) = self.settle(index, Phase::Finalized, result, &mut report) {
                self.labels[index].owner = Some(owner);
            }
        }
        self.finish(report)
    }

    async fn finalize_label(&self, label: &AuctionLabel) -> Result<Address> {
        self.send(
            format!("finalizeAuction {}", label.full_name()),
            self.request(TOKEN_REGISTRAR, FINALIZE_AUCTION, vec![Arg::Bytes32(label.hash)]),
        )
        .await?;
        self.read_owner(label.node()).await
    }

    async fn read_owner(&self, node: B256) -> Result<Address> {
        let request = self.request(RNS, OWNER, vec![Arg::Bytes32(node)])?;
        abi::decode_address(&self.executor.read(request).await?)
    }

    /// Hand every finalized name to `recipient`.
    pub async fn transfer_all(&mut self, recipient: Address) -> PhaseReport {
        let mut report = PhaseReport::new(Phase::Transferred);
        let eligible = self.select(Phase::Transferred, &mut report);

        let this = &*self;
        let results = join_all(eligible.iter().map(|&i| {
            let label = &this.labels[i];
            async move {
                this.send(
                    format!("transfer {} to {}", label.full_name(), recipient),
                    this.request(
                        TOKEN_REGISTRAR,
                        TRANSFER,
                        vec![Arg::Bytes32(label.hash), Arg::Address(recipient)],
                    ),
                )
                .await?;
                this.read_owner(label.node()).await
            }
        }))
        .await;
        for (index, result) in eligible.into_iter().zip(results) {
            if let Some(owner) = self.settle(index, Phase::Transferred, result, &mut report) {
                self.labels[index].owner = Some(owner);
            }
        }
        self.finish(report)
    }

    /// Drive the whole lifecycle. Never fails: problems end up in the report.
    pub async fn run(mut self) -> AuctionReport {
        let target = if self.config.transfer_to.is_some() {
            Phase::Transferred
        } else {
            Phase::Finalized
        };
        let mut report = AuctionReport {
            labels: Vec::new(),
            phases: Vec::new(),
            target,
            error: None,
        };
        if self.labels.is_empty() {
            return report;
        }

        report.phases.push(self.start_auctions().await);
        report.phases.push(self.commit_bids().await);
        if !self.any_in(Phase::Committed) {
            warn!("No committed bid left, skipping the auction windows");
            report.labels = self.labels;
            return report;
        }
        if let Err(e) = self.advance_bidding_window().await {
            warn!(error = %e, "Auction stopped before reveal");
            report.error = Some(e.to_string());
            report.labels = self.labels;
            return report;
        }
        report.phases.push(self.reveal_bids().await);
        if !self.any_in(Phase::Revealed) {
            warn!("No revealed bid left, skipping the reveal window");
            report.labels = self.labels;
            return report;
        }
        if let Err(e) = self.advance_reveal_window().await {
            warn!(error = %e, "Auction stopped before finalization");
            report.error = Some(e.to_string());
            report.labels = self.labels;
            return report;
        }
        report.phases.push(self.finalize().await);
        if let Some(recipient) = self.config.transfer_to {
            report.phases.push(self.transfer_all(recipient).await);
        }

        report.labels = self.labels;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain::testing::{FailureRule, FailureStage, MockChain};
    use chain::ChainClient;
    use rns_core::{labelhash, DeploymentRecord};

    async fn setup(chain: &MockChain, labels: &[&str]) -> AuctionCoordinator {
        let executor = TransactionExecutor::new(Arc::new(chain.clone()));
        let mut manifest = DeploymentManifest::new();
        for name in [RNS, RIF_TOKEN, TOKEN_REGISTRAR] {
            let receipt = executor
                .execute_and_wait(
                    format!("deploy {}", name),
                    CallRequest::create(name.as_bytes().to_vec()),
                    TxOverrides::default(),
                )
                .await
                .unwrap();
            manifest
                .insert(DeploymentRecord::new(
                    name,
                    receipt.contract_address.unwrap(),
                    receipt.tx_hash,
                ))
                .unwrap();
        }
        let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        AuctionCoordinator::new(
            executor,
            Arc::new(chain.clock()),
            manifest,
            AuctionConfig::default(),
            &labels,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let chain = MockChain::new();
        let coordinator = setup(&chain, &["bob", "dave"]).await;
        let report = coordinator.run().await;

        assert_eq!(report.status(), AuctionStatus::Succeeded);
        assert_eq!(report.phases.len(), 4);
        for label in &report.labels {
            assert_eq!(label.phase, Phase::Finalized);
            assert_eq!(label.owner, Some(chain.sender()));
            assert_eq!(chain.owner_of(label.node()), Some(chain.sender()));
        }
        assert_eq!(chain.calls_to(START_AUCTIONS), 1);
        assert_eq!(chain.calls_to(APPROVE), 1);
        assert_eq!(chain.calls_to(NEW_BID), 2);
    }

    #[tokio::test]
    async fn test_second_start_is_a_violation() {
        let chain = MockChain::new();
        let mut coordinator = setup(&chain, &["bob"]).await;

        assert!(coordinator.start_auctions().await.is_clean());
        let again = coordinator.start_auctions().await;
        assert_eq!(again.failed.len(), 1);
        assert_eq!(again.failed[0].phase, Phase::Started);
        assert_eq!(coordinator.label("bob").unwrap().phase, Phase::Started);
        assert_eq!(chain.calls_to(START_AUCTIONS), 1);
    }

    #[tokio::test]
    async fn test_batch_start_isolates_already_started_label() {
        let chain = MockChain::new();
        let mut first = setup(&chain, &["bob"]).await;
        assert!(first.start_auctions().await.is_clean());

        // Same chain, a new batch that includes the already started label.
        let labels = vec!["bob".to_string(), "dave".to_string()];
        let mut second = AuctionCoordinator::new(
            first.executor.clone(),
            Arc::new(chain.clock()),
            first.manifest.clone(),
            AuctionConfig::default(),
            &labels,
        )
        .unwrap();
        let report = second.start_auctions().await;

        assert_eq!(report.succeeded, vec!["dave".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].label, "bob");
        assert_eq!(second.label("bob").unwrap().phase, Phase::Idle);
        assert_eq!(second.label("dave").unwrap().phase, Phase::Started);
    }

    #[tokio::test]
    async fn test_reveal_before_window_is_rejected() {
        let chain = MockChain::new();
        let mut coordinator = setup(&chain, &["bob"]).await;
        coordinator.start_auctions().await;
        coordinator.commit_bids().await;

        let report = coordinator.reveal_bids().await;
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("cannot move from committed to revealed"));
        assert_eq!(coordinator.label("bob").unwrap().phase, Phase::Committed);
        assert_eq!(chain.calls_to(UNSEAL_BID), 0);

        // Once the window has passed the same label reveals normally.
        coordinator.advance_bidding_window().await.unwrap();
        assert!(coordinator.reveal_bids().await.is_clean());
        assert_eq!(coordinator.label("bob").unwrap().phase, Phase::Revealed);
    }

    #[tokio::test]
    async fn test_reveal_with_different_salt_stays_committed() {
        let chain = MockChain::new();
        let mut coordinator = setup(&chain, &["bob"]).await;
        coordinator.start_auctions().await;
        coordinator.commit_bids().await;
        coordinator.advance_bidding_window().await.unwrap();

        let label = coordinator.label("bob").unwrap().clone();
        let err = coordinator
            .reveal_label("bob", label.amount, B256::repeat_byte(0x77))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::GasEstimation { .. }));
        assert_eq!(coordinator.label("bob").unwrap().phase, Phase::Committed);

        let err = coordinator
            .reveal_label("bob", label.amount + U256::from(1u64), label.salt)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::GasEstimation { .. }));

        coordinator
            .reveal_label("bob", label.amount, label.salt)
            .await
            .unwrap();
        assert_eq!(coordinator.label("bob").unwrap().phase, Phase::Revealed);
    }

    #[tokio::test]
    async fn test_reveal_label_before_window() {
        let chain = MockChain::new();
        let mut coordinator = setup(&chain, &["bob"]).await;
        coordinator.start_auctions().await;
        coordinator.commit_bids().await;

        let label = coordinator.label("bob").unwrap().clone();
        let err = coordinator
            .reveal_label("bob", label.amount, label.salt)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::PhaseOrderViolation { .. }));
        assert_eq!(coordinator.label("bob").unwrap().phase, Phase::Committed);
    }

    #[tokio::test]
    async fn test_one_failing_bid_does_not_abort_batch() {
        let chain = MockChain::new();
        chain.fail(FailureRule::call(FailureStage::Read, SHA_BID).with_word(labelhash("dave")));
        let coordinator = setup(&chain, &["bob", "dave"]).await;
        let report = coordinator.run().await;

        assert_eq!(report.status(), AuctionStatus::Failed);
        assert_eq!(report.label("bob").unwrap().phase, Phase::Finalized);
        let dave = report.label("dave").unwrap();
        assert_eq!(dave.phase, Phase::Started);
        assert!(dave.last_error.is_some());

        let commit = &report.phases[1];
        assert_eq!(commit.succeeded, vec!["bob".to_string()]);
        assert_eq!(commit.failed[0].label, "dave");
        // Left behind, so later phases do not report it again.
        assert!(report.phases[2].failed.is_empty());
    }

    #[tokio::test]
    async fn test_failed_start_skips_clock_windows() {
        let chain = MockChain::new();
        chain.fail(FailureRule::call(FailureStage::Estimate, START_AUCTIONS));
        let coordinator = setup(&chain, &["bob"]).await;
        let before = chain.timestamp();
        let report = coordinator.run().await;

        assert_eq!(report.status(), AuctionStatus::Failed);
        assert_eq!(report.label("bob").unwrap().phase, Phase::Idle);
        assert_eq!(report.phases.len(), 2);
        assert_eq!(chain.timestamp(), before);
    }

    #[tokio::test]
    async fn test_failed_reveals_skip_reveal_window() {
        let chain = MockChain::new();
        chain.fail(FailureRule::call(FailureStage::Estimate, UNSEAL_BID));
        let coordinator = setup(&chain, &["bob"]).await;
        let before = chain.timestamp();
        let report = coordinator.run().await;

        assert_eq!(report.label("bob").unwrap().phase, Phase::Committed);
        assert_eq!(report.phases.len(), 3);
        assert_eq!(chain.calls_to(FINALIZE_AUCTION), 0);
        assert_eq!(chain.timestamp(), before + AuctionConfig::default().bidding_window.as_secs());
    }

    #[tokio::test]
    async fn test_unsupported_clock_stops_auction() {
        let chain = MockChain::new();
        let mut coordinator = setup(&chain, &["bob"]).await;
        coordinator.clock = Arc::new(chain.unsupported_clock());
        let report = coordinator.run().await;

        assert_eq!(report.status(), AuctionStatus::Failed);
        assert!(report.error.as_deref().unwrap().contains("unsupported"));
        assert_eq!(report.label("bob").unwrap().phase, Phase::Committed);
    }

    #[tokio::test]
    async fn test_transfer_to_recipient() {
        let chain = MockChain::new();
        let recipient = Address::repeat_byte(0xd0);
        let mut coordinator = setup(&chain, &["bob"]).await;
        coordinator.config = AuctionConfig::default().with_transfer_to(recipient);
        let report = coordinator.run().await;

        assert_eq!(report.status(), AuctionStatus::Succeeded);
        let bob = report.label("bob").unwrap();
        assert_eq!(bob.phase, Phase::Transferred);
        assert_eq!(bob.owner, Some(recipient));
    }

    #[test]
    fn test_empty_report_is_not_attempted() {
        assert_eq!(AuctionReport::not_attempted().status(), AuctionStatus::NotAttempted);
    }
}
