use chain::{CallRequest, ChainClient, Clock, ClockAdvance, Receipt, SubmissionEvent, SubmissionReceiver, TxOverrides};
use events::{Event, EventBus};
use rns_core::{Address, Bytes, B256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, Result, TransactionError};
use crate::nonce::NonceAllocator;

/// Observable state of a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Submitted(B256),
    Confirmed(Receipt),
    Failed(TransactionError),
}

impl TransactionStatus {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Submitted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    Confirmed(Receipt),
    Failed(TransactionError),
}

impl TransactionOutcome {
    pub fn into_result(self) -> std::result::Result<Receipt, TransactionError> {
        match self {
            Self::Confirmed(receipt) => Ok(receipt),
            Self::Failed(error) => Err(error),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

/// Handle to a transaction the node accepted.
///
/// Dropping the handle does not retract the transaction; it keeps being
/// watched until it resolves.
pub struct PendingTransaction {
    description: String,
    tx_hash: B256,
    status: watch::Receiver<TransactionStatus>,
    outcome: oneshot::Receiver<TransactionOutcome>,
}

impl PendingTransaction {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    pub fn status(&self) -> TransactionStatus {
        self.status.borrow().clone()
    }

    /// Wait for the single terminal outcome.
    pub async fn outcome(self) -> TransactionOutcome {
        self.outcome
            .await
            .unwrap_or(TransactionOutcome::Failed(TransactionError::Dropped {
                tx_hash: self.tx_hash,
            }))
    }
}

/// Estimates, broadcasts and tracks transactions from the chain's sender.
///
/// Every broadcast takes its nonce from the executor's [`NonceAllocator`].
#[derive(Clone)]
pub struct TransactionExecutor {
    client: Arc<dyn ChainClient>,
    nonces: Arc<NonceAllocator>,
    event_bus: Option<EventBus>,
}

impl TransactionExecutor {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self {
            nonces: Arc::new(NonceAllocator::new(client.clone())),
            client,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn sender(&self) -> Address {
        self.client.sender()
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.event_bus.as_ref()
    }

    pub(crate) fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event);
        }
    }

    /// Move chain time forward through `clock` and announce it.
    pub async fn advance_clock(&self, clock: &dyn Clock, duration: Duration) -> Result<ClockAdvance> {
        let advance = clock.advance(duration).await?;
        info!(seconds = duration.as_secs(), mode = ?advance, "Clock advanced");
        self.emit(Event::ClockAdvanced {
            seconds: duration.as_secs(),
            simulated: advance == ClockAdvance::Simulated,
        });
        Ok(advance)
    }

    /// Estimate, broadcast and start watching `request`.
    ///
    /// A reverting estimate fails with `GasEstimation` before anything is
    /// broadcast. A rejected broadcast fails with `TransactionError::Rejected`
    /// and the nonce counter is re-read from the chain before the next one.
    pub async fn execute(
        &self,
        description: impl Into<String>,
        request: CallRequest,
        overrides: TxOverrides,
    ) -> Result<PendingTransaction> {
        let description = description.into();

        let estimate = match self.client.estimate_gas(&request).await {
            Ok(gas) => gas,
            Err(e) => {
                warn!(description = %description, error = %e, "Gas estimation failed");
                self.emit(Event::TransactionFailed {
                    description: description.clone(),
                    tx_hash: None,
                    error: e.to_string(),
                });
                return Err(OrchestratorError::gas_estimation(description, e.to_string()));
            }
        };

        let reservation = self.nonces.reserve().await?;
        let params = overrides.apply(estimate, reservation.nonce());
        debug!(
            description = %description,
            nonce = params.nonce,
            gas = params.gas,
            "Broadcasting transaction"
        );

        let mut events = match self.client.submit(&request, params).await {
            Ok(events) => {
                reservation.commit();
                events
            }
            Err(e) => {
                reservation.reject();
                warn!(description = %description, error = %e, "Broadcast rejected");
                self.emit(Event::TransactionFailed {
                    description: description.clone(),
                    tx_hash: None,
                    error: e.to_string(),
                });
                return Err(OrchestratorError::transaction(
                    description,
                    TransactionError::Rejected(e.to_string()),
                ));
            }
        };

        let tx_hash = match events.next_event().await {
            Some(SubmissionEvent::Submitted(hash)) => hash,
            Some(SubmissionEvent::Confirmed(receipt)) => {
                return Err(OrchestratorError::transaction(
                    description,
                    TransactionError::Failed {
                        tx_hash: receipt.tx_hash,
                        reason: "receipt reported before submission".to_string(),
                    },
                ));
            }
            Some(SubmissionEvent::Failed(reason)) => {
                return Err(OrchestratorError::transaction(
                    description,
                    TransactionError::Rejected(reason),
                ));
            }
            None => {
                return Err(OrchestratorError::transaction(
                    description,
                    TransactionError::Rejected("node reported no transaction hash".to_string()),
                ));
            }
        };

        info!(description = %description, tx_hash = %tx_hash, "Transaction submitted");
        self.emit(Event::TransactionSubmitted {
            description: description.clone(),
            tx_hash: tx_hash.to_string(),
        });

        let (status_tx, status_rx) = watch::channel(TransactionStatus::Submitted(tx_hash));
        let (outcome_tx, outcome_rx) = oneshot::channel();
        tokio::spawn(watch_outcome(
            events,
            tx_hash,
            description.clone(),
            status_tx,
            outcome_tx,
            self.event_bus.clone(),
        ));

        Ok(PendingTransaction {
            description,
            tx_hash,
            status: status_rx,
            outcome: outcome_rx,
        })
    }

    /// Execute and wait for the receipt; a failed outcome is an error.
    pub async fn execute_and_wait(
        &self,
        description: impl Into<String>,
        request: CallRequest,
        overrides: TxOverrides,
    ) -> Result<Receipt> {
        let pending = self.execute(description, request, overrides).await?;
        let description = pending.description().to_string();
        pending
            .outcome()
            .await
            .into_result()
            .map_err(|e| OrchestratorError::transaction(description, e))
    }

    /// Read-only call; never consumes a nonce.
    pub async fn read(&self, request: CallRequest) -> Result<Bytes> {
        Ok(self.client.call(&request).await?)
    }
}

async fn watch_outcome(
    mut events: SubmissionReceiver,
    tx_hash: B256,
    description: String,
    status: watch::Sender<TransactionStatus>,
    outcome: oneshot::Sender<TransactionOutcome>,
    event_bus: Option<EventBus>,
) {
    let result = loop {
        match events.next_event().await {
            Some(SubmissionEvent::Submitted(_)) => continue,
            Some(SubmissionEvent::Confirmed(receipt)) if receipt.status => {
                break TransactionOutcome::Confirmed(receipt)
            }
            Some(SubmissionEvent::Confirmed(_)) => {
                break TransactionOutcome::Failed(TransactionError::Reverted { tx_hash })
            }
            Some(SubmissionEvent::Failed(reason)) => {
                break TransactionOutcome::Failed(TransactionError::Failed { tx_hash, reason })
            }
            None => break TransactionOutcome::Failed(TransactionError::Dropped { tx_hash }),
        }
    };

    let event = match &result {
        TransactionOutcome::Confirmed(receipt) => {
            debug!(description = %description, tx_hash = %tx_hash, gas_used = receipt.gas_used, "Transaction confirmed");
            status.send_replace(TransactionStatus::Confirmed(receipt.clone()));
            Event::TransactionConfirmed {
                description,
                tx_hash: tx_hash.to_string(),
                gas_used: receipt.gas_used,
            }
        }
        TransactionOutcome::Failed(error) => {
            warn!(description = %description, tx_hash = %tx_hash, error = %error, "Transaction failed");
            status.send_replace(TransactionStatus::Failed(error.clone()));
            Event::TransactionFailed {
                description,
                tx_hash: Some(tx_hash.to_string()),
                error: error.to_string(),
            }
        }
    };
    if let Some(bus) = event_bus {
        bus.emit(event);
    }
    let _ = outcome.send(result);
}
