//! Time advancement for the auction's bidding and reveal windows.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::ChainError;
use crate::rpc::JsonRpcClient;

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Clock advance not supported: {0}")]
    Unsupported(String),

    #[error("Clock advance failed: {0}")]
    Chain(ChainError),
}

impl From<ChainError> for ClockError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Unsupported(method) => ClockError::Unsupported(method),
            ChainError::Rpc { code, message } if code == ChainError::METHOD_NOT_FOUND => {
                ClockError::Unsupported(message)
            }
            other => ClockError::Chain(other),
        }
    }
}

/// How an advance was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAdvance {
    /// The chain's clock was moved forward without waiting.
    Simulated,
    /// Real time elapsed.
    Waited,
}

#[async_trait]
pub trait Clock: Send + Sync {
    /// Returns once chain time is at least `duration` later than before the call.
    async fn advance(&self, duration: Duration) -> Result<ClockAdvance, ClockError>;
}

/// Moves a development node's clock with `evm_increaseTime` + `evm_mine`.
pub struct DevChainClock {
    client: Arc<JsonRpcClient>,
}

impl DevChainClock {
    pub fn new(client: Arc<JsonRpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Clock for DevChainClock {
    async fn advance(&self, duration: Duration) -> Result<ClockAdvance, ClockError> {
        self.client.increase_time(duration.as_secs()).await?;
        Ok(ClockAdvance::Simulated)
    }
}

/// Waits out the duration in real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

#[async_trait]
impl Clock for WallClock {
    async fn advance(&self, duration: Duration) -> Result<ClockAdvance, ClockError> {
        info!(seconds = duration.as_secs(), "Waiting in real time");
        tokio::time::sleep(duration).await;
        Ok(ClockAdvance::Waited)
    }
}

/// Tries `primary` and falls back to waiting when the node cannot simulate time.
///
/// The fallback sticks once taken.
pub struct FallbackClock<P> {
    primary: P,
    fallback: WallClock,
    primary_unsupported: AtomicBool,
}

impl<P: Clock> FallbackClock<P> {
    pub fn new(primary: P) -> Self {
        Self {
            primary,
            fallback: WallClock,
            primary_unsupported: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<P: Clock> Clock for FallbackClock<P> {
    async fn advance(&self, duration: Duration) -> Result<ClockAdvance, ClockError> {
        if !self.primary_unsupported.load(Ordering::Relaxed) {
            match self.primary.advance(duration).await {
                Err(ClockError::Unsupported(reason)) => {
                    warn!(reason = %reason, "Node cannot simulate time, falling back to waiting");
                    self.primary_unsupported.store(true, Ordering::Relaxed);
                }
                result => return result,
            }
        }
        self.fallback.advance(duration).await
    }
}
