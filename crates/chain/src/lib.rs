pub mod client;
pub mod clock;
pub mod error;
pub mod rpc;
pub mod submission;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::{selector, ChainClient};
pub use clock::{Clock, ClockAdvance, ClockError, DevChainClock, FallbackClock, WallClock};
pub use error::{ChainError, Result};
pub use rpc::JsonRpcClient;
pub use submission::{SubmissionEvent, SubmissionReceiver};
pub use types::*;
