//! Progress events for RNS deployment runs
//!
//! The bus is the report sink of a run: the orchestrator publishes, the CLI
//! subscribes and prints.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
