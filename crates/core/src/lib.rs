//! Domain types shared by the RNS deployment crates.
//!
//! Chain primitives are re-exported from `alloy-primitives` so downstream
//! crates agree on a single `Address`/`B256`/`U256` definition.

pub mod domain;
pub mod error;
pub mod hash;

pub use alloy_primitives::{hex, keccak256, Address, Bytes, B256, U256};
pub use domain::*;
pub use error::CoreError;
pub use hash::{labelhash, namehash, node_for_label, TLD};
