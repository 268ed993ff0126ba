use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Result of one successful module creation. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub module: String,
    pub address: Address,
    pub tx_hash: B256,
    pub deployed_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn new(module: impl Into<String>, address: Address, tx_hash: B256) -> Self {
        Self {
            module: module.into(),
            address,
            tx_hash,
            deployed_at: Utc::now(),
        }
    }
}

/// Module name to deployment record, in deployment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    records: IndexMap<String, DeploymentRecord>,
}

impl DeploymentManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: DeploymentRecord) -> Result<(), CoreError> {
        if self.records.contains_key(&record.module) {
            return Err(CoreError::DuplicateRecord(record.module));
        }
        self.records.insert(record.module.clone(), record);
        Ok(())
    }

    pub fn address(&self, module: &str) -> Option<Address> {
        self.records.get(module).map(|record| record.address)
    }

    pub fn get(&self, module: &str) -> Option<&DeploymentRecord> {
        self.records.get(module)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.records.contains_key(module)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn position(&self, module: &str) -> Option<usize> {
        self.records.get_index_of(module)
    }
}
