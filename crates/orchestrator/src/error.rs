use chain::{ChainError, ClockError};
use rns_core::{Address, CoreError, Phase, B256};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("Library {library} already linked into {module} at {existing}, refusing {requested}")]
    AlreadyLinked {
        module: String,
        library: String,
        existing: Address,
        requested: Address,
    },

    #[error("Module {module} expects {expected} slot(s) for {library}, found {found}")]
    SlotCountMismatch {
        module: String,
        library: String,
        expected: usize,
        found: usize,
    },

    #[error("Module {module} does not declare library {library}")]
    UnknownLibrary { module: String, library: String },

    #[error("Library {library} required by {module} has not been deployed")]
    MissingLibrary { module: String, library: String },

    #[error("Module {module} has unresolved libraries: {libraries:?}")]
    Unresolved {
        module: String,
        libraries: Vec<String>,
    },

    #[error("Slot for {library} at offset {offset} exceeds the {len}-byte payload of {module}")]
    SlotOutOfBounds {
        module: String,
        library: String,
        offset: usize,
        len: usize,
    },
}

/// Failure of a transaction the node accepted, or of the broadcast itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },

    #[error("Transaction {tx_hash} was dropped before an outcome was reported")]
    Dropped { tx_hash: B256 },

    #[error("Transaction {tx_hash} failed: {reason}")]
    Failed { tx_hash: B256, reason: String },

    #[error("Broadcast rejected: {0}")]
    Rejected(String),

    #[error("Creation {tx_hash} confirmed without a contract address")]
    MissingContractAddress { tx_hash: B256 },
}

impl TransactionError {
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::Reverted { tx_hash }
            | Self::Dropped { tx_hash }
            | Self::Failed { tx_hash, .. }
            | Self::MissingContractAddress { tx_hash } => Some(*tx_hash),
            Self::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Gas estimation for {description} failed: {reason}")]
    GasEstimation { description: String, reason: String },

    #[error("{description}: {source}")]
    Transaction {
        description: String,
        #[source]
        source: TransactionError,
    },

    #[error("Clock advance unsupported: {0}")]
    ClockAdvanceUnsupported(String),

    #[error("Label {label} cannot move from {from} to {to}")]
    PhaseOrderViolation { label: String, from: Phase, to: Phase },

    #[error("Invalid deployment plan: {0}")]
    Plan(String),

    #[error("Artifact {name}: {reason}")]
    Artifact { name: String, reason: String },

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Module not deployed: {0}")]
    ModuleNotDeployed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl OrchestratorError {
    pub fn gas_estimation(description: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GasEstimation {
            description: description.into(),
            reason: reason.into(),
        }
    }

    pub fn transaction(description: impl Into<String>, source: TransactionError) -> Self {
        Self::Transaction {
            description: description.into(),
            source,
        }
    }

    pub fn phase_order(label: impl Into<String>, from: Phase, to: Phase) -> Self {
        Self::PhaseOrderViolation {
            label: label.into(),
            from,
            to,
        }
    }

    pub fn artifact(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Artifact {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<ClockError> for OrchestratorError {
    fn from(e: ClockError) -> Self {
        match e {
            ClockError::Unsupported(reason) => Self::ClockAdvanceUnsupported(reason),
            ClockError::Chain(e) => Self::Chain(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
