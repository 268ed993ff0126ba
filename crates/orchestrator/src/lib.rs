pub mod abi;
pub mod artifacts;
pub mod auction;
pub mod config;
pub mod deployer;
pub mod error;
pub mod executor;
pub mod linker;
pub mod nonce;
pub mod registrar;
pub mod report;
pub mod run;
pub mod state_machine;
pub mod suite;
pub mod wiring;

pub use artifacts::{ArtifactSource, DirectoryArtifacts, InMemoryArtifacts};
pub use auction::{AuctionCoordinator, AuctionReport, AuctionStatus, LabelFailure, PhaseReport};
pub use config::{AuctionConfig, DeployConfig};
pub use deployer::DeploymentOrchestrator;
pub use error::{LinkError, OrchestratorError, Result, TransactionError};
pub use executor::{PendingTransaction, TransactionExecutor, TransactionOutcome, TransactionStatus};
pub use linker::ArtifactLinker;
pub use nonce::{NonceAllocator, NonceReservation};
pub use registrar::{RegistrationCoordinator, RegistrationEntry, RegistrationReport};
pub use report::RunReport;
pub use run::DeploymentRun;
pub use state_machine::PhaseStateMachine;
pub use wiring::WiringStep;
