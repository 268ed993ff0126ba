use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Module already recorded in manifest: {0}")]
    DuplicateRecord(String),

    #[error("Unknown auction phase: {0}")]
    UnknownPhase(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),
}
