use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Execution reverted: {0}")]
    Reverted(String),

    #[error("Method not supported by node: {0}")]
    Unsupported(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Node exposes no accounts to send from")]
    NoAccounts,
}

impl ChainError {
    /// JSON-RPC code for "method not found".
    pub const METHOD_NOT_FOUND: i64 = -32601;

    /// Build the error for a JSON-RPC error object, classifying reverts and
    /// unknown methods.
    pub fn from_rpc(method: &str, code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == Self::METHOD_NOT_FOUND {
            return Self::Unsupported(method.to_string());
        }
        if message.contains("revert") {
            return Self::Reverted(message);
        }
        Self::Rpc { code, message }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
