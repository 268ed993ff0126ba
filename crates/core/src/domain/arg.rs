use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// A typed argument for a constructor or a call.
///
/// `Module` and `Sender` are placeholders resolved against the manifest and
/// the sending account at encoding time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Arg {
    Address(Address),
    Module(String),
    Sender,
    Bytes32(B256),
    Bytes32Array(Vec<B256>),
    Uint(U256),
    String(String),
    Bool(bool),
}

impl Arg {
    pub fn module(name: impl Into<String>) -> Self {
        Self::Module(name.into())
    }

    pub fn uint(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Name of the module this argument refers to, if any.
    pub fn module_ref(&self) -> Option<&str> {
        match self {
            Self::Module(name) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_ref() {
        assert_eq!(Arg::module("RNS").module_ref(), Some("RNS"));
        assert_eq!(Arg::Sender.module_ref(), None);
        assert_eq!(Arg::uint(18).module_ref(), None);
    }

    #[test]
    fn test_arg_serialization() {
        let json = serde_json::to_string(&Arg::module("RNS")).unwrap();
        assert_eq!(json, r#"{"kind":"module","value":"RNS"}"#);

        let back: Arg = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Arg::module("RNS"));
    }
}
