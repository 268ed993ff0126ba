//! Event types emitted while a deployment run progresses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Position in the bus's publication order
    pub sequence: u64,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    pub fn new(sequence: u64, event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Progress notifications of a deployment run.
///
/// Addresses and hashes are carried as display strings so subscribers do not
/// need the chain primitive types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Module events
    #[serde(rename = "module.deploying")]
    ModuleDeploying { module: String },

    #[serde(rename = "module.linked")]
    LibraryLinked {
        module: String,
        library: String,
        address: String,
    },

    #[serde(rename = "module.deployed")]
    ModuleDeployed {
        module: String,
        address: String,
        tx_hash: String,
    },

    #[serde(rename = "wiring.completed")]
    WiringStepCompleted { step: String },

    // Transaction events
    #[serde(rename = "tx.submitted")]
    TransactionSubmitted { description: String, tx_hash: String },

    #[serde(rename = "tx.confirmed")]
    TransactionConfirmed {
        description: String,
        tx_hash: String,
        gas_used: u64,
    },

    #[serde(rename = "tx.failed")]
    TransactionFailed {
        description: String,
        tx_hash: Option<String>,
        error: String,
    },

    // Auction and registration events
    #[serde(rename = "auction.phase_completed")]
    AuctionPhaseCompleted {
        phase: String,
        succeeded: usize,
        failed: usize,
    },

    #[serde(rename = "clock.advanced")]
    ClockAdvanced { seconds: u64, simulated: bool },

    #[serde(rename = "name.registered")]
    NameRegistered { name: String, owner: String },

    #[serde(rename = "name.failed")]
    RegistrationFailed { name: String, error: String },

    /// Generic error event
    #[serde(rename = "error")]
    Error {
        message: String,
        context: Option<String>,
    },
}

impl Event {
    /// Module this event is about, if any
    pub fn module(&self) -> Option<&str> {
        match self {
            Event::ModuleDeploying { module }
            | Event::LibraryLinked { module, .. }
            | Event::ModuleDeployed { module, .. } => Some(module),
            _ => None,
        }
    }

    /// Whether this event reports a failure of any kind
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::TransactionFailed { .. } | Event::RegistrationFailed { .. } | Event::Error { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_envelope_creation() {
        let envelope = EventEnvelope::new(
            7,
            Event::ModuleDeploying {
                module: "RNS".to_string(),
            },
        );

        assert!(!envelope.id.is_nil());
        assert_eq!(envelope.sequence, 7);
        assert!(envelope.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::ModuleDeployed {
            module: "RNS".to_string(),
            address: "0x0000000000000000000000000000000000000001".to_string(),
            tx_hash: "0xabc".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("module.deployed"));
        assert!(json.contains("tx_hash"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"clock.advanced","seconds":259200,"simulated":true}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        assert_eq!(
            event,
            Event::ClockAdvanced {
                seconds: 259200,
                simulated: true
            }
        );
    }

    #[test]
    fn test_event_module() {
        let event = Event::LibraryLinked {
            module: "FIFSRegistrar".to_string(),
            library: "BytesUtils".to_string(),
            address: "0x01".to_string(),
        };
        assert_eq!(event.module(), Some("FIFSRegistrar"));

        let error_event = Event::Error {
            message: "test".to_string(),
            context: None,
        };
        assert_eq!(error_event.module(), None);
        assert!(error_event.is_failure());
    }
}
