use rns_core::B256;
use tokio::sync::mpsc;

use crate::types::Receipt;

/// Lifecycle notifications of one broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionEvent {
    Submitted(B256),
    Confirmed(Receipt),
    Failed(String),
}

impl SubmissionEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionEvent::Submitted(_))
    }
}

const CHANNEL_CAPACITY: usize = 8;

/// Receiving end of a submission's event stream.
pub struct SubmissionReceiver {
    rx: mpsc::Receiver<SubmissionEvent>,
}

impl SubmissionReceiver {
    /// Create a connected sender/receiver pair for client implementations.
    pub fn channel() -> (mpsc::Sender<SubmissionEvent>, Self) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (tx, Self { rx })
    }

    /// `None` once the producer is gone.
    pub async fn next_event(&mut self) -> Option<SubmissionEvent> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_delivers_in_order_then_closes() {
        let (tx, mut rx) = SubmissionReceiver::channel();
        tx.send(SubmissionEvent::Submitted(B256::ZERO)).await.unwrap();
        tx.send(SubmissionEvent::Failed("timeout".to_string()))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(rx.next_event().await, Some(SubmissionEvent::Submitted(B256::ZERO)));
        let failed = rx.next_event().await.unwrap();
        assert!(failed.is_terminal());
        assert_eq!(rx.next_event().await, None);
    }
}
