//! Single-writer nonce allocation for the sending account.

use chain::{ChainClient, ChainError};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Hands out the sender's nonces one broadcast at a time.
///
/// The counter is seeded from the chain's pending transaction count on first
/// use and after a rejected broadcast. A reservation holds the allocator's lock until it is committed or
/// dropped, so allocation and broadcast happen under the same lock.
pub struct NonceAllocator {
    client: Arc<dyn ChainClient>,
    next: Mutex<Option<u64>>,
}

impl NonceAllocator {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self {
            client,
            next: Mutex::new(None),
        }
    }

    /// Wait for the lock and reserve the next nonce.
    pub async fn reserve(&self) -> Result<NonceReservation<'_>, ChainError> {
        let mut guard = self.next.lock().await;
        let nonce = match *guard {
            Some(nonce) => nonce,
            None => {
                let nonce = self.client.pending_nonce().await?;
                debug!(nonce, sender = %self.client.sender(), "Nonce counter seeded from chain");
                *guard = Some(nonce);
                nonce
            }
        };
        Ok(NonceReservation {
            guard,
            nonce,
            settled: false,
        })
    }

    /// Next nonce that would be handed out, if the counter is seeded.
    pub async fn peek(&self) -> Option<u64> {
        *self.next.lock().await
    }
}

/// RAII guard over one reserved nonce.
///
/// Committing consumes the nonce. Dropping without commit releases it and
/// the next reservation receives the same value. Rejecting forgets the
/// counter so the next reservation asks the chain again.
pub struct NonceReservation<'a> {
    guard: MutexGuard<'a, Option<u64>>,
    nonce: u64,
    settled: bool,
}

impl NonceReservation<'_> {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The broadcast was accepted.
    pub fn commit(mut self) {
        *self.guard = Some(self.nonce + 1);
        self.settled = true;
    }

    /// The node refused the broadcast. The local counter may be stale.
    pub fn reject(mut self) {
        debug!(nonce = self.nonce, "Nonce counter cleared after rejected broadcast");
        *self.guard = None;
        self.settled = true;
    }
}

impl Drop for NonceReservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(nonce = self.nonce, "Nonce released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain::testing::MockChain;

    #[tokio::test]
    async fn test_commit_advances_counter() {
        let allocator = NonceAllocator::new(Arc::new(MockChain::new()));
        assert_eq!(allocator.peek().await, None);

        let reservation = allocator.reserve().await.unwrap();
        assert_eq!(reservation.nonce(), 0);
        reservation.commit();

        assert_eq!(allocator.peek().await, Some(1));
        assert_eq!(allocator.reserve().await.unwrap().nonce(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_nonce() {
        let allocator = NonceAllocator::new(Arc::new(MockChain::new()));
        {
            let reservation = allocator.reserve().await.unwrap();
            assert_eq!(reservation.nonce(), 0);
        }
        assert_eq!(allocator.reserve().await.unwrap().nonce(), 0);
    }

    #[tokio::test]
    async fn test_reject_reseeds_from_chain() {
        let chain = MockChain::new();
        let allocator = NonceAllocator::new(Arc::new(chain.clone()));
        allocator.reserve().await.unwrap().commit();
        assert_eq!(allocator.peek().await, Some(1));

        chain.use_nonces(3);
        let stale = allocator.reserve().await.unwrap();
        assert_eq!(stale.nonce(), 1);
        stale.reject();

        assert_eq!(allocator.peek().await, None);
        assert_eq!(allocator.reserve().await.unwrap().nonce(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_are_distinct() {
        let allocator = Arc::new(NonceAllocator::new(Arc::new(MockChain::new())));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                let reservation = allocator.reserve().await.unwrap();
                let nonce = reservation.nonce();
                tokio::task::yield_now().await;
                reservation.commit();
                nonce
            }));
        }

        let mut nonces = Vec::new();
        for handle in handles {
            nonces.push(handle.await.unwrap());
        }
        nonces.sort_unstable();
        assert_eq!(nonces, (0..8).collect::<Vec<u64>>());
    }
}
