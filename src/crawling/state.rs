//! # Shared State
//!
//! Cancellation and statistics shared by the listing loop and every product
//! worker of one session.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct SharedState {
    /// Cooperative stop signal, checked at page boundaries and before each product
    pub cancellation_token: CancellationToken,

    stats: RwLock<SessionStats>,
}

impl SharedState {
    #[must_use]
    pub fn new(cancellation_token: CancellationToken) -> Self {
        Self {
            cancellation_token,
            stats: RwLock::new(SessionStats::default()),
        }
    }

    pub fn request_shutdown(&self) {
        self.cancellation_token.cancel();
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub async fn record(&self, update: impl FnOnce(&mut SessionStats)) {
        let mut stats = self.stats.write().await;
        update(&mut stats);
    }

    pub async fn snapshot(&self) -> SessionStats {
        self.stats.read().await.clone()
    }
}

/// Counters for one session
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Listing pages (or scroll states) whose links were processed
    pub pages_visited: u32,

    pub links_discovered: u64,

    pub products_persisted: u64,

    /// Products with neither title nor price
    pub products_discarded: u64,

    /// Products already written earlier in the session
    pub products_duplicate: u64,

    pub variants_persisted: u64,

    pub variants_discarded: u64,

    /// Products skipped after an unreachable page or a failed context
    pub product_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_snapshot() {
        let state = SharedState::default();
        state.record(|s| s.products_persisted += 2).await;
        state.record(|s| s.product_failures += 1).await;

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.products_persisted, 2);
        assert_eq!(snapshot.product_failures, 1);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let state = SharedState::default();
        let before = tokio_test::block_on(state.snapshot());
        tokio_test::block_on(state.record(|s| s.pages_visited = 3));

        assert_eq!(before.pages_visited, 0);
        assert_eq!(tokio_test::block_on(state.snapshot()).pages_visited, 3);
    }

    #[test]
    fn test_shutdown_is_shared_with_token_clones() {
        let token = CancellationToken::new();
        let state = SharedState::new(token.clone());
        assert!(!state.is_shutdown_requested());
        token.cancel();
        assert!(state.is_shutdown_requested());
    }
}
