//! Pagination Controller
//!
//! Drives one listing page through its pagination mode:
//!
//! - `SinglePage`: one iteration, never advances
//! - `Paged`: click "next" after each page's products
//! - `InfiniteScroll`: scroll and settle after each batch
//!
//! With a cap of `N > 0` the listing is advanced at most `N - 1` times;
//! a cap of `0` advances until the adapter reports no further progress.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::orchestrator::SessionError;
use crate::domain::PaginationMode;
use crate::extraction::PlatformAdapter;
use crate::infrastructure::page::{Page, warm_up};

/// Why a listing traversal stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A page yielded no product links at all
    NoProducts,
    /// Links were found but every one was already processed
    NoNewProducts,
    /// The adapter could not advance any further
    Exhausted,
    /// The configured page cap was reached
    PageCap,
    /// Single-page platform, processed once
    SinglePage,
    /// A single product URL was processed
    SingleProduct,
    /// The start page could not be loaded
    ListingUnreachable,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationOutcome {
    pub pages_visited: u32,
    pub advances: u32,
    pub termination: Termination,
}

/// Receives the new product links of each listing page
#[async_trait]
pub trait ListingVisitor: Send + Sync {
    /// Only fatal errors may be returned; they end the session.
    async fn visit(&self, page_number: u32, links: Vec<String>) -> Result<(), SessionError>;
}

pub struct PaginationController<'a> {
    adapter: &'a dyn PlatformAdapter,
    max_pages: u32,
    links_per_page: usize,
    settle: Duration,
    scroll_settle: Duration,
    cancellation_token: CancellationToken,
}

impl<'a> PaginationController<'a> {
    pub fn new(adapter: &'a dyn PlatformAdapter, max_pages: u32, links_per_page: usize) -> Self {
        Self {
            adapter,
            max_pages,
            links_per_page,
            settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Warm-up delays applied after every successful advance
    #[must_use]
    pub fn with_warm_up(mut self, settle: Duration, scroll_settle: Duration) -> Self {
        self.settle = settle;
        self.scroll_settle = scroll_settle;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    const fn may_advance(&self, current_page: u32) -> bool {
        self.max_pages == 0 || current_page < self.max_pages
    }

    pub async fn run(&self, page: &dyn Page, visitor: &dyn ListingVisitor) -> Result<PaginationOutcome, SessionError> {
        let mode = self.adapter.descriptor().pagination_mode;
        let mut seen: HashSet<String> = HashSet::new();
        let mut current_page = 1;
        let mut advances = 0;

        let finish = |pages_visited: u32, advances: u32, termination: Termination| {
            info!(pages = pages_visited, advances, ?termination, "Pagination finished");
            Ok(PaginationOutcome {
                pages_visited,
                advances,
                termination,
            })
        };

        loop {
            if self.cancellation_token.is_cancelled() {
                return finish(current_page - 1, advances, Termination::Cancelled);
            }

            // Scroll states repeat earlier links, so widen the window by what was already seen
            let window = self.links_per_page.saturating_add(seen.len());
            let links = match self.adapter.discover_links(page, window).await {
                Ok(links) => links,
                Err(e) => {
                    warn!(page = current_page, error = %e, "Link discovery failed");
                    Vec::new()
                }
            };
            if links.is_empty() {
                info!(page = current_page, "No products found, stopping pagination");
                return finish(current_page - 1, advances, Termination::NoProducts);
            }

            let found = links.len();
            let fresh: Vec<String> = links
                .into_iter()
                .filter(|link| seen.insert(link.clone()))
                .take(self.links_per_page)
                .collect();
            if fresh.is_empty() {
                info!(page = current_page, "No new products on this page");
                return finish(current_page - 1, advances, Termination::NoNewProducts);
            }

            info!(page = current_page, found, new = fresh.len(), "Processing listing page");
            visitor.visit(current_page, fresh).await?;

            if mode == PaginationMode::SinglePage {
                return finish(current_page, advances, Termination::SinglePage);
            }
            if !self.may_advance(current_page) {
                return finish(current_page, advances, Termination::PageCap);
            }
            if self.cancellation_token.is_cancelled() {
                return finish(current_page, advances, Termination::Cancelled);
            }
            if !self.adapter.advance_page(page).await {
                info!(page = current_page, "No more pages available");
                return finish(current_page, advances, Termination::Exhausted);
            }

            advances += 1;
            current_page += 1;
            debug!(page = current_page, "Advanced listing");
            warm_up(page, self.settle, self.scroll_settle).await;
        }
    }
}
