//! # Session Orchestrator
//!
//! Top-level driver of one harvesting session:
//!
//! 1. Detect the platform from the start URL and pick its adapter
//! 2. Decide between single-product and listing flow
//! 3. For listings, run the [`PaginationController`] and hand every new link
//!    to a bounded pool of product workers
//! 4. Per product: fresh page context, extraction, classification,
//!    persistence, variants, close, pacing delay
//!
//! Product-level failures are logged and counted; only sink and
//! configuration failures end the session early.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use futures::stream::{self, TryStreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

use super::pagination::{ListingVisitor, PaginationController, Termination};
use super::state::{SessionStats, SharedState};
use crate::domain::{PlatformKey, Session, Whitelist};
use crate::extraction::{ExtractionError, PlatformAdapter, PlatformRegistry};
use crate::infrastructure::config::{AppConfig, ConfigError, TimingConfig};
use crate::infrastructure::csv_sink::{AppendOutcome, RecordSink, SinkError};
use crate::infrastructure::page::{Browser, Page, PageError, warm_up};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid start URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("output failure: {0}")]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Fatal errors abort the session; everything else is recovered per product.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidUrl { .. } | Self::Sink(_) | Self::Config(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    SingleProduct,
    Listing,
}

/// What a run is going to do, decided before any page is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub url: String,
    pub platform: PlatformKey,
    pub domain: String,
    pub mode: SessionMode,
}

/// Knobs of one session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// `0` means every page
    pub max_pages: u32,
    pub links_per_page: usize,
    pub workers: usize,
    pub timing: TimingConfig,
    pub output_root: PathBuf,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig, max_pages: u32) -> Self {
        Self {
            max_pages,
            links_per_page: config.scrape.links_per_page,
            workers: config.scrape.workers.max(1),
            timing: config.timing,
            output_root: config.output.root_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session: String,
    pub platform: PlatformKey,
    pub mode: SessionMode,
    pub products_path: PathBuf,
    pub variants_path: PathBuf,
    pub termination: Termination,
    pub stats: SessionStats,
}

/// Opens the record sink for a new session
pub type SinkOpener = Arc<dyn Fn(&Session) -> Result<RecordSink, SinkError> + Send + Sync>;

pub struct SessionOrchestrator {
    browser: Arc<dyn Browser>,
    registry: Arc<PlatformRegistry>,
    whitelist: Arc<Whitelist>,
    settings: SessionSettings,
    state: Arc<SharedState>,
    sink_opener: SinkOpener,
}

impl SessionOrchestrator {
    pub fn new(
        browser: Arc<dyn Browser>,
        registry: Arc<PlatformRegistry>,
        whitelist: Whitelist,
        settings: SessionSettings,
    ) -> Self {
        Self {
            browser,
            registry,
            whitelist: Arc::new(whitelist),
            settings,
            state: Arc::new(SharedState::default()),
            sink_opener: Arc::new(RecordSink::open),
        }
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.settings.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: Arc<SharedState>) -> Self {
        self.state = state;
        self
    }

    /// Replace how session files are opened; defaults to [`RecordSink::open`].
    #[must_use]
    pub fn with_sink_opener(mut self, opener: SinkOpener) -> Self {
        self.sink_opener = opener;
        self
    }

    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    /// Detect platform and flow for `url`.
    pub fn plan(&self, url: &str) -> Result<SessionPlan, SessionError> {
        let parsed = Url::parse(url.trim()).map_err(|e| SessionError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let domain = parsed
            .host_str()
            .ok_or_else(|| SessionError::InvalidUrl {
                url: url.to_string(),
                reason: "no host".into(),
            })?
            .to_string();

        let (platform, adapter) = self.registry.resolve(parsed.as_str());
        let mode = if adapter.is_product_url(parsed.as_str()) {
            SessionMode::SingleProduct
        } else {
            SessionMode::Listing
        };

        Ok(SessionPlan {
            url: parsed.into(),
            platform,
            domain,
            mode,
        })
    }

    pub async fn run(&self, url: &str) -> Result<SessionReport, SessionError> {
        let plan = self.plan(url)?;
        let adapter = self.registry.adapter(plan.platform);
        let session = Session::new(&self.settings.output_root, plan.platform, &plan.domain, &Local::now());
        let sink = (self.sink_opener)(&session)?;

        info!(
            session = %session.name(),
            platform = plan.platform.display_name(),
            mode = ?plan.mode,
            max_pages = self.settings.max_pages,
            "Session started"
        );

        let workers = ProductWorkers {
            browser: self.browser.as_ref(),
            adapter: adapter.as_ref(),
            whitelist: &self.whitelist,
            sink: &sink,
            state: &self.state,
            settings: &self.settings,
        };

        let outcome = match plan.mode {
            SessionMode::SingleProduct => workers.single_product(&plan.url).await,
            SessionMode::Listing => workers.listing(&plan.url).await,
        };
        // Records already written stay valid even when the run failed
        let closed = sink.close().await;
        let termination = outcome?;
        closed?;

        let report = SessionReport {
            session: session.name(),
            platform: plan.platform,
            mode: plan.mode,
            products_path: session.products_path.clone(),
            variants_path: session.variants_path.clone(),
            termination,
            stats: self.state.snapshot().await,
        };
        info!(
            session = %report.session,
            ?termination,
            products = report.stats.products_persisted,
            variants = report.stats.variants_persisted,
            failures = report.stats.product_failures,
            "Session finished"
        );
        Ok(report)
    }
}

/// Per-session borrow bundle shared by the listing loop and product workers
struct ProductWorkers<'a> {
    browser: &'a dyn Browser,
    adapter: &'a dyn PlatformAdapter,
    whitelist: &'a Whitelist,
    sink: &'a RecordSink,
    state: &'a SharedState,
    settings: &'a SessionSettings,
}

impl ProductWorkers<'_> {
    async fn single_product(&self, url: &str) -> Result<Termination, SessionError> {
        let timing = &self.settings.timing;
        self.process(url, timing.listing_settle(), timing.scroll_settle()).await?;
        Ok(Termination::SingleProduct)
    }

    async fn listing(&self, url: &str) -> Result<Termination, SessionError> {
        let timing = &self.settings.timing;
        let page = self.browser.new_page().await?;

        if let Err(e) = page.navigate(url, timing.navigation_timeout()).await {
            error!(url = %url, error = %e, "Listing page unreachable");
            close_quietly(page.as_ref()).await;
            return Ok(Termination::ListingUnreachable);
        }
        warm_up(page.as_ref(), timing.listing_settle(), timing.scroll_settle()).await;

        let outcome = PaginationController::new(self.adapter, self.settings.max_pages, self.settings.links_per_page)
            .with_warm_up(timing.page_settle(), timing.scroll_settle())
            .with_cancellation(self.state.cancellation_token.clone())
            .run(page.as_ref(), self)
            .await;
        close_quietly(page.as_ref()).await;

        let outcome = outcome?;
        self.state.record(|s| s.pages_visited = outcome.pages_visited).await;
        Ok(outcome.termination)
    }

    /// One product in its own page context; only fatal errors escape.
    async fn process(
        &self,
        url: &str,
        settle: Duration,
        scroll_settle: Duration,
    ) -> Result<(), SessionError> {
        let result = match self.browser.new_page().await {
            Ok(page) => {
                let result = self.harvest(page.as_ref(), url, settle, scroll_settle).await;
                close_quietly(page.as_ref()).await;
                result
            }
            Err(e) => Err(SessionError::Page(e)),
        };

        match result {
            Err(e) if e.is_fatal() => {
                error!(url = %url, error = %e, "Aborting session");
                Err(e)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Product skipped");
                self.state.record(|s| s.product_failures += 1).await;
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn harvest(
        &self,
        page: &dyn Page,
        url: &str,
        settle: Duration,
        scroll_settle: Duration,
    ) -> Result<(), SessionError> {
        page.navigate(url, self.settings.timing.navigation_timeout())
            .await
            .map_err(|e| ExtractionError::unreachable(url, e))?;
        warm_up(page, settle, scroll_settle).await;

        let product = self.adapter.extract_product(page).await?;
        let status = self.whitelist.classify(&product.seller_name, &product.manufacturer_name);
        let product = product.with_whitelist(status);
        let main_product_url = product.product_url.clone();

        if product.has_content() {
            let title = product.title.clone();
            match self.sink.append_product(product).await? {
                AppendOutcome::Written => {
                    info!(url = %main_product_url, title = %title, status = %status, "Product saved");
                    self.state.record(|s| s.products_persisted += 1).await;
                }
                AppendOutcome::Skipped => {
                    debug!(url = %main_product_url, "Product already saved in this session");
                    self.state.record(|s| s.products_duplicate += 1).await;
                }
            }
        } else {
            info!(url = %url, "Product has neither title nor price; discarded");
            self.state.record(|s| s.products_discarded += 1).await;
        }

        let variants = self.adapter.extract_variants(page, &main_product_url).await;
        if !variants.is_empty() {
            info!(url = %main_product_url, count = variants.len(), "Variants found");
        }
        for variant in variants {
            if !variant.has_content() {
                self.state.record(|s| s.variants_discarded += 1).await;
                continue;
            }
            let status = self.whitelist.classify(&variant.seller_name, &variant.manufacturer_name);
            if self.sink.append_variant(variant.with_whitelist(status)).await? == AppendOutcome::Written {
                self.state.record(|s| s.variants_persisted += 1).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ListingVisitor for ProductWorkers<'_> {
    async fn visit(&self, page_number: u32, links: Vec<String>) -> Result<(), SessionError> {
        let total = links.len();
        self.state.record(|s| s.links_discovered += total as u64).await;
        let timing = self.settings.timing;

        stream::iter(links.into_iter().enumerate().map(Ok))
            .try_for_each_concurrent(self.settings.workers, |(index, link)| async move {
                if self.state.is_shutdown_requested() {
                    debug!(url = %link, "Stop requested; product not started");
                    return Ok(());
                }
                info!(page = page_number, product = index + 1, total, url = %link, "Processing product");
                self.process(&link, timing.page_settle(), timing.product_scroll_settle()).await?;
                sleep(timing.pacing()).await;
                Ok(())
            })
            .await
    }
}

async fn close_quietly(page: &dyn Page) {
    if let Err(e) = page.close().await {
        debug!(error = %e, "Page close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBrowser, ScriptedSite};

    fn orchestrator(root: &std::path::Path) -> SessionOrchestrator {
        let settings = SessionSettings {
            max_pages: 1,
            links_per_page: 50,
            workers: 1,
            timing: TimingConfig::immediate(),
            output_root: root.to_path_buf(),
        };
        SessionOrchestrator::new(
            Arc::new(ScriptedBrowser::new(ScriptedSite::new())),
            Arc::new(PlatformRegistry::builtin(TimingConfig::immediate()).unwrap()),
            Whitelist::default(),
            settings,
        )
    }

    #[test]
    fn test_plan_detects_mode() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());

        let plan = orchestrator.plan("https://www.amazon.in/Mug/dp/B0MUG00001").unwrap();
        assert_eq!(plan.platform, PlatformKey::Amazon);
        assert_eq!(plan.mode, SessionMode::SingleProduct);
        assert_eq!(plan.domain, "www.amazon.in");

        let plan = orchestrator.plan("https://www.amazon.in/s?k=mug").unwrap();
        assert_eq!(plan.mode, SessionMode::Listing);

        let plan = orchestrator.plan("https://shop.example/a/b/c/d/product/42").unwrap();
        assert_eq!(plan.platform, PlatformKey::Generic);
        assert_eq!(plan.mode, SessionMode::SingleProduct);
    }

    #[test]
    fn test_plan_rejects_bad_urls() {
        let dir = tempfile::tempdir().unwrap();
        let err = orchestrator(dir.path()).plan("not a url").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, SessionError::InvalidUrl { .. }));
    }

    #[test]
    fn test_fatal_classification() {
        let unreachable = SessionError::from(ExtractionError::unreachable("https://x.example", PageError::Closed));
        assert!(!unreachable.is_fatal());
        assert!(SessionError::from(SinkError::WriterStopped).is_fatal());
        assert!(SessionError::from(ConfigError::NoProvider).is_fatal());
    }

    #[tokio::test]
    async fn test_unreachable_listing_ends_session_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let report = orchestrator(dir.path()).run("https://shop.example/list").await.unwrap();
        assert_eq!(report.termination, Termination::ListingUnreachable);
        assert_eq!(report.stats, SessionStats::default());
        assert!(report.products_path.exists());
    }
}
