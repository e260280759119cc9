use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::{PaginationMode, PlatformDescriptor, ProductRecord, VariantRecord};
use crate::extraction::links::{LinkSelector, anchor_hrefs, normalize_url};
use crate::extraction::navigation::{click_next, scroll_and_settle};
use crate::extraction::profiles::SiteProfile;
use crate::extraction::resolver::FieldResolver;
use crate::extraction::variants::{ProbeSelector, VariantLoop};
use crate::extraction::{ExtractionError, PlatformAdapter};
use crate::infrastructure::config::{ConfigError, TimingConfig};
use crate::infrastructure::page::{Locator, Page, PageError};

/// Adapter whose behavior comes entirely from a [`SiteProfile`]
pub struct CatalogAdapter {
    profile: SiteProfile,
    links: LinkSelector,
    options: ProbeSelector,
    variants: VariantLoop,
    timing: TimingConfig,
}

impl CatalogAdapter {
    pub fn new(profile: SiteProfile, timing: TimingConfig) -> Result<Self, ConfigError> {
        let links = LinkSelector::compile(&profile.links).map_err(|e| {
            ConfigError::Invalid(format!("{} link rules: {e}", profile.platform))
        })?;
        let options = ProbeSelector::new(profile.variant_probes.clone());
        Ok(Self {
            profile,
            links,
            options,
            variants: VariantLoop::new(&timing),
            timing,
        })
    }

    pub const fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    pub(crate) const fn variant_loop(&self) -> &VariantLoop {
        &self.variants
    }

    async fn prepare(&self, page: &dyn Page) {
        if let Some(ready) = &self.profile.ready_selector {
            match page.wait_for(&Locator::css(ready.as_str()), self.timing.element_wait()).await {
                Ok(true) => {}
                Ok(false) => info!(selector = %ready, "Product content did not appear in time"),
                Err(e) => debug!(selector = %ready, error = %e, "Ready check failed"),
            }
        }

        for control in &self.profile.reveal_controls {
            if let Ok(Some(element)) = page.query(&Locator::css(control.as_str())).await
                && let Err(e) = page.click(&element).await
            {
                debug!(control = %control, error = %e, "Reveal control click failed");
            }
        }
    }
}

#[async_trait]
impl PlatformAdapter for CatalogAdapter {
    fn descriptor(&self) -> PlatformDescriptor {
        self.profile.platform.descriptor()
    }

    async fn discover_links(&self, page: &dyn Page, limit: usize) -> Result<Vec<String>, PageError> {
        let hrefs = anchor_hrefs(page).await?;
        let links = self.links.select(&hrefs, limit);
        debug!(
            platform = %self.profile.platform,
            anchors = hrefs.len(),
            products = links.len(),
            "Discovered product links"
        );
        Ok(links)
    }

    async fn extract_product(&self, page: &dyn Page) -> Result<ProductRecord, ExtractionError> {
        let url = page
            .current_url()
            .await
            .map_err(|e| ExtractionError::unreachable("<current page>", e))?;
        self.prepare(page).await;

        let fields = &self.profile.fields;
        let resolver = FieldResolver::new(page);

        let mut product_url = resolver.resolve("product_url", &fields.product_url).await;
        if product_url.is_empty() {
            product_url = normalize_url(&url, None).unwrap_or(url);
        }

        let mut seller_name = resolver.resolve("seller", &fields.seller).await;
        if seller_name.is_empty()
            && let Some(default_seller) = &self.profile.default_seller
        {
            seller_name.clone_from(default_seller);
        }

        let mut manufacturer_name = resolver.resolve("manufacturer", &fields.manufacturer).await;
        if manufacturer_name.is_empty() && self.profile.manufacturer_falls_back_to_seller {
            manufacturer_name.clone_from(&seller_name);
        }

        Ok(ProductRecord {
            product_url,
            title: resolver.resolve("title", &fields.title).await,
            price: resolver.resolve("price", &fields.price).await,
            seller_name,
            manufacturer_name,
            image_url: resolver.resolve("image", &fields.image).await,
            ..ProductRecord::default()
        })
    }

    async fn extract_variants(&self, page: &dyn Page, main_product_url: &str) -> Vec<VariantRecord> {
        if !self.descriptor().variant_support || self.options.is_empty() {
            return Vec::new();
        }
        self.variants.run(page, self, &self.options, main_product_url).await
    }

    async fn advance_page(&self, page: &dyn Page) -> bool {
        match self.descriptor().pagination_mode {
            PaginationMode::Paged => {
                click_next(page, &self.profile.next_controls, self.timing.next_page_settle()).await
            }
            PaginationMode::InfiniteScroll => scroll_and_settle(page, self.timing.scroll_settle()).await,
            PaginationMode::SinglePage => false,
        }
    }
}
