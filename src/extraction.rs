//! Extraction layer - turning live pages into records
//!
//! - `cleaning`: per-field post-processing rules
//! - `resolver`: declarative fallback chains and the field resolver
//! - `links`: product link discovery
//! - `profiles`: versioned, per-platform extraction descriptions
//! - `navigation`: "next" controls and infinite scroll
//! - `variants`: the variant resolution loop
//! - `adapters`: platform adapters built on the pieces above
//! - `registry`: platform key to adapter lookup

pub mod adapters;
pub mod cleaning;
pub mod links;
pub mod navigation;
pub mod profiles;
pub mod registry;
pub mod resolver;
pub mod variants;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{PlatformDescriptor, ProductRecord, VariantRecord};
use crate::infrastructure::page::{Page, PageError};

pub use adapters::{AmazonAdapter, CatalogAdapter};
pub use profiles::{SiteProfile, load_profiles};
pub use registry::PlatformRegistry;
pub use resolver::{FieldResolver, Source, Strategy};
pub use variants::{OptionSelector, VariantLoop};

/// Hard extraction failures. Field misses are never errors.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("page {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: PageError,
    },
}

impl ExtractionError {
    pub fn unreachable(url: impl Into<String>, source: PageError) -> Self {
        Self::Unreachable { url: url.into(), source }
    }
}

/// Extraction capability set implemented once per site family
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn descriptor(&self) -> PlatformDescriptor;

    /// Whether `url` addresses a single product rather than a listing
    fn is_product_url(&self, url: &str) -> bool {
        self.descriptor().key.is_single_product_url(url)
    }

    /// Unique, normalized product URLs in document order, at most `limit`
    async fn discover_links(&self, page: &dyn Page, limit: usize) -> Result<Vec<String>, PageError>;

    /// Product state of the page as currently rendered, without whitelist status
    async fn extract_product(&self, page: &dyn Page) -> Result<ProductRecord, ExtractionError>;

    /// Every selectable variant option, re-extracted after selection
    async fn extract_variants(&self, page: &dyn Page, main_product_url: &str) -> Vec<VariantRecord>;

    /// Move the listing forward; `false` ends pagination
    async fn advance_page(&self, page: &dyn Page) -> bool;
}
