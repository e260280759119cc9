//! Product and variant records
//!
//! Records are created once per page visit (or per selected variant option)
//! and are never mutated afterwards; the only transition is attaching the
//! whitelist status, which consumes the record and returns a new one.
//! Field order matches the column order of the persisted CSV files.

use serde::{Deserialize, Serialize};

use super::whitelist::WhitelistStatus;

/// One product page visit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Canonical URL when the page exposes one, otherwise the navigated URL
    pub product_url: String,
    pub title: String,
    pub price: String,
    pub seller_name: String,
    pub manufacturer_name: String,
    pub image_url: String,
    pub is_whitelisted: WhitelistStatus,
}

impl ProductRecord {
    /// Records without a title and without a price are never persisted.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.title.is_empty() || !self.price.is_empty()
    }

    #[must_use]
    pub fn with_whitelist(self, status: WhitelistStatus) -> Self {
        Self {
            is_whitelisted: status,
            ..self
        }
    }
}

/// One selected option of one variant dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub variant_product_url: String,
    /// Back-reference by value to the owning product's `product_url`
    pub main_product_url: String,
    pub title: String,
    pub variant_price: String,
    pub seller_name: String,
    pub manufacturer_name: String,
    pub image_url: String,
    pub is_whitelisted: WhitelistStatus,
    pub variant_type: String,
    pub variant_option: String,
    /// Site option code (e.g. an ASIN) when the control exposes one
    pub variant_identifier: String,
}

impl VariantRecord {
    /// Build a variant record from the product state captured after selecting
    /// `option` of `dimension`.
    ///
    /// `page_url` is the address the page settled on after the selection;
    /// when it is empty the re-extracted product URL is used instead.
    #[must_use]
    pub fn from_selection(
        product: ProductRecord,
        main_product_url: &str,
        page_url: &str,
        dimension: &VariantDimension,
        option: &VariantOption,
    ) -> Self {
        let variant_product_url = if page_url.is_empty() {
            product.product_url
        } else {
            page_url.to_string()
        };

        Self {
            variant_product_url,
            main_product_url: main_product_url.to_string(),
            title: product.title,
            variant_price: product.price,
            seller_name: product.seller_name,
            manufacturer_name: product.manufacturer_name,
            image_url: product.image_url,
            is_whitelisted: WhitelistStatus::default(),
            variant_type: dimension.name.clone(),
            variant_option: option.name.clone(),
            variant_identifier: option.identifier.clone(),
        }
    }

    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.title.is_empty() || !self.variant_price.is_empty()
    }

    #[must_use]
    pub fn with_whitelist(self, status: WhitelistStatus) -> Self {
        Self {
            is_whitelisted: status,
            ..self
        }
    }

    /// Deduplication key inside one session
    #[must_use]
    pub fn fingerprint(&self) -> (String, String, String) {
        (
            self.variant_product_url.clone(),
            self.variant_type.clone(),
            self.variant_option.clone(),
        )
    }
}

/// One axis of product variation discovered on a live page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDimension {
    pub name: String,
    pub options: Vec<VariantOption>,
}

/// A selectable option; `value` is what a dropdown expects, `identifier`
/// is the site's option code (may be empty)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantOption {
    pub name: String,
    pub identifier: String,
    pub value: String,
}
