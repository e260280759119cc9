//! Platform keys and their static descriptors
//!
//! The set of supported platforms is closed. Each key maps to exactly one
//! descriptor (pagination mode + variant support) that never changes after
//! startup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a platform's listing pages are traversed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationMode {
    /// A "next" control moves to the following listing page
    Paged,
    /// More products appear after scrolling to the bottom
    InfiniteScroll,
    /// The listing is a single page; never advanced
    SinglePage,
}

impl PaginationMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paged => "paged",
            Self::InfiniteScroll => "infinite-scroll",
            Self::SinglePage => "single-page",
        }
    }
}

impl fmt::Display for PaginationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKey {
    Amazon,
    Flipkart,
    Myntra,
    Meesho,
    Ajio,
    Ebay,
    Redbubble,
    Snapdeal,
    Shopsy,
    Nykaa,
    Tatacliq,
    Indiamart,
    Walmart,
    Generic,
}

impl PlatformKey {
    /// Detection order; `Generic` is the fallback and is never matched by host.
    pub const ALL: [Self; 14] = [
        Self::Amazon,
        Self::Flipkart,
        Self::Myntra,
        Self::Meesho,
        Self::Ajio,
        Self::Ebay,
        Self::Redbubble,
        Self::Snapdeal,
        Self::Shopsy,
        Self::Nykaa,
        Self::Tatacliq,
        Self::Indiamart,
        Self::Walmart,
        Self::Generic,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Amazon => "amazon",
            Self::Flipkart => "flipkart",
            Self::Myntra => "myntra",
            Self::Meesho => "meesho",
            Self::Ajio => "ajio",
            Self::Ebay => "ebay",
            Self::Redbubble => "redbubble",
            Self::Snapdeal => "snapdeal",
            Self::Shopsy => "shopsy",
            Self::Nykaa => "nykaa",
            Self::Tatacliq => "tatacliq",
            Self::Indiamart => "indiamart",
            Self::Walmart => "walmart",
            Self::Generic => "generic",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Amazon => "AMAZON",
            Self::Flipkart => "FLIPKART",
            Self::Myntra => "MYNTRA",
            Self::Meesho => "MEESHO",
            Self::Ajio => "AJIO",
            Self::Ebay => "EBAY",
            Self::Redbubble => "REDBUBBLE",
            Self::Snapdeal => "SNAPDEAL",
            Self::Shopsy => "SHOPSY",
            Self::Nykaa => "NYKAA",
            Self::Tatacliq => "TATA CLIQ",
            Self::Indiamart => "INDIAMART",
            Self::Walmart => "WALMART",
            Self::Generic => "UNKNOWN PLATFORM (Generic Mode)",
        }
    }

    /// Detect the platform from a hostname by looking for `"<key>."`.
    #[must_use]
    pub fn detect(host: &str) -> Self {
        let host = host.to_lowercase();
        Self::ALL
            .into_iter()
            .filter(|key| *key != Self::Generic)
            .find(|key| host.contains(&format!("{}.", key.as_str())))
            .unwrap_or(Self::Generic)
    }

    #[must_use]
    pub const fn descriptor(self) -> PlatformDescriptor {
        let (pagination_mode, variant_support) = match self {
            Self::Amazon
            | Self::Flipkart
            | Self::Myntra
            | Self::Ebay
            | Self::Walmart
            | Self::Redbubble => (PaginationMode::Paged, true),
            Self::Shopsy | Self::Generic => (PaginationMode::Paged, false),
            Self::Ajio | Self::Nykaa => (PaginationMode::InfiniteScroll, true),
            Self::Meesho | Self::Indiamart | Self::Snapdeal => {
                (PaginationMode::InfiniteScroll, false)
            }
            Self::Tatacliq => (PaginationMode::SinglePage, true),
        };

        PlatformDescriptor {
            key: self,
            pagination_mode,
            variant_support,
        }
    }

    /// Whether `url` points at one product rather than a listing.
    ///
    /// Known platforms use their product path shapes. Everything else needs
    /// a deep path (more than six `/`-separated pieces) plus a product-like
    /// keyword.
    #[must_use]
    pub fn is_single_product_url(self, url: &str) -> bool {
        match self {
            Self::Amazon => url.contains("/dp/") || url.contains("/gp/product/"),
            Self::Flipkart => url.contains("/p/") || url.contains("/item/"),
            Self::Myntra => url.contains("/buy/"),
            Self::Ebay => url.contains("/itm/"),
            Self::Walmart => url.contains("/ip/"),
            _ => {
                const KEYWORDS: [&str; 7] = ["product", "item", "buy", "dp", "p/", "itm", "ip/"];
                let lowered = url.to_lowercase();
                url.split('/').count() > 6 && KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
            }
        }
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown platform key: {s}"))
    }
}

/// Static, read-only facts about one platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    pub key: PlatformKey,
    pub pagination_mode: PaginationMode,
    pub variant_support: bool,
}
