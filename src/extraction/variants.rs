//! Variant Resolution Loop
//!
//! Each detected dimension is walked independently against the page's
//! current state: select an option, let the page settle, re-extract the
//! product and tag the result. Dimensions are never combined into a cross
//! product.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::PlatformAdapter;
use super::profiles::DimensionProbe;
use crate::domain::{VariantDimension, VariantOption, VariantRecord};
use crate::infrastructure::config::TimingConfig;
use crate::infrastructure::page::{ElementHandle, Locator, Page, PageError, normalize_whitespace};

/// Site-specific option detection and selection
#[async_trait]
pub trait OptionSelector: Send + Sync {
    /// Dimensions with their available options; unavailable options are
    /// already filtered out
    async fn detect(&self, page: &dyn Page) -> Vec<VariantDimension>;

    async fn select(
        &self,
        page: &dyn Page,
        dimension: &VariantDimension,
        option: &VariantOption,
    ) -> Result<(), PageError>;
}

#[derive(Debug, Clone, Copy)]
pub struct VariantLoop {
    pre_wait: Duration,
    settle: Duration,
}

impl VariantLoop {
    pub const fn new(timing: &TimingConfig) -> Self {
        Self {
            pre_wait: timing.pre_variant_wait(),
            settle: timing.variant_settle(),
        }
    }

    pub async fn run(
        &self,
        page: &dyn Page,
        adapter: &dyn PlatformAdapter,
        selector: &dyn OptionSelector,
        main_product_url: &str,
    ) -> Vec<VariantRecord> {
        sleep(self.pre_wait).await;
        let dimensions = selector.detect(page).await;
        if dimensions.is_empty() {
            debug!(url = %main_product_url, "No variant dimensions detected");
            return Vec::new();
        }

        info!(
            url = %main_product_url,
            dimensions = ?dimensions.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            "Resolving variants"
        );

        let mut records = Vec::new();
        for dimension in &dimensions {
            for option in &dimension.options {
                if let Err(e) = selector.select(page, dimension, option).await {
                    warn!(
                        dimension = %dimension.name,
                        option = %option.name,
                        error = %e,
                        "Variant selection failed; skipping option"
                    );
                    continue;
                }
                sleep(self.settle).await;

                let product = match adapter.extract_product(page).await {
                    Ok(product) => product,
                    Err(e) => {
                        warn!(
                            dimension = %dimension.name,
                            option = %option.name,
                            error = %e,
                            "Variant extraction failed; skipping option"
                        );
                        continue;
                    }
                };
                let page_url = page.current_url().await.unwrap_or_default();

                debug!(
                    dimension = %dimension.name,
                    option = %option.name,
                    price = %product.price,
                    "Variant captured"
                );
                records.push(VariantRecord::from_selection(
                    product,
                    main_product_url,
                    &page_url,
                    dimension,
                    option,
                ));
            }
        }
        records
    }
}

/// Option detection driven by [`DimensionProbe`]s from a site profile.
///
/// Every element matching a probe's selector is one option. Selecting an
/// option clicks it, except `<option>` elements, which are chosen in their
/// owning `<select>`.
pub struct ProbeSelector {
    probes: Vec<DimensionProbe>,
}

impl ProbeSelector {
    pub const fn new(probes: Vec<DimensionProbe>) -> Self {
        Self { probes }
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    async fn describe(page: &dyn Page, probe: &DimensionProbe, element: &ElementHandle) -> Option<VariantOption> {
        if let Some(unavailable) = &probe.unavailable
            && let Ok(Some(value)) = page.attribute(element, &unavailable.attribute).await
            && value.contains(unavailable.contains.as_str())
        {
            return None;
        }

        let identifier = match &probe.identifier_attribute {
            Some(attribute) => page.attribute(element, attribute).await.ok().flatten().unwrap_or_default(),
            None => String::new(),
        };
        let mut name = normalize_whitespace(&page.inner_text(element).await.ok()?);
        for fallback in ["title", "aria-label"] {
            if !name.is_empty() {
                break;
            }
            name = page
                .attribute(element, fallback)
                .await
                .ok()
                .flatten()
                .map(|value| normalize_whitespace(&value))
                .unwrap_or_default();
        }
        if name.is_empty() {
            name.clone_from(&identifier);
        }
        if name.is_empty() {
            return None;
        }

        let value = if identifier.is_empty() { name.clone() } else { identifier.clone() };
        Some(VariantOption { name, identifier, value })
    }
}

#[async_trait]
impl OptionSelector for ProbeSelector {
    async fn detect(&self, page: &dyn Page) -> Vec<VariantDimension> {
        let mut dimensions = Vec::new();
        for probe in &self.probes {
            let elements = match page.query_all(&Locator::css(probe.option_selector.as_str())).await {
                Ok(elements) => elements,
                Err(e) => {
                    debug!(dimension = %probe.dimension, error = %e, "Variant probe failed");
                    continue;
                }
            };

            let mut options: Vec<VariantOption> = Vec::new();
            for element in &elements {
                if let Some(option) = Self::describe(page, probe, element).await
                    && !options.iter().any(|known| known.value == option.value)
                {
                    options.push(option);
                }
            }
            if !options.is_empty() {
                dimensions.push(VariantDimension {
                    name: probe.dimension.clone(),
                    options,
                });
            }
        }
        dimensions
    }

    async fn select(
        &self,
        page: &dyn Page,
        dimension: &VariantDimension,
        option: &VariantOption,
    ) -> Result<(), PageError> {
        let probe = self
            .probes
            .iter()
            .find(|probe| probe.dimension == dimension.name)
            .ok_or(PageError::Unsupported {
                operation: "select option of unknown dimension",
            })?;
        let locator = Locator::css(probe.option_selector.as_str());

        // The page may have re-rendered since detection, so match by content
        for element in page.query_all(&locator).await? {
            if let Some(current) = Self::describe(page, probe, &element).await
                && current.value == option.value
            {
                if page.tag_name(&element).await?.eq_ignore_ascii_case("option") {
                    return page.select_option(&element, &option.value).await;
                }
                return page.click(&element).await;
            }
        }
        Err(PageError::detached(&ElementHandle::new(locator, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PaginationMode, PlatformDescriptor, PlatformKey, ProductRecord};
    use crate::extraction::ExtractionError;
    use crate::extraction::profiles::AttributeMatch;
    use crate::testing::{PageCall, ScriptedBrowser, ScriptedSite, Transition};
    use crate::infrastructure::page::Browser;
    use std::sync::Mutex;

    const PRODUCT_URL: &str = "https://shop.example/p/tee";

    /// Reads the price straight from `#price` and counts extractions
    struct PriceOnly {
        extractions: Mutex<usize>,
    }

    #[async_trait]
    impl PlatformAdapter for PriceOnly {
        fn descriptor(&self) -> PlatformDescriptor {
            PlatformDescriptor {
                key: PlatformKey::Generic,
                pagination_mode: PaginationMode::SinglePage,
                variant_support: true,
            }
        }

        async fn discover_links(&self, _page: &dyn Page, _limit: usize) -> Result<Vec<String>, PageError> {
            Ok(Vec::new())
        }

        async fn extract_product(&self, page: &dyn Page) -> Result<ProductRecord, ExtractionError> {
            *self.extractions.lock().unwrap() += 1;
            let price = match page.query(&Locator::css("#price")).await {
                Ok(Some(element)) => page.inner_text(&element).await.unwrap_or_default(),
                _ => String::new(),
            };
            Ok(ProductRecord {
                product_url: PRODUCT_URL.into(),
                title: "Tee".into(),
                price,
                ..ProductRecord::default()
            })
        }

        async fn extract_variants(&self, _page: &dyn Page, _main: &str) -> Vec<VariantRecord> {
            Vec::new()
        }

        async fn advance_page(&self, _page: &dyn Page) -> bool {
            false
        }
    }

    fn probes() -> Vec<DimensionProbe> {
        vec![
            DimensionProbe {
                dimension: "Color".into(),
                option_selector: "ul.colors li".into(),
                identifier_attribute: Some("data-value".into()),
                unavailable: Some(AttributeMatch {
                    attribute: "class".into(),
                    contains: "disabled".into(),
                }),
            },
            DimensionProbe {
                dimension: "Size".into(),
                option_selector: "ul.sizes li".into(),
                identifier_attribute: None,
                unavailable: None,
            },
        ]
    }

    const TEE: &str = r#"
        <span id="price">₹499</span>
        <ul class="colors">
            <li data-value="red">Red</li>
            <li data-value="blue">Blue</li>
            <li data-value="green" class="swatch disabled">Green</li>
        </ul>
        <ul class="sizes"><li>S</li><li>M</li></ul>
    "#;

    #[tokio::test]
    async fn test_detect_skips_unavailable_options() {
        let browser = ScriptedBrowser::new(ScriptedSite::new().page(PRODUCT_URL, TEE));
        let page = browser.new_page().await.unwrap();
        page.navigate(PRODUCT_URL, Duration::ZERO).await.unwrap();

        let dimensions = ProbeSelector::new(probes()).detect(page.as_ref()).await;
        assert_eq!(dimensions.len(), 2);
        assert_eq!(dimensions[0].name, "Color");
        let colors: Vec<_> = dimensions[0].options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(colors, ["Red", "Blue"]);
        assert_eq!(dimensions[0].options[1].identifier, "blue");
        assert_eq!(dimensions[1].options[0].identifier, "");
        assert_eq!(dimensions[1].options[0].value, "S");
    }

    #[tokio::test]
    async fn test_dimensions_are_walked_independently() {
        let browser = ScriptedBrowser::new(ScriptedSite::new().page(PRODUCT_URL, TEE));
        let page = browser.new_page().await.unwrap();
        page.navigate(PRODUCT_URL, Duration::ZERO).await.unwrap();

        let adapter = PriceOnly {
            extractions: Mutex::new(0),
        };
        let selector = ProbeSelector::new(probes());
        let records = VariantLoop::new(&TimingConfig::immediate())
            .run(page.as_ref(), &adapter, &selector, PRODUCT_URL)
            .await;

        // 2 colors + 2 sizes, never 2 x 2
        assert_eq!(browser.clicks().len(), 4);
        assert_eq!(*adapter.extractions.lock().unwrap(), 4);
        let tags: Vec<_> = records
            .iter()
            .map(|r| (r.variant_type.as_str(), r.variant_option.as_str()))
            .collect();
        assert_eq!(tags, [("Color", "Red"), ("Color", "Blue"), ("Size", "S"), ("Size", "M")]);
        assert!(records.iter().all(|r| r.main_product_url == PRODUCT_URL));
        assert!(records.iter().all(|r| r.variant_price == "₹499"));
        assert_eq!(records[0].variant_identifier, "red");
    }

    #[tokio::test]
    async fn test_dropdown_options_are_selected_not_clicked() {
        let dropdown = |price: &str| {
            format!(
                r#"<span id="price">{price}</span>
                <select class="msku"><option value="10">250 g</option><option value="11">500 g</option></select>"#
            )
        };
        let site = ScriptedSite::new().page(PRODUCT_URL, dropdown("₹499")).on_select(
            "select.msku option",
            "11",
            Transition::render(dropdown("₹899")),
        );
        let browser = ScriptedBrowser::new(site);
        let page = browser.new_page().await.unwrap();
        page.navigate(PRODUCT_URL, Duration::ZERO).await.unwrap();

        let probe = DimensionProbe {
            dimension: "Weight".into(),
            option_selector: "select.msku option".into(),
            identifier_attribute: Some("value".into()),
            unavailable: None,
        };
        let adapter = PriceOnly {
            extractions: Mutex::new(0),
        };
        let records = VariantLoop::new(&TimingConfig::immediate())
            .run(page.as_ref(), &adapter, &ProbeSelector::new(vec![probe]), PRODUCT_URL)
            .await;

        let rows: Vec<_> = records
            .iter()
            .map(|r| (r.variant_option.as_str(), r.variant_price.as_str()))
            .collect();
        assert_eq!(rows, [("250 g", "₹499"), ("500 g", "₹899")]);
        assert!(browser.clicks().is_empty());
        let selected: Vec<_> = browser
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Select { value, .. } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(selected, ["10", "11"]);
    }

    #[tokio::test]
    async fn test_failed_selection_skips_only_that_option() {
        struct Flaky;

        #[async_trait]
        impl OptionSelector for Flaky {
            async fn detect(&self, _page: &dyn Page) -> Vec<VariantDimension> {
                let option = |name: &str| VariantOption {
                    name: name.into(),
                    identifier: String::new(),
                    value: name.into(),
                };
                vec![VariantDimension {
                    name: "Size".into(),
                    options: vec![option("S"), option("M"), option("L")],
                }]
            }

            async fn select(
                &self,
                _page: &dyn Page,
                _dimension: &VariantDimension,
                option: &VariantOption,
            ) -> Result<(), PageError> {
                if option.name == "M" {
                    Err(PageError::Script("overlay intercepted click".into()))
                } else {
                    Ok(())
                }
            }
        }

        let browser = ScriptedBrowser::new(ScriptedSite::new().page(PRODUCT_URL, TEE));
        let page = browser.new_page().await.unwrap();
        page.navigate(PRODUCT_URL, Duration::ZERO).await.unwrap();
        let adapter = PriceOnly {
            extractions: Mutex::new(0),
        };

        let records = VariantLoop::new(&TimingConfig::immediate())
            .run(page.as_ref(), &adapter, &Flaky, PRODUCT_URL)
            .await;
        let options: Vec<_> = records.iter().map(|r| r.variant_option.as_str()).collect();
        assert_eq!(options, ["S", "L"]);
    }

    #[tokio::test]
    async fn test_no_dimensions_means_no_selection() {
        let browser = ScriptedBrowser::new(ScriptedSite::new().page(PRODUCT_URL, "<h1>Plain</h1>"));
        let page = browser.new_page().await.unwrap();
        page.navigate(PRODUCT_URL, Duration::ZERO).await.unwrap();
        let adapter = PriceOnly {
            extractions: Mutex::new(0),
        };

        let records = VariantLoop::new(&TimingConfig::immediate())
            .run(page.as_ref(), &adapter, &ProbeSelector::new(probes()), PRODUCT_URL)
            .await;
        assert!(records.is_empty());
        assert!(!browser.calls().iter().any(|call| matches!(call, PageCall::Click { .. })));
    }
}
