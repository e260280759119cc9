use async_trait::async_trait;
use tracing::debug;

use super::CatalogAdapter;
use crate::domain::{PlatformDescriptor, PlatformKey, ProductRecord, VariantDimension, VariantOption, VariantRecord};
use crate::extraction::profiles::SiteProfile;
use crate::extraction::variants::OptionSelector;
use crate::extraction::{ExtractionError, PlatformAdapter};
use crate::infrastructure::config::{ConfigError, TimingConfig};
use crate::infrastructure::page::{ElementHandle, Locator, Page, PageError, normalize_whitespace};

const OUT_OF_STOCK: &str = "Out of stock";

const AVAILABILITY: [&str; 4] = [
    "div#availability span",
    "div#outOfStock",
    "div#unavailable",
    "span.a-size-medium.a-color-state",
];

const TWISTER_ROWS: &str = "div[id^='inline-twister-row-']";
const TWISTER_PREFIX: &str = "inline-twister-row-";
const DROPDOWNS: &str = "select[name*='dropdown_selected']";
const DROPDOWN_PREFIX: &str = "dropdown_selected_";

/// Amazon product pages: the profile-driven fields plus stock state and
/// twister/dropdown variants
pub struct AmazonAdapter {
    catalog: CatalogAdapter,
    options: AmazonOptions,
}

impl AmazonAdapter {
    pub fn new(profile: SiteProfile, timing: TimingConfig) -> Result<Self, ConfigError> {
        if profile.platform != PlatformKey::Amazon {
            return Err(ConfigError::Invalid(format!(
                "Amazon adapter given a {} profile",
                profile.platform
            )));
        }
        Ok(Self {
            catalog: CatalogAdapter::new(profile, timing)?,
            options: AmazonOptions,
        })
    }

    async fn availability(page: &dyn Page) -> Option<String> {
        for selector in AVAILABILITY {
            if let Ok(Some(element)) = page.query(&Locator::css(selector)).await
                && let Ok(text) = page.inner_text(&element).await
            {
                let text = normalize_whitespace(&text);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
        None
    }
}

#[async_trait]
impl PlatformAdapter for AmazonAdapter {
    fn descriptor(&self) -> PlatformDescriptor {
        self.catalog.descriptor()
    }

    async fn discover_links(&self, page: &dyn Page, limit: usize) -> Result<Vec<String>, PageError> {
        self.catalog.discover_links(page, limit).await
    }

    async fn extract_product(&self, page: &dyn Page) -> Result<ProductRecord, ExtractionError> {
        let mut product = self.catalog.extract_product(page).await?;
        if let Some(availability) = Self::availability(page).await
            && availability.to_lowercase().contains("out of stock")
        {
            debug!(url = %product.product_url, "Product is out of stock");
            product.price = OUT_OF_STOCK.to_string();
        }
        Ok(product)
    }

    async fn extract_variants(&self, page: &dyn Page, main_product_url: &str) -> Vec<VariantRecord> {
        self.catalog
            .variant_loop()
            .run(page, self, &self.options, main_product_url)
            .await
    }

    async fn advance_page(&self, page: &dyn Page) -> bool {
        self.catalog.advance_page(page).await
    }
}

/// Twister rows (`li[data-asin]` swatches) and `dropdown_selected_*` selects
pub struct AmazonOptions;

impl AmazonOptions {
    async fn twister_rows(page: &dyn Page, dimensions: &mut Vec<VariantDimension>) -> Result<(), PageError> {
        for row in page.query_all(&Locator::css(TWISTER_ROWS)).await? {
            let Some(row_id) = page.attribute(&row, "id").await? else {
                continue;
            };
            let name = row_id.replacen(TWISTER_PREFIX, "", 1).replacen("_name", "", 1);
            let scope = format!("div[id=\"{row_id}\"]");

            let mut options = Vec::new();
            for item in page.query_all(&Locator::css(format!("{scope} li[data-asin]"))).await? {
                if page
                    .attribute(&item, "data-initiallyunavailable")
                    .await?
                    .is_some_and(|flag| flag.trim() == "true")
                {
                    continue;
                }
                let asin = page.attribute(&item, "data-asin").await?.unwrap_or_default();
                let option_scope = format!("{scope} li[data-asin=\"{asin}\"]");
                let label = swatch_label(page, &option_scope, &item).await;
                options.push(VariantOption {
                    name: label,
                    identifier: asin.clone(),
                    value: asin,
                });
            }
            insert_dimension(dimensions, name, options);
        }
        Ok(())
    }

    async fn dropdowns(page: &dyn Page, dimensions: &mut Vec<VariantDimension>) -> Result<(), PageError> {
        for select in page.query_all(&Locator::css(DROPDOWNS)).await? {
            let Some(select_name) = page.attribute(&select, "name").await? else {
                continue;
            };
            let name = select_name.replacen(DROPDOWN_PREFIX, "", 1).replacen("_name", "", 1);

            let mut options = Vec::new();
            let entries = Locator::css(format!("select[name=\"{select_name}\"] option"));
            for entry in page.query_all(&entries).await? {
                let value = page.attribute(&entry, "value").await?.unwrap_or_default();
                let label = normalize_whitespace(&page.inner_text(&entry).await?);
                if value.is_empty() || label == "Select" {
                    continue;
                }
                let identifier = page
                    .attribute(&entry, "data-asin")
                    .await?
                    .filter(|asin| !asin.is_empty())
                    .unwrap_or_else(|| value.clone());
                options.push(VariantOption {
                    name: label,
                    identifier,
                    value,
                });
            }
            insert_dimension(dimensions, name, options);
        }
        Ok(())
    }

    async fn activate(page: &dyn Page, element: &ElementHandle, option: &VariantOption) -> Result<(), PageError> {
        if page.tag_name(element).await? == "select" {
            page.select_option(element, &option.value).await
        } else {
            page.click(element).await
        }
    }
}

#[async_trait]
impl OptionSelector for AmazonOptions {
    async fn detect(&self, page: &dyn Page) -> Vec<VariantDimension> {
        let mut dimensions = Vec::new();
        if let Err(e) = Self::twister_rows(page, &mut dimensions).await {
            debug!(error = %e, "Twister rows unreadable");
        }
        if let Err(e) = Self::dropdowns(page, &mut dimensions).await {
            debug!(error = %e, "Variant dropdowns unreadable");
        }
        dimensions
    }

    async fn select(
        &self,
        page: &dyn Page,
        dimension: &VariantDimension,
        option: &VariantOption,
    ) -> Result<(), PageError> {
        let asin = option.identifier.as_str();
        let mut candidates = Vec::with_capacity(4);
        if !asin.is_empty() {
            candidates.push(Locator::css(format!("li[data-asin=\"{asin}\"]")));
        }
        candidates.push(Locator::css(format!(
            "select[name=\"dropdown_selected_{}_name\"]",
            dimension.name
        )));
        candidates.push(Locator::css(format!("select[id=\"variation_{}_name\"]", dimension.name)));
        if !asin.is_empty() {
            candidates.push(Locator::css(format!("[data-asin=\"{asin}\"]")));
        }

        for locator in &candidates {
            let element = match page.query(locator).await {
                Ok(Some(element)) => element,
                Ok(None) => continue,
                Err(e) => {
                    debug!(locator = %locator, error = %e, "Variant control lookup failed");
                    continue;
                }
            };
            match Self::activate(page, &element, option).await {
                Ok(()) => return Ok(()),
                Err(e) => debug!(locator = %locator, error = %e, "Variant control rejected selection"),
            }
        }

        // Last resort: a list item labelled exactly like the option, else one containing the label
        let items = Locator::css("li");
        let wanted = normalize_whitespace(&option.name);
        if !wanted.is_empty() {
            let elements = page.query_all(&items).await?;
            let mut labels = Vec::with_capacity(elements.len());
            for item in &elements {
                let text = page.inner_text(item).await.unwrap_or_default();
                labels.push(normalize_whitespace(&text));
            }
            let found = labels
                .iter()
                .position(|label| *label == wanted)
                .or_else(|| labels.iter().position(|label| label.contains(wanted.as_str())));
            if let Some(index) = found {
                return page.click(&elements[index]).await;
            }
        }
        Err(PageError::detached(&ElementHandle::new(items, 0)))
    }
}

async fn swatch_label(page: &dyn Page, option_scope: &str, item: &ElementHandle) -> String {
    let text_of = |selector: String| async move {
        let element = page.query(&Locator::css(selector)).await.ok()??;
        let text = normalize_whitespace(&page.inner_text(&element).await.ok()?);
        (!text.is_empty()).then_some(text)
    };

    if let Some(text) = text_of(format!("{option_scope} .swatch-title-text-display")).await {
        return text;
    }
    if let Ok(Some(image)) = page.query(&Locator::css(format!("{option_scope} img"))).await
        && let Ok(Some(alt)) = page.attribute(&image, "alt").await
        && !alt.trim().is_empty()
    {
        return normalize_whitespace(&alt);
    }
    if let Some(text) = text_of(format!("{option_scope} .a-button-text")).await {
        return text;
    }
    match page.inner_text(item).await.map(|text| normalize_whitespace(&text)) {
        Ok(text) if !text.is_empty() => text,
        _ => "Unknown".to_string(),
    }
}

/// Later sources replace earlier dimensions of the same name
fn insert_dimension(dimensions: &mut Vec<VariantDimension>, name: String, options: Vec<VariantOption>) {
    if options.is_empty() {
        return;
    }
    dimensions.retain(|existing| existing.name != name);
    dimensions.push(VariantDimension { name, options });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::page::Browser;
    use crate::testing::{PageCall, ScriptedBrowser, ScriptedSite, Transition};
    use std::time::Duration;

    const URL: &str = "https://www.amazon.in/Mug/dp/B0MUG00001";

    const MUG: &str = r#"
        <h1 id="title"><span id="productTitle">  Ceramic Mug  </span></h1>
        <span class="a-price-whole">1,299.</span>
        <div id="bylineInfo">Brand: Clayworks</div>
        <div id="inline-twister-row-color_name">
            <ul>
                <li data-asin="B0MUG00001"><span class="swatch-title-text-display">White</span></li>
                <li data-asin="B0MUG00002"><img alt="Black" src="https://m.media-amazon.com/b.jpg"></li>
                <li data-asin="B0MUG00003" data-initiallyUnavailable="true"><span class="a-button-text">Red</span></li>
            </ul>
        </div>
        <select name="dropdown_selected_size_name">
            <option value="">Select</option>
            <option value="0,B0MUG00011">350 ml</option>
            <option value="1,B0MUG00012" data-asin="B0MUG00012">500 ml</option>
        </select>
    "#;

    fn adapter() -> AmazonAdapter {
        AmazonAdapter::new(SiteProfile::builtin(PlatformKey::Amazon), TimingConfig::immediate()).unwrap()
    }

    async fn open(site: ScriptedSite) -> (ScriptedBrowser, std::sync::Arc<dyn Page>) {
        let browser = ScriptedBrowser::new(site);
        let page = browser.new_page().await.unwrap();
        page.navigate(URL, Duration::ZERO).await.unwrap();
        (browser, page)
    }

    #[tokio::test]
    async fn test_detects_twister_and_dropdown_dimensions() {
        let (_browser, page) = open(ScriptedSite::new().page(URL, MUG)).await;
        let dimensions = AmazonOptions.detect(page.as_ref()).await;

        assert_eq!(dimensions.len(), 2);
        assert_eq!(dimensions[0].name, "color");
        let colors: Vec<_> = dimensions[0].options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(colors, ["White", "Black"]);
        assert_eq!(dimensions[0].options[1].identifier, "B0MUG00002");

        assert_eq!(dimensions[1].name, "size");
        let sizes: Vec<_> = dimensions[1]
            .options
            .iter()
            .map(|o| (o.name.as_str(), o.identifier.as_str(), o.value.as_str()))
            .collect();
        assert_eq!(
            sizes,
            [("350 ml", "0,B0MUG00011", "0,B0MUG00011"), ("500 ml", "B0MUG00012", "1,B0MUG00012")]
        );
    }

    #[tokio::test]
    async fn test_price_is_normalized_and_manufacturer_delabeled() {
        let (_browser, page) = open(ScriptedSite::new().page(URL, MUG)).await;
        let product = adapter().extract_product(page.as_ref()).await.unwrap();

        assert_eq!(product.title, "Ceramic Mug");
        assert_eq!(product.price, "₹1,299");
        assert_eq!(product.manufacturer_name, "Clayworks");
        assert_eq!(product.product_url, URL);
    }

    #[tokio::test]
    async fn test_out_of_stock_overrides_price() {
        let html = format!(r#"{MUG}<div id="availability"><span> Currently Out of Stock. </span></div>"#);
        let (_browser, page) = open(ScriptedSite::new().page(URL, html)).await;
        let product = adapter().extract_product(page.as_ref()).await.unwrap();
        assert_eq!(product.price, OUT_OF_STOCK);
    }

    #[tokio::test]
    async fn test_variant_loop_clicks_swatches_and_selects_dropdown_values() {
        let black = MUG.replace("1,299.", "1,399.");
        let site = ScriptedSite::new()
            .page(URL, MUG)
            .on_click(
                "li[data-asin=\"B0MUG00002\"]",
                Transition::replace("https://www.amazon.in/Mug/dp/B0MUG00002", black),
            );
        let (browser, page) = open(site).await;

        let variants = adapter().extract_variants(page.as_ref(), URL).await;

        assert_eq!(variants.len(), 4);
        assert_eq!(variants[1].variant_option, "Black");
        assert_eq!(variants[1].variant_price, "₹1,399");
        assert_eq!(variants[1].variant_product_url, "https://www.amazon.in/Mug/dp/B0MUG00002");
        assert_eq!(variants[1].variant_identifier, "B0MUG00002");
        assert!(variants.iter().all(|v| v.main_product_url == URL));

        let selects: Vec<_> = browser
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Select { value, .. } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(selects, ["0,B0MUG00011", "1,B0MUG00012"]);
    }

    #[tokio::test]
    async fn test_label_fallback_prefers_exact_item() {
        let sizes = "<ul><li>XS</li><li>Small</li><li> S </li></ul>";
        let (browser, page) = open(ScriptedSite::new().page(URL, sizes)).await;
        let dimension = VariantDimension {
            name: "size".into(),
            options: Vec::new(),
        };
        let option = VariantOption {
            name: "S".into(),
            identifier: String::new(),
            value: "S".into(),
        };

        AmazonOptions.select(page.as_ref(), &dimension, &option).await.unwrap();
        assert_eq!(browser.clicks(), [("li".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_label_fallback_still_accepts_partial_match() {
        let (browser, page) = open(ScriptedSite::new().page(URL, "<ul><li>Size: Large (L)</li></ul>")).await;
        let dimension = VariantDimension {
            name: "size".into(),
            options: Vec::new(),
        };
        let option = VariantOption {
            name: "Large".into(),
            identifier: String::new(),
            value: "Large".into(),
        };

        AmazonOptions.select(page.as_ref(), &dimension, &option).await.unwrap();
        assert_eq!(browser.clicks(), [("li".to_string(), 0)]);
    }

    #[test]
    fn test_rejects_foreign_profile() {
        let result = AmazonAdapter::new(SiteProfile::builtin(PlatformKey::Ebay), TimingConfig::immediate());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
