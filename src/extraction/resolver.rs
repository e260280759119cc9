//! Field Resolver
//!
//! A field is described by an ordered list of [`Strategy`] values. The
//! resolver tries them in order and returns the first non-empty, cleaned
//! result. A strategy that errors is a miss; only exhaustion of the list
//! yields an empty string.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use super::cleaning::{Cleaner, apply_all, cached_regex};
use super::links::normalize_url;
use crate::infrastructure::page::{Locator, Page, PageError, normalize_whitespace};

/// Elements scanned by a text-pattern strategy
const PATTERN_SCAN_LIMIT: usize = 200;

const JSON_LD_SELECTOR: &str = "script[type='application/ld+json']";

/// Where a strategy reads its raw value from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    /// Text of the first element matching a CSS selector
    Css { selector: String },
    /// Text of the first node matching an XPath expression
    #[serde(rename = "xpath")]
    XPath { path: String },
    /// First non-empty attribute among `names` on the first match
    Attribute { locator: Locator, names: Vec<String> },
    /// First regex match over the text of the elements matching `selector`
    TextPattern { selector: String, pattern: String },
    /// Dotted path into a JSON-LD `Product` object
    Embedded { path: String },
    /// Script expression evaluated in the page
    Script { expression: String },
    PageTitle,
    CurrentUrl,
}

/// One entry of a field's fallback chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(flatten)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<Cleaner>,
}

impl Strategy {
    pub const fn new(source: Source) -> Self {
        Self { source, post: Vec::new() }
    }

    pub fn css(selector: &str) -> Self {
        Self::new(Source::Css {
            selector: selector.to_string(),
        })
    }

    pub fn xpath(path: &str) -> Self {
        Self::new(Source::XPath { path: path.to_string() })
    }

    pub fn attribute(locator: Locator, names: &[&str]) -> Self {
        Self::new(Source::Attribute {
            locator,
            names: names.iter().map(ToString::to_string).collect(),
        })
    }

    /// `content` of a `<meta>` tag matched by `selector`
    pub fn meta(selector: &str) -> Self {
        Self::attribute(Locator::css(selector), &["content"])
    }

    pub fn text_pattern(selector: &str, pattern: &str) -> Self {
        Self::new(Source::TextPattern {
            selector: selector.to_string(),
            pattern: pattern.to_string(),
        })
    }

    pub fn embedded(path: &str) -> Self {
        Self::new(Source::Embedded { path: path.to_string() })
    }

    pub fn script(expression: &str) -> Self {
        Self::new(Source::Script {
            expression: expression.to_string(),
        })
    }

    pub const fn page_title() -> Self {
        Self::new(Source::PageTitle)
    }

    pub const fn current_url() -> Self {
        Self::new(Source::CurrentUrl)
    }

    /// Append a cleaning rule
    #[must_use]
    pub fn then(mut self, cleaner: Cleaner) -> Self {
        self.post.push(cleaner);
        self
    }
}

/// Resolves strategy lists against one page.
///
/// JSON-LD blocks are parsed at most once per resolver.
pub struct FieldResolver<'a> {
    page: &'a dyn Page,
    embedded: OnceCell<Vec<Value>>,
}

impl<'a> FieldResolver<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self {
            page,
            embedded: OnceCell::new(),
        }
    }

    pub const fn page(&self) -> &'a dyn Page {
        self.page
    }

    /// First non-empty cleaned value, or an empty string.
    pub async fn resolve(&self, field: &str, strategies: &[Strategy]) -> String {
        for (position, strategy) in strategies.iter().enumerate() {
            match self.read(&strategy.source).await {
                Ok(Some(raw)) => {
                    let normalized = normalize_whitespace(&raw);
                    if normalized.is_empty() {
                        continue;
                    }
                    if let Some(value) = apply_all(&strategy.post, normalized) {
                        debug!(field, strategy = position, "Field resolved");
                        return value;
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(field, strategy = position, error = %e, "Strategy failed"),
            }
        }
        debug!(field, tried = strategies.len(), "Field not found");
        String::new()
    }

    async fn read(&self, source: &Source) -> Result<Option<String>, PageError> {
        match source {
            Source::Css { selector } => self.first_text(&Locator::css(selector.as_str())).await,
            Source::XPath { path } => self.first_text(&Locator::xpath(path.as_str())).await,
            Source::Attribute { locator, names } => self.first_attribute(locator, names).await,
            Source::TextPattern { selector, pattern } => self.pattern_text(selector, pattern).await,
            Source::Embedded { path } => Ok(self.embedded_value(path).await),
            Source::Script { expression } => Ok(scalar_text(&self.page.evaluate(expression).await?)),
            Source::PageTitle => self.page.title().await.map(Some),
            // Same identity as discovered links: no query string or fragment
            Source::CurrentUrl => {
                let url = self.page.current_url().await?;
                Ok(Some(normalize_url(&url, None).unwrap_or(url)))
            }
        }
    }

    async fn first_text(&self, locator: &Locator) -> Result<Option<String>, PageError> {
        match self.page.query(locator).await? {
            Some(element) => self.page.inner_text(&element).await.map(Some),
            None => Ok(None),
        }
    }

    async fn first_attribute(&self, locator: &Locator, names: &[String]) -> Result<Option<String>, PageError> {
        let (locator, names) = split_attribute_step(locator, names);
        let Some(element) = self.page.query(&locator).await? else {
            return Ok(None);
        };
        for name in &names {
            if let Some(value) = self.page.attribute(&element, name).await?
                && !value.trim().is_empty()
            {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    async fn pattern_text(&self, selector: &str, pattern: &str) -> Result<Option<String>, PageError> {
        let regex = cached_regex(pattern).map_err(|e| PageError::InvalidLocator {
            locator: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let elements = self.page.query_all(&Locator::css(selector)).await?;
        for element in elements.iter().take(PATTERN_SCAN_LIMIT) {
            let text = self.page.inner_text(element).await?;
            if let Some(captures) = regex.captures(&text) {
                let found = captures.get(1).or_else(|| captures.get(0));
                if let Some(found) = found {
                    return Ok(Some(found.as_str().to_string()));
                }
            }
        }
        Ok(None)
    }

    async fn embedded_value(&self, path: &str) -> Option<String> {
        let products = self.embedded.get_or_init(|| load_embedded_products(self.page)).await;
        products
            .iter()
            .find_map(|product| lookup_path(product, path).filter(|value| !value.trim().is_empty()))
    }
}

/// `//a/@href` style XPath attribute steps become an element query plus a name.
fn split_attribute_step(locator: &Locator, names: &[String]) -> (Locator, Vec<String>) {
    if let Locator::XPath(path) = locator
        && let Some((element, attribute)) = path.rsplit_once("/@")
        && !attribute.contains('/')
    {
        let mut names = names.to_vec();
        if names.is_empty() {
            names.push(attribute.to_string());
        }
        return (Locator::xpath(element), names);
    }
    (locator.clone(), names.to_vec())
}

async fn load_embedded_products(page: &dyn Page) -> Vec<Value> {
    let mut products = Vec::new();
    let blocks = match page.query_all(&Locator::css(JSON_LD_SELECTOR)).await {
        Ok(blocks) => blocks,
        Err(e) => {
            debug!(error = %e, "No embedded metadata");
            return products;
        }
    };
    for block in &blocks {
        let Ok(text) = page.inner_text(block).await else {
            continue;
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => collect_products(&value, &mut products),
            Err(e) => debug!(error = %e, "Skipping malformed JSON-LD block"),
        }
    }
    products
}

/// Collect `Product` nodes found directly, inside arrays, or inside `@graph`.
pub fn collect_products(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_products(item, out);
            }
        }
        Value::Object(map) => {
            if map.get("@type").is_some_and(is_product_type) {
                out.push(value.clone());
            }
            if let Some(graph) = map.get("@graph") {
                collect_products(graph, out);
            }
        }
        _ => {}
    }
}

fn is_product_type(kind: &Value) -> bool {
    match kind {
        Value::String(kind) => kind == "Product",
        Value::Array(kinds) => kinds.iter().any(|kind| kind.as_str() == Some("Product")),
        _ => false,
    }
}

/// Follow a dotted path; arrays along the way contribute their first element.
pub fn lookup_path(value: &Value, path: &str) -> Option<String> {
    let mut current = value;
    for segment in path.split('.').filter(|segment| !segment.is_empty()) {
        if let Value::Array(items) = current {
            current = items.first()?;
        }
        current = current.get(segment)?;
    }
    scalar_text(current)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => items.first().and_then(scalar_text),
        Value::Object(map) => map.get("name").and_then(scalar_text),
        Value::Null | Value::Bool(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::html_page::HtmlPage;
    use serde_json::json;

    const PRODUCT_HTML: &str = r#"
        <html><head>
          <title>Blue Mug | Buy Online</title>
          <meta property="og:image" content="//cdn.example/mug.jpg">
          <script type="application/ld+json">
            {"@context":"https://schema.org","@graph":[
              {"@type":"BreadcrumbList"},
              {"@type":"Product","name":"Blue Mug","brand":{"name":"Acme"},
               "offers":[{"price":"199","priceCurrency":"INR"}]}
            ]}
          </script>
        </head><body>
          <h1 class="title">   </h1>
          <h2 class="title">Blue
             Mug</h2>
          <div class="price">Deal price: ₹ 199 only</div>
          <span class="seller">function () { track(); }</span>
        </body></html>
    "#;

    fn page() -> HtmlPage {
        HtmlPage::from_html("https://shop.example/p/mug", PRODUCT_HTML)
    }

    #[tokio::test]
    async fn test_first_non_empty_strategy_wins() {
        let page = page();
        let resolver = FieldResolver::new(&page);
        let title = resolver
            .resolve(
                "title",
                &[Strategy::css("h1.title"), Strategy::css("h2.title"), Strategy::page_title()],
            )
            .await;
        assert_eq!(title, "Blue Mug");
    }

    #[tokio::test]
    async fn test_unsupported_strategies_are_misses() {
        let page = page();
        let resolver = FieldResolver::new(&page);
        let title = resolver
            .resolve(
                "title",
                &[
                    Strategy::xpath("//h1"),
                    Strategy::script("document.title"),
                    Strategy::page_title().then(Cleaner::TitleSuffix),
                ],
            )
            .await;
        assert_eq!(title, "Blue Mug");
    }

    #[tokio::test]
    async fn test_cleaner_rejection_moves_to_next_strategy() {
        let page = page();
        let resolver = FieldResolver::new(&page);
        let seller = resolver
            .resolve(
                "seller",
                &[
                    Strategy::css("span.seller").then(Cleaner::RejectScriptLike),
                    Strategy::embedded("brand.name"),
                ],
            )
            .await;
        assert_eq!(seller, "Acme");
    }

    #[tokio::test]
    async fn test_attribute_and_pattern_sources() {
        let page = page();
        let resolver = FieldResolver::new(&page);
        let image = resolver
            .resolve(
                "image",
                &[Strategy::meta("meta[property='og:image']").then(Cleaner::ImageUrl)],
            )
            .await;
        assert_eq!(image, "https://cdn.example/mug.jpg");

        let price = resolver
            .resolve("price", &[Strategy::text_pattern("div", r"₹\s*[\d,]+")])
            .await;
        assert_eq!(price, "₹ 199");
    }

    #[tokio::test]
    async fn test_exhaustion_yields_empty() {
        let page = page();
        let resolver = FieldResolver::new(&page);
        let value = resolver
            .resolve("seller", &[Strategy::css("#missing"), Strategy::embedded("seller.name")])
            .await;
        assert_eq!(value, "");
    }

    #[test]
    fn test_lookup_path_walks_arrays_and_objects() {
        let product = json!({
            "offers": [{"price": 199, "seller": {"name": "Acme"}}],
            "brand": "Acme Brand",
            "image": ["https://cdn.example/a.jpg", "https://cdn.example/b.jpg"]
        });
        assert_eq!(lookup_path(&product, "offers.price").as_deref(), Some("199"));
        assert_eq!(lookup_path(&product, "offers.seller").as_deref(), Some("Acme"));
        assert_eq!(lookup_path(&product, "brand.name"), None);
        assert_eq!(lookup_path(&product, "image").as_deref(), Some("https://cdn.example/a.jpg"));
    }

    #[test]
    fn test_collect_products_in_arrays_and_graphs() {
        let mut found = Vec::new();
        collect_products(
            &json!([
                {"@type": "Organization"},
                {"@type": ["Product", "Thing"], "name": "A"},
                {"@graph": [{"@type": "Product", "name": "B"}]}
            ]),
            &mut found,
        );
        let names: Vec<_> = found.iter().filter_map(|p| p["name"].as_str()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn test_xpath_attribute_step_is_split() {
        let (locator, names) = split_attribute_step(&Locator::xpath("//link[@rel='canonical']/@href"), &[]);
        assert_eq!(locator, Locator::xpath("//link[@rel='canonical']"));
        assert_eq!(names, ["href"]);
    }

    #[test]
    fn test_strategy_json_shape() {
        let strategy: Strategy = serde_json::from_str(
            r#"{"kind":"css","selector":"h1","post":[{"rule":"title_suffix"}]}"#,
        )
        .unwrap();
        assert_eq!(strategy, Strategy::css("h1").then(Cleaner::TitleSuffix));
    }
}
