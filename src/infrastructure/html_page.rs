//! Static HTML page backend
//!
//! `HtmlPage` keeps the raw HTML of the last loaded document and answers CSS
//! queries by parsing it with `scraper`. Navigation is a plain HTTP GET via
//! `reqwest`, and clicking an anchor follows its `href`. Anything that needs a
//! live DOM (XPath, script evaluation, form selection) reports
//! [`PageError::Unsupported`], which the field resolver treats as a miss.
//!
//! `scraper::Html` is not `Send`, so documents are re-parsed per query
//! instead of being cached across await points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::config::ScrapeConfig;
use super::page::{Browser, ElementHandle, Locator, Page, PageError};

/// Owned copy of one matched element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub tag: String,
    pub text: String,
    pub attributes: Vec<(String, String)>,
}

impl ElementSnapshot {
    fn from_element(element: ElementRef<'_>) -> Self {
        Self {
            tag: element.value().name().to_ascii_lowercase(),
            text: element.text().collect(),
            attributes: element
                .value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Run a CSS locator against `html` and snapshot every match in document order.
pub fn select_elements(html: &str, locator: &Locator) -> Result<Vec<ElementSnapshot>, PageError> {
    let Locator::Css(css) = locator else {
        return Err(PageError::Unsupported { operation: "xpath query" });
    };
    let selector = Selector::parse(css).map_err(|e| PageError::InvalidLocator {
        locator: locator.to_string(),
        reason: format!("{e:?}"),
    })?;
    let document = Html::parse_document(html);
    Ok(document.select(&selector).map(ElementSnapshot::from_element).collect())
}

/// Snapshot the element a handle points at.
pub fn resolve_element(html: &str, element: &ElementHandle) -> Result<ElementSnapshot, PageError> {
    select_elements(html, element.locator())?
        .into_iter()
        .nth(element.index())
        .ok_or_else(|| PageError::detached(element))
}

pub fn document_title(html: &str) -> String {
    select_elements(html, &Locator::css("title"))
        .ok()
        .and_then(|titles| titles.into_iter().next())
        .map(|title| title.text.trim().to_string())
        .unwrap_or_default()
}

#[derive(Debug, Default)]
struct Document {
    url: String,
    html: String,
}

pub struct HtmlPage {
    client: Option<Client>,
    document: Mutex<Document>,
    closed: AtomicBool,
}

impl HtmlPage {
    /// A page that loads documents over HTTP with `client`
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client: Some(client),
            document: Mutex::new(Document::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// An offline page over an in-memory document
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            client: None,
            document: Mutex::new(Document {
                url: url.into(),
                html: html.into(),
            }),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), PageError> {
        if self.closed.load(Ordering::Acquire) {
            Err(PageError::Closed)
        } else {
            Ok(())
        }
    }

    fn with_document<T>(&self, f: impl FnOnce(&Document) -> T) -> Result<T, PageError> {
        self.ensure_open()?;
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&document))
    }

    fn replace_document(&self, url: String, html: String) {
        let mut document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        *document = Document { url, html };
    }
}

#[async_trait]
impl Page for HtmlPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PageError> {
        self.ensure_open()?;
        let Some(client) = &self.client else {
            let current = self.with_document(|doc| doc.url.clone())?;
            return if current == url {
                Ok(())
            } else {
                Err(PageError::NavigationFailed {
                    url: url.to_string(),
                    reason: "offline document".to_string(),
                })
            };
        };

        debug!(url, "Fetching page");
        let response = client.get(url).timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                PageError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                PageError::NavigationFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::NavigationFailed {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| PageError::NavigationFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.replace_document(final_url, html);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        self.with_document(|doc| doc.url.clone())
    }

    async fn title(&self) -> Result<String, PageError> {
        self.with_document(|doc| document_title(&doc.html))
    }

    async fn query_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, PageError> {
        let count = self.with_document(|doc| select_elements(&doc.html, locator).map(|found| found.len()))??;
        Ok((0..count).map(|index| ElementHandle::new(locator.clone(), index)).collect())
    }

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, PageError> {
        self.with_document(|doc| resolve_element(&doc.html, element).map(|found| found.text))?
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>, PageError> {
        self.with_document(|doc| {
            resolve_element(&doc.html, element).map(|found| found.attribute(name).map(str::to_string))
        })?
    }

    async fn tag_name(&self, element: &ElementHandle) -> Result<String, PageError> {
        self.with_document(|doc| resolve_element(&doc.html, element).map(|found| found.tag))?
    }

    async fn evaluate(&self, _expression: &str) -> Result<serde_json::Value, PageError> {
        Err(PageError::Unsupported { operation: "evaluate" })
    }

    async fn wait_for(&self, locator: &Locator, _timeout: Duration) -> Result<bool, PageError> {
        // A static document never changes while waiting.
        Ok(self.query(locator).await?.is_some())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        let (base, target) = self.with_document(|doc| {
            resolve_element(&doc.html, element).map(|found| (doc.url.clone(), found))
        })??;

        let href = match target.attribute("href") {
            Some(href) if target.tag == "a" => href.to_string(),
            _ => return Err(PageError::Unsupported { operation: "click" }),
        };
        let next = Url::parse(&base)
            .and_then(|base| base.join(&href))
            .map_err(|e| PageError::NavigationFailed {
                url: href.clone(),
                reason: e.to_string(),
            })?;

        self.navigate(next.as_str(), Duration::from_secs(30)).await
    }

    async fn select_option(&self, _element: &ElementHandle, _value: &str) -> Result<(), PageError> {
        Err(PageError::Unsupported { operation: "select_option" })
    }

    async fn close(&self) -> Result<(), PageError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Hands out `HtmlPage`s sharing one HTTP client (and its cookie jar)
#[derive(Clone)]
pub struct HttpBrowser {
    client: Client,
}

impl HttpBrowser {
    pub fn from_config(config: &ScrapeConfig) -> Result<Self, PageError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| PageError::Backend(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_page(&self) -> Result<Arc<dyn Page>, PageError> {
        Ok(Arc::new(HtmlPage::with_client(self.client.clone())))
    }
}
