//! Chromium page backend (feature `chromium`)
//!
//! Drives a real browser over CDP with `chromiumoxide`. Element access is
//! done with small scripts that re-resolve `(locator, index)` on each call,
//! which keeps handles valid across re-renders as long as the match order
//! is stable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::page::{Browser, ElementHandle, Locator, Page, PageError};

pub struct ChromiumBrowser {
    browser: Arc<CdpBrowser>,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub async fn launch(headless: bool, request_timeout: Duration) -> Result<Self, PageError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(request_timeout)
            .launch_timeout(Duration::from_secs(20));
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| PageError::Backend(format!("browser config error: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| PageError::Backend(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler stopped");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            handler,
        })
    }
}

impl Drop for ChromiumBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn new_page(&self) -> Result<Arc<dyn Page>, PageError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| PageError::Backend(e.to_string()))?;
        Ok(Arc::new(ChromiumPage { page }))
    }
}

pub struct ChromiumPage {
    page: chromiumoxide::Page,
}

/// JS expression producing the array of nodes matched by `locator`
fn matches_expression(locator: &Locator) -> String {
    let literal = serde_json::to_string(locator.expression()).unwrap_or_else(|_| "\"\"".to_string());
    match locator {
        Locator::Css(_) => format!("Array.from(document.querySelectorAll({literal}))"),
        Locator::XPath(_) => format!(
            "(() => {{ const r = document.evaluate({literal}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; \
             for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); return out; }})()"
        ),
    }
}

/// Wrap `body` (which sees `el`) so it returns `null` when the element is gone
fn element_script(element: &ElementHandle, body: &str) -> String {
    format!(
        "(() => {{ const el = {}[{}]; if (!el) return null; {body} }})()",
        matches_expression(element.locator()),
        element.index()
    )
}

impl ChromiumPage {
    async fn eval(&self, script: String) -> Result<Value, PageError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| PageError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn eval_element(&self, element: &ElementHandle, body: &str) -> Result<Value, PageError> {
        match self.eval(element_script(element, body)).await? {
            Value::Null => Err(PageError::detached(element)),
            value => Ok(value),
        }
    }
}

#[async_trait]
impl Page for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PageError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Err(_) => Err(PageError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            Ok(Err(e)) => Err(PageError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn current_url(&self) -> Result<String, PageError> {
        self.page
            .url()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| PageError::Backend(e.to_string()))
    }

    async fn title(&self) -> Result<String, PageError> {
        self.page
            .get_title()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| PageError::Backend(e.to_string()))
    }

    async fn query_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, PageError> {
        let count = self
            .eval(format!("{}.length", matches_expression(locator)))
            .await?
            .as_u64()
            .unwrap_or(0);
        let count = usize::try_from(count).unwrap_or(0);
        Ok((0..count).map(|index| ElementHandle::new(locator.clone(), index)).collect())
    }

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, PageError> {
        let value = self
            .eval_element(element, "return el.innerText ?? el.textContent ?? '';")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>, PageError> {
        let name = serde_json::to_string(name).unwrap_or_default();
        let value = self
            .eval_element(element, &format!("return [el.getAttribute({name})];"))
            .await?;
        Ok(value
            .get(0)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn tag_name(&self, element: &ElementHandle) -> Result<String, PageError> {
        let value = self.eval_element(element, "return el.tagName.toLowerCase();").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, PageError> {
        self.eval(expression.to_string()).await
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.eval_element(element, "el.scrollIntoView({block: 'center'}); el.click(); return true;")
            .await
            .map(|_| ())
    }

    async fn select_option(&self, element: &ElementHandle, value: &str) -> Result<(), PageError> {
        self.eval_element(element, &select_body(value)).await.map(|_| ())
    }

    async fn close(&self) -> Result<(), PageError> {
        if let Err(e) = self.page.clone().close().await {
            warn!(error = %e, "Failed to close browser page");
            return Err(PageError::Backend(e.to_string()));
        }
        Ok(())
    }
}

/// Script body choosing `value` in the select that is, or owns, `el`
fn select_body(value: &str) -> String {
    let value = serde_json::to_string(value).unwrap_or_default();
    format!(
        "const select = el.tagName === 'OPTION' ? el.closest('select') : el; \
         if (!select) throw new Error('option outside a select'); \
         select.value = {value}; \
         select.dispatchEvent(new Event('input', {{bubbles: true}})); \
         select.dispatchEvent(new Event('change', {{bubbles: true}})); return true;"
    )
}
