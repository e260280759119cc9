//! Scripted page automation for tests
//!
//! A [`ScriptedSite`] is a set of in-memory HTML documents plus rules that
//! say what clicking a control, choosing a dropdown value or scrolling does.
//! [`ScriptedBrowser`] opens [`ScriptedPage`]s over one site and records
//! every interaction so tests can assert on exact call sequences.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::extraction::navigation::ANCHOR_COUNT_SCRIPT;
use crate::infrastructure::html_page::{document_title, resolve_element, select_elements};
use crate::infrastructure::page::{Browser, ElementHandle, Locator, Page, PageError, SCROLL_TO_BOTTOM};

/// What an interaction does to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// New address; `None` keeps the current one
    pub url: Option<String>,
    /// New document; `None` loads the scripted page at `url`
    pub html: Option<String>,
}

impl Transition {
    /// Re-render in place
    pub fn render(html: impl Into<String>) -> Self {
        Self {
            url: None,
            html: Some(html.into()),
        }
    }

    /// Move to another scripted page
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            html: None,
        }
    }

    /// Change address and document together (e.g. a variant with its own URL)
    pub fn replace(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            html: Some(html.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCall {
    Navigate(String),
    Click { locator: String, index: usize },
    Select { locator: String, value: String },
    Evaluate(String),
    Close,
}

#[derive(Debug, Default, Clone)]
pub struct ScriptedSite {
    pages: HashMap<String, String>,
    clicks: HashMap<String, Transition>,
    selections: HashMap<String, Transition>,
    scrolls: HashMap<String, Vec<String>>,
    failing: Vec<String>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Rule for clicking any match of `expression`, or only match `#index`
    /// when the key is written as `"<expression>#<index>"`.
    #[must_use]
    pub fn on_click(mut self, key: impl Into<String>, transition: Transition) -> Self {
        self.clicks.insert(key.into(), transition);
        self
    }

    #[must_use]
    pub fn on_select(mut self, expression: &str, value: &str, transition: Transition) -> Self {
        self.selections.insert(format!("{expression}={value}"), transition);
        self
    }

    /// Successive documents revealed by scrolling `url` to the bottom
    #[must_use]
    pub fn scroll_states(mut self, url: impl Into<String>, states: Vec<String>) -> Self {
        self.scrolls.insert(url.into(), states);
        self
    }

    /// Navigation to `url` fails as if the site were unreachable
    #[must_use]
    pub fn unreachable(mut self, url: impl Into<String>) -> Self {
        self.failing.push(url.into());
        self
    }
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    html: String,
    scrolled: usize,
    closed: bool,
}

pub struct ScriptedPage {
    site: Arc<ScriptedSite>,
    state: Mutex<PageState>,
    calls: Arc<Mutex<Vec<PageCall>>>,
}

impl ScriptedPage {
    pub fn new(site: Arc<ScriptedSite>) -> Self {
        Self::with_log(site, Arc::default())
    }

    fn with_log(site: Arc<ScriptedSite>, calls: Arc<Mutex<Vec<PageCall>>>) -> Self {
        Self {
            site,
            state: Mutex::new(PageState::default()),
            calls,
        }
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, call: PageCall) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    fn read<T>(&self, f: impl FnOnce(&PageState) -> Result<T, PageError>) -> Result<T, PageError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(PageError::Closed);
        }
        f(&state)
    }

    fn apply(&self, transition: &Transition) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let url = transition.url.clone().unwrap_or_else(|| state.url.clone());
        let html = match &transition.html {
            Some(html) => html.clone(),
            None => self
                .site
                .pages
                .get(&url)
                .cloned()
                .ok_or_else(|| PageError::NavigationFailed {
                    url: url.clone(),
                    reason: "no scripted page".into(),
                })?,
        };
        *state = PageState {
            url,
            html,
            scrolled: 0,
            closed: false,
        };
        Ok(())
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), PageError> {
        self.record(PageCall::Navigate(url.to_string()));
        self.read(|_| Ok(()))?;
        if self.site.failing.iter().any(|failing| failing == url) {
            return Err(PageError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: 0,
            });
        }
        self.apply(&Transition::navigate(url))
    }

    async fn current_url(&self) -> Result<String, PageError> {
        self.read(|state| Ok(state.url.clone()))
    }

    async fn title(&self) -> Result<String, PageError> {
        self.read(|state| Ok(document_title(&state.html)))
    }

    async fn query_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, PageError> {
        let count = self.read(|state| select_elements(&state.html, locator).map(|found| found.len()))?;
        Ok((0..count).map(|index| ElementHandle::new(locator.clone(), index)).collect())
    }

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, PageError> {
        self.read(|state| resolve_element(&state.html, element).map(|found| found.text))
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>, PageError> {
        self.read(|state| {
            resolve_element(&state.html, element).map(|found| found.attribute(name).map(str::to_string))
        })
    }

    async fn tag_name(&self, element: &ElementHandle) -> Result<String, PageError> {
        self.read(|state| resolve_element(&state.html, element).map(|found| found.tag))
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, PageError> {
        self.record(PageCall::Evaluate(expression.to_string()));
        if expression == ANCHOR_COUNT_SCRIPT {
            let count = self.read(|state| select_elements(&state.html, &Locator::css("a[href]")).map(|a| a.len()))?;
            return Ok(Value::from(count));
        }
        if expression == SCROLL_TO_BOTTOM {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(next) = self.site.scrolls.get(&state.url).and_then(|states| states.get(state.scrolled)) {
                state.html = next.clone();
                state.scrolled += 1;
            }
        }
        Ok(Value::Null)
    }

    async fn wait_for(&self, locator: &Locator, _timeout: Duration) -> Result<bool, PageError> {
        Ok(self.query(locator).await?.is_some())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        let expression = element.locator().expression().to_string();
        self.record(PageCall::Click {
            locator: expression.clone(),
            index: element.index(),
        });
        let (url, target) = self.read(|state| {
            let found = resolve_element(&state.html, element)?;
            Ok((state.url.clone(), found))
        })?;

        let keyed = format!("{expression}#{}", element.index());
        if let Some(transition) = self.site.clicks.get(&keyed).or_else(|| self.site.clicks.get(&expression)) {
            return self.apply(transition);
        }
        if target.tag == "a"
            && let Some(href) = target.attribute("href")
            && let Some(absolute) = Url::parse(&url).ok().and_then(|base| base.join(href).ok())
            && self.site.pages.contains_key(absolute.as_str())
        {
            return self.apply(&Transition::navigate(absolute.as_str()));
        }
        Ok(())
    }

    async fn select_option(&self, element: &ElementHandle, value: &str) -> Result<(), PageError> {
        let expression = element.locator().expression().to_string();
        self.record(PageCall::Select {
            locator: expression.clone(),
            value: value.to_string(),
        });
        let tag = self.read(|state| resolve_element(&state.html, element).map(|found| found.tag))?;
        if tag != "select" && tag != "option" {
            return Err(PageError::Script(format!("{expression} is a <{tag}>, not a <select>")));
        }
        match self.site.selections.get(&format!("{expression}={value}")) {
            Some(transition) => self.apply(transition),
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), PageError> {
        self.record(PageCall::Close);
        self.state.lock().unwrap_or_else(PoisonError::into_inner).closed = true;
        Ok(())
    }
}

/// Opens scripted pages that share one call log
pub struct ScriptedBrowser {
    site: Arc<ScriptedSite>,
    calls: Arc<Mutex<Vec<PageCall>>>,
}

impl ScriptedBrowser {
    pub fn new(site: ScriptedSite) -> Self {
        Self {
            site: Arc::new(site),
            calls: Arc::default(),
        }
    }

    /// Every call made on every page, in order
    pub fn calls(&self) -> Vec<PageCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clicks(&self) -> Vec<(String, usize)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Click { locator, index } => Some((locator, index)),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PageCall::Navigate(url) => Some(url),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn new_page(&self) -> Result<Arc<dyn Page>, PageError> {
        Ok(Arc::new(ScriptedPage::with_log(
            Arc::clone(&self.site),
            Arc::clone(&self.calls),
        )))
    }
}
