//! Product link discovery
//!
//! Anchors are collected in document order, filtered by URL-shape rules,
//! normalized (query string and fragment stripped) and deduplicated.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::infrastructure::page::{Locator, Page, PageError};

const ANCHOR_HREFS_SCRIPT: &str = "Array.from(document.querySelectorAll('a[href]'), a => a.href)";

/// URL-shape filter for one tier of candidate links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRule {
    /// Any of these substrings marks a product URL
    pub patterns: Vec<String>,
    /// Product-ID regex the URL must match, when set
    pub id_pattern: Option<String>,
    /// Tracking or listing URLs containing any of these are dropped
    pub exclude: Vec<String>,
    /// Host fragment the normalized URL must contain
    pub required: Option<String>,
}

impl LinkRule {
    pub fn patterns(patterns: &[&str]) -> Self {
        Self {
            patterns: patterns.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id_pattern(mut self, pattern: &str) -> Self {
        self.id_pattern = Some(pattern.to_string());
        self
    }

    #[must_use]
    pub fn excluding(mut self, fragments: &[&str]) -> Self {
        self.exclude = fragments.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn requiring(mut self, fragment: &str) -> Self {
        self.required = Some(fragment.to_string());
        self
    }
}

/// A rule plus the fill level below which it runs.
///
/// A tier runs only while fewer than `limit / fill_divisor` links have been
/// collected; `1` means it always runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTier {
    pub rule: LinkRule,
    #[serde(default = "default_fill_divisor")]
    pub fill_divisor: usize,
}

const fn default_fill_divisor() -> usize {
    1
}

impl LinkTier {
    pub const fn always(rule: LinkRule) -> Self {
        Self { rule, fill_divisor: 1 }
    }

    pub const fn below(rule: LinkRule, fill_divisor: usize) -> Self {
        Self { rule, fill_divisor }
    }
}

struct CompiledRule {
    rule: LinkRule,
    id: Option<Regex>,
    fill_divisor: usize,
}

impl CompiledRule {
    fn accepts(&self, href: &str, normalized: &str) -> bool {
        if self.rule.exclude.iter().any(|fragment| href.contains(fragment.as_str())) {
            return false;
        }
        if let Some(required) = &self.rule.required
            && !normalized.contains(required.as_str())
        {
            return false;
        }
        if let Some(id) = &self.id
            && !id.is_match(href)
        {
            return false;
        }
        (self.rule.patterns.is_empty() && self.id.is_some())
            || self.rule.patterns.iter().any(|pattern| href.contains(pattern.as_str()))
    }
}

/// Compiled tiers of link rules
pub struct LinkSelector {
    tiers: Vec<CompiledRule>,
}

impl LinkSelector {
    pub fn compile(tiers: &[LinkTier]) -> Result<Self, regex::Error> {
        let tiers = tiers
            .iter()
            .map(|tier| {
                let id = tier.rule.id_pattern.as_deref().map(Regex::new).transpose()?;
                Ok(CompiledRule {
                    rule: tier.rule.clone(),
                    id,
                    fill_divisor: tier.fill_divisor.max(1),
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { tiers })
    }

    /// Ordered, unique product URLs, at most `limit` of them.
    pub fn select(&self, hrefs: &[String], limit: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();

        for tier in &self.tiers {
            if selected.len() >= limit / tier.fill_divisor {
                continue;
            }
            for href in hrefs {
                if selected.len() >= limit {
                    break;
                }
                let Some(normalized) = normalize_url(href, None) else {
                    continue;
                };
                if tier.accepts(href, &normalized) && seen.insert(normalized.clone()) {
                    selected.push(normalized);
                }
            }
        }
        selected
    }
}

/// Absolute http(s) URL without query string or fragment.
pub fn normalize_url(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    let mut url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url.into())
}

/// Absolute targets of every anchor on the page, in document order.
///
/// Query strings are kept so rules can match on them.
pub async fn anchor_hrefs(page: &dyn Page) -> Result<Vec<String>, PageError> {
    if let Ok(Value::Array(items)) = page.evaluate(ANCHOR_HREFS_SCRIPT).await {
        return Ok(items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect());
    }

    let base = Url::parse(&page.current_url().await?).ok();
    let anchors = page.query_all(&Locator::css("a[href]")).await?;
    let mut hrefs = Vec::with_capacity(anchors.len());
    for anchor in &anchors {
        match page.attribute(anchor, "href").await {
            Ok(Some(href)) => {
                let absolute = match &base {
                    Some(base) => base.join(href.trim()).map(String::from).ok(),
                    None => Url::parse(href.trim()).map(String::from).ok(),
                };
                hrefs.extend(absolute);
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Skipping anchor"),
        }
    }
    Ok(hrefs)
}
