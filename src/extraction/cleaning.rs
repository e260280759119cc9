//! Field cleaning rules
//!
//! Cleaning is attached to individual strategies rather than applied
//! globally: a price needs currency normalization, a manufacturer needs
//! label stripping, an image needs URL checks. [`Cleaner`] names each rule
//! so site profiles can carry them as data.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shop-name suffixes cut from document titles
pub const TITLE_SUFFIXES: [&str; 5] = [" | Buy Online", " - Buy Now", " | Shop", " - Price", " | Best Price"];

const SCRIPT_MARKERS: [&str; 3] = ["function", "window.", "document."];

const MANUFACTURER_LABELS: [&str; 2] = ["Brand:", "Manufacturer:"];

const MANUFACTURER_STOPS: [&str; 5] = ["Packer", "Seller", "Imported by", "Brand:", "Manufacturer:"];

const SELLER_SUFFIXES: [&str; 3] = ["seller", "store", "shop"];

/// Profile patterns compiled once per process
static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Compile `pattern`, reusing an earlier compilation of the same text.
pub fn cached_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = PATTERN_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern)?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Cleaner {
    /// Drop values that look like inline script
    RejectScriptLike,
    /// Keep the text before the earliest separator
    CutAt { separators: Vec<String> },
    /// Remove the first matching leading label
    StripPrefixes { prefixes: Vec<String> },
    /// Keep the first regex match (capture group 1 when present)
    Capture { pattern: String },
    /// Keep only values containing one of `needles`
    RequireAny { needles: Vec<String> },
    /// Drop values longer than `limit` characters
    MaxChars { limit: usize },
    /// Drop values containing any of `phrases` (case-insensitive)
    Reject { phrases: Vec<String> },
    TitleSuffix,
    ImageUrl,
    InrPrice,
    Manufacturer,
    SellerName,
}

impl Cleaner {
    pub fn cut_at(separators: &[&str]) -> Self {
        Self::CutAt {
            separators: separators.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn strip_prefixes(prefixes: &[&str]) -> Self {
        Self::StripPrefixes {
            prefixes: prefixes.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn capture(pattern: &str) -> Self {
        Self::Capture {
            pattern: pattern.to_string(),
        }
    }

    pub fn require_any(needles: &[&str]) -> Self {
        Self::RequireAny {
            needles: needles.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn reject(phrases: &[&str]) -> Self {
        Self::Reject {
            phrases: phrases.iter().map(ToString::to_string).collect(),
        }
    }

    /// Apply the rule; `None` means the value is unusable.
    pub fn apply(&self, value: String) -> Option<String> {
        let cleaned = match self {
            Self::RejectScriptLike => (!is_script_like(&value)).then_some(value),
            Self::CutAt { separators } => Some(cut_at(&value, separators).to_string()),
            Self::StripPrefixes { prefixes } => Some(strip_prefixes(&value, prefixes).to_string()),
            Self::Capture { pattern } => capture(&value, pattern),
            Self::RequireAny { needles } => needles
                .iter()
                .any(|needle| value.contains(needle.as_str()))
                .then_some(value),
            Self::MaxChars { limit } => (value.chars().count() <= *limit).then_some(value),
            Self::Reject { phrases } => {
                let folded = value.to_lowercase();
                (!phrases.iter().any(|phrase| folded.contains(&phrase.to_lowercase()))).then_some(value)
            }
            Self::TitleSuffix => Some(cut_title_suffix(&value).to_string()),
            Self::ImageUrl => normalize_image_url(&value),
            Self::InrPrice => Some(normalize_inr_price(&value)),
            Self::Manufacturer => Some(clean_manufacturer(&value)),
            Self::SellerName => Some(clean_seller_name(&value)),
        }?;
        let cleaned = cleaned.trim().to_string();
        (!cleaned.is_empty()).then_some(cleaned)
    }
}

/// Run `cleaners` in order; any rule rejecting the value rejects it.
pub fn apply_all(cleaners: &[Cleaner], value: String) -> Option<String> {
    cleaners.iter().try_fold(value, |value, cleaner| cleaner.apply(value))
}

/// Inline script leaking into text nodes
pub fn is_script_like(text: &str) -> bool {
    SCRIPT_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Text before the earliest occurrence of any separator.
pub fn cut_at<'a, S: AsRef<str>>(text: &'a str, separators: &[S]) -> &'a str {
    let end = separators
        .iter()
        .filter_map(|separator| text.find(separator.as_ref()))
        .min()
        .unwrap_or(text.len());
    text[..end].trim()
}

fn strip_prefixes<'a, S: AsRef<str>>(text: &'a str, prefixes: &[S]) -> &'a str {
    let text = text.trim_start();
    prefixes
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix.as_ref()))
        .unwrap_or(text)
        .trim_start()
}

fn capture(text: &str, pattern: &str) -> Option<String> {
    let regex = match cached_regex(pattern) {
        Ok(regex) => regex,
        Err(e) => {
            debug!(pattern, error = %e, "Ignoring invalid capture pattern");
            return None;
        }
    };
    let captures = regex.captures(text)?;
    captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|m| m.as_str().to_string())
}

/// Cut the first known shop suffix (in list order) from a document title.
pub fn cut_title_suffix(title: &str) -> &str {
    TITLE_SUFFIXES
        .iter()
        .find_map(|suffix| title.find(suffix).map(|at| title[..at].trim()))
        .unwrap_or(title)
}

/// Accept absolute or protocol-relative image URLs; upgrade the latter to https.
pub fn normalize_image_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    raw.starts_with("http").then(|| raw.to_string())
}

/// Keep digits and separators, then prefix `₹`.
pub fn normalize_inr_price(raw: &str) -> String {
    let amount: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ','))
        .collect();
    let amount = amount.trim_matches(['.', ',']);
    if amount.is_empty() {
        return String::new();
    }
    format!("₹{amount}")
}

/// Strip "Brand:"/"Manufacturer:" labels and anything after a follow-on label.
pub fn clean_manufacturer(raw: &str) -> String {
    let text = strip_prefixes(raw, &MANUFACTURER_LABELS);
    let text = text.trim().trim_matches(':').trim();
    cut_at(text, &MANUFACTURER_STOPS).to_string()
}

/// Drop ratings, feedback counts and trailing "Store"/"Shop" words from a seller name.
pub fn clean_seller_name(raw: &str) -> String {
    let mut end = raw.len();
    for separator in [" (", "(", " -"] {
        if let Some(at) = raw.find(separator) {
            end = end.min(at);
        }
    }
    if let Some(at) = percent_figure_start(raw) {
        end = end.min(at);
    }
    let mut name = raw[..end].trim();

    let folded = name.to_lowercase();
    for suffix in SELLER_SUFFIXES {
        if folded.ends_with(suffix) && folded.len() > suffix.len() {
            let cut = name.len() - suffix.len();
            if name.is_char_boundary(cut) {
                name = name[..cut].trim_end();
            }
            break;
        }
    }
    name.to_string()
}

/// Byte offset where a "98.5%"-style figure starts
fn percent_figure_start(text: &str) -> Option<usize> {
    let percent = text.find('%')?;
    let start = text[..percent]
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .last()
        .map(|(at, _)| at)?;
    Some(text[..start].trim_end().len())
}
