//! Seller/manufacturer allow-list classification

use std::fmt;

use serde::{Deserialize, Serialize};

/// Persisted classification value; serialized as `Whitelisted` or `False`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WhitelistStatus {
    Whitelisted,
    #[default]
    #[serde(rename = "False")]
    NotWhitelisted,
}

impl WhitelistStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Whitelisted => "Whitelisted",
            Self::NotWhitelisted => "False",
        }
    }

    #[must_use]
    pub const fn is_whitelisted(self) -> bool {
        matches!(self, Self::Whitelisted)
    }
}

impl fmt::Display for WhitelistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered allow-list of trusted name fragments.
///
/// Matching is case-insensitive and tolerant in both directions: a name
/// matches an entry when either one contains the other. Empty names never
/// match, otherwise every entry would contain them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    entries: Vec<String>,
    folded: Vec<String>,
}

impl Whitelist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: Vec<String> = entries
            .into_iter()
            .map(|entry| entry.as_ref().trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();
        let folded = entries.iter().map(|entry| entry.to_lowercase()).collect();

        Self { entries, folded }
    }

    /// Parse the comma-separated form used by `WHITELISTED_SELLERS`
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return false;
        }
        self.folded
            .iter()
            .any(|entry| name.contains(entry.as_str()) || entry.contains(name.as_str()))
    }

    /// Seller is checked before manufacturer; the first match wins.
    #[must_use]
    pub fn classify(&self, seller_name: &str, manufacturer_name: &str) -> WhitelistStatus {
        if self.matches(seller_name) || self.matches(manufacturer_name) {
            WhitelistStatus::Whitelisted
        } else {
            WhitelistStatus::NotWhitelisted
        }
    }
}
