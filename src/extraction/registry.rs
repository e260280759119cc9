//! Platform Registry
//!
//! Closed lookup table from [`PlatformKey`] to adapter. Built once at
//! startup from the loaded site profiles and read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use super::PlatformAdapter;
use super::adapters::{AmazonAdapter, CatalogAdapter};
use super::profiles::SiteProfile;
use crate::domain::PlatformKey;
use crate::infrastructure::config::{ConfigError, TimingConfig};

pub struct PlatformRegistry {
    adapters: HashMap<PlatformKey, Arc<dyn PlatformAdapter>>,
    generic: Arc<dyn PlatformAdapter>,
}

impl PlatformRegistry {
    /// One adapter per platform key; keys without a profile use their
    /// built-in one.
    pub fn new(mut profiles: HashMap<PlatformKey, SiteProfile>, timing: TimingConfig) -> Result<Self, ConfigError> {
        let mut adapters: HashMap<PlatformKey, Arc<dyn PlatformAdapter>> = HashMap::new();
        for key in PlatformKey::ALL {
            let profile = profiles.remove(&key).unwrap_or_else(|| SiteProfile::builtin(key));
            let adapter: Arc<dyn PlatformAdapter> = match key {
                PlatformKey::Amazon => Arc::new(AmazonAdapter::new(profile, timing)?),
                _ => Arc::new(CatalogAdapter::new(profile, timing)?),
            };
            adapters.insert(key, adapter);
        }
        let generic = match adapters.get(&PlatformKey::Generic) {
            Some(adapter) => Arc::clone(adapter),
            None => Arc::new(CatalogAdapter::new(SiteProfile::builtin(PlatformKey::Generic), timing)?),
        };
        debug!(platforms = adapters.len(), "Platform registry ready");
        Ok(Self { adapters, generic })
    }

    /// Registry over the built-in profiles only
    pub fn builtin(timing: TimingConfig) -> Result<Self, ConfigError> {
        Self::new(HashMap::new(), timing)
    }

    pub fn adapter(&self, key: PlatformKey) -> Arc<dyn PlatformAdapter> {
        self.adapters
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.generic))
    }

    /// Detect the platform of `url` and return it with its adapter.
    ///
    /// Unparseable URLs and unknown hosts fall back to the generic adapter.
    pub fn resolve(&self, url: &str) -> (PlatformKey, Arc<dyn PlatformAdapter>) {
        let host = Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
            .unwrap_or_default();
        let key = PlatformKey::detect(&host);
        info!(host = %host, platform = key.display_name(), "Platform detected");
        (key, self.adapter(key))
    }
}
