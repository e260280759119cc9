//! Versioned site profiles
//!
//! A profile is the complete, declarative description of how one platform is
//! read: link rules, per-field strategy chains, the "next" controls and the
//! variant probes. Built-in profiles ship with the binary; JSON files listed
//! in `scrape.profile_files` replace them wholesale at startup.

mod builtin;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::links::{LinkSelector, LinkTier};
use super::resolver::Strategy;
use crate::domain::PlatformKey;
use crate::infrastructure::config::ConfigError;

/// Bumped whenever the profile layout changes incompatibly
pub const PROFILE_SCHEMA_VERSION: u32 = 1;

/// Strategy chains for each product field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldStrategies {
    pub product_url: Vec<Strategy>,
    pub title: Vec<Strategy>,
    pub price: Vec<Strategy>,
    pub seller: Vec<Strategy>,
    pub manufacturer: Vec<Strategy>,
    pub image: Vec<Strategy>,
}

/// Attribute test marking an option as unavailable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMatch {
    pub attribute: String,
    pub contains: String,
}

/// Describes one variant dimension as a set of clickable option elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionProbe {
    pub dimension: String,
    /// CSS selector matching every option control of the dimension
    pub option_selector: String,
    /// Attribute carrying the option code (e.g. `data-value`)
    #[serde(default)]
    pub identifier_attribute: Option<String>,
    #[serde(default)]
    pub unavailable: Option<AttributeMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub schema_version: u32,
    pub platform: PlatformKey,
    #[serde(default)]
    pub links: Vec<LinkTier>,
    /// Waited for (bounded) before fields are read
    #[serde(default)]
    pub ready_selector: Option<String>,
    /// Controls clicked once to reveal detail panels before fields are read
    #[serde(default)]
    pub reveal_controls: Vec<String>,
    #[serde(default)]
    pub fields: FieldStrategies,
    #[serde(default)]
    pub manufacturer_falls_back_to_seller: bool,
    /// Seller reported when the page names none
    #[serde(default)]
    pub default_seller: Option<String>,
    /// "Next page" controls, tried in order
    #[serde(default)]
    pub next_controls: Vec<String>,
    #[serde(default)]
    pub variant_probes: Vec<DimensionProbe>,
}

impl SiteProfile {
    pub fn builtin(platform: PlatformKey) -> Self {
        builtin::profile(platform)
    }

    /// Structural checks run on every loaded profile
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != PROFILE_SCHEMA_VERSION {
            return Err(format!(
                "schema_version {} is not supported (expected {PROFILE_SCHEMA_VERSION})",
                self.schema_version
            ));
        }
        LinkSelector::compile(&self.links).map_err(|e| format!("invalid link id pattern: {e}"))?;
        if let Some(probe) = self.variant_probes.iter().find(|probe| probe.dimension.trim().is_empty()) {
            return Err(format!("variant probe `{}` has no dimension name", probe.option_selector));
        }
        Ok(())
    }

    /// Read a JSON profile file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let profile_error = |reason: String| ConfigError::Profile {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| profile_error(e.to_string()))?;
        let profile: Self = serde_json::from_str(&raw).map_err(|e| profile_error(e.to_string()))?;
        profile.validate().map_err(profile_error)?;
        Ok(profile)
    }
}

/// Built-in profiles with file overrides applied, keyed by platform.
pub fn load_profiles<P: AsRef<Path>>(override_files: &[P]) -> Result<HashMap<PlatformKey, SiteProfile>, ConfigError> {
    let mut profiles: HashMap<_, _> = PlatformKey::ALL
        .iter()
        .map(|key| (*key, SiteProfile::builtin(*key)))
        .collect();

    for path in override_files {
        let profile = SiteProfile::load(path.as_ref())?;
        info!(
            platform = %profile.platform,
            path = %path.as_ref().display(),
            "Site profile replaced from file"
        );
        profiles.insert(profile.platform, profile);
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_every_builtin_profile_is_valid() {
        for key in PlatformKey::ALL {
            let profile = SiteProfile::builtin(key);
            assert_eq!(profile.platform, key);
            profile.validate().unwrap_or_else(|e| panic!("{key}: {e}"));
            assert!(!profile.links.is_empty(), "{key} has no link rules");
            assert!(!profile.fields.title.is_empty(), "{key} has no title strategies");
            assert!(!profile.fields.price.is_empty(), "{key} has no price strategies");
        }
    }

    #[test]
    fn test_variant_probes_only_on_variant_platforms() {
        for key in PlatformKey::ALL {
            let profile = SiteProfile::builtin(key);
            if !key.descriptor().variant_support {
                assert!(profile.variant_probes.is_empty(), "{key} probes variants");
            }
        }
    }

    #[test]
    fn test_paged_platforms_have_next_controls() {
        for key in PlatformKey::ALL {
            if key.descriptor().pagination_mode == crate::domain::PaginationMode::Paged {
                assert!(
                    !SiteProfile::builtin(key).next_controls.is_empty(),
                    "{key} has no next controls"
                );
            }
        }
    }

    #[test]
    fn test_profile_survives_json_round_trip() {
        let profile = SiteProfile::builtin(PlatformKey::Flipkart);
        let json = serde_json::to_string_pretty(&profile).unwrap();
        let parsed: SiteProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_file_override_replaces_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "schema_version": 1,
                "platform": "snapdeal",
                "links": [{{"rule": {{"patterns": ["/item/"]}}}}],
                "fields": {{"title": [{{"kind": "css", "selector": "h1.name"}}]}}
            }}"#
        )
        .unwrap();

        let profiles = load_profiles(&[file.path()]).unwrap();
        let snapdeal = &profiles[&PlatformKey::Snapdeal];
        assert_eq!(snapdeal.links[0].rule.patterns, ["/item/"]);
        assert_eq!(snapdeal.fields.title, [Strategy::css("h1.name")]);
        assert!(snapdeal.fields.price.is_empty());
        assert_eq!(profiles.len(), PlatformKey::ALL.len());
    }

    #[test]
    fn test_unknown_schema_version_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"schema_version": 7, "platform": "generic"}}"#).unwrap();
        let err = SiteProfile::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Profile { .. }));
        assert!(err.to_string().contains("schema_version 7"));
    }
}
