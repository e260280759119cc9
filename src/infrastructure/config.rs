//! Configuration infrastructure
//!
//! Configuration is layered, later layers winning:
//! 1. Built-in defaults (`defaults` module, applied through `#[serde(default)]`)
//! 2. Optional config file (explicit path, else `<config_dir>/commerce-harvest/config.toml`)
//! 3. Environment variables with the `HARVEST__` prefix (`HARVEST__SCRAPE__WORKERS=4`)
//! 4. The legacy `WHITELISTED_SELLERS` comma-separated allow-list
//!
//! Agent provider credentials are detected separately by [`ProviderSelection`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use ::config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Whitelist;

pub mod defaults {
    /// Product links collected per listing page
    pub const LINKS_PER_PAGE: usize = 50;

    /// Parallel product page contexts
    pub const WORKERS: usize = 1;

    /// Page cap offered when the user just presses enter
    pub const INTERACTIVE_MAX_PAGES: u32 = 100;

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

    pub const NAVIGATION_TIMEOUT_MS: u64 = 60_000;
    pub const PAGE_SETTLE_MS: u64 = 3_000;
    pub const LISTING_SETTLE_MS: u64 = 5_000;
    pub const VARIANT_SETTLE_MS: u64 = 3_000;
    pub const PRE_VARIANT_WAIT_MS: u64 = 2_000;
    pub const SCROLL_SETTLE_MS: u64 = 2_000;
    pub const PRODUCT_SCROLL_SETTLE_MS: u64 = 1_000;
    pub const NEXT_PAGE_SETTLE_MS: u64 = 5_000;
    pub const PACING_MS: u64 = 2_000;
    pub const ELEMENT_WAIT_MS: u64 = 10_000;

    pub const OUTPUT_DIR: &str = "results";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_MAX_FILES: u32 = 7;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(
        "no agent provider configured; set one of OPENAI_API_KEY, ANTHROPIC_API_KEY, GOOGLE_API_KEY or GROQ_API_KEY"
    )]
    NoProvider,

    #[error("{key_var} is set but {model_var} is missing")]
    MissingModel {
        key_var: &'static str,
        model_var: &'static str,
    },

    #[error("invalid site profile {path}: {reason}")]
    Profile { path: PathBuf, reason: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scrape: ScrapeConfig,
    pub timing: TimingConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Fill the allow-list from `WHITELISTED_SELLERS` unless one is already configured.
    pub fn apply_legacy_whitelist(&mut self, raw: Option<&str>) {
        let Some(raw) = raw else { return };
        if !self.scrape.whitelist.is_empty() {
            return;
        }
        self.scrape.whitelist = Whitelist::parse(raw).entries().to_vec();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scrape.workers == 0 {
            return Err(ConfigError::Invalid("scrape.workers must be at least 1".into()));
        }
        if self.scrape.links_per_page == 0 {
            return Err(ConfigError::Invalid("scrape.links_per_page must be at least 1".into()));
        }
        if self.timing.navigation_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timing.navigation_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn whitelist(&self) -> Whitelist {
        Whitelist::new(&self.scrape.whitelist)
    }
}

/// Which page backend drives the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Static HTML over HTTP
    #[default]
    Http,
    /// Full DOM automation (requires the `chromium` feature)
    Chromium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Page/scroll cap; 0 = unbounded, `None` = ask interactively
    pub max_pages: Option<u32>,

    /// Product links collected per listing page
    pub links_per_page: usize,

    /// Parallel product page contexts
    pub workers: usize,

    /// Trusted seller/manufacturer name fragments
    pub whitelist: Vec<String>,

    pub backend: BackendKind,

    /// Run the browser without a window (chromium backend only)
    pub headless: bool,

    pub user_agent: String,

    pub request_timeout_seconds: u64,

    /// Site profile files replacing built-in profiles at startup
    pub profile_files: Vec<PathBuf>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_pages: None,
            links_per_page: defaults::LINKS_PER_PAGE,
            workers: defaults::WORKERS,
            whitelist: Vec::new(),
            backend: BackendKind::default(),
            headless: true,
            user_agent: defaults::USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            profile_files: Vec::new(),
        }
    }
}

/// Settle delays and timeouts, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub navigation_timeout_ms: u64,
    /// Wait after loading a product page
    pub page_settle_ms: u64,
    /// Wait after loading the first listing page
    pub listing_settle_ms: u64,
    /// Wait after selecting a variant option
    pub variant_settle_ms: u64,
    /// Wait before looking for variant controls
    pub pre_variant_wait_ms: u64,
    /// Wait after each listing scroll
    pub scroll_settle_ms: u64,
    /// Wait after each product page scroll
    pub product_scroll_settle_ms: u64,
    /// Wait after clicking a "next page" control
    pub next_page_settle_ms: u64,
    /// Delay between consecutive products
    pub pacing_ms: u64,
    /// Upper bound for waiting on a ready selector
    pub element_wait_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: defaults::NAVIGATION_TIMEOUT_MS,
            page_settle_ms: defaults::PAGE_SETTLE_MS,
            listing_settle_ms: defaults::LISTING_SETTLE_MS,
            variant_settle_ms: defaults::VARIANT_SETTLE_MS,
            pre_variant_wait_ms: defaults::PRE_VARIANT_WAIT_MS,
            scroll_settle_ms: defaults::SCROLL_SETTLE_MS,
            product_scroll_settle_ms: defaults::PRODUCT_SCROLL_SETTLE_MS,
            next_page_settle_ms: defaults::NEXT_PAGE_SETTLE_MS,
            pacing_ms: defaults::PACING_MS,
            element_wait_ms: defaults::ELEMENT_WAIT_MS,
        }
    }
}

impl TimingConfig {
    /// No settle delays at all; used against scripted pages.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            navigation_timeout_ms: 5_000,
            page_settle_ms: 0,
            listing_settle_ms: 0,
            variant_settle_ms: 0,
            pre_variant_wait_ms: 0,
            scroll_settle_ms: 0,
            product_scroll_settle_ms: 0,
            next_page_settle_ms: 0,
            pacing_ms: 0,
            element_wait_ms: 0,
        }
    }

    #[must_use]
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    #[must_use]
    pub const fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }

    #[must_use]
    pub const fn listing_settle(&self) -> Duration {
        Duration::from_millis(self.listing_settle_ms)
    }

    #[must_use]
    pub const fn variant_settle(&self) -> Duration {
        Duration::from_millis(self.variant_settle_ms)
    }

    #[must_use]
    pub const fn pre_variant_wait(&self) -> Duration {
        Duration::from_millis(self.pre_variant_wait_ms)
    }

    #[must_use]
    pub const fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    #[must_use]
    pub const fn product_scroll_settle(&self) -> Duration {
        Duration::from_millis(self.product_scroll_settle_ms)
    }

    #[must_use]
    pub const fn next_page_settle(&self) -> Duration {
        Duration::from_millis(self.next_page_settle_ms)
    }

    #[must_use]
    pub const fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    #[must_use]
    pub const fn element_wait(&self) -> Duration {
        Duration::from_millis(self.element_wait_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory that receives one sub-directory per session
    pub root_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(defaults::OUTPUT_DIR),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable daily rolling file output
    pub file_output: bool,

    /// Log directory; defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    /// Number of log files to keep (older files are deleted at startup)
    pub max_files: u32,

    /// Module-specific log level filters (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            max_files: defaults::LOG_MAX_FILES,
            module_filters: HashMap::new(),
        }
    }
}

/// Builds an [`AppConfig`] from file and environment layers
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    use_environment: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            file: None,
            use_environment: true,
        }
    }

    /// Use `path` instead of the per-user config file; the file must exist.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    #[must_use]
    pub const fn without_environment(mut self) -> Self {
        self.use_environment = false;
        self
    }

    /// `<config_dir>/commerce-harvest/config.toml`
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("commerce-harvest").join("config.toml"))
    }

    /// The file layer `load` reads, if any.
    ///
    /// Loading happens before logging is installed, so callers report this
    /// once their subscriber is up.
    #[must_use]
    pub fn source_file(&self) -> Option<PathBuf> {
        match &self.file {
            Some(path) => Some(path.clone()),
            None => Self::default_config_path().filter(|path| path.is_file()),
        }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();

        match &self.file {
            Some(path) => builder = builder.add_source(File::from(path.as_path()).required(true)),
            None => {
                if let Some(path) = Self::default_config_path() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }

        if self.use_environment {
            builder = builder.add_source(
                Environment::with_prefix("HARVEST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("scrape.whitelist")
                    .with_list_parse_key("scrape.profile_files"),
            );
        }

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        if self.use_environment {
            config.apply_legacy_whitelist(std::env::var("WHITELISTED_SELLERS").ok().as_deref());
        }
        config.validate()?;
        Ok(config)
    }
}

/// Agent façade providers, in detection order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    Groq,
}

impl Provider {
    pub const ALL: [Self; 4] = [Self::OpenAi, Self::Anthropic, Self::Google, Self::Groq];

    #[must_use]
    pub const fn key_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Google => "GOOGLE_API_KEY",
            Self::Groq => "GROQ_API_KEY",
        }
    }

    #[must_use]
    pub const fn model_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_MODEL",
            Self::Anthropic => "ANTHROPIC_MODEL",
            Self::Google => "GOOGLE_MODEL",
            Self::Groq => "GROQ_MODEL",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Google => "Google",
            Self::Groq => "Groq",
        }
    }
}

/// The first provider with an API key; its model variable is mandatory.
#[derive(Debug, Clone)]
pub struct ProviderSelection {
    pub provider: Provider,
    pub model: String,
    api_key: SecretString,
}

impl ProviderSelection {
    pub fn detect() -> Result<Self, ConfigError> {
        Self::detect_with(|name| std::env::var(name).ok())
    }

    pub fn detect_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        for provider in Provider::ALL {
            let Some(key) = present(provider.key_var()) else {
                continue;
            };
            let model = present(provider.model_var()).ok_or(ConfigError::MissingModel {
                key_var: provider.key_var(),
                model_var: provider.model_var(),
            })?;
            return Ok(Self {
                provider,
                model,
                api_key: SecretString::from(key),
            });
        }
        Err(ConfigError::NoProvider)
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.scrape.links_per_page, 50);
        assert_eq!(config.scrape.workers, 1);
        assert_eq!(config.scrape.max_pages, None);
        assert_eq!(config.timing.navigation_timeout(), Duration::from_secs(60));
        assert_eq!(config.timing.variant_settle(), Duration::from_secs(3));
        assert_eq!(config.output.root_dir, PathBuf::from("results"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_layer_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvest.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[scrape]\nmax_pages = 3\nworkers = 4\nwhitelist = [\"Acme\", \"Globex\"]\n\n[timing]\npacing_ms = 0\n"
        )
        .unwrap();

        let config = ConfigLoader::new().without_environment().with_file(&path).load().unwrap();

        assert_eq!(config.scrape.max_pages, Some(3));
        assert_eq!(config.scrape.workers, 4);
        assert_eq!(config.scrape.whitelist, ["Acme", "Globex"]);
        assert_eq!(config.timing.pacing_ms, 0);
        assert_eq!(config.timing.page_settle_ms, defaults::PAGE_SETTLE_MS);
    }

    #[test]
    fn test_source_file_reports_explicit_file() {
        let path = PathBuf::from("/etc/harvest/custom.toml");
        let loader = ConfigLoader::new().with_file(&path);
        assert_eq!(loader.source_file(), Some(path));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = AppConfig::default();
        config.scrape.workers = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_legacy_whitelist_only_fills_empty_list() {
        let mut config = AppConfig::default();
        config.apply_legacy_whitelist(Some(" Acme , ,Globex "));
        assert_eq!(config.scrape.whitelist, ["Acme", "Globex"]);

        config.apply_legacy_whitelist(Some("Initech"));
        assert_eq!(config.scrape.whitelist, ["Acme", "Globex"]);
    }

    #[test]
    fn test_provider_detection_order() {
        let env = [
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("ANTHROPIC_MODEL", "claude"),
            ("GROQ_API_KEY", "gsk"),
            ("GROQ_MODEL", "llama"),
        ];
        let selection = ProviderSelection::detect_with(lookup(&env)).unwrap();
        assert_eq!(selection.provider, Provider::Anthropic);
        assert_eq!(selection.model, "claude");
        assert_eq!(selection.api_key(), "sk-ant");
    }

    #[test]
    fn test_provider_key_without_model_is_fatal() {
        let env = [("OPENAI_API_KEY", "sk-1"), ("GROQ_API_KEY", "gsk"), ("GROQ_MODEL", "llama")];
        assert!(matches!(
            ProviderSelection::detect_with(lookup(&env)),
            Err(ConfigError::MissingModel { key_var: "OPENAI_API_KEY", .. })
        ));
    }

    #[test]
    fn test_no_provider_is_fatal() {
        assert!(matches!(
            ProviderSelection::detect_with(lookup(&[("OPENAI_API_KEY", "  ")])),
            Err(ConfigError::NoProvider)
        ));
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let env = [("GOOGLE_API_KEY", "very-secret"), ("GOOGLE_MODEL", "gemini")];
        let selection = ProviderSelection::detect_with(lookup(&env)).unwrap();
        assert!(!format!("{selection:?}").contains("very-secret"));
    }
}
