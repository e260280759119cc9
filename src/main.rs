use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use dialoguer::Input;
use tracing::{info, warn};

use commerce_harvest::crawling::{SessionMode, SessionOrchestrator, SessionReport, SessionSettings};
use commerce_harvest::domain::PaginationMode;
use commerce_harvest::extraction::{PlatformRegistry, load_profiles};
use commerce_harvest::infrastructure::config::defaults;
use commerce_harvest::infrastructure::logging::log_system_info;
use commerce_harvest::infrastructure::page::Browser;
use commerce_harvest::infrastructure::{
    AppConfig, BackendKind, ConfigLoader, HttpBrowser, ProviderSelection, init_logging_with_config,
};

/// Extract products and variants from e-commerce listing or product pages
#[derive(Debug, Parser)]
#[command(name = "commerce-harvest", version, about)]
struct Cli {
    /// Listing or product page to start from (prompted when omitted)
    #[arg(long)]
    url: Option<String>,

    /// Pages or scrolls to process; 0 = all (prompted when omitted)
    #[arg(long)]
    max_pages: Option<u32>,

    /// Configuration file (TOML or JSON)
    #[arg(long, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Parallel product pages
    #[arg(long)]
    workers: Option<usize>,

    /// Directory receiving one folder per session
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Run Chromium headless (chromium backend only)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    headless: Option<bool>,

    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(workers) = self.workers {
            config.scrape.workers = workers;
        }
        if let Some(dir) = &self.output_dir {
            config.output.root_dir.clone_from(dir);
        }
        if let Some(headless) = self.headless {
            config.scrape.headless = headless;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load().context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid command line options")?;

    init_logging_with_config(&config.logging).context("Failed to initialize logging")?;
    log_system_info();
    match loader.source_file() {
        Some(path) => info!("📁 Configuration loaded from {}", path.display()),
        None => info!("📁 No configuration file; using defaults and environment"),
    }

    let provider = ProviderSelection::detect().context("Agent provider configuration")?;
    info!(provider = provider.provider.display_name(), model = %provider.model, "Agent provider selected");

    let url = match cli.url.clone() {
        Some(url) => url,
        None => Input::<String>::new()
            .with_prompt("Enter the product or listing URL")
            .interact_text()?,
    };

    let profiles = load_profiles(&config.scrape.profile_files)?;
    let registry = Arc::new(PlatformRegistry::new(profiles, config.timing)?);
    let browser = open_browser(&config).await?;
    let orchestrator = SessionOrchestrator::new(
        browser,
        registry,
        config.whitelist(),
        SessionSettings::from_config(&config, 0),
    );

    let plan = orchestrator.plan(&url)?;
    let max_pages = match plan.mode {
        SessionMode::SingleProduct => 1,
        SessionMode::Listing => match plan.platform.descriptor().pagination_mode {
            PaginationMode::SinglePage => 1,
            mode => match cli.max_pages.or(config.scrape.max_pages) {
                Some(cap) => cap,
                None => prompt_cap(mode)?,
            },
        },
    };
    let cap = if max_pages == 0 { "all".to_string() } else { max_pages.to_string() };
    info!(platform = plan.platform.display_name(), max_pages = %cap, "Starting session");

    let orchestrator = orchestrator.with_max_pages(max_pages);
    let state = orchestrator.state();
    let run = orchestrator.run(&url);
    tokio::pin!(run);

    let report = tokio::select! {
        report = &mut run => report,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; finishing products already in progress");
            state.request_shutdown();
            run.await
        }
    };

    let report = report.context("Session aborted")?;
    print_summary(&report);
    Ok(())
}

async fn open_browser(config: &AppConfig) -> Result<Arc<dyn Browser>> {
    match config.scrape.backend {
        BackendKind::Http => Ok(Arc::new(HttpBrowser::from_config(&config.scrape)?)),
        #[cfg(feature = "chromium")]
        BackendKind::Chromium => {
            let timeout = std::time::Duration::from_secs(config.scrape.request_timeout_seconds);
            let browser = commerce_harvest::infrastructure::ChromiumBrowser::launch(config.scrape.headless, timeout)
                .await
                .context("Failed to launch Chromium")?;
            Ok(Arc::new(browser))
        }
        #[cfg(not(feature = "chromium"))]
        BackendKind::Chromium => bail!("the chromium backend needs a build with `--features chromium`"),
    }
}

fn prompt_cap(mode: PaginationMode) -> Result<u32> {
    let unit = if mode == PaginationMode::InfiniteScroll { "scrolls" } else { "pages" };
    let raw: String = Input::new()
        .with_prompt(format!(
            "How many {unit} to scrape? (0 = all, Enter = {})",
            defaults::INTERACTIVE_MAX_PAGES
        ))
        .allow_empty(true)
        .validate_with(|input: &String| parse_cap(input).map(|_| ()))
        .interact_text()?;
    match parse_cap(&raw) {
        Ok(cap) => Ok(cap),
        Err(reason) => bail!(reason),
    }
}

/// Empty input takes the default cap; negative numbers are rejected.
fn parse_cap(input: &str) -> Result<u32, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(defaults::INTERACTIVE_MAX_PAGES);
    }
    match input.parse::<i64>() {
        Ok(n) if n < 0 => Err("Please enter a positive number or 0 for all".to_string()),
        Ok(n) => u32::try_from(n).map_err(|_| format!("{n} is too large")),
        Err(_) => Err("Please enter a valid number".to_string()),
    }
}

fn print_summary(report: &SessionReport) {
    println!();
    println!("📊 Harvest complete ({:?})", report.termination);
    println!("✅ Products: {}", report.stats.products_persisted);
    println!("✅ Variants: {}", report.stats.variants_persisted);
    if report.stats.product_failures > 0 {
        println!("⚠️  Skipped products: {}", report.stats.product_failures);
    }
    println!("📁 {}", report.products_path.display());
    println!("📁 {}", report.variants_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cap() {
        assert_eq!(parse_cap(""), Ok(defaults::INTERACTIVE_MAX_PAGES));
        assert_eq!(parse_cap(" 0 "), Ok(0));
        assert_eq!(parse_cap("7"), Ok(7));
        assert!(parse_cap("-1").is_err());
        assert!(parse_cap("many").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "commerce-harvest",
            "--workers",
            "4",
            "--output-dir",
            "out",
            "--headless",
            "--log-level",
            "debug",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.scrape.workers, 4);
        assert_eq!(config.output.root_dir, PathBuf::from("out"));
        assert!(config.scrape.headless);
        assert_eq!(config.logging.level, "debug");
    }
}
