//! End-to-end sessions against scripted sites: listing traversal, product
//! classification, variant harvesting and the CSV files they leave behind.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use commerce_harvest::crawling::{
    SessionError, SessionMode, SessionOrchestrator, SessionSettings, SharedState, Termination,
};
use commerce_harvest::domain::{Session, Whitelist, WhitelistStatus};
use commerce_harvest::extraction::PlatformRegistry;
use commerce_harvest::infrastructure::TimingConfig;
use commerce_harvest::infrastructure::csv_sink::{
    RecordSink, RowDestination, SinkError, create_file, read_products, read_variants,
};
use commerce_harvest::testing::{ScriptedBrowser, ScriptedSite, Transition};

const LISTING: &str = "https://shop.example/list";
const LISTING_2: &str = "https://shop.example/list/2";

const LISTING_PAGE: &str = r#"<html><body>
    <a href="/product/alpha">Alpha</a>
    <a href="/product/beta?ref=list">Beta</a>
    <a href="/about">About us</a>
    <a rel="next" href="/list/2">Next</a>
</body></html>"#;

const LISTING_PAGE_2: &str = r#"<html><body>
    <a href="/product/alpha">Alpha again</a>
    <a href="/product/gamma">Gamma</a>
    <a rel="next" aria-disabled="true" href="/list/2">Next</a>
</body></html>"#;

const ALPHA: &str = r#"<html><body>
    <h1>Alpha Kettle</h1><span class="price">₹499</span><span class="brand-name">Acme Corp</span>
</body></html>"#;

const BETA: &str = r#"<html><body>
    <h1>Beta Toaster</h1><span class="price">₹899</span><span class="brand-name">Other Co</span>
</body></html>"#;

const GAMMA: &str = "<html><body><p>Coming soon</p></body></html>";

fn catalog_site() -> ScriptedSite {
    ScriptedSite::new()
        .page(LISTING, LISTING_PAGE)
        .page(LISTING_2, LISTING_PAGE_2)
        .page("https://shop.example/product/alpha", ALPHA)
        .page("https://shop.example/product/beta", BETA)
        .page("https://shop.example/product/gamma", GAMMA)
}

/// A file on a device that fills up after `flushes_left` flushes
struct FillingFile {
    file: File,
    flushes_left: usize,
}

impl Write for FillingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.flushes_left == 0 {
            return Err(io::Error::other("No space left on device"));
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.flushes_left == 0 {
            return Err(io::Error::other("No space left on device"));
        }
        self.flushes_left -= 1;
        self.file.flush()
    }
}

impl RowDestination for FillingFile {
    fn sync(&self) -> io::Result<()> {
        self.file.sync_data()
    }
}

fn settings(root: &Path, max_pages: u32, workers: usize) -> SessionSettings {
    SessionSettings {
        max_pages,
        links_per_page: 50,
        workers,
        timing: TimingConfig::immediate(),
        output_root: root.to_path_buf(),
    }
}

fn orchestrator(browser: &Arc<ScriptedBrowser>, whitelist: Whitelist, settings: SessionSettings) -> SessionOrchestrator {
    SessionOrchestrator::new(
        browser.clone(),
        Arc::new(PlatformRegistry::builtin(TimingConfig::immediate()).unwrap()),
        whitelist,
        settings,
    )
}

#[tokio::test]
async fn test_listing_session_persists_and_classifies_products() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(ScriptedBrowser::new(catalog_site()));
    let report = orchestrator(&browser, Whitelist::new(["acme"]), settings(dir.path(), 0, 2))
        .run(LISTING)
        .await
        .unwrap();

    assert_eq!(report.mode, SessionMode::Listing);
    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.stats.pages_visited, 2);
    assert_eq!(report.stats.links_discovered, 3);
    assert_eq!(report.stats.products_persisted, 2);
    assert_eq!(report.stats.products_discarded, 1);
    assert_eq!(report.stats.product_failures, 0);

    let mut products = read_products(&report.products_path).unwrap();
    products.sort_by(|a, b| a.title.cmp(&b.title));
    assert_eq!(products.len(), 2);

    assert_eq!(products[0].title, "Alpha Kettle");
    assert_eq!(products[0].price, "₹499");
    assert_eq!(products[0].seller_name, "Acme Corp");
    assert_eq!(products[0].manufacturer_name, "Acme Corp");
    assert_eq!(products[0].is_whitelisted, WhitelistStatus::Whitelisted);

    assert_eq!(products[1].title, "Beta Toaster");
    assert_eq!(products[1].product_url, "https://shop.example/product/beta");
    assert_eq!(products[1].is_whitelisted, WhitelistStatus::NotWhitelisted);

    // alpha is linked from both pages but only opened once
    let alpha_visits = browser
        .navigations()
        .iter()
        .filter(|url| url.as_str() == "https://shop.example/product/alpha")
        .count();
    assert_eq!(alpha_visits, 1);
    assert!(read_variants(&report.variants_path).unwrap().is_empty());
}

#[tokio::test]
async fn test_page_cap_of_one_never_advances() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(ScriptedBrowser::new(catalog_site()));
    let report = orchestrator(&browser, Whitelist::default(), settings(dir.path(), 1, 1))
        .run(LISTING)
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::PageCap);
    assert_eq!(report.stats.pages_visited, 1);
    assert_eq!(report.stats.products_persisted, 2);
    assert!(browser.clicks().is_empty());
    assert!(
        !browser
            .navigations()
            .contains(&"https://shop.example/product/gamma".to_string())
    );
}

#[tokio::test]
async fn test_empty_listing_leaves_header_only_files() {
    let dir = tempfile::tempdir().unwrap();
    let site = ScriptedSite::new().page(LISTING, "<html><body><a href='/about'>About</a></body></html>");
    let browser = Arc::new(ScriptedBrowser::new(site));
    let report = orchestrator(&browser, Whitelist::default(), settings(dir.path(), 0, 1))
        .run(LISTING)
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::NoProducts);
    assert_eq!(report.stats.pages_visited, 0);
    assert!(read_products(&report.products_path).unwrap().is_empty());

    let header = std::fs::read_to_string(&report.products_path).unwrap();
    assert!(header.starts_with("product_url,title,price"));
}

#[tokio::test]
async fn test_unreachable_product_is_skipped_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let site = catalog_site().unreachable("https://shop.example/product/beta");
    let browser = Arc::new(ScriptedBrowser::new(site));
    let report = orchestrator(&browser, Whitelist::default(), settings(dir.path(), 1, 1))
        .run(LISTING)
        .await
        .unwrap();

    assert_eq!(report.stats.product_failures, 1);
    assert_eq!(report.stats.products_persisted, 1);
    let products = read_products(&report.products_path).unwrap();
    assert_eq!(products[0].title, "Alpha Kettle");
}

#[tokio::test]
async fn test_canonical_duplicates_are_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let listing = r#"<a href="/product/red-mug">Red</a><a href="/product/mug-red">Also red</a>"#;
    let mug = r#"<html><head><link rel="canonical" href="https://shop.example/product/mug"></head>
        <body><h1>Mug</h1><span class="price">₹250</span></body></html>"#;
    let site = ScriptedSite::new()
        .page(LISTING, listing)
        .page("https://shop.example/product/red-mug", mug)
        .page("https://shop.example/product/mug-red", mug);
    let browser = Arc::new(ScriptedBrowser::new(site));
    let report = orchestrator(&browser, Whitelist::default(), settings(dir.path(), 1, 1))
        .run(LISTING)
        .await
        .unwrap();

    assert_eq!(report.stats.products_persisted, 1);
    assert_eq!(report.stats.products_duplicate, 1);
    assert_eq!(read_products(&report.products_path).unwrap().len(), 1);
}

#[tokio::test]
async fn test_single_amazon_product_with_variants() {
    const URL: &str = "https://www.amazon.in/Mug/dp/B0MUG00001";
    const MUG: &str = r#"
        <span id="productTitle">Ceramic Mug</span>
        <span class="a-price-whole">1,299.</span>
        <div id="bylineInfo">Brand: Clayworks</div>
        <div id="inline-twister-row-color_name">
            <ul>
                <li data-asin="B0MUG00001"><span class="swatch-title-text-display">White</span></li>
                <li data-asin="B0MUG00002"><span class="swatch-title-text-display">Black</span></li>
            </ul>
        </div>
    "#;

    let dir = tempfile::tempdir().unwrap();
    let site = ScriptedSite::new().page(URL, MUG).on_click(
        "li[data-asin=\"B0MUG00002\"]",
        Transition::replace("https://www.amazon.in/Mug/dp/B0MUG00002", MUG.replace("1,299.", "1,349.")),
    );
    let browser = Arc::new(ScriptedBrowser::new(site));
    let report = orchestrator(&browser, Whitelist::new(["clayworks"]), settings(dir.path(), 0, 1))
        .run(URL)
        .await
        .unwrap();

    assert_eq!(report.mode, SessionMode::SingleProduct);
    assert_eq!(report.termination, Termination::SingleProduct);
    assert_eq!(report.stats.products_persisted, 1);
    assert_eq!(report.stats.variants_persisted, 2);

    let variants = read_variants(&report.variants_path).unwrap();
    assert_eq!(variants.len(), 2);
    assert!(variants.iter().all(|v| v.main_product_url == URL));
    assert!(variants.iter().all(|v| v.variant_type == "color"));
    assert!(variants.iter().all(|v| v.is_whitelisted == WhitelistStatus::Whitelisted));
    assert_eq!(variants[1].variant_option, "Black");
    assert_eq!(variants[1].variant_price, "₹1,349");
    assert_eq!(variants[1].variant_product_url, "https://www.amazon.in/Mug/dp/B0MUG00002");
}

#[tokio::test]
async fn test_shutdown_before_start_processes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(ScriptedBrowser::new(catalog_site()));
    let state = Arc::new(SharedState::default());
    state.request_shutdown();

    let report = orchestrator(&browser, Whitelist::default(), settings(dir.path(), 0, 1))
        .with_state(state)
        .run(LISTING)
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::Cancelled);
    assert_eq!(report.stats.products_persisted, 0);
    assert_eq!(browser.navigations(), [LISTING]);
}

#[tokio::test]
async fn test_write_failure_mid_session_aborts_and_keeps_earlier_rows() {
    let dir = tempfile::tempdir().unwrap();
    let browser = Arc::new(ScriptedBrowser::new(catalog_site()));
    let products_file: Arc<Mutex<Option<PathBuf>>> = Arc::default();

    let opened = Arc::clone(&products_file);
    let result = orchestrator(&browser, Whitelist::default(), settings(dir.path(), 0, 1))
        .with_sink_opener(Arc::new(move |session: &Session| -> Result<RecordSink, SinkError> {
            *opened.lock().unwrap() = Some(session.products_path.clone());
            // Room for the header and one product row
            let products = FillingFile {
                file: create_file(&session.products_path)?,
                flushes_left: 2,
            };
            let variants = create_file(&session.variants_path)?;
            RecordSink::with_destinations(
                &session.products_path,
                Box::new(products),
                &session.variants_path,
                Box::new(variants),
            )
        }))
        .run(LISTING)
        .await;

    assert!(matches!(result, Err(SessionError::Sink(_))));

    // beta's row failed, so nothing after it is visited
    let navigations = browser.navigations();
    assert!(navigations.contains(&"https://shop.example/product/beta".to_string()));
    assert!(!navigations.contains(&LISTING_2.to_string()));
    assert!(!navigations.contains(&"https://shop.example/product/gamma".to_string()));

    let path = products_file.lock().unwrap().clone().unwrap();
    let products = read_products(&path).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].title, "Alpha Kettle");
}
