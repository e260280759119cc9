//! Infrastructure layer: configuration, logging, page automation backends
//! and record persistence.

pub mod config;
pub mod csv_sink;
pub mod html_page;
pub mod logging;
pub mod page;

#[cfg(feature = "chromium")]
pub mod chromium;

pub use config::{AppConfig, BackendKind, ConfigError, ConfigLoader, ProviderSelection, TimingConfig};
pub use csv_sink::{AppendOutcome, RecordSink, SinkError};
pub use html_page::{HtmlPage, HttpBrowser};
pub use logging::{init_logging, init_logging_with_config};
pub use page::{Browser, ElementHandle, Locator, Page, PageError};

#[cfg(feature = "chromium")]
pub use chromium::ChromiumBrowser;
