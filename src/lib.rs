//! Commerce Harvest - multi-platform e-commerce product and variant extraction
//!
//! Layers, leaves first:
//! - `domain`: records, platform descriptors, session naming, whitelist
//! - `infrastructure`: configuration, logging, page automation, CSV sink
//! - `extraction`: field resolution, link discovery, site profiles, adapters
//! - `crawling`: pagination and session orchestration
//! - `testing`: scripted pages for driving the engine without a browser

pub mod crawling;
pub mod domain;
pub mod extraction;
pub mod infrastructure;
pub mod testing;

pub use crawling::{SessionError, SessionOrchestrator, SessionReport, SessionSettings};
pub use domain::{ProductRecord, VariantRecord, Whitelist, WhitelistStatus};
pub use extraction::{PlatformAdapter, PlatformRegistry};
pub use infrastructure::{AppConfig, ConfigLoader};
