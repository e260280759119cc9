//! Platform adapters
//!
//! Every platform except Amazon is fully described by its [`SiteProfile`]
//! and served by [`CatalogAdapter`]. Amazon adds stock-state overrides and
//! twister/dropdown variant handling on top of its profile.
//!
//! [`SiteProfile`]: super::profiles::SiteProfile

mod amazon;
mod catalog;

pub use amazon::{AmazonAdapter, AmazonOptions};
pub use catalog::CatalogAdapter;
