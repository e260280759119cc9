//! Domain module - records, platform descriptors and classification rules
//!
//! Everything here is plain data plus pure functions. Nothing in this layer
//! touches a page, a file or the network.
//!
//! - `product`: extracted product and variant records
//! - `platform`: platform keys, pagination modes and static descriptors
//! - `session`: session naming and output layout
//! - `whitelist`: seller/manufacturer allow-list classification

pub mod platform;
pub mod product;
pub mod session;
pub mod whitelist;

pub use platform::{PaginationMode, PlatformDescriptor, PlatformKey};
pub use product::{ProductRecord, VariantDimension, VariantOption, VariantRecord};
pub use session::Session;
pub use whitelist::{Whitelist, WhitelistStatus};
