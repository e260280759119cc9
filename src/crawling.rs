//! Crawling layer - session orchestration
//!
//! - `state`: cancellation and run statistics shared by all workers
//! - `pagination`: listing traversal per pagination mode
//! - `orchestrator`: the session driver tying platform detection,
//!   pagination, extraction, classification and persistence together

pub mod orchestrator;
pub mod pagination;
pub mod state;

pub use orchestrator::{SessionError, SessionMode, SessionOrchestrator, SessionPlan, SessionReport, SessionSettings, SinkOpener};
pub use pagination::{ListingVisitor, PaginationController, PaginationOutcome, Termination};
pub use state::{SessionStats, SharedState};
