//! State module for tracking crawl outcomes
//!
//! # Components
//!
//! - `Reference`: a URL plus the crawl metadata carried between pipeline steps and runs
//! - `ReferenceStatus`: the terminal outcome of the latest processing attempt
//! - `Partition`: the store partition a reference lives in
//!
//! Lifecycle (queued/active/processed) is not part of a reference. It is
//! tracked by the store partition the reference lives in.

mod partition;
mod reference;
mod status;

// Re-export main types
pub use partition::Partition;
pub use reference::Reference;
pub use status::ReferenceStatus;
