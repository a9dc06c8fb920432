//! Scrape machinery: collectors and their registry, the shared snapshot,
//! the executor running one scrape, and the text encoder.

pub mod collectors;
pub mod encoder;
pub mod executor;
pub mod ledger;
pub mod metric;
pub mod readiness;
pub mod snapshot;
