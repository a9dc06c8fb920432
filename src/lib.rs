//! blazebee-exporter: pull-based host metrics exporter
//!
//! Every HTTP scrape runs the enabled collectors concurrently against one
//! snapshot of `/proc`, bounded by the scraper's timeout, and answers with the
//! Prometheus text exposition. Collectors that fail, panic or overrun the
//! deadline are isolated; their status is reported through per-collector
//! meta-metrics instead of failing the response.
//!
//! ## Modules
//!
//! * `config`: TOML configuration with `validator` checks and defaults.
//!
//! * `core`: Scrape machinery:
//!   - Collector contract, built-in collectors and the `Registry`
//!   - Snapshot acquisition shared by all collectors of a scrape
//!   - The `Executor` and its per-scrape outcome ledger
//!   - Prometheus text encoding
//!   - Readiness state
//!
//! * `http`: `axum` endpoints: metrics, health and a landing page.
//!
//! * `logger`: `tracing` subscriber setup with console and journald outputs.
//!
//! ## Features
//!
//! * `minimal`: cpu, memory and loadavg collectors.
//! * `standard`: `minimal` plus filefd, uptime, pressure and entropy (default).
//! * `collector-<name>`: a single collector.

pub mod config;
pub mod core;
pub mod http;
pub mod logger;
