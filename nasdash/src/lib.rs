//! nasdash - NAS metrics ingestion for the personal dashboard.
//!
//! Scrapes Prometheus-style exporters, turns their cumulative counters into
//! rates per host and publishes a `Board` of derived metrics for a renderer:
//! - `parser` - exposition text -> `Snapshot`
//! - `rates` - consecutive snapshots -> `DerivedMetrics`
//! - `poller` - per-target scrape/uptime timers and the published board

pub mod app;
pub mod config;
pub mod fetch;
pub mod format;
pub mod history;
pub mod logging;
pub mod parser;
pub mod poller;
pub mod rates;
pub mod types;
