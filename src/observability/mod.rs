//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, request ID in span fields)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - The request ID is generated at the edge and travels upstream too
//! - Metrics are cheap facade calls; nothing is recorded when disabled

pub mod logging;
pub mod metrics;
