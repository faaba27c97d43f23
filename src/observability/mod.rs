//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID recorded on every request span
//! - Metrics go through the `metrics` facade; without an installed
//!   recorder they are no-ops, which keeps tests quiet

pub mod logging;
pub mod metrics;
