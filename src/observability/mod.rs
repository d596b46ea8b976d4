//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Filter chain produces:
//!     → logging.rs (structured log events via tracing)
//!     → events.rs  (ChainEvent handed to the configured sink)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every log line of a request
//! - The chain only knows the sink trait; where events end up is pluggable

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{ChainEvent, MetricsSink, ObservabilitySink};
