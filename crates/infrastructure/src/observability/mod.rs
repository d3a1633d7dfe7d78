//! Observability module
//!
//! Metrics collection for the dispatcher and the job registry.

pub mod metrics_collector;

pub use metrics_collector::MetricsCollector;
