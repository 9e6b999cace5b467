// Analyzer module: aggregates submodules for different aspects of analysis.

pub mod episodes;
pub mod insights;
pub mod metrics;

pub use episodes::EventDetector;
pub use insights::InsightEngine;
pub use metrics::{MetricsEngine, MetricsSnapshot};
