//! One synchronous pass: raw records → canonical table → views →
//! metrics → episodes → ranked insights. Stateless between runs; the
//! only shared input is the immutable configuration.

use crate::aggregator::Aggregator;
use crate::analyzer::metrics::MetricsSnapshot;
use crate::analyzer::{EventDetector, InsightEngine, MetricsEngine};
use crate::config::AppConfig;
use crate::model::{
    CanonicalTable, ConfigurationError, Insight, PipelineError, PriceObservation, RawRecord, Rejection,
    VolatilityPeriod,
};
use crate::normalizer::normalize;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Everything a run produces, as plain data for serialization or direct
/// consumption by a charting layer.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub observations: Vec<PriceObservation>,
    pub rejections: Vec<Rejection>,
    pub metrics: MetricsSnapshot,
    pub episodes: Vec<VolatilityPeriod>,
    pub insights: Vec<Insight>,
}

pub struct Pipeline {
    cfg: AppConfig,
}

impl Pipeline {
    /// Validates configuration before any record is processed.
    pub fn new(cfg: AppConfig) -> Result<Self, ConfigurationError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Runs the full pipeline over raw records from the ingestion layer.
    pub fn run(&self, records: &[RawRecord]) -> Result<RunReport, PipelineError> {
        let batch = normalize(records, &self.cfg.analysis)?;
        info!(
            observations = batch.table.len(),
            rejected = batch.rejections.len(),
            overwritten = batch.duplicates_overwritten,
            "normalization complete"
        );
        if !batch.rejections.is_empty() {
            warn!(count = batch.rejections.len(), "records rejected during normalization");
        }
        Ok(self.analyze(batch.table, batch.rejections))
    }

    /// Analysis half of the pipeline, reusable for a table loaded from
    /// the persisted flat file.
    pub fn analyze(&self, table: CanonicalTable, rejections: Vec<Rejection>) -> RunReport {
        let analysis = &self.cfg.analysis;
        let agg = Aggregator::new(&table);

        let national = agg.series(&analysis.baseline_product, &analysis.national_region);
        let episodes = EventDetector::from_config(analysis).detect(&national);
        info!(episodes = episodes.len(), "episode detection complete");

        let snapshot = MetricsEngine::new(&agg, analysis).snapshot();
        let insights =
            InsightEngine::with_default_rules(analysis.clone()).evaluate(&snapshot, &episodes);
        info!(insights = insights.len(), "insight evaluation complete");

        RunReport {
            generated_at: Utc::now(),
            observations: table.observations().cloned().collect(),
            rejections,
            metrics: snapshot,
            episodes,
            insights,
        }
    }
}
