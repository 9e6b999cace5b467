// Core structs: PriceObservation, CanonicalTable, metric and episode types
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A raw record as handed over by the ingestion layer. Field names and
/// types are unverified; the normalizer is the only consumer.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// One cleaned annual price point. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub product_code: String,
    pub region_code: String,
    pub period: i32,
    pub price: f64,
    pub units: String,
}

/// The canonical table: one observation per (product, region, period).
/// Insertion is last-write-wins, iteration order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct CanonicalTable {
    entries: BTreeMap<(String, String, i32), PriceObservation>,
}

impl CanonicalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an observation, returning the previous one when the key
    /// was already present (duplicate resolved by overwrite).
    pub fn insert(&mut self, obs: PriceObservation) -> Option<PriceObservation> {
        let key = (obs.product_code.clone(), obs.region_code.clone(), obs.period);
        self.entries.insert(key, obs)
    }

    pub fn get(&self, product: &str, region: &str, period: i32) -> Option<&PriceObservation> {
        self.entries
            .get(&(product.to_string(), region.to_string(), period))
    }

    pub fn observations(&self) -> impl Iterator<Item = &PriceObservation> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered per-(product, region) series with explicit gaps: one slot per
/// period between the first and last observed period, `None` where no
/// observation exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSeries {
    pub product_code: String,
    pub region_code: String,
    pub start_period: i32,
    pub prices: Vec<Option<f64>>,
}

impl ProductSeries {
    pub fn get(&self, period: i32) -> Option<f64> {
        let idx = usize::try_from(period.checked_sub(self.start_period)?).ok()?;
        self.prices.get(idx).copied().flatten()
    }

    /// Observed (period, price) pairs, gaps skipped, periods ascending.
    pub fn observed(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.prices
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|v| (self.start_period + i as i32, v)))
    }

    pub fn observed_periods(&self) -> Vec<i32> {
        self.observed().map(|(p, _)| p).collect()
    }

    pub fn mean(&self) -> Option<f64> {
        let values: Vec<f64> = self.observed().map(|(_, v)| v).collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.prices.iter().all(Option::is_none)
    }
}

/// Region-to-price mapping for one product and one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSnapshot {
    pub product_code: String,
    pub period: i32,
    pub prices: BTreeMap<String, f64>,
}

/// Price difference of a product over the configured baseline product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PremiumRecord {
    pub product_code: String,
    pub baseline_product_code: String,
    pub period: i32,
    pub premium: f64,
    /// Premium relative to the baseline price. Undefined when the
    /// baseline price is zero.
    pub premium_pct: Option<f64>,
}

/// What opened a volatility episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "pct", rename_all = "snake_case")]
pub enum EpisodeTrigger {
    /// Single period-over-period change beyond the threshold.
    PeriodChange(f64),
    /// Cumulative decline from a local peak.
    Drawdown(f64),
    /// Cumulative climb from a local trough.
    RunUp(f64),
}

/// A contiguous period range flagged as above-threshold price movement.
/// Never mutated after the detector emits it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityPeriod {
    pub start_period: i32,
    pub end_period: i32,
    pub peak_price: f64,
    pub trough_price: f64,
    pub trigger: EpisodeTrigger,
    /// Peak-to-trough magnitude relative to the series' long-run mean.
    pub severity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    MarketStructure,
    Regional,
    Volatility,
    Premium,
}

impl InsightCategory {
    /// Tie-break rank; lower wins when magnitudes are equal.
    pub fn priority(self) -> u8 {
        match self {
            InsightCategory::MarketStructure => 0,
            InsightCategory::Regional => 1,
            InsightCategory::Volatility => 2,
            InsightCategory::Premium => 3,
        }
    }
}

/// A ranked textual finding produced once per pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub category: InsightCategory,
    pub statement: String,
    pub supporting_metrics: Vec<String>,
    pub magnitude: f64,
}

/// A computed metric, or an explicit marker that the inputs were not
/// sufficient to compute it. Never a substituted zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    Defined { value: f64 },
    Insufficient { reason: String },
}

impl MetricOutcome {
    pub fn defined(value: f64) -> Self {
        MetricOutcome::Defined { value }
    }

    pub fn insufficient(reason: impl Into<String>) -> Self {
        MetricOutcome::Insufficient {
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            MetricOutcome::Defined { value } => Some(*value),
            MetricOutcome::Insufficient { .. } => None,
        }
    }
}

/// Why a raw record was dropped during normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    MissingField { field: &'static str },
    BadType { field: &'static str },
    PeriodOutOfRange { period: i32 },
    NegativePrice { price: f64 },
    SentinelValue { price: f64 },
}

/// One dropped raw record, by position in the ingested sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub index: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed source: {0}")]
    MalformedSource(String),
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API request failed with status {0}")]
    Status(u16),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Human-readable PADD region name for a duoarea code.
pub fn region_name(code: &str) -> &str {
    match code {
        "NUS" => "United States",
        "R10" => "PADD 1 (East Coast)",
        "R1X" => "PADD 1A (New England)",
        "R1Y" => "PADD 1B (Central Atlantic)",
        "R20" => "PADD 2 (Midwest)",
        "R30" => "PADD 3 (Gulf Coast)",
        "R40" => "PADD 4 (Rocky Mountain)",
        "R50" => "PADD 5 (West Coast)",
        "R5XCA" => "PADD 5 (Except California)",
        "SCA" => "California",
        other => other,
    }
}

/// Human-readable product name for an EIA product code.
pub fn product_name(code: &str) -> &str {
    match code {
        "EPD2D" => "No 2 Diesel",
        "EPD2DXL0" => "Ultra-Low Sulfur Diesel",
        "EPM0" => "Total Gasoline",
        "EPMR" => "Regular Gasoline",
        "EPMP" => "Premium Gasoline",
        "EPM0R" => "Reformulated Motor Gasoline",
        other => other,
    }
}
