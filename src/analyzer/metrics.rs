//! Comparative market metrics: regional spread, premium over baseline,
//! cross-product synchronization, premium stability.
//!
//! Every output is a [`MetricOutcome`]; "not enough data" is a distinct
//! variant and is never collapsed into a computed zero.

use crate::aggregator::Aggregator;
use crate::config::AnalysisConfig;
use crate::model::{MetricOutcome, PremiumRecord};
use serde::Serialize;
use std::collections::BTreeSet;

/// Immutable per-run snapshot of everything the insight rules read.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub latest_period: Option<i32>,
    pub spread_product: String,
    /// Spread of the baseline product across regions at the latest period.
    pub regional_spread: MetricOutcome,
    pub synchronized_products: Vec<String>,
    /// Co-movement of all products in the national series.
    pub synchronization: MetricOutcome,
    pub premiums: Vec<PremiumSummary>,
}

/// Premium-over-baseline figures for one product in one region.
#[derive(Debug, Clone, Serialize)]
pub struct PremiumSummary {
    pub product_code: String,
    pub baseline_product_code: String,
    pub region_code: String,
    pub latest: MetricOutcome,
    pub mean_premium: MetricOutcome,
    /// Sample std-dev of the premium series as percent of its mean.
    pub stability_pct: MetricOutcome,
}

pub struct MetricsEngine<'a> {
    agg: &'a Aggregator<'a>,
    cfg: &'a AnalysisConfig,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(agg: &'a Aggregator<'a>, cfg: &'a AnalysisConfig) -> Self {
        Self { agg, cfg }
    }

    /// max(region price) − min(region price) for one product and period.
    /// The national aggregate region is not a market region and is left out.
    pub fn regional_spread(&self, product: &str, period: i32) -> MetricOutcome {
        let snapshot = self.agg.snapshot(product, period);
        let values: Vec<f64> = snapshot
            .prices
            .iter()
            .filter(|(region, _)| *region != &self.cfg.national_region)
            .map(|(_, price)| *price)
            .collect();
        if values.len() < self.cfg.min_regions {
            return MetricOutcome::insufficient(format!(
                "only {} of {} required regions have data for {} in {}",
                values.len(),
                self.cfg.min_regions,
                product,
                period
            ));
        }
        let max = values.iter().cloned().fold(f64::MIN, f64::max);
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        MetricOutcome::defined(max - min)
    }

    /// price(product) − price(baseline) in one region and period.
    pub fn premium(&self, product: &str, region: &str, period: i32) -> MetricOutcome {
        let series = self.agg.series(product, region);
        let baseline = self.agg.series(&self.cfg.baseline_product, region);
        match (series.get(period), baseline.get(period)) {
            (Some(p), Some(b)) => MetricOutcome::defined(p - b),
            (None, _) => MetricOutcome::insufficient(format!(
                "{product} has no observation for {period} in {region}"
            )),
            (_, None) => MetricOutcome::insufficient(format!(
                "baseline {} has no observation for {period} in {region}",
                self.cfg.baseline_product
            )),
        }
    }

    /// Premium records over every period where both series are observed.
    pub fn premium_series(&self, product: &str, region: &str) -> Vec<PremiumRecord> {
        let series = self.agg.series(product, region);
        let baseline = self.agg.series(&self.cfg.baseline_product, region);
        series
            .observed()
            .filter_map(|(period, price)| {
                let base = baseline.get(period)?;
                let premium = price - base;
                // A free baseline makes the relative premium undefined,
                // not zero.
                let premium_pct = (base != 0.0).then(|| premium / base * 100.0);
                Some(PremiumRecord {
                    product_code: product.to_string(),
                    baseline_product_code: self.cfg.baseline_product.clone(),
                    period,
                    premium,
                    premium_pct,
                })
            })
            .collect()
    }

    /// Mean pairwise Pearson correlation of period-over-period percentage
    /// changes, computed only over periods common to every product.
    pub fn synchronization(&self, products: &[String], region: &str) -> MetricOutcome {
        if products.len() < 2 {
            return MetricOutcome::insufficient("fewer than two products to compare");
        }

        let all_series: Vec<_> = products
            .iter()
            .map(|p| self.agg.series(p, region))
            .collect();

        let mut common: Option<BTreeSet<i32>> = None;
        for series in &all_series {
            let periods: BTreeSet<i32> = series.observed().map(|(p, _)| p).collect();
            common = Some(match common {
                None => periods,
                Some(acc) => acc.intersection(&periods).copied().collect(),
            });
        }
        let common: Vec<i32> = common.unwrap_or_default().into_iter().collect();
        if common.len() < self.cfg.min_common_periods {
            return MetricOutcome::insufficient(format!(
                "only {} periods common to all products, need {}",
                common.len(),
                self.cfg.min_common_periods
            ));
        }

        let deltas: Vec<Vec<f64>> = all_series
            .iter()
            .map(|series| {
                common
                    .windows(2)
                    .map(|w| {
                        let prev = series.get(w[0]).unwrap_or(0.0);
                        let cur = series.get(w[1]).unwrap_or(0.0);
                        if prev != 0.0 {
                            (cur - prev) / prev * 100.0
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();

        let mut correlations = Vec::new();
        for i in 0..deltas.len() {
            for j in (i + 1)..deltas.len() {
                if let Some(r) = pearson(&deltas[i], &deltas[j]) {
                    correlations.push(r);
                }
            }
        }
        if correlations.is_empty() {
            return MetricOutcome::insufficient("no price variation across common periods");
        }
        MetricOutcome::defined(correlations.iter().sum::<f64>() / correlations.len() as f64)
    }

    /// Sample standard deviation of a premium series as a percentage of
    /// its mean. Undefined for short series or a near-zero mean.
    pub fn premium_stability(&self, premiums: &[PremiumRecord]) -> MetricOutcome {
        if premiums.len() < 2 {
            return MetricOutcome::insufficient("fewer than two premium observations");
        }
        let values: Vec<f64> = premiums.iter().map(|p| p.premium).collect();
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        if mean.abs() < 1e-9 {
            return MetricOutcome::insufficient("premium mean is zero");
        }
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        MetricOutcome::defined(variance.sqrt() / mean.abs() * 100.0)
    }

    /// Assembles the per-run snapshot consumed by the insight rules and
    /// the report.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latest_period = self.agg.periods().last().copied();
        let baseline = &self.cfg.baseline_product;
        let region = &self.cfg.national_region;
        let products = self.agg.products();

        let regional_spread = match latest_period {
            Some(period) => self.regional_spread(baseline, period),
            None => MetricOutcome::insufficient("no periods in canonical table"),
        };

        let synchronization = self.synchronization(&products, region);

        let premiums = products
            .iter()
            .filter(|p| *p != baseline)
            .map(|product| {
                let series = self.premium_series(product, region);
                let latest = match latest_period {
                    Some(period) => self.premium(product, region, period),
                    None => MetricOutcome::insufficient("no periods in canonical table"),
                };
                let mean_premium = if series.is_empty() {
                    MetricOutcome::insufficient(format!(
                        "no overlapping periods between {product} and {baseline}"
                    ))
                } else {
                    MetricOutcome::defined(
                        series.iter().map(|p| p.premium).sum::<f64>() / series.len() as f64,
                    )
                };
                PremiumSummary {
                    product_code: product.clone(),
                    baseline_product_code: baseline.clone(),
                    region_code: region.clone(),
                    latest,
                    mean_premium,
                    stability_pct: self.premium_stability(&series),
                }
            })
            .collect();

        MetricsSnapshot {
            latest_period,
            spread_product: baseline.clone(),
            regional_spread,
            synchronized_products: products,
            synchronization,
            premiums,
        }
    }
}

/// Pearson correlation coefficient; `None` when either side has no
/// variance or the slices disagree in length.
fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.is_empty() {
        return None;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let numerator: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();
    let denom_x: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();
    let denom_y: f64 = y.iter().map(|yi| (yi - mean_y).powi(2)).sum();
    let denominator = (denom_x * denom_y).sqrt();
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}
