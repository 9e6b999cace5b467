//! Rule-based insight synthesis. Each rule is an independent predicate
//! plus formatter over the immutable metrics snapshot; a rule whose
//! required metric is undefined is skipped, never evaluated on a default.

use crate::analyzer::metrics::MetricsSnapshot;
use crate::config::AnalysisConfig;
use crate::model::{Insight, InsightCategory, VolatilityPeriod, product_name, region_name};

type RuleFn = fn(&MetricsSnapshot, &[VolatilityPeriod], &AnalysisConfig) -> Option<Insight>;

pub struct InsightEngine {
    rules: Vec<RuleFn>,
    cfg: AnalysisConfig,
}

impl InsightEngine {
    pub fn with_default_rules(cfg: AnalysisConfig) -> Self {
        Self {
            rules: vec![
                market_structure_rule,
                regional_divergence_rule,
                volatility_rule,
                premium_rule,
            ],
            cfg,
        }
    }

    /// Evaluates every rule, then ranks: magnitude descending, ties
    /// broken by category priority. Rule order never changes which
    /// insights are produced, only their pre-ranking order.
    pub fn evaluate(
        &self,
        snapshot: &MetricsSnapshot,
        episodes: &[VolatilityPeriod],
    ) -> Vec<Insight> {
        let mut insights: Vec<Insight> = self
            .rules
            .iter()
            .filter_map(|rule| rule(snapshot, episodes, &self.cfg))
            .collect();
        insights.sort_by(|a, b| {
            b.magnitude
                .total_cmp(&a.magnitude)
                .then_with(|| a.category.priority().cmp(&b.category.priority()))
        });
        insights
    }
}

/// Near-lockstep movement across the product set points at a shared
/// upstream cost driver (crude) rather than product-level dynamics.
fn market_structure_rule(
    snapshot: &MetricsSnapshot,
    _episodes: &[VolatilityPeriod],
    cfg: &AnalysisConfig,
) -> Option<Insight> {
    let score = snapshot.synchronization.value()?;
    if score < cfg.sync_threshold {
        return None;
    }
    Some(Insight {
        category: InsightCategory::MarketStructure,
        statement: format!(
            "Prices across {} fuel products move in near lockstep \
             (synchronization {score:.3}), consistent with a common crude-cost driver",
            snapshot.synchronized_products.len(),
        ),
        supporting_metrics: vec![format!("synchronization={score:.4}")],
        magnitude: score,
    })
}

fn regional_divergence_rule(
    snapshot: &MetricsSnapshot,
    _episodes: &[VolatilityPeriod],
    cfg: &AnalysisConfig,
) -> Option<Insight> {
    let spread = snapshot.regional_spread.value()?;
    if spread < cfg.spread_alert_usd {
        return None;
    }
    let period = snapshot.latest_period?;
    Some(Insight {
        category: InsightCategory::Regional,
        statement: format!(
            "Regional prices for {} diverge by ${spread:.2}/gal in {period}, \
             pointing at distinct regional market conditions",
            product_name(&snapshot.spread_product),
        ),
        supporting_metrics: vec![format!("regional_spread={spread:.4}")],
        magnitude: spread,
    })
}

/// Reports the highest-severity episode of the run.
fn volatility_rule(
    _snapshot: &MetricsSnapshot,
    episodes: &[VolatilityPeriod],
    _cfg: &AnalysisConfig,
) -> Option<Insight> {
    let worst = episodes
        .iter()
        .max_by(|a, b| a.severity.total_cmp(&b.severity))?;
    Some(Insight {
        category: InsightCategory::Volatility,
        statement: format!(
            "Prices swung between ${:.2} and ${:.2} during {}-{}, \
             a peak-to-trough move of {:.0}% of the long-run mean",
            worst.trough_price,
            worst.peak_price,
            worst.start_period,
            worst.end_period,
            worst.severity * 100.0,
        ),
        supporting_metrics: vec![format!(
            "episode={}-{}, severity={:.4}",
            worst.start_period, worst.end_period, worst.severity
        )],
        magnitude: worst.severity,
    })
}

/// Reports the most stable premium over the baseline product; a steady
/// premium means the grades are priced off the same base plus a margin.
fn premium_rule(
    snapshot: &MetricsSnapshot,
    _episodes: &[VolatilityPeriod],
    cfg: &AnalysisConfig,
) -> Option<Insight> {
    let stable = snapshot
        .premiums
        .iter()
        .filter_map(|summary| {
            let stability = summary.stability_pct.value()?;
            let mean = summary.mean_premium.value()?;
            (stability < cfg.premium_stability_threshold_pct).then_some((summary, stability, mean))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))?;
    let (summary, stability, mean) = stable;
    Some(Insight {
        category: InsightCategory::Premium,
        statement: format!(
            "{} holds a steady ${mean:.2}/gal premium over {} in {} \
             (relative variation {stability:.1}%)",
            product_name(&summary.product_code),
            product_name(&summary.baseline_product_code),
            region_name(&summary.region_code),
        ),
        supporting_metrics: vec![
            format!("mean_premium={mean:.4}"),
            format!("premium_stability_pct={stability:.4}"),
        ],
        magnitude: mean.abs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::metrics::PremiumSummary;
    use crate::model::{EpisodeTrigger, MetricOutcome};

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            latest_period: Some(2024),
            spread_product: "EPM0".to_string(),
            regional_spread: MetricOutcome::defined(1.15),
            synchronized_products: vec!["EPM0".to_string(), "EPMP".to_string()],
            synchronization: MetricOutcome::defined(0.97),
            premiums: vec![PremiumSummary {
                product_code: "EPMP".to_string(),
                baseline_product_code: "EPM0".to_string(),
                region_code: "NUS".to_string(),
                latest: MetricOutcome::defined(0.62),
                mean_premium: MetricOutcome::defined(0.60),
                stability_pct: MetricOutcome::defined(4.2),
            }],
        }
    }

    fn episode(severity: f64) -> VolatilityPeriod {
        VolatilityPeriod {
            start_period: 2021,
            end_period: 2023,
            peak_price: 4.50,
            trough_price: 2.20,
            trigger: EpisodeTrigger::PeriodChange(40.9),
            severity,
        }
    }

    fn cfg() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn all_rules_fire_on_a_rich_snapshot() {
        let engine = InsightEngine::with_default_rules(cfg());
        let insights = engine.evaluate(&snapshot(), &[episode(0.74)]);
        assert_eq!(insights.len(), 4);
    }

    #[test]
    fn ranking_is_magnitude_descending() {
        let engine = InsightEngine::with_default_rules(cfg());
        let insights = engine.evaluate(&snapshot(), &[episode(0.74)]);
        for pair in insights.windows(2) {
            assert!(pair[0].magnitude >= pair[1].magnitude);
        }
        // spread 1.15 > sync 0.97 > severity 0.74 > premium 0.60
        assert_eq!(insights[0].category, InsightCategory::Regional);
        assert_eq!(insights[3].category, InsightCategory::Premium);
    }

    #[test]
    fn equal_magnitudes_break_ties_by_category_priority() {
        let mut snap = snapshot();
        snap.synchronization = MetricOutcome::defined(0.97);
        let engine = InsightEngine::with_default_rules(cfg());
        let insights = engine.evaluate(&snap, &[episode(0.97)]);
        let sync_pos = insights
            .iter()
            .position(|i| i.category == InsightCategory::MarketStructure)
            .unwrap();
        let vol_pos = insights
            .iter()
            .position(|i| i.category == InsightCategory::Volatility)
            .unwrap();
        assert!(sync_pos < vol_pos);
    }

    #[test]
    fn undefined_metric_skips_the_rule() {
        let mut snap = snapshot();
        snap.synchronization = MetricOutcome::insufficient("only 2 common periods");
        snap.regional_spread = MetricOutcome::insufficient("one region");
        let engine = InsightEngine::with_default_rules(cfg());
        let insights = engine.evaluate(&snap, &[]);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].category, InsightCategory::Premium);
    }

    #[test]
    fn sub_threshold_sync_yields_no_market_structure_insight() {
        let mut snap = snapshot();
        snap.synchronization = MetricOutcome::defined(0.80);
        let engine = InsightEngine::with_default_rules(cfg());
        let insights = engine.evaluate(&snap, &[]);
        assert!(
            insights
                .iter()
                .all(|i| i.category != InsightCategory::MarketStructure)
        );
    }

    #[test]
    fn unstable_premium_yields_no_premium_insight() {
        let mut snap = snapshot();
        snap.premiums[0].stability_pct = MetricOutcome::defined(35.0);
        let engine = InsightEngine::with_default_rules(cfg());
        let insights = engine.evaluate(&snap, &[]);
        assert!(
            insights
                .iter()
                .all(|i| i.category != InsightCategory::Premium)
        );
    }
}
