//! Denormalized views over the canonical table: per-(product, region)
//! ordered series and per-period region snapshots. Gaps stay explicit;
//! downstream metrics decide their own gap policy.

use crate::model::{CanonicalTable, ProductSeries, RegionSnapshot};
use std::collections::BTreeSet;

pub struct Aggregator<'a> {
    table: &'a CanonicalTable,
}

impl<'a> Aggregator<'a> {
    pub fn new(table: &'a CanonicalTable) -> Self {
        Self { table }
    }

    pub fn products(&self) -> Vec<String> {
        self.collect_sorted(|obs| obs.product_code.clone())
    }

    pub fn regions(&self) -> Vec<String> {
        self.collect_sorted(|obs| obs.region_code.clone())
    }

    pub fn periods(&self) -> Vec<i32> {
        let set: BTreeSet<i32> = self.table.observations().map(|o| o.period).collect();
        set.into_iter().collect()
    }

    fn collect_sorted(&self, key: impl Fn(&crate::model::PriceObservation) -> String) -> Vec<String> {
        let set: BTreeSet<String> = self.table.observations().map(|o| key(o)).collect();
        set.into_iter().collect()
    }

    /// Ordered series for one product in one region. Periods between the
    /// first and last observation that lack data come back as `None`.
    pub fn series(&self, product: &str, region: &str) -> ProductSeries {
        let mut points: Vec<(i32, f64)> = self
            .table
            .observations()
            .filter(|o| o.product_code == product && o.region_code == region)
            .map(|o| (o.period, o.price))
            .collect();
        points.sort_by_key(|(period, _)| *period);

        let (start_period, prices) = match (points.first(), points.last()) {
            (Some(&(first, _)), Some(&(last, _))) => {
                let mut slots = vec![None; (last - first + 1) as usize];
                for (period, price) in &points {
                    slots[(period - first) as usize] = Some(*price);
                }
                (first, slots)
            }
            _ => (0, Vec::new()),
        };

        ProductSeries {
            product_code: product.to_string(),
            region_code: region.to_string(),
            start_period,
            prices,
        }
    }

    /// Region-to-price mapping for one product in one period.
    pub fn snapshot(&self, product: &str, period: i32) -> RegionSnapshot {
        let prices = self
            .table
            .observations()
            .filter(|o| o.product_code == product && o.period == period)
            .map(|o| (o.region_code.clone(), o.price))
            .collect();
        RegionSnapshot {
            product_code: product.to_string(),
            period,
            prices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PriceObservation;

    fn table(rows: &[(&str, &str, i32, f64)]) -> CanonicalTable {
        let mut t = CanonicalTable::new();
        for &(product, region, period, price) in rows {
            t.insert(PriceObservation {
                product_code: product.to_string(),
                region_code: region.to_string(),
                period,
                price,
                units: "$/GAL".to_string(),
            });
        }
        t
    }

    #[test]
    fn series_is_period_ascending_with_explicit_gaps() {
        let t = table(&[
            ("EPM0", "NUS", 2022, 4.50),
            ("EPM0", "NUS", 2020, 2.20),
            // 2021 missing on purpose
        ]);
        let agg = Aggregator::new(&t);
        let series = agg.series("EPM0", "NUS");
        assert_eq!(series.start_period, 2020);
        assert_eq!(series.prices, vec![Some(2.20), None, Some(4.50)]);
    }

    #[test]
    fn series_for_absent_pair_is_empty() {
        let t = table(&[("EPM0", "NUS", 2020, 2.20)]);
        let agg = Aggregator::new(&t);
        assert!(agg.series("EPMP", "R20").is_empty());
    }

    #[test]
    fn snapshot_covers_regions_with_data_only() {
        let t = table(&[
            ("EPM0", "NUS", 2020, 2.20),
            ("EPM0", "R20", 2020, 2.05),
            ("EPM0", "R50", 2021, 3.40),
        ]);
        let agg = Aggregator::new(&t);
        let snap = agg.snapshot("EPM0", 2020);
        assert_eq!(snap.prices.len(), 2);
        assert_eq!(snap.prices["R20"], 2.05);
        assert!(!snap.prices.contains_key("R50"));
    }

    #[test]
    fn enumerations_are_sorted_unique() {
        let t = table(&[
            ("EPMR", "R20", 2021, 2.9),
            ("EPM0", "NUS", 2020, 2.2),
            ("EPM0", "R20", 2021, 2.8),
        ]);
        let agg = Aggregator::new(&t);
        assert_eq!(agg.products(), vec!["EPM0", "EPMR"]);
        assert_eq!(agg.regions(), vec!["NUS", "R20"]);
        assert_eq!(agg.periods(), vec![2020, 2021]);
    }
}
