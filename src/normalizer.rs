//! Validation boundary: raw API records in, canonical table plus
//! rejection list out. A single bad record never aborts the run.

use crate::config::AnalysisConfig;
use crate::model::{
    CanonicalTable, PipelineError, PriceObservation, RawRecord, RejectReason, Rejection,
};
use serde_json::Value;
use tracing::debug;

const DEFAULT_UNITS: &str = "$/GAL";

/// Output of one normalization pass.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub table: CanonicalTable,
    pub rejections: Vec<Rejection>,
    /// Duplicate keys resolved by overwrite, counted but not rejected.
    pub duplicates_overwritten: usize,
}

/// Builds the canonical table from loosely typed raw records.
///
/// Per-record failures accumulate in the rejection list; the pass is
/// fatal only when the input is empty or nothing at all survives.
pub fn normalize(
    records: &[RawRecord],
    cfg: &AnalysisConfig,
) -> Result<NormalizedBatch, PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::MalformedSource(
            "empty input record sequence".to_string(),
        ));
    }

    let mut table = CanonicalTable::new();
    let mut rejections = Vec::new();
    let mut duplicates_overwritten = 0usize;

    for (index, record) in records.iter().enumerate() {
        match coerce(record, cfg) {
            Ok(obs) => {
                if table.insert(obs).is_some() {
                    duplicates_overwritten += 1;
                }
            }
            Err(reason) => {
                debug!(index, ?reason, "record rejected");
                rejections.push(Rejection { index, reason });
            }
        }
    }

    if table.is_empty() {
        return Err(PipelineError::MalformedSource(format!(
            "no usable records in input of {} (all rejected)",
            records.len()
        )));
    }

    Ok(NormalizedBatch {
        table,
        rejections,
        duplicates_overwritten,
    })
}

fn coerce(record: &RawRecord, cfg: &AnalysisConfig) -> Result<PriceObservation, RejectReason> {
    let product_code = code_field(record, "product")?;
    let region_code = code_field(record, "duoarea")?;
    let period = period_field(record, cfg)?;
    let price = price_field(record, cfg)?;
    let units = match record.get("units") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => DEFAULT_UNITS.to_string(),
    };

    Ok(PriceObservation {
        product_code,
        region_code,
        period,
        price,
        units,
    })
}

/// String codes are trimmed and upper-cased before use as keys.
fn code_field(record: &RawRecord, field: &'static str) -> Result<String, RejectReason> {
    match record.get(field) {
        None | Some(Value::Null) => Err(RejectReason::MissingField { field }),
        Some(Value::String(s)) => {
            let code = s.trim().to_uppercase();
            if code.is_empty() {
                Err(RejectReason::MissingField { field })
            } else {
                Ok(code)
            }
        }
        Some(_) => Err(RejectReason::BadType { field }),
    }
}

/// Annual periods arrive as integers or year strings ("2024"). Values
/// outside the configured year range are rejected: a date-like period
/// such as 20240101 parses as an integer but is not an annual period,
/// and downstream series span the full range between observed periods.
fn period_field(record: &RawRecord, cfg: &AnalysisConfig) -> Result<i32, RejectReason> {
    let period = match record.get("period") {
        None | Some(Value::Null) => return Err(RejectReason::MissingField { field: "period" }),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|y| i32::try_from(y).ok())
            .ok_or(RejectReason::BadType { field: "period" })?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<i32>()
            .map_err(|_| RejectReason::BadType { field: "period" })?,
        Some(_) => return Err(RejectReason::BadType { field: "period" }),
    };
    if period < cfg.min_period || period > cfg.max_period {
        return Err(RejectReason::PeriodOutOfRange { period });
    }
    Ok(period)
}

/// The EIA API serializes prices as numbers or numeric strings. Negative
/// values and the configured sentinel mean "no data", never zero.
fn price_field(record: &RawRecord, cfg: &AnalysisConfig) -> Result<f64, RejectReason> {
    let price = match record.get("value") {
        None | Some(Value::Null) => return Err(RejectReason::MissingField { field: "value" }),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or(RejectReason::BadType { field: "value" })?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RejectReason::BadType { field: "value" })?,
        Some(_) => return Err(RejectReason::BadType { field: "value" }),
    };

    if let Some(sentinel) = cfg.missing_value_sentinel {
        if (price - sentinel).abs() < f64::EPSILON {
            return Err(RejectReason::SentinelValue { price });
        }
    }
    if price < 0.0 {
        return Err(RejectReason::NegativePrice { price });
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(product: &str, area: &str, period: Value, value: Value) -> RawRecord {
        let v = json!({
            "period": period,
            "duoarea": area,
            "product": product,
            "value": value,
            "units": "$/GAL",
        });
        v.as_object().unwrap().clone()
    }

    fn cfg() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn valid_records_become_unique_observations() {
        let records = vec![
            raw("EPM0", "NUS", json!(2020), json!(2.20)),
            raw("EPM0", "NUS", json!(2021), json!("3.10")),
            raw("EPMR", "R20", json!("2020"), json!(2.05)),
        ];
        let batch = normalize(&records, &cfg()).unwrap();
        assert_eq!(batch.table.len(), 3);
        assert!(batch.rejections.is_empty());
        assert_eq!(batch.table.get("EPM0", "NUS", 2021).unwrap().price, 3.10);
    }

    #[test]
    fn later_duplicate_wins() {
        let records = vec![
            raw("EPM0", "NUS", json!(2020), json!(2.20)),
            raw("EPM0", "NUS", json!(2020), json!(2.35)),
        ];
        let batch = normalize(&records, &cfg()).unwrap();
        assert_eq!(batch.table.len(), 1);
        assert_eq!(batch.duplicates_overwritten, 1);
        assert!(batch.rejections.is_empty());
        assert_eq!(batch.table.get("EPM0", "NUS", 2020).unwrap().price, 2.35);
    }

    #[test]
    fn codes_are_case_and_whitespace_normalized() {
        let records = vec![
            raw("epm0", " nus ", json!(2020), json!(2.20)),
            raw("EPM0", "NUS", json!(2020), json!(2.30)),
        ];
        let batch = normalize(&records, &cfg()).unwrap();
        assert_eq!(batch.table.len(), 1);
        assert_eq!(batch.duplicates_overwritten, 1);
    }

    #[test]
    fn negative_price_is_rejected_not_fatal() {
        let records = vec![
            raw("EPM0", "NUS", json!(2020), json!(-1.0)),
            raw("EPM0", "NUS", json!(2021), json!(3.10)),
        ];
        let batch = normalize(&records, &cfg()).unwrap();
        assert_eq!(batch.table.len(), 1);
        assert_eq!(
            batch.rejections,
            vec![Rejection {
                index: 0,
                reason: RejectReason::NegativePrice { price: -1.0 },
            }]
        );
    }

    #[test]
    fn sentinel_value_is_missing_not_zero() {
        let mut cfg = cfg();
        cfg.missing_value_sentinel = Some(999.9);
        let records = vec![
            raw("EPM0", "NUS", json!(2020), json!(999.9)),
            raw("EPM0", "NUS", json!(2021), json!(3.10)),
        ];
        let batch = normalize(&records, &cfg).unwrap();
        assert_eq!(batch.table.len(), 1);
        assert!(matches!(
            batch.rejections[0].reason,
            RejectReason::SentinelValue { .. }
        ));
    }

    #[test]
    fn missing_and_mistyped_fields_are_rejected() {
        let mut no_product = raw("EPM0", "NUS", json!(2020), json!(2.20));
        no_product.remove("product");
        let bad_period = raw("EPM0", "NUS", json!("20-21"), json!(2.20));
        let bad_value = raw("EPM0", "NUS", json!(2021), json!("n/a"));
        let good = raw("EPM0", "NUS", json!(2022), json!(4.50));

        let batch = normalize(&[no_product, bad_period, bad_value, good], &cfg()).unwrap();
        assert_eq!(batch.table.len(), 1);
        assert_eq!(batch.rejections.len(), 3);
        assert_eq!(
            batch.rejections[0].reason,
            RejectReason::MissingField { field: "product" }
        );
        assert_eq!(
            batch.rejections[1].reason,
            RejectReason::BadType { field: "period" }
        );
        assert_eq!(
            batch.rejections[2].reason,
            RejectReason::BadType { field: "value" }
        );
    }

    #[test]
    fn out_of_range_periods_are_rejected() {
        // Integer-like garbage (date stamps, epoch values) parses as i32
        // but must not enter the table, where it would define series spans.
        let records = vec![
            raw("EPM0", "NUS", json!("20240101"), json!(2.20)),
            raw("EPM0", "NUS", json!(-2000000000), json!(2.20)),
            raw("EPM0", "NUS", json!(2000000000), json!(2.20)),
            raw("EPM0", "NUS", json!(2021), json!(3.10)),
        ];
        let batch = normalize(&records, &cfg()).unwrap();
        assert_eq!(batch.table.len(), 1);
        assert_eq!(batch.rejections.len(), 3);
        assert_eq!(
            batch.rejections[0].reason,
            RejectReason::PeriodOutOfRange { period: 20240101 }
        );

        let agg = crate::aggregator::Aggregator::new(&batch.table);
        let series = agg.series("EPM0", "NUS");
        assert_eq!(series.observed_periods(), vec![2021]);
    }

    #[test]
    fn empty_input_is_fatal() {
        let err = normalize(&[], &cfg()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedSource(_)));
    }

    #[test]
    fn entirely_unparseable_input_is_fatal() {
        let records = vec![raw("EPM0", "NUS", json!(2020), json!("n/a"))];
        let err = normalize(&records, &cfg()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedSource(_)));
    }
}
