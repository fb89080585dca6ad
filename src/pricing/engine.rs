use super::rules::{evaluate, PricingDecision, PricingThresholds, Recommendation, SkuMetrics};
use crate::data::table::{Table, Value};
use crate::error::DataIssue;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const RECOMMENDATION_COLUMN: &str = "pricing_recommendation";
pub const REASON_COLUMN: &str = "pricing_reason";
pub const PRICE_COLUMN: &str = "recommended_final_price";
pub const MIN_PRICE_COLUMN: &str = "minimum_allowed_price";
pub const IDEAL_PRICE_COLUMN: &str = "ideal_price";

/// Fields every row needs before the cascade can run.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "total_cost",
    "minimum_acceptable_margin_pct",
    "target_gross_margin_pct",
    "avg_selling_price",
    "return_quantity_30d",
    "total_units_sold",
    "days_of_supply",
    "lowest_competitor_price",
];

/// Result of pricing a base table.
#[derive(Debug, Clone)]
pub struct PricedTable {
    pub table: Table,
    pub recommendations: BTreeMap<Recommendation, usize>,
    pub issues: Vec<DataIssue>,
}

impl PricedTable {
    pub fn skipped(&self) -> usize {
        self.issues.len()
    }
}

/// Applies the pricing cascade to every row of a base table.
///
/// Rows are evaluated independently. A row lacking one of
/// [`REQUIRED_FIELDS`] is not priced: it keeps empty recommendation and price
/// cells, its reason names the missing field, and a
/// [`DataIssue::MissingField`] is recorded. The rest of the table is priced
/// normally.
pub struct PricingEngine {
    thresholds: PricingThresholds,
    emit_reference_prices: bool,
}

impl PricingEngine {
    /// Creates an engine.
    ///
    /// # Arguments
    /// * `thresholds`: Cascade limits
    /// * `emit_reference_prices`: Also write the margin-floor and target-margin
    ///   prices as extra columns
    pub fn new(thresholds: PricingThresholds, emit_reference_prices: bool) -> Self {
        Self {
            thresholds,
            emit_reference_prices,
        }
    }

    /// Reads the cascade inputs of row `row`.
    ///
    /// # Errors
    /// Returns [`DataIssue::MissingField`] for the first required field that is
    /// absent or not numeric
    pub fn extract_metrics(table: &Table, row: usize) -> Result<SkuMetrics, DataIssue> {
        let sku = table
            .get(row, "sku")
            .and_then(Value::key)
            .unwrap_or_else(|| format!("<row {}>", row));

        let mut fields = [0.0; REQUIRED_FIELDS.len()];
        for (slot, field) in fields.iter_mut().zip(REQUIRED_FIELDS) {
            *slot = table
                .get(row, field)
                .and_then(Value::as_f64)
                .ok_or_else(|| DataIssue::MissingField {
                    sku: sku.clone(),
                    field: field.to_string(),
                })?;
        }

        let [
            total_cost,
            minimum_acceptable_margin_pct,
            target_gross_margin_pct,
            avg_selling_price,
            return_quantity_30d,
            total_units_sold,
            days_of_supply,
            lowest_competitor_price,
        ] = fields;

        Ok(SkuMetrics {
            sku,
            total_cost,
            minimum_acceptable_margin_pct,
            target_gross_margin_pct,
            avg_selling_price,
            return_quantity_30d,
            total_units_sold,
            days_of_supply,
            lowest_competitor_price,
        })
    }

    /// Evaluates one row.
    pub fn price_row(&self, table: &Table, row: usize) -> Result<PricingDecision, DataIssue> {
        let metrics = Self::extract_metrics(table, row)?;
        Ok(evaluate(&metrics, &self.thresholds))
    }

    /// Prices every row of `base` and returns a new table with the decision
    /// columns appended. `base` itself is left unchanged.
    pub fn apply(&self, base: &Table) -> PricedTable {
        let mut recommendations = BTreeMap::new();
        let mut issues = Vec::new();

        let mut labels = Vec::with_capacity(base.len());
        let mut reasons = Vec::with_capacity(base.len());
        let mut prices = Vec::with_capacity(base.len());
        let mut floors = Vec::with_capacity(base.len());
        let mut ideals = Vec::with_capacity(base.len());

        for row in 0..base.len() {
            match self.price_row(base, row) {
                Ok(decision) => {
                    *recommendations.entry(decision.recommendation).or_insert(0) += 1;
                    labels.push(Value::text(decision.recommendation.label()));
                    reasons.push(Value::Text(decision.reason));
                    prices.push(Value::Number(decision.recommended_price));
                    floors.push(Value::Number(decision.minimum_allowed_price));
                    ideals.push(Value::Number(decision.ideal_price));
                }
                Err(issue) => {
                    warn!("skipping pricing: {}", issue);
                    labels.push(Value::Missing);
                    reasons.push(Value::Text(format!("Not priced: {}", issue)));
                    prices.push(Value::Missing);
                    floors.push(Value::Missing);
                    ideals.push(Value::Missing);
                    issues.push(issue);
                }
            }
        }

        let mut table = base
            .with_column(RECOMMENDATION_COLUMN, labels)
            .with_column(REASON_COLUMN, reasons)
            .with_column(PRICE_COLUMN, prices);
        if self.emit_reference_prices {
            table = table
                .with_column(MIN_PRICE_COLUMN, floors)
                .with_column(IDEAL_PRICE_COLUMN, ideals);
        }

        for (recommendation, count) in &recommendations {
            info!(recommendation = %recommendation, count, "pricing recommendations");
        }
        info!(priced = base.len() - issues.len(), skipped = issues.len(), "pricing complete");

        PricedTable {
            table,
            recommendations,
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_table(rows: Vec<(&str, [Value; 8])>) -> Table {
        let mut columns = vec!["sku".to_string()];
        columns.extend(REQUIRED_FIELDS.iter().map(|f| f.to_string()));
        Table::from_rows(
            columns,
            rows.into_iter()
                .map(|(sku, fields)| {
                    let mut row = vec![Value::text(sku)];
                    row.extend(fields);
                    row
                })
                .collect(),
        )
    }

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    #[test]
    fn test_apply_adds_three_columns_and_prices_rows() {
        // total_cost, min%, target%, asp, returns30, units, days, lowest competitor
        let base = base_table(vec![
            ("X1", [n(10.0), n(20.0), n(40.0), n(20.0), n(15.0), n(0.0), n(0.0), n(0.0)]),
            ("X2", [n(10.0), n(10.0), n(40.0), n(15.0), n(0.0), n(30.0), n(5.0), n(99.0)]),
            ("X3", [n(10.0), n(10.0), n(40.0), n(15.0), n(0.0), n(5.0), n(40.0), n(12.0)]),
            ("X4", [n(10.0), n(10.0), n(40.0), n(18.0), n(2.0), n(15.0), n(20.0), n(19.0)]),
        ]);

        let priced = PricingEngine::new(PricingThresholds::default(), false).apply(&base);
        let table = &priced.table;

        assert_eq!(table.len(), 4);
        assert_eq!(table.columns().len(), base.columns().len() + 3);
        assert!(priced.issues.is_empty());

        let expected = [
            ("Investigate", 20.0),
            ("Increase Price", 15.75),
            ("Decrease Price", 12.24),
            ("Maintain Price", 18.0),
        ];
        for (row, (label, price)) in expected.iter().enumerate() {
            assert_eq!(table.get(row, RECOMMENDATION_COLUMN), Some(&Value::text(*label)));
            assert_eq!(table.get(row, PRICE_COLUMN), Some(&n(*price)));
        }
        assert_eq!(priced.recommendations.values().sum::<usize>(), 4);
        // base table not mutated
        assert!(base.column_index(PRICE_COLUMN).is_none());
    }

    #[test]
    fn test_missing_field_skips_only_that_row() {
        let base = base_table(vec![
            ("GOOD", [n(10.0), n(10.0), n(40.0), n(18.0), n(2.0), n(15.0), n(20.0), n(19.0)]),
            ("BAD", [n(10.0), n(10.0), n(40.0), Value::Missing, n(0.0), n(5.0), n(40.0), n(12.0)]),
        ]);

        let priced = PricingEngine::new(PricingThresholds::default(), false).apply(&base);

        assert_eq!(priced.skipped(), 1);
        assert_eq!(
            priced.issues[0],
            DataIssue::MissingField {
                sku: "BAD".to_string(),
                field: "avg_selling_price".to_string(),
            }
        );
        assert_eq!(priced.table.get(1, RECOMMENDATION_COLUMN), Some(&Value::Missing));
        assert_eq!(priced.table.get(1, PRICE_COLUMN), Some(&Value::Missing));
        assert_eq!(
            priced.table.get(0, RECOMMENDATION_COLUMN),
            Some(&Value::text("Maintain Price"))
        );
    }

    #[test]
    fn test_reference_prices_are_optional_columns() {
        let base = base_table(vec![(
            "X4",
            [n(10.0), n(10.0), n(40.0), n(18.0), n(2.0), n(15.0), n(20.0), n(19.0)],
        )]);

        let priced = PricingEngine::new(PricingThresholds::default(), true).apply(&base);
        assert_eq!(priced.table.get(0, MIN_PRICE_COLUMN), Some(&n(11.0)));
        assert_eq!(priced.table.get(0, IDEAL_PRICE_COLUMN), Some(&n(14.0)));
    }
}
