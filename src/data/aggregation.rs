use super::table::{Table, Value};
use crate::error::Result;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Aggregation {
    Sum,
    Mean,
}

/// One output column of a group-by: `output = aggregation(input)`.
struct Measure {
    output: &'static str,
    input: &'static str,
    aggregation: Aggregation,
}

const SALES_MEASURES: [Measure; 3] = [
    Measure {
        output: "total_units_sold",
        input: "units_ordered",
        aggregation: Aggregation::Sum,
    },
    Measure {
        output: "total_sales",
        input: "ordered_product_sales",
        aggregation: Aggregation::Sum,
    },
    Measure {
        output: "avg_selling_price",
        input: "ordered_product_sales",
        aggregation: Aggregation::Mean,
    },
];

const ADS_MEASURES: [Measure; 5] = [
    Measure {
        output: "total_ad_spend",
        input: "spend",
        aggregation: Aggregation::Sum,
    },
    Measure {
        output: "total_clicks",
        input: "clicks",
        aggregation: Aggregation::Sum,
    },
    Measure {
        output: "total_impressions",
        input: "impressions",
        aggregation: Aggregation::Sum,
    },
    Measure {
        output: "avg_cpc",
        input: "costperclick",
        aggregation: Aggregation::Mean,
    },
    Measure {
        output: "sales_30d",
        input: "sales30d",
        aggregation: Aggregation::Sum,
    },
];

/// Collapses raw sales records to one row per sku.
///
/// Produces `total_units_sold`, `total_sales` and `avg_selling_price`. The
/// average is the plain mean of `ordered_product_sales` over the sku's rows,
/// not weighted by units.
///
/// # Arguments
/// * `sales`: Normalized, null-filled sales table
///
/// # Errors
/// Returns a schema error if `sku` or an input column is missing
pub fn aggregate_sales(sales: &Table) -> Result<Table> {
    let aggregated = group_by_sku(sales, "Historical Sales", &SALES_MEASURES)?;
    info!(skus = aggregated.len(), "Sales aggregated per SKU");
    Ok(aggregated)
}

/// Collapses raw ad records to one row per sku.
///
/// Produces `total_ad_spend`, `total_clicks`, `total_impressions`, `avg_cpc`
/// and `sales_30d`.
pub fn aggregate_ads(ads: &Table) -> Result<Table> {
    let aggregated = group_by_sku(ads, "Ads Performance", &ADS_MEASURES)?;
    info!(skus = aggregated.len(), "Ads aggregated per SKU");
    Ok(aggregated)
}

#[derive(Default, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: usize,
}

// Output rows are ordered by sku. Rows with no sku are not grouped; a sku
// with no rows simply has no output row.
fn group_by_sku(table: &Table, table_name: &str, measures: &[Measure]) -> Result<Table> {
    let key_idx = table.require_column(table_name, "sku")?;
    let input_idx = measures
        .iter()
        .map(|m| table.require_column(table_name, m.input))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: BTreeMap<String, Vec<Accumulator>> = BTreeMap::new();
    for row in table.rows() {
        let Some(key) = row[key_idx].key() else {
            continue;
        };
        let accumulators = groups
            .entry(key)
            .or_insert_with(|| vec![Accumulator::default(); measures.len()]);
        for (acc, &idx) in accumulators.iter_mut().zip(&input_idx) {
            // null handling has already run, anything non-numeric counts as zero
            acc.sum += row[idx].as_f64().unwrap_or(0.0);
            acc.count += 1;
        }
    }

    let mut columns = vec!["sku".to_string()];
    columns.extend(measures.iter().map(|m| m.output.to_string()));

    let rows = groups
        .into_iter()
        .map(|(sku, accumulators)| {
            let mut row = vec![Value::Text(sku)];
            row.extend(measures.iter().zip(accumulators).map(|(m, acc)| {
                Value::Number(match m.aggregation {
                    Aggregation::Sum => acc.sum,
                    Aggregation::Mean => acc.sum / acc.count as f64,
                })
            }));
            row
        })
        .collect();

    Ok(Table::from_rows(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_table() -> Table {
        let rows = vec![
            ("B", 10.0, 100.0),
            ("A", 2.0, 30.0),
            ("B", 0.0, 0.0),
            ("A", 3.0, 45.0),
            ("B", 5.0, 50.0),
        ];
        Table::from_rows(
            vec![
                "sku".to_string(),
                "units_ordered".to_string(),
                "ordered_product_sales".to_string(),
            ],
            rows.into_iter()
                .map(|(sku, units, sales)| {
                    vec![Value::text(sku), Value::Number(units), Value::Number(sales)]
                })
                .collect(),
        )
    }

    #[test]
    fn test_aggregate_sales_per_sku() {
        let agg = aggregate_sales(&sales_table()).unwrap();

        assert_eq!(
            agg.columns(),
            &["sku", "total_units_sold", "total_sales", "avg_selling_price"]
        );
        assert_eq!(agg.len(), 2);
        // sorted by sku
        assert_eq!(agg.get(0, "sku"), Some(&Value::text("A")));
        assert_eq!(agg.get(0, "total_units_sold"), Some(&Value::Number(5.0)));
        assert_eq!(agg.get(0, "avg_selling_price"), Some(&Value::Number(37.5)));
        // zero rows are part of the mean
        assert_eq!(agg.get(1, "total_sales"), Some(&Value::Number(150.0)));
        assert_eq!(agg.get(1, "avg_selling_price"), Some(&Value::Number(50.0)));
    }

    #[test]
    fn test_aggregate_sales_preserves_unit_totals() {
        let raw = sales_table();
        let agg = aggregate_sales(&raw).unwrap();

        let raw_total: f64 = raw.column_values(1).filter_map(Value::as_f64).sum();
        let agg_total: f64 = agg.column_values(1).filter_map(Value::as_f64).sum();
        assert_eq!(raw_total, agg_total);
    }

    #[test]
    fn test_aggregate_ads_per_sku() {
        let ads = Table::from_rows(
            ["sku", "spend", "clicks", "impressions", "costperclick", "sales30d"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            vec![
                vec![
                    Value::text("A"),
                    Value::Number(10.0),
                    Value::Number(5.0),
                    Value::Number(100.0),
                    Value::Number(2.0),
                    Value::Number(40.0),
                ],
                vec![
                    Value::text("A"),
                    Value::Number(6.0),
                    Value::Number(3.0),
                    Value::Number(50.0),
                    Value::Number(0.0),
                    Value::Number(0.0),
                ],
            ],
        );

        let agg = aggregate_ads(&ads).unwrap();
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.get(0, "total_ad_spend"), Some(&Value::Number(16.0)));
        assert_eq!(agg.get(0, "total_clicks"), Some(&Value::Number(8.0)));
        assert_eq!(agg.get(0, "total_impressions"), Some(&Value::Number(150.0)));
        assert_eq!(agg.get(0, "avg_cpc"), Some(&Value::Number(1.0)));
        assert_eq!(agg.get(0, "sales_30d"), Some(&Value::Number(40.0)));
    }

    #[test]
    fn test_aggregate_requires_input_columns() {
        let table = Table::from_rows(
            vec!["sku".to_string()],
            vec![vec![Value::text("A")]],
        );
        assert!(aggregate_sales(&table).is_err());
    }
}
