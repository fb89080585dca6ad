use super::processing::coerce_column;
use super::source::SourceKind;
use super::table::{Table, Value};
use crate::error::{DataIssue, PipelineError, Result};
use tracing::info;

/// Inputs of the base-table join: four cleaned source tables and the two
/// per-sku aggregates.
pub struct JoinInputs<'a> {
    pub pricing: &'a Table,
    pub competitor: &'a Table,
    pub sales_agg: &'a Table,
    pub inventory: &'a Table,
    pub returns: &'a Table,
    pub ads_agg: &'a Table,
}

/// The joined base table and any values the projection could not parse.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub table: Table,
    pub issues: Vec<DataIssue>,
}

/// Projects `table` onto the columns `source` declares, under their canonical
/// names, coercing declared numeric columns.
///
/// Fails if a declared column is missing or if a sku appears twice. Skus
/// must be unique in every joined source; callers deduplicate upstream.
pub fn project(table: &Table, source: SourceKind) -> Result<(Table, Vec<DataIssue>)> {
    let table_name = source.display_name();
    let picks = source
        .columns()
        .iter()
        .map(|spec| {
            spec.resolve(table)
                .map(|idx| (idx, spec.name.to_string()))
                .ok_or_else(|| PipelineError::Schema {
                    table: table_name.to_string(),
                    column: spec.name.to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    // select always copies, so the anchor never aliases the cleaned table
    let mut projected = table.select(&picks);
    let mut issues = Vec::new();
    for (idx, spec) in source.columns().iter().enumerate() {
        if spec.numeric {
            // rows here are positions in the cleaned table
            let (coerced, found) = coerce_column(&projected, idx, table_name, |row| row + 1);
            projected = coerced;
            issues.extend(found);
        }
    }

    ensure_unique_skus(&projected, table_name)?;
    Ok((projected, issues))
}

fn ensure_unique_skus(table: &Table, table_name: &str) -> Result<()> {
    let sku_idx = table.require_column(table_name, "sku")?;
    match table.first_duplicate_key(sku_idx) {
        Some(sku) => Err(PipelineError::JoinKeyDuplicate {
            table: table_name.to_string(),
            sku,
        }),
        None => Ok(()),
    }
}

/// Appends `total_cost = cost + fba_fee + storage_fee + handling_cost`.
///
/// If any component is missing the total is missing too.
pub fn with_total_cost(pricing: &Table) -> Result<Table> {
    let parts = ["cost", "fba_fee", "storage_fee", "handling_cost"]
        .iter()
        .map(|c| pricing.require_column("Pricing Data", c))
        .collect::<Result<Vec<_>>>()?;

    let totals = pricing
        .rows()
        .iter()
        .map(|row| {
            parts
                .iter()
                .map(|&idx| row[idx].as_f64())
                .sum::<Option<f64>>()
                .map_or(Value::Missing, Value::Number)
        })
        .collect();

    Ok(pricing.with_column("total_cost", totals))
}

/// Builds the per-sku base table.
///
/// The pricing projection (plus `total_cost`) is the anchor. Competitor,
/// sales aggregate, inventory, returns and ads aggregate are left-joined onto
/// it in that order, all on `sku`. The result has exactly one row per
/// pricing sku, in pricing order; columns with repeated names keep the
/// leftmost copy.
///
/// # Errors
/// - [`PipelineError::Schema`] if a projected column is missing
/// - [`PipelineError::JoinKeyDuplicate`] if any joined table repeats a sku
pub fn build_base_table(inputs: &JoinInputs<'_>) -> Result<JoinOutcome> {
    let mut issues = Vec::new();

    let (pricing, found) = project(inputs.pricing, SourceKind::Pricing)?;
    issues.extend(found);
    let anchor = with_total_cost(&pricing)?;

    let (competitor, found) = project(inputs.competitor, SourceKind::Competitor)?;
    issues.extend(found);
    let (inventory, found) = project(inputs.inventory, SourceKind::Inventory)?;
    issues.extend(found);
    let (returns, found) = project(inputs.returns, SourceKind::Returns)?;
    issues.extend(found);

    let joined = anchor
        .left_join(&competitor, "sku", SourceKind::Competitor.display_name())?
        .left_join(inputs.sales_agg, "sku", "Sales Aggregate")?
        .left_join(&inventory, "sku", SourceKind::Inventory.display_name())?
        .left_join(&returns, "sku", SourceKind::Returns.display_name())?
        .left_join(inputs.ads_agg, "sku", "Ads Aggregate")?
        .collapse_duplicate_columns();

    info!(
        rows = joined.len(),
        columns = joined.columns().len(),
        "base table joined"
    );

    Ok(JoinOutcome {
        table: joined,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
        Table::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    fn pricing() -> Table {
        table(
            &[
                "sku",
                "product_role",
                "cost",
                "fba_fee",
                "storage_fee",
                "handling_cost",
                "minimum_acceptable_margin_%",
                "target_gross_margin_%",
                "extra",
            ],
            vec![
                vec![
                    Value::text("A"),
                    Value::text("Hero"),
                    n(6.0),
                    n(2.0),
                    Value::text("$1"),
                    n(1.0),
                    n(10.0),
                    n(30.0),
                    n(0.0),
                ],
                vec![
                    Value::text("B"),
                    Value::text("Filler"),
                    n(5.0),
                    n(1.0),
                    n(1.0),
                    Value::Missing,
                    n(10.0),
                    n(30.0),
                    n(0.0),
                ],
            ],
        )
    }

    fn competitor() -> Table {
        table(
            &[
                "sku",
                "avg_competitor_price",
                "lowest_competitor_price",
                "highest_competitor_price",
                "competitor_count",
            ],
            vec![vec![Value::text("B"), n(14.0), n(12.0), n(16.0), n(3.0)]],
        )
    }

    fn sales_agg() -> Table {
        table(
            &["sku", "total_units_sold", "total_sales", "avg_selling_price"],
            vec![
                vec![Value::text("A"), n(30.0), n(450.0), n(15.0)],
                vec![Value::text("Z"), n(1.0), n(9.0), n(9.0)],
            ],
        )
    }

    fn inventory() -> Table {
        table(
            &[
                "sku",
                "available",
                "total_inventory",
                "days_of_supply",
                "weeks_of_cover_t30",
                "weeks_of_cover_t90",
            ],
            vec![vec![Value::text("A"), n(4.0), n(6.0), n(5.0), n(1.0), n(2.0)]],
        )
    }

    fn returns() -> Table {
        table(
            &[
                "sku",
                "return_quantity_(last_30_days)",
                "return_quantity_(last_60_days)",
                "return_quantity_(last_90_days)",
            ],
            vec![vec![Value::text("A"), n(0.0), n(1.0), n(2.0)]],
        )
    }

    fn ads_agg() -> Table {
        table(
            &[
                "sku",
                "total_ad_spend",
                "total_clicks",
                "total_impressions",
                "avg_cpc",
                "sales_30d",
            ],
            vec![],
        )
    }

    #[test]
    fn test_with_total_cost() {
        let (projected, issues) = project(&pricing(), SourceKind::Pricing).unwrap();
        assert!(issues.is_empty());
        let with_total = with_total_cost(&projected).unwrap();
        assert_eq!(with_total.get(0, "total_cost"), Some(&n(10.0)));
        assert_eq!(with_total.get(1, "total_cost"), Some(&Value::Missing));
    }

    #[test]
    fn test_build_base_table_shape() {
        let (p, c, s, i, r, a) = (pricing(), competitor(), sales_agg(), inventory(), returns(), ads_agg());
        let outcome = build_base_table(&JoinInputs {
            pricing: &p,
            competitor: &c,
            sales_agg: &s,
            inventory: &i,
            returns: &r,
            ads_agg: &a,
        })
        .unwrap();
        let base = outcome.table;

        assert_eq!(base.len(), p.len());
        assert_eq!(base.columns().len(), 9 + 4 + 3 + 5 + 3 + 5);
        assert_eq!(base.columns()[6], "minimum_acceptable_margin_pct");
        assert_eq!(base.columns()[8], "total_cost");
        assert!(base.column_index("extra").is_none());
        assert!(base.column_index("return_quantity_30d").is_some());

        assert_eq!(base.get(0, "sku"), Some(&Value::text("A")));
        assert_eq!(base.get(0, "avg_selling_price"), Some(&n(15.0)));
        assert_eq!(base.get(0, "days_of_supply"), Some(&n(5.0)));
        assert_eq!(base.get(0, "lowest_competitor_price"), Some(&Value::Missing));
        assert_eq!(base.get(1, "lowest_competitor_price"), Some(&n(12.0)));
        assert_eq!(base.get(1, "avg_selling_price"), Some(&Value::Missing));
        assert_eq!(base.get(1, "avg_cpc"), Some(&Value::Missing));
        // pricing input untouched by the projection
        assert_eq!(p.get(0, "storage_fee"), Some(&Value::text("$1")));
    }

    #[test]
    fn test_duplicate_pricing_sku_is_fatal() {
        let mut p = pricing();
        let first = p.rows()[0].clone();
        p.push_row(first.into_iter().enumerate().map(|(i, v)| if i == 8 { n(1.0) } else { v }).collect());
        let (c, s, i, r, a) = (competitor(), sales_agg(), inventory(), returns(), ads_agg());

        let err = build_base_table(&JoinInputs {
            pricing: &p,
            competitor: &c,
            sales_agg: &s,
            inventory: &i,
            returns: &r,
            ads_agg: &a,
        })
        .unwrap_err();

        match err {
            PipelineError::JoinKeyDuplicate { table, sku } => {
                assert_eq!(table, "Pricing Data");
                assert_eq!(sku, "A");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_project_reports_missing_column() {
        let c = table(&["sku", "avg_competitor_price"], vec![]);
        assert!(matches!(
            project(&c, SourceKind::Competitor),
            Err(PipelineError::Schema { .. })
        ));
    }
}
