use crate::config::PipelineConfig;
use crate::data::{
    aggregate_ads, aggregate_sales, build_base_table, fill_missing, normalize_table, save_table,
    JoinInputs, SourceKind, SourceTables, Table, TableLoader,
};
use crate::error::{DataIssue, PipelineError, Result};
use crate::pricing::PricingEngine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

pub const STAGE_NORMALIZE: &str = "normalize";
pub const STAGE_JOIN: &str = "join";
pub const STAGE_PRICING: &str = "pricing";

/// Per-source row counts of a run.
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub rows_loaded: usize,
    pub rows_after_dedup: usize,
    pub parse_failures: usize,
}

/// End-of-run diagnostics.
///
/// Records how many rows each source contributed, how many rows each stage
/// found a problem in, every such problem, and how the recommendations were
/// distributed.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub tables: Vec<TableSummary>,
    pub nulls_filled: BTreeMap<String, usize>,
    pub rows_affected: BTreeMap<String, usize>,
    pub issues: Vec<String>,
    pub base_rows: usize,
    pub priced_rows: usize,
    pub skipped_rows: usize,
    pub recommendations: BTreeMap<String, usize>,
    pub base_table_path: Option<PathBuf>,
    pub final_table_path: Option<PathBuf>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            tables: Vec::new(),
            nulls_filled: BTreeMap::new(),
            rows_affected: [STAGE_NORMALIZE, STAGE_JOIN, STAGE_PRICING]
                .iter()
                .map(|stage| (stage.to_string(), 0))
                .collect(),
            issues: Vec::new(),
            base_rows: 0,
            priced_rows: 0,
            skipped_rows: 0,
            recommendations: BTreeMap::new(),
            base_table_path: None,
            final_table_path: None,
        }
    }

    /// Adds the issues of one stage. A row with several bad values counts once
    /// towards that stage's `rows_affected`.
    fn record_issues(&mut self, stage: &str, issues: &[DataIssue]) {
        let rows: HashSet<String> = issues.iter().map(DataIssue::row_key).collect();
        *self.rows_affected.entry(stage.to_string()).or_insert(0) += rows.len();
        self.issues
            .extend(issues.iter().map(|issue| format!("[{}] {}", stage, issue)));
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs every stage up to and including the join.
///
/// 1. Normalize each source
/// 2. Fill missing values in sales and ads
/// 3. Aggregate sales and ads per sku
/// 4. Join everything onto the pricing table
///
/// # Errors
/// Aborts on the first schema or duplicate-sku problem
pub fn prepare_base_table(sources: &SourceTables, summary: &mut RunSummary) -> Result<Table> {
    let mut cleaned: BTreeMap<SourceKind, Table> = BTreeMap::new();

    for kind in SourceKind::ALL {
        let result = normalize_table(sources.get(kind)?, kind)?;
        summary.tables.push(TableSummary {
            name: result.report.table_name.clone(),
            rows_loaded: result.report.rows_before,
            rows_after_dedup: result.report.rows_after,
            parse_failures: result.report.issues.len(),
        });
        summary.record_issues(STAGE_NORMALIZE, &result.report.issues);

        let table = if kind.fills_nulls() {
            let (filled, count) = fill_missing(&result.table, kind.display_name());
            summary.nulls_filled.insert(kind.display_name().to_string(), count);
            filled
        } else {
            result.table
        };
        cleaned.insert(kind, table);
    }

    // every source was inserted by the loop above
    let sales_agg = aggregate_sales(&cleaned[&SourceKind::Sales])?;
    let ads_agg = aggregate_ads(&cleaned[&SourceKind::Ads])?;

    let outcome = build_base_table(&JoinInputs {
        pricing: &cleaned[&SourceKind::Pricing],
        competitor: &cleaned[&SourceKind::Competitor],
        sales_agg: &sales_agg,
        inventory: &cleaned[&SourceKind::Inventory],
        returns: &cleaned[&SourceKind::Returns],
        ads_agg: &ads_agg,
    })?;
    summary.record_issues(STAGE_JOIN, &outcome.issues);
    summary.base_rows = outcome.table.len();

    Ok(outcome.table)
}

/// Prices the base table and records the outcome in `summary`.
pub fn price_base_table(base: &Table, engine: &PricingEngine, summary: &mut RunSummary) -> Table {
    let priced = engine.apply(base);

    summary.record_issues(STAGE_PRICING, &priced.issues);
    summary.skipped_rows = priced.skipped();
    summary.priced_rows = base.len() - priced.skipped();
    summary.recommendations = priced
        .recommendations
        .iter()
        .map(|(rec, count)| (rec.label().to_string(), *count))
        .collect();

    priced.table
}

/// Runs the whole pipeline end to end.
///
/// Loads the six sources, builds and persists the base table, reloads it,
/// prices it, persists the priced table and a JSON run summary.
///
/// # Errors
/// Fails on unreadable inputs, structural problems in the data, or when an
/// output cannot be written
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let mut summary = RunSummary::new();
    let loader = TableLoader::new();
    let paths = &config.paths;

    let sources = SourceTables::load(&loader, |kind| paths.input(kind))?;
    let base = prepare_base_table(&sources, &mut summary)?;

    let base_path = paths.base_table();
    save_table(&base, &base_path)?;
    summary.base_table_path = Some(base_path.clone());

    let base = loader.load(&base_path)?;
    info!(rows = base.len(), columns = base.columns().len(), "base table reloaded");

    let engine = PricingEngine::new(config.thresholds, config.emit_reference_prices);
    let priced = price_base_table(&base, &engine, &mut summary);

    let final_path = paths.final_table();
    save_table(&priced, &final_path)?;
    summary.final_table_path = Some(final_path);

    let summary_path = paths.summary();
    let file = File::create(&summary_path).map_err(|source| PipelineError::Io {
        path: summary_path.display().to_string(),
        source,
    })?;
    serde_json::to_writer_pretty(file, &summary)?;
    info!(path = %summary_path.display(), "run summary saved");

    Ok(summary)
}
