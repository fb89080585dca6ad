use super::source::SourceKind;
use super::table::{Table, Value};
use crate::error::{DataIssue, PipelineError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Marker written into non-numeric cells the null handler fills.
pub const UNKNOWN_MARKER: &str = "unknown";

/// Columns whose normalized name contains one of these are treated as money
/// or percentage fields and coerced to numbers.
const NUMERIC_NAME_MARKERS: [&str; 3] = ["price", "cost", "margin"];

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

fn decoration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // currency symbols, percent signs, thousands separators, stray spaces
    RE.get_or_init(|| Regex::new(r"[\p{Sc}%,\s]").expect("valid decoration pattern"))
}

/// Normalizes a raw header.
///
/// Trims, lowercases, collapses any run of whitespace (newlines included) to
/// a single underscore and turns hyphens into underscores. Already-normalized
/// names come back unchanged.
pub fn normalize_column_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    whitespace_re()
        .replace_all(&lowered, "_")
        .replace('-', "_")
}

/// Parses a decorated numeric string such as `"₹1,234.50"` or `"12%"`.
///
/// Returns `None` when nothing numeric is left after stripping decoration.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    let stripped = decoration_re().replace_all(raw, "");
    if stripped.is_empty() {
        return None;
    }
    stripped.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn is_money_column(name: &str) -> bool {
    NUMERIC_NAME_MARKERS.iter().any(|marker| name.contains(marker))
}

/// Summary statistics for one column, logged by the normalizer.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub numeric: bool,
    pub present: usize,
    pub missing: usize,
    pub distinct: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

/// Schema and per-column statistics of a table.
#[derive(Debug, Clone, Serialize)]
pub struct TableProfile {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
}

/// Computes a [`TableProfile`] for `table`.
pub fn profile_table(table: &Table) -> TableProfile {
    let columns = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut distinct = HashSet::new();
            let mut numbers = Vec::new();
            let mut missing = 0;

            for value in table.column_values(idx) {
                match value {
                    Value::Missing => missing += 1,
                    Value::Number(n) => numbers.push(*n),
                    Value::Text(_) => {}
                }
                if let Some(key) = value.key() {
                    distinct.insert(key);
                }
            }

            let mean = if numbers.is_empty() {
                None
            } else {
                Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
            };

            ColumnProfile {
                name: name.clone(),
                numeric: table.is_numeric_column(idx),
                present: table.len() - missing,
                missing,
                distinct: distinct.len(),
                min: numbers.iter().copied().reduce(f64::min),
                max: numbers.iter().copied().reduce(f64::max),
                mean,
            }
        })
        .collect();

    TableProfile {
        rows: table.len(),
        columns,
    }
}

/// What the normalizer did to one table.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningReport {
    pub table_name: String,
    pub rows_before: usize,
    pub rows_after: usize,
    #[serde(skip)]
    pub issues: Vec<DataIssue>,
    pub profile: TableProfile,
}

/// A normalized table together with its [`CleaningReport`].
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub table: Table,
    pub report: CleaningReport,
}

/// Cleans one raw source table.
///
/// Steps, in order:
/// 1. Drop exact-duplicate rows
/// 2. Normalize column names with [`normalize_column_name`]
/// 3. Coerce to numbers every column whose name mentions price, cost or
///    margin, plus the numeric columns `source` declares
/// 4. Drop rows that coercion made identical (`"$1,000"` and `"1000"`)
/// 5. Verify the columns `source` requires are present
///
/// Values that cannot be parsed become missing and are reported as
/// [`DataIssue::Parse`] with their record position in `raw`; bad data never
/// fails the call. The output has no exact-duplicate rows, so normalizing it
/// again changes nothing.
///
/// # Arguments
/// * `raw`: The table as loaded; it is not modified
/// * `source`: Which dataset this is, for required columns and diagnostics
///
/// # Errors
/// Returns [`PipelineError::Schema`] if a required column is absent
pub fn normalize_table(raw: &Table, source: SourceKind) -> Result<CleanedTable> {
    let table_name = source.display_name();
    info!("===== {} =====", table_name);

    let rows_before = raw.len();
    let kept = raw.distinct_row_positions();
    let mut table = raw.take_rows(&kept).rename_columns(normalize_column_name);

    let declared: Vec<usize> = source
        .columns()
        .iter()
        .filter(|spec| spec.numeric)
        .filter_map(|spec| spec.resolve(&table))
        .collect();

    let numeric_cols: Vec<usize> = (0..table.columns().len())
        .filter(|idx| declared.contains(idx) || is_money_column(&table.columns()[*idx]))
        .collect();

    let mut issues = Vec::new();
    for idx in numeric_cols {
        let (coerced, found) = coerce_column(&table, idx, table_name, |row| kept[row] + 1);
        table = coerced;
        issues.extend(found);
    }

    let table = table.drop_duplicate_rows();
    let rows_after = table.len();
    info!(
        table = table_name,
        rows_before,
        rows_after,
        "Dropped {} duplicate rows",
        rows_before - rows_after
    );

    for spec in source.columns() {
        if spec.resolve(&table).is_none() {
            return Err(PipelineError::Schema {
                table: table_name.to_string(),
                column: spec.name.to_string(),
            });
        }
    }

    let profile = profile_table(&table);
    info!(
        table = table_name,
        schema = ?table.columns(),
        parse_failures = issues.len(),
        "normalized"
    );
    for column in &profile.columns {
        debug!(table = table_name, ?column, "column profile");
    }

    Ok(CleanedTable {
        table,
        report: CleaningReport {
            table_name: table_name.to_string(),
            rows_before,
            rows_after,
            issues,
            profile,
        },
    })
}

/// Coerces one column to numbers, reporting each cell that will not parse.
///
/// # Arguments
/// * `table`: Table holding the column
/// * `idx`: Index of the column to coerce
/// * `table_name`: Used in issues and log lines
/// * `record_of`: Maps a row of `table` to the record position reported in
///   [`DataIssue::Parse`]
pub fn coerce_column<R>(
    table: &Table,
    idx: usize,
    table_name: &str,
    record_of: R,
) -> (Table, Vec<DataIssue>)
where
    R: Fn(usize) -> usize,
{
    let column = table.columns()[idx].clone();
    let mut issues = Vec::new();

    let coerced = table.map_column(idx, |row, value| match value {
        Value::Text(raw) => match coerce_numeric(raw) {
            Some(n) => Value::Number(n),
            None => {
                let issue = DataIssue::Parse {
                    table: table_name.to_string(),
                    column: column.clone(),
                    record: record_of(row),
                    value: raw.clone(),
                };
                warn!("{}", issue);
                issues.push(issue);
                Value::Missing
            }
        },
        other => other.clone(),
    });

    (coerced, issues)
}

/// Replaces missing values so that aggregation sees every row.
///
/// Numeric columns get `0`, every other column gets [`UNKNOWN_MARKER`].
/// Returns the filled copy and the number of cells that were filled.
pub fn fill_missing(table: &Table, table_name: &str) -> (Table, usize) {
    info!("--- Handling Nulls: {} ---", table_name);

    let mut filled = 0;
    let mut out = table.clone();
    for idx in 0..table.columns().len() {
        let replacement = if table.is_numeric_column(idx) {
            Value::Number(0.0)
        } else {
            Value::text(UNKNOWN_MARKER)
        };
        out = out.map_column(idx, |_, value| {
            if value.is_missing() {
                filled += 1;
                replacement.clone()
            } else {
                value.clone()
            }
        });
    }

    info!(table = table_name, filled, "Nulls handled successfully");
    (out, filled)
}
