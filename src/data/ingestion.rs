use super::processing::normalize_column_name;
use super::source::SourceKind;
use super::table::{Table, Value};
use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Cell spellings read as "no value", matching what spreadsheet exports emit.
const MISSING_SPELLINGS: [&str; 9] = ["", "na", "n/a", "nan", "-nan", "null", "none", "#n/a", "<na>"];

/// Reads CSV files into [`Table`]s.
///
/// The loader only decides the basic shape of each cell: empty and NA-style
/// cells become [`Value::Missing`], cells that parse as plain numbers become
/// [`Value::Number`], everything else stays [`Value::Text`]. Decorated numbers
/// like `"$1,200"` stay text here; cleaning them is the normalizer's job.
///
/// # Key Features
/// * Header row required, header order free
/// * All fields trimmed
/// * Short rows padded with missing cells
/// * Identifier columns (by default `sku`) are never parsed as numbers
pub struct TableLoader {
    text_columns: Vec<String>,
}

impl Default for TableLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableLoader {
    /// Creates a loader that keeps the `sku` column as text.
    pub fn new() -> Self {
        Self {
            text_columns: vec!["sku".to_string()],
        }
    }

    /// Reads a table from any CSV byte source.
    ///
    /// # Arguments
    /// * `reader`: CSV data, header row first
    ///
    /// # Errors
    /// Returns an error if the CSV itself is malformed (bad quoting, invalid UTF-8)
    pub fn read<R: Read>(&self, reader: R) -> Result<Table> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let keep_text: Vec<bool> = headers
            .iter()
            .map(|h| self.text_columns.contains(&normalize_column_name(h)))
            .collect();

        let mut table = Table::new(headers);
        for record in rdr.records() {
            let record = record?;
            let row = record
                .iter()
                .enumerate()
                .map(|(idx, raw)| parse_cell(raw, keep_text.get(idx).copied().unwrap_or(false)))
                .collect();
            table.push_row(row);
        }

        Ok(table)
    }

    /// Loads a table from a CSV file on disk.
    ///
    /// # Errors
    /// Returns [`PipelineError::Io`] carrying the path if the file cannot be opened
    pub fn load(&self, path: &Path) -> Result<Table> {
        let file = File::open(path).map_err(|source| PipelineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = self.read(file)?;
        info!(
            path = %path.display(),
            rows = table.len(),
            columns = table.columns().len(),
            "loaded table"
        );
        if table.is_empty() {
            warn!(path = %path.display(), "table has a header but no data rows");
        }
        Ok(table)
    }
}

fn parse_cell(raw: &str, keep_text: bool) -> Value {
    if MISSING_SPELLINGS.contains(&raw.to_lowercase().as_str()) {
        return Value::Missing;
    }
    if keep_text {
        return Value::text(raw);
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::Number(n),
        _ => Value::text(raw),
    }
}

/// Writes `table` as CSV with a header row. Missing cells are written empty.
pub fn write_table<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(Value::render))?;
    }
    wtr.flush().map_err(|source| PipelineError::Io {
        path: "<csv writer>".to_string(),
        source,
    })?;
    Ok(())
}

/// Persists `table` to `path`, creating parent directories as needed.
pub fn save_table(table: &Table, path: &Path) -> Result<()> {
    let io_err = |source| PipelineError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = File::create(path).map_err(io_err)?;
    write_table(table, file)?;
    info!(path = %path.display(), rows = table.len(), "CSV saved");
    Ok(())
}

/// The six raw datasets, exactly as loaded.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub tables: BTreeMap<SourceKind, Table>,
}

impl SourceTables {
    /// Loads every source through `loader`, resolving file paths with `path_for`.
    ///
    /// # Errors
    /// Fails on the first source that cannot be read
    pub fn load<F>(loader: &TableLoader, path_for: F) -> Result<Self>
    where
        F: Fn(SourceKind) -> std::path::PathBuf,
    {
        let mut tables = BTreeMap::new();
        for kind in SourceKind::ALL {
            tables.insert(kind, loader.load(&path_for(kind))?);
        }
        Ok(Self { tables })
    }

    /// Returns the table for `kind`.
    ///
    /// # Errors
    /// Returns [`PipelineError::Io`] when that source was never loaded
    pub fn get(&self, kind: SourceKind) -> Result<&Table> {
        self.tables.get(&kind).ok_or_else(|| PipelineError::Io {
            path: kind.default_file_name().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "source table not loaded"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
SKU ,Product Role,Cost,Minimum Acceptable Margin %
00123, Hero ,\"₹1,234.50\",20%
B-2,,12.5,N/A
C-3,Filler,abc
";

    #[test]
    fn test_read_infers_cell_shapes() {
        let table = TableLoader::new().read(SAMPLE_CSV.as_bytes()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.columns()[0], "SKU");
        assert_eq!(table.rows()[0][0], Value::text("00123"));
        assert_eq!(table.rows()[0][1], Value::text("Hero"));
        assert_eq!(table.rows()[0][2], Value::text("₹1,234.50"));
        assert_eq!(table.rows()[1][1], Value::Missing);
        assert_eq!(table.rows()[1][2], Value::Number(12.5));
        assert_eq!(table.rows()[1][3], Value::Missing);
        // short row padded
        assert_eq!(table.rows()[2][3], Value::Missing);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        let table = Table::from_rows(
            vec!["sku".into(), "price".into(), "note".into()],
            vec![
                vec![Value::text("007"), Value::Number(12.24), Value::text("a, b")],
                vec![Value::text("X"), Value::Missing, Value::text("plain")],
            ],
        );

        save_table(&table, &path).unwrap();
        let reloaded = TableLoader::new().load(&path).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_load_header_only_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "SKU,Cost\n").unwrap();

        let table = TableLoader::new().load(&path).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = TableLoader::new()
            .load(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }
}
