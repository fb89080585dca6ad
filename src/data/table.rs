use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A single cell of a [`Table`].
///
/// Cells are either absent, numeric or free text. Loading decides which of
/// the three a raw cell becomes; later stages only ever turn text into numbers
/// or fill missing cells, they never guess types on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Renders the value as a join/group key.
    ///
    /// Missing cells have no key and never match anything.
    pub fn key(&self) -> Option<String> {
        match self {
            Value::Missing => None,
            Value::Number(n) => Some(n.to_string()),
            Value::Text(s) => Some(s.clone()),
        }
    }

    /// Renders the value the way it is written to a CSV cell.
    pub fn render(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    // Exact identity used for duplicate-row detection. Numbers compare by bit
    // pattern so 1 and 1.0 collapse but text "1" and number 1 do not.
    fn fingerprint(&self) -> String {
        match self {
            Value::Missing => "m:".to_string(),
            Value::Number(n) => format!("n:{}", n.to_bits()),
            Value::Text(s) => format!("t:{}", s),
        }
    }
}

/// An immutable-by-convention, column-named, row-major table.
///
/// Every row has exactly `columns.len()` cells. Column names may repeat
/// (a join can produce that); lookups by name always resolve to the leftmost
/// occurrence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from rows, padding short rows with missing cells and
    /// truncating long ones to the header width.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Missing);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Looks up a column that must exist.
    ///
    /// # Errors
    /// Returns [`PipelineError::Schema`] naming `table_name` and the column
    pub fn require_column(&self, table_name: &str, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| PipelineError::Schema {
            table: table_name.to_string(),
            column: name.to_string(),
        })
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// A column is numeric when none of its present cells hold text.
    /// A column with nothing but missing cells counts as numeric.
    pub fn is_numeric_column(&self, idx: usize) -> bool {
        self.column_values(idx).all(|v| !matches!(v, Value::Text(_)))
    }

    /// Returns a copy with every cell of column `idx` replaced by `f(row, cell)`.
    pub fn map_column<F>(&self, idx: usize, mut f: F) -> Table
    where
        F: FnMut(usize, &Value) -> Value,
    {
        let mut out = self.clone();
        for (row_idx, row) in out.rows.iter_mut().enumerate() {
            row[idx] = f(row_idx, &row[idx]);
        }
        out
    }

    /// Returns a copy with every column renamed through `f`.
    pub fn rename_columns<F>(&self, f: F) -> Table
    where
        F: Fn(&str) -> String,
    {
        Table {
            columns: self.columns.iter().map(|c| f(c)).collect(),
            rows: self.rows.clone(),
        }
    }

    /// Returns a copy with a new column appended on the right.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Table {
        let mut out = self.clone();
        out.columns.push(name.to_string());
        let mut values = values.into_iter();
        for row in out.rows.iter_mut() {
            row.push(values.next().unwrap_or(Value::Missing));
        }
        out
    }

    /// Projects the given column indices under new names, in the given order.
    pub fn select(&self, picks: &[(usize, String)]) -> Table {
        let columns = picks.iter().map(|(_, name)| name.clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| picks.iter().map(|(idx, _)| row[*idx].clone()).collect())
            .collect();
        Table { columns, rows }
    }

    /// Positions of the rows that are not exact copies of an earlier row.
    pub fn distinct_row_positions(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| seen.insert(row.iter().map(Value::fingerprint).collect::<Vec<_>>()))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Returns a copy holding only the rows at `positions`, in that order.
    pub fn take_rows(&self, positions: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: positions.iter().map(|&idx| self.rows[idx].clone()).collect(),
        }
    }

    /// Removes rows that are exact copies of an earlier row, keeping the first.
    pub fn drop_duplicate_rows(&self) -> Table {
        self.take_rows(&self.distinct_row_positions())
    }

    /// Drops every column whose name already appeared further left.
    pub fn collapse_duplicate_columns(&self) -> Table {
        let mut seen = HashSet::new();
        let keep: Vec<(usize, String)> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| seen.insert(name.to_string()))
            .map(|(idx, name)| (idx, name.clone()))
            .collect();
        if keep.len() == self.columns.len() {
            return self.clone();
        }
        self.select(&keep)
    }

    /// Returns the first key that occurs on more than one row of `column`.
    pub fn first_duplicate_key(&self, column: usize) -> Option<String> {
        let mut seen = HashSet::new();
        self.column_values(column)
            .filter_map(Value::key)
            .find(|key| !seen.insert(key.clone()))
    }

    /// Left outer join of `self` (the anchor) with `right` on `key`.
    ///
    /// Every anchor row appears exactly once and in its input order.
    /// Right-hand columns other than the key are appended; anchor rows without a
    /// match get missing cells for them. Columns whose names collide with ones
    /// already present are collapsed, keeping the leftmost.
    ///
    /// # Arguments
    /// * `right`: Table joined onto the anchor, keys must be unique
    /// * `key`: Column name present in both tables
    /// * `right_name`: Name of the right table, used in error messages
    ///
    /// # Errors
    /// - [`PipelineError::Schema`] when either side lacks `key`
    /// - [`PipelineError::JoinKeyDuplicate`] when `right` repeats a key
    pub fn left_join(&self, right: &Table, key: &str, right_name: &str) -> Result<Table> {
        let left_key = self.require_column("join anchor", key)?;
        let right_key = right.require_column(right_name, key)?;

        let mut index: HashMap<String, usize> = HashMap::with_capacity(right.len());
        for (row_idx, row) in right.rows.iter().enumerate() {
            if let Some(k) = row[right_key].key() {
                if index.insert(k.clone(), row_idx).is_some() {
                    return Err(PipelineError::JoinKeyDuplicate {
                        table: right_name.to_string(),
                        sku: k,
                    });
                }
            }
        }

        let right_cols: Vec<usize> = (0..right.columns.len())
            .filter(|&idx| idx != right_key)
            .collect();

        let mut columns = self.columns.clone();
        columns.extend(right_cols.iter().map(|&idx| right.columns[idx].clone()));

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let matched = row[left_key].key().and_then(|k| index.get(&k).copied());
                let mut joined = row.clone();
                joined.extend(right_cols.iter().map(|&idx| match matched {
                    Some(r) => right.rows[r][idx].clone(),
                    None => Value::Missing,
                }));
                joined
            })
            .collect();

        Ok(Table { columns, rows }.collapse_duplicate_columns())
    }
}
