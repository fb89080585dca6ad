use thiserror::Error;

/// Errors that abort a pricing run.
///
/// Structural problems with an input (a required column that is not there,
/// a key that is not unique) are reported with the table and column or sku
/// that caused them, so the message alone tells the operator which file to fix.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{table}: required column '{column}' not found")]
    Schema { table: String, column: String },

    #[error("{table}: sku '{sku}' appears more than once, joins require unique skus")]
    JoinKeyDuplicate { table: String, sku: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Problems confined to a single value or row.
///
/// These never abort the run. The stage that finds one records it, logs it
/// and carries on with a missing value or an unpriced row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataIssue {
    /// `record` is the 1-based position of the data record in the table as
    /// loaded, header excluded, so record 1 is the line after the header.
    #[error(
        "{table}: could not parse {value:?} in column '{column}' (data record {record}) as a number"
    )]
    Parse {
        table: String,
        column: String,
        record: usize,
        value: String,
    },

    #[error("sku '{sku}': required field '{field}' is missing")]
    MissingField { sku: String, field: String },
}

impl DataIssue {
    /// Identifies the row the issue is about. Two issues on the same row
    /// share a key.
    pub fn row_key(&self) -> String {
        match self {
            DataIssue::Parse { table, record, .. } => format!("{}#{}", table, record),
            DataIssue::MissingField { sku, .. } => sku.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_issue_names_record() {
        let issue = DataIssue::Parse {
            table: "Historical Sales".to_string(),
            column: "units_ordered".to_string(),
            record: 3,
            value: "abc".to_string(),
        };
        assert_eq!(
            issue.to_string(),
            "Historical Sales: could not parse \"abc\" in column 'units_ordered' (data record 3) as a number"
        );
        assert_eq!(issue.row_key(), "Historical Sales#3");
    }
}
