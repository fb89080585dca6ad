pub mod aggregation;
pub mod ingestion;
pub mod join;
pub mod processing;
pub mod source;
pub mod table;

pub use aggregation::{aggregate_ads, aggregate_sales};
pub use ingestion::{save_table, SourceTables, TableLoader};
pub use join::{build_base_table, JoinInputs};
pub use processing::{fill_missing, normalize_table};
pub use source::SourceKind;
pub use table::Table;
