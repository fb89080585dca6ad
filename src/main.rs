mod config;
mod data;
mod error;
mod pipeline;
mod pricing;

use anyhow::Context;
use config::PipelineConfig;
use dotenv::dotenv;
use pipeline::RunSummary;

/// Prints the outcome of a pricing run.
///
/// Shows where the artifacts were written, how many rows each source
/// contributed, the recommendation mix and every value or row a stage had
/// to give up on.
///
/// # Arguments
/// * `summary`: The summary returned by [`pipeline::run`]
fn print_summary(summary: &RunSummary) {
    println!("\nPricing Run Summary ({})", summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));

    println!("\nSources:");
    for table in &summary.tables {
        println!(
            "  {:<18} loaded {:>6}  after dedup {:>6}  unparseable values {:>4}",
            table.name, table.rows_loaded, table.rows_after_dedup, table.parse_failures
        );
    }
    for (table, filled) in &summary.nulls_filled {
        println!("  {:<18} nulls filled {}", table, filled);
    }

    println!("\nBase table rows: {}", summary.base_rows);
    println!("Priced rows: {}", summary.priced_rows);
    println!("Skipped rows: {}", summary.skipped_rows);

    println!("\nRecommendations:");
    for (recommendation, count) in &summary.recommendations {
        println!("  {:<16} {}", recommendation, count);
    }

    println!("\nRows with issues per stage:");
    for (stage, count) in &summary.rows_affected {
        println!("  {:<10} {}", stage, count);
    }
    for issue in &summary.issues {
        println!("  {}", issue);
    }

    if let Some(path) = &summary.base_table_path {
        println!("\nBase table saved at: {}", path.display());
    }
    if let Some(path) = &summary.final_table_path {
        println!("Recommendations saved at: {}", path.display());
    }
}

/// Entry point of the pricing adjustment pipeline.
///
/// 1. Initialize logging and load `.env`
/// 2. Read configuration from the environment
/// 3. Run the pipeline end to end
/// 4. Print the run summary
///
/// # Returns
/// Returns `Ok(())` when the run completes, otherwise the error that aborted it
fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file
    dotenv().ok();

    let config = PipelineConfig::from_env().context("invalid pricing configuration")?;
    tracing::info!(
        data_dir = %config.paths.data_dir.display(),
        output_dir = %config.paths.output_dir.display(),
        thresholds = ?config.thresholds,
        "starting pricing run"
    );

    let summary = pipeline::run(&config).context("pricing run aborted")?;
    print_summary(&summary);

    Ok(())
}
