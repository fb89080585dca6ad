use crate::data::SourceKind;
use crate::error::{PipelineError, Result};
use crate::pricing::PricingThresholds;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const BASE_TABLE_FILE: &str = "final_pricing_base_table.csv";
pub const FINAL_TABLE_FILE: &str = "final_pricing_with_recommendations.csv";
pub const SUMMARY_FILE: &str = "pricing_run_summary.json";

/// Where inputs are read from and outputs written to.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    input_files: Vec<(SourceKind, String)>,
}

impl DataPaths {
    pub fn input(&self, kind: SourceKind) -> PathBuf {
        let file = self
            .input_files
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, f)| f.as_str())
            .unwrap_or_else(|| kind.default_file_name());
        self.data_dir.join(file)
    }

    pub fn base_table(&self) -> PathBuf {
        self.output_dir.join(BASE_TABLE_FILE)
    }

    pub fn final_table(&self) -> PathBuf {
        self.output_dir.join(FINAL_TABLE_FILE)
    }

    pub fn summary(&self) -> PathBuf {
        self.output_dir.join(SUMMARY_FILE)
    }
}

/// Everything a pricing run can be configured with.
///
/// Values come from the environment (a `.env` file is honoured by `main`).
/// Unset variables take their defaults:
///
/// | Variable | Default |
/// |---|---|
/// | `PRICING_DATA_DIR` | `data` |
/// | `PRICING_OUTPUT_DIR` | same as data dir |
/// | `PRICING_FILE_<SOURCE>` | the source's standard export name |
/// | `FAST_SALES_THRESHOLD` | 20 |
/// | `LOW_INVENTORY_DAYS` | 15 |
/// | `HIGH_RETURNS_THRESHOLD` | 10 |
/// | `PRICE_INCREASE_PCT` | 0.05 |
/// | `PRICE_DECREASE_PCT` | 0.07 |
/// | `COMPETITOR_MATCH_PCT` | 0.02 |
/// | `PRICING_EMIT_REFERENCE_PRICES` | false |
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub paths: DataPaths,
    pub thresholds: PricingThresholds,
    pub emit_reference_prices: bool,
}

impl PipelineConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] when a variable is set but cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = PathBuf::from(lookup("PRICING_DATA_DIR").unwrap_or_else(|| "data".into()));
        let output_dir = lookup("PRICING_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.clone());
        let input_files = SourceKind::ALL
            .iter()
            .filter_map(|kind| lookup(kind.file_env_var()).map(|f| (*kind, f)))
            .collect();

        let defaults = PricingThresholds::default();
        let thresholds = PricingThresholds {
            fast_sales_threshold: parse_or(&lookup, "FAST_SALES_THRESHOLD", defaults.fast_sales_threshold)?,
            low_inventory_days: parse_or(&lookup, "LOW_INVENTORY_DAYS", defaults.low_inventory_days)?,
            high_returns_threshold: parse_or(
                &lookup,
                "HIGH_RETURNS_THRESHOLD",
                defaults.high_returns_threshold,
            )?,
            price_increase_pct: parse_or(&lookup, "PRICE_INCREASE_PCT", defaults.price_increase_pct)?,
            price_decrease_pct: parse_or(&lookup, "PRICE_DECREASE_PCT", defaults.price_decrease_pct)?,
            competitor_match_pct: parse_or(
                &lookup,
                "COMPETITOR_MATCH_PCT",
                defaults.competitor_match_pct,
            )?,
        };

        Ok(Self {
            paths: DataPaths {
                data_dir,
                output_dir,
                input_files,
            },
            thresholds,
            emit_reference_prices: parse_or(&lookup, "PRICING_EMIT_REFERENCE_PRICES", false)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PipelineError::Config(format!("{key}={raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.thresholds, PricingThresholds::default());
        assert!(!config.emit_reference_prices);
        assert_eq!(
            config.paths.input(SourceKind::Sales),
            PathBuf::from("data/Historical_Sales.csv")
        );
        assert_eq!(
            config.paths.final_table(),
            PathBuf::from("data/final_pricing_with_recommendations.csv")
        );
    }

    #[test]
    fn test_overrides() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("PRICING_DATA_DIR", "/in"),
            ("PRICING_OUTPUT_DIR", "/out"),
            ("PRICING_FILE_ADS", "ads.csv"),
            ("FAST_SALES_THRESHOLD", " 35 "),
            ("PRICE_INCREASE_PCT", "0.1"),
            ("PRICING_EMIT_REFERENCE_PRICES", "true"),
        ]))
        .unwrap();

        assert_eq!(config.paths.input(SourceKind::Ads), PathBuf::from("/in/ads.csv"));
        assert_eq!(config.paths.base_table(), PathBuf::from("/out/final_pricing_base_table.csv"));
        assert_eq!(config.thresholds.fast_sales_threshold, 35.0);
        assert_eq!(config.thresholds.price_increase_pct, 0.1);
        assert_eq!(config.thresholds.low_inventory_days, 15.0);
        assert!(config.emit_reference_prices);
    }

    #[test]
    fn test_unparseable_value_is_config_error() {
        let err = PipelineConfig::from_lookup(lookup_from(&[("LOW_INVENTORY_DAYS", "fifteen")]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(msg) if msg.contains("LOW_INVENTORY_DAYS")));
    }
}
