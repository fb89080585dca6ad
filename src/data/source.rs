use super::table::Table;
use serde::Serialize;
use std::fmt;

/// A column a source table must provide.
///
/// `name` is the canonical (post-normalization) name used from the join
/// onwards. `aliases` are other normalized header spellings that the source
/// exports are known to use for the same data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub numeric: bool,
}

impl ColumnSpec {
    const fn text(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            numeric: false,
        }
    }

    const fn number(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            numeric: true,
        }
    }

    const fn number_or(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            name,
            aliases,
            numeric: true,
        }
    }

    /// Finds the column in `table`, trying the canonical name first.
    pub fn resolve(&self, table: &Table) -> Option<usize> {
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .find_map(|candidate| table.column_index(candidate))
    }
}

const PRICING_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("sku"),
    ColumnSpec::text("product_role"),
    ColumnSpec::number("cost"),
    ColumnSpec::number("fba_fee"),
    ColumnSpec::number("storage_fee"),
    ColumnSpec::number("handling_cost"),
    ColumnSpec::number_or(
        "minimum_acceptable_margin_pct",
        &["minimum_acceptable_margin_%", "minimum_acceptable_margin"],
    ),
    ColumnSpec::number_or(
        "target_gross_margin_pct",
        &["target_gross_margin_%", "target_gross_margin"],
    ),
];

const COMPETITOR_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("sku"),
    ColumnSpec::number("avg_competitor_price"),
    ColumnSpec::number("lowest_competitor_price"),
    ColumnSpec::number("highest_competitor_price"),
    ColumnSpec::number("competitor_count"),
];

const SALES_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("sku"),
    ColumnSpec::number("units_ordered"),
    ColumnSpec::number("ordered_product_sales"),
];

const INVENTORY_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("sku"),
    ColumnSpec::number("available"),
    ColumnSpec::number("total_inventory"),
    ColumnSpec::number("days_of_supply"),
    ColumnSpec::number("weeks_of_cover_t30"),
    ColumnSpec::number("weeks_of_cover_t90"),
];

const RETURNS_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("sku"),
    ColumnSpec::number_or(
        "return_quantity_30d",
        &["return_quantity_(last_30_days)", "return_quantity__(last_30_days)"],
    ),
    ColumnSpec::number_or(
        "return_quantity_60d",
        &["return_quantity_(last_60_days)", "return_quantity__(last_60_days)"],
    ),
    ColumnSpec::number_or(
        "return_quantity_90d",
        &["return_quantity_(last_90_days)", "return_quantity__(last_90_days)"],
    ),
];

const ADS_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("sku"),
    ColumnSpec::number("spend"),
    ColumnSpec::number("clicks"),
    ColumnSpec::number("impressions"),
    ColumnSpec::number("costperclick"),
    ColumnSpec::number("sales30d"),
];

/// The six datasets the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SourceKind {
    Pricing,
    Competitor,
    Sales,
    Inventory,
    Returns,
    Ads,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Pricing,
        SourceKind::Competitor,
        SourceKind::Sales,
        SourceKind::Inventory,
        SourceKind::Returns,
        SourceKind::Ads,
    ];

    /// Human-readable name used in logs and error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::Pricing => "Pricing Data",
            SourceKind::Competitor => "Competitor Data",
            SourceKind::Sales => "Historical Sales",
            SourceKind::Inventory => "Inventory Health",
            SourceKind::Returns => "Returns Data",
            SourceKind::Ads => "Ads Performance",
        }
    }

    pub fn default_file_name(&self) -> &'static str {
        match self {
            SourceKind::Pricing => "Pricing_Data.csv",
            SourceKind::Competitor => "Competitor_Data.csv",
            SourceKind::Sales => "Historical_Sales.csv",
            SourceKind::Inventory => "Inventory_Health.csv",
            SourceKind::Returns => "Returns_Data.csv",
            SourceKind::Ads => "Ads_Performance.csv",
        }
    }

    /// Environment variable that overrides this source's file name.
    pub fn file_env_var(&self) -> &'static str {
        match self {
            SourceKind::Pricing => "PRICING_FILE_PRICING",
            SourceKind::Competitor => "PRICING_FILE_COMPETITOR",
            SourceKind::Sales => "PRICING_FILE_SALES",
            SourceKind::Inventory => "PRICING_FILE_INVENTORY",
            SourceKind::Returns => "PRICING_FILE_RETURNS",
            SourceKind::Ads => "PRICING_FILE_ADS",
        }
    }

    /// Columns that must be present once headers are normalized.
    ///
    /// For pricing, competitor, inventory and returns this is also the
    /// projection carried into the base table. For sales and ads it is the
    /// raw input of the per-sku aggregation.
    pub fn columns(&self) -> &'static [ColumnSpec] {
        match self {
            SourceKind::Pricing => PRICING_COLUMNS,
            SourceKind::Competitor => COMPETITOR_COLUMNS,
            SourceKind::Sales => SALES_COLUMNS,
            SourceKind::Inventory => INVENTORY_COLUMNS,
            SourceKind::Returns => RETURNS_COLUMNS,
            SourceKind::Ads => ADS_COLUMNS,
        }
    }

    /// Sources whose missing values are filled before aggregation.
    pub fn fills_nulls(&self) -> bool {
        matches!(self, SourceKind::Sales | SourceKind::Ads)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
