use serde::{Deserialize, Serialize};
use std::fmt;

/// Tunable limits of the pricing cascade.
///
/// Unit thresholds are counts, day thresholds are days, and the `*_pct`
/// fields are fractions (`0.05` means +5%). Margin percentages in the data
/// itself are whole numbers and are divided by 100 where they are used.
///
/// # Fields
/// * `fast_sales_threshold`: Units sold above which a sku counts as fast-moving
/// * `low_inventory_days`: Days of supply below which stock counts as low
/// * `high_returns_threshold`: 30-day returns above which a sku is investigated
/// * `price_increase_pct`: Markup applied when demand outruns stock
/// * `price_decrease_pct`: Reserved markdown, not used by the current cascade
/// * `competitor_match_pct`: Premium kept over the lowest competitor price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingThresholds {
    pub fast_sales_threshold: f64,
    pub low_inventory_days: f64,
    pub high_returns_threshold: f64,
    pub price_increase_pct: f64,
    pub price_decrease_pct: f64,
    pub competitor_match_pct: f64,
}

impl Default for PricingThresholds {
    fn default() -> Self {
        Self {
            fast_sales_threshold: 20.0,
            low_inventory_days: 15.0,
            high_returns_threshold: 10.0,
            price_increase_pct: 0.05,
            price_decrease_pct: 0.07,
            competitor_match_pct: 0.02,
        }
    }
}

/// The action recommended for a sku.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Recommendation {
    Investigate,
    IncreasePrice,
    DecreasePrice,
    MaintainPrice,
}

impl Recommendation {
    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::Investigate => "Investigate",
            Recommendation::IncreasePrice => "Increase Price",
            Recommendation::DecreasePrice => "Decrease Price",
            Recommendation::MaintainPrice => "Maintain Price",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Recommendation::Investigate => {
                "High return rate indicates possible quality or expectation issues. Pricing change not recommended."
            }
            Recommendation::IncreasePrice => {
                "Strong demand with low inventory. Price increased to improve margins and control stock."
            }
            Recommendation::DecreasePrice => {
                "Sales underperforming and competitors priced lower. Adjusting price to remain competitive."
            }
            Recommendation::MaintainPrice => {
                "Sales and inventory levels are stable. Current pricing is appropriate."
            }
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The fields of one base-table row that the cascade reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuMetrics {
    pub sku: String,
    pub total_cost: f64,
    pub minimum_acceptable_margin_pct: f64,
    pub target_gross_margin_pct: f64,
    pub avg_selling_price: f64,
    pub return_quantity_30d: f64,
    pub total_units_sold: f64,
    pub days_of_supply: f64,
    pub lowest_competitor_price: f64,
}

/// Outcome of the cascade for one sku. Prices are rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingDecision {
    pub recommendation: Recommendation,
    pub reason: String,
    pub recommended_price: f64,
    pub minimum_allowed_price: f64,
    pub ideal_price: f64,
}

/// Lowest price that still earns the minimum acceptable margin.
pub fn minimum_allowed_price(metrics: &SkuMetrics) -> f64 {
    metrics.total_cost * (1.0 + metrics.minimum_acceptable_margin_pct / 100.0)
}

/// Price that would earn the target gross margin.
pub fn target_price(metrics: &SkuMetrics) -> f64 {
    metrics.total_cost * (1.0 + metrics.target_gross_margin_pct / 100.0)
}

/// Rounds to two decimals on the value's exact decimal expansion.
///
/// `2.675` is stored as `2.67499...` and therefore becomes `2.67`; scaling by
/// 100 first would round the product `267.5` up instead.
pub fn round_to_cents(value: f64) -> f64 {
    format!("{:.2}", value).parse().unwrap_or(value)
}

/// Evaluates the pricing cascade for one sku.
///
/// Conditions are checked top to bottom and the first that holds decides:
/// 1. 30-day returns above `high_returns_threshold`: investigate, keep the
///    current average selling price
/// 2. Units sold above `fast_sales_threshold` with days of supply below
///    `low_inventory_days`: raise the current price by `price_increase_pct`
/// 3. Units sold below `fast_sales_threshold` with the lowest competitor
///    under the current price: move to the competitor price plus
///    `competitor_match_pct`
/// 4. Otherwise: maintain the current price
///
/// Branches 2 to 4 never go below [`minimum_allowed_price`]. The result
/// depends on `metrics` and `thresholds` alone.
///
/// # Arguments
/// * `metrics`: The sku's joined metrics
/// * `thresholds`: Cascade limits
///
/// # Returns
/// A [`PricingDecision`] with all prices rounded to 2 decimal places
pub fn evaluate(metrics: &SkuMetrics, thresholds: &PricingThresholds) -> PricingDecision {
    let min_price = minimum_allowed_price(metrics);
    let ideal_price = target_price(metrics);
    let current_price = metrics.avg_selling_price;

    let (recommendation, price) = if metrics.return_quantity_30d > thresholds.high_returns_threshold
    {
        (Recommendation::Investigate, current_price)
    } else if metrics.total_units_sold > thresholds.fast_sales_threshold
        && metrics.days_of_supply < thresholds.low_inventory_days
    {
        let raised = current_price * (1.0 + thresholds.price_increase_pct);
        (Recommendation::IncreasePrice, raised.max(min_price))
    } else if metrics.total_units_sold < thresholds.fast_sales_threshold
        && metrics.lowest_competitor_price < current_price
    {
        let matched = metrics.lowest_competitor_price * (1.0 + thresholds.competitor_match_pct);
        (Recommendation::DecreasePrice, matched.max(min_price))
    } else {
        (Recommendation::MaintainPrice, current_price.max(min_price))
    };

    PricingDecision {
        recommendation,
        reason: recommendation.reason().to_string(),
        recommended_price: round_to_cents(price),
        minimum_allowed_price: round_to_cents(min_price),
        ideal_price: round_to_cents(ideal_price),
    }
}
