pub mod engine;
pub mod rules;

pub use engine::PricingEngine;
pub use rules::PricingThresholds;
