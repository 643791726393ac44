//! Savings hints, market comparison and report notes.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use takeoff_common::DrawingType;

use crate::{
    aggregate::{AggregatorConfig, CostBreakdown, CostCategory, CostItem},
    context::ProjectContext,
    money::{decimal_from_f64, round_half_up, share_percent},
};

/// Ways to lower the estimate, most specific first
pub fn savings_opportunities(breakdown: &CostBreakdown) -> Vec<String> {
    let mut savings = Vec::new();
    let total = breakdown.total_excl_vat;

    if share_percent(breakdown.subtotal(CostCategory::Labor), total) > dec!(35) {
        savings.push("Consider prefabricated elements to reduce labor costs".to_string());
    }

    let mut materials: Vec<&CostItem> = breakdown.material_costs.iter().collect();
    materials.sort_by(|a, b| b.total_price.cmp(&a.total_price));
    for item in materials.iter().take(3).filter(|item| item.total_price > dec!(10000)) {
        savings.push(format!(
            "Investigate alternatives for {} (EUR {})",
            item.description, item.total_price
        ));
    }

    if share_percent(breakdown.subtotal(CostCategory::Overhead), total) > dec!(30) {
        savings.push("Overhead share is high, review project management".to_string());
    }

    savings.push("Request several quotes for the largest items".to_string());
    savings.push("Consider bulk purchasing for frequently used materials".to_string());
    savings
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize,
    Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MarketPosition {
    Above,
    AtMarket,
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketComparison {
    pub category: CostCategory,
    pub calculated: Decimal,
    pub market_average: Decimal,
    /// Positive when the estimate is below market
    pub difference_percentage: Decimal,
    pub position: MarketPosition,
}

/// Estimate-to-market ratio per category
pub fn market_factor(category: CostCategory) -> Decimal {
    match category {
        CostCategory::Material => dec!(1.0),
        CostCategory::Labor => dec!(1.05),
        CostCategory::Equipment => dec!(0.95),
        CostCategory::Overhead => dec!(1.02),
    }
}

pub fn market_comparison(breakdown: &CostBreakdown) -> Vec<MarketComparison> {
    breakdown
        .subtotals
        .iter()
        .map(|(&category, &calculated)| {
            let factor = market_factor(category);
            let position = match factor.cmp(&Decimal::ONE) {
                std::cmp::Ordering::Greater => MarketPosition::Above,
                std::cmp::Ordering::Equal => MarketPosition::AtMarket,
                std::cmp::Ordering::Less => MarketPosition::Below,
            };
            MarketComparison {
                category,
                calculated,
                market_average: round_half_up(calculated / factor),
                difference_percentage: (Decimal::ONE - factor) * Decimal::ONE_HUNDRED,
                position,
            }
        })
        .collect()
}

/// `total / measure`, rounded, when the measure is a positive number
pub fn cost_per_unit(total: Decimal, measure: Option<f64>) -> Option<Decimal> {
    let measure = measure.filter(|m| m.is_finite() && *m > 0.0)?;
    let measure = decimal_from_f64(measure);
    if measure.is_zero() {
        return None;
    }
    Some(round_half_up(total / measure))
}

pub fn assumptions(context: &ProjectContext, config: &AggregatorConfig) -> Vec<String> {
    vec![
        "STABU 2024 unit prices used where available".to_string(),
        format!("VAT percentage: {}%", (config.vat_percentage * Decimal::ONE_HUNDRED).normalize()),
        "Costs based on Dutch market prices 2024".to_string(),
        "Labor costs include social charges".to_string(),
        format!("Complexity factor: {}", context.complexity),
        format!("Location factor: {}", context.location),
    ]
}

pub fn data_sources(drawing_type: Option<DrawingType>, report_type: Option<&str>) -> Vec<String> {
    let mut sources = vec![
        "STABU 2024 eenheidsprijzen".to_string(),
        "Interne tarieventabellen".to_string(),
    ];
    if let Some(drawing_type) = drawing_type {
        sources.push(format!("Drawing analysis: {drawing_type}"));
    }
    if let Some(report_type) = report_type {
        sources.push(format!("Report analysis: {report_type}"));
    }
    sources
}
