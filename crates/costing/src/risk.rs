//! Cost risk levels and the confidence score of an estimate.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    aggregate::{CostBreakdown, CostCategory, CostItem},
    money::share_percent,
};

const HIGH_COST_ITEM: Decimal = dec!(5000);
const LABOR_HIGH: Decimal = dec!(40);
const LABOR_MEDIUM: Decimal = dec!(30);
const MATERIAL_HIGH: Decimal = dec!(60);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize,
    Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    MediumHigh,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub high_cost_items: Vec<CostItem>,
    pub labor_risk: RiskLevel,
    pub material_risk: RiskLevel,
    pub overall_risk: RiskLevel,
    pub labor_percentage: Decimal,
    pub material_percentage: Decimal,
}

impl RiskAssessment {
    pub fn assess(breakdown: &CostBreakdown) -> Self {
        let high_cost_items: Vec<CostItem> = breakdown
            .items()
            .filter(|item| item.total_price > HIGH_COST_ITEM)
            .cloned()
            .collect();

        let labor_percentage =
            share_percent(breakdown.subtotal(CostCategory::Labor), breakdown.total_excl_vat);
        let material_percentage =
            share_percent(breakdown.subtotal(CostCategory::Material), breakdown.total_excl_vat);

        let labor_risk = if labor_percentage >= LABOR_HIGH {
            RiskLevel::High
        } else if labor_percentage >= LABOR_MEDIUM {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        let material_risk = if material_percentage >= MATERIAL_HIGH {
            RiskLevel::High
        } else {
            RiskLevel::Low
        };

        let overall_risk = if labor_risk == RiskLevel::High || material_risk == RiskLevel::High {
            RiskLevel::High
        } else if high_cost_items.len() > 3 {
            RiskLevel::MediumHigh
        } else {
            RiskLevel::Medium
        };

        Self {
            high_cost_items,
            labor_risk,
            material_risk,
            overall_risk,
            labor_percentage,
            material_percentage,
        }
    }
}

/// Inputs of the confidence score
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceInputs {
    pub drawing_confidence: Option<f64>,
    pub report_confidence: Option<f64>,
    pub item_count: usize,
    pub warning_count: usize,
}

/// Estimate confidence in [0.1, 0.95]
pub fn confidence_score(inputs: ConfidenceInputs) -> f64 {
    let mut score = 0.5;
    if let Some(drawing) = inputs.drawing_confidence {
        score += drawing * 0.2;
    }
    if let Some(report) = inputs.report_confidence {
        score += report * 0.1;
    }
    score += match inputs.item_count {
        n if n > 20 => 0.15,
        n if n > 10 => 0.1,
        n if n > 5 => 0.05,
        _ => 0.0,
    };
    score -= inputs.warning_count as f64 * 0.02;

    if score.is_nan() {
        return 0.1;
    }
    score.clamp(0.1, 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(code: &str, category: CostCategory, total: Decimal) -> CostItem {
        CostItem::new(code, code, category, "post", 1.0, total)
    }

    fn breakdown(material: Decimal, labor: Decimal, other: Decimal) -> CostBreakdown {
        CostBreakdown::from_items(
            vec![item("m", CostCategory::Material, material)],
            vec![item("l", CostCategory::Labor, labor)],
            vec![item("e", CostCategory::Equipment, other)],
            vec![],
            dec!(0.21),
        )
    }

    #[test]
    fn test_labor_at_exactly_thirty_percent_is_medium() {
        let assessment = RiskAssessment::assess(&breakdown(dec!(50), dec!(30), dec!(20)));
        assert_eq!(assessment.labor_percentage, dec!(30));
        assert_eq!(assessment.labor_risk, RiskLevel::Medium);
        assert_eq!(assessment.material_risk, RiskLevel::Low);
        assert_eq!(assessment.overall_risk, RiskLevel::Medium);
    }

    #[test]
    fn test_thresholds() {
        let labor_heavy = RiskAssessment::assess(&breakdown(dec!(40), dec!(40), dec!(20)));
        assert_eq!(labor_heavy.labor_risk, RiskLevel::High);
        assert_eq!(labor_heavy.overall_risk, RiskLevel::High);

        let material_heavy = RiskAssessment::assess(&breakdown(dec!(60), dec!(10), dec!(30)));
        assert_eq!(material_heavy.material_risk, RiskLevel::High);
        assert_eq!(material_heavy.labor_risk, RiskLevel::Low);
        assert_eq!(material_heavy.overall_risk, RiskLevel::High);
    }

    #[test]
    fn test_many_high_cost_items_raise_overall_risk() {
        let materials = (0..4)
            .map(|i| item(&format!("m{i}"), CostCategory::Material, dec!(5000.01)))
            .collect();
        let equipment = (0..4)
            .map(|i| item(&format!("e{i}"), CostCategory::Equipment, dec!(6000)))
            .collect();
        let breakdown = CostBreakdown::from_items(materials, vec![], equipment, vec![], dec!(0.21));

        let assessment = RiskAssessment::assess(&breakdown);
        assert_eq!(assessment.high_cost_items.len(), 8);
        assert_eq!(assessment.material_risk, RiskLevel::Low);
        assert_eq!(assessment.overall_risk, RiskLevel::MediumHigh);
    }

    #[test]
    fn test_empty_breakdown_has_zero_shares() {
        let assessment = RiskAssessment::assess(&CostBreakdown::empty(dec!(0.21)));
        assert_eq!(assessment.labor_percentage, Decimal::ZERO);
        assert_eq!(assessment.overall_risk, RiskLevel::Medium);
    }

    #[test]
    fn test_confidence_score() {
        let base = confidence_score(ConfidenceInputs::default());
        assert!((base - 0.5).abs() < 1e-9);

        let rich = confidence_score(ConfidenceInputs {
            drawing_confidence: Some(1.0),
            report_confidence: Some(1.0),
            item_count: 25,
            warning_count: 0,
        });
        assert!((rich - 0.95).abs() < 1e-9);

        let noisy = confidence_score(ConfidenceInputs {
            drawing_confidence: Some(0.5),
            item_count: 8,
            warning_count: 3,
            ..Default::default()
        });
        assert!((noisy - 0.59).abs() < 1e-9);

        let floor = confidence_score(ConfidenceInputs { warning_count: 50, ..Default::default() });
        assert!((floor - 0.1).abs() < 1e-9);
    }
}
